use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use tracing::warn;

mod output;
mod patch;
mod variables;

pub(crate) use output::clean_output_whitespace;
pub(crate) use patch::StatePatch;
pub(crate) use variables::VariablesState;

use super::CallStack;
use crate::config::StoryConfig;
use crate::error::{Result, StoryError};
use crate::schema::{Choice, ContainerId, Object, Path, Pointer, Program, PushPopType, Value};

/// Draws the number that follows `seed`, in `0..i32::MAX`.
///
/// The generator is reseeded for every draw, so a story's randomness is
/// entirely determined by its seed and the previous draw.
pub(crate) fn random_from_seed(seed: i32) -> i32 {
    let mut rng = Pcg64::seed_from_u64(seed as i64 as u64);
    rng.gen_range(0..i32::MAX)
}

/// Everything about a running story that changes as it is played, and that a save holds.
#[derive(Clone, Debug)]
pub struct StoryState {
    pub(crate) program: Rc<Program>,
    pub(crate) call_stack: CallStack,
    pub(crate) variables: VariablesState,
    pub(crate) evaluation_stack: Vec<Object>,
    pub(crate) output_stream: Vec<Object>,
    /// Text and tags of `output_stream`, cleared whenever it changes.
    output_text: RefCell<Option<String>>,
    output_tags: RefCell<Option<Vec<String>>>,
    /// Every generated choice, including invisible defaults.
    pub(crate) current_choices: Vec<Choice>,
    pub(crate) visit_counts: Rc<IndexMap<ContainerId, u32>>,
    pub(crate) turn_indices: Rc<IndexMap<ContainerId, i32>>,
    pub(crate) current_turn_index: i32,
    pub(crate) story_seed: i32,
    pub(crate) previous_random: i32,
    pub(crate) did_safe_exit: bool,
    pub(crate) diverted_pointer: Option<Pointer>,
    pub(crate) current_errors: Vec<String>,
    pub(crate) current_warnings: Vec<String>,
    pub(crate) patch: Option<StatePatch>,
    pub(crate) save_default_globals: bool,
}

impl StoryState {
    /// The current version of the state save file JSON-based format.
    pub const INK_SAVE_STATE_VERSION: u32 = 9;
    pub const MIN_COMPATIBLE_LOAD_VERSION: u32 = 8;

    pub(crate) fn new(program: Rc<Program>, config: &StoryConfig) -> Self {
        let story_seed = config
            .story_seed
            .unwrap_or_else(|| rand::thread_rng().gen_range(0..100));
        let variables = VariablesState::new(Rc::clone(&program.list_definitions));

        let mut state = Self {
            program,
            call_stack: CallStack::new(),
            variables,
            evaluation_stack: vec![],
            output_stream: vec![],
            output_text: RefCell::default(),
            output_tags: RefCell::default(),
            current_choices: vec![],
            visit_counts: Rc::default(),
            turn_indices: Rc::default(),
            current_turn_index: -1,
            story_seed,
            previous_random: 0,
            did_safe_exit: false,
            diverted_pointer: None,
            current_errors: vec![],
            current_warnings: vec![],
            patch: None,
            save_default_globals: config.save_default_globals,
        };
        state.go_to_start();
        state
    }

    pub(crate) fn go_to_start(&mut self) {
        self.call_stack.current_element_mut().current_pointer = Some(Pointer::start_of(Program::ROOT));
    }

    pub fn can_continue(&self) -> bool {
        self.current_pointer().is_some() && !self.has_error()
    }

    pub fn has_error(&self) -> bool {
        !self.current_errors.is_empty()
    }

    pub fn has_warning(&self) -> bool {
        !self.current_warnings.is_empty()
    }

    pub fn current_errors(&self) -> &[String] {
        &self.current_errors
    }

    pub fn current_warnings(&self) -> &[String] {
        &self.current_warnings
    }

    pub(crate) fn reset_errors(&mut self) {
        self.current_errors.clear();
        self.current_warnings.clear();
    }

    pub fn current_turn_index(&self) -> i32 {
        self.current_turn_index
    }

    pub fn story_seed(&self) -> i32 {
        self.story_seed
    }

    /// The choices the player can see, in order. Empty while there is still content to continue with.
    pub fn current_choices(&self) -> Vec<&Choice> {
        if self.can_continue() {
            return vec![];
        }
        self.current_choices
            .iter()
            .filter(|choice| !choice.is_invisible_default)
            .collect()
    }

    pub(crate) fn current_pointer(&self) -> Option<Pointer> {
        self.call_stack.current_element().current_pointer
    }

    pub(crate) fn set_current_pointer(&mut self, pointer: Option<Pointer>) {
        self.call_stack.current_element_mut().current_pointer = pointer;
    }

    pub(crate) fn previous_pointer(&self) -> Option<Pointer> {
        self.call_stack.current_thread().previous_pointer
    }

    pub(crate) fn set_previous_pointer(&mut self, pointer: Option<Pointer>) {
        self.call_stack.current_thread_mut().previous_pointer = pointer;
    }

    /// The path of the content about to be evaluated, if there is any.
    pub fn current_path_string(&self) -> Option<String> {
        self.current_pointer()
            .map(|pointer| pointer.path(&self.program).to_string())
    }

    pub(crate) fn in_expression_evaluation(&self) -> bool {
        self.call_stack.current_element().in_expression_evaluation
    }

    pub(crate) fn set_in_expression_evaluation(&mut self, value: bool) {
        self.call_stack.current_element_mut().in_expression_evaluation = value;
    }

    pub(crate) fn push_evaluation_stack(&mut self, obj: Object) {
        self.evaluation_stack.push(obj);
    }

    pub(crate) fn pop_evaluation_stack(&mut self) -> Result<Object> {
        self.evaluation_stack
            .pop()
            .ok_or_else(|| StoryError::runtime("Tried to pop from an empty evaluation stack"))
    }

    /// Pops `count` objects, returned in the order they were pushed.
    pub(crate) fn pop_evaluation_stack_n(&mut self, count: usize) -> Result<Vec<Object>> {
        story_ensure!(
            count <= self.evaluation_stack.len(),
            "trying to pop too many objects ({} of {})",
            count,
            self.evaluation_stack.len(),
        );
        let from = self.evaluation_stack.len() - count;
        Ok(self.evaluation_stack.split_off(from))
    }

    /// Pops a value, failing on anything else such as the void left by a function without a return.
    pub(crate) fn pop_value(&mut self) -> Result<Value> {
        match self.pop_evaluation_stack()? {
            Object::Value(value) => Ok(value),
            obj => story_bail!("Expected a value on the evaluation stack, but found {:?}", obj),
        }
    }

    pub(crate) fn peek_evaluation_stack(&self) -> Option<&Object> {
        self.evaluation_stack.last()
    }

    /// Unwinds everything and stops the flow, as `-> END` does.
    pub(crate) fn force_end(&mut self) {
        self.call_stack.reset();
        self.current_choices.clear();
        self.set_current_pointer(None);
        self.set_previous_pointer(None);
        self.did_safe_exit = true;
    }

    /// Stops evaluation if the current frame is a function the host called.
    pub(crate) fn try_exit_function_evaluation_from_game(&mut self) -> bool {
        if self.call_stack.element_is_evaluate_from_game() {
            self.set_current_pointer(None);
            self.did_safe_exit = true;
            return true;
        }
        false
    }

    pub(crate) fn pop_callstack(&mut self, pop_type: Option<PushPopType>) -> Result<()> {
        if self.call_stack.current_element().push_type == PushPopType::Function {
            self.trim_whitespace_from_function_end();
        }
        self.call_stack.pop(pop_type)
    }

    /// A pointer for an absolute path, recording a warning when the path had to be approximated.
    pub(crate) fn pointer_at_path(&mut self, path: &Path) -> Result<Option<Pointer>> {
        let lookup = self.program.pointer_at_path(path)?;
        if let Some(approximation) = lookup.approximated_to {
            let approximation = self.program.path_of(approximation);
            self.add_error(
                format!("Failed to find content at path '{}', and it was approximated to '{}' instead.", path, approximation),
                true,
            );
        }
        Ok(lookup.pointer)
    }

    pub(crate) fn set_chosen_path(&mut self, path: &Path, incrementing_turn_index: bool) -> Result<()> {
        self.current_choices.clear();
        let pointer = self.pointer_at_path(path)?.map(|pointer| match pointer.index {
            None => Pointer::start_of(pointer.container),
            Some(_) => pointer,
        });
        self.set_current_pointer(pointer);
        if incrementing_turn_index {
            self.current_turn_index += 1;
        }
        Ok(())
    }

    pub(crate) fn start_function_evaluation_from_game(&mut self, function: ContainerId, args: &[Value]) -> Result<()> {
        self.call_stack.push(PushPopType::FunctionEvaluationFromGame, self.evaluation_stack.len(), 0);
        self.set_current_pointer(Some(Pointer::start_of(function)));
        self.pass_arguments_to_evaluation_stack(args)
    }

    pub(crate) fn pass_arguments_to_evaluation_stack(&mut self, args: &[Value]) -> Result<()> {
        for arg in args {
            match arg {
                Value::Bool(..) | Value::Int(..) | Value::Float(..) | Value::String(..) | Value::List(..) => {
                    self.push_evaluation_stack(Object::Value(arg.clone()));
                }
                other => {
                    return Err(StoryError::InvalidArgument(format!(
                        "ink arguments when calling evaluate_function / choose_path_string must be int, float, string, bool or InkList. Argument was {}",
                        other.value_type(),
                    )));
                }
            }
        }
        Ok(())
    }

    /// Tears down the host's function call, returning the value it left on the evaluation stack.
    pub(crate) fn complete_function_evaluation_from_game(&mut self) -> Result<Option<Value>> {
        if !self.call_stack.element_is_evaluate_from_game() {
            story_bail!(
                "Expected external function evaluation to be complete. Stack trace: {}",
                self.call_stack.call_stack_trace(&self.program),
            );
        }

        let original_height = self.call_stack.current_element().evaluation_stack_height_when_pushed;
        let mut returned = None;
        while self.evaluation_stack.len() > original_height {
            let popped = self.pop_evaluation_stack()?;
            returned.get_or_insert(popped);
        }

        self.pop_callstack(Some(PushPopType::FunctionEvaluationFromGame))?;
        Ok(returned.and_then(Object::into_value))
    }

    pub(crate) fn visit_count_for_container(&self, container: ContainerId) -> Result<u32> {
        let counted = self.program.container(container);
        if !counted.visits_should_be_counted {
            story_bail!("Read count for target ({}) unknown.", counted.path());
        }
        if let Some(count) = self.patch.as_ref().and_then(|patch| patch.try_get_visit_count(container)) {
            return Ok(count);
        }
        Ok(self.visit_counts.get(&container).copied().unwrap_or(0))
    }

    pub(crate) fn increment_visit_count_for_container(&mut self, container: ContainerId) {
        if let Some(patch) = &mut self.patch {
            let current = patch
                .try_get_visit_count(container)
                .or_else(|| self.visit_counts.get(&container).copied())
                .unwrap_or(0);
            patch.set_visit_count(container, current + 1);
            return;
        }
        *Rc::make_mut(&mut self.visit_counts).entry(container).or_insert(0) += 1;
    }

    pub(crate) fn record_turn_index_visit_to_container(&mut self, container: ContainerId) {
        let turn_index = self.current_turn_index;
        match &mut self.patch {
            Some(patch) => patch.set_turn_index(container, turn_index),
            None => {
                Rc::make_mut(&mut self.turn_indices).insert(container, turn_index);
            }
        }
    }

    /// Turns since the container was last visited, or -1 if it never was.
    pub(crate) fn turns_since_for_container(&self, container: ContainerId) -> Result<i32> {
        let counted = self.program.container(container);
        if !counted.turn_index_should_be_counted {
            story_bail!("TURNS_SINCE() for target ({}) unknown.", counted.path());
        }
        let index = self
            .patch
            .as_ref()
            .and_then(|patch| patch.try_get_turn_index(container))
            .or_else(|| self.turn_indices.get(&container).copied());
        Ok(index.map_or(-1, |index| self.current_turn_index - index))
    }

    /// How many times the container at `path` has been visited.
    pub fn visit_count_at_path_string(&self, path: &str) -> Result<u32> {
        let result = self.program.content_at_path(Program::ROOT, &Path::from(path), None);
        let container = match result.container() {
            Some(container) if !result.approximate => container,
            _ => return Err(StoryError::InvalidArgument(format!("Content at path not found: {}", path))),
        };
        if let Some(count) = self.patch.as_ref().and_then(|patch| patch.try_get_visit_count(container)) {
            return Ok(count);
        }
        Ok(self.visit_counts.get(&container).copied().unwrap_or(0))
    }

    /// A copy of this state that takes over as the live one, writing into a patch
    /// so that `self` stays readable as it was.
    pub(crate) fn copy_and_start_patching(&self) -> StoryState {
        let mut copy = self.clone();
        copy.patch = Some(StatePatch::new(self.patch.as_ref()));
        copy
    }

    /// Folds any pending patch into the canonical globals and counters.
    pub(crate) fn apply_any_patch(&mut self) {
        let Some(patch) = self.patch.take() else {
            return;
        };
        self.variables.apply_patch(&patch);
        if !patch.visit_counts.is_empty() {
            let visit_counts = Rc::make_mut(&mut self.visit_counts);
            for (container, count) in &patch.visit_counts {
                visit_counts.insert(*container, *count);
            }
        }
        if !patch.turn_indices.is_empty() {
            let turn_indices = Rc::make_mut(&mut self.turn_indices);
            for (container, index) in &patch.turn_indices {
                turn_indices.insert(*container, *index);
            }
        }
    }

    /// Records a runtime error or warning, prefixed with where it happened.
    ///
    /// Errors end the flow.
    pub(crate) fn add_error(&mut self, message: String, is_warning: bool) {
        let kind = if is_warning { "WARNING" } else { "ERROR" };
        let message = match self.current_path_string() {
            Some(path) => format!("RUNTIME {}: ({}): {}", kind, path, message),
            None => format!("RUNTIME {}: {}", kind, message),
        };
        warn!("{}", message);
        if is_warning {
            self.current_warnings.push(message);
        } else {
            self.current_errors.push(message);
            self.force_end();
        }
    }

    /// Serializes the state to the ink save format.
    pub fn to_json(&self) -> Result<String> {
        crate::json::write_state(self)
    }

    /// Replaces this state with the one held by a save.
    pub fn load_json(&mut self, json: &str) -> Result<()> {
        crate::json::read_state(self, json)
    }
}
