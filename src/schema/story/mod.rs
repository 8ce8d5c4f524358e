use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::mem;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

mod call_stack;
mod choices;
mod external;
mod flow;
mod state;
mod step;

pub(crate) use call_stack::{CallStack, Element, Thread};
pub use state::StoryState;

use super::{Choice, ControlCommand, ExternalBinding, Object, ObserverId, Path, Program, Value};
use crate::config::StoryConfig;
use crate::error::{Result, StoryError};
use crate::json;

/// Called with the name and new value of an observed global after it changes.
pub type VariableObserver = Box<dyn FnMut(&str, &Value)>;

/// A loaded story and the state of a play-through of it.
///
/// The story owns its state, and the state owns its call stack and
/// variables. Snapshots taken while looking ahead past a newline are plain
/// copies of the state that share the unchanged parts through `Rc`.
pub struct Story {
    program: Rc<Program>,
    state: StoryState,
    /// The state as it was at the last newline, kept while evaluation looks ahead.
    state_snapshot: Option<StoryState>,
    config: StoryConfig,

    externals: HashMap<String, ExternalBinding>,
    has_validated_externals: bool,
    observers: IndexMap<String, Vec<(ObserverId, VariableObserver)>>,
    next_observer_id: usize,

    async_continue_active: bool,
    async_saving: bool,
    saw_lookahead_unsafe_function_after_newline: bool,
}

impl Debug for Story {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Story {{ .. }}")
    }
}

impl Story {
    /// The current version of the ink story file format.
    pub const INK_VERSION_CURRENT: u32 = 21;

    /// The minimum legacy version of ink that can be loaded by the current version of the code.
    pub const INK_VERSION_MINIMUM_COMPATIBLE: u32 = 18;

    pub fn new(json: &str) -> Result<Self> {
        Self::with_config(json, StoryConfig::default())
    }

    pub fn with_config(json: &str, config: StoryConfig) -> Result<Self> {
        let program = Rc::new(json::read_program(json)?);
        let state = StoryState::new(Rc::clone(&program), &config);
        let mut story = Story {
            program,
            state,
            state_snapshot: None,
            config,
            externals: HashMap::new(),
            has_validated_externals: false,
            observers: IndexMap::new(),
            next_observer_id: 0,
            async_continue_active: false,
            async_saving: false,
            saw_lookahead_unsafe_function_after_newline: false,
        };
        story.reset_globals()?;
        Ok(story)
    }

    pub(crate) fn if_async_we_cant(&self, activity: &'static str) -> Result<()> {
        if self.async_continue_active {
            return Err(StoryError::AsyncContinueActive(activity));
        }
        Ok(())
    }

    /// Runs the story's global declarations and records the values they set as defaults.
    fn reset_globals(&mut self) -> Result<()> {
        if self.program.root().named_content.contains_key("global decl") {
            let original_pointer = self.state.current_pointer();
            self.choose_path(&Path::from("global decl"), false)?;
            self.continue_internal(None)?;
            self.state.set_current_pointer(original_pointer);
        }
        self.state.variables.snapshot_default_globals();
        Ok(())
    }

    /// Starts the story over from the beginning with fresh globals.
    pub fn reset_state(&mut self) -> Result<()> {
        self.if_async_we_cant("reset state")?;
        self.state = StoryState::new(Rc::clone(&self.program), &self.config);
        self.state_snapshot = None;
        self.reset_globals()
    }

    /// Unwinds the call stack and clears the choices, leaving globals and counts intact.
    pub fn reset_callstack(&mut self) -> Result<()> {
        self.if_async_we_cant("reset the callstack")?;
        self.state.force_end();
        Ok(())
    }

    pub fn reset_errors(&mut self) {
        self.state.reset_errors();
    }
}

// Accessors
impl Story {
    pub fn config(&self) -> &StoryConfig {
        &self.config
    }

    pub fn state(&self) -> &StoryState {
        &self.state
    }

    pub fn can_continue(&self) -> bool {
        self.state.can_continue()
    }

    /// Whether the last `continue_async` call finished its line.
    pub fn async_continue_complete(&self) -> bool {
        !self.async_continue_active
    }

    pub fn current_text(&self) -> String {
        self.state.current_text()
    }

    pub fn current_tags(&self) -> Vec<String> {
        self.state.current_tags()
    }

    /// The choices to present, without invisible defaults. Empty while the story can continue.
    pub fn current_choices(&self) -> Vec<&Choice> {
        self.state.current_choices()
    }

    pub fn current_errors(&self) -> &[String] {
        self.state.current_errors()
    }

    pub fn current_warnings(&self) -> &[String] {
        self.state.current_warnings()
    }

    pub fn has_error(&self) -> bool {
        self.state.has_error()
    }

    pub fn has_warning(&self) -> bool {
        self.state.has_warning()
    }

    pub fn call_stack_trace(&self) -> String {
        self.state.call_stack.call_stack_trace(&self.program)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.program.knot_container_with_name(name).is_some()
    }

    /// Writes the compiled story back out as JSON.
    pub fn to_json(&self) -> Result<String> {
        json::write_program(&self.program)
    }
}

// Variables
impl Story {
    /// The current value of a global variable.
    pub fn variable(&self, name: &str) -> Option<Value> {
        self.state.variables.global(name, self.state.patch.as_ref())
    }

    /// Sets a global declared by the story, notifying its observers.
    pub fn set_variable<V: Into<Value>>(&mut self, name: &str, value: V) -> Result<()> {
        let state = &mut self.state;
        state.variables.set_declared_global(name, value.into(), state.patch.as_mut())?;
        let changes = state.variables.take_unbatched_changes(state.patch.as_ref());
        self.notify_variable_observers(changes);
        Ok(())
    }

    /// Calls `observer` every time the global `name` changes.
    ///
    /// Changes made while continuing are reported once the line is complete,
    /// with the variable's final value.
    pub fn observe_variable<F>(&mut self, name: &str, observer: F) -> Result<ObserverId>
    where
        F: FnMut(&str, &Value) + 'static,
    {
        self.if_async_we_cant("observe a new variable")?;
        if !self.state.variables.global_variable_exists_with_name(name) {
            return Err(StoryError::UndeclaredVariable(name.to_owned()));
        }
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers
            .entry(name.to_owned())
            .or_default()
            .push((id, Box::new(observer)));
        Ok(id)
    }

    /// Removes an observer, returning whether it was registered.
    pub fn remove_variable_observer(&mut self, id: ObserverId) -> Result<bool> {
        self.if_async_we_cant("remove a variable observer")?;
        let mut removed = false;
        for observers in self.observers.values_mut() {
            let before = observers.len();
            observers.retain(|(observer_id, _)| *observer_id != id);
            removed |= observers.len() != before;
        }
        self.observers.retain(|_, observers| !observers.is_empty());
        Ok(removed)
    }

    pub(crate) fn notify_variable_observers(&mut self, changes: Vec<(String, Value)>) {
        for (name, value) in changes {
            if let Some(observers) = self.observers.get_mut(&name) {
                for (_, observer) in observers.iter_mut() {
                    observer(&name, &value);
                }
            }
        }
    }
}

// Tags
impl Story {
    /// Tags at the very top of the story, before any content.
    pub fn global_tags(&self) -> Result<Vec<String>> {
        self.tags_at_start_of_flow_container(&Path::default())
    }

    /// Tags at the start of the knot or stitch at `path`.
    pub fn tags_for_content_at_path(&self, path: &str) -> Result<Vec<String>> {
        self.tags_at_start_of_flow_container(&Path::from(path))
    }

    fn tags_at_start_of_flow_container(&self, path: &Path) -> Result<Vec<String>> {
        let result = self.program.content_at_path(Program::ROOT, path, None);
        let mut container = match result.container() {
            Some(container) if !result.approximate => container,
            _ => return Err(StoryError::InvalidArgument(format!("Content at path not found: {}", path))),
        };
        while let Some(Object::Container(first)) = self.program.container(container).content().first() {
            container = *first;
        }

        let mut tags = vec![];
        let mut in_tag = false;
        let mut tag_text = String::new();
        for obj in self.program.container(container).content() {
            match obj {
                Object::ControlCommand(ControlCommand::BeginTag) => in_tag = true,
                Object::ControlCommand(ControlCommand::EndTag) => {
                    if !tag_text.is_empty() {
                        tags.push(mem::take(&mut tag_text));
                    }
                    in_tag = false;
                }
                Object::ControlCommand(..) => {}
                _ if in_tag => match obj.as_text() {
                    Some(text) => tag_text.push_str(text),
                    None => story_bail!(
                        "Tag contained non-text content. Only plain text is allowed when using global_tags or tags_for_content_at_path. If you want to evaluate dynamic content, you need to use continue_story()."
                    ),
                },
                Object::Tag(tag) => tags.push(tag.text().to_owned()),
                _ => break,
            }
        }
        Ok(tags)
    }
}

// Saving
impl Story {
    pub fn save_state(&self) -> Result<String> {
        self.state.to_json()
    }

    pub fn load_state(&mut self, json: &str) -> Result<()> {
        self.if_async_we_cant("load a saved state")?;
        self.state.load_json(json)?;
        self.state_snapshot = None;
        debug!("state loaded");
        Ok(())
    }

    /// Hands over the current state for saving elsewhere, continuing play on a patched copy.
    ///
    /// Call [`background_save_complete`](Self::background_save_complete) once saving is done.
    pub fn copy_state_for_background_thread_save(&mut self) -> Result<StoryState> {
        self.if_async_we_cant("start saving on a background thread")?;
        if self.async_saving {
            return Err(StoryError::BackgroundSaveActive);
        }
        let copy = self.state.copy_and_start_patching();
        let to_save = mem::replace(&mut self.state, copy);
        self.async_saving = true;
        debug!("started background save");
        Ok(to_save)
    }

    pub fn background_save_complete(&mut self) {
        if self.state_snapshot.is_none() {
            self.state.apply_any_patch();
        }
        self.async_saving = false;
    }

    fn take_state_snapshot(&mut self) {
        let copy = self.state.copy_and_start_patching();
        self.state_snapshot = Some(mem::replace(&mut self.state, copy));
        debug!("took state snapshot at newline");
    }

    /// Rewinds to the snapshot. Errors and warnings raised since it was taken are kept.
    fn restore_state_snapshot(&mut self) {
        let Some(mut snapshot) = self.state_snapshot.take() else {
            return;
        };
        snapshot.current_errors = mem::take(&mut self.state.current_errors);
        snapshot.current_warnings = mem::take(&mut self.state.current_warnings);
        self.state = snapshot;
        if !self.async_saving {
            self.state.apply_any_patch();
        }
        debug!("restored state snapshot");
    }

    fn discard_snapshot(&mut self) {
        if !self.async_saving {
            self.state.apply_any_patch();
        }
        self.state_snapshot = None;
    }
}

