use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use super::state::{clean_output_whitespace, random_from_seed};
use super::Story;
use crate::error::{Result, StoryError};
use crate::schema::{
    ControlCommand, Divert, DivertTarget, InkList, Object, ObjectRef, Program, PushPopType, Tag, Value,
    VariableContext, VariableReference,
};

// Logic and flow control
impl Story {
    /// Evaluates anything that is not plain content. Returns whether `obj` was such a thing.
    pub(super) fn perform_logic_and_flow_control(&mut self, obj: &Object, at: ObjectRef) -> Result<bool> {
        match obj {
            Object::Divert(divert) => {
                self.perform_divert(divert, at)?;
                Ok(true)
            }
            Object::ControlCommand(command) => {
                self.perform_control_command(*command)?;
                Ok(true)
            }
            Object::VariableAssignment(assignment) => {
                let value = match self.state.pop_evaluation_stack()? {
                    Object::Value(value) => value,
                    Object::Void => Value::Void,
                    obj => story_bail!("Expected a value to assign to {}, but found {:?}", assignment.variable_name, obj),
                };
                let state = &mut self.state;
                state
                    .variables
                    .assign(assignment, value, &mut state.call_stack, state.patch.as_mut())?;
                Ok(true)
            }
            Object::VariableReference(VariableReference::PathForCount(path)) => {
                let container = self.program.resolve_path(at, path).container().ok_or_else(|| {
                    StoryError::runtime(format!("Failed to find container for read count of {}", path))
                })?;
                let count = self.state.visit_count_for_container(container)?;
                self.state.push_evaluation_stack(Object::Value(Value::Int(count as i32)));
                Ok(true)
            }
            Object::VariableReference(VariableReference::Variable(name)) => {
                let state = &self.state;
                let found = state.variables.get_variable_with_name(
                    name,
                    VariableContext::Unknown,
                    &state.call_stack,
                    state.patch.as_ref(),
                );
                let value = match found {
                    Some(value) => value,
                    None => {
                        self.state.add_error(
                            format!(
                                "Variable not found: '{}'. Using default value of 0 (false). This can happen with temporary variables if the declaration hasn't yet been hit. Globals are always given a default value on load if a value doesn't exist in the save state.",
                                name,
                            ),
                            true,
                        );
                        Value::Int(0)
                    }
                };
                self.state.push_evaluation_stack(Object::from(value));
                Ok(true)
            }
            Object::NativeFunctionCall(function) => {
                let params = self.state.pop_evaluation_stack_n(function.number_of_parameters())?;
                let mut values = Vec::with_capacity(params.len());
                for param in params {
                    match param {
                        Object::Value(value) => values.push(value),
                        Object::Void => story_bail!(
                            "Attempting to perform operation on a void value. Did you forget to 'return' a value from a function you called here?"
                        ),
                        other => story_bail!("Invalid parameter for {}: {:?}", function, other),
                    }
                }
                let result = function.call(values, &self.program.list_definitions)?;
                self.state.push_evaluation_stack(Object::Value(result));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn perform_divert(&mut self, divert: &Divert, at: ObjectRef) -> Result<()> {
        if divert.is_conditional {
            let condition = self.state.pop_value()?;
            if !condition.is_truthy()? {
                return Ok(());
            }
        }

        match &divert.target {
            DivertTarget::Variable(name) => {
                let state = &self.state;
                let contents = state.variables.get_variable_with_name(
                    name,
                    VariableContext::Unknown,
                    &state.call_stack,
                    state.patch.as_ref(),
                );
                match contents {
                    None => story_bail!(
                        "Tried to divert using a target from a variable that could not be found ({})",
                        name,
                    ),
                    Some(Value::DivertTarget(path)) => {
                        self.state.diverted_pointer = self.state.pointer_at_path(&path)?;
                    }
                    Some(Value::Int(0)) => story_bail!(
                        "Tried to divert to a target from a variable, but the variable ({}) didn't contain a divert target, it was empty/null (the value 0).",
                        name,
                    ),
                    Some(other) => story_bail!(
                        "Tried to divert to a target from a variable, but the variable ({}) didn't contain a divert target, it contained '{}'.",
                        name,
                        other,
                    ),
                }
            }
            DivertTarget::External { name, args } => {
                return self.call_external_function(name, *args);
            }
            DivertTarget::Path(path) => {
                self.state.diverted_pointer = self.program.divert_target_pointer(at, path);
            }
        }

        if divert.pushes_to_stack {
            let output_length = self.state.output_stream.len();
            self.state.call_stack.push(divert.stack_push_type, 0, output_length);
        }

        if self.state.diverted_pointer.is_none() {
            story_bail!("Divert resolution failed: {:?}", divert);
        }
        Ok(())
    }

    fn perform_control_command(&mut self, command: ControlCommand) -> Result<()> {
        match command {
            ControlCommand::EvalStart => {
                story_ensure!(!self.state.in_expression_evaluation(), "Already in expression evaluation?");
                self.state.set_in_expression_evaluation(true);
            }
            ControlCommand::EvalEnd => {
                story_ensure!(self.state.in_expression_evaluation(), "Not in expression evaluation mode");
                self.state.set_in_expression_evaluation(false);
            }
            ControlCommand::EvalOutput => {
                // With no value left, there was a function call that returned nothing.
                if self.state.peek_evaluation_stack().is_some() {
                    let text = match self.state.pop_evaluation_stack()? {
                        Object::Void => None,
                        Object::Value(value) => Some(value.to_string()),
                        Object::Tag(tag) => Some(tag.text().to_owned()),
                        other => story_bail!("Can't output {:?}", other),
                    };
                    if let Some(text) = text {
                        self.state.push_to_output_stream(Object::string(text));
                    }
                }
            }
            ControlCommand::NoOp => {}
            ControlCommand::Duplicate => {
                let top = self
                    .state
                    .peek_evaluation_stack()
                    .cloned()
                    .ok_or_else(|| StoryError::runtime("Nothing on the evaluation stack to duplicate"))?;
                self.state.push_evaluation_stack(top);
            }
            ControlCommand::PopEvaluatedValue => {
                self.state.pop_evaluation_stack()?;
            }
            ControlCommand::PopFunction | ControlCommand::PopTunnel => {
                let pop_type = if command == ControlCommand::PopFunction {
                    PushPopType::Function
                } else {
                    PushPopType::Tunnel
                };

                // `->-> target` replaces where a tunnel returns to.
                let mut override_return_target = None;
                if pop_type == PushPopType::Tunnel {
                    match self.state.pop_evaluation_stack()? {
                        Object::Value(Value::DivertTarget(path)) => override_return_target = Some(path),
                        Object::Void => {}
                        other => story_bail!("Expected void if ->-> doesn't override target, found {:?}", other),
                    }
                }

                if self.state.try_exit_function_evaluation_from_game() {
                    return Ok(());
                }
                let call_stack = &self.state.call_stack;
                if call_stack.current_element().push_type != pop_type || !call_stack.can_pop() {
                    let expected = call_stack.can_pop().then(|| call_stack.current_element().push_type);
                    return Err(StoryError::MismatchedPop { expected, found: pop_type });
                }
                self.state.pop_callstack(None)?;
                if let Some(path) = override_return_target {
                    self.state.diverted_pointer = self.state.pointer_at_path(&path)?;
                }
            }
            ControlCommand::BeginString => {
                story_ensure!(
                    self.state.in_expression_evaluation(),
                    "Expected to be in an expression when evaluating a string",
                );
                self.state.push_to_output_stream(Object::ControlCommand(command));
                self.state.set_in_expression_evaluation(false);
            }
            ControlCommand::BeginTag => {
                self.state.push_to_output_stream(Object::ControlCommand(command));
            }
            ControlCommand::EndTag => {
                if self.state.in_string_evaluation() {
                    self.end_tag_in_string()?;
                } else {
                    self.state.push_to_output_stream(Object::ControlCommand(command));
                }
            }
            ControlCommand::EndString => self.end_string(),
            ControlCommand::ChoiceCount => {
                let count = self.state.current_choices.len() as i32;
                self.state.push_evaluation_stack(Object::Value(Value::Int(count)));
            }
            ControlCommand::Turns => {
                let turns = self.state.current_turn_index + 1;
                self.state.push_evaluation_stack(Object::Value(Value::Int(turns)));
            }
            ControlCommand::TurnsSince | ControlCommand::ReadCount => {
                let path = match self.state.pop_evaluation_stack()? {
                    Object::Value(Value::DivertTarget(path)) => path,
                    other => {
                        let note = match other {
                            Object::Value(Value::Int(..)) => ". Did you accidentally pass a read count ('knot_name') instead of a target ('-> knot_name')?",
                            _ => "",
                        };
                        let shown = match &other {
                            Object::Value(value) => value.to_string(),
                            other => format!("{:?}", other),
                        };
                        story_bail!(
                            "TURNS_SINCE / READ_COUNT expected a divert target (knot, stitch, label name), but saw {}{}",
                            shown,
                            note,
                        );
                    }
                };

                let result = self.program.content_at_path(Program::ROOT, &path, None);
                let container = result.container().filter(|_| !result.approximate);
                let count = match (container, command) {
                    (Some(container), ControlCommand::TurnsSince) => self.state.turns_since_for_container(container)?,
                    (Some(container), _) => self.state.visit_count_for_container(container)? as i32,
                    (None, _) => {
                        self.state.add_error(
                            format!("Failed to find container for {} lookup at {}", command, path),
                            true,
                        );
                        if command == ControlCommand::TurnsSince { -1 } else { 0 }
                    }
                };
                self.state.push_evaluation_stack(Object::Value(Value::Int(count)));
            }
            ControlCommand::Random => {
                let max = self.state.pop_value()?.as_int();
                let min = self.state.pop_value()?.as_int();
                let Some(min) = min else {
                    story_bail!("Invalid value for minimum parameter of RANDOM(min, max)");
                };
                let Some(max) = max else {
                    story_bail!("Invalid value for maximum parameter of RANDOM(min, max)");
                };

                // Inclusive of both ends, so RANDOM(1, 6) is a dice roll.
                let range = max
                    .checked_sub(min)
                    .and_then(|range| range.checked_add(1))
                    .ok_or_else(|| {
                        StoryError::runtime("RANDOM was called with a range that exceeds the size that ink numbers can use.")
                    })?;
                if range <= 0 {
                    story_bail!(
                        "RANDOM was called with minimum as {} and maximum as {}. The maximum must be larger",
                        min,
                        max,
                    );
                }

                let next = random_from_seed(self.state.story_seed.wrapping_add(self.state.previous_random));
                let chosen = next % range + min;
                self.state.push_evaluation_stack(Object::Value(Value::Int(chosen)));
                self.state.previous_random = next;
            }
            ControlCommand::SeedRandom => {
                let Some(seed) = self.state.pop_value()?.as_int() else {
                    story_bail!("Invalid value passed to SEED_RANDOM");
                };
                self.state.story_seed = seed;
                self.state.previous_random = 0;
                // SEED_RANDOM is called as a function, so it has to leave something behind.
                self.state.push_evaluation_stack(Object::Void);
            }
            ControlCommand::VisitIndex => {
                let Some(pointer) = self.state.current_pointer() else {
                    story_bail!("No current container for visit index");
                };
                let count = self.state.visit_count_for_container(pointer.container)? as i32 - 1;
                self.state.push_evaluation_stack(Object::Value(Value::Int(count)));
            }
            ControlCommand::SequenceShuffleIndex => {
                let index = self.next_sequence_shuffle_index()?;
                self.state.push_evaluation_stack(Object::Value(Value::Int(index)));
            }
            // Threads are pushed once the pointer has moved past this command.
            ControlCommand::StartThread => {}
            ControlCommand::Done => {
                if self.state.call_stack.can_pop_thread() {
                    self.state.call_stack.pop_thread()?;
                } else {
                    self.state.did_safe_exit = true;
                    self.state.set_current_pointer(None);
                }
            }
            ControlCommand::End => self.state.force_end(),
            ControlCommand::ListFromInt => {
                let int = self.state.pop_value()?.as_int();
                let list_name = self.state.pop_value()?;
                let Some(int) = int else {
                    story_bail!("Passed non-integer when creating a list element from a numerical value.");
                };
                let list_name = list_name.as_str().unwrap_or_default().to_owned();
                let definition = self
                    .program
                    .list_definitions
                    .list_definition_by_name(&list_name)
                    .ok_or_else(|| StoryError::runtime(format!("Failed to find LIST called {}", list_name)))?;
                let list = match definition.item_with_value(int) {
                    Some(item) => InkList::from_single(item, int),
                    None => InkList::new(),
                };
                self.state.push_evaluation_stack(Object::Value(Value::List(list)));
            }
            ControlCommand::ListRange => {
                let max = self.state.pop_value();
                let min = self.state.pop_value();
                let target = self.state.pop_value();
                let (Ok(max), Ok(min), Ok(Value::List(target))) = (max, min, target) else {
                    story_bail!("Expected list, minimum and maximum for LIST_RANGE");
                };
                let range = target.sub_range(&min, &max);
                self.state.push_evaluation_stack(Object::Value(Value::List(range)));
            }
            ControlCommand::ListRandom => {
                let Value::List(list) = self.state.pop_value()? else {
                    story_bail!("Expected list for LIST_RANDOM");
                };
                let picked = if list.is_empty() {
                    InkList::new()
                } else {
                    let next = random_from_seed(self.state.story_seed.wrapping_add(self.state.previous_random));
                    let index = next as usize % list.len();
                    let mut picked = InkList::new();
                    if let Some((item, value)) = list.iter().nth(index) {
                        if let Some(origin) = item.origin_name() {
                            picked.set_initial_origin_names(vec![origin.to_owned()]);
                        }
                        picked.insert(item.clone(), value);
                    }
                    self.state.previous_random = next;
                    picked
                };
                self.state.push_evaluation_stack(Object::Value(Value::List(picked)));
            }
        }
        Ok(())
    }

    /// Turns the text since the matching `BeginTag` into a tag on the evaluation stack, for a choice to pick up.
    fn end_tag_in_string(&mut self) -> Result<()> {
        let mut consumed = 0;
        let mut parts = vec![];
        for obj in self.state.output_stream.iter().rev() {
            consumed += 1;
            match obj {
                Object::ControlCommand(ControlCommand::BeginTag) => break,
                Object::ControlCommand(..) => {
                    story_bail!("Unexpected ControlCommand while extracting tag from choice");
                }
                Object::Value(Value::String(text)) => parts.push(text.clone()),
                _ => {}
            }
        }
        self.state.pop_from_output_stream(consumed);

        parts.reverse();
        let tag = Tag::new(clean_output_whitespace(&parts.concat()));
        self.state.push_evaluation_stack(Object::Tag(tag));
        Ok(())
    }

    /// Collects the output since the matching `BeginString` into one string value.
    ///
    /// Tags inside the string stay in the output.
    fn end_string(&mut self) {
        let mut consumed = 0;
        let mut parts = vec![];
        let mut rescued_tags = vec![];
        for obj in self.state.output_stream.iter().rev() {
            consumed += 1;
            match obj {
                Object::ControlCommand(ControlCommand::BeginString) => break,
                Object::Tag(..) => rescued_tags.push(obj.clone()),
                Object::Value(Value::String(text)) => parts.push(text.clone()),
                _ => {}
            }
        }
        self.state.pop_from_output_stream(consumed);
        for tag in rescued_tags.into_iter().rev() {
            self.state.push_to_output_stream(tag);
        }

        parts.reverse();
        self.state.set_in_expression_evaluation(true);
        self.state.push_evaluation_stack(Object::Value(Value::String(parts.concat())));
    }

    /// Picks the element of a shuffle sequence to show on this visit.
    ///
    /// Shuffles are deterministic: each full loop through the elements draws
    /// from a generator seeded by the sequence's path, the loop and the story seed.
    fn next_sequence_shuffle_index(&mut self) -> Result<i32> {
        let Some(num_elements) = self.state.pop_value()?.as_int() else {
            story_bail!("expected number of elements in sequence for shuffle index");
        };
        let Some(pointer) = self.state.current_pointer() else {
            story_bail!("No current container for shuffle index");
        };
        let Some(seq_count) = self.state.pop_value()?.as_int() else {
            story_bail!("expected sequence count for shuffle index");
        };
        story_ensure!(num_elements > 0, "shuffle sequence has no elements");

        let loop_index = seq_count / num_elements;
        let iteration_index = seq_count % num_elements;

        let hash = self
            .program
            .container(pointer.container)
            .path()
            .to_string()
            .chars()
            .fold(0i32, |acc, ch| acc.wrapping_add(ch as i32));
        let seed = hash.wrapping_add(loop_index).wrapping_add(self.state.story_seed);
        let mut random = Pcg64::seed_from_u64(seed as i64 as u64);

        let mut unpicked: Vec<i32> = (0..num_elements).collect();
        for i in 0..=iteration_index {
            let chosen = random.gen_range(0..i32::MAX) as usize % unpicked.len();
            let index = unpicked.remove(chosen);
            if i == iteration_index {
                return Ok(index);
            }
        }
        story_bail!("shuffle sequence index out of range")
    }
}
