use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::trace;

use super::Story;
use crate::error::{Result, StoryError};
use crate::schema::{ContainerId, ControlCommand, Object, ObjectRef, Pointer, Program, PushPopType, Value, VariableContext};

/// How the text changed since the snapshot taken at the last newline.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum OutputStateChange {
    NoChange,
    ExtendedBeyondNewline,
    NewlineRemoved,
}

fn calculate_newline_output_state_change(
    previous_text: &str,
    current_text: &str,
    previous_tag_count: usize,
    current_tag_count: usize,
) -> OutputStateChange {
    let previous = previous_text.as_bytes();
    let current = current_text.as_bytes();
    let newline_still_exists =
        current.len() >= previous.len() && !previous.is_empty() && current[previous.len() - 1] == b'\n';

    if previous_tag_count == current_tag_count && previous.len() == current.len() && newline_still_exists {
        return OutputStateChange::NoChange;
    }
    if !newline_still_exists {
        return OutputStateChange::NewlineRemoved;
    }
    if current_tag_count > previous_tag_count {
        return OutputStateChange::ExtendedBeyondNewline;
    }
    if current[previous.len()..].iter().any(|byte| *byte != b' ' && *byte != b'\t') {
        return OutputStateChange::ExtendedBeyondNewline;
    }
    OutputStateChange::NoChange
}

pub(super) fn object_at(program: &Program, at: ObjectRef) -> Option<Object> {
    match at {
        ObjectRef::Container(id) => Some(Object::Container(id)),
        ObjectRef::Leaf(..) => program.object(at).cloned(),
    }
}

// Continuing
impl Story {
    /// Evaluates the next line of content, returning its text.
    pub fn continue_story(&mut self) -> Result<String> {
        self.continue_validated(None)?;
        Ok(self.current_text())
    }

    /// Evaluates for at most `millisecs_limit` milliseconds, stopping early at the end of a line.
    ///
    /// Check [`async_continue_complete`](Self::async_continue_complete) to find out whether the line is done.
    /// A limit of zero or less evaluates the whole line.
    pub fn continue_async(&mut self, millisecs_limit: f32) -> Result<()> {
        let limit = (millisecs_limit > 0.0).then(|| Duration::from_secs_f32(millisecs_limit / 1000.0));
        self.continue_validated(limit)
    }

    /// Continues until the story reaches choices or its end, returning all the text.
    pub fn continue_maximally(&mut self) -> Result<String> {
        self.if_async_we_cant("continue_maximally")?;
        let mut text = String::new();
        while self.can_continue() {
            text.push_str(&self.continue_story()?);
        }
        Ok(text)
    }

    fn continue_validated(&mut self, limit: Option<Duration>) -> Result<()> {
        if !self.has_validated_externals {
            self.validate_external_bindings()?;
        }
        self.continue_internal(limit)
    }

    pub(super) fn continue_internal(&mut self, limit: Option<Duration>) -> Result<()> {
        let is_async_time_limited = limit.is_some();

        if !self.async_continue_active {
            if !self.can_continue() {
                return Err(StoryError::CannotContinue);
            }
            self.async_continue_active = is_async_time_limited;
            self.state.did_safe_exit = false;
            self.state.reset_output(None);
            self.state.variables.start_variable_observation();
        } else if !is_async_time_limited {
            self.async_continue_active = false;
        }

        let started = Instant::now();
        let mut output_stream_ends_in_newline = false;
        loop {
            match self.continue_single_step() {
                Ok(ends_in_newline) => output_stream_ends_in_newline = ends_in_newline,
                Err(err) => {
                    self.state.add_error(err.to_string(), false);
                    break;
                }
            }
            if output_stream_ends_in_newline {
                break;
            }
            if let (true, Some(limit)) = (self.async_continue_active, limit) {
                if started.elapsed() > limit {
                    break;
                }
            }
            if !self.can_continue() {
                break;
            }
        }

        if output_stream_ends_in_newline || !self.can_continue() {
            if self.state_snapshot.is_some() {
                self.restore_state_snapshot();
            }

            if !self.can_continue() {
                if self.state.call_stack.can_pop_thread() {
                    self.state.add_error(
                        "Thread available to pop, threads should always be flat by the end of evaluation?".to_owned(),
                        false,
                    );
                }
                if self.state.current_choices.is_empty() && !self.state.did_safe_exit {
                    let call_stack = &self.state.call_stack;
                    let message = if call_stack.can_pop_type(Some(PushPopType::Tunnel)) {
                        "unexpectedly reached end of content. Do you need a '->->' to return from a tunnel?"
                    } else if call_stack.can_pop_type(Some(PushPopType::Function)) {
                        "unexpectedly reached end of content. Do you need a '~ return'?"
                    } else if !call_stack.can_pop() {
                        "ran out of content. Do you need a '-> DONE' or '-> END'?"
                    } else {
                        "unexpectedly reached end of content for unknown reason. Please debug compiler!"
                    };
                    self.state.add_error(message.to_owned(), false);
                }
            }

            self.state.did_safe_exit = false;
            self.saw_lookahead_unsafe_function_after_newline = false;
            let changes = self.state.variables.complete_variable_observation(self.state.patch.as_ref());
            self.async_continue_active = false;
            self.notify_variable_observers(changes);
        }
        Ok(())
    }

    /// Takes one step, returning whether evaluation went too far and was rewound to the last newline.
    fn continue_single_step(&mut self) -> Result<bool> {
        self.step()?;

        if !self.can_continue() && !self.state.call_stack.element_is_evaluate_from_game() {
            self.try_follow_default_invisible_choice()?;
        }

        if !self.state.in_string_evaluation() {
            if let Some(snapshot) = &self.state_snapshot {
                let change = calculate_newline_output_state_change(
                    &snapshot.current_text(),
                    &self.state.current_text(),
                    snapshot.current_tags().len(),
                    self.state.current_tags().len(),
                );
                if change == OutputStateChange::ExtendedBeyondNewline || self.saw_lookahead_unsafe_function_after_newline {
                    self.restore_state_snapshot();
                    return Ok(true);
                }
                if change == OutputStateChange::NewlineRemoved {
                    self.discard_snapshot();
                }
            }

            if self.state.output_stream_ends_in_newline() {
                if self.can_continue() {
                    if self.state_snapshot.is_none() {
                        self.take_state_snapshot();
                    }
                } else {
                    self.discard_snapshot();
                }
            }
        }
        Ok(false)
    }
}

// Stepping
impl Story {
    fn step(&mut self) -> Result<()> {
        let program = Rc::clone(&self.program);
        let Some(mut pointer) = self.state.current_pointer() else {
            return Ok(());
        };

        while let Some(ObjectRef::Container(id)) = pointer.resolve(&program) {
            self.visit_container(id, true);
            if program.container(id).is_empty() {
                break;
            }
            pointer = Pointer::start_of(id);
        }
        self.state.set_current_pointer(Some(pointer));
        trace!(path = %pointer.path(&program), "step");

        let Some((at, obj)) = pointer
            .resolve(&program)
            .and_then(|at| object_at(&program, at).map(|obj| (at, obj)))
        else {
            return self.next_content();
        };

        let is_logic_or_flow_control = self.perform_logic_and_flow_control(&obj, at)?;
        if self.state.current_pointer().is_none() {
            return Ok(());
        }

        let starts_thread = obj.is_control_command(ControlCommand::StartThread);
        let mut should_add_to_stream = !is_logic_or_flow_control;
        match &obj {
            Object::ChoicePoint(choice_point) => {
                if let Some(choice) = self.process_choice(choice_point, at)? {
                    self.state.current_choices.push(choice);
                }
                should_add_to_stream = false;
            }
            Object::Container(..) => should_add_to_stream = false,
            _ => {}
        }

        if should_add_to_stream {
            let obj = match obj {
                Object::Value(Value::VariablePointer(name, VariableContext::Unknown)) => {
                    let context = self.state.call_stack.context_for_variable_named(&name);
                    Object::Value(Value::VariablePointer(name, context))
                }
                obj => obj,
            };
            if self.state.in_expression_evaluation() {
                self.state.push_evaluation_stack(obj);
            } else {
                self.state.push_to_output_stream(obj);
            }
        }

        self.next_content()?;

        if starts_thread {
            self.state.call_stack.push_thread();
        }
        Ok(())
    }

    pub(super) fn visit_container(&mut self, id: ContainerId, at_start: bool) {
        let container = self.program.container(id);
        if !container.counting_at_start_only || at_start {
            if container.visits_should_be_counted {
                self.state.increment_visit_count_for_container(id);
            }
            if container.turn_index_should_be_counted {
                self.state.record_turn_index_visit_to_container(id);
            }
        }
    }

    /// Counts visits to every container a divert or choice entered, and not just the innermost.
    pub(super) fn visit_changed_containers_due_to_divert(&mut self) {
        let program = Rc::clone(&self.program);
        let Some(pointer) = self.state.current_pointer() else {
            return;
        };
        if pointer.index.is_none() {
            return;
        }

        let mut previous_containers = vec![];
        if let Some(previous) = self.state.previous_pointer() {
            let mut ancestor = previous
                .resolve(&program)
                .and_then(ObjectRef::as_container)
                .or(Some(previous.container));
            while let Some(id) = ancestor {
                previous_containers.push(id);
                ancestor = program.container(id).parent;
            }
        }

        let Some(mut child) = pointer.resolve(&program) else {
            return;
        };
        let mut ancestor = program.parent_of(child);
        let mut all_children_entered_at_start = true;
        while let Some(id) = ancestor {
            let container = program.container(id);
            if previous_containers.contains(&id) && !container.counting_at_start_only {
                break;
            }
            let entering_at_start =
                !container.is_empty() && program.child_ref(id, 0) == Some(child) && all_children_entered_at_start;
            if !entering_at_start {
                all_children_entered_at_start = false;
            }
            self.visit_container(id, entering_at_start);
            child = ObjectRef::Container(id);
            ancestor = container.parent;
        }
    }

    fn next_content(&mut self) -> Result<()> {
        loop {
            let current = self.state.current_pointer();
            self.state.set_previous_pointer(current);

            if let Some(diverted) = self.state.diverted_pointer.take() {
                self.state.set_current_pointer(Some(diverted));
                self.visit_changed_containers_due_to_divert();
                if self.state.current_pointer().is_some() {
                    return Ok(());
                }
            }

            if self.increment_content_pointer() {
                return Ok(());
            }

            let did_pop = if self.state.call_stack.can_pop_type(Some(PushPopType::Function)) {
                self.state.pop_callstack(Some(PushPopType::Function))?;
                // A function that ran out of content without `~ return` leaves void behind.
                if self.state.in_expression_evaluation() {
                    self.state.push_evaluation_stack(Object::Void);
                }
                true
            } else if self.state.call_stack.can_pop_thread() {
                self.state.call_stack.pop_thread()?;
                true
            } else {
                self.state.try_exit_function_evaluation_from_game();
                false
            };

            if !did_pop || self.state.current_pointer().is_none() {
                return Ok(());
            }
        }
    }

    /// Moves to the next object, climbing out of containers that are done.
    fn increment_content_pointer(&mut self) -> bool {
        let Some(mut pointer) = self.state.current_pointer() else {
            return false;
        };
        let program = &self.program;

        let mut index = pointer.index.map_or(0, |index| index + 1);
        let mut successful = true;
        while index >= program.container(pointer.container).content().len() {
            successful = false;
            let Some(parent) = program.container(pointer.container).parent else {
                break;
            };
            let Some(index_in_parent) = program.container(parent).index_of(pointer.container) else {
                break;
            };
            pointer = Pointer::new(parent, Some(index_in_parent));
            index = index_in_parent + 1;
            successful = true;
        }

        let next = successful.then(|| Pointer::new(pointer.container, Some(index)));
        self.state.set_current_pointer(next);
        successful
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newline_state_changes() {
        use OutputStateChange::*;
        assert_eq!(calculate_newline_output_state_change("Hi\n", "Hi\n", 0, 0), NoChange);
        assert_eq!(calculate_newline_output_state_change("Hi\n", "Hi\n  ", 0, 0), NoChange);
        assert_eq!(calculate_newline_output_state_change("Hi\n", "Hi\nthere", 0, 0), ExtendedBeyondNewline);
        assert_eq!(calculate_newline_output_state_change("Hi\n", "Hi\n", 0, 1), ExtendedBeyondNewline);
        assert_eq!(calculate_newline_output_state_change("Hi\n", "Hi there", 0, 0), NewlineRemoved);
    }
}
