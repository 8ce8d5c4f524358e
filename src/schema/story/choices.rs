use tracing::debug;

use super::Story;
use crate::error::{Result, StoryError};
use crate::schema::{Choice, ChoicePoint, Object, ObjectRef, Path, PushPopType, Value};

// Choices
impl Story {
    /// Generates the choice for `choice_point`, or `None` if it should not be offered.
    ///
    /// The condition and text of the choice were pushed onto the evaluation
    /// stack by the content before the choice point, and are popped here
    /// whether or not the choice ends up shown.
    pub(super) fn process_choice(&mut self, choice_point: &ChoicePoint, at: ObjectRef) -> Result<Option<Choice>> {
        let mut show_choice = true;
        if choice_point.has_condition {
            let condition = self.state.pop_value()?;
            if !condition.is_truthy()? {
                show_choice = false;
            }
        }

        let mut start_text = String::new();
        let mut choice_only_text = String::new();
        let mut tags = vec![];
        if choice_point.has_choice_only_content {
            choice_only_text = self.pop_choice_string_and_tags(&mut tags)?;
        }
        if choice_point.has_start_content {
            start_text = self.pop_choice_string_and_tags(&mut tags)?;
        }

        if choice_point.once_only {
            let target = self.program.resolve_path(at, &choice_point.path_on_choice).container();
            if let Some(target) = target {
                if self.state.visit_count_for_container(target)? > 0 {
                    show_choice = false;
                }
            }
        }

        if !show_choice {
            return Ok(None);
        }

        let text = start_text + &choice_only_text;
        let index = self
            .state
            .current_choices
            .iter()
            .filter(|choice| !choice.is_invisible_default)
            .count();
        Ok(Some(Choice {
            text: text.trim_matches(|ch: char| ch == ' ' || ch == '\t').to_owned(),
            source_path: self.program.path_of(at).to_string(),
            target_path: self.program.globalise_path(at, &choice_point.path_on_choice),
            is_invisible_default: choice_point.is_invisible_default,
            tags,
            index,
            thread_at_generation: self.state.call_stack.fork_thread(),
        }))
    }

    /// Pops a string off the evaluation stack, along with the tags beneath it.
    ///
    /// Tags are added to the front of `tags`, so that the tags of the start
    /// content come before those of the choice-only content.
    fn pop_choice_string_and_tags(&mut self, tags: &mut Vec<String>) -> Result<String> {
        let text = match self.state.pop_value()? {
            Value::String(text) => text,
            other => story_bail!("Expected choice text to be a string, found {}", other),
        };

        let mut popped_tags = vec![];
        while let Some(Object::Tag(..)) = self.state.peek_evaluation_stack() {
            if let Object::Tag(tag) = self.state.pop_evaluation_stack()? {
                popped_tags.push(tag.text().to_owned());
            }
        }
        popped_tags.reverse();
        tags.splice(0..0, popped_tags);
        Ok(text)
    }

    /// Takes the invisible default choice, if that is the only kind of choice there is.
    ///
    /// Returns whether a choice was taken.
    pub(super) fn try_follow_default_invisible_choice(&mut self) -> Result<bool> {
        let choices = &self.state.current_choices;
        if choices.is_empty() || choices.iter().any(|choice| !choice.is_invisible_default) {
            return Ok(false);
        }

        let choice = self.state.current_choices[0].clone();
        self.state.call_stack.set_current_thread(choice.thread_at_generation);

        // The thread is still referenced by the snapshot, so work on a copy of it.
        if self.state_snapshot.is_some() {
            let forked = self.state.call_stack.fork_thread();
            self.state.call_stack.set_current_thread(forked);
        }

        self.choose_path(&choice.target_path, false)?;
        Ok(true)
    }

    pub(super) fn choose_path(&mut self, path: &Path, incrementing_turn_index: bool) -> Result<()> {
        self.state.set_chosen_path(path, incrementing_turn_index)?;
        self.visit_changed_containers_due_to_divert();
        Ok(())
    }

    /// Chooses one of the current choices, by its position in [`current_choices`](Self::current_choices).
    pub fn choose_choice_index(&mut self, index: usize) -> Result<()> {
        let visible = self.state.current_choices();
        let Some(choice) = visible.get(index) else {
            return Err(StoryError::ChoiceOutOfRange { index, count: visible.len() });
        };
        let thread = choice.thread_at_generation.clone();
        let target = choice.target_path.clone();
        debug!(index, text = choice.text.as_str(), "choosing choice");

        // Continue from the thread the choice was generated in.
        self.state.call_stack.set_current_thread(thread);
        self.choose_path(&target, true)
    }

    /// Moves the story to the knot, stitch or label at `path`.
    ///
    /// With `reset_callstack`, the current flow is abandoned first. Without it,
    /// the call stack is kept and the story will return to it when the content
    /// at `path` reaches its end. `args` are passed to the knot as parameters.
    pub fn choose_path_string(&mut self, path: &str, reset_callstack: bool, args: &[Value]) -> Result<()> {
        self.if_async_we_cant("call choose_path_string right now")?;

        if reset_callstack {
            self.state.force_end();
        } else {
            let element = self.state.call_stack.current_element();
            if element.push_type == PushPopType::Function {
                let function = element
                    .current_pointer
                    .map(|pointer| self.program.container(pointer.container).path().to_string())
                    .unwrap_or_default();
                return Err(StoryError::runtime(format!(
                    "Story was running a function ({}) when you called choose_path_string({}) - this is almost certainly not not what you want! Full stack trace: \n{}",
                    function,
                    path,
                    self.state.call_stack.call_stack_trace(&self.program),
                )));
            }
        }

        self.state.pass_arguments_to_evaluation_stack(args)?;
        debug!(path, "choosing path");
        self.choose_path(&Path::from(path), true)
    }
}
