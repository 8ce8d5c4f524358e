use super::StoryState;
use crate::schema::{ControlCommand, Object, PushPopType, Value};

/// Removes inline whitespace at the start and end of every line, and
/// collapses each inner run of spaces and tabs into a single space.
pub(crate) fn clean_output_whitespace(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut whitespace_start: Option<usize> = None;
    let mut start_of_line = 0;

    for (i, ch) in text.char_indices() {
        let is_inline_whitespace = ch == ' ' || ch == '\t';
        if is_inline_whitespace {
            whitespace_start.get_or_insert(i);
            continue;
        }
        if let Some(start) = whitespace_start.take() {
            if ch != '\n' && start > 0 && start != start_of_line {
                cleaned.push(' ');
            }
        }
        if ch == '\n' {
            start_of_line = i + 1;
        }
        cleaned.push(ch);
    }
    cleaned
}

/// Splits newlines, and the inline whitespace around them, off both ends of `text`.
///
/// Runs of newlines at either end become a single newline. Spaces outside
/// the newlines are kept. Returns `None` when there is nothing to split.
fn try_splitting_head_tail_whitespace(text: &str) -> Option<Vec<String>> {
    let bytes = text.as_bytes();

    let mut head_first_newline = None;
    let mut head_last_newline = None;
    for (i, byte) in bytes.iter().enumerate() {
        match byte {
            b'\n' => {
                head_first_newline.get_or_insert(i);
                head_last_newline = Some(i);
            }
            b' ' | b'\t' => continue,
            _ => break,
        }
    }

    let mut tail_last_newline = None;
    let mut tail_first_newline = None;
    for (i, byte) in bytes.iter().enumerate().rev() {
        match byte {
            b'\n' => {
                tail_last_newline.get_or_insert(i);
                tail_first_newline = Some(i);
            }
            b' ' | b'\t' => continue,
            _ => break,
        }
    }

    if head_first_newline.is_none() && tail_last_newline.is_none() {
        return None;
    }

    let mut parts = vec![];
    let mut inner_start = 0;
    let mut inner_end = text.len();

    if let (Some(first), Some(last)) = (head_first_newline, head_last_newline) {
        if first > 0 {
            parts.push(text[..first].to_owned());
        }
        parts.push("\n".to_owned());
        inner_start = last + 1;
    }
    if let Some(first) = tail_first_newline {
        inner_end = first;
    }
    if inner_end > inner_start {
        parts.push(text[inner_start..inner_end].to_owned());
    }
    if let (Some(last), Some(first)) = (tail_last_newline, tail_first_newline) {
        if head_last_newline.map_or(true, |head_last| first > head_last) {
            parts.push("\n".to_owned());
            if last < text.len() - 1 {
                parts.push(text[last + 1..].to_owned());
            }
        }
    }
    Some(parts)
}

impl StoryState {
    pub(crate) fn push_to_output_stream(&mut self, obj: Object) {
        if let Some(text) = obj.as_text() {
            if let Some(parts) = try_splitting_head_tail_whitespace(text) {
                for part in parts {
                    self.push_to_output_stream_individual(Object::string(part));
                }
                return;
            }
        }
        self.push_to_output_stream_individual(obj);
    }

    fn push_to_output_stream_individual(&mut self, obj: Object) {
        let mut include_in_output = true;

        if let Object::Glue = obj {
            self.trim_newlines_from_output_stream();
        } else if obj.as_text().is_some() {
            let current = self.call_stack.current_element();
            let mut function_trim_index = match current.push_type {
                PushPopType::Function => current.function_start_in_output_stream,
                _ => None,
            };

            let mut glue_trim_index = None;
            for (i, item) in self.output_stream.iter().enumerate().rev() {
                if let Object::Glue = item {
                    glue_trim_index = Some(i);
                    break;
                }
                if item.is_control_command(ControlCommand::BeginString) {
                    // Don't function-trim past the start of a string being built.
                    if function_trim_index.map_or(true, |index| i >= index) {
                        function_trim_index = None;
                    }
                    break;
                }
            }

            let trim_index = match (glue_trim_index, function_trim_index) {
                (Some(glue), Some(function)) => Some(glue.min(function)),
                (glue, function) => glue.or(function),
            };

            if trim_index.is_some() {
                if obj.is_newline() {
                    include_in_output = false;
                } else if obj.is_non_whitespace() {
                    if glue_trim_index.is_some() {
                        self.remove_existing_glue();
                    }
                    // Visible text arrived, so the enclosing function calls stop trimming.
                    if function_trim_index.is_some() {
                        let callstack = &mut self.call_stack.current_thread_mut().callstack;
                        for element in callstack.iter_mut().rev() {
                            if element.push_type != PushPopType::Function {
                                break;
                            }
                            element.function_start_in_output_stream = None;
                        }
                    }
                }
            } else if obj.is_newline() && (self.output_stream_ends_in_newline() || !self.output_stream_contains_content()) {
                include_in_output = false;
            }
        }

        if include_in_output {
            self.output_stream.push(obj);
            self.output_stream_dirty();
        }
    }

    /// Drops the trailing run of whitespace that contains a newline.
    fn trim_newlines_from_output_stream(&mut self) {
        let mut remove_whitespace_from = None;
        for (i, item) in self.output_stream.iter().enumerate().rev() {
            if let Object::ControlCommand(..) = item {
                break;
            }
            if item.is_non_whitespace() {
                break;
            }
            if item.is_newline() {
                remove_whitespace_from = Some(i);
            }
        }

        if let Some(from) = remove_whitespace_from {
            let mut index = 0;
            self.output_stream.retain(|item| {
                let keep = index < from || item.as_text().is_none();
                index += 1;
                keep
            });
            self.output_stream_dirty();
        }
    }

    fn remove_existing_glue(&mut self) {
        let mut i = self.output_stream.len();
        while i > 0 {
            i -= 1;
            match self.output_stream[i] {
                Object::Glue => {
                    self.output_stream.remove(i);
                    self.output_stream_dirty();
                }
                Object::ControlCommand(..) => break,
                _ => {}
            }
        }
    }

    pub(crate) fn output_stream_ends_in_newline(&self) -> bool {
        for item in self.output_stream.iter().rev() {
            if let Object::ControlCommand(..) = item {
                break;
            }
            if item.is_newline() {
                return true;
            }
            if item.is_non_whitespace() {
                break;
            }
        }
        false
    }

    pub(crate) fn output_stream_contains_content(&self) -> bool {
        self.output_stream.iter().any(|item| item.as_text().is_some())
    }

    pub(crate) fn in_string_evaluation(&self) -> bool {
        self.output_stream
            .iter()
            .rev()
            .any(|item| item.is_control_command(ControlCommand::BeginString))
    }

    /// Removes the last `count` objects of the output stream.
    pub(crate) fn pop_from_output_stream(&mut self, count: usize) {
        let keep = self.output_stream.len().saturating_sub(count);
        self.output_stream.truncate(keep);
        self.output_stream_dirty();
    }

    pub(crate) fn reset_output(&mut self, objs: Option<Vec<Object>>) {
        self.output_stream = objs.unwrap_or_default();
        self.output_stream_dirty();
    }

    /// Trims trailing whitespace produced by the function call that is about to return.
    pub(crate) fn trim_whitespace_from_function_end(&mut self) {
        let start = self.call_stack.current_element().function_start_in_output_stream.unwrap_or(0);
        let mut i = self.output_stream.len();
        while i > start {
            i -= 1;
            let item = &self.output_stream[i];
            if item.as_text().is_none() {
                continue;
            }
            if item.is_newline() || item.is_inline_whitespace() {
                self.output_stream.remove(i);
                self.output_stream_dirty();
            } else {
                break;
            }
        }
    }

    fn output_stream_dirty(&mut self) {
        self.output_text.get_mut().take();
        self.output_tags.get_mut().take();
    }

    /// The text of the output stream, excluding tags, with whitespace cleaned.
    pub fn current_text(&self) -> String {
        self.output_text
            .borrow_mut()
            .get_or_insert_with(|| self.build_current_text())
            .clone()
    }

    fn build_current_text(&self) -> String {
        let mut text = String::new();
        let mut in_tag = false;
        for item in &self.output_stream {
            match item {
                Object::Value(Value::String(string)) if !in_tag => text.push_str(string),
                Object::ControlCommand(ControlCommand::BeginTag) => in_tag = true,
                Object::ControlCommand(ControlCommand::EndTag) => in_tag = false,
                _ => {}
            }
        }
        clean_output_whitespace(&text)
    }

    pub fn current_tags(&self) -> Vec<String> {
        self.output_tags
            .borrow_mut()
            .get_or_insert_with(|| self.build_current_tags())
            .clone()
    }

    fn build_current_tags(&self) -> Vec<String> {
        let mut tags = vec![];
        let mut in_tag = false;
        let mut tag_text = String::new();

        let flush = |tag_text: &mut String, tags: &mut Vec<String>| {
            if !tag_text.is_empty() {
                tags.push(clean_output_whitespace(tag_text));
                tag_text.clear();
            }
        };

        for item in &self.output_stream {
            match item {
                Object::ControlCommand(ControlCommand::BeginTag) => {
                    if in_tag {
                        flush(&mut tag_text, &mut tags);
                    }
                    in_tag = true;
                }
                Object::ControlCommand(ControlCommand::EndTag) => {
                    flush(&mut tag_text, &mut tags);
                    in_tag = false;
                }
                Object::Value(Value::String(string)) if in_tag => tag_text.push_str(string),
                Object::Tag(tag) if !in_tag && !tag.text().is_empty() => tags.push(tag.text().to_owned()),
                _ => {}
            }
        }
        flush(&mut tag_text, &mut tags);
        tags
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::config::StoryConfig;
    use crate::schema::{Container, Program};

    fn state() -> StoryState {
        let mut program = Program::default();
        let root = program.reserve();
        program.fill(root, Container::default());
        program.link();
        StoryState::new(Rc::new(program), &StoryConfig { story_seed: Some(1), ..StoryConfig::default() })
    }

    #[test]
    fn text_and_tags_follow_the_output_stream() {
        let mut state = state();
        state.push_to_output_stream(Object::string("Hello"));
        assert_eq!(state.current_text(), "Hello");

        state.push_to_output_stream(Object::string(" world"));
        assert_eq!(state.current_text(), "Hello world");
        assert!(state.current_tags().is_empty());

        state.push_to_output_stream(Object::ControlCommand(ControlCommand::BeginTag));
        state.push_to_output_stream(Object::string("loud"));
        state.push_to_output_stream(Object::ControlCommand(ControlCommand::EndTag));
        assert_eq!(state.current_text(), "Hello world");
        assert_eq!(state.current_tags(), ["loud"]);

        state.pop_from_output_stream(4);
        assert_eq!(state.current_text(), "Hello");
        assert!(state.current_tags().is_empty());

        state.reset_output(None);
        assert_eq!(state.current_text(), "");
    }

    #[test]
    fn cleans_inline_whitespace() {
        assert_eq!(clean_output_whitespace("  Hello   world \n  next\t line  "), "Hello world\nnext line");
        assert_eq!(clean_output_whitespace("a \n b"), "a\nb");
    }

    #[test]
    fn splits_newlines_off_both_ends() {
        assert_eq!(try_splitting_head_tail_whitespace("plain"), None);
        assert_eq!(
            try_splitting_head_tail_whitespace("  \n\n text \n  "),
            Some(vec!["  ".to_string(), "\n".into(), " text ".into(), "\n".into(), "  ".into()]),
        );
        assert_eq!(try_splitting_head_tail_whitespace("\n"), Some(vec!["\n".to_string()]));
    }
}
