use indexmap::IndexMap;

use crate::error::{Result, StoryError};
use crate::schema::{Pointer, Program, PushPopType, Value, VariableContext};

/// One frame of a thread: the story root, a tunnel, or a function call.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Element {
    pub(crate) current_pointer: Option<Pointer>,
    pub(crate) in_expression_evaluation: bool,
    pub(crate) temporary_variables: IndexMap<String, Value>,
    pub(crate) push_type: PushPopType,

    /// Height of the evaluation stack when an externally called function was entered.
    pub(crate) evaluation_stack_height_when_pushed: usize,
    /// Length of the output stream at the call, used to trim whitespace the call produced.
    pub(crate) function_start_in_output_stream: Option<usize>,
}

impl Element {
    pub(crate) fn new(push_type: PushPopType, current_pointer: Option<Pointer>, in_expression_evaluation: bool) -> Self {
        Self {
            current_pointer,
            in_expression_evaluation,
            temporary_variables: IndexMap::new(),
            push_type,
            evaluation_stack_height_when_pushed: 0,
            function_start_in_output_stream: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Thread {
    pub(crate) callstack: Vec<Element>,
    pub(crate) thread_index: usize,
    /// The last object the thread resolved, used to tell which containers a divert entered.
    pub(crate) previous_pointer: Option<Pointer>,
}

impl Thread {
    pub(crate) fn new() -> Self {
        Self {
            callstack: vec![],
            thread_index: 0,
            previous_pointer: None,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct CallStack {
    pub(crate) threads: Vec<Thread>,
    pub(crate) thread_counter: usize,
    pub(crate) start_of_root: Pointer,
}

impl CallStack {
    pub(crate) fn new() -> Self {
        let mut call_stack = Self {
            threads: vec![],
            thread_counter: 0,
            start_of_root: Pointer::start_of(Program::ROOT),
        };
        call_stack.reset();
        call_stack
    }

    pub(crate) fn reset(&mut self) {
        let mut thread = Thread::new();
        thread.callstack.push(Element::new(PushPopType::Tunnel, Some(self.start_of_root), false));
        self.threads = vec![thread];
    }

    pub(crate) fn elements(&self) -> &[Element] {
        &self.current_thread().callstack
    }

    pub(crate) fn depth(&self) -> usize {
        self.elements().len()
    }

    pub(crate) fn current_thread(&self) -> &Thread {
        self.threads.last().unwrap_or_else(|| unreachable!("a call stack always has a thread"))
    }

    pub(crate) fn current_thread_mut(&mut self) -> &mut Thread {
        self.threads.last_mut().unwrap_or_else(|| unreachable!("a call stack always has a thread"))
    }

    /// Replaces every thread with `thread`. Choices are only taken once the threads are flat.
    pub(crate) fn set_current_thread(&mut self, thread: Thread) {
        self.threads = vec![thread];
    }

    pub(crate) fn current_element(&self) -> &Element {
        self.elements().last().unwrap_or_else(|| unreachable!("a thread always has its root element"))
    }

    pub(crate) fn current_element_mut(&mut self) -> &mut Element {
        self.current_thread_mut()
            .callstack
            .last_mut()
            .unwrap_or_else(|| unreachable!("a thread always has its root element"))
    }

    pub(crate) fn current_element_index(&self) -> usize {
        self.depth() - 1
    }

    pub(crate) fn can_pop(&self) -> bool {
        self.depth() > 1
    }

    pub(crate) fn can_pop_type(&self, push_type: Option<PushPopType>) -> bool {
        if !self.can_pop() {
            return false;
        }
        match push_type {
            None => true,
            Some(push_type) => self.current_element().push_type == push_type,
        }
    }

    pub(crate) fn element_is_evaluate_from_game(&self) -> bool {
        self.current_element().push_type == PushPopType::FunctionEvaluationFromGame
    }

    pub(crate) fn push(
        &mut self,
        push_type: PushPopType,
        external_evaluation_stack_height: usize,
        output_stream_length_with_pushed: usize,
    ) {
        let mut element = Element::new(push_type, self.current_element().current_pointer, false);
        element.evaluation_stack_height_when_pushed = external_evaluation_stack_height;
        element.function_start_in_output_stream = Some(output_stream_length_with_pushed);
        self.current_thread_mut().callstack.push(element);
    }

    pub(crate) fn pop(&mut self, push_type: Option<PushPopType>) -> Result<()> {
        if self.can_pop_type(push_type) {
            self.current_thread_mut().callstack.pop();
            return Ok(());
        }
        let found = push_type.unwrap_or(self.current_element().push_type);
        let expected = if self.can_pop() { Some(self.current_element().push_type) } else { None };
        Err(StoryError::MismatchedPop { expected, found })
    }

    pub(crate) fn push_thread(&mut self) {
        let mut thread = self.current_thread().clone();
        self.thread_counter += 1;
        thread.thread_index = self.thread_counter;
        self.threads.push(thread);
    }

    /// A copy of the current thread under a fresh index, without adding it to the stack.
    pub(crate) fn fork_thread(&mut self) -> Thread {
        let mut forked = self.current_thread().clone();
        self.thread_counter += 1;
        forked.thread_index = self.thread_counter;
        forked
    }

    pub(crate) fn can_pop_thread(&self) -> bool {
        self.threads.len() > 1 && !self.element_is_evaluate_from_game()
    }

    pub(crate) fn pop_thread(&mut self) -> Result<()> {
        if !self.can_pop_thread() {
            return Err(StoryError::runtime("Can't pop thread"));
        }
        self.threads.pop();
        Ok(())
    }

    pub(crate) fn thread_with_index(&self, index: usize) -> Option<&Thread> {
        self.threads.iter().find(|thread| thread.thread_index == index)
    }

    fn context_element(&self, context: VariableContext) -> Option<&Element> {
        match context {
            VariableContext::Temporary(index) => self.elements().get(index),
            _ => self.elements().last(),
        }
    }

    pub(crate) fn temporary_variable_with_name(&self, name: &str, context: VariableContext) -> Option<&Value> {
        self.context_element(context)?.temporary_variables.get(name)
    }

    pub(crate) fn set_temporary_variable(
        &mut self,
        name: &str,
        mut value: Value,
        declare_new: bool,
        context: VariableContext,
    ) -> Result<()> {
        let index = match context {
            VariableContext::Temporary(index) => index,
            _ => self.current_element_index(),
        };
        let element = self
            .current_thread_mut()
            .callstack
            .get_mut(index)
            .ok_or_else(|| StoryError::runtime(format!("Could not find temporary variable context for {}", name)))?;

        match element.temporary_variables.get(name) {
            None if !declare_new => {
                return Err(StoryError::runtime(format!("Could not find temporary variable to set: {}", name)));
            }
            Some(Value::List(old)) => {
                if let Value::List(list) = &mut value {
                    list.retain_origins_for_assignment(old);
                }
            }
            _ => {}
        }
        element.temporary_variables.insert(name.to_owned(), value);
        Ok(())
    }

    /// Where a variable named `name` lives from the current frame's point of view.
    pub(crate) fn context_for_variable_named(&self, name: &str) -> VariableContext {
        if self.current_element().temporary_variables.contains_key(name) {
            VariableContext::Temporary(self.current_element_index())
        } else {
            VariableContext::Global
        }
    }

    pub(crate) fn call_stack_trace(&self, program: &Program) -> String {
        let mut trace = String::new();
        for (t, thread) in self.threads.iter().enumerate() {
            let is_current = t == self.threads.len() - 1;
            trace.push_str(&format!(
                "=== THREAD {}/{} {}===\n",
                t + 1,
                self.threads.len(),
                if is_current { "(current) " } else { "" },
            ));
            for element in &thread.callstack {
                let kind = match element.push_type {
                    PushPopType::Function => "  [FUNCTION] ",
                    _ => "  [TUNNEL] ",
                };
                trace.push_str(kind);
                if let Some(pointer) = element.current_pointer {
                    trace.push_str(&format!("<SOMEWHERE IN {}>\n", program.container(pointer.container).path()));
                } else {
                    trace.push('\n');
                }
            }
        }
        trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_stack() -> CallStack {
        CallStack::new()
    }

    #[test]
    fn root_element_is_never_popped() {
        let mut stack = call_stack();
        assert!(!stack.can_pop());
        let err = stack.pop(Some(PushPopType::Tunnel)).unwrap_err();
        assert_eq!(err, StoryError::MismatchedPop { expected: None, found: PushPopType::Tunnel });
        assert_eq!(err.to_string(), "Found tunnel onwards statement (->->), when expected end of flow (-> END or choice)");
    }

    #[test]
    fn pop_requires_matching_type() {
        let mut stack = call_stack();
        stack.push(PushPopType::Function, 0, 0);
        let err = stack.pop(Some(PushPopType::Tunnel)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Found tunnel onwards statement (->->), when expected function return statement (~ return)",
        );
        assert!(stack.pop(Some(PushPopType::Function)).is_ok());
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn push_keeps_pointer_and_leaves_expression() {
        let mut stack = call_stack();
        stack.current_element_mut().in_expression_evaluation = true;
        stack.push(PushPopType::Tunnel, 0, 3);
        let element = stack.current_element();
        assert_eq!(element.current_pointer, Some(Pointer::start_of(Program::ROOT)));
        assert!(!element.in_expression_evaluation);
        assert_eq!(element.function_start_in_output_stream, Some(3));
    }

    #[test]
    fn forking_does_not_change_threads() {
        let mut stack = call_stack();
        let forked = stack.fork_thread();
        assert_eq!(forked.thread_index, 1);
        assert_eq!(stack.threads.len(), 1);
        stack.push_thread();
        assert_eq!(stack.current_thread().thread_index, 2);
        assert!(stack.can_pop_thread());
        stack.pop_thread().unwrap();
        assert!(stack.pop_thread().is_err());
    }

    #[test]
    fn temporaries_are_per_frame() {
        let mut stack = call_stack();
        stack.set_temporary_variable("x", Value::Int(1), true, VariableContext::Unknown).unwrap();
        stack.push(PushPopType::Function, 0, 0);
        assert_eq!(stack.context_for_variable_named("x"), VariableContext::Global);
        assert!(stack.set_temporary_variable("x", Value::Int(2), false, VariableContext::Unknown).is_err());
        assert_eq!(
            stack.temporary_variable_with_name("x", VariableContext::Temporary(0)),
            Some(&Value::Int(1)),
        );
    }
}
