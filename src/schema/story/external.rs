use indexmap::IndexSet;
use tracing::{debug, warn};

use super::Story;
use crate::error::{Result, StoryError};
use crate::schema::external_function::registered;
use crate::schema::{DivertTarget, ExternalBinding, Object, Pointer, PushPopType, Value};

// External functions
impl Story {
    /// Makes `function` callable from ink as the `EXTERNAL` function `name`.
    ///
    /// Functions that are not `lookahead_safe` are never called while the
    /// engine is looking ahead past a newline; evaluation stops at the newline
    /// instead, and the function is called when the story continues.
    pub fn bind_external_function<F>(&mut self, name: &str, function: F, lookahead_safe: bool) -> Result<()>
    where
        F: FnMut(&[Value]) -> std::result::Result<Option<Value>, String> + 'static,
    {
        self.if_async_we_cant("bind an external function")?;
        if self.externals.contains_key(name) {
            return Err(StoryError::ExternalAlreadyBound(name.to_owned()));
        }
        self.externals.insert(
            name.to_owned(),
            ExternalBinding { function: Box::new(function), lookahead_safe },
        );
        debug!(name, "bound external function");
        Ok(())
    }

    pub fn unbind_external_function(&mut self, name: &str) -> Result<()> {
        self.if_async_we_cant("unbind an external a function")?;
        if self.externals.remove(name).is_none() {
            return Err(StoryError::InvalidArgument(format!("Function '{}' has not been bound.", name)));
        }
        Ok(())
    }

    /// Binds every function declared with [`ink_external!`](crate::ink_external).
    ///
    /// Names that are already bound keep their existing binding.
    pub fn bind_registered_externals(&mut self) -> Result<()> {
        self.if_async_we_cant("bind an external function")?;
        for external in registered() {
            if self.externals.contains_key(external.name) {
                debug!(name = external.name, "registered external already bound");
                continue;
            }
            let handler = external.handler;
            self.externals.insert(
                external.name.to_owned(),
                ExternalBinding {
                    function: Box::new(handler),
                    lookahead_safe: external.lookahead_safe,
                },
            );
        }
        Ok(())
    }

    /// Checks that every external the story calls is either bound or has an ink fallback.
    pub fn validate_external_bindings(&mut self) -> Result<()> {
        let fallbacks = self.config.allow_external_function_fallbacks;
        let root = self.program.root();
        let mut missing = IndexSet::new();
        for container in self.program.containers() {
            for obj in container.content() {
                let Object::Divert(divert) = obj else {
                    continue;
                };
                let DivertTarget::External { name, .. } = &divert.target else {
                    continue;
                };
                if self.externals.contains_key(name) {
                    continue;
                }
                if fallbacks && root.named_content.contains_key(name) {
                    continue;
                }
                missing.insert(name.as_str());
            }
        }

        if !missing.is_empty() {
            let names: Vec<&str> = missing.into_iter().collect();
            let message = format!(
                "ERROR: Missing function binding for external{}: '{}' {}",
                if names.len() > 1 { "s" } else { "" },
                names.join("', '"),
                if fallbacks { ", and no fallback ink function found." } else { " (ink fallbacks disabled)" },
            );
            warn!("{}", message);
            return Err(StoryError::Runtime(message));
        }
        self.has_validated_externals = true;
        Ok(())
    }

    pub(super) fn call_external_function(&mut self, name: &str, number_of_arguments: usize) -> Result<()> {
        let Some(binding) = self.externals.get(name) else {
            if !self.config.allow_external_function_fallbacks {
                story_bail!(
                    "Trying to call EXTERNAL function '{}' which has not been bound (and ink fallbacks disabled).",
                    name,
                );
            }
            let Some(fallback) = self.program.knot_container_with_name(name) else {
                story_bail!(
                    "Trying to call EXTERNAL function '{}' which has not been bound, and fallback ink function could not be found.",
                    name,
                );
            };
            debug!(name, "calling ink fallback for external function");
            let output_length = self.state.output_stream.len();
            self.state.call_stack.push(PushPopType::Function, 0, output_length);
            self.state.diverted_pointer = Some(Pointer::start_of(fallback));
            return Ok(());
        };

        // Wait for the lookahead to be rewound, then call the function for real.
        if !binding.lookahead_safe && self.state_snapshot.is_some() {
            self.saw_lookahead_unsafe_function_after_newline = true;
            return Ok(());
        }

        let mut arguments = Vec::with_capacity(number_of_arguments);
        for obj in self.state.pop_evaluation_stack_n(number_of_arguments)? {
            match obj {
                Object::Value(value) => arguments.push(value),
                other => story_bail!("Expected a value as an argument to '{}', found {:?}", name, other),
            }
        }

        let binding = self
            .externals
            .get_mut(name)
            .ok_or_else(|| StoryError::FunctionNotFound(name.to_owned()))?;
        let result = (binding.function)(&arguments).map_err(StoryError::Runtime)?;
        self.state.push_evaluation_stack(result.map_or(Object::Void, Object::Value));
        Ok(())
    }

    /// Runs the ink function `name` to completion, returning its result and the text it output.
    ///
    /// The story's own output is left as it was before the call.
    pub fn evaluate_function(&mut self, name: &str, args: &[Value]) -> Result<(Option<Value>, String)> {
        self.if_async_we_cant("evaluate a function")?;
        if name.trim().is_empty() {
            return Err(StoryError::InvalidArgument("Function is empty or white space.".to_owned()));
        }
        let Some(function) = self.program.knot_container_with_name(name) else {
            return Err(StoryError::FunctionNotFound(name.to_owned()));
        };

        let output_before = self.state.output_stream.clone();
        self.state.reset_output(None);
        self.state.start_function_evaluation_from_game(function, args)?;

        let mut text = String::new();
        while self.can_continue() {
            text.push_str(&self.continue_story()?);
        }

        self.state.reset_output(Some(output_before));
        let result = self.state.complete_function_evaluation_from_game()?;
        Ok((result, text))
    }
}
