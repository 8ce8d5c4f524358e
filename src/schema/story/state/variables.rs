use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use super::patch::StatePatch;
use crate::error::{Result, StoryError};
use crate::schema::story::CallStack;
use crate::schema::{ListDefinitions, Value, VariableAssignment, VariableContext};

/// Global variables, plus lookup and assignment across globals and temporaries.
///
/// The canonical maps are shared with any snapshot of the state; while a
/// patch is active every write goes to the patch instead.
#[derive(Clone, Debug, Default)]
pub(crate) struct VariablesState {
    pub(crate) globals: Rc<IndexMap<String, Value>>,
    /// Globals as they were right after the story's declarations ran.
    pub(crate) default_globals: Option<Rc<IndexMap<String, Value>>>,
    /// Names of globals changed during the current batch, while one is active.
    batch: Option<IndexSet<String>>,
    /// Globals changed outside of any batch, waiting to be reported to observers.
    unbatched_changes: Vec<String>,
    list_definitions: Rc<ListDefinitions>,
}

impl VariablesState {
    pub(crate) fn new(list_definitions: Rc<ListDefinitions>) -> Self {
        Self {
            list_definitions,
            ..Self::default()
        }
    }

    pub(crate) fn global_variable_exists_with_name(&self, name: &str) -> bool {
        self.globals.contains_key(name)
            || self.default_globals.as_ref().map_or(false, |defaults| defaults.contains_key(name))
    }

    pub(crate) fn default_global(&self, name: &str) -> Option<&Value> {
        self.default_globals.as_ref()?.get(name)
    }

    /// The current value of a global, as seen by the host.
    pub(crate) fn global(&self, name: &str, patch: Option<&StatePatch>) -> Option<Value> {
        patch
            .and_then(|patch| patch.try_get_global(name))
            .or_else(|| self.globals.get(name))
            .or_else(|| self.default_global(name))
            .cloned()
    }

    /// Sets a declared global from the host.
    pub(crate) fn set_declared_global(&mut self, name: &str, value: Value, patch: Option<&mut StatePatch>) -> Result<()> {
        if self.default_global(name).is_none() {
            return Err(StoryError::UndeclaredVariable(name.to_owned()));
        }
        self.set_global(name.to_owned(), value, patch);
        Ok(())
    }

    pub(crate) fn get_raw_variable_with_name(
        &self,
        name: &str,
        context: VariableContext,
        call_stack: &CallStack,
        patch: Option<&StatePatch>,
    ) -> Option<Value> {
        if let VariableContext::Global | VariableContext::Unknown = context {
            if let Some(value) = self.global(name, patch) {
                return Some(value);
            }
            if let Some(list) = self.list_definitions.find_single_item_list_with_name(name) {
                return Some(Value::List(list));
            }
            if context == VariableContext::Global {
                return None;
            }
        }
        call_stack.temporary_variable_with_name(name, context).cloned()
    }

    /// Looks a variable up, following a variable pointer to its target.
    pub(crate) fn get_variable_with_name(
        &self,
        name: &str,
        context: VariableContext,
        call_stack: &CallStack,
        patch: Option<&StatePatch>,
    ) -> Option<Value> {
        match self.get_raw_variable_with_name(name, context, call_stack, patch)? {
            Value::VariablePointer(target, target_context) => {
                self.get_variable_with_name(&target, target_context, call_stack, patch)
            }
            value => Some(value),
        }
    }

    pub(crate) fn assign(
        &mut self,
        assignment: &VariableAssignment,
        mut value: Value,
        call_stack: &mut CallStack,
        patch: Option<&mut StatePatch>,
    ) -> Result<()> {
        let mut name = assignment.variable_name.clone();
        let mut context = VariableContext::Unknown;
        let mut set_global = if assignment.is_new_declaration {
            assignment.is_global
        } else {
            self.global_variable_exists_with_name(&name)
        };

        if assignment.is_new_declaration {
            if let Value::VariablePointer(target, target_context) = &value {
                let resolved = self.resolve_variable_pointer(target, *target_context, call_stack, patch.as_deref());
                value = resolved;
            }
        } else {
            // Writing through a reference parameter lands on the variable it refers to.
            while let Some(Value::VariablePointer(target, target_context)) =
                self.get_raw_variable_with_name(&name, context, call_stack, patch.as_deref())
            {
                name = target;
                context = target_context;
                set_global = context == VariableContext::Global;
            }
        }

        if set_global {
            self.set_global(name, value, patch);
            Ok(())
        } else {
            call_stack.set_temporary_variable(&name, value, assignment.is_new_declaration, context)
        }
    }

    pub(crate) fn set_global(&mut self, name: String, mut value: Value, patch: Option<&mut StatePatch>) {
        let old_value = patch
            .as_deref()
            .and_then(|patch| patch.try_get_global(&name))
            .or_else(|| self.globals.get(&name))
            .cloned();

        if let (Some(Value::List(old)), Value::List(new)) = (&old_value, &mut value) {
            new.retain_origins_for_assignment(old);
        }

        // Only changes to a variable that already had a value are reported.
        let notify = old_value.is_some();
        match patch {
            Some(patch) => {
                patch.set_global(name.clone(), value);
                if notify && self.batch.is_some() {
                    patch.add_changed_variable(name);
                    return;
                }
            }
            None => {
                Rc::make_mut(&mut self.globals).insert(name.clone(), value);
                if let Some(batch) = &mut self.batch {
                    if notify {
                        batch.insert(name);
                    }
                    return;
                }
            }
        }
        if notify {
            self.unbatched_changes.push(name);
        }
    }

    /// Pins a pointer to the exact variable it names, collapsing a pointer to a pointer.
    fn resolve_variable_pointer(
        &self,
        name: &str,
        context: VariableContext,
        call_stack: &CallStack,
        patch: Option<&StatePatch>,
    ) -> Value {
        let context = match context {
            VariableContext::Unknown => self.context_of_variable_named(name, call_stack),
            context => context,
        };
        match self.get_raw_variable_with_name(name, context, call_stack, patch) {
            Some(pointer @ Value::VariablePointer(..)) => pointer,
            _ => Value::VariablePointer(name.to_owned(), context),
        }
    }

    fn context_of_variable_named(&self, name: &str, call_stack: &CallStack) -> VariableContext {
        if self.global_variable_exists_with_name(name) {
            VariableContext::Global
        } else {
            VariableContext::Temporary(call_stack.current_element_index())
        }
    }

    pub(crate) fn snapshot_default_globals(&mut self) {
        self.default_globals = Some(Rc::clone(&self.globals));
    }

    /// Replaces the globals with saved values, falling back to defaults for any the save lacks.
    pub(crate) fn load_globals(&mut self, mut saved: IndexMap<String, Value>) {
        let globals = match &self.default_globals {
            Some(defaults) => defaults
                .iter()
                .map(|(name, default)| {
                    let value = saved.shift_remove(name).unwrap_or_else(|| default.clone());
                    (name.clone(), value)
                })
                .collect(),
            None => saved,
        };
        self.globals = Rc::new(globals);
    }

    /// Globals worth saving, patched values included: all of them, or only those that differ from their defaults.
    pub(crate) fn globals_to_save<'a>(
        &'a self,
        save_default_globals: bool,
        patch: Option<&'a StatePatch>,
    ) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
        self.globals
            .iter()
            .map(move |(name, value)| (name, patch.and_then(|patch| patch.try_get_global(name)).unwrap_or(value)))
            .filter(move |(name, value)| save_default_globals || self.default_global(name) != Some(*value))
    }

    pub(crate) fn apply_patch(&mut self, patch: &StatePatch) {
        if !patch.globals.is_empty() {
            let globals = Rc::make_mut(&mut self.globals);
            for (name, value) in &patch.globals {
                globals.insert(name.clone(), value.clone());
            }
        }
        if let Some(batch) = &mut self.batch {
            batch.extend(patch.changed_variables.iter().cloned());
        }
    }

    pub(crate) fn start_variable_observation(&mut self) {
        self.batch = Some(IndexSet::new());
    }

    pub(crate) fn is_batch_observing(&self) -> bool {
        self.batch.is_some()
    }

    /// Ends the batch, returning each changed global with its current value once.
    pub(crate) fn complete_variable_observation(&mut self, patch: Option<&StatePatch>) -> Vec<(String, Value)> {
        let mut changed: IndexMap<String, Value> = IndexMap::new();
        for name in self.batch.take().unwrap_or_default() {
            if let Some(value) = self.globals.get(&name) {
                changed.insert(name, value.clone());
            }
        }
        if let Some(patch) = patch {
            for name in &patch.changed_variables {
                if let Some(value) = patch.try_get_global(name) {
                    changed.insert(name.clone(), value.clone());
                }
            }
        }
        changed.into_iter().collect()
    }

    /// Changes made outside of a batch since the last call, with their current values.
    pub(crate) fn take_unbatched_changes(&mut self, patch: Option<&StatePatch>) -> Vec<(String, Value)> {
        std::mem::take(&mut self.unbatched_changes)
            .into_iter()
            .filter_map(|name| self.global(&name, patch).map(|value| (name, value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{InkList, ListItem};

    fn declare(vars: &mut VariablesState, call_stack: &mut CallStack, name: &str, value: Value) {
        let assignment = VariableAssignment::new(name, true, true);
        vars.assign(&assignment, value, call_stack, None).unwrap();
    }

    #[test]
    fn patch_shadows_globals_until_applied() {
        let mut call_stack = CallStack::new();
        let mut vars = VariablesState::default();
        declare(&mut vars, &mut call_stack, "x", Value::Int(1));
        vars.snapshot_default_globals();

        let mut patch = StatePatch::default();
        vars.set_global("x".into(), Value::Int(2), Some(&mut patch));
        assert_eq!(vars.global("x", Some(&patch)), Some(Value::Int(2)));
        assert_eq!(vars.global("x", None), Some(Value::Int(1)));

        vars.apply_patch(&patch);
        assert_eq!(vars.global("x", None), Some(Value::Int(2)));
        assert_eq!(vars.default_global("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn reassigning_through_a_pointer_writes_the_target() {
        let mut call_stack = CallStack::new();
        let mut vars = VariablesState::default();
        declare(&mut vars, &mut call_stack, "x", Value::Int(1));

        let param = VariableAssignment::new("r", true, false);
        let pointer = Value::VariablePointer("x".into(), VariableContext::Unknown);
        vars.assign(&param, pointer, &mut call_stack, None).unwrap();
        assert_eq!(
            call_stack.temporary_variable_with_name("r", VariableContext::Unknown),
            Some(&Value::VariablePointer("x".into(), VariableContext::Global)),
        );

        let write = VariableAssignment::new("r", false, false);
        vars.assign(&write, Value::Int(9), &mut call_stack, None).unwrap();
        assert_eq!(vars.global("x", None), Some(Value::Int(9)));
        assert_eq!(
            vars.get_variable_with_name("r", VariableContext::Unknown, &call_stack, None),
            Some(Value::Int(9)),
        );
    }

    #[test]
    fn batch_reports_round_trips_once() {
        let mut call_stack = CallStack::new();
        let mut vars = VariablesState::default();
        declare(&mut vars, &mut call_stack, "x", Value::Int(1));
        assert!(vars.take_unbatched_changes(None).is_empty());

        vars.start_variable_observation();
        vars.set_global("x".into(), Value::Int(2), None);
        vars.set_global("x".into(), Value::Int(1), None);
        assert_eq!(vars.complete_variable_observation(None), vec![("x".to_string(), Value::Int(1))]);
        assert!(!vars.is_batch_observing());

        vars.set_global("x".into(), Value::Int(3), None);
        assert_eq!(vars.take_unbatched_changes(None), vec![("x".to_string(), Value::Int(3))]);
    }

    #[test]
    fn empty_list_assignment_keeps_origins() {
        let mut call_stack = CallStack::new();
        let mut vars = VariablesState::default();
        let list = InkList::from_single(ListItem::new("colours", "red"), 1);
        declare(&mut vars, &mut call_stack, "c", Value::List(list));
        vars.set_global("c".into(), Value::List(InkList::new()), None);
        let stored = vars.global("c", None).unwrap();
        assert_eq!(stored.as_list().unwrap().origin_names(), vec!["colours".to_string()]);
    }

    #[test]
    fn host_cannot_set_undeclared_globals() {
        let mut vars = VariablesState::default();
        vars.snapshot_default_globals();
        let err = vars.set_declared_global("nope", Value::Int(1), None).unwrap_err();
        assert_eq!(err, StoryError::UndeclaredVariable("nope".into()));
    }
}
