use std::collections::{HashMap, HashSet};

use crate::schema::{ContainerId, Value};

/// Writes made while an older snapshot of the state must stay readable.
///
/// Reads check the patch first, then the canonical state. Applying the patch
/// folds it into the canonical maps.
#[derive(Clone, Debug, Default)]
pub(crate) struct StatePatch {
    pub globals: HashMap<String, Value>,
    pub changed_variables: HashSet<String>,
    pub visit_counts: HashMap<ContainerId, u32>,
    pub turn_indices: HashMap<ContainerId, i32>,
}

impl StatePatch {
    /// A patch that starts out with the writes of `previous`, if any.
    pub fn new(previous: Option<&StatePatch>) -> Self {
        previous.cloned().unwrap_or_default()
    }

    pub fn try_get_global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn set_global(&mut self, name: String, value: Value) {
        self.globals.insert(name, value);
    }

    pub fn add_changed_variable(&mut self, name: String) {
        self.changed_variables.insert(name);
    }

    pub fn try_get_visit_count(&self, container: ContainerId) -> Option<u32> {
        self.visit_counts.get(&container).copied()
    }

    pub fn set_visit_count(&mut self, container: ContainerId, count: u32) {
        self.visit_counts.insert(container, count);
    }

    pub fn try_get_turn_index(&self, container: ContainerId) -> Option<i32> {
        self.turn_indices.get(&container).copied()
    }

    pub fn set_turn_index(&mut self, container: ContainerId, index: i32) {
        self.turn_indices.insert(container, index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_patch_inherits_previous_writes() {
        let mut first = StatePatch::new(None);
        first.set_global("x".into(), Value::Int(1));
        first.set_visit_count(ContainerId(3), 2);

        let mut second = StatePatch::new(Some(&first));
        second.set_global("x".into(), Value::Int(5));
        assert_eq!(second.try_get_visit_count(ContainerId(3)), Some(2));
        assert_eq!(second.try_get_global("x"), Some(&Value::Int(5)));
        assert_eq!(first.try_get_global("x"), Some(&Value::Int(1)));
        assert_eq!(first.try_get_turn_index(ContainerId(3)), None);
    }
}
