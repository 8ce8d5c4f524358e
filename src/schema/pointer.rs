use super::{ContainerId, ObjectRef, Path, Program};

/// A cursor into the tree: a container and an index into its content.
///
/// An index of `None` points at the container itself.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Pointer {
    pub(crate) container: ContainerId,
    pub(crate) index: Option<usize>,
}

impl Pointer {
    pub(crate) fn new(container: ContainerId, index: Option<usize>) -> Self {
        Self { container, index }
    }

    pub(crate) fn start_of(container: ContainerId) -> Self {
        Self { container, index: Some(0) }
    }

    /// The object under the cursor. Empty containers resolve to themselves.
    pub(crate) fn resolve(&self, program: &Program) -> Option<ObjectRef> {
        let container = program.container(self.container);
        let index = match self.index {
            None => return Some(ObjectRef::Container(self.container)),
            Some(_) if container.is_empty() => return Some(ObjectRef::Container(self.container)),
            Some(index) => index,
        };
        program.child_ref(self.container, index)
    }

    pub(crate) fn path(&self, program: &Program) -> Path {
        let path = program.container(self.container).path();
        match self.index {
            Some(index) => path.with_index(index),
            None => path.clone(),
        }
    }
}
