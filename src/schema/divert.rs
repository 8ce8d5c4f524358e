use super::{Path, PushPopType};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DivertTarget {
    /// A path, relative to the divert itself unless absolute.
    Path(Path),
    /// The name of a variable holding a divert target value.
    Variable(String),
    /// A function bound by the host.
    External { name: String, args: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Divert {
    pub(crate) target: DivertTarget,
    pub(crate) pushes_to_stack: bool,
    pub(crate) stack_push_type: PushPopType,
    pub(crate) is_conditional: bool,
}

impl Divert {
    pub fn new(target: DivertTarget) -> Self {
        Self {
            target,
            pushes_to_stack: false,
            stack_push_type: PushPopType::Function,
            is_conditional: false,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.target, DivertTarget::External { .. })
    }
}
