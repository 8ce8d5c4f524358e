use super::Path;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VariableReference {
    Variable(String),
    /// A read count, addressed relative to the reference itself.
    PathForCount(Path),
}
