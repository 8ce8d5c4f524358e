use super::story::Thread;
use super::Path;

/// An option offered to the player, generated from a choice point.
#[derive(Clone, Debug)]
pub struct Choice {
    pub(crate) text: String,
    /// Path of the choice point that generated this choice.
    pub(crate) source_path: String,
    pub(crate) target_path: Path,
    pub(crate) is_invisible_default: bool,
    pub(crate) tags: Vec<String>,
    pub(crate) index: usize,
    /// A fork of the thread that was current when the choice was generated.
    pub(crate) thread_at_generation: Thread,
}

impl Choice {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Position of this choice among the current choices.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn is_invisible_default(&self) -> bool {
        self.is_invisible_default
    }
}
