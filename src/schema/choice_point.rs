use super::Path;

/// Generates a [`Choice`](super::Choice) when reached, if its conditions allow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChoicePoint {
    pub(crate) path_on_choice: Path,
    pub(crate) has_condition: bool,
    pub(crate) has_start_content: bool,
    pub(crate) has_choice_only_content: bool,
    pub(crate) once_only: bool,
    pub(crate) is_invisible_default: bool,
}

impl ChoicePoint {
    const HAS_CONDITION: u32 = 0x1;
    const HAS_START_CONTENT: u32 = 0x2;
    const HAS_CHOICE_ONLY_CONTENT: u32 = 0x4;
    const IS_INVISIBLE_DEFAULT: u32 = 0x8;
    const ONCE_ONLY: u32 = 0x10;

    pub fn new(path_on_choice: Path, flags: u32) -> Self {
        Self {
            path_on_choice,
            has_condition: flags & Self::HAS_CONDITION != 0,
            has_start_content: flags & Self::HAS_START_CONTENT != 0,
            has_choice_only_content: flags & Self::HAS_CHOICE_ONLY_CONTENT != 0,
            is_invisible_default: flags & Self::IS_INVISIBLE_DEFAULT != 0,
            once_only: flags & Self::ONCE_ONLY != 0,
        }
    }

    pub fn flags(&self) -> u32 {
        let mut flags = 0;
        if self.has_condition { flags |= Self::HAS_CONDITION; }
        if self.has_start_content { flags |= Self::HAS_START_CONTENT; }
        if self.has_choice_only_content { flags |= Self::HAS_CHOICE_ONLY_CONTENT; }
        if self.is_invisible_default { flags |= Self::IS_INVISIBLE_DEFAULT; }
        if self.once_only { flags |= Self::ONCE_ONLY; }
        flags
    }
}
