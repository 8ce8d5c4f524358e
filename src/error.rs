use thiserror::Error;

use crate::schema::PushPopType;

pub type Result<T> = std::result::Result<T, StoryError>;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum StoryError {
    #[error("ink version number not found. Are you sure it's a valid .ink.json file?")]
    MissingInkVersion,

    #[error("version of ink used to build story ({found}) was newer than the current version of the engine ({current})")]
    InkVersionTooNew { found: u32, current: u32 },

    #[error("version of ink used to build story ({found}) is too old to be loaded by this version of the engine (minimum {minimum})")]
    InkVersionTooOld { found: u32, minimum: u32 },

    #[error("root node for ink not found. Are you sure it's a valid .ink.json file?")]
    MissingRoot,

    #[error("malformed story json: {0}")]
    Format(String),

    #[error("ink save format incorrect, can't load: {0}")]
    SaveFormat(String),

    #[error("ink save format isn't compatible with the current version (saw '{found}', but minimum is {minimum}), so can't load")]
    SaveVersionTooOld { found: u32, minimum: u32 },

    #[error("can't continue - should check can_continue before calling continue_story")]
    CannotContinue,

    #[error("can't {0}. Story is in the middle of a continue_async(). Make more continue_async() calls or a single continue_story() call beforehand")]
    AsyncContinueActive(&'static str),

    #[error("choice index {index} out of range ({count} choices available)")]
    ChoiceOutOfRange { index: usize, count: usize },

    #[error("function doesn't exist: '{0}'")]
    FunctionNotFound(String),

    #[error("function '{0}' has already been bound")]
    ExternalAlreadyBound(String),

    #[error("cannot use variable '{0}' because it wasn't declared in the ink story")]
    UndeclaredVariable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("story is already in background saving mode, can't copy the state for saving again")]
    BackgroundSaveActive,

    #[error(
        "Found {}, when expected {}",
        .found.pop_statement(),
        .expected.map_or("end of flow (-> END or choice)", PushPopType::pop_statement),
    )]
    MismatchedPop { expected: Option<PushPopType>, found: PushPopType },

    #[error("{0}")]
    Runtime(String),
}

impl StoryError {
    pub(crate) fn runtime<S: Into<String>>(message: S) -> Self {
        StoryError::Runtime(message.into())
    }
}

impl From<serde_json::Error> for StoryError {
    fn from(error: serde_json::Error) -> Self {
        StoryError::Format(error.to_string())
    }
}
