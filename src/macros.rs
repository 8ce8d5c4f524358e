/// Returns early with a fatal runtime error built from the format arguments.
macro_rules! story_bail {
    ($($arg:tt)*) => {
        return Err($crate::error::StoryError::runtime(format!($($arg)*)))
    }
}

/// Bails with a fatal runtime error unless the condition holds.
macro_rules! story_ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            story_bail!($($arg)*);
        }
    }
}
