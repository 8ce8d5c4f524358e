use serde::{Deserialize, Serialize};

/// Options controlling how a [`Story`](crate::Story) evaluates and saves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    /// When an EXTERNAL function has no binding, call the ink function of the same name instead.
    pub allow_external_function_fallbacks: bool,
    /// Write globals into saves even when they still hold their declared default value.
    pub save_default_globals: bool,
    /// Fixed seed for `RANDOM` and shuffles. A random seed in `0..100` is picked when unset.
    pub story_seed: Option<i32>,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            allow_external_function_fallbacks: true,
            save_default_globals: false,
            story_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: StoryConfig = serde_json::from_str(r#"{"story_seed": 7}"#).unwrap();
        assert_eq!(config.story_seed, Some(7));
        assert!(config.allow_external_function_fallbacks);
        assert!(!config.save_default_globals);
    }
}
