//! Runtime for stories compiled by the ink compiler.
//!
//! A compiled story is a tree of containers encoded as JSON. [`Story`] loads
//! that tree and evaluates it one line at a time:
//!
//! ```no_run
//! use ink_engine_runtime::Story;
//!
//! # fn run(json: &str) -> ink_engine_runtime::Result<()> {
//! let mut story = Story::new(json)?;
//! loop {
//!     while story.can_continue() {
//!         print!("{}", story.continue_story()?);
//!     }
//!     if story.current_choices().is_empty() {
//!         break;
//!     }
//!     story.choose_choice_index(0)?;
//! }
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod macros;

mod config;
mod error;
mod json;
pub mod schema;

pub use config::StoryConfig;
pub use error::{Result, StoryError};
pub use schema::{
    Choice, ExternalFunction, InkList, ListItem, ObserverId, Path, RegisteredExternal, Story,
    StoryState, Value, ValueType, VariableObserver,
};

#[doc(hidden)]
pub use inventory;
