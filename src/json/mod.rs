//! The compact JSON encoding used by compiled stories and by saves.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

mod read;
mod state;
mod write;

pub(crate) use read::{read_program, read_token};
pub(crate) use state::{read_state, write_state};
pub(crate) use write::{write_object, write_program, write_value};

/// The top level of a compiled story file.
#[derive(Serialize, Deserialize)]
struct ProgramFile {
    #[serde(rename = "inkVersion")]
    ink_version: Option<u32>,
    root: Option<serde_json::Value>,
    #[serde(rename = "listDefs", default)]
    list_defs: IndexMap<String, IndexMap<String, i32>>,
}
