//! Type definitions of all the components of an Ink story.

mod container;
mod list;
mod list_definitions;
mod object;
mod path;
mod pointer;
mod program;
mod push_pop_type;
mod value;

pub use container::{Container, ContainerId};
pub use list::{InkList, ListItem};
pub use list_definitions::{ListDefinition, ListDefinitions};
pub use object::Object;
pub use path::{Component, Path};
pub use pointer::Pointer;
pub(crate) use program::ObjectRef;
pub use program::Program;
pub use push_pop_type::PushPopType;
pub use value::{Value, ValueType, VariableContext};

mod choice;
mod choice_point;
mod control_command;
mod divert;
pub(crate) mod external_function;
mod native_function_call;
pub(crate) mod story;
mod tag;
mod variable_assignment;
mod variable_reference;

pub use choice::Choice;
pub use choice_point::ChoicePoint;
pub use control_command::ControlCommand;
pub use divert::{Divert, DivertTarget};
pub(crate) use external_function::ExternalBinding;
pub use external_function::{ExternalFunction, ObserverId, RegisteredExternal};
pub use native_function_call::NativeFunctionCall;
pub use story::{Story, StoryState, VariableObserver};
pub use tag::Tag;
pub use variable_assignment::VariableAssignment;
pub use variable_reference::VariableReference;
