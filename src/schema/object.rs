use super::*;

/// A node of the story tree, or a value produced while evaluating it.
///
/// Containers live in the [`Program`] arena and are referenced by id; every
/// other kind is stored inline in its container's content.
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    Container(ContainerId),
    Value(Value),
    ControlCommand(ControlCommand),
    Divert(Divert),
    ChoicePoint(ChoicePoint),
    VariableReference(VariableReference),
    VariableAssignment(VariableAssignment),
    NativeFunctionCall(NativeFunctionCall),
    Glue,
    Tag(Tag),
    Void,
}

impl Object {
    pub(crate) fn string(text: impl Into<String>) -> Self {
        Object::Value(Value::String(text.into()))
    }

    pub(crate) fn into_value(self) -> Option<Value> {
        match self {
            Object::Value(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn as_text(&self) -> Option<&str> {
        match self {
            Object::Value(Value::String(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub(crate) fn as_control_command(&self) -> Option<ControlCommand> {
        match self {
            Object::ControlCommand(command) => Some(*command),
            _ => None,
        }
    }

    pub(crate) fn as_container(&self) -> Option<ContainerId> {
        match self {
            Object::Container(id) => Some(*id),
            _ => None,
        }
    }

    pub(crate) fn is_control_command(&self, command: ControlCommand) -> bool {
        self.as_control_command() == Some(command)
    }

    /// A string value consisting of exactly one newline.
    pub(crate) fn is_newline(&self) -> bool {
        self.as_text() == Some("\n")
    }

    /// A string value made only of spaces and tabs.
    pub(crate) fn is_inline_whitespace(&self) -> bool {
        self.as_text()
            .map(|text| text.chars().all(|ch| ch == ' ' || ch == '\t'))
            .unwrap_or(false)
    }

    /// A string value with some visible content.
    pub(crate) fn is_non_whitespace(&self) -> bool {
        self.as_text().is_some() && !self.is_newline() && !self.is_inline_whitespace()
    }
}

impl From<Value> for Object {
    fn from(value: Value) -> Self {
        match value {
            Value::Void => Object::Void,
            value => Object::Value(value),
        }
    }
}
