use std::fmt::{self, Display, Formatter};

use super::{InkList, Path};
use crate::error::{Result, StoryError};

/// Which variable scope a variable pointer refers to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum VariableContext {
    /// Not yet resolved: look in the current frame, then globals.
    Unknown,
    Global,
    /// The temporaries of the call stack element at this index.
    Temporary(usize),
}

impl VariableContext {
    /// The `ci` number used by the save format: -1 unknown, 0 global, otherwise element index + 1.
    pub(crate) fn to_index(self) -> i64 {
        match self {
            VariableContext::Unknown => -1,
            VariableContext::Global => 0,
            VariableContext::Temporary(index) => index as i64 + 1,
        }
    }

    pub(crate) fn from_index(index: i64) -> Self {
        match index {
            i64::MIN..=-1 => VariableContext::Unknown,
            0 => VariableContext::Global,
            n => VariableContext::Temporary(n as usize - 1),
        }
    }
}

/// Value kinds, ordered so that a "wider" kind compares greater.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum ValueType {
    Void,
    Bool,
    Int,
    Float,
    List,
    String,
    DivertTarget,
    VariablePointer,
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            ValueType::Void => "Void",
            ValueType::Bool => "Bool",
            ValueType::Int => "Int",
            ValueType::Float => "Float",
            ValueType::List => "List",
            ValueType::String => "String",
            ValueType::DivertTarget => "DivertTarget",
            ValueType::VariablePointer => "VariablePointer",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// What a function with no return value produces, when stored in a variable.
    Void,
    Bool(bool),
    Int(i32),
    Float(f32),
    List(InkList),
    String(String),

    DivertTarget(Path),
    VariablePointer(String, VariableContext),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Void => ValueType::Void,
            Value::Bool(..) => ValueType::Bool,
            Value::Int(..) => ValueType::Int,
            Value::Float(..) => ValueType::Float,
            Value::List(..) => ValueType::List,
            Value::String(..) => ValueType::String,
            Value::DivertTarget(..) => ValueType::DivertTarget,
            Value::VariablePointer(..) => ValueType::VariablePointer,
        }
    }

    pub fn is_truthy(&self) -> Result<bool> {
        match self {
            Value::Void => Err(StoryError::runtime(
                "Attempting to use a void value as a condition. Did you forget to 'return' a value from a function you called here?",
            )),
            Value::Bool(value) => Ok(*value),
            Value::Int(value) => Ok(*value != 0),
            Value::Float(value) => Ok(*value != 0.0),
            Value::List(list) => Ok(!list.is_empty()),
            Value::String(string) => Ok(!string.is_empty()),
            Value::DivertTarget(path) => Err(StoryError::runtime(format!(
                "Shouldn't use a divert target (to {}) as a conditional value. Did you intend a function call 'likeThis()' or a read count check 'likeThis'? (no arrows)",
                path,
            ))),
            Value::VariablePointer(name, _) => Err(StoryError::runtime(format!(
                "Shouldn't use a variable pointer (to {}) as a conditional value",
                name,
            ))),
        }
    }

    /// Converts to another value type, failing where ink defines no conversion.
    pub fn cast(&self, to: ValueType) -> Result<Value> {
        if self.value_type() == to {
            return Ok(self.clone());
        }
        let cast = match (self, to) {
            (Value::Bool(value), ValueType::Int) => Some(Value::Int(*value as i32)),
            (Value::Bool(value), ValueType::Float) => Some(Value::Float(if *value { 1.0 } else { 0.0 })),
            (Value::Bool(value), ValueType::String) => Some(Value::String(value.to_string())),

            (Value::Int(value), ValueType::Bool) => Some(Value::Bool(*value != 0)),
            (Value::Int(value), ValueType::Float) => Some(Value::Float(*value as f32)),
            (Value::Int(value), ValueType::String) => Some(Value::String(value.to_string())),

            (Value::Float(value), ValueType::Bool) => Some(Value::Bool(*value != 0.0)),
            (Value::Float(value), ValueType::Int) => Some(Value::Int(*value as i32)),
            (Value::Float(value), ValueType::String) => Some(Value::String(format_float(*value))),

            (Value::String(string), ValueType::Int) => string.trim().parse().ok().map(Value::Int),
            (Value::String(string), ValueType::Float) => string.trim().parse().ok().map(Value::Float),

            (Value::List(list), ValueType::Int) => Some(Value::Int(list.max_item().map_or(0, |(_, value)| value))),
            (Value::List(list), ValueType::Float) => Some(Value::Float(list.max_item().map_or(0.0, |(_, value)| value as f32))),
            (Value::List(list), ValueType::String) => Some(Value::String(list.to_string())),
            _ => None,
        };
        cast.ok_or_else(|| StoryError::runtime(format!("Can't cast {} from {} to {}", self, self.value_type(), to)))
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(string) => Some(string.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&InkList> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_divert_target(&self) -> Option<&Path> {
        match self {
            Value::DivertTarget(path) => Some(path),
            _ => None,
        }
    }
}

/// Formats floats the way ink prints them: no trailing `.0` for whole numbers.
pub(crate) fn format_float(value: f32) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Int(value) => write!(f, "{}", value),
            Value::Float(value) => write!(f, "{}", format_float(*value)),
            Value::List(list) => write!(f, "{}", list),
            Value::String(string) => write!(f, "{}", string),
            Value::DivertTarget(path) => write!(f, "DivertTargetValue({})", path),
            Value::VariablePointer(name, _) => write!(f, "VariablePointerValue({})", name),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<InkList> for Value {
    fn from(v: InkList) -> Self {
        Value::List(v)
    }
}

macro_rules! value_try_from {
    ($t:ty, $accessor:ident) => {
        impl TryFrom<&Value> for $t {
            type Error = StoryError;

            fn try_from(value: &Value) -> Result<Self> {
                value
                    .$accessor()
                    .map(Into::into)
                    .ok_or_else(|| StoryError::InvalidArgument(format!(
                        "expected {}, received {}",
                        stringify!($t),
                        value.value_type(),
                    )))
            }
        }
    };
}

value_try_from!(i32, as_int);
value_try_from!(f32, as_float);
value_try_from!(bool, as_bool);
value_try_from!(String, as_str);

impl TryFrom<&Value> for InkList {
    type Error = StoryError;

    fn try_from(value: &Value) -> Result<Self> {
        value
            .as_list()
            .cloned()
            .ok_or_else(|| StoryError::InvalidArgument(format!("expected InkList, received {}", value.value_type())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_per_type() {
        assert!(Value::Int(3).is_truthy().unwrap());
        assert!(!Value::Int(0).is_truthy().unwrap());
        assert!(!Value::Float(0.0).is_truthy().unwrap());
        assert!(!Value::List(InkList::new()).is_truthy().unwrap());
        assert!(Value::String("x".into()).is_truthy().unwrap());
        assert!(Value::DivertTarget(Path::from("knot")).is_truthy().is_err());
        assert!(Value::Void.is_truthy().is_err());
    }

    #[test]
    fn casts_between_scalars() {
        assert_eq!(Value::Int(2).cast(ValueType::Float).unwrap(), Value::Float(2.0));
        assert_eq!(Value::Float(2.7).cast(ValueType::Int).unwrap(), Value::Int(2));
        assert_eq!(Value::Float(2.0).cast(ValueType::String).unwrap(), Value::String("2".into()));
        assert_eq!(Value::Bool(true).cast(ValueType::Int).unwrap(), Value::Int(1));
        assert_eq!(Value::String("12".into()).cast(ValueType::Int).unwrap(), Value::Int(12));
        assert!(Value::String("twelve".into()).cast(ValueType::Int).is_err());
        assert!(Value::Int(1).cast(ValueType::DivertTarget).is_err());
    }

    #[test]
    fn context_index_round_trips() {
        for context in [VariableContext::Unknown, VariableContext::Global, VariableContext::Temporary(3)] {
            assert_eq!(VariableContext::from_index(context.to_index()), context);
        }
    }
}
