use std::fmt::{self, Display, Formatter};

use super::{InkList, ListDefinitions, Value, ValueType};
use crate::error::{Result, StoryError};

/// The built in operators and functions of ink expressions.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum NativeFunctionCall {
    Add,
    Subtract,
    Divide,
    Multiply,
    Mod,
    Negate,

    Equal,
    Greater,
    Less,
    GreaterThanOrEquals,
    LessThanOrEquals,
    NotEquals,
    Not,

    And,
    Or,

    Min,
    Max,

    Pow,
    Floor,
    Ceiling,
    Int,
    Float,

    Has,
    Hasnt,
    Intersect,

    ListMin,
    ListMax,
    All,
    Count,
    ValueOfList,
    Invert,
}

use NativeFunctionCall::*;

impl NativeFunctionCall {
    pub const ALL: [NativeFunctionCall; 31] = [
        Add, Subtract, Divide, Multiply, Mod, Negate,
        Equal, Greater, Less, GreaterThanOrEquals, LessThanOrEquals, NotEquals, Not,
        And, Or,
        Min, Max,
        Pow, Floor, Ceiling, Int, Float,
        Has, Hasnt, Intersect,
        ListMin, ListMax, All, Count, ValueOfList, Invert,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Add => "+",
            Subtract => "-",
            Divide => "/",
            Multiply => "*",
            Mod => "%",
            Negate => "_",
            Equal => "==",
            Greater => ">",
            Less => "<",
            GreaterThanOrEquals => ">=",
            LessThanOrEquals => "<=",
            NotEquals => "!=",
            Not => "!",
            And => "&&",
            Or => "||",
            Min => "MIN",
            Max => "MAX",
            Pow => "POW",
            Floor => "FLOOR",
            Ceiling => "CEILING",
            Int => "INT",
            Float => "FLOAT",
            Has => "?",
            Hasnt => "!?",
            Intersect => "^",
            ListMin => "LIST_MIN",
            ListMax => "LIST_MAX",
            All => "LIST_ALL",
            Count => "LIST_COUNT",
            ValueOfList => "LIST_VALUE",
            Invert => "LIST_INVERT",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }

    pub fn number_of_parameters(self) -> usize {
        match self {
            Negate | Not | Floor | Ceiling | Int | Float
            | ListMin | ListMax | All | Count | ValueOfList | Invert => 1,
            _ => 2,
        }
    }

    /// Applies the operator. `params` are in push order.
    pub(crate) fn call(self, params: Vec<Value>, definitions: &ListDefinitions) -> Result<Value> {
        if params.len() != self.number_of_parameters() {
            return Err(StoryError::runtime(format!(
                "Unexpected number of parameters to '{}': expected {}, received {}",
                self,
                self.number_of_parameters(),
                params.len(),
            )));
        }

        let has_list = params.iter().any(|param| param.value_type() == ValueType::List);
        if params.len() == 2 && has_list {
            return self.call_binary_list_operation(params, definitions);
        }

        let mut coerced = coerce_to_single_type(params, definitions)?;
        match coerced.len() {
            1 => {
                let value = coerced.remove(0);
                self.unary(value, definitions)
            }
            _ => {
                let rhs = coerced.remove(1);
                let lhs = coerced.remove(0);
                self.binary(lhs, rhs)
            }
        }
    }

    fn call_binary_list_operation(self, params: Vec<Value>, definitions: &ListDefinitions) -> Result<Value> {
        let mut params = params.into_iter();
        let (lhs, rhs) = match (params.next(), params.next()) {
            (Some(lhs), Some(rhs)) => (lhs, rhs),
            _ => return Err(StoryError::runtime("Expected two parameters for a list operation")),
        };

        match (self, &lhs, &rhs) {
            (Add | Subtract, Value::List(list), Value::Int(shift)) => {
                return Ok(Value::List(self.shift_list(list, *shift, definitions)));
            }
            (And | Or, _, _) if lhs.value_type() != ValueType::List || rhs.value_type() != ValueType::List => {
                let lhs = lhs.is_truthy()?;
                let rhs = rhs.is_truthy()?;
                let result = if self == And { lhs && rhs } else { lhs || rhs };
                return Ok(Value::Bool(result));
            }
            (_, Value::List(..), Value::List(..)) => {}
            _ => {
                return Err(StoryError::runtime(format!(
                    "Can not call use '{}' operation on {} and {}",
                    self,
                    lhs.value_type(),
                    rhs.value_type(),
                )));
            }
        }
        self.binary(lhs, rhs)
    }

    /// `list + n`: every item moves to the item of its origin holding the shifted value, if any.
    fn shift_list(self, list: &InkList, shift: i32, definitions: &ListDefinitions) -> InkList {
        let mut result = InkList::new();
        for (item, value) in list.iter() {
            let target = if self == Add { value.wrapping_add(shift) } else { value.wrapping_sub(shift) };
            let shifted = item
                .origin_name()
                .and_then(|origin| definitions.list_definition_by_name(origin))
                .and_then(|origin| origin.item_with_value(target));
            if let Some(shifted) = shifted {
                result.insert(shifted, target);
            }
        }
        result
    }

    fn unsupported(self, value_type: ValueType) -> StoryError {
        StoryError::runtime(format!("Cannot perform operation '{}' on {}", self, value_type))
    }

    fn unary(self, value: Value, definitions: &ListDefinitions) -> Result<Value> {
        let result = match (self, &value) {
            (Negate, Value::Int(x)) => Value::Int(x.wrapping_neg()),
            (Not, Value::Int(x)) => Value::Bool(*x == 0),
            (Floor | Ceiling | Int, Value::Int(x)) => Value::Int(*x),
            (Float, Value::Int(x)) => Value::Float(*x as f32),

            (Negate, Value::Float(x)) => Value::Float(-x),
            (Not, Value::Float(x)) => Value::Bool(*x == 0.0),
            (Floor, Value::Float(x)) => Value::Float(x.floor()),
            (Ceiling, Value::Float(x)) => Value::Float(x.ceil()),
            (Int, Value::Float(x)) => Value::Int(*x as i32),
            (Float, Value::Float(x)) => Value::Float(*x),

            (Not, Value::List(list)) => Value::Int(if list.is_empty() { 1 } else { 0 }),
            (Invert, Value::List(list)) => Value::List(list.inverse(definitions)),
            (All, Value::List(list)) => Value::List(list.all(definitions)),
            (ListMin, Value::List(list)) => Value::List(list.min_as_list()),
            (ListMax, Value::List(list)) => Value::List(list.max_as_list()),
            (Count, Value::List(list)) => Value::Int(list.len() as i32),
            (ValueOfList, Value::List(list)) => Value::Int(list.max_item().map_or(0, |(_, value)| value)),

            _ => return Err(self.unsupported(value.value_type())),
        };
        Ok(result)
    }

    fn binary(self, lhs: Value, rhs: Value) -> Result<Value> {
        let result = match (&lhs, &rhs) {
            (Value::Int(x), Value::Int(y)) => self.binary_int(*x, *y)?,
            (Value::Float(x), Value::Float(y)) => self.binary_float(*x, *y)?,
            (Value::String(x), Value::String(y)) => match self {
                Add => Some(Value::String(format!("{}{}", x, y))),
                Equal => Some(Value::Bool(x == y)),
                NotEquals => Some(Value::Bool(x != y)),
                Has => Some(Value::Bool(x.contains(y.as_str()))),
                Hasnt => Some(Value::Bool(!x.contains(y.as_str()))),
                _ => None,
            },
            (Value::List(x), Value::List(y)) => match self {
                Add => Some(Value::List(x.union(y))),
                Subtract => Some(Value::List(x.without(y))),
                Has => Some(Value::Bool(x.contains(y))),
                Hasnt => Some(Value::Bool(!x.contains(y))),
                Intersect => Some(Value::List(x.intersect(y))),
                Equal => Some(Value::Bool(x == y)),
                NotEquals => Some(Value::Bool(x != y)),
                Greater => Some(Value::Bool(x.greater_than(y))),
                Less => Some(Value::Bool(x.less_than(y))),
                GreaterThanOrEquals => Some(Value::Bool(x.greater_than_or_equals(y))),
                LessThanOrEquals => Some(Value::Bool(x.less_than_or_equals(y))),
                And => Some(Value::Bool(!x.is_empty() && !y.is_empty())),
                Or => Some(Value::Bool(!x.is_empty() || !y.is_empty())),
                _ => None,
            },
            (Value::DivertTarget(x), Value::DivertTarget(y)) => match self {
                Equal => Some(Value::Bool(x == y)),
                NotEquals => Some(Value::Bool(x != y)),
                _ => None,
            },
            _ => None,
        };
        result.ok_or_else(|| self.unsupported(lhs.value_type()))
    }

    fn binary_int(self, x: i32, y: i32) -> Result<Option<Value>> {
        let result = match self {
            Add => Value::Int(x.wrapping_add(y)),
            Subtract => Value::Int(x.wrapping_sub(y)),
            Multiply => Value::Int(x.wrapping_mul(y)),
            Divide | Mod if y == 0 => return Err(StoryError::runtime("Attempted to divide by zero")),
            Divide => Value::Int(x.wrapping_div(y)),
            Mod => Value::Int(x.wrapping_rem(y)),
            Equal => Value::Bool(x == y),
            Greater => Value::Bool(x > y),
            Less => Value::Bool(x < y),
            GreaterThanOrEquals => Value::Bool(x >= y),
            LessThanOrEquals => Value::Bool(x <= y),
            NotEquals => Value::Bool(x != y),
            And => Value::Bool(x != 0 && y != 0),
            Or => Value::Bool(x != 0 || y != 0),
            Max => Value::Int(x.max(y)),
            Min => Value::Int(x.min(y)),
            Pow => Value::Float((x as f64).powf(y as f64) as f32),
            _ => return Ok(None),
        };
        Ok(Some(result))
    }

    fn binary_float(self, x: f32, y: f32) -> Result<Option<Value>> {
        let result = match self {
            Add => Value::Float(x + y),
            Subtract => Value::Float(x - y),
            Multiply => Value::Float(x * y),
            Divide => Value::Float(x / y),
            Mod => Value::Float(x % y),
            Equal => Value::Bool(x == y),
            Greater => Value::Bool(x > y),
            Less => Value::Bool(x < y),
            GreaterThanOrEquals => Value::Bool(x >= y),
            LessThanOrEquals => Value::Bool(x <= y),
            NotEquals => Value::Bool(x != y),
            And => Value::Bool(x != 0.0 && y != 0.0),
            Or => Value::Bool(x != 0.0 || y != 0.0),
            Max => Value::Float(x.max(y)),
            Min => Value::Float(x.min(y)),
            Pow => Value::Float(x.powf(y)),
            _ => return Ok(None),
        };
        Ok(Some(result))
    }
}

/// Casts every parameter to the widest type among them, never narrower than `Int`.
///
/// When a list is present, integers are turned into the item of the list's
/// origin that holds that value.
fn coerce_to_single_type(params: Vec<Value>, definitions: &ListDefinitions) -> Result<Vec<Value>> {
    let target = params
        .iter()
        .map(Value::value_type)
        .fold(ValueType::Int, ValueType::max);

    if target != ValueType::List {
        return params.iter().map(|param| param.cast(target)).collect();
    }

    let origin = params
        .iter()
        .filter_map(Value::as_list)
        .last()
        .and_then(|list| list.max_item())
        .and_then(|(item, _)| item.origin_name())
        .and_then(|origin| definitions.list_definition_by_name(origin));

    params
        .into_iter()
        .map(|param| match param {
            Value::List(..) => Ok(param),
            Value::Int(value) => {
                let origin = origin.ok_or_else(|| {
                    StoryError::runtime(format!("Could not find List item with the value {}", value))
                })?;
                origin
                    .item_with_value(value)
                    .map(|item| Value::List(InkList::from_single(item, value)))
                    .ok_or_else(|| StoryError::runtime(format!(
                        "Could not find List item with the value {} in {}",
                        value,
                        origin.name(),
                    )))
            }
            other => Err(StoryError::runtime(format!(
                "Cannot mix Lists and {} values in this operation",
                other.value_type(),
            ))),
        })
        .collect()
}

impl Display for NativeFunctionCall {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::schema::{ListDefinition, ListItem};

    fn numbers() -> ListDefinitions {
        let items: IndexMap<String, i32> = [("one", 1), ("two", 2), ("three", 3)]
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        ListDefinitions::new(vec![ListDefinition::new("numbers", items)])
    }

    fn item(name: &str, value: i32) -> Value {
        Value::List(InkList::from_single(ListItem::new("numbers", name), value))
    }

    #[test]
    fn names_round_trip() {
        for op in NativeFunctionCall::ALL {
            assert_eq!(NativeFunctionCall::from_name(op.name()), Some(op));
        }
        assert_eq!(NativeFunctionCall::from_name("nope"), None);
    }

    #[test]
    fn arithmetic_widens_to_float() {
        let defs = ListDefinitions::default();
        let sum = Add.call(vec![Value::Int(1), Value::Float(1.5)], &defs).unwrap();
        assert_eq!(sum, Value::Float(2.5));
        assert_eq!(Divide.call(vec![Value::Int(7), Value::Int(2)], &defs).unwrap(), Value::Int(3));
        assert!(Divide.call(vec![Value::Int(7), Value::Int(0)], &defs).is_err());
    }

    #[test]
    fn strings_concatenate_with_numbers() {
        let defs = ListDefinitions::default();
        let joined = Add.call(vec![Value::from("x"), Value::Int(2)], &defs).unwrap();
        assert_eq!(joined, Value::from("x2"));
        assert!(Subtract.call(vec![Value::from("x"), Value::from("y")], &defs).is_err());
    }

    #[test]
    fn comparisons_produce_bools() {
        let defs = ListDefinitions::default();
        assert_eq!(Greater.call(vec![Value::Int(3), Value::Int(2)], &defs).unwrap(), Value::Bool(true));
        assert_eq!(Not.call(vec![Value::Bool(false)], &defs).unwrap(), Value::Bool(true));
        assert_eq!(And.call(vec![Value::Bool(true), Value::Int(0)], &defs).unwrap(), Value::Bool(false));
    }

    #[test]
    fn list_shifts_through_origin() {
        let defs = numbers();
        assert_eq!(Add.call(vec![item("one", 1), Value::Int(1)], &defs).unwrap(), item("two", 2));
        let dropped = Add.call(vec![item("three", 3), Value::Int(1)], &defs).unwrap();
        assert_eq!(dropped.as_list().map(InkList::len), Some(0));
    }

    #[test]
    fn lists_mix_with_truthiness() {
        let defs = numbers();
        let result = Or.call(vec![Value::List(InkList::new()), Value::Int(1)], &defs).unwrap();
        assert_eq!(result, Value::Bool(true));
        assert_eq!(Not.call(vec![Value::List(InkList::new())], &defs).unwrap(), Value::Int(1));
    }

    #[test]
    fn list_containment_and_count() {
        let defs = numbers();
        let lists = Has.call(vec![item("two", 2), item("two", 2)], &defs).unwrap();
        assert_eq!(lists, Value::Bool(true));
        assert_eq!(Count.call(vec![item("two", 2)], &defs).unwrap(), Value::Int(1));
    }
}
