use serde_json::{Map, Value as Json};

use super::ProgramFile;
use crate::error::Result;
use crate::schema::{
    ContainerId, DivertTarget, NativeFunctionCall, Object, ObjectRef, Program, PushPopType, Story, Value,
    VariableReference,
};

/// Writes the compiled story back out in the format it was read from.
pub(crate) fn write_program(program: &Program) -> Result<String> {
    let list_defs = program
        .list_definitions()
        .definitions()
        .map(|def| (def.name().to_owned(), def.items.clone()))
        .collect();
    let file = ProgramFile {
        ink_version: Some(Story::INK_VERSION_CURRENT),
        root: Some(write_container(program, Program::ROOT, false)),
        list_defs,
    };
    Ok(serde_json::to_string(&file)?)
}

fn write_container(program: &Program, id: ContainerId, without_name: bool) -> Json {
    let container = program.container(id);
    let mut items: Vec<Json> = container
        .content()
        .iter()
        .enumerate()
        .map(|(index, obj)| write_object(program, ObjectRef::Leaf(id, index), obj))
        .collect();

    let mut terminator = Map::new();
    for (name, child) in container.named_only_content() {
        terminator.insert(name.clone(), write_container(program, child, true));
    }
    let flags = container.count_flags();
    if flags > 0 {
        terminator.insert("#f".to_owned(), Json::from(flags));
    }
    if let (Some(name), false) = (container.name(), without_name) {
        terminator.insert("#n".to_owned(), Json::from(name));
    }

    items.push(if terminator.is_empty() { Json::Null } else { Json::Object(terminator) });
    Json::Array(items)
}

fn object_of<const N: usize>(entries: [(&str, Json); N]) -> Json {
    Json::Object(entries.into_iter().map(|(key, value)| (key.to_owned(), value)).collect())
}

/// Writes one object found at `at`, which relative paths are made against.
pub(crate) fn write_object(program: &Program, at: ObjectRef, obj: &Object) -> Json {
    match obj {
        Object::Container(id) => write_container(program, *id, false),
        Object::Value(value) => write_value(value),
        Object::ControlCommand(command) => Json::from(command.name()),
        Object::Divert(divert) => {
            let key = match (&divert.target, divert.pushes_to_stack, divert.stack_push_type) {
                (DivertTarget::External { .. }, _, _) => "x()",
                (_, true, PushPopType::Tunnel) => "->t->",
                (_, true, _) => "f()",
                (_, false, _) => "->",
            };
            let mut map = Map::new();
            match &divert.target {
                DivertTarget::Path(path) => {
                    map.insert(key.to_owned(), Json::from(program.compact_path_string(at, path)));
                }
                DivertTarget::Variable(name) => {
                    map.insert(key.to_owned(), Json::from(name.as_str()));
                    map.insert("var".to_owned(), Json::Bool(true));
                }
                DivertTarget::External { name, .. } => {
                    map.insert(key.to_owned(), Json::from(name.as_str()));
                }
            }
            if divert.is_conditional {
                map.insert("c".to_owned(), Json::Bool(true));
            }
            if let DivertTarget::External { args, .. } = divert.target {
                if args > 0 {
                    map.insert("exArgs".to_owned(), Json::from(args));
                }
            }
            Json::Object(map)
        }
        Object::ChoicePoint(choice) => object_of([
            ("*", Json::from(program.compact_path_string(at, &choice.path_on_choice))),
            ("flg", Json::from(choice.flags())),
        ]),
        Object::VariableReference(VariableReference::Variable(name)) => object_of([("VAR?", Json::from(name.as_str()))]),
        Object::VariableReference(VariableReference::PathForCount(path)) => {
            object_of([("CNT?", Json::from(program.compact_path_string(at, path)))])
        }
        Object::VariableAssignment(assignment) => {
            let key = if assignment.is_global { "VAR=" } else { "temp=" };
            let mut map = Map::new();
            map.insert(key.to_owned(), Json::from(assignment.variable_name.as_str()));
            if !assignment.is_new_declaration {
                map.insert("re".to_owned(), Json::Bool(true));
            }
            Json::Object(map)
        }
        Object::NativeFunctionCall(NativeFunctionCall::Intersect) => Json::from("L^"),
        Object::NativeFunctionCall(function) => Json::from(function.name()),
        Object::Glue => Json::from("<>"),
        Object::Tag(tag) => object_of([("#", Json::from(tag.text()))]),
        Object::Void => Json::from("void"),
    }
}

/// Widens through the shortest decimal form, so `0.1` is written as `0.1` and `2` as `2.0`.
fn write_float(value: f32) -> Json {
    let value = match value {
        v if v.is_nan() => 0.0,
        v if v == f32::INFINITY => f32::MAX,
        v if v == f32::NEG_INFINITY => f32::MIN,
        v => v,
    };
    let widened = value.to_string().parse::<f64>().unwrap_or(value as f64);
    serde_json::Number::from_f64(widened).map_or(Json::Null, Json::Number)
}

pub(crate) fn write_value(value: &Value) -> Json {
    match value {
        Value::Void => Json::from("void"),
        Value::Bool(value) => Json::Bool(*value),
        Value::Int(value) => Json::from(*value),
        Value::Float(value) => write_float(*value),
        Value::String(text) if text == "\n" => Json::from("\n"),
        Value::String(text) => Json::from(format!("^{}", text)),
        Value::List(list) => {
            let items: Map<String, Json> = list
                .iter()
                .map(|(item, value)| (item.full_name(), Json::from(value)))
                .collect();
            let mut map = Map::new();
            map.insert("list".to_owned(), Json::Object(items));
            let origins = list.origin_names();
            if list.is_empty() && !origins.is_empty() {
                map.insert("origins".to_owned(), Json::from(origins));
            }
            Json::Object(map)
        }
        Value::DivertTarget(path) => object_of([("^->", Json::from(path.components_string()))]),
        Value::VariablePointer(name, context) => object_of([
            ("^var", Json::from(name.as_str())),
            ("ci", Json::from(context.to_index())),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::read_program;
    use crate::schema::VariableContext;

    #[test]
    fn writes_values_compactly() {
        assert_eq!(write_value(&Value::from("hi")), Json::from("^hi"));
        assert_eq!(write_value(&Value::from("\n")), Json::from("\n"));
        assert_eq!(write_value(&Value::Float(2.0)).to_string(), "2.0");
        assert_eq!(write_value(&Value::Float(0.1)).to_string(), "0.1");
        assert_eq!(
            write_value(&Value::VariablePointer("x".into(), VariableContext::Global)),
            serde_json::json!({"^var": "x", "ci": 0}),
        );
    }

    #[test]
    fn rewrites_a_story_as_read() {
        let json = r##"{"inkVersion":21,"root":[["^Hi","\n",{"->":"0.b"},{"b":["<>","L^","done",null],"#f":3}],"done",{"knot":[{"VAR?":"x"},{"temp=":"y","re":true},null]}],"listDefs":{"abc":{"a":1,"b":2}}}"##;
        let program = read_program(json).unwrap();
        let written = write_program(&program).unwrap();
        let reread: Json = serde_json::from_str(&written).unwrap();
        let original: Json = serde_json::from_str(json).unwrap();
        assert_eq!(reread, original);
    }
}
