use std::rc::Rc;

use serde_json::{Map, Value as Json};
use tracing::{debug, warn};

use super::ProgramFile;
use crate::error::{Result, StoryError};
use crate::schema::{
    ChoicePoint, Container, ContainerId, ControlCommand, Divert, DivertTarget, InkList, ListDefinition,
    ListDefinitions, ListItem, NativeFunctionCall, Object, Path, Program, PushPopType, Story, Tag, Value,
    VariableAssignment, VariableContext, VariableReference,
};

fn format_error<S: Into<String>>(message: S) -> StoryError {
    StoryError::Format(message.into())
}

fn str_of<'a>(json: &'a Json, what: &str) -> Result<&'a str> {
    json.as_str()
        .ok_or_else(|| format_error(format!("expected a string for {}, found {}", what, json)))
}

fn int_of(json: &Json, what: &str) -> Result<i32> {
    json.as_i64()
        .and_then(|int| i32::try_from(int).ok())
        .ok_or_else(|| format_error(format!("expected an integer for {}, found {}", what, json)))
}

/// Reads a compiled story, checking its format version.
pub(crate) fn read_program(json: &str) -> Result<Program> {
    let file: ProgramFile = serde_json::from_str(json)?;

    let ink_version = file.ink_version.ok_or(StoryError::MissingInkVersion)?;
    if ink_version > Story::INK_VERSION_CURRENT {
        return Err(StoryError::InkVersionTooNew { found: ink_version, current: Story::INK_VERSION_CURRENT });
    }
    if ink_version < Story::INK_VERSION_MINIMUM_COMPATIBLE {
        return Err(StoryError::InkVersionTooOld {
            found: ink_version,
            minimum: Story::INK_VERSION_MINIMUM_COMPATIBLE,
        });
    }
    if ink_version != Story::INK_VERSION_CURRENT {
        warn!(
            ink_version,
            current = Story::INK_VERSION_CURRENT,
            "version of ink used to build story doesn't match current version of engine. Non-critical, but recommend synchronising",
        );
    }

    let root = match file.root {
        Some(Json::Array(items)) => items,
        Some(_) => return Err(format_error("root must be a container")),
        None => return Err(StoryError::MissingRoot),
    };

    let definitions = file
        .list_defs
        .into_iter()
        .map(|(name, items)| ListDefinition::new(name, items))
        .collect();

    let mut program = Program::default();
    program.ink_version = ink_version;
    program.list_definitions = Rc::new(ListDefinitions::new(definitions));

    let root_id = program.reserve();
    read_container_into(&mut program, root_id, &root)?;
    program.link();
    debug!(containers = program.containers().count(), "read story");
    Ok(program)
}

fn read_object(program: &mut Program, json: &Json) -> Result<Object> {
    match json {
        Json::Array(items) => {
            let id = program.reserve();
            read_container_into(program, id, items)?;
            Ok(Object::Container(id))
        }
        _ => read_token(json),
    }
}

/// Fills the reserved slot `id` from a container array: the content, then a
/// terminator that is either null or an object of named content and flags.
fn read_container_into(program: &mut Program, id: ContainerId, items: &[Json]) -> Result<()> {
    let (terminator, body) = items
        .split_last()
        .ok_or_else(|| format_error("container array has no terminator"))?;

    let mut container = Container::default();
    for item in body {
        let obj = read_object(program, item)?;
        if let Object::Container(child) = obj {
            if let Some(name) = program.container(child).name() {
                container.named_content.insert(name.to_owned(), child);
            }
        }
        container.content.push(obj);
    }

    match terminator {
        Json::Null => {}
        Json::Object(map) => {
            for (key, value) in map {
                match key.as_str() {
                    "#f" => container.set_count_flags(int_of(value, "count flags")? as u32),
                    "#n" => container.name = Some(str_of(value, "container name")?.to_owned()),
                    _ => match read_object(program, value)? {
                        Object::Container(child) => {
                            container.named_content.insert(key.clone(), child);
                        }
                        _ => return Err(format_error(format!("named content '{}' is not a container", key))),
                    },
                }
            }
        }
        other => return Err(format_error(format!("invalid container terminator: {}", other))),
    }

    program.fill(id, container);
    Ok(())
}

/// Reads any object other than a container.
pub(crate) fn read_token(json: &Json) -> Result<Object> {
    match json {
        Json::Bool(value) => Ok(Object::Value(Value::Bool(*value))),
        Json::Number(number) => match number.as_i64() {
            Some(_) => Ok(Object::Value(Value::Int(int_of(json, "integer value")?))),
            None => Ok(Object::Value(Value::Float(number.as_f64().unwrap_or_default() as f32))),
        },
        Json::String(string) => read_string_token(string),
        Json::Object(map) => read_object_token(map),
        Json::Array(..) => Err(format_error("containers are not allowed here")),
        Json::Null => Err(format_error("unexpected null")),
    }
}

fn read_string_token(string: &str) -> Result<Object> {
    if let Some(text) = string.strip_prefix('^') {
        return Ok(Object::string(text));
    }
    if string == "\n" {
        return Ok(Object::string("\n"));
    }
    if string == "<>" {
        return Ok(Object::Glue);
    }
    if let Some(command) = ControlCommand::from_name(string) {
        return Ok(Object::ControlCommand(command));
    }
    // `^` would read as a string, so the power operator is written `L^`.
    let function_name = if string == "L^" { "^" } else { string };
    if let Some(function) = NativeFunctionCall::from_name(function_name) {
        return Ok(Object::NativeFunctionCall(function));
    }
    if string == "void" {
        return Ok(Object::Void);
    }
    Err(format_error(format!("Failed to convert token to runtime object: {}", string)))
}

fn read_object_token(map: &Map<String, Json>) -> Result<Object> {
    if let Some(target) = map.get("^->") {
        let path = Path::from(str_of(target, "divert target value")?);
        return Ok(Object::Value(Value::DivertTarget(path)));
    }

    if let Some(name) = map.get("^var") {
        let context = match map.get("ci") {
            Some(index) => VariableContext::from_index(int_of(index, "variable pointer context")? as i64),
            None => VariableContext::Unknown,
        };
        let name = str_of(name, "variable pointer")?.to_owned();
        return Ok(Object::Value(Value::VariablePointer(name, context)));
    }

    let divert_kinds = [
        ("->", false, PushPopType::Function, false),
        ("f()", true, PushPopType::Function, false),
        ("->t->", true, PushPopType::Tunnel, false),
        ("x()", false, PushPopType::Function, true),
    ];
    for (key, pushes_to_stack, stack_push_type, is_external) in divert_kinds {
        let Some(target) = map.get(key) else {
            continue;
        };
        let target = str_of(target, "divert")?.to_owned();
        let target = if is_external {
            let args = match map.get("exArgs") {
                Some(args) => int_of(args, "external argument count")?.max(0) as usize,
                None => 0,
            };
            DivertTarget::External { name: target, args }
        } else if map.contains_key("var") {
            DivertTarget::Variable(target)
        } else {
            DivertTarget::Path(Path::from(target.as_str()))
        };

        let mut divert = Divert::new(target);
        divert.pushes_to_stack = pushes_to_stack;
        divert.stack_push_type = stack_push_type;
        divert.is_conditional = map.contains_key("c");
        return Ok(Object::Divert(divert));
    }

    if let Some(path) = map.get("*") {
        let flags = match map.get("flg") {
            Some(flags) => int_of(flags, "choice flags")? as u32,
            None => 0,
        };
        let path = Path::from(str_of(path, "choice target")?);
        return Ok(Object::ChoicePoint(ChoicePoint::new(path, flags)));
    }

    if let Some(name) = map.get("VAR?") {
        let name = str_of(name, "variable reference")?.to_owned();
        return Ok(Object::VariableReference(VariableReference::Variable(name)));
    }
    if let Some(path) = map.get("CNT?") {
        let path = Path::from(str_of(path, "read count")?);
        return Ok(Object::VariableReference(VariableReference::PathForCount(path)));
    }

    for (key, is_global) in [("VAR=", true), ("temp=", false)] {
        if let Some(name) = map.get(key) {
            let name = str_of(name, "variable assignment")?;
            let is_new_declaration = !map.contains_key("re");
            return Ok(Object::VariableAssignment(VariableAssignment::new(name, is_new_declaration, is_global)));
        }
    }

    if let Some(text) = map.get("#") {
        return Ok(Object::Tag(Tag::new(str_of(text, "tag")?)));
    }

    if let Some(items) = map.get("list") {
        let items = items
            .as_object()
            .ok_or_else(|| format_error("list content must be an object"))?;
        let mut list = InkList::new();
        if let Some(origins) = map.get("origins").and_then(Json::as_array) {
            let names = origins.iter().filter_map(Json::as_str).map(str::to_owned).collect();
            list.set_initial_origin_names(names);
        }
        for (full_name, value) in items {
            list.insert(ListItem::from_full_name(full_name), int_of(value, "list item value")?);
        }
        return Ok(Object::Value(Value::List(list)));
    }

    Err(format_error(format!("Failed to convert token to runtime object: {}", Json::Object(map.clone()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ObjectRef;

    fn program(root: &str) -> Result<Program> {
        read_program(&format!(r#"{{"inkVersion": 21, "root": {}, "listDefs": {{}}}}"#, root))
    }

    #[test]
    fn gates_on_ink_version() {
        assert_eq!(read_program(r#"{"root": [null]}"#).unwrap_err(), StoryError::MissingInkVersion);
        assert_eq!(
            read_program(r#"{"inkVersion": 22, "root": [null]}"#).unwrap_err(),
            StoryError::InkVersionTooNew { found: 22, current: 21 },
        );
        assert_eq!(
            read_program(r#"{"inkVersion": 17, "root": [null]}"#).unwrap_err(),
            StoryError::InkVersionTooOld { found: 17, minimum: 18 },
        );
        assert_eq!(read_program(r#"{"inkVersion": 20}"#).unwrap_err(), StoryError::MissingRoot);
        assert!(read_program(r#"{"inkVersion": 20, "root": [null]}"#).is_ok());
    }

    #[test]
    fn reads_leaf_tokens() {
        assert_eq!(read_token(&Json::from("^hi")).unwrap(), Object::string("hi"));
        assert_eq!(read_token(&Json::from("\n")).unwrap(), Object::string("\n"));
        assert_eq!(read_token(&Json::from("<>")).unwrap(), Object::Glue);
        assert_eq!(read_token(&Json::from("->->")).unwrap(), Object::ControlCommand(ControlCommand::PopTunnel));
        assert_eq!(read_token(&Json::from("L^")).unwrap(), Object::NativeFunctionCall(NativeFunctionCall::Intersect));
        assert_eq!(read_token(&Json::from(1.5)).unwrap(), Object::Value(Value::Float(1.5)));
        assert!(read_token(&Json::from("bogus")).is_err());
    }

    #[test]
    fn reads_named_and_flagged_containers() {
        let program = program(r##"[["^a", {"#f": 5, "#n": "inner"}], {"knot": ["^b", null], "#f": 1}]"##).unwrap();
        let root = program.root();
        assert_eq!(root.count_flags(), 1);
        let inner = root.named_content["inner"];
        assert_eq!(root.content()[0], Object::Container(inner));
        assert_eq!(program.container(inner).count_flags(), 5);
        assert_eq!(program.container(inner).path().to_string(), "inner");

        let knot = program.knot_container_with_name("knot").unwrap();
        assert_eq!(root.named_only_content().map(|(name, _)| name.as_str()).collect::<Vec<_>>(), vec!["knot"]);
        assert_eq!(program.path_of(ObjectRef::Leaf(knot, 0)).to_string(), "knot.0");
    }

    #[test]
    fn reads_diverts_and_lists() {
        let divert = read_token(&serde_json::json!({"x()": "roll", "exArgs": 2, "c": true})).unwrap();
        let Object::Divert(divert) = divert else { panic!("not a divert") };
        assert_eq!(divert.target, DivertTarget::External { name: "roll".into(), args: 2 });
        assert!(divert.is_conditional);

        let list = read_token(&serde_json::json!({"list": {}, "origins": ["colours"]})).unwrap();
        let Object::Value(Value::List(list)) = list else { panic!("not a list") };
        assert!(list.is_empty());
        assert_eq!(list.origin_names(), vec!["colours".to_string()]);
    }
}
