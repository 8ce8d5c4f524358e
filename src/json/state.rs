use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;

use super::{read_token, write_object, write_value};
use crate::error::{Result, StoryError};
use crate::schema::story::{CallStack, Element, Thread};
use crate::schema::{Choice, ContainerId, Object, ObjectRef, Path, Pointer, Program, PushPopType, StoryState, Value};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveFile {
    callstack_threads: CallStackJson,
    output_stream: Vec<Json>,
    current_choices: Vec<ChoiceJson>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    choice_threads: IndexMap<String, ThreadJson>,
    variables_state: IndexMap<String, Json>,
    eval_stack: Vec<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_divert_target: Option<String>,
    #[serde(default)]
    visit_counts: IndexMap<String, u32>,
    #[serde(default)]
    turn_indices: IndexMap<String, i32>,
    turn_idx: i32,
    story_seed: i32,
    #[serde(default)]
    previous_random: i32,
    ink_save_version: u32,
    #[serde(default)]
    ink_format_version: u32,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallStackJson {
    threads: Vec<ThreadJson>,
    thread_counter: usize,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadJson {
    callstack: Vec<ElementJson>,
    thread_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_content_object: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ElementJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    c_path: Option<String>,
    #[serde(default)]
    idx: i64,
    exp: bool,
    #[serde(rename = "type")]
    push_type: i64,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    temp: IndexMap<String, Json>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChoiceJson {
    text: String,
    index: usize,
    original_choice_path: String,
    original_thread_index: usize,
    target_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_invisible_default: bool,
}

fn save_error<S: Into<String>>(message: S) -> StoryError {
    StoryError::SaveFormat(message.into())
}

fn write_stream(program: &Program, objs: &[Object]) -> Vec<Json> {
    objs.iter()
        .map(|obj| write_object(program, ObjectRef::Container(Program::ROOT), obj))
        .collect()
}

fn write_thread(program: &Program, thread: &Thread) -> ThreadJson {
    let callstack = thread
        .callstack
        .iter()
        .map(|element| ElementJson {
            c_path: element
                .current_pointer
                .map(|pointer| program.container(pointer.container).path().components_string()),
            idx: element
                .current_pointer
                .and_then(|pointer| pointer.index)
                .map_or(-1, |index| index as i64),
            exp: element.in_expression_evaluation,
            push_type: element.push_type.to_index(),
            temp: element
                .temporary_variables
                .iter()
                .map(|(name, value)| (name.clone(), write_value(value)))
                .collect(),
        })
        .collect();

    ThreadJson {
        callstack,
        thread_index: thread.thread_index,
        previous_content_object: thread
            .previous_pointer
            .and_then(|pointer| pointer.resolve(program))
            .map(|obj| program.path_of(obj).components_string()),
    }
}

fn write_counts<T: Copy>(
    program: &Program,
    canonical: &IndexMap<ContainerId, T>,
    patched: Option<&std::collections::HashMap<ContainerId, T>>,
) -> IndexMap<String, T> {
    let mut merged: IndexMap<ContainerId, T> = canonical.clone();
    if let Some(patched) = patched {
        let mut extra: Vec<(ContainerId, T)> = patched.iter().map(|(id, value)| (*id, *value)).collect();
        extra.sort_by_key(|(id, _)| *id);
        for (id, value) in extra {
            merged.insert(id, value);
        }
    }
    merged
        .into_iter()
        .map(|(id, value)| (program.container(id).path().components_string(), value))
        .collect()
}

/// Writes the state in the ink save format.
pub(crate) fn write_state(state: &StoryState) -> Result<String> {
    let program = &*state.program;
    let call_stack = &state.call_stack;

    let mut choice_threads = IndexMap::new();
    for choice in &state.current_choices {
        let index = choice.thread_at_generation.thread_index;
        if call_stack.thread_with_index(index).is_none() {
            choice_threads.insert(index.to_string(), write_thread(program, &choice.thread_at_generation));
        }
    }

    let current_choices = state
        .current_choices
        .iter()
        .map(|choice| ChoiceJson {
            text: choice.text.clone(),
            index: choice.index,
            original_choice_path: choice.source_path.clone(),
            original_thread_index: choice.thread_at_generation.thread_index,
            target_path: choice.target_path.components_string(),
            tags: choice.tags.clone(),
            is_invisible_default: choice.is_invisible_default,
        })
        .collect();

    let patch = state.patch.as_ref();
    let save = SaveFile {
        callstack_threads: CallStackJson {
            threads: call_stack.threads.iter().map(|thread| write_thread(program, thread)).collect(),
            thread_counter: call_stack.thread_counter,
        },
        output_stream: write_stream(program, &state.output_stream),
        current_choices,
        choice_threads,
        variables_state: state
            .variables
            .globals_to_save(state.save_default_globals, patch)
            .map(|(name, value)| (name.clone(), write_value(value)))
            .collect(),
        eval_stack: write_stream(program, &state.evaluation_stack),
        current_divert_target: state
            .diverted_pointer
            .map(|pointer| pointer.path(program).components_string()),
        visit_counts: write_counts(program, &state.visit_counts, patch.map(|patch| &patch.visit_counts)),
        turn_indices: write_counts(program, &state.turn_indices, patch.map(|patch| &patch.turn_indices)),
        turn_idx: state.current_turn_index,
        story_seed: state.story_seed,
        previous_random: state.previous_random,
        ink_save_version: StoryState::INK_SAVE_STATE_VERSION,
        ink_format_version: crate::schema::Story::INK_VERSION_CURRENT,
    };
    Ok(serde_json::to_string(&save)?)
}

fn read_value(json: &Json) -> Result<Value> {
    match read_token(json).map_err(|err| save_error(err.to_string()))? {
        Object::Value(value) => Ok(value),
        Object::Void => Ok(Value::Void),
        obj => Err(save_error(format!("expected a value, found {:?}", obj))),
    }
}

fn read_stream(json: &[Json]) -> Result<Vec<Object>> {
    json.iter()
        .map(|item| read_token(item).map_err(|err| save_error(err.to_string())))
        .collect()
}

fn read_thread(program: &Program, json: &ThreadJson, warnings: &mut Vec<String>) -> Result<Thread> {
    let mut thread = Thread::new();
    thread.thread_index = json.thread_index;

    for element_json in &json.callstack {
        let push_type = PushPopType::from_index(element_json.push_type)
            .ok_or_else(|| save_error(format!("unknown call stack element type {}", element_json.push_type)))?;

        let pointer = match &element_json.c_path {
            None => None,
            Some(path_string) => {
                let result = program.content_at_path(Program::ROOT, &Path::from(path_string.as_str()), None);
                let container = result.container().ok_or_else(|| {
                    StoryError::runtime(format!(
                        "When loading state, internal story location couldn't be found: {}. Has the story changed since this save data was created?",
                        path_string,
                    ))
                })?;
                if result.approximate {
                    warnings.push(format!(
                        "When loading state, exact internal story location couldn't be found: '{}', so it was approximated to '{}' to recover. Has the story changed since this save data was created?",
                        path_string,
                        program.container(container).path(),
                    ));
                }
                let index = usize::try_from(element_json.idx).ok();
                Some(Pointer::new(container, index))
            }
        };

        let mut element = Element::new(push_type, pointer, element_json.exp);
        for (name, value) in &element_json.temp {
            element.temporary_variables.insert(name.clone(), read_value(value)?);
        }
        thread.callstack.push(element);
    }

    if let Some(previous) = &json.previous_content_object {
        thread.previous_pointer = program.pointer_at_path(&Path::from(previous.as_str()))?.pointer;
    }
    Ok(thread)
}

/// Counts keyed by container path, dropping paths the story no longer has.
fn read_counts<T: Copy>(program: &Program, counts: &IndexMap<String, T>) -> IndexMap<ContainerId, T> {
    counts
        .iter()
        .filter_map(|(path, value)| {
            let result = program.content_at_path(Program::ROOT, &Path::from(path.as_str()), None);
            match result.container() {
                Some(container) if !result.approximate => Some((container, *value)),
                _ => {
                    debug!(path = %path, "dropping count for a container the story no longer has");
                    None
                }
            }
        })
        .collect()
}

/// Replaces the state's contents with those of a save.
pub(crate) fn read_state(state: &mut StoryState, json: &str) -> Result<()> {
    let raw: Json = serde_json::from_str(json).map_err(|err| save_error(err.to_string()))?;
    let version = raw
        .get("inkSaveVersion")
        .and_then(Json::as_u64)
        .ok_or_else(|| save_error("missing inkSaveVersion"))?;
    if version < StoryState::MIN_COMPATIBLE_LOAD_VERSION as u64 {
        return Err(StoryError::SaveVersionTooOld {
            found: version as u32,
            minimum: StoryState::MIN_COMPATIBLE_LOAD_VERSION,
        });
    }
    let save: SaveFile = serde_json::from_value(raw).map_err(|err| save_error(err.to_string()))?;

    let program = Rc::clone(&state.program);
    let mut warnings = vec![];

    let mut call_stack = CallStack::new();
    call_stack.threads = save
        .callstack_threads
        .threads
        .iter()
        .map(|thread| read_thread(&program, thread, &mut warnings))
        .collect::<Result<_>>()?;
    if call_stack.threads.is_empty() {
        return Err(save_error("call stack has no threads"));
    }
    call_stack.thread_counter = save.callstack_threads.thread_counter;

    let mut choices = Vec::with_capacity(save.current_choices.len());
    for choice in &save.current_choices {
        let thread = match call_stack.thread_with_index(choice.original_thread_index) {
            Some(thread) => thread.clone(),
            None => {
                let saved = save
                    .choice_threads
                    .get(&choice.original_thread_index.to_string())
                    .ok_or_else(|| save_error(format!("missing thread {} for choice", choice.original_thread_index)))?;
                read_thread(&program, saved, &mut warnings)?
            }
        };
        choices.push(Choice {
            text: choice.text.clone(),
            source_path: choice.original_choice_path.clone(),
            target_path: Path::from(choice.target_path.as_str()),
            is_invisible_default: choice.is_invisible_default,
            tags: choice.tags.clone(),
            index: choice.index,
            thread_at_generation: thread,
        });
    }

    let mut globals = IndexMap::with_capacity(save.variables_state.len());
    for (name, value) in &save.variables_state {
        globals.insert(name.clone(), read_value(value)?);
    }

    let diverted_pointer = match &save.current_divert_target {
        Some(target) => program.pointer_at_path(&Path::from(target.as_str()))?.pointer,
        None => None,
    };

    let visit_counts = read_counts(&program, &save.visit_counts);
    let turn_indices = read_counts(&program, &save.turn_indices);

    state.call_stack = call_stack;
    state.current_choices = choices;
    state.variables.load_globals(globals);
    state.evaluation_stack = read_stream(&save.eval_stack)?;
    state.reset_output(Some(read_stream(&save.output_stream)?));
    state.diverted_pointer = diverted_pointer;
    state.visit_counts = Rc::new(visit_counts);
    state.turn_indices = Rc::new(turn_indices);
    state.current_turn_index = save.turn_idx;
    state.story_seed = save.story_seed;
    state.previous_random = save.previous_random;
    state.patch = None;

    for warning in warnings {
        state.add_error(warning, true);
    }
    debug!(version, "loaded save");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoryConfig;
    use crate::json::read_program;

    fn state() -> StoryState {
        let json = r##"{"inkVersion":21,"root":[["^a",{"->":"knot"},null],"done",{"knot":["^b","end",{"#f":3}],"global decl":["ev",5,{"VAR=":"x"},"/ev","end",null]}],"listDefs":{}}"##;
        let program = read_program(json).unwrap();
        StoryState::new(Rc::new(program), &StoryConfig { story_seed: Some(1), ..StoryConfig::default() })
    }

    #[test]
    fn rejects_old_and_unversioned_saves() {
        let mut state = state();
        assert!(matches!(state.load_json("{}"), Err(StoryError::SaveFormat(..))));
        assert_eq!(
            state.load_json(r#"{"inkSaveVersion": 7}"#).unwrap_err(),
            StoryError::SaveVersionTooOld { found: 7, minimum: 8 },
        );
    }

    #[test]
    fn round_trips_counters_and_stacks() {
        let mut state = state();
        let knot = state.program.knot_container_with_name("knot").unwrap();
        state.increment_visit_count_for_container(knot);
        state.current_turn_index = 2;
        state.record_turn_index_visit_to_container(knot);
        state.push_to_output_stream(Object::string("hello"));
        state.push_evaluation_stack(Object::Value(Value::Int(4)));
        state.call_stack.set_temporary_variable("t", Value::Float(1.5), true, crate::schema::VariableContext::Unknown).unwrap();

        let saved = state.to_json().unwrap();
        let raw: Json = serde_json::from_str(&saved).unwrap();
        assert_eq!(raw["outputStream"], serde_json::json!(["^hello"]));
        assert_eq!(raw["visitCounts"], serde_json::json!({"knot": 1}));

        let mut loaded = self::state();
        loaded.load_json(&saved).unwrap();
        assert_eq!(loaded.visit_count_at_path_string("knot").unwrap(), 1);
        assert_eq!(loaded.turns_since_for_container(knot).unwrap(), 0);
        assert_eq!(loaded.current_text(), "hello");
        assert_eq!(loaded.evaluation_stack, vec![Object::Value(Value::Int(4))]);
        assert_eq!(loaded.call_stack.threads, state.call_stack.threads);
        assert!(!loaded.has_warning());
    }

    #[test]
    fn writes_a_flat_envelope() {
        let saved = state().to_json().unwrap();
        let raw: Json = serde_json::from_str(&saved).unwrap();
        let keys: Vec<&str> = raw.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "callstackThreads",
                "outputStream",
                "currentChoices",
                "variablesState",
                "evalStack",
                "visitCounts",
                "turnIndices",
                "turnIdx",
                "storySeed",
                "previousRandom",
                "inkSaveVersion",
                "inkFormatVersion",
            ],
        );
        assert!(raw.get("flows").is_none());
    }

    #[test]
    fn drops_counts_for_missing_containers() {
        let mut state = state();
        let save = r#"{
            "callstackThreads": {"threads": [{"callstack": [{"cPath": "knot", "idx": 0, "exp": false, "type": 0}], "threadIndex": 0}], "threadCounter": 0},
            "outputStream": [], "currentChoices": [], "variablesState": {}, "evalStack": [],
            "visitCounts": {"gone": 3}, "turnIndices": {}, "turnIdx": 0, "storySeed": 9, "inkSaveVersion": 8
        }"#;
        state.load_json(save).unwrap();
        assert_eq!(state.current_path_string().as_deref(), Some("knot.0"));
        assert_eq!(state.story_seed(), 9);
        assert!(state.visit_counts.is_empty());
    }

    #[test]
    fn approximated_locations_warn() {
        let mut state = state();
        let save = r#"{
            "callstackThreads": {"threads": [{"callstack": [{"cPath": "knot.missing", "idx": 0, "exp": false, "type": 0}], "threadIndex": 0}], "threadCounter": 0},
            "outputStream": [], "currentChoices": [], "variablesState": {}, "evalStack": [], "turnIdx": 0, "storySeed": 1, "inkSaveVersion": 9
        }"#;
        state.load_json(save).unwrap();
        assert!(state.has_warning());
        assert!(state.current_warnings()[0].contains("approximated to 'knot'"));
    }
}
