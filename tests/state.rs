use std::cell::RefCell;
use std::rc::Rc;

use ink_engine_runtime::{Story, StoryConfig, StoryError, Value};

const COLOURS: &str = r##"{
    "inkVersion": 21,
    "root": [
        [
            "^Pick one.", "\n",
            "ev", "str", "^Red", "/str", "/ev", {"*": "0.c-0", "flg": 20},
            "ev", "str", "^Blue", "/str", "/ev", {"*": "0.c-1", "flg": 20},
            {
                "c-0": ["^You chose red.", "\n", {"->": "0"}, {"#f": 5}],
                "c-1": ["^Blue it is.", "\n", "end", {"#f": 5}]
            }
        ],
        "done",
        null
    ]
}"##;

const COUNTER: &str = r#"{"inkVersion": 21, "root": [
    "ev", {"VAR?": "x"}, "out", "/ev", "\n",
    "ev", 5, "/ev", {"VAR=": "x", "re": true},
    "^done", "\n", "end",
    {"global decl": ["ev", 1, {"VAR=": "x"}, "/ev", "end", null]}
]}"#;

const DICE: &str = r#"{"inkVersion": 21, "root": [
    "ev", 1, 100, "rnd", "out", "/ev", "\n",
    "ev", 1, 100, "rnd", "out", "/ev", "\n",
    "ev", 0, 4, "seq", "out", 1, 4, "seq", "out", "/ev", "\n",
    "ev", 1, 100, "rnd", "out", "/ev", "\n",
    "end", null
]}"#;

fn choice_texts(story: &Story) -> Vec<String> {
    story.current_choices().iter().map(|choice| choice.text().to_owned()).collect()
}

/// Plays to the end, taking `picks` in turn, and records every line and set of choices.
fn play(story: &mut Story, picks: &[usize]) -> Vec<String> {
    let mut transcript = vec![];
    let mut picks = picks.iter();
    loop {
        while story.can_continue() {
            transcript.push(story.continue_story().unwrap());
        }
        let choices = choice_texts(story);
        if choices.is_empty() {
            break;
        }
        transcript.push(format!("choices: {}", choices.join(" | ")));
        story.choose_choice_index(*picks.next().unwrap()).unwrap();
    }
    transcript.push(format!("turn {}", story.state().current_turn_index()));
    transcript
}

/// Saves `story`, then checks a fresh story loaded from the save plays out the same way.
fn assert_restores_identically(json: &str, story: &mut Story, picks: &[usize]) {
    let saved = story.save_state().unwrap();
    let mut restored = Story::new(json).unwrap();
    restored.load_state(&saved).unwrap();

    let expected = play(story, picks);
    assert_eq!(play(&mut restored, picks), expected);
    assert!(!restored.has_error());
    assert_eq!(restored.save_state().unwrap(), story.save_state().unwrap());
}

#[test]
fn saves_restore_choices_and_counts() {
    let mut story = Story::new(COLOURS).unwrap();
    story.continue_story().unwrap();
    story.choose_choice_index(0).unwrap();
    story.continue_story().unwrap();
    story.continue_story().unwrap();
    let saved = story.save_state().unwrap();

    let mut restored = Story::new(COLOURS).unwrap();
    restored.load_state(&saved).unwrap();
    assert_eq!(choice_texts(&restored), ["Blue"]);
    assert_eq!(restored.state().visit_count_at_path_string("0.c-0"), Ok(1));
    assert_eq!(restored.state().current_turn_index(), 0);

    restored.choose_choice_index(0).unwrap();
    assert_eq!(restored.continue_story().unwrap(), "Blue it is.\n");
}

#[test]
fn restored_choice_stories_play_out_identically() {
    let mut story = Story::new(COLOURS).unwrap();
    story.continue_story().unwrap();
    assert_restores_identically(COLOURS, &mut story, &[0, 0]);

    let mut story = Story::new(COLOURS).unwrap();
    story.continue_story().unwrap();
    story.choose_choice_index(0).unwrap();
    story.continue_story().unwrap();
    assert_restores_identically(COLOURS, &mut story, &[0]);
}

#[test]
fn restored_random_stories_play_out_identically() {
    for seed in [0, 11, 97] {
        let config = StoryConfig { story_seed: Some(seed), ..StoryConfig::default() };
        let mut story = Story::with_config(DICE, config).unwrap();
        story.continue_story().unwrap();
        assert_restores_identically(DICE, &mut story, &[]);
    }
}

#[test]
fn saves_use_a_flat_envelope() {
    let mut story = Story::new(COLOURS).unwrap();
    story.continue_story().unwrap();
    let saved: serde_json::Value = serde_json::from_str(&story.save_state().unwrap()).unwrap();
    let save = saved.as_object().unwrap();

    for key in [
        "inkSaveVersion",
        "callstackThreads",
        "variablesState",
        "evalStack",
        "outputStream",
        "currentChoices",
        "visitCounts",
        "turnIndices",
        "turnIdx",
        "storySeed",
        "previousRandom",
    ] {
        assert!(save.contains_key(key), "missing {}", key);
    }
    assert!(!save.contains_key("flows"));
    assert!(!save.contains_key("currentFlowName"));
    assert_eq!(save["currentChoices"].as_array().unwrap().len(), 2);
    assert!(save["callstackThreads"]["threads"].is_array());
}

#[test]
fn saves_restore_globals_and_seed() {
    let config = StoryConfig { story_seed: Some(42), ..StoryConfig::default() };
    let mut story = Story::with_config(COUNTER, config).unwrap();
    story.continue_story().unwrap();
    story.set_variable("x", 9).unwrap();
    let saved = story.save_state().unwrap();

    let mut restored = Story::new(COUNTER).unwrap();
    restored.load_state(&saved).unwrap();
    assert_eq!(restored.variable("x"), Some(Value::Int(9)));
    assert_eq!(restored.state().story_seed(), 42);
    assert_eq!(restored.continue_story().unwrap(), "done\n");
}

#[test]
fn malformed_saves_are_rejected() {
    let mut story = Story::new(COUNTER).unwrap();
    assert!(matches!(story.load_state("{}"), Err(StoryError::SaveFormat(..))));
    assert_eq!(
        story.load_state(r#"{"inkSaveVersion": 7}"#),
        Err(StoryError::SaveVersionTooOld { found: 7, minimum: 8 }),
    );
}

#[test]
fn observers_see_changes_once_the_line_is_done() {
    let seen = Rc::new(RefCell::new(vec![]));
    let mut story = Story::new(COUNTER).unwrap();
    let log = Rc::clone(&seen);
    story
        .observe_variable("x", move |name, value| log.borrow_mut().push((name.to_owned(), value.clone())))
        .unwrap();

    assert_eq!(story.continue_story().unwrap(), "1\n");
    assert!(seen.borrow().is_empty());

    assert_eq!(story.continue_story().unwrap(), "done\n");
    assert_eq!(*seen.borrow(), [("x".to_owned(), Value::Int(5))]);
}

#[test]
fn host_writes_notify_observers_immediately() {
    let seen = Rc::new(RefCell::new(vec![]));
    let mut story = Story::new(COUNTER).unwrap();
    let log = Rc::clone(&seen);
    let id = story
        .observe_variable("x", move |_, value| log.borrow_mut().push(value.clone()))
        .unwrap();

    story.set_variable("x", 3).unwrap();
    assert_eq!(*seen.borrow(), [Value::Int(3)]);

    assert_eq!(story.remove_variable_observer(id), Ok(true));
    story.set_variable("x", 4).unwrap();
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn observing_an_undeclared_variable_fails() {
    let mut story = Story::new(COUNTER).unwrap();
    assert!(matches!(
        story.observe_variable("ghost", |_, _| {}),
        Err(StoryError::UndeclaredVariable(..)),
    ));
}

#[test]
fn background_saves_keep_the_state_being_saved_still() {
    let mut story = Story::new(COUNTER).unwrap();
    story.continue_story().unwrap();

    let saving = story.copy_state_for_background_thread_save().unwrap();
    assert_eq!(
        story.copy_state_for_background_thread_save().unwrap_err(),
        StoryError::BackgroundSaveActive,
    );

    // Play continues on a patched copy while the handed-over state is saved.
    assert_eq!(story.continue_story().unwrap(), "done\n");
    let saved = saving.to_json().unwrap();
    story.background_save_complete();
    assert_eq!(story.variable("x"), Some(Value::Int(5)));

    let mut restored = Story::new(COUNTER).unwrap();
    restored.load_state(&saved).unwrap();
    assert_eq!(restored.variable("x"), Some(Value::Int(1)));
    assert_eq!(restored.continue_story().unwrap(), "done\n");
}

#[test]
fn reset_state_starts_over() {
    let mut story = Story::new(COUNTER).unwrap();
    story.continue_maximally().unwrap();
    assert_eq!(story.variable("x"), Some(Value::Int(5)));

    story.reset_state().unwrap();
    assert_eq!(story.variable("x"), Some(Value::Int(1)));
    assert_eq!(story.continue_story().unwrap(), "1\n");
}
