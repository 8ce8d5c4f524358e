use ink_engine_runtime::{Story, StoryConfig, StoryError, Value};

fn story(json: &str) -> Story {
    Story::new(json).unwrap()
}

fn seeded(json: &str, seed: i32) -> Story {
    let config = StoryConfig { story_seed: Some(seed), ..StoryConfig::default() };
    Story::with_config(json, config).unwrap()
}

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
    ],
    "listDefs": {}
}"##;

#[test]
fn glue_joins_lines() {
    let mut story = story(r#"{"inkVersion": 21, "root": ["^Hello", "<>", "\n", "^ world!", "\n", "done", null]}"#);
    assert_eq!(story.continue_story().unwrap(), "Hello world!\n");
    assert!(!story.can_continue());
    assert!(!story.has_error());
}

#[test]
fn lines_are_returned_one_at_a_time() {
    let mut story = story(r#"{"inkVersion": 21, "root": ["^One", "\n", "^Two", "\n", "done", null]}"#);
    assert_eq!(story.continue_story().unwrap(), "One\n");
    assert!(story.can_continue());
    assert_eq!(story.continue_story().unwrap(), "Two\n");
    assert!(!story.can_continue());
}

#[test]
fn continue_maximally_collects_every_line() {
    let mut story = story(r#"{"inkVersion": 21, "root": ["^One", "\n", "^Two", "\n", "done", null]}"#);
    assert_eq!(story.continue_maximally().unwrap(), "One\nTwo\n");
}

#[test]
fn continuing_past_the_end_is_an_error() {
    let mut story = story(r#"{"inkVersion": 21, "root": ["^One", "\n", "done", null]}"#);
    story.continue_story().unwrap();
    assert_eq!(story.continue_story(), Err(StoryError::CannotContinue));
}

#[test]
fn choices_are_offered_and_followed() {
    let mut story = story(COLOURS);
    assert_eq!(story.continue_story().unwrap(), "Pick one.\n");
    let choices: Vec<_> = story.current_choices().iter().map(|choice| choice.text().to_owned()).collect();
    assert_eq!(choices, ["Red", "Blue"]);
    assert_eq!(story.current_choices()[1].index(), 1);

    story.choose_choice_index(1).unwrap();
    assert_eq!(story.continue_story().unwrap(), "Blue it is.\n");
    assert!(!story.can_continue());
    assert!(!story.has_error());
}

#[test]
fn once_only_choices_disappear_after_being_chosen() {
    let mut story = story(COLOURS);
    story.continue_story().unwrap();
    story.choose_choice_index(0).unwrap();
    assert_eq!(story.continue_story().unwrap(), "You chose red.\n");
    assert_eq!(story.continue_story().unwrap(), "Pick one.\n");

    let choices: Vec<_> = story.current_choices().iter().map(|choice| choice.text().to_owned()).collect();
    assert_eq!(choices, ["Blue"]);
    assert_eq!(story.state().current_turn_index(), 0);
}

#[test]
fn choice_index_out_of_range() {
    let mut story = story(COLOURS);
    story.continue_story().unwrap();
    assert_eq!(
        story.choose_choice_index(5),
        Err(StoryError::ChoiceOutOfRange { index: 5, count: 2 }),
    );
}

#[test]
fn visits_are_counted() {
    let mut story = story(
        r##"{"inkVersion": 21, "root": [
            {"->": "knot"},
            {"knot": ["^Visits: ", "ev", {"CNT?": ".^"}, "out", "/ev", "\n", "end", {"#f": 1}]}
        ]}"##,
    );
    assert_eq!(story.continue_story().unwrap(), "Visits: 1\n");
    assert_eq!(story.state().visit_count_at_path_string("knot"), Ok(1));
}

#[test]
fn choose_path_string_jumps_to_a_knot() {
    let mut story = story(
        r##"{"inkVersion": 21, "root": [
            "^Start", "\n", "done",
            {"knot": ["^In the knot", "\n", "end", {"#f": 1}]}
        ]}"##,
    );
    story.choose_path_string("knot", true, &[]).unwrap();
    assert_eq!(story.continue_story().unwrap(), "In the knot\n");
}

#[test]
fn tags_are_separate_from_text() {
    let mut story = story(r##"{"inkVersion": 21, "root": ["#", "^chapter one", "/#", "^Hello", "\n", "done", null]}"##);
    assert_eq!(story.global_tags().unwrap(), ["chapter one"]);
    assert_eq!(story.continue_story().unwrap(), "Hello\n");
    assert_eq!(story.current_tags(), ["chapter one"]);
}

#[test]
fn legacy_tags_are_read() {
    let mut story = story(r##"{"inkVersion": 20, "root": [{"#": "old style"}, "^Hello", "\n", "done", null]}"##);
    assert_eq!(story.continue_story().unwrap(), "Hello\n");
    assert_eq!(story.current_tags(), ["old style"]);
}

#[test]
fn choices_carry_their_tags() {
    let mut story = story(
        r##"{"inkVersion": 21, "root": [
            [
                "ev", "str", "^Go", "#", "^fast", "/#", "/str", "/ev", {"*": "0.c-0", "flg": 20},
                {"c-0": ["^Gone", "\n", "end", {"#f": 5}]}
            ],
            "done",
            null
        ]}"##,
    );
    assert_eq!(story.continue_story().unwrap(), "");
    let choice = story.current_choices()[0];
    assert_eq!(choice.text(), "Go");
    assert_eq!(choice.tags(), ["fast"]);
}

#[test]
fn invisible_default_choice_is_followed() {
    let mut story = story(
        r##"{"inkVersion": 21, "root": [
            [
                "^Before", "\n",
                {"*": "0.c-0", "flg": 8},
                {"c-0": ["^After", "\n", "end", {"#f": 5}]}
            ],
            "done",
            null
        ]}"##,
    );
    assert_eq!(story.continue_maximally().unwrap(), "Before\nAfter\n");
    assert!(!story.has_error());
}

#[test]
fn random_is_deterministic_for_a_seed() {
    let json = r#"{"inkVersion": 21, "root": ["ev", 1, 6, "rnd", "out", "/ev", "\n", "end", null]}"#;
    let first = seeded(json, 7).continue_story().unwrap();
    let second = seeded(json, 7).continue_story().unwrap();
    assert_eq!(first, second);

    let roll: i32 = first.trim().parse().unwrap();
    assert!((1..=6).contains(&roll));
}

#[test]
fn seed_random_overrides_the_configured_seed() {
    let json = r#"{"inkVersion": 21, "root": [
        "ev", 3, "srnd", "pop", 1, 100, "rnd", "out", "/ev", "\n", "end", null
    ]}"#;
    let first = seeded(json, 1).continue_story().unwrap();
    let second = seeded(json, 2).continue_story().unwrap();
    assert_eq!(first, second);
}

#[test]
fn shuffles_are_deterministic_for_a_seed() {
    let json = r#"{"inkVersion": 21, "root": [
        "ev", 0, 4, "seq", "out", 1, 4, "seq", "out", "/ev", "\n", "end", null
    ]}"#;
    let first = seeded(json, 3).continue_story().unwrap();
    assert_eq!(first, seeded(json, 3).continue_story().unwrap());

    let picks: Vec<char> = first.trim().chars().collect();
    assert_eq!(picks.len(), 2);
    assert!(picks.iter().all(|pick| ('0'..='3').contains(pick)));
    assert_ne!(picks[0], picks[1]);
}

#[test]
fn random_with_an_empty_range_is_an_error() {
    let mut story = story(r#"{"inkVersion": 21, "root": ["ev", 5, 1, "rnd", "out", "/ev", "\n", "end", null]}"#);
    story.continue_story().unwrap();
    assert!(story.has_error());
    assert!(story.current_errors()[0].contains("The maximum must be larger"));
}

#[test]
fn list_random_of_an_empty_list_is_empty() {
    let mut story = story(r#"{"inkVersion": 21, "root": ["^Picked: ", "ev", {"list": {}}, "lrnd", "out", "/ev", "\n", "end", null]}"#);
    assert_eq!(story.continue_story().unwrap(), "Picked:\n");
    assert!(!story.has_error());
}

#[test]
fn list_random_of_a_single_item() {
    let mut story = story(
        r#"{"inkVersion": 21, "root": ["ev", {"list": {"colours.red": 1}}, "lrnd", "out", "/ev", "\n", "end", null],
            "listDefs": {"colours": {"red": 1, "green": 2}}}"#,
    );
    assert_eq!(story.continue_story().unwrap(), "red\n");
}

#[test]
fn tunnel_return_at_top_level_is_an_error() {
    let mut story = story(r#"{"inkVersion": 21, "root": ["ev", "void", "/ev", "->->", "done", null]}"#);
    assert_eq!(story.continue_story().unwrap(), "");
    assert!(story.has_error());
    assert!(story.current_errors()[0].contains("when expected end of flow"));
}

#[test]
fn running_out_of_content_is_an_error() {
    let mut story = story(r#"{"inkVersion": 21, "root": ["^Dangling", "\n", null]}"#);
    assert_eq!(story.continue_story().unwrap(), "Dangling\n");
    assert!(story.current_errors()[0].contains("ran out of content"));
}

#[test]
fn missing_variables_warn_and_read_as_zero() {
    let mut story = story(r#"{"inkVersion": 21, "root": ["ev", {"VAR?": "nope"}, "out", "/ev", "\n", "end", null]}"#);
    assert_eq!(story.continue_story().unwrap(), "0\n");
    assert!(story.has_warning());
    assert!(story.current_warnings()[0].contains("Variable not found: 'nope'"));
}

#[test]
fn globals_are_declared_before_the_story_starts() {
    let mut story = story(
        r#"{"inkVersion": 21, "root": [
            "ev", {"VAR?": "x"}, "out", "/ev", "\n",
            "ev", 5, "/ev", {"VAR=": "x", "re": true},
            "^done", "\n", "end",
            {"global decl": ["ev", 1, {"VAR=": "x"}, "/ev", "end", null]}
        ]}"#,
    );
    assert_eq!(story.variable("x"), Some(Value::Int(1)));
    assert_eq!(story.continue_story().unwrap(), "1\n");
    assert_eq!(story.continue_story().unwrap(), "done\n");
    assert_eq!(story.variable("x"), Some(Value::Int(5)));
}

const STORE_VOID: &str = r#"{"inkVersion": 21, "root": [
    "ev", {"f()": "noop"}, "/ev", {"VAR=": "x", "re": true},
    "^[", "ev", {"VAR?": "x"}, "out", "/ev", "^]", "\n", "end",
    {
        "noop": ["ev", "void", "/ev", "~ret", null],
        "global decl": ["ev", 0, {"VAR=": "x"}, "/ev", "end", null]
    }
]}"#;

#[test]
fn void_results_can_be_stored() {
    let mut story = story(STORE_VOID);
    assert_eq!(story.continue_story().unwrap(), "[]\n");
    assert!(!story.has_error());
    assert_eq!(story.variable("x"), Some(Value::Void));

    let saved = story.save_state().unwrap();
    let mut restored = self::story(STORE_VOID);
    restored.load_state(&saved).unwrap();
    assert_eq!(restored.variable("x"), Some(Value::Void));
}

#[test]
fn setting_an_undeclared_variable_fails() {
    let mut story = story(r#"{"inkVersion": 21, "root": ["done", null]}"#);
    assert_eq!(
        story.set_variable("ghost", 3),
        Err(StoryError::UndeclaredVariable("ghost".to_owned())),
    );
}

#[test]
fn version_gating() {
    assert_eq!(
        Story::new(r#"{"inkVersion": 22, "root": [null]}"#).unwrap_err(),
        StoryError::InkVersionTooNew { found: 22, current: 21 },
    );
    assert_eq!(
        Story::new(r#"{"inkVersion": 17, "root": [null]}"#).unwrap_err(),
        StoryError::InkVersionTooOld { found: 17, minimum: 18 },
    );
    assert_eq!(Story::new(r#"{"root": [null]}"#).unwrap_err(), StoryError::MissingInkVersion);
    assert_eq!(Story::new(r#"{"inkVersion": 21}"#).unwrap_err(), StoryError::MissingRoot);
}

#[test]
fn story_json_round_trips() {
    let story = story(COLOURS);
    let written = story.to_json().unwrap();
    let mut reread = Story::new(&written).unwrap();
    assert_eq!(reread.continue_story().unwrap(), "Pick one.\n");
    assert_eq!(reread.current_choices().len(), 2);
}
