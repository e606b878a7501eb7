use plate_core::{
    CommandSpec, Editor, Marks, Op, PlatePlugin, PluginRegistry, QueryError, QuerySpec,
    RegistryError, Transaction,
};

#[test]
fn marks_queries_reflect_active_marks_at_focus() {
    let mut editor = Editor::with_richtext_plugins();

    editor
        .apply(Transaction::new(vec![Op::InsertText {
            path: vec![0, 0],
            offset: 0,
            text: "hello".to_string(),
        }]))
        .unwrap();

    let bold = Some(serde_json::json!({ "mark": "bold" }));
    let italic = Some(serde_json::json!({ "mark": "italic" }));

    assert_eq!(
        editor
            .run_query::<bool>("marks.is_active", bold.clone())
            .unwrap(),
        false
    );
    editor.run_command("marks.toggle", bold.clone()).unwrap();
    assert_eq!(
        editor
            .run_query::<bool>("marks.is_active", bold.clone())
            .unwrap(),
        true
    );

    editor.run_command("marks.toggle", italic.clone()).unwrap();
    assert_eq!(
        editor.run_query::<bool>("marks.is_active", italic).unwrap(),
        true
    );

    let active = editor.run_query::<Marks>("marks.get_active", None).unwrap();
    assert!(active.bold);
    assert!(active.italic);
    assert!(!active.underline);
}

#[test]
fn block_queries_accept_type_and_align_keys() {
    let mut editor = Editor::with_richtext_plugins();

    editor
        .run_command(
            "block.toggle",
            Some(serde_json::json!({ "format": "heading-three" })),
        )
        .unwrap();
    assert!(
        editor
            .run_query::<bool>(
                "block.is_active",
                Some(serde_json::json!({ "format": "heading-three", "key": "type" })),
            )
            .unwrap()
    );
    assert!(
        !editor
            .run_query::<bool>(
                "block.is_active",
                Some(serde_json::json!({ "format": "right", "key": "align" })),
            )
            .unwrap()
    );

    let err = editor
        .run_query::<bool>(
            "block.is_active",
            Some(serde_json::json!({ "format": "heading-three", "key": "color" })),
        )
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidArg(_)));
}

#[test]
fn query_errors_are_reported() {
    let editor = Editor::with_richtext_plugins();

    assert_eq!(
        editor.run_query_json("marks.is_bold_active", None),
        Err(QueryError::UnknownQuery("marks.is_bold_active".to_string()))
    );
    assert_eq!(
        editor.run_query_json("marks.is_active", None),
        Err(QueryError::MissingArg("mark"))
    );
    assert!(matches!(
        editor.run_query_json("marks.is_active", Some(serde_json::json!({ "mark": "blink" }))),
        Err(QueryError::InvalidArg(_))
    ));
    assert!(matches!(
        editor.run_query::<String>("checklist.is_active", None),
        Err(QueryError::Decode(_))
    ));
}

#[test]
fn core_registry_only_handles_text() {
    let mut editor = Editor::with_core_plugins();

    assert!(editor.registry().command("text.insert").is_some());
    assert!(editor.registry().command("marks.toggle").is_none());
    assert!(matches!(
        editor.run_command("marks.toggle", Some(serde_json::json!({ "mark": "bold" }))),
        Err(plate_core::CommandError::UnknownCommand(_))
    ));
    assert!(editor.registry().queries().is_empty());
}

#[test]
fn richtext_commands_carry_descriptions() {
    let registry = PluginRegistry::richtext();

    for id in [
        "marks.toggle",
        "block.toggle",
        "checklist.toggle",
        "link.toggle",
        "link.untoggle",
        "image.toggle",
        "emoji.toggle",
    ] {
        let command = registry.command(id).unwrap();
        assert_eq!(command.id, id);
        assert!(command.description.is_some(), "{id} has no description");
        assert!(!command.keywords.is_empty(), "{id} has no keywords");
    }
}

struct WordCountPlugin;

impl PlatePlugin for WordCountPlugin {
    fn id(&self) -> &'static str {
        "word_count"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![CommandSpec::new("word_count.noop", "No-op", |_editor, _args| Ok(()))]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("word_count.words", |editor, _args| {
            let words = editor
                .doc()
                .texts()
                .iter()
                .map(|(_, t)| t.text.split_whitespace().count())
                .sum::<usize>();
            Ok(serde_json::json!(words))
        })]
    }
}

#[test]
fn custom_plugins_extend_the_registry() {
    let mut registry = PluginRegistry::core();
    registry.register_plugin(Box::new(WordCountPlugin)).unwrap();

    let mut editor = Editor::new(
        plate_core::Document::new(vec![plate_core::Node::paragraph("one two three")]),
        None,
        registry,
    )
    .unwrap();
    assert_eq!(editor.run_query::<usize>("word_count.words", None).unwrap(), 3);
    editor.run_command("word_count.noop", None).unwrap();
    assert!(!editor.can_undo());
}

#[test]
fn duplicate_ids_are_rejected() {
    let plugins: Vec<Box<dyn PlatePlugin>> =
        vec![Box::new(WordCountPlugin), Box::new(WordCountPlugin)];
    let err = PluginRegistry::new(plugins).err().unwrap();
    assert_eq!(
        err,
        RegistryError::DuplicateCommand("word_count.noop".to_string())
    );
}
