use plate_core::{Command, Document, Editor, Node, PluginRegistry, Point, Selection};

fn editor_with(doc: Vec<Node>, selection: Option<Selection>) -> Editor {
    Editor::new(Document::new(doc), selection, PluginRegistry::richtext())
        .unwrap()
}

#[test]
fn emoji_is_inserted_as_text_at_caret() {
    let mut editor = editor_with(
        vec![Node::paragraph("Hi")],
        Some(Selection::collapsed(Point::new(vec![0, 0], 2))),
    );

    editor
        .run_command("emoji.toggle", Some(serde_json::json!({ "emoji": "🎉" })))
        .unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("Hi🎉")]);
    // Offsets are byte offsets; the emoji is four bytes long.
    assert_eq!(
        editor.selection(),
        Some(&Selection::collapsed(Point::new(vec![0, 0], 6)))
    );
}

#[test]
fn emoji_replaces_selected_text() {
    let mut editor = editor_with(
        vec![Node::paragraph("Hello world")],
        Some(Selection::new(
            Point::new(vec![0, 0], 6),
            Point::new(vec![0, 0], 11),
        )),
    );

    editor
        .execute(&Command::ToggleEmoji {
            emoji: "👋".to_string(),
        })
        .unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("Hello 👋")]);
    assert_eq!(
        editor.selection(),
        Some(&Selection::collapsed(Point::new(vec![0, 0], 10)))
    );
}

#[test]
fn emoji_without_selection_is_a_no_op() {
    let mut editor = editor_with(vec![Node::paragraph("Hi")], None);

    editor
        .run_command("emoji.toggle", Some(serde_json::json!({ "emoji": "🎉" })))
        .unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("Hi")]);
    assert!(!editor.can_undo());
}

#[test]
fn emoji_argument_is_inserted_verbatim() {
    let mut editor = editor_with(
        vec![Node::paragraph("Hi")],
        Some(Selection::collapsed(Point::new(vec![0, 0], 2))),
    );

    editor
        .run_command("emoji.toggle", Some(serde_json::json!({ "emoji": " 🎉 " })))
        .unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("Hi 🎉 ")]);
    assert_eq!(
        editor.selection(),
        Some(&Selection::collapsed(Point::new(vec![0, 0], 8)))
    );
}
