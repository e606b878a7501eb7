use plate_core::{CommandError, Document, Editor, ElementKind, Node, PluginRegistry, Point, Selection};

fn editor_with(doc: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document::new(doc), Some(selection), PluginRegistry::richtext())
        .unwrap()
}

fn caret(path: Vec<usize>, offset: usize) -> Selection {
    Selection::collapsed(Point::new(path, offset))
}

fn toggle_block(editor: &mut Editor, format: &str) {
    editor
        .run_command("block.toggle", Some(serde_json::json!({ "format": format })))
        .unwrap();
}

fn is_active(editor: &Editor, format: &str) -> bool {
    editor
        .run_query::<bool>("block.is_active", Some(serde_json::json!({ "format": format })))
        .unwrap()
}

fn list(kind: ElementKind, items: &[&str]) -> Node {
    Node::element(kind, items.iter().map(|t| Node::list_item(*t)).collect())
}

#[test]
fn toggle_list_wraps_paragraph_and_back() {
    let mut editor = editor_with(
        vec![Node::paragraph("Hello world")],
        Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![0, 0], 11)),
    );

    toggle_block(&mut editor, "unordered-list");
    assert_eq!(
        editor.doc().children,
        vec![list(ElementKind::BulletedList, &["Hello world"])]
    );
    assert!(is_active(&editor, "bulleted-list"));
    assert_eq!(editor.selection().unwrap().anchor.path, vec![0, 0, 0]);

    toggle_block(&mut editor, "bulleted-list");
    assert_eq!(editor.doc().children, vec![Node::paragraph("Hello world")]);
    assert!(!is_active(&editor, "bulleted-list"));
}

#[test]
fn toggle_list_over_several_paragraphs_builds_one_list() {
    let mut editor = editor_with(
        vec![Node::paragraph("a"), Node::paragraph("b")],
        Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![1, 0], 1)),
    );

    toggle_block(&mut editor, "numbered-list");
    assert_eq!(
        editor.doc().children,
        vec![list(ElementKind::NumberedList, &["a", "b"])]
    );
}

#[test]
fn switching_list_kind_replaces_the_wrapper() {
    let mut editor = editor_with(
        vec![list(ElementKind::NumberedList, &["a"])],
        caret(vec![0, 0, 0], 0),
    );

    toggle_block(&mut editor, "bulleted-list");
    assert_eq!(
        editor.doc().children,
        vec![list(ElementKind::BulletedList, &["a"])]
    );
    assert!(!is_active(&editor, "numbered-list"));
}

#[test]
fn deactivating_middle_item_splits_the_list() {
    let mut editor = editor_with(
        vec![list(ElementKind::BulletedList, &["a", "b", "c"])],
        caret(vec![0, 1, 0], 0),
    );

    toggle_block(&mut editor, "bulleted-list");
    assert_eq!(
        editor.doc().children,
        vec![
            list(ElementKind::BulletedList, &["a"]),
            Node::paragraph("b"),
            list(ElementKind::BulletedList, &["c"]),
        ]
    );
    assert_eq!(editor.selection(), Some(&caret(vec![1, 0], 0)));
}

#[test]
fn heading_toggles_on_and_off() {
    let mut editor = editor_with(vec![Node::paragraph("Title")], caret(vec![0, 0], 2));

    toggle_block(&mut editor, "heading-one");
    assert_eq!(
        editor.doc().children,
        vec![Node::element(
            ElementKind::HeadingOne,
            vec![Node::text("Title")]
        )]
    );
    assert!(is_active(&editor, "heading-one"));

    toggle_block(&mut editor, "heading-two");
    assert_eq!(
        editor.doc().children,
        vec![Node::element(
            ElementKind::HeadingTwo,
            vec![Node::text("Title")]
        )]
    );

    toggle_block(&mut editor, "heading-two");
    assert_eq!(editor.doc().children, vec![Node::paragraph("Title")]);
}

#[test]
fn heading_inside_list_leaves_the_list() {
    let mut editor = editor_with(
        vec![list(ElementKind::BulletedList, &["item"])],
        caret(vec![0, 0, 0], 0),
    );

    toggle_block(&mut editor, "block-quote");
    assert_eq!(
        editor.doc().children,
        vec![Node::element(
            ElementKind::BlockQuote,
            vec![Node::text("item")]
        )]
    );
}

#[test]
fn selection_ending_at_next_block_start_is_unhung() {
    let mut editor = editor_with(
        vec![Node::paragraph("a"), Node::paragraph("b")],
        Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![1, 0], 0)),
    );

    toggle_block(&mut editor, "code-block");
    assert_eq!(
        editor.doc().children,
        vec![
            Node::element(ElementKind::CodeBlock, vec![Node::text("a")]),
            Node::paragraph("b"),
        ]
    );
}

#[test]
fn unknown_formats_are_rejected() {
    let mut editor = editor_with(vec![Node::paragraph("a")], caret(vec![0, 0], 0));

    for format in ["table", "list-item", "check-list-item", "link"] {
        let err = editor
            .run_command("block.toggle", Some(serde_json::json!({ "format": format })))
            .unwrap_err();
        assert_eq!(err, CommandError::UnknownFormat(format.to_string()));
    }
    assert_eq!(editor.doc().children, vec![Node::paragraph("a")]);
    assert!(!editor.can_undo());
}

#[test]
fn block_queries_without_selection_are_inactive() {
    let mut editor = Editor::new(
        Document::new(vec![Node::paragraph("a")]),
        None,
        PluginRegistry::richtext(),
    )
    .unwrap();

    assert!(!is_active(&editor, "paragraph"));
    toggle_block(&mut editor, "heading-one");
    assert_eq!(editor.doc().children, vec![Node::paragraph("a")]);
}
