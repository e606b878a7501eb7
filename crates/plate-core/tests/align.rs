use plate_core::{
    Document, Editor, ElementKind, ElementNode, Node, PluginRegistry, Point, Selection,
};

fn editor_with(doc: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document::new(doc), Some(selection), PluginRegistry::richtext())
        .unwrap()
}

fn aligned(kind: ElementKind, text: &str, align: &str) -> Node {
    Node::Element(
        ElementNode::new(kind, vec![Node::text(text)])
            .with_attr("align", serde_json::json!(align)),
    )
}

fn toggle(editor: &mut Editor, format: &str) {
    editor
        .run_command("block.toggle", Some(serde_json::json!({ "format": format })))
        .unwrap();
}

fn align_query(editor: &Editor) -> Option<String> {
    editor.run_query::<Option<String>>("block.align", None).unwrap()
}

#[test]
fn align_toggles_on_and_off() {
    let mut editor = editor_with(
        vec![Node::paragraph("Hello")],
        Selection::collapsed(Point::new(vec![0, 0], 1)),
    );
    assert_eq!(align_query(&editor), None);

    toggle(&mut editor, "center");
    assert_eq!(
        editor.doc().children,
        vec![aligned(ElementKind::Paragraph, "Hello", "center")]
    );
    assert_eq!(align_query(&editor).as_deref(), Some("center"));
    assert!(
        editor
            .run_query::<bool>(
                "block.is_active",
                Some(serde_json::json!({ "format": "center", "key": "align" })),
            )
            .unwrap()
    );

    toggle(&mut editor, "center");
    assert_eq!(editor.doc().children, vec![Node::paragraph("Hello")]);
    assert_eq!(align_query(&editor), None);
}

#[test]
fn align_switches_between_values() {
    let mut editor = editor_with(
        vec![aligned(ElementKind::Paragraph, "Hello", "center")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );

    toggle(&mut editor, "right");
    assert_eq!(
        editor.doc().children,
        vec![aligned(ElementKind::Paragraph, "Hello", "right")]
    );
}

#[test]
fn align_applies_to_every_selected_block() {
    let mut editor = editor_with(
        vec![
            Node::paragraph("a"),
            Node::element(ElementKind::HeadingTwo, vec![Node::text("b")]),
        ],
        Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![1, 0], 1)),
    );

    toggle(&mut editor, "justify");
    assert_eq!(
        editor.doc().children,
        vec![
            aligned(ElementKind::Paragraph, "a", "justify"),
            aligned(ElementKind::HeadingTwo, "b", "justify"),
        ]
    );
}

#[test]
fn align_in_list_targets_the_item() {
    let mut editor = editor_with(
        vec![Node::element(
            ElementKind::BulletedList,
            vec![Node::list_item("a")],
        )],
        Selection::collapsed(Point::new(vec![0, 0, 0], 0)),
    );

    toggle(&mut editor, "left");
    assert_eq!(
        editor.doc().children,
        vec![Node::element(
            ElementKind::BulletedList,
            vec![aligned(ElementKind::ListItem, "a", "left")],
        )]
    );
}

#[test]
fn invalid_align_attribute_is_dropped_on_load() {
    let editor = editor_with(
        vec![aligned(ElementKind::Paragraph, "a", "diagonal")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );

    assert_eq!(editor.doc().children, vec![Node::paragraph("a")]);
    assert_eq!(align_query(&editor), None);
}
