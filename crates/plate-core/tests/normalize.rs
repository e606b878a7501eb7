use plate_core::normalize::NormalizePass;
use plate_core::{
    ApplyError, AttrPatch, Command, CommandError, Document, Editor, EditorConfig, ElementKind,
    ElementNode, Mark, Marks, Node, Op, PlatePlugin, PluginRegistry, Point, Selection, TextNode,
};

fn normalized(children: Vec<Node>) -> Vec<Node> {
    Editor::new(Document::new(children), None, PluginRegistry::core())
        .unwrap()
        .doc()
        .children
        .clone()
}

fn paragraph(children: Vec<Node>) -> Node {
    Node::element(ElementKind::Paragraph, children)
}

#[test]
fn empty_document_gets_a_paragraph() {
    assert_eq!(normalized(Vec::new()), vec![Node::paragraph("")]);
}

#[test]
fn root_text_is_wrapped_in_a_paragraph() {
    assert_eq!(
        normalized(vec![Node::text("a"), Node::text("b")]),
        vec![Node::paragraph("ab")]
    );
}

#[test]
fn orphan_list_item_becomes_paragraph() {
    assert_eq!(
        normalized(vec![Node::list_item("a")]),
        vec![Node::paragraph("a")]
    );
}

#[test]
fn orphan_check_list_item_is_wrapped() {
    assert_eq!(
        normalized(vec![Node::check_list_item("a", true)]),
        vec![Node::element(
            ElementKind::CheckList,
            vec![Node::check_list_item("a", true)]
        )]
    );
}

#[test]
fn paragraph_inside_check_list_is_lifted() {
    assert_eq!(
        normalized(vec![Node::element(
            ElementKind::CheckList,
            vec![Node::paragraph("x")]
        )]),
        vec![Node::paragraph("x")]
    );
}

#[test]
fn nested_link_is_lifted_out_of_its_parent_link() {
    let outer = Node::element(ElementKind::Link, vec![Node::link("v", "x")]);
    assert_eq!(
        normalized(vec![paragraph(vec![outer])]),
        vec![paragraph(vec![
            Node::text(""),
            Node::link("v", "x"),
            Node::text(""),
        ])]
    );
}

#[test]
fn attributes_are_kept_only_where_they_belong() {
    let stray = ElementNode::new(ElementKind::Paragraph, vec![Node::text("a")])
        .with_attr("checked", serde_json::json!(true))
        .with_attr("url", serde_json::json!("x"));
    let bare_link = Node::element(ElementKind::Link, vec![Node::text("b")]);
    let bad_checked = ElementNode::new(ElementKind::CheckListItem, vec![Node::text("c")])
        .with_attr("checked", serde_json::json!("yes"));

    assert_eq!(
        normalized(vec![
            Node::Element(stray),
            paragraph(vec![Node::text(""), bare_link, Node::text("")]),
            Node::element(ElementKind::CheckList, vec![Node::Element(bad_checked)]),
        ]),
        vec![
            Node::paragraph("a"),
            paragraph(vec![Node::text(""), Node::link("", "b"), Node::text("")]),
            Node::element(
                ElementKind::CheckList,
                vec![Node::check_list_item("c", false)]
            ),
        ]
    );
}

#[test]
fn empty_elements_are_filled_or_removed() {
    assert_eq!(
        normalized(vec![
            Node::element(ElementKind::BulletedList, Vec::new()),
            Node::element(ElementKind::Paragraph, Vec::new()),
        ]),
        vec![Node::paragraph("")]
    );
}

#[test]
fn text_leaves_merge_only_when_marks_match() {
    let bold = Marks::default().with(Mark::Bold);
    assert_eq!(
        normalized(vec![paragraph(vec![
            Node::Text(TextNode::with_marks("a", bold)),
            Node::text(""),
            Node::text("b"),
        ])]),
        vec![paragraph(vec![
            Node::Text(TextNode::with_marks("a", bold)),
            Node::text("b"),
        ])]
    );
}

#[test]
fn retyping_a_long_check_list_lifts_every_item_in_one_command() {
    let items: Vec<Node> = (0..150)
        .map(|i| Node::check_list_item(format!("item {i}"), false))
        .collect();
    let mut editor = Editor::new(
        Document::new(vec![Node::element(ElementKind::CheckList, items)]),
        Some(Selection::new(
            Point::new(vec![0, 0, 0], 0),
            Point::new(vec![0, 149, 0], 8),
        )),
        PluginRegistry::richtext(),
    )
    .unwrap();

    editor
        .execute(&Command::ToggleBlock {
            format: "heading-one".to_string(),
        })
        .unwrap();

    let expected: Vec<Node> = (0..150)
        .map(|i| Node::element(ElementKind::HeadingOne, vec![Node::text(format!("item {i}"))]))
        .collect();
    assert_eq!(editor.doc().children, expected);
    assert!(editor.undo());
    assert_eq!(editor.doc().children.len(), 1);
}

#[test]
fn document_with_many_orphan_items_loads_and_stays_editable() {
    let items: Vec<Node> = (0..150).map(|i| Node::list_item(format!("item {i}"))).collect();
    let mut editor = Editor::new(
        Document::new(items),
        Some(Selection::collapsed(Point::new(vec![0, 0], 0))),
        PluginRegistry::richtext(),
    )
    .unwrap();

    assert!(
        editor
            .doc()
            .children
            .iter()
            .all(|node| node.is_element_kind(ElementKind::Paragraph))
    );

    editor
        .execute(&Command::ToggleEmoji {
            emoji: "X".to_string(),
        })
        .unwrap();
    assert_eq!(editor.doc().children[0], Node::paragraph("Xitem 0"));
    assert_eq!(editor.doc().children.len(), 150);
}

#[test]
fn selection_is_snapped_onto_existing_text() {
    let editor = Editor::new(
        Document::new(vec![Node::paragraph("ab")]),
        Some(Selection::collapsed(Point::new(vec![5, 3], 9))),
        PluginRegistry::core(),
    )
    .unwrap();

    assert_eq!(
        editor.selection(),
        Some(&Selection::collapsed(Point::new(vec![0, 0], 2)))
    );
}

struct FlipFlop;

impl NormalizePass for FlipFlop {
    fn id(&self) -> &'static str {
        "test.flip_flop"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        // Settles on single-letter documents so loading one still succeeds.
        let long = doc
            .children
            .first()
            .is_some_and(|block| block.text_content().len() > 1);
        if !long {
            return Vec::new();
        }
        let on = doc
            .element(&[0])
            .and_then(|el| el.attrs.get("flip"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        vec![Op::SetNodeAttrs {
            path: vec![0],
            patch: AttrPatch::set("flip", serde_json::json!(!on)),
        }]
    }
}

struct FlipFlopPlugin;

impl PlatePlugin for FlipFlopPlugin {
    fn id(&self) -> &'static str {
        "test.flip_flop"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(FlipFlop)]
    }
}

#[test]
fn non_converging_normalization_fails_the_command() {
    let mut registry = PluginRegistry::core();
    registry.register_plugin(Box::new(FlipFlopPlugin)).unwrap();
    let config = EditorConfig {
        max_normalize_iterations: 5,
        ..EditorConfig::default()
    };
    let mut editor = Editor::with_config(
        Document::new(vec![Node::paragraph("a")]),
        Some(Selection::collapsed(Point::new(vec![0, 0], 1))),
        registry,
        config,
    )
    .unwrap();
    let before = editor.state().clone();

    let err = editor
        .run_command("text.insert", Some(serde_json::json!({ "text": "b" })))
        .unwrap_err();
    assert_eq!(
        err,
        CommandError::Apply(ApplyError::NormalizeDidNotConverge(5))
    );
    assert_eq!(editor.state(), &before);
    assert!(!editor.can_undo());
}

#[test]
fn loading_a_document_that_never_settles_fails() {
    let mut registry = PluginRegistry::core();
    registry.register_plugin(Box::new(FlipFlopPlugin)).unwrap();
    let config = EditorConfig {
        max_normalize_iterations: 5,
        ..EditorConfig::default()
    };

    let err = Editor::with_config(
        Document::new(vec![Node::paragraph("ab")]),
        None,
        registry,
        config,
    )
    .err();
    assert_eq!(err, Some(ApplyError::NormalizeDidNotConverge(5)));
}
