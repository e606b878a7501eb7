use plate_core::transforms::{document_range, nodes, unhang_range};
use plate_core::{
    Command, Draft, EditorConfig, EditorState, ElementKind, ElementNode, MatchMode, Mutation,
    Node, NodeMatch, PluginRegistry, Point, PropsPatch, Scope, Selection, apply_command,
};

fn state(children: Vec<Node>, selection: Option<Selection>) -> EditorState {
    EditorState::new(plate_core::Document::new(children), selection)
}

fn nested_list() -> Vec<Node> {
    vec![
        Node::paragraph("intro"),
        Node::element(
            ElementKind::BulletedList,
            vec![Node::list_item("a"), Node::list_item("b")],
        ),
    ]
}

#[test]
fn nodes_respects_match_mode() {
    let state = state(nested_list(), None);
    let range = document_range(&state.doc).unwrap();

    assert_eq!(
        nodes(&state.doc, &range, &NodeMatch::Block, MatchMode::Lowest),
        vec![vec![0], vec![1, 0], vec![1, 1]]
    );
    assert_eq!(
        nodes(&state.doc, &range, &NodeMatch::Block, MatchMode::Highest),
        vec![vec![0], vec![1]]
    );
    assert_eq!(
        nodes(&state.doc, &range, &NodeMatch::Text, MatchMode::All),
        vec![vec![0, 0], vec![1, 0, 0], vec![1, 1, 0]]
    );
}

#[test]
fn unhang_pulls_end_back_into_previous_block() {
    let state = state(nested_list(), None);
    let range = Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![1, 0, 0], 0));

    let unhung = unhang_range(&state.doc, &range);
    assert_eq!(unhung.end(), Point::new(vec![0, 0], 5));

    let partial = Selection::new(Point::new(vec![0, 0], 2), Point::new(vec![1, 0, 0], 0));
    assert_eq!(unhang_range(&state.doc, &partial), partial);
}

#[test]
fn draft_records_inverse_ops_that_restore_the_document() {
    let before = state(nested_list(), None);
    let mut draft = Draft::new(before.clone());

    draft
        .run(
            Mutation::set(PropsPatch::kind(ElementKind::HeadingOne))
                .at(Scope::Document)
                .matching(NodeMatch::TextBlock),
        )
        .unwrap();
    draft
        .run(
            Mutation::wrap(ElementNode::new(ElementKind::BlockQuote, Vec::new()))
                .at(Scope::Path(vec![0])),
        )
        .unwrap();

    let (after, ops, inverse_ops) = draft.finish();
    assert!(!ops.is_empty());
    assert_eq!(ops.len(), inverse_ops.len());
    assert_ne!(after.doc, before.doc);

    let mut undo = Draft::new(after);
    for op in inverse_ops {
        undo.apply(op).unwrap();
    }
    assert_eq!(undo.state().doc, before.doc);
}

#[test]
fn unwrap_with_split_only_lifts_touched_children() {
    let mut draft = Draft::new(state(
        nested_list(),
        Some(Selection::collapsed(Point::new(vec![1, 1, 0], 0))),
    ));

    draft
        .run(Mutation::unwrap(NodeMatch::Kind(ElementKind::BulletedList)).split(true))
        .unwrap();

    assert_eq!(
        draft.doc().children,
        vec![
            Node::paragraph("intro"),
            Node::element(ElementKind::BulletedList, vec![Node::list_item("a")]),
            Node::list_item("b"),
        ]
    );
    assert_eq!(
        draft.selection(),
        Some(&Selection::collapsed(Point::new(vec![2, 0], 0)))
    );
}

#[test]
fn apply_command_leaves_input_state_untouched() {
    let input = state(
        vec![Node::paragraph("Hello")],
        Some(Selection::new(
            Point::new(vec![0, 0], 0),
            Point::new(vec![0, 0], 5),
        )),
    );
    let snapshot = input.clone();
    let registry = PluginRegistry::richtext();

    let commit = apply_command(
        &input,
        &registry,
        &EditorConfig::default(),
        &Command::ToggleBlock {
            format: "heading-two".to_string(),
        },
    )
    .unwrap();

    assert_eq!(input, snapshot);
    assert_eq!(
        commit.state.doc.children,
        vec![Node::element(
            ElementKind::HeadingTwo,
            vec![Node::text("Hello")]
        )]
    );
    assert_eq!(commit.ops.len(), commit.inverse_ops.len());
}

#[test]
fn commands_deserialize_from_tagged_json() {
    let command: Command = serde_json::from_value(serde_json::json!({
        "command": "toggle_mark",
        "mark": "underline",
    }))
    .unwrap();
    assert_eq!(
        command,
        Command::ToggleMark {
            mark: plate_core::Mark::Underline
        }
    );

    let command: Command =
        serde_json::from_value(serde_json::json!({ "command": "toggle_checked" })).unwrap();
    assert_eq!(command, Command::ToggleChecked { path: None });
    assert_eq!(command.name(), "toggle_checked");
}

#[test]
fn insert_and_move_mutations() {
    let mut draft = Draft::new(state(
        vec![Node::paragraph("ab"), Node::paragraph("c")],
        Some(Selection::collapsed(Point::new(vec![0, 0], 1))),
    ));

    draft
        .run(Mutation::insert(vec![Node::paragraph("x")]))
        .unwrap();
    assert_eq!(
        draft.doc().children,
        vec![
            Node::paragraph("a"),
            Node::paragraph("x"),
            Node::paragraph("b"),
            Node::paragraph("c"),
        ]
    );
    assert_eq!(
        draft.selection(),
        Some(&Selection::collapsed(Point::new(vec![1, 0], 1)))
    );

    draft
        .run(
            Mutation::move_to(vec![0]).at(Scope::Range(Selection::collapsed(Point::new(
                vec![3, 0],
                0,
            )))),
        )
        .unwrap();
    assert_eq!(
        draft.doc().children,
        vec![
            Node::paragraph("c"),
            Node::paragraph("a"),
            Node::paragraph("x"),
            Node::paragraph("b"),
        ]
    );

    let err = draft
        .run(Mutation::insert(vec![Node::paragraph("y")]).at(Scope::Document))
        .unwrap_err();
    assert!(matches!(err, plate_core::ApplyError::InvalidOp(_)));
}
