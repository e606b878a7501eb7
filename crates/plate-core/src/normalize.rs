use serde_json::Value;

use crate::location::{self, Path, Point, Selection};
use crate::node::{
    ATTR_ALIGN, ATTR_CHECKED, ATTR_URL, Align, Attrs, Document, ElementKind, ElementNode, Marks,
    Node, TextNode,
};
use crate::ops::{AttrPatch, NodeProps, Op, apply_op_to};
use crate::schema::ChildConstraint;
use crate::transforms::lift_ops;

/// One structural rule. `run` inspects the document and returns the ops that
/// repair it; the ops are applied in order, so each must be valid against the
/// document left by the ones before it.
pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document) -> Vec<Op>;
}

pub struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        if doc.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

pub struct EnforceChildConstraints;

impl NormalizePass for EnforceChildConstraints {
    fn id(&self) -> &'static str {
        "core.enforce_child_constraints"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        // Each repair is computed against the scratch copy left by the previous ones.
        let mut scratch = doc.clone();
        let mut ops = Vec::new();
        let mut budget = 4 * doc.descendants().len() + 4;
        while budget > 0 {
            budget -= 1;
            let repair = first_constraint_repair(&scratch);
            if repair.is_empty() {
                break;
            }
            for op in repair {
                if let Err(err) = apply_op_to(&mut scratch, &mut None, op.clone()) {
                    tracing::warn!(%err, "child constraint repair failed");
                    return ops;
                }
                ops.push(op);
            }
        }
        ops
    }
}

fn first_constraint_repair(doc: &Document) -> Vec<Op> {
    if let Some(ops) = wrap_root_inlines(doc) {
        return ops;
    }

    for (path, node) in doc.descendants() {
        let Node::Element(el) = node else {
            continue;
        };

        for (ix, child) in el.children.iter().enumerate() {
            if child_allowed(el.kind.spec().children, child) {
                continue;
            }
            let mut child_path = path.clone();
            child_path.push(ix);
            tracing::trace!(?child_path, parent = %el.kind, "lift misplaced child");
            return lift_ops(doc, &child_path).unwrap_or_default();
        }

        if let Some(ops) = repair_orphan_item(doc, &path, el) {
            return ops;
        }
    }
    Vec::new()
}

fn child_allowed(constraint: ChildConstraint, child: &Node) -> bool {
    match constraint {
        ChildConstraint::None => false,
        ChildConstraint::BlockOnly => child.is_block(),
        ChildConstraint::InlineOnly => child.is_inline(),
        ChildConstraint::TextOnly => matches!(child, Node::Text(_)),
        ChildConstraint::Items(kind) => child.is_element_kind(kind),
    }
}

fn wrap_root_inlines(doc: &Document) -> Option<Vec<Op>> {
    let start = doc.children.iter().position(Node::is_inline)?;
    let len = doc.children[start..]
        .iter()
        .take_while(|n| n.is_inline())
        .count();

    let mut ops = vec![Op::InsertNode {
        path: vec![start],
        node: Node::element(ElementKind::Paragraph, Vec::new()),
    }];
    for k in 0..len {
        ops.push(Op::MoveNode {
            path: vec![start + 1],
            new_path: vec![start, k],
        });
    }
    Some(ops)
}

fn repair_orphan_item(doc: &Document, path: &Path, el: &ElementNode) -> Option<Vec<Op>> {
    let parent_kind = doc
        .element(&location::parent(path))
        .map(|parent| parent.kind);
    match el.kind {
        ElementKind::ListItem => {
            let in_list = matches!(
                parent_kind,
                Some(ElementKind::BulletedList | ElementKind::NumberedList)
            );
            (!in_list).then(|| {
                vec![Op::SetNodeKind {
                    path: path.clone(),
                    kind: ElementKind::Paragraph,
                }]
            })
        }
        ElementKind::CheckListItem => {
            if parent_kind == Some(ElementKind::CheckList) {
                return None;
            }
            let mut inner = path.clone();
            inner.push(0);
            Some(vec![
                Op::InsertNode {
                    path: path.clone(),
                    node: Node::element(ElementKind::CheckList, Vec::new()),
                },
                Op::MoveNode {
                    path: location::next(path),
                    new_path: inner,
                },
            ])
        }
        _ => None,
    }
}

pub struct RemoveEmptyElements;

impl NormalizePass for RemoveEmptyElements {
    fn id(&self) -> &'static str {
        "core.remove_empty_elements"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        let mut ops: Vec<Op> = doc
            .descendants()
            .into_iter()
            .filter(|(_, node)| match node {
                Node::Element(el) if el.kind.is_container() => el.children.is_empty(),
                Node::Element(el) if el.kind == ElementKind::Link => {
                    node.text_content().is_empty()
                }
                _ => false,
            })
            .map(|(path, _)| Op::RemoveNode { path })
            .collect();
        ops.reverse();
        ops
    }
}

pub struct EnsureTextLeaf;

impl NormalizePass for EnsureTextLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_text_leaf"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        doc.descendants()
            .into_iter()
            .filter(|(_, node)| match node {
                Node::Element(el) => {
                    el.children.is_empty()
                        && matches!(
                            el.kind.spec().children,
                            ChildConstraint::InlineOnly | ChildConstraint::TextOnly
                        )
                }
                _ => false,
            })
            .map(|(mut path, _)| {
                path.push(0);
                Op::InsertNode {
                    path,
                    node: Node::text(""),
                }
            })
            .collect()
    }
}

pub struct SurroundInlines;

impl NormalizePass for SurroundInlines {
    fn id(&self) -> &'static str {
        "core.surround_inlines"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        let mut ops = Vec::new();
        for (path, node) in doc.descendants() {
            if !node.is_text_block() {
                continue;
            }
            let children = node.children();
            for ix in (0..children.len()).rev() {
                if !matches!(&children[ix], Node::Element(_)) {
                    continue;
                }
                let text_after = matches!(children.get(ix + 1), Some(Node::Text(_)));
                if !text_after {
                    let mut at = path.clone();
                    at.push(ix + 1);
                    ops.push(Op::InsertNode {
                        path: at,
                        node: Node::text(""),
                    });
                }
                let text_before = ix > 0 && matches!(children[ix - 1], Node::Text(_));
                if !text_before {
                    let mut at = path.clone();
                    at.push(ix);
                    ops.push(Op::InsertNode {
                        path: at,
                        node: Node::text(""),
                    });
                }
            }
        }
        ops
    }
}

pub struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        let mut ops = Vec::new();
        for (path, node) in doc.descendants() {
            let Node::Element(el) = node else {
                continue;
            };
            merge_children(&path, &el.children, &mut ops);
        }
        ops
    }
}

fn merge_children(parent: &Path, children: &[Node], ops: &mut Vec<Op>) {
    // (is_empty, marks) per child, kept in step with the ops emitted so far.
    let mut items: Vec<Option<(bool, Marks)>> = children
        .iter()
        .map(|c| match c {
            Node::Text(TextNode { text, marks }) => Some((text.is_empty(), *marks)),
            _ => None,
        })
        .collect();

    let child_path = |ix: usize| {
        let mut p = parent.clone();
        p.push(ix);
        p
    };

    let mut ix = items.len();
    while ix > 1 {
        ix -= 1;
        let (Some((prev_empty, prev_marks)), Some((empty, marks))) = (items[ix - 1], items[ix])
        else {
            continue;
        };
        if prev_marks == marks {
            ops.push(Op::MergeNode {
                path: child_path(ix),
                position: 0,
                properties: NodeProps::Text { marks },
            });
            items[ix - 1] = Some((prev_empty && empty, prev_marks));
            items.remove(ix);
        } else if prev_empty {
            ops.push(Op::RemoveNode {
                path: child_path(ix - 1),
            });
            items.remove(ix - 1);
        } else if empty {
            ops.push(Op::RemoveNode {
                path: child_path(ix),
            });
            items.remove(ix);
        }
    }
}

pub struct NormalizeKindAttrs;

impl NormalizePass for NormalizeKindAttrs {
    fn id(&self) -> &'static str {
        "core.normalize_kind_attrs"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        let mut ops = Vec::new();
        for (path, node) in doc.descendants() {
            let patch = match node {
                Node::Element(el) => element_attr_patch(el),
                Node::Void(v) => url_patch(&v.attrs, true),
                Node::Text(_) => AttrPatch::default(),
            };
            if !patch.is_empty() {
                ops.push(Op::SetNodeAttrs { path, patch });
            }
        }
        ops
    }
}

fn element_attr_patch(el: &ElementNode) -> AttrPatch {
    let mut patch = url_patch(&el.attrs, el.kind == ElementKind::Link);

    let wants_checked = el.kind == ElementKind::CheckListItem;
    match el.attrs.get(ATTR_CHECKED) {
        Some(Value::Bool(_)) if wants_checked => {}
        Some(_) if !wants_checked => patch.remove.push(ATTR_CHECKED.to_string()),
        _ if wants_checked => {
            patch
                .set
                .insert(ATTR_CHECKED.to_string(), Value::Bool(false));
        }
        _ => {}
    }

    if let Some(align) = el.attrs.get(ATTR_ALIGN) {
        let valid = align
            .as_str()
            .is_some_and(|s| s.parse::<Align>().is_ok());
        if !valid || !el.kind.is_text_block() {
            patch.remove.push(ATTR_ALIGN.to_string());
        }
    }
    patch
}

fn url_patch(attrs: &Attrs, wants_url: bool) -> AttrPatch {
    match attrs.get(ATTR_URL) {
        Some(Value::String(_)) if wants_url => AttrPatch::default(),
        Some(_) if !wants_url => AttrPatch::remove(ATTR_URL),
        _ if wants_url => AttrPatch::set(ATTR_URL, Value::String(String::new())),
        _ => AttrPatch::default(),
    }
}

pub struct EnsureTrailingParagraph;

impl NormalizePass for EnsureTrailingParagraph {
    fn id(&self) -> &'static str {
        "core.ensure_trailing_paragraph"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        match doc.children.last() {
            Some(Node::Void(_)) => vec![Op::InsertNode {
                path: vec![doc.children.len()],
                node: Node::paragraph(""),
            }],
            _ => Vec::new(),
        }
    }
}

/// Clamps both selection points onto existing text leaves. Returns `None`
/// when the document holds no text at all.
pub fn normalize_selection(doc: &Document, selection: &Selection) -> Option<Selection> {
    let fallback = doc.texts().first().map(|(p, _)| Point::new(p.clone(), 0))?;
    let anchor = normalize_point_to_existing_text(doc, &selection.anchor)
        .or_else(|| normalize_point_to_existing_text(doc, &selection.focus))
        .unwrap_or(fallback);
    let focus =
        normalize_point_to_existing_text(doc, &selection.focus).unwrap_or_else(|| anchor.clone());
    Some(Selection { anchor, focus })
}

fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    let mut resolved: Path = Vec::new();
    let mut children: &[Node] = &doc.children;
    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                let offset = crate::ops::clamp_to_char_boundary(&t.text, point.offset);
                return Some(Point::new(resolved, offset));
            }
            Node::Element(el) => children = &el.children,
            Node::Void(_) => break,
        }
    }

    doc.texts()
        .into_iter()
        .find(|(p, _)| location::is_ancestor_or_equal(&resolved, p))
        .map(|(p, _)| Point::new(p, 0))
}
