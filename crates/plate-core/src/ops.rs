use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{ApplyError, PathError};
use crate::location::{self, Affinity, Path, Point, Selection, transform_point};
use crate::node::{Attrs, Document, ElementKind, ElementNode, Marks, Node, TextNode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    InsertText {
        path: Path,
        offset: usize,
        text: String,
    },
    RemoveText {
        path: Path,
        range: Range<usize>,
    },
    InsertNode {
        path: Path,
        node: Node,
    },
    RemoveNode {
        path: Path,
    },
    /// Moves the tail of the node at `path`, starting at `position`, into a new
    /// sibling right after it. `position` is a byte offset for text and a child
    /// index for elements.
    SplitNode {
        path: Path,
        position: usize,
        properties: NodeProps,
    },
    /// Appends the node at `path` to its previous sibling, which has length `position`.
    MergeNode {
        path: Path,
        position: usize,
        properties: NodeProps,
    },
    MoveNode {
        path: Path,
        new_path: Path,
    },
    SetNodeKind {
        path: Path,
        kind: ElementKind,
    },
    SetNodeAttrs {
        path: Path,
        patch: AttrPatch,
    },
    SetTextMarks {
        path: Path,
        marks: Marks,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeProps {
    Text { marks: Marks },
    Element { kind: ElementKind, attrs: Attrs },
}

impl NodeProps {
    pub fn of(node: &Node) -> Option<Self> {
        match node {
            Node::Text(t) => Some(NodeProps::Text { marks: t.marks }),
            Node::Element(el) => Some(NodeProps::Element {
                kind: el.kind,
                attrs: el.attrs.clone(),
            }),
            Node::Void(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub ops: Vec<Op>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_after: Option<Selection>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            selection_after: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn selection_after(mut self, selection: Selection) -> Self {
        self.selection_after = Some(selection);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrPatch {
    #[serde(default)]
    pub set: Attrs,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl AttrPatch {
    pub fn set(key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut set = Attrs::default();
        set.insert(key.into(), value);
        Self {
            set,
            remove: Vec::new(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self {
            set: Attrs::default(),
            remove: vec![key.into()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }

    pub fn is_noop_for(&self, attrs: &Attrs) -> bool {
        self.set.iter().all(|(k, v)| attrs.get(k) == Some(v))
            && self.remove.iter().all(|k| !attrs.contains_key(k))
    }
}

fn patch_apply(attrs: &mut Attrs, patch: &AttrPatch) -> AttrPatch {
    let mut old_set = Attrs::new();
    let mut old_remove: Vec<String> = Vec::new();

    for (k, v) in &patch.set {
        if let Some(prev) = attrs.insert(k.clone(), v.clone()) {
            old_set.insert(k.clone(), prev);
        } else {
            old_remove.push(k.clone());
        }
    }

    for key in &patch.remove {
        if let Some(prev) = attrs.remove(key) {
            old_set.insert(key.clone(), prev);
        }
    }

    AttrPatch {
        set: old_set,
        remove: old_remove,
    }
}

pub fn apply_op_to(
    doc: &mut Document,
    selection: &mut Option<Selection>,
    op: Op,
) -> Result<Op, ApplyError> {
    let inverse = match &op {
        Op::InsertText { path, offset, text } => {
            let text_node = text_mut(doc, path)?;
            let offset = clamp_to_char_boundary(&text_node.text, *offset);
            text_node.text.insert_str(offset, text);
            Op::RemoveText {
                path: path.clone(),
                range: offset..offset + text.len(),
            }
        }
        Op::RemoveText { path, range } => {
            let text_node = text_mut(doc, path)?;
            let start = clamp_to_char_boundary(&text_node.text, range.start);
            let end = clamp_to_char_boundary(&text_node.text, range.end);
            let removed = if start < end {
                let removed = text_node.text[start..end].to_string();
                text_node.text.replace_range(start..end, "");
                removed
            } else {
                String::new()
            };
            Op::InsertText {
                path: path.clone(),
                offset: start,
                text: removed,
            }
        }
        Op::InsertNode { path, node } => {
            insert_node(doc, path, node.clone())?;
            Op::RemoveNode { path: path.clone() }
        }
        Op::RemoveNode { path } => {
            let removed = remove_node(doc, path)?;
            if let Some(sel) = selection.as_mut() {
                if !relocate_removed_points(doc, sel, path) {
                    *selection = None;
                }
            }
            return Ok(Op::InsertNode {
                path: path.clone(),
                node: removed,
            });
        }
        Op::SplitNode {
            path,
            position,
            properties,
        } => {
            let right = split_node(doc, path, *position, properties)?;
            Op::MergeNode {
                path: location::next(path),
                position: *position,
                properties: right,
            }
        }
        Op::MergeNode { path, .. } => {
            let prev_path = location::previous(path)
                .ok_or_else(|| ApplyError::InvalidOp(format!("Cannot merge first node {path:?}")))?;
            let (position, props) = merge_node(doc, path, &prev_path)?;
            let op = Op::MergeNode {
                path: path.clone(),
                position,
                properties: props.clone(),
            };
            transform_selection(selection, &op);
            return Ok(Op::SplitNode {
                path: prev_path,
                position,
                properties: props,
            });
        }
        Op::MoveNode { path, new_path } => {
            if location::is_ancestor(path, new_path) {
                return Err(ApplyError::InvalidOp(format!(
                    "Cannot move {path:?} into its own descendant {new_path:?}"
                )));
            }
            if path == new_path {
                return Ok(op.clone());
            }
            let node = remove_node(doc, path)?;
            let true_path = location::transform_path(path, &op, Affinity::Forward)
                .ok_or_else(|| ApplyError::InvalidOp(format!("Cannot move {path:?}")))?;
            insert_node(doc, &true_path, node)?;
            if location::is_sibling(path, new_path) {
                Op::MoveNode {
                    path: new_path.clone(),
                    new_path: path.clone(),
                }
            } else {
                let inverse_path = location::transform_path(path, &op, Affinity::Forward);
                let inverse_new_path =
                    location::transform_path(&location::next(path), &op, Affinity::Forward);
                let (Some(inverse_path), Some(inverse_new_path)) = (inverse_path, inverse_new_path)
                else {
                    return Err(ApplyError::InvalidOp(format!("Cannot invert move {path:?}")));
                };
                Op::MoveNode {
                    path: inverse_path,
                    new_path: inverse_new_path,
                }
            }
        }
        Op::SetNodeKind { path, kind } => match node_mut(doc, path)? {
            Node::Element(el) => Op::SetNodeKind {
                path: path.clone(),
                kind: std::mem::replace(&mut el.kind, *kind),
            },
            Node::Text(_) | Node::Void(_) => {
                return Err(ApplyError::InvalidOp(format!("{path:?} is not an element")));
            }
        },
        Op::SetNodeAttrs { path, patch } => {
            let old = match node_mut(doc, path)? {
                Node::Element(el) => patch_apply(&mut el.attrs, patch),
                Node::Void(v) => patch_apply(&mut v.attrs, patch),
                Node::Text(_) => {
                    return Err(ApplyError::InvalidOp("Text has no attrs".into()));
                }
            };
            Op::SetNodeAttrs {
                path: path.clone(),
                patch: old,
            }
        }
        Op::SetTextMarks { path, marks } => {
            let text_node = text_mut(doc, path)?;
            let old = std::mem::replace(&mut text_node.marks, *marks);
            Op::SetTextMarks {
                path: path.clone(),
                marks: old,
            }
        }
    };

    transform_selection(selection, &op);
    Ok(inverse)
}

fn transform_selection(selection: &mut Option<Selection>, op: &Op) {
    let Some(sel) = selection.as_mut() else {
        return;
    };
    for point in [&mut sel.anchor, &mut sel.focus] {
        if let Some(next) = transform_point(point, op, Affinity::Forward) {
            *point = next;
        }
    }
}

/// Moves selection points out of a just-removed subtree: to the end of the
/// closest preceding text, or the start of the following one. Returns false
/// when the document has no text left.
fn relocate_removed_points(doc: &Document, sel: &mut Selection, removed: &[usize]) -> bool {
    let op = Op::RemoveNode {
        path: removed.to_vec(),
    };
    for point in [&mut sel.anchor, &mut sel.focus] {
        if let Some(next) = transform_point(point, &op, Affinity::Forward) {
            *point = next;
            continue;
        }

        let texts = doc.texts();
        let split = texts
            .iter()
            .position(|(p, _)| !location::is_before(p, removed))
            .unwrap_or(texts.len());
        let prev = split.checked_sub(1).map(|ix| &texts[ix]);
        let next = texts.get(split);

        let prefer_next = match (prev, next) {
            (Some((prev_path, _)), Some((next_path, _))) => {
                if next_path.as_slice() == removed {
                    removed.last() == Some(&0)
                } else {
                    location::common(prev_path, removed).len()
                        < location::common(next_path, removed).len()
                }
            }
            _ => false,
        };

        match (prev, next) {
            (Some((path, text)), _) if !prefer_next => {
                *point = Point::new(path.clone(), text.text.len());
            }
            (_, Some((path, _))) => {
                *point = Point::new(path.clone(), 0);
            }
            _ => return false,
        }
    }
    true
}

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, PathError> {
    doc.node_mut(path)
        .ok_or_else(|| PathError(format!("No node at {path:?}")))
}

fn text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, PathError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        _ => Err(PathError(format!("Expected text node at {path:?}"))),
    }
}

fn children_mut<'a>(doc: &'a mut Document, parent: &[usize]) -> Result<&'a mut Vec<Node>, PathError> {
    doc.children_at_mut(parent)
        .ok_or_else(|| PathError(format!("{parent:?} is not a container")))
}

fn insert_node(doc: &mut Document, path: &[usize], node: Node) -> Result<(), PathError> {
    let Some((&index, parent)) = path.split_last() else {
        return Err(PathError("Empty insert path".into()));
    };
    let children = children_mut(doc, parent)?;
    if index > children.len() {
        return Err(PathError(format!(
            "Insert index out of bounds: {index} > {}",
            children.len()
        )));
    }
    children.insert(index, node);
    Ok(())
}

fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, PathError> {
    let Some((&index, parent)) = path.split_last() else {
        return Err(PathError("Empty remove path".into()));
    };
    let children = children_mut(doc, parent)?;
    if index >= children.len() {
        return Err(PathError(format!(
            "Remove index out of bounds: {index} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(index))
}

fn split_node(
    doc: &mut Document,
    path: &[usize],
    position: usize,
    properties: &NodeProps,
) -> Result<NodeProps, ApplyError> {
    let right = match (node_mut(doc, path)?, properties) {
        (Node::Text(t), NodeProps::Text { marks }) => {
            let at = clamp_to_char_boundary(&t.text, position);
            let tail = t.text.split_off(at);
            Node::Text(TextNode::with_marks(tail, *marks))
        }
        (Node::Element(el), NodeProps::Element { kind, attrs }) => {
            if position > el.children.len() {
                return Err(ApplyError::InvalidOp(format!(
                    "Split position {position} out of bounds at {path:?}"
                )));
            }
            let tail = el.children.split_off(position);
            Node::Element(ElementNode {
                kind: *kind,
                attrs: attrs.clone(),
                children: tail,
            })
        }
        _ => {
            return Err(ApplyError::InvalidOp(format!(
                "Split properties do not match node at {path:?}"
            )));
        }
    };
    insert_node(doc, &location::next(path), right)?;
    Ok(properties.clone())
}

fn merge_node(
    doc: &mut Document,
    path: &[usize],
    prev_path: &[usize],
) -> Result<(usize, NodeProps), ApplyError> {
    let removed = remove_node(doc, path)?;
    let props = NodeProps::of(&removed)
        .ok_or_else(|| ApplyError::InvalidOp(format!("Cannot merge void at {path:?}")))?;
    let position = match (node_mut(doc, prev_path)?, removed) {
        (Node::Text(prev), Node::Text(t)) => {
            let position = prev.text.len();
            prev.text.push_str(&t.text);
            position
        }
        (Node::Element(prev), Node::Element(el)) => {
            let position = prev.children.len();
            prev.children.extend(el.children);
            position
        }
        _ => {
            return Err(ApplyError::InvalidOp(format!(
                "Cannot merge {path:?} into a node of another shape"
            )));
        }
    };
    Ok((position, props))
}
