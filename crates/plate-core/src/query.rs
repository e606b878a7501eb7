use crate::core::EditorState;
use crate::location::{self, Point};
use crate::node::{Align, ElementKind, Mark, Marks, Node};
use crate::transforms::{
    MatchMode, NodeMatch, closest_of_kind, covers, lowest_block_above, nodes, span, unhang_range,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAttr {
    Type(ElementKind),
    Align(Align),
}

impl BlockAttr {
    pub fn parse(format: &str, key: &str) -> Option<Self> {
        match key {
            "type" => format.parse().ok().map(BlockAttr::Type),
            "align" => format.parse().ok().map(BlockAttr::Align),
            _ => None,
        }
    }

    fn matcher(self) -> NodeMatch {
        match self {
            BlockAttr::Type(kind) => NodeMatch::Kind(kind),
            BlockAttr::Align(align) => NodeMatch::Align(align),
        }
    }
}

/// Marks that text typed at the selection would get.
pub fn current_marks(state: &EditorState) -> Option<Marks> {
    if let Some(marks) = state.marks {
        return Some(marks);
    }
    let sel = state.selection.as_ref()?;
    let doc = &state.doc;

    if sel.is_expanded() {
        let (start, end) = sel.edges();
        return span(doc, &start.path, &end.path)
            .into_iter()
            .find_map(|(_, node)| node.as_text().map(|t| t.marks));
    }

    let Point { path, offset } = &sel.anchor;
    let leaf = doc.text(path)?;
    if *offset == 0 {
        if let Some(prev) = previous_text_in_block(state, path) {
            return Some(prev);
        }
    }
    Some(leaf.marks)
}

fn previous_text_in_block(state: &EditorState, path: &[usize]) -> Option<Marks> {
    let block = lowest_block_above(&state.doc, path)?;
    state
        .doc
        .texts()
        .into_iter()
        .rev()
        .find(|(p, _)| location::is_before(p, path))
        .filter(|(p, _)| location::is_ancestor(&block, p))
        .map(|(_, t)| t.marks)
}

pub fn is_mark_active(state: &EditorState, mark: Mark) -> bool {
    let Some(sel) = state.selection.as_ref() else {
        return false;
    };
    if sel.is_collapsed() || state.marks.is_some() {
        return current_marks(state).is_some_and(|marks| marks.get(mark));
    }

    let range = unhang_range(&state.doc, sel);
    let (start, end) = range.edges();
    let mut covered = span(&state.doc, &start.path, &end.path)
        .into_iter()
        .filter(|(path, node)| matches!(node, Node::Text(_)) && covers(&state.doc, &range, path))
        .peekable();
    covered.peek().is_some()
        && covered.all(|(_, node)| node.as_text().is_some_and(|t| t.marks.get(mark)))
}

pub fn is_block_active(state: &EditorState, attr: BlockAttr) -> bool {
    let Some(sel) = state.selection.as_ref() else {
        return false;
    };
    let range = unhang_range(&state.doc, sel);
    !nodes(&state.doc, &range, &attr.matcher(), MatchMode::All).is_empty()
}

pub fn is_checklist_active(state: &EditorState) -> bool {
    is_block_active(state, BlockAttr::Type(ElementKind::CheckListItem))
}

pub fn is_link_active(state: &EditorState) -> bool {
    let Some(sel) = state.selection.as_ref() else {
        return false;
    };
    !nodes(
        &state.doc,
        sel,
        &NodeMatch::Kind(ElementKind::Link),
        MatchMode::All,
    )
    .is_empty()
}

pub fn active_align(state: &EditorState) -> Option<Align> {
    let sel = state.selection.as_ref()?;
    let range = unhang_range(&state.doc, sel);
    nodes(&state.doc, &range, &NodeMatch::TextBlock, MatchMode::Lowest)
        .first()
        .and_then(|path| state.doc.element(path))
        .and_then(|el| el.align())
}

pub fn is_checked(state: &EditorState) -> bool {
    let Some(sel) = state.selection.as_ref() else {
        return false;
    };
    closest_of_kind(&state.doc, &sel.focus.path, ElementKind::CheckListItem)
        .and_then(|path| state.doc.element(&path))
        .and_then(|el| el.checked())
        .unwrap_or(false)
}
