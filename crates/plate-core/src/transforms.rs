use crate::core::EditorState;
use crate::error::ApplyError;
use crate::location::{
    self, Affinity, Path, Point, Selection, compare_paths, is_ancestor, is_ancestor_or_equal,
    transform_path, transform_point,
};
use crate::node::{Align, Document, ElementKind, ElementNode, Mark, Node, TextNode};
use crate::normalize::{NormalizePass, normalize_selection};
use crate::ops::{AttrPatch, NodeProps, Op, apply_op_to};
use crate::query;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeMatch {
    Kind(ElementKind),
    AnyKind(Vec<ElementKind>),
    Block,
    TextBlock,
    Text,
    TextOrInline,
    Align(Align),
    ChildOf(Path),
}

impl NodeMatch {
    pub fn matches(&self, node: &Node, path: &[usize]) -> bool {
        match self {
            NodeMatch::Kind(kind) => node.is_element_kind(*kind),
            NodeMatch::AnyKind(kinds) => {
                matches!(node, Node::Element(el) if kinds.contains(&el.kind))
            }
            NodeMatch::Block => matches!(node, Node::Element(el) if el.kind.spec().is_block()),
            NodeMatch::TextBlock => node.is_text_block(),
            NodeMatch::Text => matches!(node, Node::Text(_)),
            NodeMatch::TextOrInline => node.is_inline(),
            NodeMatch::Align(align) => {
                matches!(node, Node::Element(el) if el.align() == Some(*align))
            }
            NodeMatch::ChildOf(parent) => {
                path.len() == parent.len() + 1 && path.starts_with(parent)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    All,
    Highest,
    #[default]
    Lowest,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Scope {
    #[default]
    Selection,
    Range(Selection),
    Path(Path),
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Start,
    End,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropsPatch {
    pub kind: Option<ElementKind>,
    pub attrs: AttrPatch,
}

impl PropsPatch {
    pub fn kind(kind: ElementKind) -> Self {
        Self {
            kind: Some(kind),
            attrs: AttrPatch::default(),
        }
    }

    pub fn set_attr(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attrs.set.insert(key.into(), value);
        self
    }

    pub fn remove_attr(mut self, key: impl Into<String>) -> Self {
        self.attrs.remove.push(key.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetProps(PropsPatch),
    Wrap(ElementNode),
    Unwrap,
    Insert(Vec<Node>),
    Move { to: Path },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub at: Scope,
    pub matcher: Option<NodeMatch>,
    pub mode: MatchMode,
    pub split: bool,
    pub action: Action,
}

impl Mutation {
    fn new(action: Action) -> Self {
        Self {
            at: Scope::Selection,
            matcher: None,
            mode: MatchMode::Lowest,
            split: false,
            action,
        }
    }

    pub fn set(props: PropsPatch) -> Self {
        Self::new(Action::SetProps(props))
    }

    pub fn wrap(element: ElementNode) -> Self {
        Self::new(Action::Wrap(element))
    }

    pub fn unwrap(matcher: NodeMatch) -> Self {
        Self::new(Action::Unwrap).matching(matcher)
    }

    pub fn insert(nodes: Vec<Node>) -> Self {
        Self::new(Action::Insert(nodes))
    }

    pub fn move_to(to: Path) -> Self {
        Self::new(Action::Move { to })
    }

    pub fn at(mut self, at: Scope) -> Self {
        self.at = at;
        self
    }

    pub fn matching(mut self, matcher: NodeMatch) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn split(mut self, split: bool) -> Self {
        self.split = split;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathRef(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRef(usize);

#[derive(Debug, Clone)]
struct TrackedRange {
    start: Point,
    end: Point,
    start_affinity: Affinity,
    end_affinity: Affinity,
}

#[derive(Debug, Clone)]
pub struct Draft {
    state: EditorState,
    ops: Vec<Op>,
    inverse_ops: Vec<Op>,
    path_refs: Vec<Option<(Path, Affinity)>>,
    range_refs: Vec<Option<TrackedRange>>,
}

impl Draft {
    pub fn new(state: EditorState) -> Self {
        Self {
            state,
            ops: Vec::new(),
            inverse_ops: Vec::new(),
            path_refs: Vec::new(),
            range_refs: Vec::new(),
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn doc(&self) -> &Document {
        &self.state.doc
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.state.selection.as_ref()
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn finish(self) -> (EditorState, Vec<Op>, Vec<Op>) {
        let mut inverse_ops = self.inverse_ops;
        inverse_ops.reverse();
        (self.state, self.ops, inverse_ops)
    }

    pub fn apply(&mut self, op: Op) -> Result<(), ApplyError> {
        let op = with_merge_position(self.doc(), op);
        tracing::trace!(?op, "apply op");
        let inverse = apply_op_to(&mut self.state.doc, &mut self.state.selection, op.clone())?;

        for slot in &mut self.path_refs {
            if let Some((path, affinity)) = slot.take() {
                *slot = transform_path(&path, &op, affinity).map(|p| (p, affinity));
            }
        }
        for slot in &mut self.range_refs {
            if let Some(range) = slot.take() {
                let start = transform_point(&range.start, &op, range.start_affinity);
                let end = transform_point(&range.end, &op, range.end_affinity);
                if let (Some(start), Some(end)) = (start, end) {
                    *slot = Some(TrackedRange {
                        start,
                        end,
                        ..range
                    });
                }
            }
        }

        self.ops.push(op);
        self.inverse_ops.push(inverse);
        Ok(())
    }

    pub fn select(&mut self, selection: Option<Selection>) {
        self.state.selection = selection;
        self.state.marks = None;
    }

    pub fn collapse(&mut self, edge: Edge) {
        let Some(sel) = self.state.selection.as_ref() else {
            return;
        };
        let point = match edge {
            Edge::Start => sel.start(),
            Edge::End => sel.end(),
        };
        self.select(Some(Selection::collapsed(point)));
    }

    pub fn path_ref(&mut self, path: Path, affinity: Affinity) -> PathRef {
        self.path_refs.push(Some((path, affinity)));
        PathRef(self.path_refs.len() - 1)
    }

    pub fn path_ref_current(&self, r: PathRef) -> Option<Path> {
        self.path_refs
            .get(r.0)
            .and_then(|slot| slot.as_ref().map(|(p, _)| p.clone()))
    }

    fn set_path_ref(&mut self, r: PathRef, path: Path) {
        if let Some(Some((current, _))) = self.path_refs.get_mut(r.0) {
            *current = path;
        }
    }

    pub fn unref_path(&mut self, r: PathRef) -> Option<Path> {
        self.path_refs
            .get_mut(r.0)
            .and_then(Option::take)
            .map(|(p, _)| p)
    }

    pub fn range_ref(&mut self, range: &Selection) -> RangeRef {
        let (start, end) = range.edges();
        let end_affinity = if range.is_collapsed() {
            Affinity::Forward
        } else {
            Affinity::Backward
        };
        self.range_refs.push(Some(TrackedRange {
            start,
            end,
            start_affinity: Affinity::Forward,
            end_affinity,
        }));
        RangeRef(self.range_refs.len() - 1)
    }

    pub fn point_ref(&mut self, point: &Point, affinity: Affinity) -> RangeRef {
        self.range_refs.push(Some(TrackedRange {
            start: point.clone(),
            end: point.clone(),
            start_affinity: affinity,
            end_affinity: affinity,
        }));
        RangeRef(self.range_refs.len() - 1)
    }

    pub fn range_ref_current(&self, r: RangeRef) -> Option<Selection> {
        self.range_refs
            .get(r.0)
            .and_then(|slot| slot.as_ref())
            .map(|t| Selection::new(t.start.clone(), t.end.clone()))
    }

    pub fn unref_range(&mut self, r: RangeRef) -> Option<Selection> {
        self.range_refs
            .get_mut(r.0)
            .and_then(Option::take)
            .map(|t| Selection::new(t.start, t.end))
    }

    fn resolve(&self, at: &Scope) -> Option<Selection> {
        match at {
            Scope::Selection => self.state.selection.clone(),
            Scope::Range(range) => Some(range.clone()),
            Scope::Path(path) => node_range(self.doc(), path),
            Scope::Document => document_range(self.doc()),
        }
    }

    pub fn run(&mut self, mutation: Mutation) -> Result<(), ApplyError> {
        tracing::debug!(?mutation, "run mutation");
        let Mutation {
            at,
            matcher,
            mode,
            split,
            action,
        } = mutation;
        match action {
            Action::SetProps(props) => {
                let matcher = matcher.unwrap_or(NodeMatch::Block);
                self.set_nodes(&props, &at, &matcher, mode)
            }
            Action::Wrap(element) => self.wrap_nodes(element, &at, matcher, split),
            Action::Unwrap => {
                let matcher = matcher.unwrap_or(NodeMatch::Block);
                self.unwrap_nodes(&at, &matcher, mode, split)
            }
            Action::Insert(nodes) => match at {
                Scope::Selection => self.insert_nodes(nodes),
                _ => Err(ApplyError::InvalidOp(
                    "insert is only supported at the selection".into(),
                )),
            },
            Action::Move { to } => {
                let Some(range) = self.resolve(&at) else {
                    return Ok(());
                };
                let matcher = matcher.unwrap_or(NodeMatch::Block);
                self.move_nodes(&range, &matcher, mode, to)
            }
        }
    }

    pub fn set_nodes(
        &mut self,
        props: &PropsPatch,
        at: &Scope,
        matcher: &NodeMatch,
        mode: MatchMode,
    ) -> Result<(), ApplyError> {
        let Some(range) = self.resolve(at) else {
            return Ok(());
        };
        let range = unhang_range(self.doc(), &range);

        let mut ops = Vec::new();
        for path in nodes(self.doc(), &range, matcher, mode) {
            let Some(Node::Element(el)) = self.doc().node(&path) else {
                continue;
            };
            if let Some(kind) = props.kind.filter(|kind| *kind != el.kind) {
                ops.push(Op::SetNodeKind {
                    path: path.clone(),
                    kind,
                });
            }
            if !props.attrs.is_noop_for(&el.attrs) {
                ops.push(Op::SetNodeAttrs {
                    path,
                    patch: props.attrs.clone(),
                });
            }
        }
        for op in ops {
            self.apply(op)?;
        }
        Ok(())
    }

    pub fn unwrap_nodes(
        &mut self,
        at: &Scope,
        matcher: &NodeMatch,
        mode: MatchMode,
        split: bool,
    ) -> Result<(), ApplyError> {
        let Some(range) = self.resolve(at) else {
            return Ok(());
        };
        let range_ref = self.range_ref(&range);
        let matches = nodes(self.doc(), &range, matcher, mode);
        let refs: Vec<PathRef> = matches
            .into_iter()
            .rev()
            .map(|p| self.path_ref(p, Affinity::Forward))
            .collect();

        for r in refs {
            let Some(path) = self.unref_path(r) else {
                continue;
            };
            let Some(mut lift_range) = node_range(self.doc(), &path) else {
                continue;
            };
            if split {
                let Some(current) = self.range_ref_current(range_ref) else {
                    continue;
                };
                let Some(intersection) = current.intersection(&lift_range) else {
                    continue;
                };
                lift_range = intersection;
            }

            let children = nodes(
                self.doc(),
                &lift_range,
                &NodeMatch::ChildOf(path.clone()),
                MatchMode::All,
            );
            let child_refs: Vec<PathRef> = children
                .into_iter()
                .map(|p| self.path_ref(p, Affinity::Forward))
                .collect();
            for child in child_refs {
                if let Some(child_path) = self.unref_path(child) {
                    self.lift_node(&child_path)?;
                }
            }
        }

        self.unref_range(range_ref);
        Ok(())
    }

    pub fn lift_node(&mut self, path: &[usize]) -> Result<(), ApplyError> {
        for op in lift_ops(self.doc(), path)? {
            self.apply(op)?;
        }
        Ok(())
    }

    pub fn wrap_nodes(
        &mut self,
        element: ElementNode,
        at: &Scope,
        matcher: Option<NodeMatch>,
        split: bool,
    ) -> Result<(), ApplyError> {
        let Some(mut range) = self.resolve(at) else {
            return Ok(());
        };
        let inline = element.kind.is_inline();
        let matcher = matcher.unwrap_or(if inline {
            NodeMatch::TextOrInline
        } else {
            NodeMatch::Block
        });

        if split && range.is_expanded() {
            let range_ref = self.range_ref(&range);
            let (start, end) = range.edges();
            self.split_nodes(&end, &matcher, false)?;
            let start = self
                .range_ref_current(range_ref)
                .map(|r| r.start())
                .unwrap_or(start);
            self.split_nodes(&start, &matcher, false)?;
            range = self
                .unref_range(range_ref)
                .ok_or_else(|| ApplyError::InvalidOp("Wrap range was removed".into()))?;
            if *at == Scope::Selection {
                self.select(Some(range.clone()));
            }
        }

        let roots = if inline {
            nodes(self.doc(), &range, &NodeMatch::Block, MatchMode::Lowest)
        } else {
            vec![Vec::new()]
        };

        for root in roots {
            let root_range = if root.is_empty() {
                document_range(self.doc())
            } else {
                node_range(self.doc(), &root)
            };
            let Some(a) = root_range.and_then(|r| range.intersection(&r)) else {
                continue;
            };
            let mut matches = nodes(self.doc(), &a, &matcher, MatchMode::Lowest);
            if a.is_expanded() {
                matches.retain(|p| covers(self.doc(), &a, p));
            }
            let (Some(first), Some(last)) = (matches.first(), matches.last()) else {
                continue;
            };

            let common_path = if first == last {
                location::parent(first)
            } else {
                location::common(first, last)
            };
            let (Some(from), Some(to)) = (
                start_point(self.doc(), first),
                end_point(self.doc(), last),
            ) else {
                continue;
            };
            let wrap_range = Selection::new(from, to);
            let depth = common_path.len() + 1;
            let wrapper_path = location::next(&last[..depth]);

            let mut wrapper = element.clone();
            wrapper.children.clear();
            self.apply(Op::InsertNode {
                path: wrapper_path.clone(),
                node: Node::Element(wrapper),
            })?;

            let mut target = wrapper_path;
            target.push(0);
            self.move_nodes(
                &wrap_range,
                &NodeMatch::ChildOf(common_path),
                MatchMode::All,
                target,
            )?;
        }
        Ok(())
    }

    pub fn move_nodes(
        &mut self,
        range: &Selection,
        matcher: &NodeMatch,
        mode: MatchMode,
        to: Path,
    ) -> Result<(), ApplyError> {
        let to_ref = self.path_ref(to, Affinity::Forward);
        let targets = nodes(self.doc(), range, matcher, mode);
        let refs: Vec<PathRef> = targets
            .into_iter()
            .map(|p| self.path_ref(p, Affinity::Forward))
            .collect();

        for r in refs {
            let Some(path) = self.unref_path(r) else {
                continue;
            };
            let Some(new_path) = self.path_ref_current(to_ref) else {
                break;
            };
            if !path.is_empty() {
                self.apply(Op::MoveNode {
                    path: path.clone(),
                    new_path: new_path.clone(),
                })?;
            }
            if location::is_sibling(&new_path, &path) && location::is_after(&new_path, &path) {
                if let Some(current) = self.path_ref_current(to_ref) {
                    self.set_path_ref(to_ref, location::next(&current));
                }
            }
        }
        self.unref_path(to_ref);
        Ok(())
    }

    /// Splits every node from the text leaf at `at` up to the lowest node
    /// matching `matcher`. Unless `always`, levels where `at` sits on an edge
    /// are left alone.
    pub fn split_nodes(
        &mut self,
        at: &Point,
        matcher: &NodeMatch,
        always: bool,
    ) -> Result<(), ApplyError> {
        let point_range = Selection::collapsed(at.clone());
        let Some(highest) = nodes(self.doc(), &point_range, matcher, MatchMode::Lowest)
            .into_iter()
            .next()
        else {
            return Ok(());
        };

        let before = self.point_ref(at, Affinity::Backward);
        let mut position = at.offset;
        let levels: Vec<Path> = (1..=at.path.len())
            .rev()
            .map(|depth| at.path[..depth].to_vec())
            .collect();

        for path in levels {
            if path.len() < highest.len() {
                break;
            }
            let Some(node) = self.doc().node(&path) else {
                break;
            };
            if matches!(node, Node::Void(_)) {
                break;
            }
            let properties = NodeProps::of(node);
            let Some(point) = self.range_ref_current(before).map(|r| r.start()) else {
                break;
            };
            let is_end = end_point(self.doc(), &path).as_ref() == Some(&point);
            let is_edge = is_end || start_point(self.doc(), &path).as_ref() == Some(&point);

            let mut split = false;
            if always || !is_edge {
                if let Some(properties) = properties {
                    split = true;
                    self.apply(Op::SplitNode {
                        path: path.clone(),
                        position,
                        properties,
                    })?;
                }
            }
            position = path[path.len() - 1] + usize::from(split || is_end);
        }

        self.unref_range(before);
        Ok(())
    }

    /// Inline nodes split the text leaf at the cursor, blocks split the block.
    /// Without a selection the nodes are appended to the document.
    pub fn insert_nodes(&mut self, nodes_to_insert: Vec<Node>) -> Result<(), ApplyError> {
        let Some(first) = nodes_to_insert.first() else {
            return Ok(());
        };
        let matcher = match first {
            Node::Text(_) => NodeMatch::Text,
            node if node.is_inline() => NodeMatch::TextOrInline,
            _ => NodeMatch::Block,
        };

        let at = match self.state.selection.clone() {
            Some(sel) if sel.is_collapsed() => Some(sel.anchor),
            Some(sel) => {
                let sel = unhang_range(self.doc(), &sel);
                self.delete_range(&sel)?;
                self.state.selection.as_ref().map(|s| s.anchor.clone())
            }
            None => end_point(self.doc(), &[]),
        };

        let insert_at = match at {
            Some(at) => {
                let at_range = Selection::collapsed(at.clone());
                let Some(match_path) = nodes(self.doc(), &at_range, &matcher, MatchMode::Lowest)
                    .into_iter()
                    .next()
                else {
                    return Ok(());
                };
                let match_ref = self.path_ref(match_path.clone(), Affinity::Forward);
                let is_at_end = end_point(self.doc(), &match_path).as_ref() == Some(&at);
                self.split_nodes(&at, &matcher, false)?;
                let path = self
                    .unref_path(match_ref)
                    .ok_or_else(|| ApplyError::InvalidOp("Insert target was removed".into()))?;
                if is_at_end {
                    location::next(&path)
                } else {
                    path
                }
            }
            None => vec![self.doc().children.len()],
        };

        let parent = location::parent(&insert_at);
        let mut index = insert_at[insert_at.len() - 1];
        for node in nodes_to_insert {
            let mut path = parent.clone();
            path.push(index);
            self.apply(Op::InsertNode { path, node })?;
            index += 1;
        }

        let mut last = parent;
        last.push(index - 1);
        if let Some(point) = end_point(self.doc(), &last) {
            self.select(Some(Selection::collapsed(point)));
        }
        Ok(())
    }

    pub fn insert_text(&mut self, text: &str) -> Result<(), ApplyError> {
        if text.is_empty() {
            return Ok(());
        }
        let Some(sel) = self.state.selection.clone() else {
            return Ok(());
        };
        let marks = self.state.marks.take();
        if sel.is_expanded() {
            self.delete_range(&sel)?;
        }
        let Some(point) = self.state.selection.as_ref().map(|s| s.anchor.clone()) else {
            return Ok(());
        };

        let leaf_marks = self.doc().text(&point.path).map(|t| t.marks);
        match marks {
            Some(marks) if leaf_marks != Some(marks) => {
                self.insert_nodes(vec![Node::Text(TextNode::with_marks(text, marks))])?;
            }
            _ => {
                self.apply(Op::InsertText {
                    path: point.path,
                    offset: point.offset,
                    text: text.to_string(),
                })?;
            }
        }
        self.state.marks = None;
        Ok(())
    }

    pub fn delete_range(&mut self, range: &Selection) -> Result<(), ApplyError> {
        let (start, end) = range.edges();
        if start == end {
            return Ok(());
        }
        if start.path == end.path {
            self.apply(Op::RemoveText {
                path: start.path.clone(),
                range: start.offset..end.offset,
            })?;
            self.select(Some(Selection::collapsed(start)));
            return Ok(());
        }

        let start_block = lowest_block_above(self.doc(), &start.path);
        let end_block = lowest_block_above(self.doc(), &end.path);

        let spanned: Vec<Path> = span(self.doc(), &start.path, &end.path)
            .into_iter()
            .map(|(p, _)| p)
            .filter(|p| {
                !is_ancestor_or_equal(p, &start.path) && !is_ancestor_or_equal(p, &end.path)
            })
            .collect();
        let between: Vec<Path> = spanned
            .iter()
            .filter(|p| !spanned.iter().any(|q| is_ancestor(q, p)))
            .cloned()
            .collect();

        let end_block_ref = end_block.map(|p| self.path_ref(p, Affinity::Forward));

        if end.offset > 0 {
            self.apply(Op::RemoveText {
                path: end.path.clone(),
                range: 0..end.offset,
            })?;
        }
        let start_len = self.doc().text(&start.path).map_or(0, |t| t.text.len());
        if start.offset < start_len {
            self.apply(Op::RemoveText {
                path: start.path.clone(),
                range: start.offset..start_len,
            })?;
        }
        for path in between.into_iter().rev() {
            self.apply(Op::RemoveNode { path })?;
        }

        let end_block = end_block_ref.and_then(|r| self.unref_path(r));
        if let (Some(start_block), Some(end_block)) = (start_block, end_block) {
            if start_block != end_block {
                self.merge_block_into(&start_block, end_block)?;
            }
        }

        self.select(Some(Selection::collapsed(start)));
        Ok(())
    }

    fn merge_block_into(&mut self, target: &[usize], mut path: Path) -> Result<(), ApplyError> {
        let next = location::next(target);
        if path != next {
            self.apply(Op::MoveNode {
                path,
                new_path: next.clone(),
            })?;
            path = next;
        }
        let position = self.doc().node(target).map_or(0, |n| n.children().len());
        let Some(properties) = self.doc().node(&path).and_then(NodeProps::of) else {
            return Ok(());
        };
        self.apply(Op::MergeNode {
            path,
            position,
            properties,
        })
    }

    pub fn add_mark(&mut self, mark: Mark) -> Result<(), ApplyError> {
        self.set_mark(mark, true)
    }

    pub fn remove_mark(&mut self, mark: Mark) -> Result<(), ApplyError> {
        self.set_mark(mark, false)
    }

    fn set_mark(&mut self, mark: Mark, value: bool) -> Result<(), ApplyError> {
        let Some(sel) = self.state.selection.clone() else {
            return Ok(());
        };
        if sel.is_collapsed() {
            let mut marks = query::current_marks(&self.state).unwrap_or_default();
            marks.set(mark, value);
            self.state.marks = Some(marks);
            return Ok(());
        }

        let range = unhang_range(self.doc(), &sel);
        let range_ref = self.range_ref(&range);
        let (start, end) = range.edges();

        let end_at_end = self
            .doc()
            .text(&end.path)
            .is_some_and(|t| t.text.len() == end.offset);
        self.split_nodes(&end, &NodeMatch::Text, !end_at_end)?;
        let start_at_start = start.offset == 0;
        self.split_nodes(&start, &NodeMatch::Text, !start_at_start)?;

        let Some(range) = self.unref_range(range_ref) else {
            return Ok(());
        };
        self.select(Some(range.clone()));

        let ops: Vec<Op> = span(self.doc(), &range.anchor.path, &range.focus.path)
            .into_iter()
            .filter_map(|(path, node)| match node {
                Node::Text(t) if t.marks.get(mark) != value => {
                    let mut marks = t.marks;
                    marks.set(mark, value);
                    Some(Op::SetTextMarks { path, marks })
                }
                _ => None,
            })
            .collect();
        for op in ops {
            self.apply(op)?;
        }
        Ok(())
    }

    pub fn normalize(
        &mut self,
        passes: &[Box<dyn NormalizePass>],
        max_iterations: usize,
    ) -> Result<(), ApplyError> {
        for _ in 0..max_iterations {
            let mut changed = false;
            for pass in passes {
                let ops = pass.run(self.doc());
                if ops.is_empty() {
                    continue;
                }
                tracing::trace!(pass = pass.id(), count = ops.len(), "normalize pass");
                changed = true;
                for op in ops {
                    self.apply(op)?;
                }
            }
            if !changed {
                self.state.selection = self
                    .state
                    .selection
                    .take()
                    .and_then(|sel| normalize_selection(self.doc(), &sel));
                return Ok(());
            }
        }
        tracing::warn!(max_iterations, "normalization did not converge");
        Err(ApplyError::NormalizeDidNotConverge(max_iterations))
    }
}

/// Fills in the length of the node a merge appends to, so live refs move by
/// the right amount.
fn with_merge_position(doc: &Document, op: Op) -> Op {
    match op {
        Op::MergeNode {
            path,
            position,
            properties,
        } => {
            let position = location::previous(&path)
                .and_then(|prev| doc.node(&prev))
                .map_or(position, |prev| match prev {
                    Node::Text(t) => t.text.len(),
                    other => other.children().len(),
                });
            Op::MergeNode {
                path,
                position,
                properties,
            }
        }
        op => op,
    }
}

pub(crate) fn lift_ops(doc: &Document, path: &[usize]) -> Result<Vec<Op>, ApplyError> {
    if path.len() < 2 {
        return Err(ApplyError::InvalidOp(format!(
            "Cannot lift node at {path:?}: depth is less than 2"
        )));
    }
    let parent_path = location::parent(path);
    let index = path[path.len() - 1];
    let Some(parent) = doc.node(&parent_path) else {
        return Err(ApplyError::InvalidPath(format!("No parent at {parent_path:?}")));
    };
    let length = parent.children().len();

    let ops = if length == 1 {
        vec![
            Op::MoveNode {
                path: path.to_vec(),
                new_path: location::next(&parent_path),
            },
            Op::RemoveNode { path: parent_path },
        ]
    } else if index == 0 {
        vec![Op::MoveNode {
            path: path.to_vec(),
            new_path: parent_path,
        }]
    } else if index == length - 1 {
        vec![Op::MoveNode {
            path: path.to_vec(),
            new_path: location::next(&parent_path),
        }]
    } else {
        let Some(properties) = NodeProps::of(parent) else {
            return Err(ApplyError::InvalidOp("Cannot split a void".into()));
        };
        vec![
            Op::SplitNode {
                path: parent_path.clone(),
                position: index + 1,
                properties,
            },
            Op::MoveNode {
                path: path.to_vec(),
                new_path: location::next(&parent_path),
            },
        ]
    };
    Ok(ops)
}

pub fn span<'a>(doc: &'a Document, from: &[usize], to: &[usize]) -> Vec<(Path, &'a Node)> {
    doc.descendants()
        .into_iter()
        .filter(|(p, _)| {
            compare_paths(p, from) != std::cmp::Ordering::Less
                && compare_paths(p, to) != std::cmp::Ordering::Greater
        })
        .collect()
}

pub fn nodes(doc: &Document, range: &Selection, matcher: &NodeMatch, mode: MatchMode) -> Vec<Path> {
    let (start, end) = range.edges();
    let matched: Vec<Path> = span(doc, &start.path, &end.path)
        .into_iter()
        .filter(|(p, node)| matcher.matches(node, p))
        .map(|(p, _)| p)
        .collect();

    match mode {
        MatchMode::All => matched,
        MatchMode::Lowest => matched
            .iter()
            .filter(|p| !matched.iter().any(|q| is_ancestor(p, q)))
            .cloned()
            .collect(),
        MatchMode::Highest => matched
            .iter()
            .filter(|p| !matched.iter().any(|q| is_ancestor(q, p)))
            .cloned()
            .collect(),
    }
}

/// Pulls back the end of a range that ends at the very start of a later
/// block, so the range no longer "hangs" into that block.
pub fn unhang_range(doc: &Document, range: &Selection) -> Selection {
    let (start, end) = range.edges();
    if range.is_collapsed()
        || start.offset != 0
        || end.offset != 0
        || end.path.last().is_some_and(|ix| *ix > 0)
    {
        return range.clone();
    }

    let end_block = lowest_block_above(doc, &end.path).unwrap_or_default();
    let texts = doc.texts();
    let candidates = texts
        .iter()
        .rev()
        .filter(|(p, _)| !location::is_before(p, &start.path) && !location::is_after(p, &end.path))
        .skip(1);
    for (path, text) in candidates {
        if !text.text.is_empty() || location::is_before(path, &end_block) {
            return Selection::new(start, Point::new(path.clone(), text.text.len()));
        }
    }
    Selection::new(start, end)
}

pub fn start_point(doc: &Document, path: &[usize]) -> Option<Point> {
    doc.texts()
        .into_iter()
        .find(|(p, _)| is_ancestor_or_equal(path, p))
        .map(|(p, _)| Point::new(p, 0))
}

pub fn end_point(doc: &Document, path: &[usize]) -> Option<Point> {
    doc.texts()
        .into_iter()
        .rev()
        .find(|(p, _)| is_ancestor_or_equal(path, p))
        .map(|(p, t)| Point::new(p, t.text.len()))
}

pub fn node_range(doc: &Document, path: &[usize]) -> Option<Selection> {
    Some(Selection::new(start_point(doc, path)?, end_point(doc, path)?))
}

pub fn document_range(doc: &Document) -> Option<Selection> {
    node_range(doc, &[])
}

pub fn lowest_block_above(doc: &Document, path: &[usize]) -> Option<Path> {
    (1..path.len()).rev().map(|depth| path[..depth].to_vec()).find(|p| {
        doc.node(p)
            .is_some_and(|n| matches!(n, Node::Element(el) if el.kind.spec().is_block()))
    })
}

pub fn closest_of_kind(doc: &Document, path: &[usize], kind: ElementKind) -> Option<Path> {
    (1..=path.len())
        .rev()
        .map(|depth| path[..depth].to_vec())
        .find(|p| doc.node(p).is_some_and(|n| n.is_element_kind(kind)))
}

pub(crate) fn covers(doc: &Document, range: &Selection, path: &[usize]) -> bool {
    let Some(text) = doc.text(path) else {
        return true;
    };
    let (start, end) = range.edges();
    if start.path == path && start.offset >= text.text.len() && !text.text.is_empty() {
        return false;
    }
    if end.path == path && end.offset == 0 && start.path != path {
        return false;
    }
    true
}
