use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::ops::Op;

pub type Path = Vec<usize>;

/// Which side a location sticks to when content is inserted or split exactly at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Forward,
    Backward,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }

    pub fn compare(&self, other: &Point) -> Ordering {
        match compare_paths(&self.path, &other.path) {
            Ordering::Equal => self.offset.cmp(&other.offset),
            ord => ord,
        }
    }

    pub fn is_before(&self, other: &Point) -> bool {
        self.compare(other) == Ordering::Less
    }

    pub fn is_after(&self, other: &Point) -> bool {
        self.compare(other) == Ordering::Greater
    }
}

/// A range between two points. `anchor` is where the selection started,
/// `focus` where it ends; either may come first in document order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn is_expanded(&self) -> bool {
        !self.is_collapsed()
    }

    pub fn is_backward(&self) -> bool {
        self.anchor.is_after(&self.focus)
    }

    pub fn edges(&self) -> (Point, Point) {
        if self.is_backward() {
            (self.focus.clone(), self.anchor.clone())
        } else {
            (self.anchor.clone(), self.focus.clone())
        }
    }

    pub fn start(&self) -> Point {
        self.edges().0
    }

    pub fn end(&self) -> Point {
        self.edges().1
    }

    pub fn intersection(&self, other: &Selection) -> Option<Selection> {
        let (s1, e1) = self.edges();
        let (s2, e2) = other.edges();
        let start = if s1.is_before(&s2) { s2 } else { s1 };
        let end = if e1.is_before(&e2) { e1 } else { e2 };
        if end.is_before(&start) {
            None
        } else {
            Some(Selection::new(start, end))
        }
    }
}

/// Compares two paths in document order. A path and any of its ancestors compare equal.
pub fn compare_paths(a: &[usize], b: &[usize]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    Ordering::Equal
}

pub fn is_ancestor(ancestor: &[usize], path: &[usize]) -> bool {
    ancestor.len() < path.len() && path.starts_with(ancestor)
}

pub fn is_ancestor_or_equal(ancestor: &[usize], path: &[usize]) -> bool {
    path.starts_with(ancestor)
}

pub fn is_before(a: &[usize], b: &[usize]) -> bool {
    compare_paths(a, b) == Ordering::Less
}

pub fn is_after(a: &[usize], b: &[usize]) -> bool {
    compare_paths(a, b) == Ordering::Greater
}

pub fn ends_before(a: &[usize], b: &[usize]) -> bool {
    let Some((&last, parent)) = a.split_last() else {
        return false;
    };
    b.len() > parent.len() && b.starts_with(parent) && last < b[parent.len()]
}

pub fn is_sibling(a: &[usize], b: &[usize]) -> bool {
    if a.len() != b.len() || a.is_empty() || a == b {
        return false;
    }
    a[..a.len() - 1] == b[..b.len() - 1]
}

pub fn parent(path: &[usize]) -> Path {
    path[..path.len().saturating_sub(1)].to_vec()
}

pub fn next(path: &[usize]) -> Path {
    let mut next = path.to_vec();
    if let Some(last) = next.last_mut() {
        *last += 1;
    }
    next
}

pub fn previous(path: &[usize]) -> Option<Path> {
    let (&last, parent) = path.split_last()?;
    let mut prev = parent.to_vec();
    prev.push(last.checked_sub(1)?);
    Some(prev)
}

pub fn common(a: &[usize], b: &[usize]) -> Path {
    a.iter()
        .zip(b.iter())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| *x)
        .collect()
}

pub fn transform_path(path: &[usize], op: &Op, affinity: Affinity) -> Option<Path> {
    let mut p = path.to_vec();
    match op {
        Op::InsertNode { path: at, .. } => {
            if at.as_slice() == path || ends_before(at, path) || is_ancestor(at, path) {
                p[at.len() - 1] += 1;
            }
        }
        Op::RemoveNode { path: at } => {
            if is_ancestor_or_equal(at, path) {
                return None;
            }
            if ends_before(at, path) {
                p[at.len() - 1] -= 1;
            }
        }
        Op::MergeNode {
            path: at, position, ..
        } => {
            if at.as_slice() == path || ends_before(at, path) {
                p[at.len() - 1] -= 1;
            } else if is_ancestor(at, path) {
                p[at.len() - 1] -= 1;
                p[at.len()] += position;
            }
        }
        Op::SplitNode { path: at, position, .. } => {
            if at.as_slice() == path {
                if affinity == Affinity::Forward {
                    if let Some(last) = p.last_mut() {
                        *last += 1;
                    }
                }
            } else if ends_before(at, path) {
                p[at.len() - 1] += 1;
            } else if is_ancestor(at, path) && path[at.len()] >= *position {
                p[at.len() - 1] += 1;
                p[at.len()] -= position;
            }
        }
        Op::MoveNode { path: from, new_path: to } => {
            if from == to {
                return Some(p);
            }
            if is_ancestor_or_equal(from, path) {
                let mut copy = to.clone();
                if ends_before(from, to) && from.len() < to.len() {
                    copy[from.len() - 1] -= 1;
                }
                copy.extend_from_slice(&path[from.len()..]);
                return Some(copy);
            }
            if is_sibling(from, to) && is_ancestor_or_equal(to, path) {
                if ends_before(from, path) {
                    p[from.len() - 1] -= 1;
                } else {
                    p[from.len() - 1] += 1;
                }
            } else if ends_before(to, path) || is_ancestor_or_equal(to, path) {
                if ends_before(from, path) {
                    p[from.len() - 1] -= 1;
                }
                p[to.len() - 1] += 1;
            } else if ends_before(from, path) {
                if to.as_slice() == path {
                    p[to.len() - 1] += 1;
                }
                p[from.len() - 1] -= 1;
            }
        }
        Op::InsertText { .. }
        | Op::RemoveText { .. }
        | Op::SetNodeKind { .. }
        | Op::SetNodeAttrs { .. }
        | Op::SetTextMarks { .. } => {}
    }
    Some(p)
}

pub fn transform_point(point: &Point, op: &Op, affinity: Affinity) -> Option<Point> {
    let mut p = point.clone();
    match op {
        Op::InsertText { path, offset, text } => {
            if *path == point.path
                && (*offset < point.offset
                    || (*offset == point.offset && affinity == Affinity::Forward))
            {
                p.offset += text.len();
            }
        }
        Op::RemoveText { path, range } => {
            if *path == point.path && range.start <= point.offset {
                p.offset -= (point.offset - range.start).min(range.len());
            }
        }
        Op::MergeNode { path, position, .. } => {
            if *path == point.path {
                p.offset += position;
            }
            p.path = transform_path(&point.path, op, affinity)?;
        }
        Op::SplitNode { path, position, .. } => {
            if *path == point.path {
                if *position < point.offset
                    || (*position == point.offset && affinity == Affinity::Forward)
                {
                    p.offset -= position;
                    p.path = transform_path(&point.path, op, Affinity::Forward)?;
                }
            } else {
                p.path = transform_path(&point.path, op, affinity)?;
            }
        }
        _ => {
            p.path = transform_path(&point.path, op, affinity)?;
        }
    }
    Some(p)
}
