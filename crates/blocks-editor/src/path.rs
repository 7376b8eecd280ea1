use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub type Path = Vec<usize>;

/// Compare two paths in document order. A path and its ancestor compare
/// equal.
pub fn compare(a: &[usize], b: &[usize]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

pub fn parent(path: &[usize]) -> &[usize] {
    match path.split_last() {
        Some((_, parent)) => parent,
        None => path,
    }
}

pub fn next(path: &[usize]) -> Path {
    let mut out = path.to_vec();
    if let Some(last) = out.last_mut() {
        *last += 1;
    }
    out
}

pub fn previous(path: &[usize]) -> Option<Path> {
    let (&last, parent) = path.split_last()?;
    let last = last.checked_sub(1)?;
    let mut out = parent.to_vec();
    out.push(last);
    Some(out)
}

pub fn child(path: &[usize], ix: usize) -> Path {
    let mut out = path.to_vec();
    out.push(ix);
    out
}

pub fn is_ancestor(path: &[usize], other: &[usize]) -> bool {
    path.len() < other.len() && other.starts_with(path)
}

pub fn is_descendant(path: &[usize], other: &[usize]) -> bool {
    is_ancestor(other, path)
}

/// Whether `path` addresses an earlier sibling of `other` or of one of
/// `other`'s ancestors.
pub fn ends_before(path: &[usize], other: &[usize]) -> bool {
    let Some((&last, parent)) = path.split_last() else {
        return false;
    };
    other.len() > parent.len() && other.starts_with(parent) && last < other[parent.len()]
}

pub fn is_sibling(path: &[usize], other: &[usize]) -> bool {
    !path.is_empty() && path.len() == other.len() && parent(path) == parent(other) && path != other
}

/// Every ancestor of `path` from the root down, excluding `path` itself.
pub fn ancestors(path: &[usize]) -> Vec<Path> {
    (0..path.len()).map(|len| path[..len].to_vec()).collect()
}

/// The deepest path shared by `a` and `b`.
pub fn common(a: &[usize], b: &[usize]) -> Path {
    a.iter()
        .zip(b.iter())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| *x)
        .collect()
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
        match compare(&self.path, &other.path) {
            Ordering::Equal => self.offset.cmp(&other.offset),
            other => other,
        }
    }

    pub fn is_before(&self, other: &Point) -> bool {
        self.compare(other) == Ordering::Less
    }

    pub fn is_after(&self, other: &Point) -> bool {
        self.compare(other) == Ordering::Greater
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub anchor: Point,
    pub focus: Point,
}

impl Range {
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

    pub fn is_backward(&self) -> bool {
        self.anchor.is_after(&self.focus)
    }

    /// `(start, end)` in document order.
    pub fn edges(&self) -> (&Point, &Point) {
        if self.is_backward() {
            (&self.focus, &self.anchor)
        } else {
            (&self.anchor, &self.focus)
        }
    }

    pub fn start(&self) -> &Point {
        self.edges().0
    }

    pub fn end(&self) -> &Point {
        self.edges().1
    }

    pub fn includes_point(&self, point: &Point) -> bool {
        let (start, end) = self.edges();
        !point.is_before(start) && !point.is_after(end)
    }

    /// Whether any part of the node at `path` lies inside the range.
    pub fn touches_path(&self, path: &[usize]) -> bool {
        let (start, end) = self.edges();
        compare(path, &start.path) != Ordering::Less && compare(path, &end.path) != Ordering::Greater
    }

    pub fn points(&self) -> [&Point; 2] {
        [&self.anchor, &self.focus]
    }
}
