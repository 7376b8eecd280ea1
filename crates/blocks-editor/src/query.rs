//! Read-only navigation over a [`Document`]: traversal, text extraction and
//! point stepping.

use unicode_segmentation::UnicodeSegmentation;

use crate::node::{Category, Document, Node, Text};
use crate::path::{self, Path, Point, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// One char; every leaf boundary counts as a step.
    Offset,
    /// One grapheme cluster; leaf boundaries inside a block are free.
    Character,
}

/// Every leaf in document order.
pub fn texts(doc: &Document) -> Vec<(Path, &Text)> {
    let mut out = Vec::new();
    for (ix, child) in doc.children.iter().enumerate() {
        collect_texts(child, &mut vec![ix], &mut out);
    }
    out
}

/// Every node in document order, parents before their children.
pub fn nodes(doc: &Document) -> Vec<(Path, &Node)> {
    doc.all_paths()
        .into_iter()
        .filter_map(|p| doc.node(&p).map(|node| (p, node)))
        .collect()
}

/// Every leaf at or below `root`, in document order.
pub fn texts_in<'a>(doc: &'a Document, root: &[usize]) -> Vec<(Path, &'a Text)> {
    let mut out = Vec::new();
    if let Some(node) = doc.node(root) {
        collect_texts(node, &mut root.to_vec(), &mut out);
    }
    out
}

fn collect_texts<'a>(node: &'a Node, path: &mut Path, out: &mut Vec<(Path, &'a Text)>) {
    match node {
        Node::Text(t) => out.push((path.clone(), t)),
        Node::Element(el) => {
            for (ix, child) in el.children.iter().enumerate() {
                path.push(ix);
                collect_texts(child, path, out);
                path.pop();
            }
        }
    }
}

/// The nearest strict ancestor of `at` matching `predicate`.
pub fn above<'a>(
    doc: &'a Document,
    at: &[usize],
    predicate: impl Fn(&Node) -> bool,
) -> Option<(Path, &'a Node)> {
    path::ancestors(at)
        .into_iter()
        .rev()
        .filter(|p| !p.is_empty())
        .find_map(|p| {
            let node = doc.node(&p)?;
            predicate(node).then_some((p, node))
        })
}

/// Every node on the way from the root down to `at`, inclusive.
pub fn levels<'a>(doc: &'a Document, at: &[usize]) -> Vec<(Path, &'a Node)> {
    (1..=at.len())
        .filter_map(|len| {
            let p = at[..len].to_vec();
            doc.node(&p).map(|node| (p, node))
        })
        .collect()
}

/// The closest ancestor of `at` that is not an inline element. For a leaf
/// inside a link this is the paragraph holding the link.
pub fn text_block_path(doc: &Document, at: &[usize]) -> Path {
    above(doc, at, |node| {
        node.kind()
            .is_some_and(|kind| kind.category() != Category::Link)
    })
    .map(|(p, _)| p)
    .unwrap_or_else(|| at.get(..1).map(<[usize]>::to_vec).unwrap_or_default())
}

/// First and last point of the subtree at `at`.
pub fn edges(doc: &Document, at: &[usize]) -> Option<(Point, Point)> {
    doc.node(at)?;
    let leaves = texts_in(doc, at);
    match (leaves.first(), leaves.last()) {
        (Some((first, _)), Some((last, last_text))) => Some((
            Point::new(first.clone(), 0),
            Point::new(last.clone(), last_text.text.len()),
        )),
        _ => Some((Point::new(at.to_vec(), 0), Point::new(at.to_vec(), 0))),
    }
}

/// Concatenated leaf text between the edges of `range`.
pub fn string(doc: &Document, range: &Range) -> String {
    let (start, end) = range.edges();
    let mut out = String::new();
    for (p, t) in texts(doc) {
        if path::compare(&p, &start.path).is_lt() || path::compare(&p, &end.path).is_gt() {
            continue;
        }
        let from = if p == start.path { start.offset } else { 0 };
        let to = if p == end.path {
            end.offset
        } else {
            t.text.len()
        };
        if let Some(slice) = t.text.get(from.min(to)..to.min(t.text.len())) {
            out.push_str(slice);
        }
    }
    out
}

pub fn after(doc: &Document, point: &Point, unit: Unit) -> Option<Point> {
    let leaves = texts(doc);
    let ix = leaves.iter().position(|(p, _)| *p == point.path)?;
    let text = &leaves[ix].1.text;
    if point.offset < text.len() {
        let next = step_forward(text, point.offset, unit)?;
        return Some(Point::new(point.path.clone(), next));
    }
    let block = text_block_path(doc, &point.path);
    for (p, t) in leaves.iter().skip(ix + 1) {
        if unit == Unit::Offset || text_block_path(doc, p) != block {
            return Some(Point::new(p.clone(), 0));
        }
        if let Some(next) = step_forward(&t.text, 0, unit) {
            return Some(Point::new(p.clone(), next));
        }
    }
    None
}

pub fn before(doc: &Document, point: &Point, unit: Unit) -> Option<Point> {
    let leaves = texts(doc);
    let ix = leaves.iter().position(|(p, _)| *p == point.path)?;
    if point.offset > 0 {
        let prev = step_backward(&leaves[ix].1.text, point.offset, unit)?;
        return Some(Point::new(point.path.clone(), prev));
    }
    let block = text_block_path(doc, &point.path);
    for (p, t) in leaves[..ix].iter().rev() {
        if unit == Unit::Offset || text_block_path(doc, p) != block {
            return Some(Point::new(p.clone(), t.text.len()));
        }
        if let Some(prev) = step_backward(&t.text, t.text.len(), unit) {
            return Some(Point::new(p.clone(), prev));
        }
    }
    None
}

fn step_forward(text: &str, offset: usize, unit: Unit) -> Option<usize> {
    let rest = text.get(offset..)?;
    let len = match unit {
        Unit::Offset => rest.chars().next()?.len_utf8(),
        Unit::Character => rest.graphemes(true).next()?.len(),
    };
    Some(offset + len)
}

fn step_backward(text: &str, offset: usize, unit: Unit) -> Option<usize> {
    let head = text.get(..offset)?;
    let len = match unit {
        Unit::Offset => head.chars().next_back()?.len_utf8(),
        Unit::Character => head.graphemes(true).next_back()?.len(),
    };
    Some(offset - len)
}

pub fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

/// Map a possibly stale point onto the current document: clamp each index
/// to the nearest still-existing child, then descend to a leaf.
pub fn resolve_point(doc: &Document, point: &Point) -> Option<Point> {
    if doc.children.is_empty() {
        return None;
    }
    let mut resolved: Path = Vec::new();
    let mut children: &[Node] = &doc.children;
    let mut exact = true;
    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        exact &= ix == wanted;
        resolved.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                let offset = if exact { point.offset } else { t.text.len() };
                return Some(Point::new(
                    resolved,
                    clamp_to_char_boundary(&t.text, offset),
                ));
            }
            Node::Element(el) => children = &el.children,
        }
    }
    if let Some((p, _)) = texts_in(doc, &resolved).into_iter().next() {
        return Some(Point::new(p, 0));
    }
    // No leaf below: take the next leaf in document order, then the
    // previous one, then settle on the void itself.
    let leaves = texts(doc);
    if let Some((p, _)) = leaves
        .iter()
        .find(|(p, _)| path::compare(p, &resolved).is_gt())
    {
        return Some(Point::new(p.clone(), 0));
    }
    if let Some((p, t)) = leaves
        .iter()
        .rev()
        .find(|(p, _)| path::compare(p, &resolved).is_lt())
    {
        return Some(Point::new(p.clone(), t.text.len()));
    }
    Some(Point::new(resolved, 0))
}

pub fn is_valid_point(doc: &Document, point: &Point) -> bool {
    match doc.node(&point.path) {
        Some(Node::Text(t)) => point.offset <= t.text.len() && t.text.is_char_boundary(point.offset),
        Some(Node::Element(el)) => el.children.is_empty() && point.offset == 0,
        None => false,
    }
}

/// A leaf's place in the flattened text of its block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafSpan {
    pub path: Path,
    pub start: usize,
    pub end: usize,
}

/// The concatenated text of a block together with where each leaf sits in
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockText {
    pub text: String,
    pub spans: Vec<LeafSpan>,
}

impl BlockText {
    pub fn of(doc: &Document, block: &[usize]) -> Self {
        let mut text = String::new();
        let mut spans = Vec::new();
        for (p, t) in texts_in(doc, block) {
            let start = text.len();
            text.push_str(&t.text);
            spans.push(LeafSpan {
                path: p,
                start,
                end: text.len(),
            });
        }
        Self { text, spans }
    }

    pub fn offset_of(&self, point: &Point) -> Option<usize> {
        self.spans
            .iter()
            .find(|span| span.path == point.path)
            .map(|span| span.start + point.offset.min(span.end - span.start))
    }

    /// The leaf point at block offset `offset`. At a leaf boundary the
    /// earlier leaf wins unless `forward` is set.
    pub fn point_at(&self, offset: usize, forward: bool) -> Option<Point> {
        let span = if forward {
            self.spans
                .iter()
                .find(|s| offset >= s.start && offset < s.end)
                .or_else(|| self.spans.iter().rev().find(|s| offset == s.end))
        } else {
            self.spans
                .iter()
                .find(|s| offset >= s.start && offset <= s.end)
        }?;
        Some(Point::new(span.path.clone(), offset - span.start))
    }

    /// Byte ranges inside each leaf covered by `start..end` of the block
    /// text.
    pub fn leaf_slices(&self, start: usize, end: usize) -> Vec<(Path, usize, usize)> {
        self.spans
            .iter()
            .filter(|s| s.start < end && s.end > start)
            .map(|s| {
                (
                    s.path.clone(),
                    start.max(s.start) - s.start,
                    end.min(s.end) - s.start,
                )
            })
            .collect()
    }
}
