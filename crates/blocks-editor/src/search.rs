//! Literal, case-insensitive text search.
//!
//! Matching runs over the flattened text of one text block at a time, so a
//! match may span several leaves (and cross into or out of a link) but
//! never a block boundary.

use crate::node::{Category, Document, Node};
use crate::path::{self, Path, Range};
use crate::query::BlockText;

/// Lazy iterator over the matches of a query, in document order.
pub struct Search<'a> {
    doc: &'a Document,
    needle: Vec<char>,
    at: Option<Range>,
    /// Element paths still to visit, next one on top.
    pending: Vec<Path>,
    current: Option<BlockText>,
    cursor: usize,
}

/// Start a search for `query`, optionally limited to matches lying fully
/// inside `at`.
pub fn search<'a>(doc: &'a Document, query: &str, at: Option<&Range>) -> Search<'a> {
    Search {
        doc,
        needle: query.chars().collect(),
        at: at.cloned(),
        pending: (0..doc.children.len()).rev().map(|ix| vec![ix]).collect(),
        current: None,
        cursor: 0,
    }
}

impl Search<'_> {
    /// Next block holding text directly, walking the tree on demand. Subtrees
    /// wholly outside `at` are never entered.
    fn next_block(&mut self) -> Option<Path> {
        while let Some(at) = self.pending.pop() {
            if let Some(scope) = &self.at {
                let (from, to) = scope.edges();
                if path::compare(&at, &to.path).is_gt() {
                    self.pending.clear();
                    return None;
                }
                if path::compare(&at, &from.path).is_lt() {
                    continue;
                }
            }
            let Some(Node::Element(el)) = self.doc.node(&at) else {
                continue;
            };
            let mut holds_text = false;
            for (ix, child) in el.children.iter().enumerate().rev() {
                match child.kind() {
                    Some(kind) if kind.category() != Category::Link => {
                        self.pending.push(path::child(&at, ix));
                    }
                    _ => holds_text = true,
                }
            }
            if holds_text {
                return Some(at);
            }
        }
        None
    }
}

impl Iterator for Search<'_> {
    type Item = Range;

    fn next(&mut self) -> Option<Range> {
        if self.needle.is_empty() {
            return None;
        }
        loop {
            if self.current.is_none() {
                let block = self.next_block()?;
                self.current = Some(BlockText::of(self.doc, &block));
                self.cursor = 0;
            }
            let block = self.current.as_ref()?;
            let Some((start, end)) = find_from(&block.text, &self.needle, self.cursor) else {
                self.current = None;
                continue;
            };
            self.cursor = end;
            let (Some(anchor), Some(focus)) =
                (block.point_at(start, true), block.point_at(end, false))
            else {
                continue;
            };
            let range = Range::new(anchor, focus);
            let inside = self.at.as_ref().is_none_or(|at| {
                let (from, to) = at.edges();
                !range.anchor.is_before(from) && !range.focus.is_after(to)
            });
            if inside {
                return Some(range);
            }
        }
    }
}

fn chars_match(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Byte span of the first match at or after byte offset `from`.
fn find_from(haystack: &str, needle: &[char], from: usize) -> Option<(usize, usize)> {
    let rest = haystack.get(from..)?;
    for (ix, _) in rest.char_indices() {
        let mut chars = rest[ix..].char_indices();
        let mut end = ix;
        let matched = needle.iter().all(|&want| match chars.next() {
            Some((at, got)) if chars_match(want, got) => {
                end = ix + at + got.len_utf8();
                true
            }
            _ => false,
        });
        if matched {
            return Some((from + ix, from + end));
        }
    }
    None
}
