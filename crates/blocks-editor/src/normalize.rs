//! Built-in normalization rules.
//!
//! Each element kind maps to an ordered chain of rules. The engine asks the
//! chain about one node at a time; the first rule that finds a violation
//! returns a single corrective rewrite and the engine reschedules from the
//! paths that rewrite dirtied. A node is settled once no rule in its chain
//! fires.

use crate::links;
use crate::node::{Category, Document, Element, ElementKind, Node};
use crate::ops::{NodeProperties, Op};
use crate::path;
use crate::plugin::{ChildConstraint, NodeEntry, NormalizeContext};
use crate::query::BlockText;

/// One corrective rewrite: the ops of a single rule firing once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub rule: &'static str,
    pub ops: Vec<Op>,
}

impl Rewrite {
    pub fn new(rule: &'static str, ops: Vec<Op>) -> Self {
        Self { rule, ops }
    }
}

type Rule = fn(&NormalizeContext<'_>, &Element, &[usize]) -> Option<Vec<Op>>;

const PARAGRAPH_RULES: &[(&str, Rule)] = &[
    ("paragraph.delete_empty", delete_empty_block),
    ("paragraph.unwrap_same_type", unwrap_same_type_child),
    ("paragraph.hoist_block", hoist_block_child),
    ("paragraph.trim_leading_breaks", trim_leading_breaks),
    ("paragraph.trim_trailing_breaks", trim_trailing_breaks),
    ("paragraph.split_blank_line", split_blank_line),
    ("leaves.merge_adjacent", merge_adjacent_leaves),
    ("leaves.drop_empty", drop_empty_leaf),
];

const QUOTE_RULES: &[(&str, Rule)] = &[
    ("quote.unwrap_nested", unwrap_same_type_child),
    ("quote.wrap_inline", wrap_inline_run_in_paragraph),
    ("quote.evict_block", evict_from_quote),
];

const LIST_RULES: &[(&str, Rule)] = &[
    ("list.delete_empty", delete_empty_block),
    ("list.wrap_stray", wrap_inline_run_in_list_item),
    ("list.adopt_block", adopt_list_child),
];

const MEDIA_RULES: &[(&str, Rule)] = &[
    ("media.delete_empty", delete_empty_block),
    ("media.evict_non_image", evict_non_image),
];

const LINK_RULES: &[(&str, Rule)] = &[
    ("link.unwrap_nested", unwrap_nested_link),
    ("link.hoist_element", hoist_link_element),
    ("link.fill_empty", fill_empty_link),
    ("link.merge_leaves", merge_link_leaves),
    ("link.drop_blank", drop_blank_link),
    ("link.sync_label", sync_link_label),
];

const CONTAINER_RULES: &[(&str, Rule)] = &[
    ("container.delete_empty", delete_empty_block),
    ("container.wrap_stray", wrap_inline_run_in_paragraph),
];

const TERMINAL_RULES: &[(&str, Rule)] = &[("terminal.clear_children", clear_terminal_children)];

/// The innermost `normalizeNode`: dispatch on the element kind.
pub fn default_normalize(cx: &NormalizeContext<'_>, entry: NodeEntry<'_>) -> Option<Rewrite> {
    let Node::Element(el) = entry.node else {
        return None;
    };
    let chain = match cx.capabilities.spec(el.kind.tag()) {
        Some(spec) => match spec.children {
            ChildConstraint::InlineOnly if el.kind.category() == Category::Link => LINK_RULES,
            ChildConstraint::InlineOnly => PARAGRAPH_RULES,
            ChildConstraint::BlockOnly => CONTAINER_RULES,
            ChildConstraint::None => TERMINAL_RULES,
            ChildConstraint::Any => &[],
        },
        None => match el.kind.category() {
            Category::ParagraphLike if cx.capabilities.is_block_quote(el) => QUOTE_RULES,
            Category::ParagraphLike => PARAGRAPH_RULES,
            Category::List => LIST_RULES,
            Category::Media => MEDIA_RULES,
            Category::Link => LINK_RULES,
            Category::Terminal => TERMINAL_RULES,
            // Unregistered tags are opaque atoms.
            Category::Other => TERMINAL_RULES,
        },
    };
    run_chain(chain, cx, el, entry.path)
}

fn run_chain(
    chain: &[(&'static str, Rule)],
    cx: &NormalizeContext<'_>,
    el: &Element,
    at: &[usize],
) -> Option<Rewrite> {
    chain
        .iter()
        .find_map(|(id, rule)| rule(cx, el, at).map(|ops| Rewrite::new(id, ops)))
}

/// Rules for the document root itself.
pub fn normalize_root(cx: &NormalizeContext<'_>) -> Option<Rewrite> {
    if cx.doc.children.is_empty() {
        return Some(Rewrite::new(
            "root.ensure_block",
            vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }],
        ));
    }
    for (ix, child) in cx.doc.children.iter().enumerate() {
        match child {
            // A bare leaf is what a block without children decodes to.
            Node::Text(_) => {
                return Some(Rewrite::new(
                    "root.wrap_leaf",
                    wrap_ops(&[], ix, ElementKind::Paragraph),
                ));
            }
            Node::Element(el) if cx.capabilities.is_inline(&el.kind) => {
                return Some(Rewrite::new(
                    "root.wrap_inline",
                    wrap_ops(&[], ix, ElementKind::Paragraph),
                ));
            }
            Node::Element(el) if el.kind == ElementKind::ListItem => {
                return Some(Rewrite::new(
                    "root.wrap_list_item",
                    wrap_ops(&[], ix, ElementKind::BulletedList),
                ));
            }
            Node::Element(_) => {}
        }
    }
    None
}

fn remove_op(cx: &NormalizeContext<'_>, at: &[usize]) -> Option<Op> {
    Some(Op::RemoveNode {
        path: at.to_vec(),
        node: cx.doc.node(at)?.clone(),
    })
}

/// Insert an empty `kind` element at `parent[ix]` and move the node that
/// was there into it.
fn wrap_ops(parent: &[usize], ix: usize, kind: ElementKind) -> Vec<Op> {
    vec![
        Op::InsertNode {
            path: path::child(parent, ix),
            node: Node::element(kind, Vec::new()),
        },
        Op::MoveNode {
            path: path::child(parent, ix + 1),
            new_path: path::child(&path::child(parent, ix), 0),
        },
    ]
}

/// Move the child at `at[ix]` out to sit right after `at`. Children after
/// it are split off into a copy of `at` first, so the evicted node lands
/// between the two halves and document order holds. An emptied left half
/// is left for `delete_empty` to collect.
fn evict_child_ops(el: &Element, at: &[usize], ix: usize) -> Vec<Op> {
    let mut ops = Vec::with_capacity(2);
    if ix + 1 < el.children.len() {
        ops.push(Op::SplitNode {
            path: at.to_vec(),
            position: ix + 1,
            properties: NodeProperties::Element(el.kind.clone()),
        });
    }
    ops.push(Op::MoveNode {
        path: path::child(at, ix),
        new_path: path::next(at),
    });
    ops
}

/// Replace the element at `parent[ix]` with its own children.
fn unwrap_child_ops(cx: &NormalizeContext<'_>, parent: &[usize], ix: usize) -> Option<Vec<Op>> {
    let Node::Element(child) = cx.doc.node(&path::child(parent, ix))? else {
        return None;
    };
    let count = child.children.len();
    let mut ops: Vec<Op> = (0..count)
        .map(|k| Op::MoveNode {
            path: path::child(&path::child(parent, ix + k), 0),
            new_path: path::child(parent, ix + k),
        })
        .collect();
    ops.push(Op::RemoveNode {
        path: path::child(parent, ix + count),
        node: Node::element(child.kind.clone(), Vec::new()),
    });
    Some(ops)
}

fn delete_empty_block(cx: &NormalizeContext<'_>, el: &Element, at: &[usize]) -> Option<Vec<Op>> {
    if !el.children.is_empty() {
        return None;
    }
    let holds_text = cx.capabilities.child_constraint(&el.kind) == ChildConstraint::InlineOnly;
    let only_root = at.len() == 1 && cx.doc.children.len() == 1;
    if holds_text && (only_root || cx.selection_inside(at)) {
        return Some(vec![Op::InsertNode {
            path: path::child(at, 0),
            node: Node::text(""),
        }]);
    }
    Some(vec![remove_op(cx, at)?])
}

fn unwrap_same_type_child(
    cx: &NormalizeContext<'_>,
    el: &Element,
    at: &[usize],
) -> Option<Vec<Op>> {
    let ix = el
        .children
        .iter()
        .position(|child| child.kind().is_some_and(|kind| kind.same_type(&el.kind)))?;
    unwrap_child_ops(cx, at, ix)
}

fn hoist_block_child(cx: &NormalizeContext<'_>, el: &Element, at: &[usize]) -> Option<Vec<Op>> {
    let ix = el
        .children
        .iter()
        .position(|child| child.kind().is_some_and(|kind| cx.capabilities.is_block(kind)))?;
    Some(evict_child_ops(el, at, ix))
}

fn remove_block_text(
    cx: &NormalizeContext<'_>,
    block: &BlockText,
    start: usize,
    end: usize,
) -> Option<Vec<Op>> {
    let ops: Vec<Op> = block
        .leaf_slices(start, end)
        .into_iter()
        .filter(|(_, from, to)| from < to)
        .filter_map(|(leaf, from, to)| {
            let text = cx.doc.text(&leaf)?.text.get(from..to)?.to_string();
            Some(Op::RemoveText {
                path: leaf,
                offset: from,
                text,
            })
        })
        .collect();
    (!ops.is_empty()).then_some(ops)
}

fn trim_leading_breaks(cx: &NormalizeContext<'_>, _el: &Element, at: &[usize]) -> Option<Vec<Op>> {
    if cx.selection_inside(at) {
        return None;
    }
    let block = BlockText::of(cx.doc, at);
    let run_end = block
        .text
        .find(|c: char| !c.is_whitespace())
        .unwrap_or(block.text.len());
    if !block.text[..run_end].contains('\n') {
        return None;
    }
    remove_block_text(cx, &block, 0, run_end)
}

fn trim_trailing_breaks(
    cx: &NormalizeContext<'_>,
    _el: &Element,
    at: &[usize],
) -> Option<Vec<Op>> {
    let block = BlockText::of(cx.doc, at);
    let run_start = block.text.trim_end_matches(char::is_whitespace).len();
    if !block.text[run_start..].contains('\n') {
        return None;
    }
    let touching = cx.selection.is_some_and(|range| {
        range
            .points()
            .iter()
            .any(|point| block.offset_of(point).is_some_and(|o| o >= run_start))
    });
    if touching {
        return None;
    }
    remove_block_text(cx, &block, run_start, block.text.len())
}

/// Offset just past the first line break of the first whitespace run that
/// holds two or more line breaks.
pub(crate) fn blank_line_split_offset(text: &str) -> Option<usize> {
    let mut breaks = 0;
    let mut first_break = 0;
    for (ix, ch) in text.char_indices() {
        if !ch.is_whitespace() {
            breaks = 0;
            continue;
        }
        if ch == '\n' {
            if breaks == 0 {
                first_break = ix;
            }
            breaks += 1;
            if breaks >= 2 {
                return Some(first_break + 1);
            }
        }
    }
    None
}

fn split_blank_line(cx: &NormalizeContext<'_>, _el: &Element, at: &[usize]) -> Option<Vec<Op>> {
    let block = BlockText::of(cx.doc, at);
    let offset = blank_line_split_offset(&block.text)?;
    split_block_ops(cx.doc, at, &block, offset)
}

/// Ops splitting the block at `block_path` at a block-text offset, cutting
/// through any inline element on the way. The right half becomes the next
/// sibling of the block.
pub(crate) fn split_block_ops(
    doc: &Document,
    block_path: &[usize],
    block: &BlockText,
    offset: usize,
) -> Option<Vec<Op>> {
    let mut ops = Vec::new();
    let (mut current, mut position, mut grew) = match block.point_at(offset, false) {
        Some(point) => {
            let leaf = doc.text(&point.path)?;
            let leaf_ix = *point.path.last()?;
            let (position, grew) = if point.offset == 0 {
                (leaf_ix, false)
            } else if point.offset >= leaf.text.len() {
                (leaf_ix + 1, false)
            } else {
                ops.push(Op::SplitNode {
                    path: point.path.clone(),
                    position: point.offset,
                    properties: NodeProperties::Text(leaf.marks),
                });
                (leaf_ix + 1, true)
            };
            (path::parent(&point.path).to_vec(), position, grew)
        }
        // A block without leaves splits after its last child.
        None => (
            block_path.to_vec(),
            doc.node(block_path)?.children().len(),
            false,
        ),
    };

    while current.as_slice() != block_path {
        if current.len() <= block_path.len() {
            return None;
        }
        let el = doc.element(&current)?;
        let len = el.children.len() + usize::from(grew);
        let ix = *current.last()?;
        if position == 0 {
            position = ix;
            grew = false;
        } else if position >= len {
            position = ix + 1;
            grew = false;
        } else {
            ops.push(Op::SplitNode {
                path: current.clone(),
                position,
                properties: NodeProperties::Element(el.kind.clone()),
            });
            position = ix + 1;
            grew = true;
        }
        current.pop();
    }

    let el = doc.element(block_path)?;
    ops.push(Op::SplitNode {
        path: block_path.to_vec(),
        position,
        properties: NodeProperties::Element(el.kind.clone()),
    });
    Some(ops)
}

fn merge_adjacent_leaves(
    _cx: &NormalizeContext<'_>,
    el: &Element,
    at: &[usize],
) -> Option<Vec<Op>> {
    let ix = el.children.windows(2).position(|pair| {
        matches!((&pair[0], &pair[1]), (Node::Text(a), Node::Text(b)) if a.marks == b.marks)
    })?;
    let (Node::Text(left), Node::Text(right)) = (&el.children[ix], &el.children[ix + 1]) else {
        return None;
    };
    Some(vec![Op::MergeNode {
        path: path::child(at, ix + 1),
        position: left.text.len(),
        properties: NodeProperties::Text(right.marks),
    }])
}

fn drop_empty_leaf(cx: &NormalizeContext<'_>, el: &Element, at: &[usize]) -> Option<Vec<Op>> {
    if el.children.len() < 2 {
        return None;
    }
    let ix = el
        .children
        .iter()
        .position(|child| matches!(child, Node::Text(t) if t.text.is_empty()))?;
    Some(vec![remove_op(cx, &path::child(at, ix))?])
}

fn wrap_inline_run_in_list_item(
    cx: &NormalizeContext<'_>,
    el: &Element,
    at: &[usize],
) -> Option<Vec<Op>> {
    wrap_inline_run(cx, el, at, ElementKind::ListItem)
}

fn adopt_list_child(cx: &NormalizeContext<'_>, el: &Element, at: &[usize]) -> Option<Vec<Op>> {
    let (ix, kind) = el.children.iter().enumerate().find_map(|(ix, child)| {
        child
            .kind()
            .filter(|kind| **kind != ElementKind::ListItem)
            .map(|kind| (ix, kind))
    })?;
    let child_path = path::child(at, ix);
    match kind.category() {
        Category::ParagraphLike => Some(vec![Op::SetNode {
            path: child_path,
            properties: NodeProperties::Element(kind.clone()),
            new_properties: NodeProperties::Element(ElementKind::ListItem),
        }]),
        // Nested lists are flattened into this one.
        Category::List => unwrap_child_ops(cx, at, ix),
        _ => Some(evict_child_ops(el, at, ix)),
    }
}

fn evict_non_image(_cx: &NormalizeContext<'_>, el: &Element, at: &[usize]) -> Option<Vec<Op>> {
    let ix = el
        .children
        .iter()
        .position(|child| !child.kind().is_some_and(ElementKind::is_image))?;
    Some(evict_child_ops(el, at, ix))
}

fn wrap_inline_run_in_paragraph(
    cx: &NormalizeContext<'_>,
    el: &Element,
    at: &[usize],
) -> Option<Vec<Op>> {
    wrap_inline_run(cx, el, at, ElementKind::Paragraph)
}

/// Wrap the first run of adjacent leaves and inline elements under `at`
/// in a single new `kind` element.
fn wrap_inline_run(
    cx: &NormalizeContext<'_>,
    el: &Element,
    at: &[usize],
    kind: ElementKind,
) -> Option<Vec<Op>> {
    let is_inline = |child: &Node| match child {
        Node::Text(_) => true,
        Node::Element(inner) => cx.capabilities.is_inline(&inner.kind),
    };
    let start = el.children.iter().position(|child| is_inline(child))?;
    let len = el.children[start..]
        .iter()
        .take_while(|child| is_inline(*child))
        .count();
    let wrapper = path::child(at, start);
    let mut ops = vec![Op::InsertNode {
        path: wrapper.clone(),
        node: Node::element(kind, Vec::new()),
    }];
    ops.extend((0..len).map(|k| Op::MoveNode {
        path: path::child(at, start + 1),
        new_path: path::child(&wrapper, k),
    }));
    Some(ops)
}

/// Quotes hold paragraph-like blocks and lists; anything else moves out.
fn evict_from_quote(cx: &NormalizeContext<'_>, el: &Element, at: &[usize]) -> Option<Vec<Op>> {
    let ix = el.children.iter().position(|child| {
        child.kind().is_some_and(|kind| {
            cx.capabilities.is_block(kind)
                && !matches!(kind.category(), Category::ParagraphLike | Category::List)
        })
    })?;
    Some(evict_child_ops(el, at, ix))
}

fn unwrap_nested_link(cx: &NormalizeContext<'_>, el: &Element, at: &[usize]) -> Option<Vec<Op>> {
    let ix = el
        .children
        .iter()
        .position(|child| matches!(child.kind(), Some(ElementKind::Link { .. })))?;
    unwrap_child_ops(cx, at, ix)
}

fn hoist_link_element(
    _cx: &NormalizeContext<'_>,
    el: &Element,
    at: &[usize],
) -> Option<Vec<Op>> {
    let ix = el.children.iter().position(|child| !child.is_text())?;
    Some(evict_child_ops(el, at, ix))
}

fn fill_empty_link(cx: &NormalizeContext<'_>, el: &Element, at: &[usize]) -> Option<Vec<Op>> {
    if !el.children.is_empty() {
        return None;
    }
    let ElementKind::Link { label, .. } = &el.kind else {
        return None;
    };
    if label.is_empty() {
        return Some(vec![remove_op(cx, at)?]);
    }
    Some(vec![Op::InsertNode {
        path: path::child(at, 0),
        node: Node::text(label.clone()),
    }])
}

fn merge_link_leaves(_cx: &NormalizeContext<'_>, el: &Element, at: &[usize]) -> Option<Vec<Op>> {
    let [Node::Text(first), Node::Text(second), ..] = el.children.as_slice() else {
        return None;
    };
    Some(vec![Op::MergeNode {
        path: path::child(at, 1),
        position: first.text.len(),
        properties: NodeProperties::Text(second.marks),
    }])
}

fn drop_blank_link(cx: &NormalizeContext<'_>, el: &Element, at: &[usize]) -> Option<Vec<Op>> {
    let [Node::Text(leaf)] = el.children.as_slice() else {
        return None;
    };
    if !leaf.text.is_empty() {
        return None;
    }
    Some(vec![remove_op(cx, at)?])
}

fn sync_link_label(_cx: &NormalizeContext<'_>, el: &Element, at: &[usize]) -> Option<Vec<Op>> {
    let ElementKind::Link { url, label } = &el.kind else {
        return None;
    };
    let [Node::Text(leaf)] = el.children.as_slice() else {
        return None;
    };
    if leaf.text == *label {
        return None;
    }
    // Auto-links keep following their text while it is still a URL.
    let follows_text =
        url == label && leaf.text.trim() == leaf.text && links::is_valid_url(&leaf.text);
    let new_url = if follows_text {
        leaf.text.clone()
    } else {
        url.clone()
    };
    Some(vec![Op::SetNode {
        path: at.to_vec(),
        properties: NodeProperties::Element(el.kind.clone()),
        new_properties: NodeProperties::Element(ElementKind::Link {
            url: new_url,
            label: leaf.text.clone(),
        }),
    }])
}

fn clear_terminal_children(
    cx: &NormalizeContext<'_>,
    el: &Element,
    at: &[usize],
) -> Option<Vec<Op>> {
    let last = el.children.len().checked_sub(1)?;
    Some(vec![remove_op(cx, &path::child(at, last))?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_offset_is_after_first_break_of_run() {
        assert_eq!(blank_line_split_offset("a\n\n\nb"), Some(2));
        assert_eq!(blank_line_split_offset("a\n \n b"), Some(2));
        assert_eq!(blank_line_split_offset("a\nb\nc"), None);
        assert_eq!(blank_line_split_offset("a\nb\n\n"), Some(4));
    }
}
