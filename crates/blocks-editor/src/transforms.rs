//! Editing commands built from ops. Each public command is one compound
//! operation: it applies its ops, then normalization runs once.

use std::sync::Arc;

use crate::core::Editor;
use crate::error::{EditorError, Result};
use crate::node::{ElementKind, Mark, Marks, Node};
use crate::normalize;
use crate::ops::{NodeProperties, Op};
use crate::path::{self, Path, Point, Range};
use crate::plugin::ChildConstraint;
use crate::query::{self, BlockText, Unit};

impl Editor {
    /// Replace the selection.
    pub fn set_selection(&mut self, selection: Option<Range>) -> Result<()> {
        self.change("set_selection", |editor| editor.select_op(selection))
    }

    pub fn insert_text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.change("insert_text", |editor| {
            let caret = editor.collapse_selection()?;
            editor.apply_op(Op::InsertText {
                path: caret.path,
                offset: caret.offset,
                text: text.to_string(),
            })
        })
    }

    /// Delete the expanded selection, or one `unit` before the caret. At
    /// the start of a block the block is joined with the one before it.
    pub fn delete_backward(&mut self, unit: Unit) -> Result<()> {
        self.change("delete_backward", |editor| {
            let Some(range) = editor.selection().cloned() else {
                return Ok(());
            };
            if !range.is_collapsed() {
                editor.collapse_selection()?;
                return Ok(());
            }
            let caret = range.focus;
            let block = query::text_block_path(editor.doc(), &caret.path);
            match query::before(editor.doc(), &caret, unit) {
                Some(prev) if query::text_block_path(editor.doc(), &prev.path) == block => {
                    editor.delete_range_ops(&Range::new(prev, caret))
                }
                _ => editor.join_with_previous(&block),
            }
        })
    }

    pub fn delete_range(&mut self, range: &Range) -> Result<()> {
        self.change("delete_range", |editor| editor.delete_range_ops(range))
    }

    /// Split the block at the caret; the caret moves to the start of the
    /// new block.
    pub fn insert_break(&mut self) -> Result<()> {
        self.change("insert_break", |editor| {
            let caret = editor.collapse_selection()?;
            let block_path = query::text_block_path(editor.doc(), &caret.path);
            let block = BlockText::of(editor.doc(), &block_path);
            let offset = block.offset_of(&caret).ok_or_else(|| {
                EditorError::invalid_reference(&caret.path, "caret is not in a text block")
            })?;
            let ops = normalize::split_block_ops(editor.doc(), &block_path, &block, offset)
                .ok_or_else(|| {
                    EditorError::invalid_reference(&block_path, "block cannot be split here")
                })?;
            for op in ops {
                editor.apply_op(op)?;
            }
            let new_block = path::next(&block_path);
            // Both halves keep a leaf, so neither is deleted as empty.
            for half in [&block_path, &new_block] {
                if editor.doc().node(half).is_some_and(|node| node.children().is_empty()) {
                    editor.apply_op(Op::InsertNode {
                        path: path::child(half, 0),
                        node: Node::text(""),
                    })?;
                }
            }
            editor.select_start_of(&new_block)
        })
    }

    /// Insert inline nodes at the caret, or block nodes after the caret's
    /// block.
    pub fn insert_nodes(&mut self, nodes: Vec<Node>) -> Result<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        self.change("insert_nodes", |editor| {
            let caret = editor.collapse_selection()?;
            let pipeline = Arc::clone(editor.pipeline());
            let caps = pipeline.capabilities();
            let blocks = nodes
                .iter()
                .all(|node| node.kind().is_some_and(|kind| caps.is_block(kind)));
            if blocks {
                let block = query::text_block_path(editor.doc(), &caret.path);
                let top = block.get(..1).map(<[usize]>::to_vec).unwrap_or_default();
                let mut at = path::next(&top);
                for node in nodes {
                    editor.apply_op(Op::InsertNode {
                        path: at.clone(),
                        node,
                    })?;
                    at = path::next(&at);
                }
                return Ok(());
            }
            let mut at = editor.split_leaf_at(&caret)?;
            let mut last = at.clone();
            for node in nodes {
                editor.apply_op(Op::InsertNode {
                    path: at.clone(),
                    node,
                })?;
                last = at.clone();
                at = path::next(&at);
            }
            if let Some((_, end)) = query::edges(editor.doc(), &last) {
                editor.select_op(Some(Range::collapsed(end)))?;
            }
            Ok(())
        })
    }

    /// Turn `mark` on across the selection, or off when every selected leaf
    /// already has it. A collapsed selection is left alone.
    pub fn toggle_mark(&mut self, mark: Mark) -> Result<()> {
        let Some(range) = self.selection().cloned() else {
            return Ok(());
        };
        if range.is_collapsed() {
            return Ok(());
        }
        self.change("toggle_mark", |editor| {
            let covered = covered_leaves(editor, &range);
            if covered.is_empty() {
                return Ok(());
            }
            let enable = !covered.iter().all(|(_, marks)| mark.get(marks));

            let (start, end) = range.edges();
            let (start, end) = (start.clone(), end.clone());
            editor.split_text_at(&end)?;
            editor.split_text_at(&start)?;

            // The selection followed the splits and now covers whole leaves.
            let Some(range) = editor.selection().cloned() else {
                return Ok(());
            };
            for (leaf, mut marks) in covered_leaves(editor, &range) {
                if mark.get(&marks) == enable {
                    continue;
                }
                let before = marks;
                mark.set(&mut marks, enable);
                editor.apply_op(Op::SetNode {
                    path: leaf,
                    properties: NodeProperties::Text(before),
                    new_properties: NodeProperties::Text(marks),
                })?;
            }
            Ok(())
        })
    }

    /// Link the text in `range`: update the link it sits in, or replace the
    /// range with a new link.
    pub fn set_link(&mut self, range: &Range, url: &str, label: &str) -> Result<()> {
        let label = if label.is_empty() { url } else { label };
        self.change("set_link", |editor| {
            editor.select_op(Some(range.clone()))?;
            let link = query::above(editor.doc(), &range.start().path, |node| {
                matches!(node.kind(), Some(ElementKind::Link { .. }))
            })
            .map(|(p, node)| (p, node.clone()));

            if let Some((link_path, node)) = link {
                let Some(kind) = node.kind().cloned() else {
                    return Ok(());
                };
                let leaf = path::child(&link_path, 0);
                let old = node.string();
                editor.apply_op(Op::SetNode {
                    path: link_path.clone(),
                    properties: NodeProperties::Element(kind),
                    new_properties: NodeProperties::Element(ElementKind::Link {
                        url: url.to_string(),
                        label: label.to_string(),
                    }),
                })?;
                if !old.is_empty() {
                    editor.apply_op(Op::RemoveText {
                        path: leaf.clone(),
                        offset: 0,
                        text: old,
                    })?;
                }
                editor.apply_op(Op::InsertText {
                    path: leaf,
                    offset: 0,
                    text: label.to_string(),
                })?;
                return Ok(());
            }

            let caret = editor.collapse_selection()?;
            let at = editor.split_leaf_at(&caret)?;
            editor.apply_op(Op::InsertNode {
                path: at.clone(),
                node: Node::link(url, label),
            })?;
            if let Some((_, end)) = query::edges(editor.doc(), &at) {
                editor.select_op(Some(Range::collapsed(end)))?;
            }
            Ok(())
        })
    }

    /// Insert an image block after the top-level block holding `range`.
    pub fn insert_image(
        &mut self,
        range: &Range,
        url: String,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<()> {
        self.change("insert_image", |editor| {
            let top = range
                .start()
                .path
                .get(..1)
                .map(<[usize]>::to_vec)
                .unwrap_or_else(|| vec![0]);
            editor.apply_op(Op::InsertNode {
                path: path::next(&top),
                node: Node::element(ElementKind::Image { url, width, height }, Vec::new()),
            })
        })
    }

    /// Delete the selected content if the selection is expanded, and return
    /// the caret as a text point.
    pub(crate) fn collapse_selection(&mut self) -> Result<Point> {
        let Some(range) = self.selection().cloned() else {
            return Err(EditorError::invalid_reference(&[], "no selection"));
        };
        if !range.is_collapsed() {
            self.delete_range_ops(&range)?;
            let start = self
                .selection()
                .map(|range| range.start().clone())
                .unwrap_or_else(|| range.start().clone());
            self.select_op(Some(Range::collapsed(start)))?;
        }
        let Some(caret) = self.selection().map(|range| range.focus.clone()) else {
            return Err(EditorError::invalid_reference(&[], "no selection"));
        };
        if self.doc().text(&caret.path).is_none() {
            return Err(EditorError::invalid_reference(
                &caret.path,
                "caret is not in a text leaf",
            ));
        }
        Ok(caret)
    }

    /// Remove everything between the edges of `range`. When the edges sit
    /// in sibling blocks, the blocks between are removed and the last one
    /// is merged into the first.
    pub(crate) fn delete_range_ops(&mut self, range: &Range) -> Result<()> {
        let (start, end) = range.edges();
        let (start, end) = (start.clone(), end.clone());
        if start == end {
            return Ok(());
        }
        let doc = self.doc();
        let mut removals = Vec::new();
        for (leaf, text) in query::texts(doc) {
            if path::compare(&leaf, &start.path).is_lt()
                || path::compare(&leaf, &end.path).is_gt()
            {
                continue;
            }
            let from = if leaf == start.path { start.offset } else { 0 };
            let to = if leaf == end.path {
                end.offset
            } else {
                text.text.len()
            };
            if from < to {
                let removed = text.text.get(from..to).unwrap_or_default().to_string();
                removals.push(Op::RemoveText {
                    path: leaf,
                    offset: from,
                    text: removed,
                });
            }
        }
        let start_block = query::text_block_path(doc, &start.path);
        let end_block = query::text_block_path(doc, &end.path);

        for op in removals {
            self.apply_op(op)?;
        }
        if start_block == end_block || !path::is_sibling(&start_block, &end_block) {
            return Ok(());
        }
        let (Some(&first), Some(&last)) = (start_block.last(), end_block.last()) else {
            return Ok(());
        };
        let parent = path::parent(&start_block).to_vec();
        for ix in (first + 1..last).rev() {
            let at = path::child(&parent, ix);
            let node = self
                .doc()
                .node(&at)
                .cloned()
                .ok_or_else(|| EditorError::invalid_reference(&at, "no node at path"))?;
            self.apply_op(Op::RemoveNode { path: at, node })?;
        }
        self.merge_into_previous(&path::child(&parent, first + 1))
    }

    fn join_with_previous(&mut self, block: &[usize]) -> Result<()> {
        let Some(prev) = path::previous(block) else {
            return Ok(());
        };
        let Some(prev_node) = self.doc().node(&prev).cloned() else {
            return Ok(());
        };
        let pipeline = Arc::clone(self.pipeline());
        let caps = pipeline.capabilities();
        let block_quote = matches!(&prev_node, Node::Element(el) if caps.is_block_quote(el));
        match prev_node.kind() {
            Some(kind)
                if !block_quote && caps.child_constraint(kind) == ChildConstraint::InlineOnly =>
            {
                self.merge_into_previous(block)
            }
            Some(kind) if caps.is_void(kind) => self.apply_op(Op::RemoveNode {
                path: prev,
                node: prev_node.clone(),
            }),
            _ => {
                // Containers: move this block's content to the last text
                // block inside the previous node.
                let Some((last_leaf, _)) = query::texts_in(self.doc(), &prev).pop() else {
                    return Ok(());
                };
                let target = query::text_block_path(self.doc(), &last_leaf);
                self.move_children_into(block, &target)
            }
        }
    }

    fn merge_into_previous(&mut self, block: &[usize]) -> Result<()> {
        let Some(prev) = path::previous(block) else {
            return Ok(());
        };
        let position = self
            .doc()
            .node(&prev)
            .map(Node::merge_position)
            .ok_or_else(|| EditorError::invalid_reference(&prev, "no node at path"))?;
        let properties = self
            .doc()
            .node(block)
            .map(NodeProperties::of)
            .ok_or_else(|| EditorError::invalid_reference(block, "no node at path"))?;
        self.apply_op(Op::MergeNode {
            path: block.to_vec(),
            position,
            properties,
        })
    }

    fn move_children_into(&mut self, from: &[usize], into: &[usize]) -> Result<()> {
        let count = self.doc().node(from).map_or(0, |node| node.children().len());
        let base = self.doc().node(into).map_or(0, |node| node.children().len());
        for k in 0..count {
            self.apply_op(Op::MoveNode {
                path: path::child(from, 0),
                new_path: path::child(into, base + k),
            })?;
        }
        if let Some(node) = self.doc().node(from).cloned() {
            self.apply_op(Op::RemoveNode {
                path: from.to_vec(),
                node,
            })?;
        }
        Ok(())
    }

    /// Split the leaf under `point` so a node inserted at the returned path
    /// lands exactly at the point.
    fn split_leaf_at(&mut self, point: &Point) -> Result<Path> {
        let leaf = self
            .doc()
            .text(&point.path)
            .ok_or_else(|| EditorError::invalid_reference(&point.path, "expected a text leaf"))?;
        if point.offset == 0 {
            return Ok(point.path.clone());
        }
        if point.offset >= leaf.text.len() {
            return Ok(path::next(&point.path));
        }
        let marks = leaf.marks;
        self.apply_op(Op::SplitNode {
            path: point.path.clone(),
            position: point.offset,
            properties: NodeProperties::Text(marks),
        })?;
        Ok(path::next(&point.path))
    }

    /// Split the leaf under `point` when the point is strictly inside it.
    fn split_text_at(&mut self, point: &Point) -> Result<()> {
        let Some(leaf) = self.doc().text(&point.path) else {
            return Ok(());
        };
        if point.offset == 0 || point.offset >= leaf.text.len() {
            return Ok(());
        }
        let marks = leaf.marks;
        self.apply_op(Op::SplitNode {
            path: point.path.clone(),
            position: point.offset,
            properties: NodeProperties::Text(marks),
        })
    }

    fn select_start_of(&mut self, at: &[usize]) -> Result<()> {
        match query::edges(self.doc(), at) {
            Some((start, _)) => self.select_op(Some(Range::collapsed(start))),
            None => Ok(()),
        }
    }
}

/// Leaves with a non-empty part inside `range`, with their marks.
fn covered_leaves(editor: &Editor, range: &Range) -> Vec<(Path, Marks)> {
    let (start, end) = range.edges();
    query::texts(editor.doc())
        .into_iter()
        .filter(|(leaf, text)| {
            if path::compare(leaf, &start.path).is_lt()
                || path::compare(leaf, &end.path).is_gt()
            {
                return false;
            }
            let from = if *leaf == start.path { start.offset } else { 0 };
            let to = if *leaf == end.path {
                end.offset
            } else {
                text.text.len()
            };
            from < to
        })
        .map(|(leaf, text)| (leaf, text.marks))
        .collect()
}
