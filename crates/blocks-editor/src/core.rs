use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::autocomplete::{self, Trigger, TriggerId};
use crate::config::EditorConfig;
use crate::dialog::{DialogId, DialogRequest, DialogResponse, PendingDialog};
use crate::error::{EditorError, NormalizationViolation, Result};
use crate::message::{self, MessageBlock};
use crate::node::{Document, Element, Node, Text};
use crate::normalize::{self, Rewrite};
use crate::ops::{NodeProperties, Op, Transaction};
use crate::path::{self, Path, Point, Range};
use crate::plugin::{EditorEvent, EventFlow, NodeEntry, NormalizeContext, Pipeline};
use crate::query;
use crate::range_ref::{self, CapturedRefs, RangeRef, RangeRefs};
use crate::search::{self, Search};

/// Everything one compound operation applied, normalization included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub ops: Vec<Op>,
    pub selection_before: Option<Range>,
    pub selection_after: Option<Range>,
    pub source: Option<String>,
}

impl Batch {
    /// Ops that undo this batch, in the order they must be applied.
    pub fn inverse_ops(&self) -> Vec<Op> {
        self.ops.iter().rev().map(Op::inverse).collect()
    }
}

/// Receives every batch the editor applies.
pub trait History {
    fn record(&mut self, batch: &Batch);
}

#[derive(Debug, Clone)]
struct Snapshot {
    doc: Document,
    selection: Option<Range>,
    refs: CapturedRefs,
}

type DirtySet = BTreeSet<(Reverse<usize>, Path)>;

pub struct Editor {
    doc: Document,
    selection: Option<Range>,
    pipeline: Arc<Pipeline>,
    config: EditorConfig,
    dirty: DirtySet,
    pending: Vec<Op>,
    snapshot: Snapshot,
    refs: RangeRefs,
    triggers: Vec<Trigger>,
    next_trigger: TriggerId,
    dialogs: Vec<PendingDialog>,
    next_dialog: DialogId,
    history: Option<Box<dyn History>>,
}

impl Editor {
    pub fn new(doc: Document, selection: Option<Range>, pipeline: Arc<Pipeline>) -> Result<Self> {
        Self::with_config(doc, selection, pipeline, EditorConfig::default())
    }

    /// Build an editor and bring `doc` into canonical shape. Every path of
    /// the incoming document starts out dirty.
    pub fn with_config(
        doc: Document,
        selection: Option<Range>,
        pipeline: Arc<Pipeline>,
        config: EditorConfig,
    ) -> Result<Self> {
        let mut editor = Self {
            doc: Document::default(),
            selection: None,
            pipeline,
            config: config.with_defaults(),
            dirty: DirtySet::new(),
            pending: Vec::new(),
            snapshot: Snapshot {
                doc: Document::default(),
                selection: None,
                refs: CapturedRefs::default(),
            },
            refs: RangeRefs::default(),
            triggers: Vec::new(),
            next_trigger: 0,
            dialogs: Vec::new(),
            next_dialog: 1,
            history: None,
        };

        editor.mark_dirty(Vec::new());
        for p in doc.all_paths() {
            editor.mark_dirty(p);
        }
        editor.doc = doc;
        editor.selection = selection
            .as_ref()
            .and_then(|range| editor.resolve_range(range));
        editor.normalize()?;
        // A selection into a document that only exists after normalization
        // is resolved against the normalized tree.
        editor.selection = editor
            .selection
            .take()
            .or(selection)
            .and_then(|range| editor.resolve_range(&range));
        editor.pending.clear();
        editor.take_snapshot();
        Ok(editor)
    }

    /// An empty paragraph with the caret in it, using the standard plugins.
    pub fn standard() -> Result<Self> {
        let selection = Range::collapsed(Point::new(vec![0, 0], 0));
        Self::new(
            Document::default(),
            Some(selection),
            Arc::new(Pipeline::standard()),
        )
    }

    pub fn from_message_blocks(blocks: &[MessageBlock], pipeline: Arc<Pipeline>) -> Result<Self> {
        let doc = message::to_document(blocks, pipeline.capabilities());
        Self::new(doc, None, pipeline)
    }

    pub fn to_message_blocks(&self) -> Vec<MessageBlock> {
        message::from_document(&self.doc)
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> Option<&Range> {
        self.selection.as_ref()
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn set_history(&mut self, history: Box<dyn History>) {
        self.history = Some(history);
    }

    pub fn search<'a>(&'a self, query: &str, at: Option<&Range>) -> Search<'a> {
        search::search(&self.doc, query, at)
    }

    /// Track `range` across every op applied from now on.
    pub fn range_ref(&mut self, range: Range) -> RangeRef {
        let tracked = self.refs.track(range);
        self.snapshot.refs = self.refs.capture();
        tracked
    }

    pub fn add_trigger(&mut self, callback: impl FnMut(&str, &Range) + 'static) -> TriggerId {
        let id = self.next_trigger;
        self.next_trigger += 1;
        self.triggers.push(Trigger {
            id,
            callback: Box::new(callback),
        });
        id
    }

    pub fn remove_trigger(&mut self, id: TriggerId) -> bool {
        let before = self.triggers.len();
        self.triggers.retain(|trigger| trigger.id != id);
        self.triggers.len() != before
    }

    /// Run the plugin handlers registered for the event's kind, in
    /// pipeline order, then the built-in behavior if none handled it.
    pub fn dispatch(&mut self, event: &EditorEvent) -> Result<EventFlow> {
        for handler in self.pipeline.handlers_for(event.kind()) {
            if handler(self, event)? == EventFlow::Handled {
                return Ok(EventFlow::Handled);
            }
        }
        match event {
            EditorEvent::BeforeInput(text) | EditorEvent::Paste(text) => {
                self.insert_text(text)?;
                Ok(EventFlow::Handled)
            }
            EditorEvent::KeyDown(key) if key.primary || key.alt => Ok(EventFlow::Continue),
            EditorEvent::KeyDown(key) if key.is("Enter") => {
                self.insert_break()?;
                Ok(EventFlow::Handled)
            }
            EditorEvent::KeyDown(key) if key.is("Backspace") => {
                self.delete_backward(query::Unit::Character)?;
                Ok(EventFlow::Handled)
            }
            EditorEvent::KeyDown(_) => Ok(EventFlow::Continue),
        }
    }

    /// Queue a dialog for the host UI, parking the current selection until
    /// the response arrives.
    pub fn open_dialog(&mut self, request: DialogRequest) -> Result<DialogId> {
        let Some(range) = self.selection.clone() else {
            return Err(EditorError::invalid_reference(
                &[],
                "no selection to open a dialog on",
            ));
        };
        let id = self.next_dialog;
        self.next_dialog += 1;
        let at = self.refs.track(range);
        self.snapshot.refs = self.refs.capture();
        tracing::debug!(id, ?request, "opened dialog");
        self.dialogs.push(PendingDialog { id, request, at });
        Ok(id)
    }

    pub fn pending_dialogs(&self) -> impl Iterator<Item = (DialogId, &DialogRequest)> {
        self.dialogs.iter().map(|dialog| (dialog.id, &dialog.request))
    }

    pub fn resolve_dialog(&mut self, id: DialogId, response: DialogResponse) -> Result<()> {
        let Some(ix) = self.dialogs.iter().position(|dialog| dialog.id == id) else {
            return Err(EditorError::UnknownDialog(id));
        };
        let PendingDialog { request, at, .. } = self.dialogs.remove(ix);
        let Some(range) = at.unref() else {
            return Err(EditorError::invalid_reference(
                &[],
                "dialog selection no longer exists",
            ));
        };
        match (request, response) {
            (_, DialogResponse::Cancelled) => {
                tracing::debug!(id, "dialog cancelled");
                Ok(())
            }
            (DialogRequest::Link(_), DialogResponse::Link { url, label }) => {
                self.set_link(&range, &url, &label)
            }
            (DialogRequest::Image(_), DialogResponse::Image { url, width, height }) => {
                self.insert_image(&range, url, width, height)
            }
            (request, response) => {
                tracing::warn!(
                    id,
                    ?request,
                    ?response,
                    "dialog answered with the wrong response kind"
                );
                Ok(())
            }
        }
    }

    /// Apply a transaction as one compound operation.
    pub fn apply(&mut self, tx: Transaction) -> Result<()> {
        let source = tx
            .meta
            .source
            .clone()
            .unwrap_or_else(|| "transaction".to_string());
        self.change(&source, |editor| {
            for op in tx.ops {
                editor.apply_op(op)?;
            }
            if let Some(selection) = tx.selection_after {
                editor.select_op(Some(selection))?;
            }
            Ok(())
        })
    }

    /// Run `edit` as one compound operation: its ops, then normalization to
    /// a fixed point, then one history batch. Any error rolls the editor
    /// back to the state before `edit`.
    pub(crate) fn change(
        &mut self,
        source: &str,
        edit: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let selection_before = self.selection.clone();
        self.pending.clear();
        if let Err(err) = edit(self) {
            tracing::warn!(source, %err, "edit rejected");
            self.restore_snapshot();
            return Err(err);
        }
        self.normalize()?;

        let ops = std::mem::take(&mut self.pending);
        tracing::debug!(source, ops = ops.len(), "applied change");
        self.take_snapshot();
        if ops.is_empty() && selection_before == self.selection {
            return Ok(());
        }
        if let Some(history) = self.history.as_mut() {
            history.record(&Batch {
                ops,
                selection_before,
                selection_after: self.selection.clone(),
                source: Some(source.to_string()),
            });
        }
        self.fire_triggers();
        Ok(())
    }

    pub(crate) fn apply_op(&mut self, op: Op) -> Result<()> {
        if let Op::SetSelection { new_selection, .. } = &op {
            self.selection = new_selection.clone();
            self.pending.push(op);
            return Ok(());
        }
        apply_op_to(&mut self.doc, &op)?;

        let dirty = std::mem::take(&mut self.dirty);
        for (_, p) in dirty {
            if let Some(p) = op.transform_path(&p) {
                self.mark_dirty(p);
            }
        }
        for p in op.dirty_paths() {
            self.mark_dirty(p);
        }
        self.selection = self
            .selection
            .take()
            .and_then(|range| range_ref::transform_range(&self.doc, &op, &range));
        self.refs.transform(&self.doc, &op);
        self.pending.push(op);
        Ok(())
    }

    pub(crate) fn select_op(&mut self, selection: Option<Range>) -> Result<()> {
        if let Some(range) = &selection {
            for point in range.points() {
                if !query::is_valid_point(&self.doc, point) {
                    return Err(EditorError::invalid_reference(
                        &point.path,
                        "selection point is not in the document",
                    ));
                }
            }
        }
        self.apply_op(Op::SetSelection {
            selection: self.selection.clone(),
            new_selection: selection,
        })
    }

    fn mark_dirty(&mut self, p: Path) {
        self.dirty.insert((Reverse(p.len()), p));
    }

    /// Drain the dirty set, deepest path first, applying one rewrite at a
    /// time until nothing fires.
    fn normalize(&mut self) -> Result<()> {
        let budget = self.config.iteration_budget(self.dirty_work());
        let mut iterations = 0;
        while let Some((_, at)) = self.dirty.pop_first() {
            let Some(rewrite) = self.rewrite_for(&at) else {
                continue;
            };
            iterations += 1;
            if iterations > budget {
                return self.fail(NormalizationViolation {
                    iterations,
                    path: at,
                });
            }
            tracing::trace!(
                rule = rewrite.rule,
                path = ?at,
                ops = rewrite.ops.len(),
                "normalize"
            );
            for op in rewrite.ops {
                if let Err(err) = self.apply_op(op) {
                    tracing::error!(
                        rule = rewrite.rule,
                        path = ?at,
                        %err,
                        "normalization rewrite failed"
                    );
                    self.restore_snapshot();
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Work the dirty set stands for: one unit per path plus one per byte of
    /// every dirty leaf.
    fn dirty_work(&self) -> usize {
        self.dirty
            .iter()
            .map(|(_, p)| match self.doc.node(p) {
                Some(Node::Text(text)) => 1 + text.text.len(),
                _ => 1,
            })
            .sum()
    }

    fn rewrite_for(&self, at: &[usize]) -> Option<Rewrite> {
        let cx = NormalizeContext {
            doc: &self.doc,
            selection: self.selection.as_ref(),
            capabilities: self.pipeline.capabilities(),
            config: &self.config,
        };
        if at.is_empty() {
            return normalize::normalize_root(&cx);
        }
        let node = self.doc.node(at)?;
        self.pipeline.normalize_node(&cx, NodeEntry { node, path: at })
    }

    fn fail(&mut self, violation: NormalizationViolation) -> Result<()> {
        tracing::error!(
            iterations = violation.iterations,
            path = ?violation.path,
            "normalization did not converge, restoring last snapshot"
        );
        self.restore_snapshot();
        if self.config.strict_normalization {
            return Err(violation.into());
        }
        Ok(())
    }

    fn take_snapshot(&mut self) {
        self.snapshot = Snapshot {
            doc: self.doc.clone(),
            selection: self.selection.clone(),
            refs: self.refs.capture(),
        };
    }

    fn restore_snapshot(&mut self) {
        self.doc = self.snapshot.doc.clone();
        self.selection = self.snapshot.selection.clone();
        self.refs.restore(&self.snapshot.refs);
        self.dirty.clear();
        self.pending.clear();
    }

    fn resolve_range(&self, range: &Range) -> Option<Range> {
        let resolve = |point: &Point| {
            if query::is_valid_point(&self.doc, point) {
                return Some(point.clone());
            }
            let resolved = query::resolve_point(&self.doc, point);
            tracing::warn!(?point, ?resolved, "re-resolved stale selection point");
            resolved
        };
        Some(Range::new(resolve(&range.anchor)?, resolve(&range.focus)?))
    }

    fn fire_triggers(&mut self) {
        let Some(range) = self.selection.as_ref().filter(|range| range.is_collapsed()) else {
            return;
        };
        let Some((word, word_range)) = autocomplete::word_before(&self.doc, &range.focus) else {
            return;
        };
        for trigger in &mut self.triggers {
            (trigger.callback)(&word, &word_range);
        }
    }
}

fn missing(at: &[usize]) -> EditorError {
    EditorError::invalid_reference(at, "no node at path")
}

fn split_index(at: &[usize]) -> Result<(&[usize], usize)> {
    match at.split_last() {
        Some((&ix, parent)) => Ok((parent, ix)),
        None => Err(EditorError::invalid_reference(
            at,
            "the root cannot be addressed",
        )),
    }
}

fn text_mut<'a>(doc: &'a mut Document, at: &[usize]) -> Result<&'a mut Text> {
    match doc.node_mut(at) {
        Some(Node::Text(t)) => Ok(t),
        Some(Node::Element(_)) => Err(EditorError::invalid_reference(
            at,
            "expected a text leaf",
        )),
        None => Err(missing(at)),
    }
}

fn char_range(text: &str, at: &[usize], from: usize, to: usize) -> Result<std::ops::Range<usize>> {
    if to > text.len() || !text.is_char_boundary(from) || !text.is_char_boundary(to) {
        return Err(EditorError::invalid_reference(
            at,
            format!("offsets {from}..{to} are not char boundaries"),
        ));
    }
    Ok(from..to)
}

/// Apply one op to `doc`, rejecting any op that addresses a missing node.
pub(crate) fn apply_op_to(doc: &mut Document, op: &Op) -> Result<()> {
    match op {
        Op::InsertText { path, offset, text } => {
            let leaf = text_mut(doc, path)?;
            let at = char_range(&leaf.text, path, *offset, *offset)?;
            leaf.text.insert_str(at.start, text);
        }
        Op::RemoveText { path, offset, text } => {
            let leaf = text_mut(doc, path)?;
            let span = char_range(&leaf.text, path, *offset, offset + text.len())?;
            leaf.text.replace_range(span, "");
        }
        Op::InsertNode { path, node } => {
            let (parent, ix) = split_index(path)?;
            let children = doc.children_at_mut(parent).ok_or_else(|| missing(parent))?;
            if ix > children.len() {
                return Err(missing(path));
            }
            children.insert(ix, node.clone());
        }
        Op::RemoveNode { path, .. } => {
            let (parent, ix) = split_index(path)?;
            let children = doc.children_at_mut(parent).ok_or_else(|| missing(parent))?;
            if ix >= children.len() {
                return Err(missing(path));
            }
            children.remove(ix);
        }
        Op::MergeNode { path, .. } => {
            let (parent, ix) = split_index(path)?;
            let children = doc.children_at_mut(parent).ok_or_else(|| missing(parent))?;
            if ix == 0 || ix >= children.len() {
                return Err(EditorError::invalid_reference(path, "nothing to merge into"));
            }
            let compatible = matches!(
                (&children[ix - 1], &children[ix]),
                (Node::Text(_), Node::Text(_)) | (Node::Element(_), Node::Element(_))
            );
            if !compatible {
                return Err(EditorError::invalid_reference(
                    path,
                    "cannot merge a leaf with an element",
                ));
            }
            let node = children.remove(ix);
            match (&mut children[ix - 1], node) {
                (Node::Text(prev), Node::Text(t)) => prev.text.push_str(&t.text),
                (Node::Element(prev), Node::Element(el)) => prev.children.extend(el.children),
                _ => {}
            }
        }
        Op::SplitNode {
            path,
            position,
            properties,
        } => {
            let (parent, ix) = split_index(path)?;
            let children = doc.children_at_mut(parent).ok_or_else(|| missing(parent))?;
            let node = children.get_mut(ix).ok_or_else(|| missing(path))?;
            let right = match node {
                Node::Text(t) => {
                    char_range(&t.text, path, *position, *position)?;
                    let marks = match properties {
                        NodeProperties::Text(marks) => *marks,
                        NodeProperties::Element(_) => t.marks,
                    };
                    Node::Text(Text::with_marks(t.text.split_off(*position), marks))
                }
                Node::Element(el) => {
                    if *position > el.children.len() {
                        return Err(EditorError::invalid_reference(
                            path,
                            "split position past the last child",
                        ));
                    }
                    let kind = match properties {
                        NodeProperties::Element(kind) => kind.clone(),
                        NodeProperties::Text(_) => el.kind.clone(),
                    };
                    Node::Element(Element::new(kind, el.children.split_off(*position)))
                }
            };
            children.insert(ix + 1, right);
        }
        Op::MoveNode { path, new_path } => {
            if path == new_path {
                return Ok(());
            }
            if path::is_ancestor(path, new_path) {
                return Err(EditorError::invalid_reference(
                    new_path,
                    "cannot move a node into itself",
                ));
            }
            let target = op.transform_path(path).ok_or_else(|| missing(path))?;
            let (parent, ix) = split_index(path)?;
            let children = doc.children_at_mut(parent).ok_or_else(|| missing(parent))?;
            if ix >= children.len() {
                return Err(missing(path));
            }
            let node = children.remove(ix);
            let (target_parent, target_ix) = split_index(&target)?;
            let siblings = doc
                .children_at_mut(target_parent)
                .ok_or_else(|| missing(target_parent))?;
            if target_ix > siblings.len() {
                return Err(missing(&target));
            }
            siblings.insert(target_ix, node);
        }
        Op::SetNode {
            path,
            new_properties,
            ..
        } => match (doc.node_mut(path).ok_or_else(|| missing(path))?, new_properties) {
            (Node::Element(el), NodeProperties::Element(kind)) => el.kind = kind.clone(),
            (Node::Text(t), NodeProperties::Text(marks)) => t.marks = *marks,
            _ => {
                return Err(EditorError::invalid_reference(
                    path,
                    "properties do not fit the node",
                ));
            }
        },
        Op::SetSelection { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ElementKind, Marks};

    #[test]
    fn move_node_lands_where_transform_path_says() {
        let mut doc = Document::new(vec![
            Node::paragraph("a"),
            Node::paragraph("b"),
            Node::paragraph("c"),
        ]);
        let op = Op::MoveNode {
            path: vec![0],
            new_path: vec![2],
        };
        apply_op_to(&mut doc, &op).unwrap();
        assert_eq!(doc.string(), "b\nc\na");
    }

    #[test]
    fn split_then_merge_restores_leaf() {
        let mut doc = Document::new(vec![Node::paragraph("hello")]);
        let split = Op::SplitNode {
            path: vec![0, 0],
            position: 2,
            properties: NodeProperties::Text(Marks::BOLD),
        };
        apply_op_to(&mut doc, &split).unwrap();
        assert_eq!(doc.text(&[0, 1]).unwrap().marks, Marks::BOLD);
        apply_op_to(&mut doc, &split.inverse()).unwrap();
        assert_eq!(doc, Document::new(vec![Node::paragraph("hello")]));
    }

    #[test]
    fn ops_on_missing_nodes_are_rejected() {
        let mut doc = Document::default();
        let op = Op::InsertText {
            path: vec![3, 0],
            offset: 0,
            text: "x".into(),
        };
        assert!(matches!(
            apply_op_to(&mut doc, &op),
            Err(EditorError::InvalidReference { .. })
        ));
        let op = Op::SetNode {
            path: vec![0, 0],
            properties: NodeProperties::Text(Marks::default()),
            new_properties: NodeProperties::Element(ElementKind::Quote),
        };
        assert!(apply_op_to(&mut doc, &op).is_err());
    }
}
