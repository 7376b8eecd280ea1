//! The standard plugin set: links, marks, lists and images.

use crate::core::Editor;
use crate::dialog::{DialogRequest, ImageDialogState, LinkDialogState};
use crate::error::Result;
use crate::links;
use crate::node::{ElementKind, Mark, Node};
use crate::normalize::Rewrite;
use crate::ops::{NodeProperties, Op};
use crate::path;
use crate::plugin::{
    ChildConstraint, EditorEvent, ElementHandler, EventFlow, EventHandler, EventKind, KeyPress,
    Next, NodeEntry, NormalizeContext, NormalizeNode, Plugin,
};
use crate::query;

fn is_link(node: &Node) -> bool {
    matches!(node.kind(), Some(ElementKind::Link { .. }))
}

fn key_down(event: &EditorEvent) -> Option<&KeyPress> {
    match event {
        EditorEvent::KeyDown(key) => Some(key),
        _ => None,
    }
}

pub struct LinkPlugin;

impl Plugin for LinkPlugin {
    fn id(&self) -> &'static str {
        "link"
    }

    fn elements(&self) -> Vec<ElementHandler> {
        vec![ElementHandler::new("link", "LinkElement")]
    }

    fn normalizers(&self) -> Vec<Box<dyn NormalizeNode>> {
        vec![Box::new(AutoLink)]
    }

    fn event_handlers(&self) -> Vec<EventHandler> {
        vec![EventHandler::new(EventKind::KeyDown, open_link_dialog)]
    }
}

/// Wraps bare URLs found in text leaves in link elements.
struct AutoLink;

impl NormalizeNode for AutoLink {
    fn id(&self) -> &'static str {
        "link.autolink"
    }

    fn normalize_node(
        &self,
        cx: &NormalizeContext<'_>,
        entry: NodeEntry<'_>,
        next: Next<'_>,
    ) -> Option<Rewrite> {
        if cx.config.autolink {
            if let Some(ops) = autolink_ops(cx, entry) {
                return Some(Rewrite::new(self.id(), ops));
            }
        }
        next.run(cx, entry)
    }
}

fn autolink_ops(cx: &NormalizeContext<'_>, entry: NodeEntry<'_>) -> Option<Vec<Op>> {
    let Node::Text(leaf) = entry.node else {
        return None;
    };
    let parent = path::parent(entry.path);
    if parent.is_empty() {
        return None;
    }
    if query::levels(cx.doc, parent)
        .iter()
        .any(|(_, node)| is_link(node))
    {
        return None;
    }
    let parent_kind = cx.doc.node(parent)?.kind()?;
    if cx.capabilities.child_constraint(parent_kind) != ChildConstraint::InlineOnly {
        return None;
    }

    // A URL the caret is still typing into is left alone until the caret
    // moves past it.
    let span = links::find_urls(&leaf.text).into_iter().find(|span| {
        !cx.selection.is_some_and(|range| {
            range.points().iter().any(|point| {
                point.path == entry.path && point.offset >= span.start && point.offset <= span.end
            })
        })
    })?;

    let ix = *entry.path.last()?;
    let marks = NodeProperties::Text(leaf.marks);
    let mut ops = Vec::new();
    let mut link_ix = ix;
    if span.end < leaf.text.len() {
        ops.push(Op::SplitNode {
            path: entry.path.to_vec(),
            position: span.end,
            properties: marks.clone(),
        });
    }
    if span.start > 0 {
        ops.push(Op::SplitNode {
            path: entry.path.to_vec(),
            position: span.start,
            properties: marks,
        });
        link_ix += 1;
    }
    let url = leaf.text[span].to_string();
    let link_path = path::child(parent, link_ix);
    ops.push(Op::InsertNode {
        path: link_path.clone(),
        node: Node::element(
            ElementKind::Link {
                url: url.clone(),
                label: url,
            },
            Vec::new(),
        ),
    });
    ops.push(Op::MoveNode {
        path: path::child(parent, link_ix + 1),
        new_path: path::child(&link_path, 0),
    });
    Some(ops)
}

fn open_link_dialog(editor: &mut Editor, event: &EditorEvent) -> Result<EventFlow> {
    let Some(key) = key_down(event) else {
        return Ok(EventFlow::Continue);
    };
    if !key.primary || key.shift || key.alt || !key.is("k") {
        return Ok(EventFlow::Continue);
    }
    let Some(range) = editor.selection().cloned() else {
        return Ok(EventFlow::Continue);
    };
    let existing = query::above(editor.doc(), &range.start().path, is_link)
        .and_then(|(_, node)| node.kind().cloned());
    let state = match existing {
        Some(ElementKind::Link { url, label }) => LinkDialogState { url, label },
        _ => {
            let text = query::string(editor.doc(), &range);
            let url = if links::is_valid_url(&text) {
                text.clone()
            } else {
                String::new()
            };
            LinkDialogState { url, label: text }
        }
    };
    editor.open_dialog(DialogRequest::Link(state))?;
    Ok(EventFlow::Handled)
}

pub struct MarksPlugin;

impl Plugin for MarksPlugin {
    fn id(&self) -> &'static str {
        "marks"
    }

    fn event_handlers(&self) -> Vec<EventHandler> {
        vec![EventHandler::new(EventKind::KeyDown, toggle_mark_hotkey)]
    }
}

fn toggle_mark_hotkey(editor: &mut Editor, event: &EditorEvent) -> Result<EventFlow> {
    let Some(key) = key_down(event) else {
        return Ok(EventFlow::Continue);
    };
    if !key.primary || key.alt {
        return Ok(EventFlow::Continue);
    }
    let mark = match (key.shift, key.key.to_ascii_lowercase().as_str()) {
        (false, "b") => Mark::Bold,
        (false, "i") => Mark::Italic,
        (true, "x") => Mark::Strikethrough,
        _ => return Ok(EventFlow::Continue),
    };
    editor.toggle_mark(mark)?;
    Ok(EventFlow::Handled)
}

pub struct ListPlugin;

impl Plugin for ListPlugin {
    fn id(&self) -> &'static str {
        "list"
    }

    fn elements(&self) -> Vec<ElementHandler> {
        vec![
            ElementHandler::new("bulleted-list", "BulletedList"),
            ElementHandler::new("numbered-list", "NumberedList"),
            ElementHandler::new("list-item", "ListItem"),
        ]
    }

    fn event_handlers(&self) -> Vec<EventHandler> {
        vec![EventHandler::new(EventKind::KeyDown, lift_empty_item)]
    }
}

/// Enter in an empty list item turns it into a paragraph after the list,
/// splitting the list around it.
fn lift_empty_item(editor: &mut Editor, event: &EditorEvent) -> Result<EventFlow> {
    let Some(key) = key_down(event) else {
        return Ok(EventFlow::Continue);
    };
    if !key.is("Enter") || key.primary || key.shift || key.alt {
        return Ok(EventFlow::Continue);
    }
    let Some(range) = editor.selection().filter(|range| range.is_collapsed()) else {
        return Ok(EventFlow::Continue);
    };
    let Some((item, node)) = query::above(editor.doc(), &range.focus.path, |node| {
        node.kind() == Some(&ElementKind::ListItem)
    }) else {
        return Ok(EventFlow::Continue);
    };
    if !node.string().is_empty() {
        return Ok(EventFlow::Continue);
    }
    let list = path::parent(&item).to_vec();
    let Some(list_kind) = editor.doc().node(&list).and_then(Node::kind).cloned() else {
        return Ok(EventFlow::Continue);
    };
    let Some(&ix) = item.last() else {
        return Ok(EventFlow::Continue);
    };

    editor.change("lift_list_item", |editor| {
        editor.apply_op(Op::SplitNode {
            path: list.clone(),
            position: ix,
            properties: NodeProperties::Element(list_kind),
        })?;
        let lifted = path::child(&path::next(&list), 0);
        editor.apply_op(Op::SetNode {
            path: lifted.clone(),
            properties: NodeProperties::Element(ElementKind::ListItem),
            new_properties: NodeProperties::Element(ElementKind::Paragraph),
        })?;
        editor.apply_op(Op::MoveNode {
            path: lifted,
            new_path: path::next(&list),
        })
    })?;
    Ok(EventFlow::Handled)
}

pub struct ImagePlugin;

impl Plugin for ImagePlugin {
    fn id(&self) -> &'static str {
        "image"
    }

    fn elements(&self) -> Vec<ElementHandler> {
        vec![
            ElementHandler::new("image", "ImageElement"),
            ElementHandler::new("image-attachment", "ImageAttachment"),
            ElementHandler::new("image-grid", "ImageGrid"),
            ElementHandler::new("attachments", "Attachments"),
        ]
    }

    fn event_handlers(&self) -> Vec<EventHandler> {
        vec![
            EventHandler::new(EventKind::Paste, paste_image_url),
            EventHandler::new(EventKind::KeyDown, open_image_dialog),
        ]
    }
}

fn paste_image_url(editor: &mut Editor, event: &EditorEvent) -> Result<EventFlow> {
    let EditorEvent::Paste(text) = event else {
        return Ok(EventFlow::Continue);
    };
    if !links::is_image_url(text) {
        return Ok(EventFlow::Continue);
    }
    let Some(range) = editor.selection().cloned() else {
        return Ok(EventFlow::Continue);
    };
    editor.insert_image(&range, text.trim().to_string(), None, None)?;
    Ok(EventFlow::Handled)
}

fn open_image_dialog(editor: &mut Editor, event: &EditorEvent) -> Result<EventFlow> {
    let Some(key) = key_down(event) else {
        return Ok(EventFlow::Continue);
    };
    if !key.primary || !key.shift || key.alt || !key.is("i") {
        return Ok(EventFlow::Continue);
    }
    if editor.selection().is_none() {
        return Ok(EventFlow::Continue);
    }
    editor.open_dialog(DialogRequest::Image(ImageDialogState::default()))?;
    Ok(EventFlow::Handled)
}
