use crate::node::Document;
use crate::path::{Point, Range};
use crate::query::{self, BlockText};

pub type TriggerId = usize;

/// Called with the word before the caret and its range after every change
/// that leaves the selection collapsed.
pub type TriggerFn = Box<dyn FnMut(&str, &Range)>;

pub(crate) struct Trigger {
    pub id: TriggerId,
    pub callback: TriggerFn,
}

/// The run of non-whitespace text ending at `caret` within its block.
/// Returns an empty word, collapsed at the caret, when whitespace or the
/// block start precedes it.
pub fn word_before(doc: &Document, caret: &Point) -> Option<(String, Range)> {
    doc.text(&caret.path)?;
    let block_path = query::text_block_path(doc, &caret.path);
    let block = BlockText::of(doc, &block_path);
    let end = block.offset_of(caret)?;
    let head = block.text.get(..end)?;
    let start = head
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map_or(0, |(ix, c)| ix + c.len_utf8());
    let anchor = if start == end {
        caret.clone()
    } else {
        block.point_at(start, true)?
    };
    Some((head[start..].to_string(), Range::new(anchor, caret.clone())))
}
