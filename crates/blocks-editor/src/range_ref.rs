use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::node::Document;
use crate::ops::{Affinity, Op};
use crate::path::{self, Point, Range};
use crate::query;

/// A range that follows every op applied to the editor that issued it.
///
/// The editor only keeps a weak handle: dropping the `RangeRef` (or calling
/// [`RangeRef::unref`]) releases it.
#[derive(Debug)]
pub struct RangeRef {
    cell: Rc<RefCell<Option<Range>>>,
}

impl RangeRef {
    /// The current range, or `None` once no valid position remains.
    pub fn current(&self) -> Option<Range> {
        self.cell.borrow().clone()
    }

    pub fn unref(self) -> Option<Range> {
        self.cell.borrow_mut().take()
    }
}

type Slot = Weak<RefCell<Option<Range>>>;

#[derive(Debug, Default)]
pub(crate) struct RangeRefs {
    live: Vec<Slot>,
}

/// The value of every live reference at one moment.
#[derive(Debug, Clone, Default)]
pub(crate) struct CapturedRefs(Vec<(Slot, Option<Range>)>);

impl RangeRefs {
    pub fn track(&mut self, range: Range) -> RangeRef {
        let cell = Rc::new(RefCell::new(Some(range)));
        self.live.push(Rc::downgrade(&cell));
        RangeRef { cell }
    }

    pub fn transform(&mut self, doc: &Document, op: &Op) {
        self.live.retain(|weak| weak.strong_count() > 0);
        for weak in &self.live {
            let Some(cell) = weak.upgrade() else {
                continue;
            };
            let mut slot = cell.borrow_mut();
            if let Some(range) = slot.take() {
                *slot = transform_range(doc, op, &range);
            }
        }
    }

    pub fn capture(&self) -> CapturedRefs {
        CapturedRefs(
            self.live
                .iter()
                .filter_map(|weak| {
                    let cell = weak.upgrade()?;
                    let value = cell.borrow().clone();
                    Some((weak.clone(), value))
                })
                .collect(),
        )
    }

    /// Put every reference that existed at capture time back to its
    /// captured value.
    pub fn restore(&mut self, captured: &CapturedRefs) {
        for (weak, value) in &captured.0 {
            if let Some(cell) = weak.upgrade() {
                *cell.borrow_mut() = value.clone();
            }
        }
    }

    #[cfg(test)]
    fn live_count(&self) -> usize {
        self.live.iter().filter(|weak| weak.strong_count() > 0).count()
    }
}

/// Carry `range` across `op`, which has already been applied to `doc`.
/// Collapsed and forward ranges keep their inward affinity: the start leans
/// forward, the end leans backward.
pub(crate) fn transform_range(doc: &Document, op: &Op, range: &Range) -> Option<Range> {
    let (anchor_affinity, focus_affinity) = if range.is_collapsed() {
        (Affinity::Forward, Affinity::Forward)
    } else if range.is_backward() {
        (Affinity::Backward, Affinity::Forward)
    } else {
        (Affinity::Forward, Affinity::Backward)
    };
    let anchor = transform_point(doc, op, &range.anchor, anchor_affinity)?;
    let focus = transform_point(doc, op, &range.focus, focus_affinity)?;
    Some(Range::new(anchor, focus))
}

fn transform_point(doc: &Document, op: &Op, point: &Point, affinity: Affinity) -> Option<Point> {
    if let Some(moved) = op.transform_point(point, affinity) {
        return Some(moved);
    }
    // The leaf went away with a removed node: settle at the end of the
    // closest leaf before the gap, else at the start of the one after it.
    let removed = op.path().unwrap_or(&point.path);
    tracing::warn!(?point, ?removed, "re-resolving point after its node was removed");
    let leaves = query::texts(doc);
    if let Some((p, t)) = leaves
        .iter()
        .rev()
        .find(|(p, _)| path::compare(p, removed).is_lt())
    {
        return Some(Point::new(p.clone(), t.text.len()));
    }
    if let Some((p, _)) = leaves.first() {
        return Some(Point::new(p.clone(), 0));
    }
    query::resolve_point(doc, point)
}
