use crate::node::{ElementKind, Marks, Node};
use crate::path::{self, Path, Point, Range};

/// Properties that `split`, `merge` and `set` carry for the node they
/// touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeProperties {
    Element(ElementKind),
    Text(Marks),
}

impl NodeProperties {
    pub fn of(node: &Node) -> Self {
        match node {
            Node::Element(el) => NodeProperties::Element(el.kind.clone()),
            Node::Text(t) => NodeProperties::Text(t.marks),
        }
    }
}

/// The closed set of tree mutations. Every op carries enough data to be
/// inverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    InsertText {
        path: Path,
        offset: usize,
        text: String,
    },
    RemoveText {
        path: Path,
        offset: usize,
        text: String,
    },
    InsertNode {
        path: Path,
        node: Node,
    },
    RemoveNode {
        path: Path,
        node: Node,
    },
    /// Merge the node at `path` into its previous sibling. `position` is
    /// the previous sibling's length before the merge.
    MergeNode {
        path: Path,
        position: usize,
        properties: NodeProperties,
    },
    /// Split the node at `path` at `position`; the new right half gets
    /// `properties`.
    SplitNode {
        path: Path,
        position: usize,
        properties: NodeProperties,
    },
    MoveNode {
        path: Path,
        new_path: Path,
    },
    SetNode {
        path: Path,
        properties: NodeProperties,
        new_properties: NodeProperties,
    },
    SetSelection {
        selection: Option<Range>,
        new_selection: Option<Range>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Forward,
    Backward,
}

impl Op {
    pub fn path(&self) -> Option<&[usize]> {
        match self {
            Op::InsertText { path, .. }
            | Op::RemoveText { path, .. }
            | Op::InsertNode { path, .. }
            | Op::RemoveNode { path, .. }
            | Op::MergeNode { path, .. }
            | Op::SplitNode { path, .. }
            | Op::MoveNode { path, .. }
            | Op::SetNode { path, .. } => Some(path),
            Op::SetSelection { .. } => None,
        }
    }

    pub fn inverse(&self) -> Op {
        match self.clone() {
            Op::InsertText { path, offset, text } => Op::RemoveText { path, offset, text },
            Op::RemoveText { path, offset, text } => Op::InsertText { path, offset, text },
            Op::InsertNode { path, node } => Op::RemoveNode { path, node },
            Op::RemoveNode { path, node } => Op::InsertNode { path, node },
            Op::MergeNode {
                path,
                position,
                properties,
            } => Op::SplitNode {
                path: path::previous(&path).unwrap_or_default(),
                position,
                properties,
            },
            Op::SplitNode {
                path,
                position,
                properties,
            } => Op::MergeNode {
                path: path::next(&path),
                position,
                properties,
            },
            Op::MoveNode { path, new_path } => {
                if path == new_path {
                    return Op::MoveNode { path, new_path };
                }
                if path::is_sibling(&path, &new_path) {
                    return Op::MoveNode {
                        path: new_path,
                        new_path: path,
                    };
                }
                // Across parents the move shifts both ends; the node after
                // the original slot tells where that slot went.
                let op = Op::MoveNode {
                    path: path.clone(),
                    new_path: new_path.clone(),
                };
                let inverse_path = op.transform_path(&path).unwrap_or(new_path);
                let inverse_new_path = op.transform_path(&path::next(&path)).unwrap_or(path);
                Op::MoveNode {
                    path: inverse_path,
                    new_path: inverse_new_path,
                }
            }
            Op::SetNode {
                path,
                properties,
                new_properties,
            } => Op::SetNode {
                path,
                properties: new_properties,
                new_properties: properties,
            },
            Op::SetSelection {
                selection,
                new_selection,
            } => Op::SetSelection {
                selection: new_selection,
                new_selection: selection,
            },
        }
    }

    /// Where `p` ends up after this op is applied, or `None` if the node
    /// at `p` no longer exists.
    pub fn transform_path(&self, p: &[usize]) -> Option<Path> {
        let mut p = p.to_vec();
        match self {
            Op::InsertNode { path: op, .. } => {
                if op.as_slice() == p || path::ends_before(op, &p) || path::is_ancestor(op, &p) {
                    p[op.len() - 1] += 1;
                }
            }
            Op::RemoveNode { path: op, .. } => {
                if op.as_slice() == p || path::is_ancestor(op, &p) {
                    return None;
                }
                if path::ends_before(op, &p) {
                    p[op.len() - 1] -= 1;
                }
            }
            Op::MergeNode {
                path: op, position, ..
            } => {
                if op.as_slice() == p || path::ends_before(op, &p) {
                    p[op.len() - 1] -= 1;
                } else if path::is_ancestor(op, &p) {
                    p[op.len() - 1] -= 1;
                    p[op.len()] += position;
                }
            }
            Op::SplitNode {
                path: op, position, ..
            } => {
                if op.as_slice() == p {
                    // Forward affinity: the path follows the right half.
                    p[op.len() - 1] += 1;
                } else if path::ends_before(op, &p) {
                    p[op.len() - 1] += 1;
                } else if path::is_ancestor(op, &p) && p[op.len()] >= *position {
                    p[op.len() - 1] += 1;
                    p[op.len()] -= position;
                }
            }
            Op::MoveNode { path: op, new_path } => {
                if op == new_path {
                    return Some(p);
                }
                if path::is_ancestor(op, &p) || op.as_slice() == p {
                    let mut copy = new_path.clone();
                    if path::ends_before(op, new_path) && op.len() < new_path.len() {
                        copy[op.len() - 1] -= 1;
                    }
                    copy.extend_from_slice(&p[op.len()..]);
                    return Some(copy);
                } else if path::is_sibling(op, new_path)
                    && (path::is_ancestor(new_path, &p) || new_path.as_slice() == p)
                {
                    if path::ends_before(op, &p) {
                        p[op.len() - 1] -= 1;
                    } else {
                        p[op.len() - 1] += 1;
                    }
                } else if path::ends_before(new_path, &p)
                    || new_path.as_slice() == p
                    || path::is_ancestor(new_path, &p)
                {
                    if path::ends_before(op, &p) {
                        p[op.len() - 1] -= 1;
                    }
                    p[new_path.len() - 1] += 1;
                } else if path::ends_before(op, &p) {
                    if new_path.as_slice() == p {
                        p[new_path.len() - 1] += 1;
                    }
                    p[op.len() - 1] -= 1;
                }
            }
            Op::InsertText { .. }
            | Op::RemoveText { .. }
            | Op::SetNode { .. }
            | Op::SetSelection { .. } => {}
        }
        Some(p)
    }

    /// Where `point` ends up after this op, or `None` if its leaf was
    /// removed (or, for backward-less splits, became ambiguous).
    pub fn transform_point(&self, point: &Point, affinity: Affinity) -> Option<Point> {
        let mut out = point.clone();
        match self {
            Op::InsertText { path, offset, text } => {
                if *path == point.path
                    && (*offset < point.offset
                        || (*offset == point.offset && affinity == Affinity::Forward))
                {
                    out.offset += text.len();
                }
            }
            Op::RemoveText { path, offset, text } => {
                if *path == point.path && *offset <= point.offset {
                    out.offset -= (point.offset - offset).min(text.len());
                }
            }
            Op::MergeNode { path, position, .. } => {
                if *path == point.path {
                    out.offset += position;
                }
                out.path = self.transform_path(&point.path)?;
            }
            Op::SplitNode { path, position, .. } => {
                if *path == point.path {
                    if *position < point.offset
                        || (*position == point.offset && affinity == Affinity::Forward)
                    {
                        out.offset -= position;
                        out.path = path::next(&point.path);
                    }
                } else {
                    out.path = self.transform_path(&point.path)?;
                }
            }
            _ => {
                out.path = self.transform_path(&point.path)?;
            }
        }
        Some(out)
    }

    /// Paths whose nodes may violate an invariant once this op is applied.
    /// Paths are expressed against the document after the op.
    pub fn dirty_paths(&self) -> Vec<Path> {
        match self {
            Op::InsertText { path, .. }
            | Op::RemoveText { path, .. }
            | Op::SetNode { path, .. } => with_ancestors(path),
            Op::InsertNode { path, node } => {
                let mut out = with_ancestors(path);
                for rest in node.descendant_paths() {
                    let mut full = path.clone();
                    full.extend(rest);
                    out.push(full);
                }
                out
            }
            Op::RemoveNode { path, .. } => path::ancestors(path),
            Op::MergeNode { path, .. } => match path::previous(path) {
                Some(prev) => with_ancestors(&prev),
                None => path::ancestors(path),
            },
            Op::SplitNode { path, .. } => {
                let mut out = with_ancestors(path);
                out.push(path::next(path));
                out
            }
            Op::MoveNode { path, new_path } => {
                if path == new_path {
                    return Vec::new();
                }
                let mut out = Vec::new();
                for ancestor in path::ancestors(path) {
                    if let Some(p) = self.transform_path(&ancestor) {
                        out.push(p);
                    }
                }
                let target = self
                    .transform_path(path)
                    .unwrap_or_else(|| new_path.clone());
                out.extend(with_ancestors(&target));
                out
            }
            Op::SetSelection { .. } => Vec::new(),
        }
    }
}

fn with_ancestors(path: &[usize]) -> Vec<Path> {
    let mut out = path::ancestors(path);
    out.push(path.to_vec());
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionMeta {
    pub source: Option<String>,
}

/// A batch of ops applied as one compound operation: every op, then one
/// normalization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    pub ops: Vec<Op>,
    pub selection_after: Option<Range>,
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            selection_after: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn selection_after(mut self, selection_after: Range) -> Self {
        self.selection_after = Some(selection_after);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remove(path: Path) -> Op {
        Op::RemoveNode {
            path,
            node: Node::text(""),
        }
    }

    #[test]
    fn remove_node_shifts_later_siblings_and_drops_descendants() {
        let op = remove(vec![1]);
        assert_eq!(op.transform_path(&[2, 0]), Some(vec![1, 0]));
        assert_eq!(op.transform_path(&[1, 3]), None);
        assert_eq!(op.transform_path(&[0, 9]), Some(vec![0, 9]));
    }

    #[test]
    fn split_moves_points_past_position_into_new_node() {
        let op = Op::SplitNode {
            path: vec![0, 0],
            position: 3,
            properties: NodeProperties::Text(Marks::default()),
        };
        let point = Point::new(vec![0, 0], 5);
        let moved = op.transform_point(&point, Affinity::Forward).unwrap();
        assert_eq!(moved, Point::new(vec![0, 1], 2));

        let before = Point::new(vec![0, 0], 1);
        assert_eq!(op.transform_point(&before, Affinity::Forward).unwrap(), before);
    }

    #[test]
    fn merge_adds_previous_length_to_offset() {
        let op = Op::MergeNode {
            path: vec![0, 1],
            position: 4,
            properties: NodeProperties::Text(Marks::default()),
        };
        let point = Point::new(vec![0, 1], 2);
        assert_eq!(
            op.transform_point(&point, Affinity::Forward).unwrap(),
            Point::new(vec![0, 0], 6)
        );
    }

    #[test]
    fn move_node_carries_descendants() {
        let op = Op::MoveNode {
            path: vec![0, 2],
            new_path: vec![1],
        };
        assert_eq!(op.transform_path(&[0, 2, 0]), Some(vec![1, 0]));
        assert_eq!(op.transform_path(&[1, 0]), Some(vec![2, 0]));
        assert_eq!(op.transform_path(&[0, 3]), Some(vec![0, 2]));
    }

    #[test]
    fn text_ops_invert() {
        let op = Op::InsertText {
            path: vec![0, 0],
            offset: 1,
            text: "xy".into(),
        };
        assert_eq!(op.inverse().inverse(), op);
        assert!(matches!(op.inverse(), Op::RemoveText { offset: 1, .. }));
    }
}
