//! Snapshot-bound cursors and focus arithmetic.
//!
//! A [`Pin`] holds the node value it was resolved against, so it is only
//! meaningful for that snapshot. Two granularities are in play:
//!
//! - block: the pin sits on a focus block (a focusable node whose parent is
//!   not focusable, e.g. a paragraph), offset counted across its leaves
//! - leaf: the pin sits on a text leaf or an atom
//!
//! Caret movement walks focus blocks in document order and charges one
//! extra unit for every block boundary it crosses, which is what a single
//! arrow key press does when the caret skips from the end of one paragraph
//! to the start of the next.

use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::{CarbonError, Result};
use crate::id::NodeId;
use crate::node::Node;
use crate::node_map::NodeMap;
use crate::point::Point;

#[derive(Clone, Debug)]
pub struct Pin {
    node: Arc<Node>,
    offset: usize,
}

impl Pin {
    pub fn new(node: Arc<Node>, offset: usize) -> Result<Self> {
        if offset > node.focus_size() {
            return Err(CarbonError::InvalidOffset {
                id: node.id().clone(),
                offset,
                size: node.focus_size(),
            });
        }
        Ok(Self { node, offset })
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn id(&self) -> &NodeId {
        self.node.id()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_at_start(&self) -> bool {
        self.offset == 0
    }

    pub fn is_at_end(&self) -> bool {
        self.offset == self.node.focus_size()
    }

    /// Durable form of this pin.
    pub fn point(&self) -> Point {
        Point::within(self.node.id().clone(), self.offset)
    }

    /// Lift a leaf pin to its focus block. Block pins are returned as-is.
    pub fn up(&self, map: &NodeMap) -> Result<Pin> {
        if !self.node.is_leaf() {
            return Ok(self.clone());
        }
        let mut current = self.node.clone();
        let mut offset = self.offset;
        while let Some(parent) = map.parent(current.id()) {
            if !parent.is_focusable() {
                break;
            }
            offset += offset_of_child(map, &parent, current.id())?;
            current = parent;
        }
        Pin::new(current, offset)
    }

    /// Lower a block pin to the leaf holding its offset. At a boundary the
    /// earlier leaf wins, except that a caret right after an atom moves onto
    /// the following leaf. Empty blocks have no leaf and stay as they are.
    pub fn down(&self, map: &NodeMap) -> Result<Pin> {
        descend_to_leaf(map, &self.node, self.offset)
    }

    /// Move the caret by `distance` focus units (negative moves backward).
    ///
    /// Returns `None` when the walk runs off either end of the document.
    /// The result has the same granularity as `self`.
    pub fn move_by(&self, map: &NodeMap, distance: isize) -> Result<Option<Pin>> {
        let start = self.up(map)?;
        let mut node = start.node;
        let mut offset = start.offset;
        let mut remaining = distance.unsigned_abs();

        let landed = if distance >= 0 {
            loop {
                let room = node.focus_size() - offset;
                if remaining <= room {
                    break Pin::new(node, offset + remaining)?;
                }
                remaining -= room + 1;
                let Some(next) = next_focus_block(map, node.id())? else {
                    return Ok(None);
                };
                node = next;
                offset = 0;
            }
        } else {
            loop {
                if remaining <= offset {
                    break Pin::new(node, offset - remaining)?;
                }
                remaining -= offset + 1;
                let Some(prev) = prev_focus_block(map, node.id())? else {
                    return Ok(None);
                };
                offset = prev.focus_size();
                node = prev;
            }
        };

        tracing::trace!(
            target: "carbon::selection",
            from = %self.point(),
            to = %landed.point(),
            distance,
            "moved pin"
        );

        if self.node.is_leaf() {
            landed.down(map).map(Some)
        } else {
            Ok(Some(landed))
        }
    }

    pub fn to_json(&self) -> Value {
        json!({ "node": self.node.id(), "offset": self.offset })
    }
}

impl PartialEq for Pin {
    fn eq(&self, other: &Self) -> bool {
        self.node.id() == other.node.id() && self.offset == other.offset
    }
}

impl Eq for Pin {}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node.id(), self.offset)
    }
}

// === Focus arithmetic ===

/// A focusable node whose parent is not focusable.
pub fn is_focus_block(map: &NodeMap, node: &Node) -> bool {
    node.is_focusable() && !map.parent(node.id()).is_some_and(|p| p.is_focusable())
}

/// Focus units before `child` inside `parent`.
pub(crate) fn offset_of_child(map: &NodeMap, parent: &Node, child: &NodeId) -> Result<usize> {
    let mut offset = 0;
    for id in parent.child_ids() {
        if id == child {
            return Ok(offset);
        }
        offset += map.node(id)?.focus_size();
    }
    Err(CarbonError::not_found(child))
}

/// Resolve `Within(node, offset)` in selection terms.
pub(crate) fn resolve_within(map: &NodeMap, node: &Arc<Node>, offset: usize) -> Result<Pin> {
    if node.is_focusable() {
        if offset > node.focus_size() {
            return Err(CarbonError::unresolvable(node.id(), "offset beyond node"));
        }
        return Pin::new(node.clone(), offset);
    }

    let blocks = focus_blocks_within(map, node)?;
    if blocks.is_empty() {
        return Err(CarbonError::unresolvable(node.id(), "no focusable content"));
    }
    let mut acc = 0;
    for block in blocks {
        let size = block.focus_size();
        if offset <= acc + size {
            return Pin::new(block, offset - acc);
        }
        acc += size;
    }
    Err(CarbonError::unresolvable(node.id(), "offset beyond node"))
}

fn descend_to_leaf(map: &NodeMap, node: &Arc<Node>, offset: usize) -> Result<Pin> {
    if node.is_leaf() {
        return Pin::new(node.clone(), offset);
    }
    let children = map.children(node.id())?;
    if children.is_empty() {
        return Pin::new(node.clone(), offset);
    }

    let count = children.len();
    let mut acc = 0;
    for (i, child) in children.iter().enumerate() {
        let end = acc + child.focus_size();
        let last = i + 1 == count;
        if offset < end || (offset == end && (last || !child.is_atom())) {
            return descend_to_leaf(map, child, offset - acc);
        }
        acc = end;
    }
    Err(CarbonError::InvalidOffset {
        id: node.id().clone(),
        offset,
        size: node.focus_size(),
    })
}

/// Focus blocks inside `node` in document order, not descending into them.
fn focus_blocks_within(map: &NodeMap, node: &Arc<Node>) -> Result<Vec<Arc<Node>>> {
    let mut out = Vec::new();
    for child in map.children(node.id())? {
        if child.is_focusable() {
            out.push(child);
        } else {
            out.extend(focus_blocks_within(map, &child)?);
        }
    }
    Ok(out)
}

fn first_focus_block(map: &NodeMap, node: &Arc<Node>) -> Result<Option<Arc<Node>>> {
    if node.is_focusable() {
        return Ok(Some(node.clone()));
    }
    for child in map.children(node.id())? {
        if let Some(found) = first_focus_block(map, &child)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn last_focus_block(map: &NodeMap, node: &Arc<Node>) -> Result<Option<Arc<Node>>> {
    if node.is_focusable() {
        return Ok(Some(node.clone()));
    }
    for child in map.children(node.id())?.iter().rev() {
        if let Some(found) = last_focus_block(map, child)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Next focus block after the subtree of `id` in document order.
pub fn next_focus_block(map: &NodeMap, id: &NodeId) -> Result<Option<Arc<Node>>> {
    let mut current = id.clone();
    while let Some(parent) = map.parent(&current) {
        let siblings = map.children(parent.id())?;
        let index = siblings
            .iter()
            .position(|s| s.id() == &current)
            .ok_or_else(|| CarbonError::not_found(&current))?;
        for sibling in &siblings[index + 1..] {
            if let Some(found) = first_focus_block(map, sibling)? {
                return Ok(Some(found));
            }
        }
        current = parent.id().clone();
    }
    Ok(None)
}

/// Previous focus block before `id` in document order.
pub fn prev_focus_block(map: &NodeMap, id: &NodeId) -> Result<Option<Arc<Node>>> {
    let mut current = id.clone();
    while let Some(parent) = map.parent(&current) {
        let siblings = map.children(parent.id())?;
        let index = siblings
            .iter()
            .position(|s| s.id() == &current)
            .ok_or_else(|| CarbonError::not_found(&current))?;
        for sibling in siblings[..index].iter().rev() {
            if let Some(found) = last_focus_block(map, sibling)? {
                return Ok(Some(found));
            }
        }
        current = parent.id().clone();
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{doc_map, sample_doc};

    // doc
    //   p1 [t1 "ab", m1 (inline atom), t3 "c"]   size 4
    //   p2 [t2 "cd"]                            size 2
    //   p3 []                                   size 0
    //   img (block atom)                        size 1

    fn pin(map: &NodeMap, id: &str, offset: usize) -> Pin {
        Point::within(id, offset).pin(map).unwrap()
    }

    fn at(p: &Pin) -> (String, usize) {
        (p.id().to_string(), p.offset())
    }

    fn moved(map: &NodeMap, id: &str, offset: usize, distance: isize) -> Option<(String, usize)> {
        pin(map, id, offset)
            .move_by(map, distance)
            .unwrap()
            .map(|p| at(&p))
    }

    fn loc(id: &str, offset: usize) -> Option<(String, usize)> {
        Some((id.to_string(), offset))
    }

    #[test]
    fn test_up_from_leaves() {
        let map = doc_map(sample_doc());
        assert_eq!(at(&pin(&map, "t1", 1).up(&map).unwrap()), ("p1".into(), 1));
        assert_eq!(at(&pin(&map, "m1", 1).up(&map).unwrap()), ("p1".into(), 3));
        assert_eq!(at(&pin(&map, "t3", 1).up(&map).unwrap()), ("p1".into(), 4));
        // block atom has no focusable parent
        assert_eq!(at(&pin(&map, "img", 1).up(&map).unwrap()), ("img".into(), 1));
        // block pins stay
        assert_eq!(at(&pin(&map, "p2", 2).up(&map).unwrap()), ("p2".into(), 2));
    }

    #[test]
    fn test_down_boundaries() {
        let map = doc_map(sample_doc());
        let down = |off| at(&pin(&map, "p1", off).down(&map).unwrap());
        assert_eq!(down(0), ("t1".into(), 0));
        assert_eq!(down(1), ("t1".into(), 1));
        // end of t1 == start of atom: earlier leaf wins
        assert_eq!(down(2), ("t1".into(), 2));
        // right after the atom: moves onto the following text
        assert_eq!(down(3), ("t3".into(), 0));
        assert_eq!(down(4), ("t3".into(), 1));
    }

    #[test]
    fn test_down_empty_block_stays() {
        let map = doc_map(sample_doc());
        assert_eq!(at(&pin(&map, "p3", 0).down(&map).unwrap()), ("p3".into(), 0));
    }

    #[test]
    fn test_up_down_round_trip() {
        let map = doc_map(sample_doc());
        for offset in 0..=4 {
            let block = pin(&map, "p1", offset);
            assert_eq!(block.down(&map).unwrap().up(&map).unwrap(), block);
        }
    }

    #[test]
    fn test_point_round_trip() {
        let map = doc_map(sample_doc());
        for (id, size) in [("t1", 2), ("m1", 1), ("p1", 4), ("p3", 0), ("img", 1)] {
            for offset in 0..=size {
                let p = pin(&map, id, offset);
                assert_eq!(p.point().pin(&map).unwrap().point(), p.point());
            }
        }
    }

    #[test]
    fn test_move_within_block() {
        let map = doc_map(sample_doc());
        assert_eq!(moved(&map, "t1", 0, 1), loc("t1", 1));
        assert_eq!(moved(&map, "t1", 1, 2), loc("t3", 0));
        assert_eq!(moved(&map, "t3", 1, -2), loc("t1", 2));
        assert_eq!(moved(&map, "p1", 0, 4), loc("p1", 4));
        assert_eq!(moved(&map, "t1", 0, 0), loc("t1", 0));
    }

    #[test]
    fn test_move_crosses_block_boundary() {
        let map = doc_map(sample_doc());
        // end of p1 -> start of p2 costs one unit
        assert_eq!(moved(&map, "p1", 4, 1), loc("p2", 0));
        assert_eq!(moved(&map, "t3", 1, 1), loc("t2", 0));
        assert_eq!(moved(&map, "t3", 0, 2), loc("t2", 0));
        assert_eq!(moved(&map, "t3", 0, 3), loc("t2", 1));
        // backward: start of p2 -> end of p1
        assert_eq!(moved(&map, "p2", 0, -1), loc("p1", 4));
        assert_eq!(moved(&map, "t2", 0, -1), loc("t3", 1));
    }

    #[test]
    fn test_move_through_empty_block() {
        let map = doc_map(sample_doc());
        // end of p2 -> empty p3 -> img
        assert_eq!(moved(&map, "p2", 2, 1), loc("p3", 0));
        assert_eq!(moved(&map, "p2", 2, 2), loc("img", 0));
        assert_eq!(moved(&map, "img", 0, -1), loc("p3", 0));
        // leaf in, leaf out
        assert_eq!(moved(&map, "img", 0, -2), loc("t2", 2));
        assert_eq!(moved(&map, "p3", 0, -1), loc("p2", 2));
    }

    #[test]
    fn test_move_over_atom_block() {
        let map = doc_map(sample_doc());
        assert_eq!(moved(&map, "img", 0, 1), loc("img", 1));
        assert_eq!(moved(&map, "p3", 0, 2), loc("img", 1));
        assert_eq!(moved(&map, "img", 1, -1), loc("img", 0));
    }

    #[test]
    fn test_move_off_document() {
        let map = doc_map(sample_doc());
        // first and last sibling edges
        assert_eq!(moved(&map, "t1", 0, -1), None);
        assert_eq!(moved(&map, "p1", 1, -2), None);
        assert_eq!(moved(&map, "img", 1, 1), None);
        assert_eq!(moved(&map, "img", 0, 1), loc("img", 1));
    }

    #[test]
    fn test_focus_block_navigation() {
        let map = doc_map(sample_doc());
        let next = |id: &str| {
            next_focus_block(&map, &id.into())
                .unwrap()
                .map(|n| n.id().to_string())
        };
        let prev = |id: &str| {
            prev_focus_block(&map, &id.into())
                .unwrap()
                .map(|n| n.id().to_string())
        };
        assert_eq!(next("p1"), Some("p2".into()));
        assert_eq!(next("p3"), Some("img".into()));
        assert_eq!(next("img"), None);
        assert_eq!(prev("p1"), None);
        assert_eq!(prev("img"), Some("p3".into()));

        let p1 = map.get(&"p1".into()).unwrap();
        let t1 = map.get(&"t1".into()).unwrap();
        assert!(is_focus_block(&map, &p1));
        assert!(!is_focus_block(&map, &t1));
    }

    #[test]
    fn test_pin_json() {
        let map = doc_map(sample_doc());
        assert_eq!(
            pin(&map, "t1", 2).to_json(),
            json!({ "node": "t1", "offset": 2 })
        );
        assert!(Pin::new(map.get(&"t1".into()).unwrap(), 3).is_err());
    }
}
