//! Structural, snapshot-independent anchors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CarbonError, Result};
use crate::id::NodeId;
use crate::node_map::NodeMap;
use crate::pin::{self, Pin};

/// Where a point sits relative to its node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointAt {
    Before,
    Within,
    After,
}

impl fmt::Display for PointAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PointAt::Before => "before",
            PointAt::Within => "within",
            PointAt::After => "after",
        })
    }
}

/// Durable address: survives any edit that keeps `node_id` alive.
///
/// For selections, `Within(id, n)` is focus unit `n` of the node. For
/// structural placement (insert/move targets) it is child slot `n`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub node_id: NodeId,
    pub at: PointAt,
    #[serde(default)]
    pub offset: usize,
}

impl Point {
    pub fn before(id: impl Into<NodeId>) -> Self {
        Self {
            node_id: id.into(),
            at: PointAt::Before,
            offset: 0,
        }
    }

    pub fn after(id: impl Into<NodeId>) -> Self {
        Self {
            node_id: id.into(),
            at: PointAt::After,
            offset: 0,
        }
    }

    pub fn within(id: impl Into<NodeId>, offset: usize) -> Self {
        Self {
            node_id: id.into(),
            at: PointAt::Within,
            offset,
        }
    }

    pub fn to_start(id: impl Into<NodeId>) -> Self {
        Self::within(id, 0)
    }

    /// Resolve against a snapshot.
    ///
    /// Succeeds iff the node exists and is focusable or an ancestor of a
    /// focusable node.
    pub fn pin(&self, map: &NodeMap) -> Result<Pin> {
        let id = &self.node_id;
        let node = map
            .get(id)
            .ok_or_else(|| CarbonError::unresolvable(id, "node no longer exists"))?;

        match self.at {
            PointAt::Within => pin::resolve_within(map, &node, self.offset),
            PointAt::Before | PointAt::After => {
                let after = self.at == PointAt::After;
                match map.parent(id).filter(|parent| parent.is_focusable()) {
                    Some(parent) => {
                        let start = pin::offset_of_child(map, &parent, id)?;
                        let offset = if after { start + node.focus_size() } else { start };
                        Pin::new(parent, offset)
                    }
                    None => {
                        let offset = if after { node.focus_size() } else { 0 };
                        pin::resolve_within(map, &node, offset)
                    }
                }
            }
        }
    }

    /// Structural slot this point addresses.
    pub fn slot(&self, map: &NodeMap) -> Result<Slot> {
        let id = &self.node_id;
        match self.at {
            PointAt::Within => {
                let node = map.node(id)?;
                if node.is_leaf() || self.offset > node.child_count() {
                    return Err(self.invalid_placement());
                }
                Ok(Slot::new(id.clone(), self.offset))
            }
            PointAt::Before | PointAt::After => {
                map.node(id)?;
                let parent = map.parent(id).ok_or_else(|| self.invalid_placement())?;
                let index = parent
                    .index_of(id)
                    .ok_or_else(|| CarbonError::not_found(id))?;
                let index = if self.at == PointAt::After { index + 1 } else { index };
                Ok(Slot::new(parent.id().clone(), index))
            }
        }
    }

    fn invalid_placement(&self) -> CarbonError {
        CarbonError::InvalidPlacement {
            id: self.node_id.clone(),
            relation: self.at.to_string().into(),
        }
    }
}

/// A child position: `index` within `parent`'s children.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub parent: NodeId,
    pub index: usize,
}

impl Slot {
    pub fn new(parent: impl Into<NodeId>, index: usize) -> Self {
        Self {
            parent: parent.into(),
            index,
        }
    }

    /// Canonical structural point for this slot.
    pub fn point(&self) -> Point {
        Point::within(self.parent.clone(), self.index)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.at {
            PointAt::Within => write!(f, "{}:{}", self.node_id, self.offset),
            at => write!(f, "{} {}", at, self.node_id),
        }
    }
}
