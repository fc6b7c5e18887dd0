//! Two-ended selections over points and pins.
//!
//! [`PointedSelection`] is what actions and the change log store; it stays
//! valid across snapshots. [`PinnedSelection`] is what a committed
//! [`crate::State`] exposes, resolved against that state's node map.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Result;
use crate::node_map::NodeMap;
use crate::pin::Pin;
use crate::point::Point;
use crate::types::ActionOrigin;

/// Durable selection: tail (anchor) and head (caret side).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointedSelection {
    pub tail: Point,
    pub head: Point,
    #[serde(default)]
    pub origin: ActionOrigin,
}

impl PointedSelection {
    pub fn new(tail: Point, head: Point, origin: ActionOrigin) -> Self {
        Self { tail, head, origin }
    }

    /// Collapsed selection at `at`.
    pub fn caret(at: Point, origin: ActionOrigin) -> Self {
        Self {
            tail: at.clone(),
            head: at,
            origin,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.tail == self.head
    }

    pub fn with_origin(mut self, origin: ActionOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Resolve both ends against a snapshot.
    pub fn pin(&self, map: &NodeMap) -> Result<PinnedSelection> {
        let selection = PinnedSelection {
            tail: self.tail.pin(map)?,
            head: self.head.pin(map)?,
            origin: self.origin,
        };
        tracing::trace!(target: "carbon::selection", tail = %selection.tail, head = %selection.head, "pinned selection");
        Ok(selection)
    }
}

/// Selection resolved against one snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PinnedSelection {
    pub tail: Pin,
    pub head: Pin,
    pub origin: ActionOrigin,
}

impl PinnedSelection {
    pub fn new(tail: Pin, head: Pin, origin: ActionOrigin) -> Self {
        Self { tail, head, origin }
    }

    pub fn caret(at: Pin, origin: ActionOrigin) -> Self {
        Self {
            tail: at.clone(),
            head: at,
            origin,
        }
    }

    pub fn unpin(&self) -> PointedSelection {
        PointedSelection::new(self.tail.point(), self.head.point(), self.origin)
    }

    /// Collapsed in caret terms: both ends name the same focus position,
    /// even if one end is a leaf pin and the other its block.
    pub fn is_collapsed(&self, map: &NodeMap) -> Result<bool> {
        Ok(self.compare_ends(map)? == Ordering::Equal)
    }

    /// Head at or after tail in document order.
    pub fn is_forward(&self, map: &NodeMap) -> Result<bool> {
        Ok(self.compare_ends(map)? != Ordering::Less)
    }

    /// The end that comes first in document order.
    pub fn start(&self, map: &NodeMap) -> Result<&Pin> {
        Ok(if self.is_forward(map)? { &self.tail } else { &self.head })
    }

    /// The end that comes last in document order.
    pub fn end(&self, map: &NodeMap) -> Result<&Pin> {
        Ok(if self.is_forward(map)? { &self.head } else { &self.tail })
    }

    pub fn collapse_to_head(&self) -> PinnedSelection {
        PinnedSelection::caret(self.head.clone(), self.origin)
    }

    pub fn collapse_to_start(&self, map: &NodeMap) -> Result<PinnedSelection> {
        Ok(PinnedSelection::caret(self.start(map)?.clone(), self.origin))
    }

    /// Move both ends by `distance` focus units. `None` if either end
    /// would leave the document.
    pub fn move_by(&self, map: &NodeMap, distance: isize) -> Result<Option<PinnedSelection>> {
        let Some(tail) = self.tail.move_by(map, distance)? else {
            return Ok(None);
        };
        let Some(head) = self.head.move_by(map, distance)? else {
            return Ok(None);
        };
        Ok(Some(PinnedSelection::new(tail, head, self.origin)))
    }

    /// Move only the head, keeping the tail anchored.
    pub fn extend_by(&self, map: &NodeMap, distance: isize) -> Result<Option<PinnedSelection>> {
        Ok(self
            .head
            .move_by(map, distance)?
            .map(|head| PinnedSelection::new(self.tail.clone(), head, self.origin)))
    }

    pub fn to_json(&self) -> Value {
        json!({
            "tail": self.tail.to_json(),
            "head": self.head.to_json(),
            "origin": self.origin,
        })
    }

    fn compare_ends(&self, map: &NodeMap) -> Result<Ordering> {
        let tail = self.tail.up(map)?;
        let head = self.head.up(map)?;
        if tail.id() == head.id() {
            return Ok(head.offset().cmp(&tail.offset()));
        }
        map.document_order(head.id(), tail.id())
    }
}
