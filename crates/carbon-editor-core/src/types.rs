//! Small shared types: edit origins and the host-side selection shape.
//!
//! These types are framework-agnostic; the host adapter translates its own
//! selection API (DOM Selection, native text view, ...) into them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::NodeId;
use crate::point::Point;
use crate::selection::PointedSelection;

/// Who caused an edit or a selection change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionOrigin {
    /// Direct user input routed through a command.
    #[default]
    UserInput,
    /// Programmatic edits from the embedding application.
    Runtime,
    /// The host reporting a selection it already displays.
    HostEcho,
    /// Corrective edits from the post-commit normalizer.
    Normalizer,
    /// Undo/redo replay.
    History,
}

impl ActionOrigin {
    /// Normalizer transactions skip the acknowledgement gate.
    pub fn is_priority(self) -> bool {
        self == ActionOrigin::Normalizer
    }
}

impl fmt::Display for ActionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionOrigin::UserInput => "user",
            ActionOrigin::Runtime => "runtime",
            ActionOrigin::HostEcho => "host",
            ActionOrigin::Normalizer => "normalizer",
            ActionOrigin::History => "history",
        })
    }
}

/// A caret position as the host reports it: a node id and a focus offset
/// inside that node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostPosition {
    pub node: NodeId,
    pub offset: usize,
}

impl HostPosition {
    pub fn new(node: impl Into<NodeId>, offset: usize) -> Self {
        Self {
            node: node.into(),
            offset,
        }
    }

    pub fn point(&self) -> Point {
        Point::within(self.node.clone(), self.offset)
    }
}

/// Selection with anchor and focus, as reported by the host surface.
///
/// The anchor is where the selection started, the focus is where the caret is now.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostSelection {
    /// Where selection started
    pub anchor: HostPosition,
    /// Where the caret is now
    pub focus: HostPosition,
}

impl HostSelection {
    pub fn new(anchor: HostPosition, focus: HostPosition) -> Self {
        Self { anchor, focus }
    }

    /// Collapsed selection (caret only).
    pub fn caret(node: impl Into<NodeId>, offset: usize) -> Self {
        let at = HostPosition::new(node, offset);
        Self {
            anchor: at.clone(),
            focus: at,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// Durable form, tagged as a host echo.
    pub fn to_pointed(&self) -> PointedSelection {
        PointedSelection::new(self.anchor.point(), self.focus.point(), ActionOrigin::HostEcho)
    }
}
