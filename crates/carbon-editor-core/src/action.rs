//! Self-applying, self-inverting edit primitives.
//!
//! An action carries enough data to apply itself to a [`Draft`] and, once
//! applied, to produce its own inverse. "Before" payloads (removed subtree,
//! previous text, previous attributes, previous selection) are captured
//! lazily on first execution, and structural targets are rewritten to the
//! canonical `Within(parent, index)` slot they resolved to, so the inverse
//! never depends on sibling ids that may since have moved.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::draft::Draft;
use crate::error::{CarbonError, Result};
use crate::id::{ActionId, NodeId};
use crate::node::{ContentJson, NodeJson};
use crate::point::Point;
use crate::props::Props;
use crate::selection::PointedSelection;
use crate::types::ActionOrigin;

/// The edit an action performs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionKind {
    // === Structure ===
    /// Insert a new subtree at a structural point.
    Insert { at: Point, id: NodeId, node: NodeJson },

    /// Remove a subtree. `node` is captured on execution.
    Remove {
        at: Point,
        id: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node: Option<NodeJson>,
    },

    /// Detach a subtree and re-attach it at `to`.
    Move { from: Point, to: Point, id: NodeId },

    // === Node values ===
    /// Change a node's type name.
    ChangeName {
        id: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<SmolStr>,
        to: SmolStr,
    },

    /// Replace a node's text or children wholesale.
    SetContent {
        id: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before: Option<ContentJson>,
        after: ContentJson,
    },

    /// Replace `removed` at char `offset` of a text leaf with `inserted`.
    /// Resolved against the leaf's text when the action runs, so queued
    /// splices compose instead of overwriting each other.
    SpliceText {
        id: NodeId,
        offset: usize,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        removed: String,
        inserted: String,
    },

    /// Merge an attribute patch; `before` is the patch that reverts it.
    UpdateProps {
        id: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before: Option<Props>,
        after: Props,
    },

    // === Selection ===
    /// Replace the pending selection.
    Select {
        #[serde(default)]
        before: Option<PointedSelection>,
        after: Option<PointedSelection>,
    },
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Insert { .. } => "insert",
            ActionKind::Remove { .. } => "remove",
            ActionKind::Move { .. } => "move",
            ActionKind::ChangeName { .. } => "changeName",
            ActionKind::SetContent { .. } => "setContent",
            ActionKind::SpliceText { .. } => "spliceText",
            ActionKind::UpdateProps { .. } => "updateProps",
            ActionKind::Select { .. } => "select",
        }
    }

    /// Node the action targets, if any.
    pub fn target(&self) -> Option<&NodeId> {
        match self {
            ActionKind::Insert { id, .. }
            | ActionKind::Remove { id, .. }
            | ActionKind::Move { id, .. }
            | ActionKind::ChangeName { id, .. }
            | ActionKind::SetContent { id, .. }
            | ActionKind::SpliceText { id, .. }
            | ActionKind::UpdateProps { id, .. } => Some(id),
            ActionKind::Select { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarbonAction {
    #[serde(rename = "actionId")]
    pub id: ActionId,
    pub origin: ActionOrigin,
    #[serde(flatten)]
    kind: ActionKind,
    #[serde(default)]
    executed: bool,
}

impl CarbonAction {
    pub fn new(id: ActionId, origin: ActionOrigin, kind: ActionKind) -> Self {
        Self {
            id,
            origin,
            kind,
            executed: false,
        }
    }

    /// An action whose captures are already filled in, e.g. rebuilt from a
    /// committed change log.
    pub(crate) fn executed(id: ActionId, origin: ActionOrigin, kind: ActionKind) -> Self {
        Self {
            id,
            origin,
            kind,
            executed: true,
        }
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    pub fn with_origin(mut self, origin: ActionOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Apply to `draft`, capturing whatever the inverse will need.
    pub fn execute(&mut self, draft: &mut Draft) -> Result<()> {
        tracing::trace!(target: "carbon::tx", action = %self, "execute");
        match &mut self.kind {
            ActionKind::Insert { at, id, node } => {
                if node.id != *id {
                    return Err(CarbonError::invalid_content(
                        id,
                        format!("payload carries id {}", node.id),
                    ));
                }
                let slot = draft.insert(at, node)?;
                *at = slot.point();
            }
            ActionKind::Remove { at, id, node } => {
                let (slot, removed) = draft.remove(id)?;
                *at = slot.point();
                *node = Some(removed);
            }
            ActionKind::Move { from, to, id } => {
                let (origin, landed) = draft.move_node(id, to)?;
                *from = origin.point();
                *to = landed.point();
            }
            ActionKind::ChangeName { id, from, to } => {
                *from = Some(draft.change_name(id, to)?);
            }
            ActionKind::SetContent { id, before, after } => {
                *before = Some(draft.update_content(id, after)?);
            }
            ActionKind::SpliceText {
                id,
                offset,
                removed,
                inserted,
            } => {
                draft.splice_text(id, *offset, removed, inserted)?;
            }
            ActionKind::UpdateProps { id, before, after } => {
                *before = Some(draft.update_props(id, after)?);
            }
            ActionKind::Select { before, after } => {
                *before = draft.update_selection(after.clone());
            }
        }
        self.executed = true;
        Ok(())
    }

    /// The action that undoes this one. Only known after execution.
    pub fn inverse(&self, inverse_id: ActionId) -> Result<CarbonAction> {
        if !self.executed {
            return Err(CarbonError::PrematureInverse(self.id));
        }
        let premature = || CarbonError::PrematureInverse(self.id);
        let kind = match &self.kind {
            ActionKind::Insert { at, id, .. } => ActionKind::Remove {
                at: at.clone(),
                id: id.clone(),
                node: None,
            },
            ActionKind::Remove { at, id, node } => ActionKind::Insert {
                at: at.clone(),
                id: id.clone(),
                node: node.clone().ok_or_else(premature)?,
            },
            ActionKind::Move { from, to, id } => ActionKind::Move {
                from: to.clone(),
                to: from.clone(),
                id: id.clone(),
            },
            ActionKind::ChangeName { id, from, to } => ActionKind::ChangeName {
                id: id.clone(),
                from: Some(to.clone()),
                to: from.clone().ok_or_else(premature)?,
            },
            ActionKind::SetContent { id, before, after } => ActionKind::SetContent {
                id: id.clone(),
                before: Some(after.clone()),
                after: before.clone().ok_or_else(premature)?,
            },
            ActionKind::SpliceText {
                id,
                offset,
                removed,
                inserted,
            } => ActionKind::SpliceText {
                id: id.clone(),
                offset: *offset,
                removed: inserted.clone(),
                inserted: removed.clone(),
            },
            ActionKind::UpdateProps { id, before, .. } => ActionKind::UpdateProps {
                id: id.clone(),
                before: None,
                after: before.clone().ok_or_else(premature)?,
            },
            ActionKind::Select { before, after } => ActionKind::Select {
                before: after.clone(),
                after: before.clone(),
            },
        };
        Ok(CarbonAction::new(inverse_id, self.origin, kind))
    }
}

impl fmt::Display for CarbonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.kind.name())?;
        if let Some(target) = self.kind.target() {
            write!(f, " {}", target)?;
        }
        Ok(())
    }
}
