//! Append-only log of primitive changes made by a draft.
//!
//! Records carry owned data (wire-form nodes, content, patches), never
//! `Arc`s into the draft's map, so logging a change cannot pin a node value
//! and force an extra copy on its next edit.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use smol_str::SmolStr;

use crate::action::{ActionKind, CarbonAction};
use crate::id::{IdGenerator, NodeId};
use crate::node::{ContentJson, NodeJson};
use crate::point::Slot;
use crate::props::Props;
use crate::selection::PointedSelection;
use crate::types::ActionOrigin;

/// One primitive change, in the order the draft applied it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Change {
    Inserted {
        slot: Slot,
        node: NodeJson,
    },
    Removed {
        slot: Slot,
        node: NodeJson,
    },
    /// `from` is the slot before detaching, `to` the slot the node landed in.
    Moved {
        id: NodeId,
        from: Slot,
        to: Slot,
    },
    Renamed {
        id: NodeId,
        from: SmolStr,
        to: SmolStr,
    },
    ContentSet {
        id: NodeId,
        before: ContentJson,
        after: ContentJson,
    },
    PropsUpdated {
        id: NodeId,
        patch: Props,
        revert: Props,
    },
    SelectionSet {
        before: Option<PointedSelection>,
        after: Option<PointedSelection>,
    },
}

impl Change {
    pub fn is_selection(&self) -> bool {
        matches!(self, Change::SelectionSet { .. })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StateChanges {
    records: Vec<Change>,
}

impl StateChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.records.push(change);
    }

    pub fn records(&self) -> &[Change] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Seal the log. Committed states only ever see it behind an `Arc`.
    pub fn freeze(self) -> Arc<StateChanges> {
        Arc::new(self)
    }

    // === Buckets ===

    /// Nodes whose structure, text or type changed, plus the parents whose
    /// child lists changed.
    pub fn content_ids(&self) -> BTreeSet<NodeId> {
        let mut ids = BTreeSet::new();
        for change in &self.records {
            match change {
                Change::Inserted { slot, node } => {
                    ids.insert(slot.parent.clone());
                    ids.insert(node.id.clone());
                }
                Change::Removed { slot, .. } => {
                    ids.insert(slot.parent.clone());
                }
                Change::Moved { id, from, to } => {
                    ids.insert(id.clone());
                    ids.insert(from.parent.clone());
                    ids.insert(to.parent.clone());
                }
                Change::Renamed { id, .. } | Change::ContentSet { id, .. } => {
                    ids.insert(id.clone());
                }
                Change::PropsUpdated { .. } | Change::SelectionSet { .. } => {}
            }
        }
        ids
    }

    /// Nodes that only had their attributes changed.
    pub fn node_state_ids(&self) -> BTreeSet<NodeId> {
        let content = self.content_ids();
        self.records
            .iter()
            .filter_map(|change| match change {
                Change::PropsUpdated { id, .. } if !content.contains(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Ids removed by this log and not re-inserted later in it.
    pub fn removed_ids(&self) -> BTreeSet<NodeId> {
        let mut removed = BTreeSet::new();
        for change in &self.records {
            match change {
                Change::Removed { node, .. } => {
                    removed.insert(node.id.clone());
                }
                Change::Inserted { node, .. } => {
                    removed.remove(&node.id);
                }
                _ => {}
            }
        }
        removed
    }

    /// Nodes whose child sequence or content rule changed: what grammar
    /// checks and the normalizer look at.
    pub fn structural_parents(&self) -> BTreeSet<NodeId> {
        let mut parents = BTreeSet::new();
        for change in &self.records {
            match change {
                Change::Inserted { slot, .. } | Change::Removed { slot, .. } => {
                    parents.insert(slot.parent.clone());
                }
                Change::Moved { from, to, .. } => {
                    parents.insert(from.parent.clone());
                    parents.insert(to.parent.clone());
                }
                Change::ContentSet {
                    id,
                    after: ContentJson::Children(_),
                    ..
                }
                | Change::Renamed { id, .. } => {
                    parents.insert(id.clone());
                }
                _ => {}
            }
        }
        parents
    }

    pub fn touches_selection(&self) -> bool {
        self.records.iter().any(Change::is_selection)
    }

    // === Conversion ===

    /// Rebuild the log as executed actions, in order, so a history
    /// collaborator can invert a commit it did not author.
    pub fn to_actions(&self, ids: &IdGenerator, origin: ActionOrigin) -> Vec<CarbonAction> {
        self.records
            .iter()
            .map(|change| {
                let kind = match change.clone() {
                    Change::Inserted { slot, node } => ActionKind::Insert {
                        at: slot.point(),
                        id: node.id.clone(),
                        node,
                    },
                    Change::Removed { slot, node } => ActionKind::Remove {
                        at: slot.point(),
                        id: node.id.clone(),
                        node: Some(node),
                    },
                    Change::Moved { id, from, to } => ActionKind::Move {
                        from: from.point(),
                        to: to.point(),
                        id,
                    },
                    Change::Renamed { id, from, to } => ActionKind::ChangeName {
                        id,
                        from: Some(from),
                        to,
                    },
                    Change::ContentSet { id, before, after } => ActionKind::SetContent {
                        id,
                        before: Some(before),
                        after,
                    },
                    Change::PropsUpdated { id, patch, revert } => ActionKind::UpdateProps {
                        id,
                        before: Some(revert),
                        after: patch,
                    },
                    Change::SelectionSet { before, after } => {
                        ActionKind::Select { before, after }
                    }
                };
                CarbonAction::executed(ids.action_id(), origin, kind)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::point::Point;
    use crate::props::Namespace;

    fn log() -> StateChanges {
        let mut changes = StateChanges::new();
        changes.push(Change::Inserted {
            slot: Slot::new("doc", 1),
            node: NodeJson::block("p9", "paragraph", []),
        });
        changes.push(Change::ContentSet {
            id: "t1".into(),
            before: ContentJson::Text("ab".into()),
            after: ContentJson::Text("aXb".into()),
        });
        changes.push(Change::PropsUpdated {
            id: "p2".into(),
            patch: Props::new().with(Namespace::Semantic, "level", json!(2)),
            revert: Props::new().with(Namespace::Semantic, "level", serde_json::Value::Null),
        });
        changes.push(Change::Removed {
            slot: Slot::new("doc", 2),
            node: NodeJson::block("p3", "paragraph", []),
        });
        changes.push(Change::SelectionSet {
            before: None,
            after: Some(PointedSelection::caret(
                Point::within("t1", 2),
                ActionOrigin::UserInput,
            )),
        });
        changes
    }

    #[test]
    fn test_buckets() {
        let changes = log();
        let ids = |set: BTreeSet<NodeId>| set.into_iter().map(|id| id.to_string()).collect::<Vec<_>>();
        assert_eq!(ids(changes.content_ids()), ["doc", "p9", "t1"]);
        assert_eq!(ids(changes.node_state_ids()), ["p2"]);
        assert_eq!(ids(changes.removed_ids()), ["p3"]);
        assert_eq!(ids(changes.structural_parents()), ["doc"]);
        assert!(changes.touches_selection());
    }

    #[test]
    fn test_to_actions_are_executed() {
        let ids = IdGenerator::new("test");
        let actions = log().to_actions(&ids, ActionOrigin::Runtime);
        assert_eq!(actions.len(), 5);
        assert!(actions.iter().all(CarbonAction::is_executed));
        assert!(matches!(
            actions[3].kind(),
            ActionKind::Remove { at, .. } if *at == Point::within("doc", 2)
        ));
        // executed actions can be inverted straight away
        let inverse = actions[1].inverse(ids.action_id()).unwrap();
        assert!(matches!(
            inverse.kind(),
            ActionKind::SetContent { after: ContentJson::Text(text), .. } if text == "ab"
        ));
    }

    #[test]
    fn test_freeze_shares() {
        let frozen = log().freeze();
        let other = frozen.clone();
        assert!(Arc::ptr_eq(&frozen, &other));
        assert_eq!(frozen.len(), 5);
    }
}
