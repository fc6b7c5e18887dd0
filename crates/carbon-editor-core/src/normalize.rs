//! Post-commit repair of incomplete child sequences.

use crate::action::{ActionKind, CarbonAction};
use crate::error::Result;
use crate::id::IdGenerator;
use crate::point::Point;
use crate::schema::MatchStatus;
use crate::state::State;
use crate::types::ActionOrigin;

/// Builds the filler inserts a committed state needs.
///
/// Only nodes the last commit touched structurally are checked. A sequence
/// that is `Partial` gets the children its content rule asks for appended;
/// one that is `Invalid` cannot be fixed by appending and is only logged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn check(&self, state: &State, ids: &IdGenerator) -> Result<Vec<CarbonAction>> {
        let schema = state.schema();
        let mut actions = Vec::new();

        for id in state.changes().structural_parents() {
            let Some(node) = state.map().get(&id) else {
                continue;
            };
            if node.is_leaf() {
                continue;
            }
            let names: Vec<_> = node.children().iter().map(|c| c.name().clone()).collect();
            match schema.match_children(node.name(), &names)? {
                MatchStatus::Complete => {}
                MatchStatus::Invalid => {
                    tracing::warn!(target: "carbon::tx", %id, name = %node.name(), "children cannot be normalized");
                }
                MatchStatus::Partial => {
                    let Some(missing) = schema.fill(node.name(), &names)? else {
                        continue;
                    };
                    tracing::debug!(target: "carbon::tx", %id, fillers = missing.len(), "normalize");
                    for (offset, name) in missing.iter().enumerate() {
                        let filler = schema.create_default(name, ids.node_id())?;
                        actions.push(CarbonAction::new(
                            ids.action_id(),
                            ActionOrigin::Normalizer,
                            ActionKind::Insert {
                                at: Point::within(id.clone(), names.len() + offset),
                                id: filler.id().clone(),
                                node: filler.to_json(),
                            },
                        ));
                    }
                }
            }
        }
        Ok(actions)
    }
}
