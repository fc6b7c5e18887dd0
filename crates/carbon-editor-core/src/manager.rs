//! Ordering and application of dispatched transactions.

use std::collections::VecDeque;
use std::sync::Arc;

use web_time::Instant;

use crate::config::EditorConfig;
use crate::effects::Effects;
use crate::error::Result;
use crate::id::TxId;
use crate::state::State;
use crate::transaction::{Commit, QueuedTransaction};
use crate::types::ActionOrigin;

/// Result of applying one queued transaction.
#[derive(Debug)]
pub struct Outcome {
    pub tx: TxId,
    pub origin: ActionOrigin,
    pub result: Result<Commit>,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn commit(&self) -> Option<&Commit> {
        self.result.as_ref().ok()
    }
}

/// FIFO of closed transactions, applied one at a time.
///
/// Normalizer transactions jump ahead of everything else. After a commit
/// that the host has to mirror, ordinary transactions are held until the
/// host acknowledges the new selection, so an input event never runs
/// against a selection the host has not caught up with.
#[derive(Debug, Default)]
pub struct TransactionManager {
    queue: VecDeque<QueuedTransaction>,
    awaiting_ack: bool,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, tx: QueuedTransaction) {
        tracing::trace!(target: "carbon::tx", tx = %tx.id, origin = %tx.origin, "enqueue");
        if tx.origin.is_priority() {
            let at = self
                .queue
                .iter()
                .position(|queued| !queued.origin.is_priority())
                .unwrap_or(self.queue.len());
            self.queue.insert(at, tx);
        } else {
            self.queue.push_back(tx);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }

    /// Clear the ack gate. Returns whether it was set.
    pub fn acknowledge(&mut self) -> bool {
        std::mem::replace(&mut self.awaiting_ack, false)
    }

    /// Pop the next transaction allowed to run, if any.
    pub fn next_ready(&mut self) -> Option<QueuedTransaction> {
        match self.queue.front() {
            Some(front) if front.origin.is_priority() || !self.awaiting_ack => {
                self.queue.pop_front()
            }
            _ => None,
        }
    }

    /// Apply the next ready transaction on top of `state`.
    ///
    /// Returns `None` when nothing is ready. A failed transaction leaves
    /// `state` untouched and does not affect the ack gate.
    pub fn apply_next(&mut self, state: &Arc<State>, config: &EditorConfig) -> Option<Outcome> {
        let tx = self.next_ready()?;
        let (id, origin) = (tx.id, tx.origin);
        let result = run(state, config, tx);

        if let Ok(commit) = &result {
            if commit.effects.sync_selection && origin != ActionOrigin::HostEcho {
                self.awaiting_ack = true;
            }
        }
        Some(Outcome {
            tx: id,
            origin,
            result,
        })
    }
}

fn run(state: &Arc<State>, config: &EditorConfig, tx: QueuedTransaction) -> Result<Commit> {
    let mut draft = state.draft(config);
    let mut actions = tx.actions;
    for action in &mut actions {
        action.execute(&mut draft)?;
    }
    let next = draft.commit()?;
    let effects = Effects::between(state, &next);
    tracing::debug!(
        target: "carbon::tx",
        tx = %tx.id,
        actions = actions.len(),
        version = next.version(),
        "applied"
    );
    Ok(Commit {
        tx: tx.id,
        origin: tx.origin,
        state: next,
        actions,
        effects,
        committed_at: Instant::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, CarbonAction};
    use crate::error::CarbonError;
    use crate::id::IdGenerator;
    use crate::node::ContentJson;
    use crate::point::Point;
    use crate::selection::PointedSelection;
    use crate::test_support::{schema, two_paragraphs};

    fn state() -> Arc<State> {
        State::create(Arc::new(schema()), two_paragraphs(), None).unwrap()
    }

    fn queued(ids: &IdGenerator, origin: ActionOrigin, kinds: Vec<ActionKind>) -> QueuedTransaction {
        let actions = kinds
            .into_iter()
            .map(|kind| CarbonAction::new(ids.action_id(), origin, kind))
            .collect();
        QueuedTransaction::new(ids.tx_id(), origin, actions)
    }

    fn set_text(id: &str, text: &str) -> ActionKind {
        ActionKind::SetContent {
            id: id.into(),
            before: None,
            after: ContentJson::Text(text.into()),
        }
    }

    fn select(id: &str, offset: usize) -> ActionKind {
        ActionKind::Select {
            before: None,
            after: Some(PointedSelection::caret(
                Point::within(id, offset),
                ActionOrigin::UserInput,
            )),
        }
    }

    #[test]
    fn test_priority_jumps_queue() {
        let ids = IdGenerator::new("test");
        let mut manager = TransactionManager::new();
        manager.enqueue(queued(&ids, ActionOrigin::UserInput, vec![]));
        manager.enqueue(queued(&ids, ActionOrigin::Runtime, vec![]));
        manager.enqueue(queued(&ids, ActionOrigin::Normalizer, vec![]));
        manager.enqueue(queued(&ids, ActionOrigin::Normalizer, vec![]));

        let order: Vec<_> = std::iter::from_fn(|| manager.next_ready())
            .map(|tx| tx.id.to_string())
            .collect();
        assert_eq!(order, ["tx3", "tx4", "tx1", "tx2"]);
    }

    #[test]
    fn test_failed_tx_keeps_state() {
        let ids = IdGenerator::new("test");
        let config = EditorConfig::default();
        let state = state();
        let mut manager = TransactionManager::new();
        manager.enqueue(queued(
            &ids,
            ActionOrigin::UserInput,
            vec![set_text("t1", "xy"), set_text("gone", "z")],
        ));

        let outcome = manager.apply_next(&state, &config).unwrap();
        assert!(matches!(outcome.result, Err(CarbonError::NodeNotFound { .. })));
        assert_eq!(state.node(&"t1".into()).unwrap().text(), Some("ab"));
        assert!(!manager.is_awaiting_ack());
        assert!(manager.apply_next(&state, &config).is_none());
    }

    #[test]
    fn test_selection_commit_gates_ordinary_txs() {
        let ids = IdGenerator::new("test");
        let config = EditorConfig::default();
        let mut manager = TransactionManager::new();
        manager.enqueue(queued(&ids, ActionOrigin::UserInput, vec![select("t1", 1)]));
        manager.enqueue(queued(&ids, ActionOrigin::UserInput, vec![set_text("t2", "x")]));

        let first = manager.apply_next(&state(), &config).unwrap();
        let state = first.result.unwrap().state;
        assert!(manager.is_awaiting_ack());
        assert!(manager.apply_next(&state, &config).is_none());
        assert_eq!(manager.len(), 1);

        // normalizer work is not held back
        manager.enqueue(queued(&ids, ActionOrigin::Normalizer, vec![set_text("t1", "n")]));
        let normalized = manager.apply_next(&state, &config).unwrap();
        assert_eq!(normalized.origin, ActionOrigin::Normalizer);
        assert!(normalized.is_ok());

        assert!(manager.acknowledge());
        let held = manager.apply_next(&state, &config).unwrap();
        assert_eq!(held.tx.to_string(), "tx2");
        assert!(held.is_ok());
        assert!(!manager.is_awaiting_ack());
    }

    #[test]
    fn test_host_echo_does_not_gate() {
        let ids = IdGenerator::new("test");
        let mut manager = TransactionManager::new();
        manager.enqueue(queued(&ids, ActionOrigin::HostEcho, vec![select("t2", 1)]));
        let outcome = manager.apply_next(&state(), &EditorConfig::default()).unwrap();
        assert!(outcome.commit().unwrap().effects.sync_selection);
        assert!(!manager.is_awaiting_ack());
    }
}
