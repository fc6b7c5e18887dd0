//! The editor: current state, transaction lifecycle and host coordination.
//!
//! The rendering surface stays outside this crate. It is handed each new
//! state together with its [`Effects`] through a [`RenderAdapter`], and it
//! reports user-driven selection changes back through
//! [`Editor::host_selection_changed`].

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use crate::action::{ActionKind, CarbonAction};
use crate::config::{ContentPolicy, EditorConfig};
use crate::effects::Effects;
use crate::error::{CarbonError, Result};
use crate::id::IdGenerator;
use crate::manager::{Outcome, TransactionManager};
use crate::node::NodeJson;
use crate::normalize::Normalizer;
use crate::schema::Schema;
use crate::selection::PointedSelection;
use crate::state::State;
use crate::transaction::{OpenGuard, QueuedTransaction, Transaction};
use crate::types::{ActionOrigin, HostSelection};

/// Host side of the editor: paints committed states.
///
/// Implementations use the effect buckets to limit work to the nodes that
/// changed, and re-apply the selection when `effects.sync_selection` is set.
pub trait RenderAdapter {
    fn paint(&mut self, state: &Arc<State>, effects: &Effects);
}

/// Work postponed to the next [`Editor::tick`].
#[derive(Clone, Debug, PartialEq)]
enum Deferred {
    HostSelection(HostSelection),
    Normalize,
}

pub struct Editor {
    config: EditorConfig,
    state: Arc<State>,
    ids: IdGenerator,
    manager: TransactionManager,
    open: Rc<Cell<bool>>,
    deferred: VecDeque<Deferred>,
    adapter: Option<Box<dyn RenderAdapter>>,
}

impl Editor {
    pub fn new(
        config: EditorConfig,
        schema: Arc<Schema>,
        root: &NodeJson,
        selection: Option<PointedSelection>,
    ) -> Result<Self> {
        let state = State::from_json(schema, root, selection)?;
        Ok(Self::from_state(config, state))
    }

    pub fn from_state(config: EditorConfig, state: Arc<State>) -> Self {
        let ids = IdGenerator::new(config.session.clone());
        Self {
            config,
            state,
            ids,
            manager: TransactionManager::new(),
            open: Rc::new(Cell::new(false)),
            deferred: VecDeque::new(),
            adapter: None,
        }
    }

    pub fn with_adapter(mut self, adapter: impl RenderAdapter + 'static) -> Self {
        self.adapter = Some(Box::new(adapter));
        self
    }

    pub fn set_adapter(&mut self, adapter: Option<Box<dyn RenderAdapter>>) {
        self.adapter = adapter;
    }

    pub fn state(&self) -> &Arc<State> {
        &self.state
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    /// Transactions waiting in the queue.
    pub fn pending(&self) -> usize {
        self.manager.len()
    }

    pub fn is_awaiting_ack(&self) -> bool {
        self.manager.is_awaiting_ack()
    }

    // === Transactions ===

    /// Open a user-input transaction on the current state.
    pub fn transaction(&self) -> Result<Transaction> {
        self.transaction_with(ActionOrigin::UserInput)
    }

    /// Open a transaction tagged with `origin`.
    ///
    /// Fails with [`CarbonError::Reentrancy`] while another transaction from
    /// this editor is still open.
    pub fn transaction_with(&self, origin: ActionOrigin) -> Result<Transaction> {
        let guard = OpenGuard::acquire(&self.open)?;
        Ok(Transaction::open(
            guard,
            self.state.clone(),
            self.ids.clone(),
            origin,
        ))
    }

    /// Close `tr`, queue it and apply everything that is ready.
    ///
    /// Individual transaction failures are reported in the returned
    /// outcomes; the state only moves forward on success.
    pub fn dispatch(&mut self, tr: Transaction) -> Result<Vec<Outcome>> {
        if !tr.belongs_to(&self.open) {
            return Err(CarbonError::ForeignTransaction(tr.id().0));
        }
        if tr.is_empty() {
            tr.discard();
            return Ok(Vec::new());
        }
        self.manager.enqueue(tr.into_queued());
        Ok(self.drain())
    }

    // === Host coordination ===

    /// Record a selection change made on the host surface. Applied on the
    /// next [`Editor::tick`].
    pub fn host_selection_changed(&mut self, selection: HostSelection) {
        tracing::trace!(target: "carbon::selection", ?selection, "host selection");
        self.deferred.push_back(Deferred::HostSelection(selection));
    }

    /// The host has mirrored the last selection; release held transactions.
    pub fn acknowledge_selection(&mut self) -> Vec<Outcome> {
        if self.manager.acknowledge() {
            tracing::trace!(target: "carbon::selection", "acknowledged");
        }
        self.drain()
    }

    /// Run deferred work: host selection echoes and normalization.
    pub fn tick(&mut self) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        while let Some(task) = self.deferred.pop_front() {
            match task {
                Deferred::HostSelection(selection) => self.echo_host_selection(selection),
                Deferred::Normalize => self.normalize(),
            }
            outcomes.extend(self.drain());
        }
        outcomes
    }

    fn echo_host_selection(&mut self, selection: HostSelection) {
        // Any host report means the host has caught up.
        self.manager.acknowledge();
        let incoming = selection.to_pointed();
        match self.differs_from_current(&incoming) {
            Ok(false) => {}
            Ok(true) => {
                let action = CarbonAction::new(
                    self.ids.action_id(),
                    ActionOrigin::HostEcho,
                    ActionKind::Select {
                        before: None,
                        after: Some(incoming),
                    },
                );
                self.manager.enqueue(QueuedTransaction::new(
                    self.ids.tx_id(),
                    ActionOrigin::HostEcho,
                    vec![action],
                ));
            }
            Err(err) => {
                tracing::warn!(target: "carbon::selection", %err, "ignoring host selection");
            }
        }
    }

    /// Whether `incoming` names other caret positions than the current
    /// selection. Leaf and block spellings of one position compare equal.
    fn differs_from_current(&self, incoming: &PointedSelection) -> Result<bool> {
        let map = self.state.map();
        let incoming = incoming.pin(map)?;
        let Some(current) = self.state.selection() else {
            return Ok(true);
        };
        Ok(incoming.tail.up(map)? != current.tail.up(map)?
            || incoming.head.up(map)? != current.head.up(map)?)
    }

    fn normalize(&mut self) {
        match Normalizer.check(&self.state, &self.ids) {
            Ok(actions) if actions.is_empty() => {}
            Ok(actions) => self.manager.enqueue(QueuedTransaction::new(
                self.ids.tx_id(),
                ActionOrigin::Normalizer,
                actions,
            )),
            Err(err) => tracing::warn!(target: "carbon::tx", %err, "normalization failed"),
        }
    }

    fn drain(&mut self) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.manager.apply_next(&self.state, &self.config) {
            match &outcome.result {
                Ok(commit) => {
                    self.state = commit.state.clone();
                    if let Some(adapter) = self.adapter.as_mut() {
                        adapter.paint(&self.state, &commit.effects);
                    }
                    let structural = !commit.state.changes().structural_parents().is_empty();
                    if structural
                        && self.config.content_policy == ContentPolicy::Normalize
                        && !self.deferred.contains(&Deferred::Normalize)
                    {
                        self.deferred.push_back(Deferred::Normalize);
                    }
                }
                Err(err) => {
                    tracing::warn!(target: "carbon::tx", tx = %outcome.tx, %err, "transaction failed");
                }
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::node::{ContentJson, Node};
    use crate::point::Point;
    use crate::test_support::{schema, two_paragraphs};

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<Effects>>>);

    impl RenderAdapter for Recorder {
        fn paint(&mut self, _state: &Arc<State>, effects: &Effects) {
            self.0.borrow_mut().push(effects.clone());
        }
    }

    fn editor_with(config: EditorConfig, root: Arc<Node>, caret: Option<Point>) -> Editor {
        let selection = caret.map(|at| PointedSelection::caret(at, ActionOrigin::Runtime));
        let state = State::create(Arc::new(schema()), root, selection).unwrap();
        Editor::from_state(config, state)
    }

    fn editor(caret: Option<Point>) -> Editor {
        editor_with(EditorConfig::default(), two_paragraphs(), caret)
    }

    fn text(editor: &Editor, id: &str) -> String {
        editor
            .state()
            .node(&id.into())
            .unwrap()
            .text()
            .unwrap_or_default()
            .to_owned()
    }

    fn head(editor: &Editor) -> Point {
        editor.state().selection().unwrap().head.point()
    }

    fn children(editor: &Editor) -> Vec<String> {
        let root = editor.state().root();
        root.child_ids().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_insert_text_and_invert() {
        let mut editor = editor(Some(Point::within("t1", 1)));
        let mut tr = editor.transaction().unwrap();
        tr.insert_text(&Point::within("t1", 1), "X").unwrap();
        let outcomes = editor.dispatch(tr).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(text(&editor, "t1"), "aXb");
        assert_eq!(head(&editor), Point::within("t1", 2));

        let commit = outcomes[0].commit().unwrap();
        let inverse = commit.inverse(editor.ids()).unwrap();
        editor.acknowledge_selection();

        let mut tr = editor.transaction_with(ActionOrigin::History).unwrap();
        for action in inverse {
            tr.push(action);
        }
        let outcomes = editor.dispatch(tr).unwrap();
        assert!(outcomes[0].is_ok());
        assert_eq!(text(&editor, "t1"), "ab");
        assert_eq!(head(&editor), Point::within("t1", 1));
        assert_eq!(editor.state().version(), 2);
    }

    #[test]
    fn test_move_and_invert() {
        let mut editor = editor(None);
        let mut tr = editor.transaction().unwrap();
        tr.move_node(Point::before("p1"), Point::after("p2"), "p1");
        let outcomes = editor.dispatch(tr).unwrap();
        assert_eq!(children(&editor), ["p2", "p1"]);

        let inverse = outcomes[0].commit().unwrap().inverse(editor.ids()).unwrap();
        let mut tr = editor.transaction().unwrap();
        for action in inverse {
            tr.push(action);
        }
        editor.dispatch(tr).unwrap();
        assert_eq!(children(&editor), ["p1", "p2"]);
    }

    #[test]
    fn test_failed_transaction_keeps_state() {
        let mut editor = editor(Some(Point::within("t1", 1)));
        let before = editor.state().clone();
        let mut tr = editor.transaction().unwrap();
        tr.set_content("t1", ContentJson::Text("zz".into()))
            .remove(Point::before("nope"), "nope");
        let outcomes = editor.dispatch(tr).unwrap();

        assert!(matches!(
            outcomes[0].result,
            Err(CarbonError::NodeNotFound { .. })
        ));
        assert!(Arc::ptr_eq(editor.state(), &before));
        assert!(!editor.is_awaiting_ack());
    }

    #[test]
    fn test_reentrancy() {
        let mut editor = editor(None);
        let tr = editor.transaction().unwrap();
        assert!(matches!(editor.transaction(), Err(CarbonError::Reentrancy)));
        drop(tr);

        let other = self::editor(None);
        let foreign = other.transaction().unwrap();
        assert!(matches!(
            editor.dispatch(foreign),
            Err(CarbonError::ForeignTransaction(_))
        ));
        // the foreign transaction was dropped, so its editor is free again
        assert!(other.transaction().is_ok());
        assert!(editor.transaction().is_ok());
    }

    #[test]
    fn test_normalize_fills_emptied_doc() {
        let mut editor = editor(None);
        let mut tr = editor.transaction().unwrap();
        tr.remove(Point::before("p1"), "p1")
            .remove(Point::before("p2"), "p2");
        assert!(editor.dispatch(tr).unwrap()[0].is_ok());
        assert!(children(&editor).is_empty());

        let outcomes = editor.tick();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].origin, ActionOrigin::Normalizer);
        assert_eq!(children(&editor), ["local-1"]);
        assert!(editor.tick().is_empty());
    }

    #[test]
    fn test_reject_policy() {
        let config = EditorConfig::default().with_policy(ContentPolicy::Reject);
        let mut editor = editor_with(config, two_paragraphs(), None);
        let mut tr = editor.transaction().unwrap();
        tr.remove(Point::before("p1"), "p1")
            .remove(Point::before("p2"), "p2");
        let outcomes = editor.dispatch(tr).unwrap();
        assert!(matches!(
            outcomes[0].result,
            Err(CarbonError::SchemaViolation { .. })
        ));
        assert_eq!(children(&editor), ["p1", "p2"]);
        assert!(editor.tick().is_empty());
    }

    #[test]
    fn test_host_ack_gates_queue() {
        let mut editor = editor(Some(Point::within("t1", 1)));
        let mut tr = editor.transaction().unwrap();
        tr.select(PointedSelection::caret(Point::within("t2", 1), ActionOrigin::UserInput));
        editor.dispatch(tr).unwrap();
        assert!(editor.is_awaiting_ack());

        let mut tr = editor.transaction().unwrap();
        tr.set_content("t2", ContentJson::Text("x".into()));
        assert!(editor.dispatch(tr).unwrap().is_empty());
        assert_eq!(editor.pending(), 1);

        // the host reports the selection it was asked to show
        editor.host_selection_changed(HostSelection::caret("p2", 1));
        let outcomes = editor.tick();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].origin, ActionOrigin::UserInput);
        assert_eq!(text(&editor, "t2"), "x");

        // a selection the user made on the host is echoed back
        editor.host_selection_changed(HostSelection::caret("t1", 2));
        let outcomes = editor.tick();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].origin, ActionOrigin::HostEcho);
        assert_eq!(head(&editor), Point::within("t1", 2));
        assert!(!editor.is_awaiting_ack());
    }

    #[test]
    fn test_held_inserts_all_land() {
        let mut editor = editor(Some(Point::within("t1", 1)));
        for (offset, typed) in [(1, "X"), (2, "Y"), (3, "Z")] {
            let mut tr = editor.transaction().unwrap();
            tr.insert_text(&Point::within("t1", offset), typed).unwrap();
            editor.dispatch(tr).unwrap();
        }
        // the first insert went through; the other two wait for the host
        assert_eq!(text(&editor, "t1"), "aXb");
        assert_eq!(editor.pending(), 2);

        let mut applied = 0;
        while editor.pending() > 0 {
            let outcomes = editor.acknowledge_selection();
            assert!(outcomes.iter().all(Outcome::is_ok));
            applied += outcomes.len();
        }
        assert_eq!(applied, 2);
        assert_eq!(text(&editor, "t1"), "aXYZb");
        assert_eq!(head(&editor), Point::within("t1", 4));
    }

    #[test]
    fn test_adapter_sees_effects() {
        let recorder = Recorder::default();
        let mut editor = editor(Some(Point::within("t1", 0))).with_adapter(recorder.clone());
        let mut tr = editor.transaction().unwrap();
        tr.insert_text(&Point::within("t1", 0), "_").unwrap();
        editor.dispatch(tr).unwrap();

        let painted = recorder.0.borrow();
        assert_eq!(painted.len(), 1);
        let content: Vec<_> = painted[0].content.iter().map(|id| id.to_string()).collect();
        assert_eq!(content, ["t1"]);
        assert!(painted[0].sync_selection);
    }
}
