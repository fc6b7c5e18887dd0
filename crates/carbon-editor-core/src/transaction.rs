//! Batches of actions applied atomically.
//!
//! A [`Transaction`] only records actions; nothing touches the document
//! until the editor dispatches it and the manager runs the batch through a
//! single draft. Either every action applies and the draft commits, or the
//! draft is dropped and the editor keeps its previous state.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use smol_str::SmolStr;
use web_time::Instant;

use crate::action::{ActionKind, CarbonAction};
use crate::effects::Effects;
use crate::error::{CarbonError, Result};
use crate::id::{IdGenerator, NodeId, TxId};
use crate::node::{ContentJson, NodeJson};
use crate::point::{Point, PointAt};
use crate::props::Props;
use crate::selection::PointedSelection;
use crate::state::State;
use crate::types::ActionOrigin;

/// Marks the owning editor as having a transaction open.
#[derive(Debug)]
pub(crate) struct OpenGuard(Rc<Cell<bool>>);

impl OpenGuard {
    pub(crate) fn acquire(flag: &Rc<Cell<bool>>) -> Result<Self> {
        if flag.get() {
            return Err(CarbonError::Reentrancy);
        }
        flag.set(true);
        Ok(Self(flag.clone()))
    }

    pub(crate) fn belongs_to(&self, flag: &Rc<Cell<bool>>) -> bool {
        Rc::ptr_eq(&self.0, flag)
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// An open batch of edits against the snapshot it was opened on.
///
/// Mutation methods chain and never fail; resolution errors surface when the
/// batch is applied. Dropping the transaction without dispatching it
/// discards it and lets the editor open another.
#[derive(Debug)]
pub struct Transaction {
    id: TxId,
    origin: ActionOrigin,
    snapshot: Arc<State>,
    ids: IdGenerator,
    actions: Vec<CarbonAction>,
    guard: OpenGuard,
}

impl Transaction {
    pub(crate) fn open(
        guard: OpenGuard,
        snapshot: Arc<State>,
        ids: IdGenerator,
        origin: ActionOrigin,
    ) -> Self {
        let id = ids.tx_id();
        tracing::trace!(target: "carbon::tx", tx = %id, %origin, "open");
        Self {
            id,
            origin,
            snapshot,
            ids,
            actions: Vec::new(),
            guard,
        }
    }

    pub fn id(&self) -> TxId {
        self.id
    }

    pub fn origin(&self) -> ActionOrigin {
        self.origin
    }

    /// State the transaction was opened on.
    pub fn snapshot(&self) -> &Arc<State> {
        &self.snapshot
    }

    /// Id source shared with the editor, for building node payloads.
    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    pub fn actions(&self) -> &[CarbonAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Append a prebuilt action, e.g. one produced by [`CarbonAction::inverse`].
    /// It is re-tagged with this transaction's origin.
    pub fn push(&mut self, action: CarbonAction) -> &mut Self {
        self.actions.push(action.with_origin(self.origin));
        self
    }

    fn add(&mut self, kind: ActionKind) -> &mut Self {
        let action = CarbonAction::new(self.ids.action_id(), self.origin, kind);
        self.actions.push(action);
        self
    }

    // === Structure ===

    pub fn insert(&mut self, at: Point, node: NodeJson) -> &mut Self {
        let id = node.id.clone();
        self.add(ActionKind::Insert { at, id, node })
    }

    pub fn remove(&mut self, at: Point, id: impl Into<NodeId>) -> &mut Self {
        self.add(ActionKind::Remove {
            at,
            id: id.into(),
            node: None,
        })
    }

    pub fn move_node(&mut self, from: Point, to: Point, id: impl Into<NodeId>) -> &mut Self {
        self.add(ActionKind::Move {
            from,
            to,
            id: id.into(),
        })
    }

    // === Node values ===

    pub fn change_name(&mut self, id: impl Into<NodeId>, to: impl Into<SmolStr>) -> &mut Self {
        self.add(ActionKind::ChangeName {
            id: id.into(),
            from: None,
            to: to.into(),
        })
    }

    pub fn update_props(&mut self, id: impl Into<NodeId>, patch: Props) -> &mut Self {
        self.add(ActionKind::UpdateProps {
            id: id.into(),
            before: None,
            after: patch,
        })
    }

    pub fn set_content(&mut self, id: impl Into<NodeId>, content: ContentJson) -> &mut Self {
        self.add(ActionKind::SetContent {
            id: id.into(),
            before: None,
            after: content,
        })
    }

    // === Selection ===

    pub fn select(&mut self, selection: PointedSelection) -> &mut Self {
        self.add(ActionKind::Select {
            before: None,
            after: Some(selection),
        })
    }

    pub fn clear_selection(&mut self) -> &mut Self {
        self.add(ActionKind::Select {
            before: None,
            after: None,
        })
    }

    // === Helpers ===

    /// Insert `text` at `at` and put the caret after it.
    ///
    /// `at` is resolved against the opening snapshot and lowered to its text
    /// leaf. The insertion itself is a splice applied to the leaf's text as
    /// it is when the transaction runs, so inserts queued behind each other
    /// all land. In an empty focusable block a new text leaf is created to
    /// hold `text`.
    pub fn insert_text(&mut self, at: &Point, text: &str) -> Result<&mut Self> {
        let map = self.snapshot.map();
        // Offsets into a text leaf are checked when the splice runs, against
        // text that may be longer than the snapshot's.
        let (leaf, offset) = match map.get(&at.node_id) {
            Some(node) if node.is_text() && at.at == PointAt::Within => (node, at.offset),
            _ => {
                let pin = at.pin(map)?.down(map)?;
                (pin.node().clone(), pin.offset())
            }
        };
        let origin = self.origin;
        let typed = text.chars().count();

        if leaf.is_text() {
            let caret = Point::within(leaf.id().clone(), offset + typed);
            return Ok(self
                .add(ActionKind::SpliceText {
                    id: leaf.id().clone(),
                    offset,
                    removed: String::new(),
                    inserted: text.to_owned(),
                })
                .select(PointedSelection::caret(caret, origin)));
        }
        if leaf.is_atom() || !leaf.is_focusable() || !leaf.is_empty() {
            return Err(CarbonError::invalid_content(leaf.id(), "no text leaf at this point"));
        }

        let fresh = self.snapshot.schema().create_default("text", self.ids.node_id())?;
        let node = NodeJson::text(fresh.id().clone(), fresh.name().clone(), text);
        let caret = Point::within(fresh.id().clone(), typed);
        Ok(self
            .insert(Point::within(leaf.id().clone(), 0), node)
            .select(PointedSelection::caret(caret, origin)))
    }

    /// Close the transaction without applying it.
    pub fn discard(self) {
        tracing::trace!(target: "carbon::tx", tx = %self.id, "discard");
    }

    pub(crate) fn belongs_to(&self, flag: &Rc<Cell<bool>>) -> bool {
        self.guard.belongs_to(flag)
    }

    /// Release the editor and keep only what the manager needs.
    pub(crate) fn into_queued(self) -> QueuedTransaction {
        QueuedTransaction {
            id: self.id,
            origin: self.origin,
            actions: self.actions,
        }
    }
}

/// A closed transaction waiting for its turn.
#[derive(Clone, Debug, PartialEq)]
pub struct QueuedTransaction {
    pub id: TxId,
    pub origin: ActionOrigin,
    pub actions: Vec<CarbonAction>,
}

impl QueuedTransaction {
    pub fn new(id: TxId, origin: ActionOrigin, actions: Vec<CarbonAction>) -> Self {
        Self {
            id,
            origin,
            actions,
        }
    }
}

/// A successfully applied transaction.
#[derive(Clone, Debug)]
pub struct Commit {
    pub tx: TxId,
    pub origin: ActionOrigin,
    pub state: Arc<State>,
    /// The actions as executed, with their captures filled in.
    pub actions: Vec<CarbonAction>,
    pub effects: Effects,
    /// When the commit was applied, for history grouping by time.
    pub committed_at: Instant,
}

impl Commit {
    /// Actions that revert this commit, in the order they must run.
    pub fn inverse(&self, ids: &IdGenerator) -> Result<Vec<CarbonAction>> {
        self.actions
            .iter()
            .rev()
            .map(|action| action.inverse(ids.action_id()))
            .collect()
    }
}
