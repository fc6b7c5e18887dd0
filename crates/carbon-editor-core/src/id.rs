//! Identifiers for nodes, actions and transactions.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};

/// Opaque, totally ordered node identifier.
///
/// The null id is a reserved sentinel meaning "no node". It sorts before
/// every real id and never equals one, including the empty-string id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Option<SmolStr>);

impl NodeId {
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(Some(id.into()))
    }

    /// The "no node" sentinel.
    pub const fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(id) => f.write_str(id),
            None => f.write_str("<null>"),
        }
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<SmolStr> for NodeId {
    fn from(s: SmolStr) -> Self {
        Self::new(s)
    }
}

/// Identifier of one action within an editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionId(pub u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// Identifier of one transaction within an editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// Per-editor monotonic counters.
///
/// Cloning shares the counters, so a transaction handed a clone keeps
/// drawing from the same sequence as its editor. Two editors never share one.
#[derive(Clone, Debug)]
pub struct IdGenerator {
    session: SmolStr,
    nodes: Rc<Cell<u64>>,
    actions: Rc<Cell<u64>>,
    transactions: Rc<Cell<u64>>,
}

impl IdGenerator {
    pub fn new(session: impl Into<SmolStr>) -> Self {
        Self {
            session: session.into(),
            nodes: Rc::new(Cell::new(0)),
            actions: Rc::new(Cell::new(0)),
            transactions: Rc::new(Cell::new(0)),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Generate the next node id (`{session}-{n}`).
    pub fn node_id(&self) -> NodeId {
        let n = bump(&self.nodes);
        NodeId::new(format_smolstr!("{}-{}", self.session, n))
    }

    pub fn action_id(&self) -> ActionId {
        ActionId(bump(&self.actions))
    }

    pub fn tx_id(&self) -> TxId {
        TxId(bump(&self.transactions))
    }
}

fn bump(counter: &Cell<u64>) -> u64 {
    let next = counter.get() + 1;
    counter.set(next);
    next
}
