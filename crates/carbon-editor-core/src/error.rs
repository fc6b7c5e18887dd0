//! Error types for document and transaction operations.

use miette::Diagnostic;
use smol_str::SmolStr;

use crate::id::{ActionId, NodeId};

/// Errors raised by the document model and the edit engine.
///
/// Failures during a transaction abort the whole transaction; the editor's
/// committed state is left exactly as it was.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum CarbonError {
    /// A referenced node id is absent (stale reference after a concurrent edit).
    #[error("node {id} not found")]
    #[diagnostic(code(carbon::node_not_found))]
    NodeNotFound { id: NodeId },

    /// A selection endpoint could not be pinned against the new snapshot.
    #[error("selection at {node} cannot be resolved: {reason}")]
    #[diagnostic(
        code(carbon::unresolvable_selection),
        help("an edit that strands the cursor must also move the selection")
    )]
    UnresolvableSelection { node: NodeId, reason: SmolStr },

    /// A second transaction was opened while one is still outstanding.
    #[error("a transaction is already open on this editor")]
    #[diagnostic(code(carbon::reentrancy))]
    Reentrancy,

    /// `inverse()` was requested for an action that has not run yet.
    #[error("action {0} has not been executed; its inverse is unknown")]
    #[diagnostic(code(carbon::premature_inverse))]
    PrematureInverse(ActionId),

    /// Write attempted on a frozen node map.
    #[error("node map is frozen")]
    #[diagnostic(code(carbon::frozen))]
    FrozenNodeMap,

    /// The children of a node do not satisfy its content rule.
    #[error("children of {name} {id} violate its content rule")]
    #[diagnostic(code(carbon::schema_violation))]
    SchemaViolation { id: NodeId, name: SmolStr },

    /// No node spec registered under this name.
    #[error("unknown node type: {0}")]
    #[diagnostic(code(carbon::unknown_type))]
    UnknownNodeType(SmolStr),

    /// Offset beyond the focus size of a node.
    #[error("offset {offset} out of range for {id} (size {size})")]
    #[diagnostic(code(carbon::invalid_offset))]
    InvalidOffset {
        id: NodeId,
        offset: usize,
        size: usize,
    },

    /// A structural point that cannot host a node.
    #[error("cannot place a node {relation} {id}")]
    #[diagnostic(code(carbon::invalid_placement))]
    InvalidPlacement { id: NodeId, relation: SmolStr },

    /// Content kind does not match the node kind (text on a block, etc).
    #[error("invalid content for {id}: {reason}")]
    #[diagnostic(code(carbon::invalid_content))]
    InvalidContent { id: NodeId, reason: SmolStr },

    /// Transaction dispatched to an editor that did not open it.
    #[error("transaction {0} does not belong to this editor")]
    #[diagnostic(code(carbon::foreign_transaction))]
    ForeignTransaction(u64),

    /// Serialization/deserialization error
    #[error(transparent)]
    #[diagnostic(code(carbon::json))]
    Json(#[from] serde_json::Error),
}

impl CarbonError {
    pub(crate) fn not_found(id: &NodeId) -> Self {
        CarbonError::NodeNotFound { id: id.clone() }
    }

    pub(crate) fn unresolvable(node: &NodeId, reason: impl Into<SmolStr>) -> Self {
        CarbonError::UnresolvableSelection {
            node: node.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_content(id: &NodeId, reason: impl Into<SmolStr>) -> Self {
        CarbonError::InvalidContent {
            id: id.clone(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a programmer error rather than a data condition.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            CarbonError::Reentrancy
                | CarbonError::PrematureInverse(_)
                | CarbonError::FrozenNodeMap
                | CarbonError::ForeignTransaction(_)
        )
    }
}

pub type Result<T, E = CarbonError> = std::result::Result<T, E>;
