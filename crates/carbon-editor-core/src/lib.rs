//! carbon-editor-core: document model and edit engine for a structured
//! rich-text editor, with no rendering dependencies.
//!
//! This crate provides:
//! - `Node` trees validated by a `Schema`, indexed by an overlay `NodeMap`
//! - `Point`/`Pin` addressing and two-ended selections
//! - `Draft` copy-on-write editing sealed into immutable `State` snapshots
//! - `CarbonAction` primitives that capture their own inverse
//! - `Editor` transactions, queueing, normalization and render `Effects`

pub mod action;
pub mod changes;
pub mod config;
pub mod draft;
pub mod editor;
pub mod effects;
pub mod error;
pub mod id;
pub mod manager;
pub mod node;
pub mod node_map;
pub mod normalize;
pub mod pin;
pub mod point;
pub mod props;
pub mod schema;
pub mod selection;
pub mod state;
#[cfg(feature = "telemetry")]
pub mod telemetry;
pub mod transaction;
pub mod types;

#[cfg(test)]
mod test_support;

pub use action::{ActionKind, CarbonAction};
pub use changes::{Change, StateChanges};
pub use config::{ContentPolicy, EditorConfig};
pub use draft::Draft;
pub use editor::{Editor, RenderAdapter};
pub use effects::Effects;
pub use error::{CarbonError, Result};
pub use id::{ActionId, IdGenerator, NodeId, TxId};
pub use manager::{Outcome, TransactionManager};
pub use node::{ContentJson, Node, NodeContent, NodeJson, NodeKind};
pub use node_map::NodeMap;
pub use normalize::Normalizer;
pub use pin::Pin;
pub use point::{Point, PointAt, Slot};
pub use props::{Namespace, Props};
pub use schema::{ContentMatcher, MatchStatus, NodeSpec, RepeatMatcher, Schema};
pub use selection::{PinnedSelection, PointedSelection};
pub use smol_str::SmolStr;
pub use state::State;
pub use transaction::{Commit, QueuedTransaction, Transaction};
pub use types::{ActionOrigin, HostPosition, HostSelection};
