//! Immutable editor snapshots.

use std::sync::Arc;

use crate::changes::StateChanges;
use crate::config::EditorConfig;
use crate::draft::Draft;
use crate::error::Result;
use crate::id::NodeId;
use crate::node::{Node, NodeJson};
use crate::node_map::NodeMap;
use crate::schema::Schema;
use crate::selection::{PinnedSelection, PointedSelection};

/// One committed snapshot of the document.
///
/// Created by [`State::create`] for the initial document and by
/// [`Draft::commit`] afterwards; never mutated once built.
#[derive(Clone, Debug)]
pub struct State {
    schema: Arc<Schema>,
    root: Arc<Node>,
    map: Arc<NodeMap>,
    selection: Option<PinnedSelection>,
    /// Changes that produced this state from `previous`.
    changes: Arc<StateChanges>,
    previous: Option<Arc<State>>,
    version: u64,
    /// Number of snapshots reachable through `previous`.
    history_len: usize,
}

impl State {
    /// Initial snapshot over a whole document.
    pub fn create(
        schema: Arc<Schema>,
        root: Arc<Node>,
        selection: Option<PointedSelection>,
    ) -> Result<Arc<State>> {
        let mut map = NodeMap::from_root(root.clone());
        map.freeze();
        let selection = selection.map(|sel| sel.pin(&map)).transpose()?;
        Ok(Arc::new(State {
            schema,
            root,
            map: Arc::new(map),
            selection,
            changes: StateChanges::new().freeze(),
            previous: None,
            version: 0,
            history_len: 0,
        }))
    }

    /// Initial snapshot from the wire form of the root node.
    pub fn from_json(
        schema: Arc<Schema>,
        root: &NodeJson,
        selection: Option<PointedSelection>,
    ) -> Result<Arc<State>> {
        let root = Arc::new(schema.node_from_json(root)?);
        Self::create(schema, root, selection)
    }

    /// Successor of `previous`, keeping at most `depth` earlier snapshots.
    pub(crate) fn chain(
        previous: Arc<State>,
        root: Arc<Node>,
        map: NodeMap,
        selection: Option<PinnedSelection>,
        changes: Arc<StateChanges>,
        depth: usize,
    ) -> Arc<State> {
        let version = previous.version + 1;
        let schema = previous.schema.clone();
        let previous = trimmed(&previous, depth);
        let history_len = previous.as_ref().map_or(0, |p| p.history_len + 1);
        Arc::new(State {
            schema,
            root,
            map: Arc::new(map),
            selection,
            changes,
            previous,
            version,
            history_len,
        })
    }

    /// Open a draft over this snapshot.
    pub fn draft(self: &Arc<Self>, config: &EditorConfig) -> Draft {
        Draft::new(self.clone(), config)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    pub fn map(&self) -> &Arc<NodeMap> {
        &self.map
    }

    pub fn node(&self, id: &NodeId) -> Result<Arc<Node>> {
        self.map.node(id)
    }

    pub fn selection(&self) -> Option<&PinnedSelection> {
        self.selection.as_ref()
    }

    pub fn changes(&self) -> &Arc<StateChanges> {
        &self.changes
    }

    pub fn previous(&self) -> Option<&Arc<State>> {
        self.previous.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }
}

/// `state` with its history cut to `keep` snapshots in total.
fn trimmed(state: &Arc<State>, keep: usize) -> Option<Arc<State>> {
    if keep == 0 {
        return None;
    }
    if state.history_len < keep {
        return Some(state.clone());
    }
    let previous = state.previous.as_ref().and_then(|p| trimmed(p, keep - 1));
    let history_len = previous.as_ref().map_or(0, |p| p.history_len + 1);
    Some(Arc::new(State {
        previous,
        history_len,
        ..State::clone(state)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ContentJson;
    use crate::point::Point;
    use crate::test_support::{schema, two_paragraphs};
    use crate::types::ActionOrigin;

    fn initial() -> Arc<State> {
        State::create(
            Arc::new(schema()),
            two_paragraphs(),
            Some(PointedSelection::caret(Point::within("t1", 1), ActionOrigin::Runtime)),
        )
        .unwrap()
    }

    fn edit(state: &Arc<State>, config: &EditorConfig, text: &str) -> Arc<State> {
        let mut draft = state.draft(config);
        draft
            .update_content(&"t2".into(), &ContentJson::Text(text.into()))
            .unwrap();
        draft.commit().unwrap()
    }

    #[test]
    fn test_create() {
        let state = initial();
        assert_eq!(state.version(), 0);
        assert!(state.previous().is_none());
        assert!(state.map().is_frozen());
        assert!(state.changes().is_empty());
        assert_eq!(state.selection().unwrap().head.point(), Point::within("t1", 1));
        assert_eq!(state.node(&"t2".into()).unwrap().text(), Some("cd"));
    }

    #[test]
    fn test_create_rejects_unresolvable_selection() {
        let result = State::create(
            Arc::new(schema()),
            two_paragraphs(),
            Some(PointedSelection::caret(Point::within("nope", 0), ActionOrigin::Runtime)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_history_is_capped() {
        let config = EditorConfig {
            history_depth: 2,
            ..EditorConfig::default()
        };
        let mut state = initial();
        for text in ["1", "2", "3", "4"] {
            state = edit(&state, &config, text);
        }
        assert_eq!(state.version(), 4);
        assert_eq!(state.history_len(), 2);

        let prev = state.previous().unwrap();
        assert_eq!(prev.node(&"t2".into()).unwrap().text(), Some("3"));
        let prev = prev.previous().unwrap();
        assert_eq!(prev.version(), 2);
        assert!(prev.previous().is_none());
    }

    #[test]
    fn test_zero_depth_keeps_no_history() {
        let config = EditorConfig {
            history_depth: 0,
            ..EditorConfig::default()
        };
        let state = edit(&initial(), &config, "x");
        assert!(state.previous().is_none());
        assert_eq!(state.version(), 1);
    }
}
