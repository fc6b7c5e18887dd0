//! What a commit asks the rendering surface to do.

use std::collections::BTreeSet;

use crate::id::NodeId;
use crate::selection::PointedSelection;
use crate::state::State;

/// Per-commit partition of the change log into paint buckets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Effects {
    /// Nodes to re-render: structure, text or type changed.
    pub content: BTreeSet<NodeId>,
    /// Nodes whose attributes changed but whose content did not.
    pub node_state: BTreeSet<NodeId>,
    /// Nodes gone from the document.
    pub removed: BTreeSet<NodeId>,
    /// The host selection must be re-applied.
    pub sync_selection: bool,
}

impl Effects {
    /// Effects of going from `before` to `after`, where `after` was
    /// committed on top of `before`.
    pub fn between(before: &State, after: &State) -> Self {
        let changes = after.changes();
        let alive = |id: &NodeId| after.map().contains(id);

        let content = changes.content_ids().into_iter().filter(alive).collect();
        let node_state = changes.node_state_ids().into_iter().filter(alive).collect();
        let removed = changes.removed_ids();

        let points = |state: &State| -> Option<PointedSelection> {
            state.selection().map(|sel| sel.unpin().with_origin(Default::default()))
        };
        let sync_selection = changes.touches_selection() || points(before) != points(after);

        Self {
            content,
            node_state,
            removed,
            sync_selection,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
            && self.node_state.is_empty()
            && self.removed.is_empty()
            && !self.sync_selection
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::EditorConfig;
    use crate::node::ContentJson;
    use crate::point::Point;
    use crate::props::{Namespace, Props};
    use crate::test_support::{schema, two_paragraphs};
    use crate::types::ActionOrigin;

    fn ids(set: &BTreeSet<NodeId>) -> Vec<String> {
        set.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_buckets() {
        let before = State::create(
            Arc::new(schema()),
            two_paragraphs(),
            Some(PointedSelection::caret(Point::within("t2", 0), ActionOrigin::Runtime)),
        )
        .unwrap();
        let mut draft = before.draft(&EditorConfig::default());
        draft
            .update_content(&"t2".into(), &ContentJson::Text("xcd".into()))
            .unwrap();
        draft
            .update_props(
                &"p2".into(),
                &Props::new().with(Namespace::Host, "class", json!("active")),
            )
            .unwrap();
        draft.remove(&"p1".into()).unwrap();
        let after = draft.commit().unwrap();

        let effects = Effects::between(&before, &after);
        assert_eq!(ids(&effects.content), ["doc", "t2"]);
        assert_eq!(ids(&effects.node_state), ["p2"]);
        assert_eq!(ids(&effects.removed), ["p1"]);
        assert!(!effects.sync_selection);
        assert!(!effects.is_empty());
    }

    #[test]
    fn test_selection_only() {
        let before = State::create(Arc::new(schema()), two_paragraphs(), None).unwrap();
        let mut draft = before.draft(&EditorConfig::default());
        draft.update_selection(Some(PointedSelection::caret(
            Point::within("t1", 2),
            ActionOrigin::UserInput,
        )));
        let after = draft.commit().unwrap();

        let effects = Effects::between(&before, &after);
        assert!(effects.sync_selection);
        assert!(effects.content.is_empty());

        let unchanged = before.draft(&EditorConfig::default()).commit().unwrap();
        assert!(Effects::between(&before, &unchanged).is_empty());
    }
}
