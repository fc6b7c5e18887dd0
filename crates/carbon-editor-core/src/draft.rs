//! Single-use mutable builder over one snapshot.
//!
//! Every write goes through [`Draft::mutable`]: the node is copied the first
//! time a draft touches it and edited in place after that. Parents are not
//! rewritten eagerly. Instead [`Draft::prepare`] walks the changed ids
//! deepest-first and rebuilds each affected parent exactly once from the
//! current children in the draft's map, so only the paths from edited nodes
//! to the root get new values and every other subtree stays shared with the
//! source snapshot.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use smol_str::SmolStr;

use crate::changes::{Change, StateChanges};
use crate::config::{ContentPolicy, EditorConfig};
use crate::error::{CarbonError, Result};
use crate::id::NodeId;
use crate::node::{ContentJson, Node, NodeContent, NodeJson};
use crate::node_map::NodeMap;
use crate::point::{Point, Slot};
use crate::props::Props;
use crate::schema::{MatchStatus, Schema};
use crate::selection::PointedSelection;
use crate::state::State;

pub struct Draft {
    source: Arc<State>,
    map: NodeMap,
    changes: StateChanges,
    selection: Option<PointedSelection>,
    /// Ids whose value this draft changed directly, pending bubbling.
    dirty: HashSet<NodeId>,
    /// Parents whose child sequence changed.
    structural: BTreeSet<NodeId>,
    history_depth: usize,
    policy: ContentPolicy,
}

impl Draft {
    pub(crate) fn new(source: Arc<State>, config: &EditorConfig) -> Self {
        let map = NodeMap::derive(source.map(), config.max_map_layers);
        let selection = source.selection().map(|sel| sel.unpin());
        Self {
            source,
            map,
            changes: StateChanges::new(),
            selection,
            dirty: HashSet::new(),
            structural: BTreeSet::new(),
            history_depth: config.history_depth,
            policy: config.content_policy,
        }
    }

    pub fn source(&self) -> &Arc<State> {
        &self.source
    }

    pub fn schema(&self) -> &Schema {
        self.source.schema()
    }

    /// The working map. Parent values in it may hold stale child `Arc`s
    /// until the draft is prepared; use [`NodeMap::children`] to read
    /// current children.
    pub fn map(&self) -> &NodeMap {
        &self.map
    }

    pub fn changes(&self) -> &StateChanges {
        &self.changes
    }

    /// Pending selection, unresolved until commit.
    pub fn selection(&self) -> Option<&PointedSelection> {
        self.selection.as_ref()
    }

    /// Wire form of a node's current subtree in this draft.
    pub fn node_json(&self, id: &NodeId) -> Result<NodeJson> {
        let node = self.map.node(id)?;
        let children = node
            .child_ids()
            .map(|child| self.node_json(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(NodeJson {
            id: id.clone(),
            name: node.name().clone(),
            text: node.text().map(str::to_owned),
            children,
            props: node.props().clone(),
        })
    }

    fn content_json(&self, node: &Node) -> Result<ContentJson> {
        Ok(match node.text() {
            Some(text) => ContentJson::Text(text.to_owned()),
            None => ContentJson::Children(
                node.child_ids()
                    .map(|child| self.node_json(child))
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }

    // === Copy-on-write core ===

    /// Edit the draft's private copy of `id`, copying it on first touch.
    fn mutable<R>(&mut self, id: &NodeId, f: impl FnOnce(&mut Node) -> R) -> Result<R> {
        let mut node = match self.map.take_local(id)? {
            Some(node) => node,
            None => self.map.node(id)?,
        };
        let out = f(Arc::make_mut(&mut node));
        self.map.set(node)?;
        self.dirty.insert(id.clone());
        Ok(out)
    }

    // === Primitive operations ===

    /// Build `json` and attach it at `at`. Returns the slot it landed in.
    pub fn insert(&mut self, at: &Point, json: &NodeJson) -> Result<Slot> {
        let node = Arc::new(self.schema().node_from_json(json)?);
        if let Some(taken) = node.descendants().iter().find(|n| self.map.contains(n.id())) {
            return Err(CarbonError::invalid_content(taken.id(), "id already in document"));
        }
        let slot = at.slot(&self.map)?;
        self.mutable(&slot.parent, |parent| parent.insert_child(slot.index, node.clone()))?;
        self.map.insert_subtree(&slot.parent, &node)?;
        self.structural.insert(slot.parent.clone());
        tracing::debug!(target: "carbon::draft", id = %node.id(), parent = %slot.parent, index = slot.index, "insert");
        self.changes.push(Change::Inserted {
            slot: slot.clone(),
            node: json.clone(),
        });
        Ok(slot)
    }

    /// Detach and delete a subtree. Returns where it was and what it held.
    pub fn remove(&mut self, id: &NodeId) -> Result<(Slot, NodeJson)> {
        let slot = self.slot_of(id)?;
        let json = self.node_json(id)?;
        self.mutable(&slot.parent, |parent| parent.remove_child(id))?;
        let removed = self.map.remove_subtree(id)?;
        self.structural.insert(slot.parent.clone());
        tracing::debug!(target: "carbon::draft", %id, parent = %slot.parent, removed = removed.len(), "remove");
        self.changes.push(Change::Removed {
            slot: slot.clone(),
            node: json.clone(),
        });
        Ok((slot, json))
    }

    /// Re-attach `id` at `to`. The target is resolved after detaching.
    /// Returns the original and the new slot.
    pub fn move_node(&mut self, id: &NodeId, to: &Point) -> Result<(Slot, Slot)> {
        let target = &to.node_id;
        if target == id || self.map.ancestors(target).iter().any(|a| a.id() == id) {
            return Err(CarbonError::InvalidPlacement {
                id: id.clone(),
                relation: "inside itself".into(),
            });
        }
        let from = self.slot_of(id)?;
        // Relinked from the map in prepare.
        let node = match self.source.map().get(id) {
            Some(node) => node,
            None => self.map.node(id)?,
        };
        self.mutable(&from.parent, |parent| parent.remove_child(id))?;
        let slot = to.slot(&self.map)?;
        self.mutable(&slot.parent, |parent| parent.insert_child(slot.index, node))?;
        self.map.set_parent(id, &slot.parent)?;
        self.structural.insert(from.parent.clone());
        self.structural.insert(slot.parent.clone());
        tracing::debug!(target: "carbon::draft", %id, from = %from.point(), to = %slot.point(), "move");
        self.changes.push(Change::Moved {
            id: id.clone(),
            from: from.clone(),
            to: slot.clone(),
        });
        Ok((from, slot))
    }

    /// Change a node's type. Returns the previous type name.
    pub fn change_name(&mut self, id: &NodeId, name: &SmolStr) -> Result<SmolStr> {
        let kind = self.schema().spec(name)?.kind;
        let current = self.map.node(id)?;
        if kind.text != current.is_text() {
            return Err(CarbonError::invalid_content(
                id,
                format!("{} and {} hold different content", current.name(), name),
            ));
        }
        drop(current);
        let from = self.mutable(id, |node| {
            let from = node.name().clone();
            node.set_name(name.clone());
            node.set_kind(kind);
            from
        })?;
        self.structural.insert(id.clone());
        if let Some(parent) = self.map.parent_id(id) {
            self.structural.insert(parent);
        }
        self.changes.push(Change::Renamed {
            id: id.clone(),
            from: from.clone(),
            to: name.clone(),
        });
        Ok(from)
    }

    /// Replace text or children wholesale. Returns the previous content.
    pub fn update_content(&mut self, id: &NodeId, content: &ContentJson) -> Result<ContentJson> {
        let node = self.map.node(id)?;
        if node.is_atom() {
            return Err(CarbonError::invalid_content(id, "atoms have no editable content"));
        }
        let before = self.content_json(&node)?;
        let name = node.name().clone();
        let is_text = node.is_text();
        let old_children: Vec<NodeId> = node.child_ids().cloned().collect();
        drop(node);

        match content {
            ContentJson::Text(text) => {
                if !is_text {
                    return Err(CarbonError::invalid_content(id, "text content on a block"));
                }
                self.mutable(id, |node| node.set_content(NodeContent::Text(text.clone())))?;
            }
            ContentJson::Children(_) => {
                if is_text {
                    return Err(CarbonError::invalid_content(id, "children on a text node"));
                }
                let built = self.schema().content_from_json(&name, id, content)?;
                for child in &old_children {
                    self.map.remove_subtree(child)?;
                }
                for child in built.children() {
                    if let Some(taken) = child.descendants().iter().find(|n| self.map.contains(n.id())) {
                        return Err(CarbonError::invalid_content(taken.id(), "id already in document"));
                    }
                    self.map.insert_subtree(id, child)?;
                }
                self.mutable(id, |node| node.set_content(built))?;
                self.structural.insert(id.clone());
            }
        }
        tracing::trace!(target: "carbon::draft", %id, "update content");
        self.changes.push(Change::ContentSet {
            id: id.clone(),
            before: before.clone(),
            after: content.clone(),
        });
        Ok(before)
    }

    /// Replace `removed` at char `offset` of a text leaf with `inserted`,
    /// against the leaf's text in this draft.
    pub fn splice_text(&mut self, id: &NodeId, offset: usize, removed: &str, inserted: &str) -> Result<()> {
        let node = self.map.node(id)?;
        let current = node
            .text()
            .ok_or_else(|| CarbonError::invalid_content(id, "not a text node"))?;
        let size = current.chars().count();
        let end = offset + removed.chars().count();
        if end > size {
            return Err(CarbonError::InvalidOffset {
                id: id.clone(),
                offset: end,
                size,
            });
        }
        let byte = |at: usize| current.char_indices().nth(at).map_or(current.len(), |(i, _)| i);
        let (start, stop) = (byte(offset), byte(end));
        if &current[start..stop] != removed {
            return Err(CarbonError::invalid_content(id, "spliced range does not match"));
        }
        let mut next = String::with_capacity(current.len() - removed.len() + inserted.len());
        next.push_str(&current[..start]);
        next.push_str(inserted);
        next.push_str(&current[stop..]);
        drop(node);

        tracing::trace!(target: "carbon::draft", %id, offset, removed = removed.len(), inserted = inserted.len(), "splice");
        self.update_content(id, &ContentJson::Text(next))?;
        Ok(())
    }

    /// Merge an attribute patch. Returns the patch that reverts it.
    pub fn update_props(&mut self, id: &NodeId, patch: &Props) -> Result<Props> {
        let revert = self.mutable(id, |node| {
            let revert = node.props().revert_patch(patch);
            node.props_mut().merge(patch);
            revert
        })?;
        self.changes.push(Change::PropsUpdated {
            id: id.clone(),
            patch: patch.clone(),
            revert: revert.clone(),
        });
        Ok(revert)
    }

    /// Replace the pending selection. Returns the previous one.
    pub fn update_selection(&mut self, selection: Option<PointedSelection>) -> Option<PointedSelection> {
        let before = std::mem::replace(&mut self.selection, selection.clone());
        self.changes.push(Change::SelectionSet {
            before: before.clone(),
            after: selection,
        });
        before
    }

    fn slot_of(&self, id: &NodeId) -> Result<Slot> {
        self.map.node(id)?;
        let parent = self.map.parent(id).ok_or_else(|| CarbonError::InvalidPlacement {
            id: id.clone(),
            relation: "at the root".into(),
        })?;
        let index = parent.index_of(id).ok_or_else(|| CarbonError::not_found(id))?;
        Ok(Slot::new(parent.id().clone(), index))
    }

    // === Commit ===

    /// Bubble direct changes up to the root, rebuilding each affected parent
    /// once from its current children.
    fn prepare(&mut self) -> Result<()> {
        let mut pending = BTreeSet::new();
        for id in std::mem::take(&mut self.dirty) {
            if !self.map.contains(&id) {
                continue;
            }
            let parent = self.map.parent_id(&id).unwrap_or_default();
            pending.insert((self.map.depth(&id), parent, id));
        }

        let mut rebuilt = 0usize;
        while let Some((depth, parent, _)) = pending.pop_last() {
            while pending
                .last()
                .is_some_and(|(d, p, _)| *d == depth && *p == parent)
            {
                pending.pop_last();
            }
            if parent.is_null() {
                continue;
            }
            let children: Vec<Arc<Node>> = self
                .map
                .node(&parent)?
                .child_ids()
                .filter_map(|child| self.map.get(child))
                .collect();
            self.mutable(&parent, |node| node.set_content(NodeContent::Children(children)))?;
            rebuilt += 1;
            let grandparent = self.map.parent_id(&parent).unwrap_or_default();
            pending.insert((depth - 1, grandparent, parent));
        }
        self.dirty.clear();
        tracing::trace!(target: "carbon::draft", rebuilt, "prepared draft");

        if self.policy == ContentPolicy::Reject {
            self.check_content()?;
        }
        Ok(())
    }

    fn check_content(&self) -> Result<()> {
        for id in &self.structural {
            let Some(node) = self.map.get(id) else {
                continue;
            };
            if node.is_text() {
                continue;
            }
            let names: Vec<SmolStr> = self
                .map
                .children(id)?
                .iter()
                .map(|child| child.name().clone())
                .collect();
            if self.schema().match_children(node.name(), &names)? != MatchStatus::Complete {
                return Err(CarbonError::SchemaViolation {
                    id: id.clone(),
                    name: node.name().clone(),
                });
            }
        }
        Ok(())
    }

    /// Seal the draft into a new state chained to its source.
    ///
    /// Fails without side effects if the pending selection cannot be pinned
    /// against the new tree or the content policy rejects it.
    pub fn commit(mut self) -> Result<Arc<State>> {
        self.prepare()?;
        let selection = self
            .selection
            .as_ref()
            .map(|sel| sel.pin(&self.map))
            .transpose()?;
        let root = self.map.node(self.source.root().id())?;
        self.map.freeze();
        let changes = self.changes.freeze();
        tracing::debug!(
            target: "carbon::draft",
            version = self.source.version() + 1,
            changes = changes.len(),
            "commit"
        );
        Ok(State::chain(
            self.source,
            root,
            self.map,
            selection,
            changes,
            self.history_depth,
        ))
    }

    /// Drop the draft without producing a state.
    pub fn discard(self) {
        tracing::trace!(target: "carbon::draft", changes = self.changes.len(), "discard");
    }
}
