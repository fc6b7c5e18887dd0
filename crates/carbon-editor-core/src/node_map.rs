//! Persistent id → node index for one snapshot.
//!
//! A derived map is an overlay over an `Arc` of its base: lookups fall
//! through to the base unless the overlay wrote or deleted the id. Untouched
//! entries therefore stay reference-identical across snapshots. The parent
//! index is a cache kept in step with every structural write; it is never
//! inferred from node values.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{CarbonError, Result};
use crate::id::NodeId;
use crate::node::Node;

#[derive(Debug, Default)]
pub struct NodeMap {
    base: Option<Arc<NodeMap>>,
    entries: HashMap<NodeId, Arc<Node>>,
    parents: HashMap<NodeId, NodeId>,
    /// Ids removed in this layer, with the value they had when removed.
    tombstones: HashMap<NodeId, Arc<Node>>,
    layers: usize,
    frozen: bool,
}

impl NodeMap {
    /// Index a whole tree rooted at `root`.
    pub fn from_root(root: Arc<Node>) -> Self {
        let mut map = Self::default();
        map.register(&root, None);
        map
    }

    /// New writable layer over `base`. Flattens when the chain would exceed
    /// `max_layers`.
    pub fn derive(base: &Arc<NodeMap>, max_layers: usize) -> Self {
        if base.layers + 1 > max_layers {
            let mut flat = Self::default();
            base.flatten_into(&mut flat.entries, &mut flat.parents);
            tracing::trace!(target: "carbon::node_map", entries = flat.entries.len(), "flattened node map");
            return flat;
        }
        Self {
            base: Some(base.clone()),
            layers: base.layers + 1,
            ..Self::default()
        }
    }

    // === Lookup ===

    pub fn get(&self, id: &NodeId) -> Option<Arc<Node>> {
        if let Some(node) = self.entries.get(id) {
            return Some(node.clone());
        }
        if self.tombstones.contains_key(id) {
            return None;
        }
        self.base.as_ref()?.get(id)
    }

    /// Lookup that fails with a structural lookup error.
    pub fn node(&self, id: &NodeId) -> Result<Arc<Node>> {
        self.get(id).ok_or_else(|| CarbonError::not_found(id))
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Value of a node removed in this layer.
    pub fn tombstone(&self, id: &NodeId) -> Option<&Arc<Node>> {
        self.tombstones.get(id)
    }

    pub fn is_deleted(&self, id: &NodeId) -> bool {
        self.tombstones.contains_key(id) && !self.entries.contains_key(id)
    }

    pub fn parent_id(&self, id: &NodeId) -> Option<NodeId> {
        if self.is_deleted(id) {
            return None;
        }
        if let Some(parent) = self.parents.get(id) {
            return (!parent.is_null()).then(|| parent.clone());
        }
        if self.entries.contains_key(id) && self.base.is_none() {
            return None;
        }
        self.base.as_ref()?.parent_id(id)
    }

    pub fn parent(&self, id: &NodeId) -> Option<Arc<Node>> {
        self.get(&self.parent_id(id)?)
    }

    /// Current children of `id`, read through the map rather than the
    /// possibly stale `Arc`s stored in the parent value.
    pub fn children(&self, id: &NodeId) -> Result<Vec<Arc<Node>>> {
        let node = self.node(id)?;
        node.child_ids().map(|child| self.node(child)).collect()
    }

    pub fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.parent(id)?.index_of(id)
    }

    pub fn next_sibling(&self, id: &NodeId) -> Option<Arc<Node>> {
        let parent = self.parent(id)?;
        let index = parent.index_of(id)?;
        let next = parent.children().get(index + 1)?;
        self.get(next.id())
    }

    pub fn prev_sibling(&self, id: &NodeId) -> Option<Arc<Node>> {
        let parent = self.parent(id)?;
        let index = parent.index_of(id)?;
        let prev = parent.children().get(index.checked_sub(1)?)?;
        self.get(prev.id())
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, id: &NodeId) -> Vec<Arc<Node>> {
        let mut out = Vec::new();
        let mut current = self.parent_id(id);
        while let Some(parent) = current {
            current = self.parent_id(&parent);
            if let Some(node) = self.get(&parent) {
                out.push(node);
            }
        }
        out
    }

    /// Distance from the root (root is 0).
    pub fn depth(&self, id: &NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent_id(id);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent_id(&parent);
        }
        depth
    }

    /// Child indices from the root down to `id`.
    pub fn path(&self, id: &NodeId) -> Result<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = id.clone();
        while let Some(parent) = self.parent(&current) {
            let index = parent
                .index_of(&current)
                .ok_or_else(|| CarbonError::not_found(&current))?;
            path.push(index);
            current = parent.id().clone();
        }
        path.reverse();
        Ok(path)
    }

    /// Document order of two nodes; an ancestor sorts before its descendants.
    pub fn document_order(&self, a: &NodeId, b: &NodeId) -> Result<Ordering> {
        Ok(self.path(a)?.cmp(&self.path(b)?))
    }

    // === Writes ===

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Replace the value stored for an id without touching the parent index.
    pub fn set(&mut self, node: Arc<Node>) -> Result<()> {
        self.check_writable()?;
        let id = node.id().clone();
        self.tombstones.remove(&id);
        self.entries.insert(id, node);
        Ok(())
    }

    /// Take the overlay's own entry so the caller can mutate it in place.
    pub(crate) fn take_local(&mut self, id: &NodeId) -> Result<Option<Arc<Node>>> {
        self.check_writable()?;
        Ok(self.entries.remove(id))
    }

    pub fn set_parent(&mut self, id: &NodeId, parent: &NodeId) -> Result<()> {
        self.check_writable()?;
        self.parents.insert(id.clone(), parent.clone());
        Ok(())
    }

    /// Register `node` and every descendant, linking `node` under `parent`.
    pub fn insert_subtree(&mut self, parent: &NodeId, node: &Arc<Node>) -> Result<()> {
        self.check_writable()?;
        self.register(node, Some(parent));
        Ok(())
    }

    /// Delete an id and all its descendants in one pass.
    /// Returns the removed ids in pre-order.
    pub fn remove_subtree(&mut self, id: &NodeId) -> Result<Vec<NodeId>> {
        self.check_writable()?;
        let mut removed = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            let node = self.node(&current)?;
            stack.extend(node.child_ids().rev().cloned());
            self.entries.remove(&current);
            self.parents.insert(current.clone(), NodeId::null());
            self.tombstones.insert(current.clone(), node);
            removed.push(current);
        }
        Ok(removed)
    }

    fn register(&mut self, node: &Arc<Node>, parent: Option<&NodeId>) {
        let mut stack = vec![(node.clone(), parent.cloned().unwrap_or_default())];
        while let Some((current, parent)) = stack.pop() {
            let id = current.id().clone();
            for child in current.children() {
                stack.push((child.clone(), id.clone()));
            }
            self.tombstones.remove(&id);
            self.parents.insert(id.clone(), parent);
            self.entries.insert(id, current);
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.frozen {
            return Err(CarbonError::FrozenNodeMap);
        }
        Ok(())
    }

    fn flatten_into(
        &self,
        entries: &mut HashMap<NodeId, Arc<Node>>,
        parents: &mut HashMap<NodeId, NodeId>,
    ) {
        if let Some(base) = &self.base {
            base.flatten_into(entries, parents);
        }
        let removed: HashSet<&NodeId> = self
            .tombstones
            .keys()
            .filter(|id| !self.entries.contains_key(*id))
            .collect();
        for id in removed {
            entries.remove(id);
            parents.remove(id);
        }
        for (id, parent) in &self.parents {
            if parent.is_null() {
                parents.remove(id);
            } else {
                parents.insert(id.clone(), parent.clone());
            }
        }
        for (id, node) in &self.entries {
            entries.insert(id.clone(), node.clone());
        }
    }
}
