//! Node attribute bag.
//!
//! Attributes live in two namespaces: `host` values are handed to the
//! rendering surface as-is (html attributes, styling hints), `semantic`
//! values are document data the engine and commands reason about.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

/// Which half of the attribute bag a key belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    Host,
    Semantic,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Props {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    host: BTreeMap<SmolStr, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    semantic: BTreeMap<SmolStr, Value>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_empty() && self.semantic.is_empty()
    }

    pub fn get(&self, ns: Namespace, key: &str) -> Option<&Value> {
        self.map(ns).get(key)
    }

    /// Set a key, builder style.
    pub fn with(mut self, ns: Namespace, key: impl Into<SmolStr>, value: Value) -> Self {
        self.set(ns, key, value);
        self
    }

    /// Set a key. A JSON `null` value is kept as-is; use [`Props::merge`]
    /// for patch semantics.
    pub fn set(&mut self, ns: Namespace, key: impl Into<SmolStr>, value: Value) {
        self.map_mut(ns).insert(key.into(), value);
    }

    pub fn remove(&mut self, ns: Namespace, key: &str) -> Option<Value> {
        self.map_mut(ns).remove(key)
    }

    pub fn host(&self) -> &BTreeMap<SmolStr, Value> {
        &self.host
    }

    pub fn semantic(&self) -> &BTreeMap<SmolStr, Value> {
        &self.semantic
    }

    /// Apply a partial update: `null` deletes a key, anything else overwrites.
    pub fn merge(&mut self, patch: &Props) {
        for ns in [Namespace::Host, Namespace::Semantic] {
            for (key, value) in patch.map(ns) {
                if value.is_null() {
                    self.map_mut(ns).remove(key);
                } else {
                    self.map_mut(ns).insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// The patch that undoes `patch` when merged into the result of merging
    /// `patch` into `self`.
    pub fn revert_patch(&self, patch: &Props) -> Props {
        let mut revert = Props::new();
        for ns in [Namespace::Host, Namespace::Semantic] {
            for key in patch.map(ns).keys() {
                let before = self.map(ns).get(key).cloned().unwrap_or(Value::Null);
                revert.map_mut(ns).insert(key.clone(), before);
            }
        }
        revert
    }

    /// Namespaces touched by a patch.
    pub fn namespaces(&self) -> impl Iterator<Item = Namespace> + '_ {
        [Namespace::Host, Namespace::Semantic]
            .into_iter()
            .filter(|ns| !self.map(*ns).is_empty())
    }

    fn map(&self, ns: Namespace) -> &BTreeMap<SmolStr, Value> {
        match ns {
            Namespace::Host => &self.host,
            Namespace::Semantic => &self.semantic,
        }
    }

    fn map_mut(&mut self, ns: Namespace) -> &mut BTreeMap<SmolStr, Value> {
        match ns {
            Namespace::Host => &mut self.host,
            Namespace::Semantic => &mut self.semantic,
        }
    }
}
