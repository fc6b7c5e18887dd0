//! Editor configuration.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::Result;

/// What to do when a commit leaves a node with an incomplete child sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentPolicy {
    /// Commit anyway and let the normalizer append fillers afterwards.
    #[default]
    Normalize,
    /// Fail the commit with a schema violation.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Number of previous snapshots each state keeps reachable.
    pub history_depth: usize,
    /// Overlay layers a node map may stack before it is flattened.
    pub max_map_layers: usize,
    /// Grammar enforcement after structural edits.
    pub content_policy: ContentPolicy,
    /// Prefix for generated node ids.
    pub session: SmolStr,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_depth: 4,
            max_map_layers: 32,
            content_policy: ContentPolicy::Normalize,
            session: SmolStr::new_static("local"),
        }
    }
}

impl EditorConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_policy(mut self, policy: ContentPolicy) -> Self {
        self.content_policy = policy;
        self
    }

    pub fn with_session(mut self, session: impl Into<SmolStr>) -> Self {
        self.session = session.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = EditorConfig::from_json(r#"{ "contentPolicy": "reject", "historyDepth": 2 }"#).unwrap();
        assert_eq!(config.content_policy, ContentPolicy::Reject);
        assert_eq!(config.history_depth, 2);
        assert_eq!(config.max_map_layers, EditorConfig::default().max_map_layers);
        assert_eq!(config.session, "local");
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            EditorConfig::from_json("{ \"historyDepth\": -1 }"),
            Err(crate::error::CarbonError::Json(_))
        ));
    }
}
