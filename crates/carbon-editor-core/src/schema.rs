//! Node type registry and the grammar collaborator boundary.
//!
//! The engine never grammar-checks raw mutations by itself. It asks the
//! [`ContentMatcher`] attached to a node's spec, either at commit time
//! (reject policy) or from the post-commit normalizer (fill policy).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::error::{CarbonError, Result};
use crate::id::NodeId;
use crate::node::{ContentJson, Node, NodeContent, NodeJson, NodeKind};
use crate::props::Props;

/// How far a child sequence gets through a content rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchStatus {
    /// The sequence can never become valid by appending.
    Invalid,
    /// A valid prefix; more children are required.
    Partial,
    /// The sequence is valid as it stands.
    Complete,
}

/// Grammar collaborator: decides legal child sequences for one node type.
pub trait ContentMatcher: Send + Sync + fmt::Debug {
    /// Match a candidate ordered sequence of child type names.
    fn match_children(&self, names: &[SmolStr]) -> MatchStatus;

    /// Minimal sequence to append to `names` to reach a complete match.
    fn fill(&self, names: &[SmolStr]) -> Option<Vec<SmolStr>>;
}

/// Content rule `(a | b | ...){min,max}`.
#[derive(Clone, Debug)]
pub struct RepeatMatcher {
    allowed: Vec<SmolStr>,
    min: usize,
    max: Option<usize>,
}

impl RepeatMatcher {
    pub fn new(allowed: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            min: 0,
            max: None,
        }
    }

    pub fn at_least(mut self, min: usize) -> Self {
        self.min = min;
        self
    }

    pub fn at_most(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }
}

impl ContentMatcher for RepeatMatcher {
    fn match_children(&self, names: &[SmolStr]) -> MatchStatus {
        if names.iter().any(|name| !self.allowed.contains(name)) {
            return MatchStatus::Invalid;
        }
        if self.max.is_some_and(|max| names.len() > max) {
            return MatchStatus::Invalid;
        }
        if names.len() < self.min {
            MatchStatus::Partial
        } else {
            MatchStatus::Complete
        }
    }

    fn fill(&self, names: &[SmolStr]) -> Option<Vec<SmolStr>> {
        match self.match_children(names) {
            MatchStatus::Invalid => None,
            MatchStatus::Complete => Some(Vec::new()),
            MatchStatus::Partial => {
                let filler = self.allowed.first()?;
                Some(vec![filler.clone(); self.min - names.len()])
            }
        }
    }
}

/// Registered node type.
#[derive(Clone, Debug)]
pub struct NodeSpec {
    pub name: SmolStr,
    pub kind: NodeKind,
    pub content: Option<Arc<dyn ContentMatcher>>,
}

impl NodeSpec {
    /// Text leaf type.
    pub fn text(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::TEXT,
            content: None,
        }
    }

    /// Non-focusable block container.
    pub fn container(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::CONTAINER,
            content: None,
        }
    }

    /// Focusable block hosting inline content (paragraph, heading, ...).
    pub fn text_block(name: impl Into<SmolStr>) -> Self {
        Self::container(name).focusable()
    }

    /// Atomic node; inline atoms sit inside text blocks, block atoms stand alone.
    pub fn atom(name: impl Into<SmolStr>, inline: bool) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind {
                text: false,
                atom: true,
                inline,
                focusable: true,
            },
            content: None,
        }
    }

    pub fn focusable(mut self) -> Self {
        self.kind.focusable = true;
        self
    }

    pub fn with_content(mut self, matcher: impl ContentMatcher + 'static) -> Self {
        self.content = Some(Arc::new(matcher));
        self
    }
}

/// Registry of node specs and the JSON → Node constructor.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    specs: HashMap<SmolStr, NodeSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec, builder style. Later registrations replace earlier ones.
    pub fn with(mut self, spec: NodeSpec) -> Self {
        self.register(spec);
        self
    }

    pub fn register(&mut self, spec: NodeSpec) {
        self.specs.insert(spec.name.clone(), spec);
    }

    pub fn spec(&self, name: &str) -> Result<&NodeSpec> {
        self.specs
            .get(name)
            .ok_or_else(|| CarbonError::UnknownNodeType(name.into()))
    }

    /// Rebuild a node (and its subtree) from its wire form.
    pub fn node_from_json(&self, json: &NodeJson) -> Result<Node> {
        let spec = self.spec(&json.name)?;
        let content = self.content_for(spec, &json.id, json.text.as_deref(), &json.children)?;
        Ok(Node::new(
            json.id.clone(),
            json.name.clone(),
            spec.kind,
            content,
            json.props.clone(),
        ))
    }

    /// Parse a node from an arbitrary JSON value.
    pub fn node_from_value(&self, value: serde_json::Value) -> Result<Node> {
        let json: NodeJson = serde_json::from_value(value)?;
        self.node_from_json(&json)
    }

    /// Build node content of type `name` from its wire form.
    pub fn content_from_json(
        &self,
        name: &str,
        id: &NodeId,
        content: &ContentJson,
    ) -> Result<NodeContent> {
        let spec = self.spec(name)?;
        match content {
            ContentJson::Text(text) => self.content_for(spec, id, Some(text), &[]),
            ContentJson::Children(children) => self.content_for(spec, id, None, children),
        }
    }

    /// Empty node of the given type, used for normalization fillers.
    pub fn create_default(&self, name: &str, id: NodeId) -> Result<Node> {
        let spec = self.spec(name)?;
        let content = if spec.kind.text {
            NodeContent::Text(String::new())
        } else {
            NodeContent::Children(Vec::new())
        };
        Ok(Node::new(id, spec.name.clone(), spec.kind, content, Props::default()))
    }

    /// Check a child sequence against the content rule of `name`.
    /// Types without a rule accept anything.
    pub fn match_children(&self, name: &str, children: &[SmolStr]) -> Result<MatchStatus> {
        Ok(match &self.spec(name)?.content {
            Some(matcher) => matcher.match_children(children),
            None => MatchStatus::Complete,
        })
    }

    pub fn fill(&self, name: &str, children: &[SmolStr]) -> Result<Option<Vec<SmolStr>>> {
        Ok(match &self.spec(name)?.content {
            Some(matcher) => matcher.fill(children),
            None => Some(Vec::new()),
        })
    }

    fn content_for(
        &self,
        spec: &NodeSpec,
        id: &NodeId,
        text: Option<&str>,
        children: &[NodeJson],
    ) -> Result<NodeContent> {
        if spec.kind.text {
            if !children.is_empty() {
                return Err(CarbonError::invalid_content(id, "text node with children"));
            }
            return Ok(NodeContent::Text(text.unwrap_or_default().to_owned()));
        }
        if text.is_some() {
            return Err(CarbonError::invalid_content(
                id,
                format!("{} cannot hold raw text", spec.name),
            ));
        }
        let children = children
            .iter()
            .map(|child| self.node_from_json(child).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(NodeContent::Children(children))
    }
}
