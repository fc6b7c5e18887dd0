//! Immutable document nodes.
//!
//! A [`Node`] is a pure structural value: id, type name, kind flags, content
//! and attributes. Parent linkage lives in [`crate::NodeMap`], so the same
//! `Arc<Node>` can be shared by every snapshot whose subtree it belongs to.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::id::NodeId;
use crate::props::Props;

/// Kind flags copied from the node's schema spec at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodeKind {
    /// Leaf holding raw text.
    pub text: bool,
    /// Indivisible node occupying one focus unit.
    pub atom: bool,
    /// Lives inside a text block rather than at block level.
    pub inline: bool,
    /// Can host a cursor.
    pub focusable: bool,
}

impl NodeKind {
    pub const TEXT: Self = Self {
        text: true,
        atom: false,
        inline: true,
        focusable: true,
    };

    pub const CONTAINER: Self = Self {
        text: false,
        atom: false,
        inline: false,
        focusable: false,
    };
}

/// Text leaf content or ordered block children.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeContent {
    Text(String),
    Children(Vec<Arc<Node>>),
}

impl NodeContent {
    pub fn children(&self) -> &[Arc<Node>] {
        match self {
            NodeContent::Children(children) => children,
            NodeContent::Text(_) => &[],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    id: NodeId,
    name: SmolStr,
    kind: NodeKind,
    content: NodeContent,
    props: Props,
    /// Cached focus size: chars for text, 1 for atoms, sum of children otherwise.
    size: usize,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        name: SmolStr,
        kind: NodeKind,
        content: NodeContent,
        props: Props,
    ) -> Self {
        let mut node = Self {
            id,
            name,
            kind,
            content,
            props,
            size: 0,
        };
        node.refresh_size();
        node
    }

    // === Accessors ===

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Number of focus units inside this node.
    pub fn focus_size(&self) -> usize {
        self.size
    }

    pub fn is_text(&self) -> bool {
        self.kind.text
    }

    pub fn is_atom(&self) -> bool {
        self.kind.atom
    }

    pub fn is_inline(&self) -> bool {
        self.kind.inline
    }

    pub fn is_focusable(&self) -> bool {
        self.kind.focusable
    }

    /// Leaves are the cursor-level granularity: text and atoms.
    pub fn is_leaf(&self) -> bool {
        self.kind.text || self.kind.atom
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            NodeContent::Text(text) => Some(text),
            NodeContent::Children(_) => None,
        }
    }

    /// Children as stored in this value. Inside a draft these may lag behind
    /// the draft's node map until the draft is prepared.
    pub fn children(&self) -> &[Arc<Node>] {
        self.content.children()
    }

    pub fn child_ids(&self) -> impl DoubleEndedIterator<Item = &NodeId> + '_ {
        self.children().iter().map(|child| &child.id)
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    pub fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.children().iter().position(|child| &child.id == id)
    }

    pub fn is_empty(&self) -> bool {
        match &self.content {
            NodeContent::Text(text) => text.is_empty(),
            NodeContent::Children(children) => children.is_empty(),
        }
    }

    /// Pre-order walk over this node and all descendants.
    pub fn descendants(self: &Arc<Self>) -> Vec<Arc<Node>> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            stack.extend(node.children().iter().rev().cloned());
            out.push(node);
        }
        out
    }

    /// Concatenated text of all descendant text leaves.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match &self.content {
            NodeContent::Text(text) => out.push_str(text),
            NodeContent::Children(children) => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Indented one-node-per-line outline, used by tests and debug logging.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(&mut out, 0);
        out
    }

    fn write_outline(&self, out: &mut String, depth: usize) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        let _ = write!(out, "{}#{}", self.name, self.id);
        if let Some(text) = self.text() {
            let _ = write!(out, " {:?}", text);
        }
        out.push('\n');
        for child in self.children() {
            child.write_outline(out, depth + 1);
        }
    }

    // === Crate-internal mutation (only ever on a draft's private clone) ===

    pub(crate) fn set_name(&mut self, name: SmolStr) {
        self.name = name;
    }

    pub(crate) fn set_kind(&mut self, kind: NodeKind) {
        self.kind = kind;
        self.refresh_size();
    }

    pub(crate) fn props_mut(&mut self) -> &mut Props {
        &mut self.props
    }

    pub(crate) fn set_content(&mut self, content: NodeContent) {
        self.content = content;
        self.refresh_size();
    }

    pub(crate) fn insert_child(&mut self, index: usize, child: Arc<Node>) {
        if let NodeContent::Children(children) = &mut self.content {
            let index = index.min(children.len());
            children.insert(index, child);
        }
        self.refresh_size();
    }

    pub(crate) fn remove_child(&mut self, id: &NodeId) -> Option<(usize, Arc<Node>)> {
        let NodeContent::Children(children) = &mut self.content else {
            return None;
        };
        let index = children.iter().position(|child| &child.id == id)?;
        let removed = children.remove(index);
        self.refresh_size();
        Some((index, removed))
    }

    fn refresh_size(&mut self) {
        self.size = match &self.content {
            NodeContent::Text(text) => text.chars().count(),
            _ if self.kind.atom => 1,
            NodeContent::Children(children) => children.iter().map(|c| c.size).sum(),
        };
    }

    // === Serialization ===

    /// Canonical structured projection of this node and its subtree.
    pub fn to_json(&self) -> NodeJson {
        NodeJson {
            id: self.id.clone(),
            name: self.name.clone(),
            text: self.text().map(str::to_owned),
            children: self.children().iter().map(|c| c.to_json()).collect(),
            props: self.props.clone(),
        }
    }
}

/// Wire form of a node: clipboard, history payloads, transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeJson {
    pub id: NodeId,
    pub name: SmolStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeJson>,
    #[serde(default, skip_serializing_if = "Props::is_empty")]
    pub props: Props,
}

impl NodeJson {
    pub fn text(id: impl Into<NodeId>, name: impl Into<SmolStr>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            text: Some(text.into()),
            children: Vec::new(),
            props: Props::default(),
        }
    }

    pub fn block(
        id: impl Into<NodeId>,
        name: impl Into<SmolStr>,
        children: impl IntoIterator<Item = NodeJson>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            text: None,
            children: children.into_iter().collect(),
            props: Props::default(),
        }
    }

    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }
}

/// Wire form of a node's content, used by `SetContent`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentJson {
    Text(String),
    Children(Vec<NodeJson>),
}

impl ContentJson {
    pub fn of(node: &Node) -> Self {
        match node.content() {
            NodeContent::Text(text) => ContentJson::Text(text.clone()),
            NodeContent::Children(children) => {
                ContentJson::Children(children.iter().map(|c| c.to_json()).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(id: &str, s: &str) -> Arc<Node> {
        Arc::new(Node::new(
            id.into(),
            "text".into(),
            NodeKind::TEXT,
            NodeContent::Text(s.into()),
            Props::default(),
        ))
    }

    fn block(id: &str, name: &str, kind: NodeKind, children: Vec<Arc<Node>>) -> Node {
        Node::new(
            id.into(),
            name.into(),
            kind,
            NodeContent::Children(children),
            Props::default(),
        )
    }

    #[test]
    fn test_focus_size() {
        let mention = NodeKind {
            text: false,
            atom: true,
            inline: true,
            focusable: true,
        };
        let para = block(
            "p",
            "paragraph",
            NodeKind::CONTAINER,
            vec![
                text("t1", "héllo"),
                Arc::new(block("m", "mention", mention, vec![])),
                text("t2", ""),
            ],
        );
        assert_eq!(para.focus_size(), 6);
        assert_eq!(para.children()[1].focus_size(), 1);
        assert_eq!(para.children()[2].focus_size(), 0);
        assert_eq!(para.text_content(), "héllo");
    }

    #[test]
    fn test_child_edits_refresh_size() {
        let mut para = block("p", "paragraph", NodeKind::CONTAINER, vec![text("t1", "ab")]);
        para.insert_child(5, text("t2", "cde"));
        assert_eq!(para.focus_size(), 5);
        assert_eq!(para.index_of(&"t2".into()), Some(1));

        let (index, removed) = para.remove_child(&"t1".into()).unwrap();
        assert_eq!(index, 0);
        assert_eq!(removed.text(), Some("ab"));
        assert_eq!(para.focus_size(), 3);
        assert!(para.remove_child(&"missing".into()).is_none());
    }

    #[test]
    fn test_json_projection() {
        let para = block("p", "paragraph", NodeKind::CONTAINER, vec![text("t1", "ab")]);
        let json = para.to_json();
        assert_eq!(
            json,
            NodeJson::block("p", "paragraph", [NodeJson::text("t1", "text", "ab")])
        );
        let value = serde_json::to_value(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "p",
                "name": "paragraph",
                "children": [{ "id": "t1", "name": "text", "text": "ab" }]
            })
        );
    }

    #[test]
    fn test_outline() {
        let para = Arc::new(block("p", "paragraph", NodeKind::CONTAINER, vec![text("t1", "ab")]));
        insta::assert_snapshot!(para.outline().trim_end(), @r#"
        paragraph#p
          text#t1 "ab"
        "#);
        assert_eq!(para.descendants().len(), 2);
    }
}
