//! Shared fixtures for unit tests.

use std::sync::Arc;

use serde_json::json;

use crate::node::Node;
use crate::node_map::NodeMap;
use crate::schema::{NodeSpec, RepeatMatcher, Schema};

pub fn schema() -> Schema {
    Schema::new()
        .with(NodeSpec::container("doc").with_content(
            RepeatMatcher::new(["paragraph", "image"]).at_least(1),
        ))
        .with(NodeSpec::container("section").with_content(
            RepeatMatcher::new(["paragraph"]).at_least(1),
        ))
        .with(NodeSpec::text_block("paragraph").with_content(RepeatMatcher::new(["text", "mention"])))
        .with(NodeSpec::text("text"))
        .with(NodeSpec::atom("mention", true))
        .with(NodeSpec::atom("image", false))
}

/// ```text
/// doc
///   p1 [t1 "ab", m1 (mention), t3 "c"]
///   p2 [t2 "cd"]
///   p3 []
///   img (block image)
/// ```
pub fn sample_doc() -> Arc<Node> {
    let node = schema()
        .node_from_value(json!({
            "id": "doc", "name": "doc", "children": [
                { "id": "p1", "name": "paragraph", "children": [
                    { "id": "t1", "name": "text", "text": "ab" },
                    { "id": "m1", "name": "mention" },
                    { "id": "t3", "name": "text", "text": "c" }
                ]},
                { "id": "p2", "name": "paragraph", "children": [
                    { "id": "t2", "name": "text", "text": "cd" }
                ]},
                { "id": "p3", "name": "paragraph" },
                { "id": "img", "name": "image" }
            ]
        }))
        .expect("sample doc is valid");
    Arc::new(node)
}

/// Two plain paragraphs, `p1 ["ab"]` and `p2 ["cd"]`.
pub fn two_paragraphs() -> Arc<Node> {
    let node = schema()
        .node_from_value(json!({
            "id": "doc", "name": "doc", "children": [
                { "id": "p1", "name": "paragraph", "children": [
                    { "id": "t1", "name": "text", "text": "ab" }
                ]},
                { "id": "p2", "name": "paragraph", "children": [
                    { "id": "t2", "name": "text", "text": "cd" }
                ]}
            ]
        }))
        .expect("fixture is valid");
    Arc::new(node)
}

pub fn doc_map(root: Arc<Node>) -> NodeMap {
    NodeMap::from_root(root)
}
