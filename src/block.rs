//! Structured content bodies - block tree parsing
//!
//! Structured bodies interleave markup with HTML-comment block delimiters:
//!
//! ```text
//! <!-- wp:gallery {"ids":[3,4]} -->
//!   <!-- wp:image {"id":3} /-->
//! <!-- /wp:gallery -->
//! ```
//!
//! `parse_blocks` turns the delimiters into a typed `BlockNode` tree once,
//! so extractors traverse typed nodes instead of poking at loose JSON.
//! Parsing is lenient: bad attribute JSON becomes an empty map, stray
//! closers are ignored and unclosed blocks are closed at end of input.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

const IMAGE_BLOCK: &str = "core/image";
const GALLERY_BLOCK: &str = "core/gallery";

fn delimiter() -> &'static Regex {
    static DELIMITER: OnceLock<Regex> = OnceLock::new();
    DELIMITER.get_or_init(|| {
        Regex::new(
            r"(?s)<!--\s+(?P<closer>/)?wp:(?P<name>[a-z][a-z0-9_-]*(?:/[a-z][a-z0-9_-]*)?)\s+(?:(?P<attrs>\{.*?\})\s+)?(?P<void>/)?-->",
        )
        .expect("block delimiter pattern is valid")
    })
}

/// Discriminant of a block node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// `core/image` - carries a single `id` attribute
    Image,
    /// `core/gallery` - carries an `ids` list attribute
    Gallery,
    /// Any other block, by fully qualified name
    Other(String),
}

impl BlockKind {
    /// Classify a fully qualified block name
    pub fn from_name(name: &str) -> Self {
        match name {
            IMAGE_BLOCK => BlockKind::Image,
            GALLERY_BLOCK => BlockKind::Gallery,
            other => BlockKind::Other(other.to_string()),
        }
    }

    /// Fully qualified block name (`namespace/name`)
    pub fn name(&self) -> &str {
        match self {
            BlockKind::Image => IMAGE_BLOCK,
            BlockKind::Gallery => GALLERY_BLOCK,
            BlockKind::Other(name) => name,
        }
    }
}

/// A node of a structured content body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockNode {
    pub kind: BlockKind,
    pub attributes: Map<String, Value>,
    pub children: Vec<BlockNode>,
}

impl BlockNode {
    /// Create a leaf node
    pub fn new(kind: BlockKind, attributes: Map<String, Value>) -> Self {
        Self {
            kind,
            attributes,
            children: Vec::new(),
        }
    }

    /// Builder-style child append
    pub fn with_child(mut self, child: BlockNode) -> Self {
        self.children.push(child);
        self
    }

    /// Look up one attribute
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Depth-first, pre-order traversal over a forest of blocks
pub struct Descendants<'a> {
    stack: Vec<&'a BlockNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a BlockNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Walk every node of the forest, parents before children, in document order
pub fn walk_blocks(roots: &[BlockNode]) -> Descendants<'_> {
    Descendants {
        stack: roots.iter().rev().collect(),
    }
}

/// Names without a namespace belong to `core`
fn normalize_name(name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        format!("core/{}", name)
    }
}

fn parse_attributes(raw: Option<&str>) -> Map<String, Value> {
    match raw.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        _ => Map::new(),
    }
}

fn attach(node: BlockNode, stack: &mut [BlockNode], roots: &mut Vec<BlockNode>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

/// Parse a raw body into a block forest.
///
/// Returns `None` when the body contains no block delimiters at all, i.e. it
/// is freeform markup rather than structured content.
pub fn parse_blocks(body: &str) -> Option<Vec<BlockNode>> {
    let mut roots = Vec::new();
    let mut stack: Vec<BlockNode> = Vec::new();
    let mut structured = false;

    for caps in delimiter().captures_iter(body) {
        structured = true;
        let name = normalize_name(&caps["name"]);

        if caps.name("closer").is_some() {
            // Pop back to the matching opener; anything still open above it
            // was never closed and becomes a child of its parent.
            let Some(pos) = stack.iter().rposition(|n| n.kind.name() == name) else {
                continue;
            };
            while stack.len() > pos {
                if let Some(node) = stack.pop() {
                    attach(node, &mut stack, &mut roots);
                }
            }
            continue;
        }

        let attributes = parse_attributes(caps.name("attrs").map(|m| m.as_str()));
        let node = BlockNode::new(BlockKind::from_name(&name), attributes);
        if caps.name("void").is_some() {
            attach(node, &mut stack, &mut roots);
        } else {
            stack.push(node);
        }
    }

    while let Some(node) = stack.pop() {
        attach(node, &mut stack, &mut roots);
    }

    structured.then_some(roots)
}
