//! HTML parsing and serialization using html5ever.
//!
//! Provides:
//! - Parsing a fragment (or a whole document) into an immutable [`Node`] tree
//! - Serializing a tree back to HTML in one pass

mod node;
mod sink;

pub use node::{elements_in, find_in, Attribute, Element, Node};

use std::io;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::serialize::{serialize, Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;

use crate::error::{ParseError, RenderError, Result};
use sink::FragmentSink;

/// Default bound on element nesting (the HTML parser nesting limit browsers use).
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// A parsed input's top-level nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub children: Vec<Node>,
}

/// Bounds applied while parsing. `None` disables a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    /// Longest accepted input, in bytes.
    pub max_bytes: Option<usize>,
    /// Deepest accepted element nesting, counted from the input's top level.
    pub max_depth: Option<usize>,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_bytes: None,
            max_depth: Some(DEFAULT_MAX_DEPTH),
        }
    }
}

/// Parse HTML with no size limit and the default nesting bound.
pub fn parse(html: &str) -> Result<Document> {
    parse_with_limits(html, ParseLimits::default())
}

/// Parse HTML, rejecting inputs that exceed `limits`.
///
/// Inputs starting with a doctype or an `<html>` tag are parsed as complete
/// documents; anything else is parsed in the context of a `<body>`.
pub fn parse_with_limits(html: &str, limits: ParseLimits) -> Result<Document> {
    if let Some(limit) = limits.max_bytes {
        if html.len() > limit {
            return Err(ParseError::InputTooLarge {
                size: html.len(),
                limit,
            }
            .into());
        }
    }

    if looks_like_document(html) {
        return Ok(Document {
            children: parse_nodes(html, limits.max_depth, 0)?,
        });
    }

    // Wrap in a minimal document structure for parsing
    let wrapped = format!(
        "<!DOCTYPE html><html><head></head><body>{}</body></html>",
        html
    );
    let nodes = parse_nodes(&wrapped, limits.max_depth, 2)?;
    let body = find_in(&nodes, &|e: &Element| e.is("body")).ok_or(ParseError::MissingBody)?;

    Ok(Document {
        children: body.children.clone(),
    })
}

/// `wrapper_depth` levels of the tree are ours rather than the input's.
fn parse_nodes(html: &str, max_depth: Option<usize>, wrapper_depth: usize) -> Result<Vec<Node>> {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: false,
            ..Default::default()
        },
        ..Default::default()
    };

    let sink = parse_document(FragmentSink::new(), opts)
        .from_utf8()
        .one(html.as_bytes());

    Ok(sink
        .into_nodes(max_depth.map(|limit| limit.saturating_add(wrapper_depth)))
        .map_err(|_| ParseError::TooDeep {
            limit: max_depth.unwrap_or(usize::MAX),
        })?)
}

fn looks_like_document(html: &str) -> bool {
    let head: String = html
        .trim_start()
        .chars()
        .take(9)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

/// Serialize nodes back to an HTML string.
pub fn serialize_nodes(nodes: &[Node]) -> Result<String> {
    let mut bytes = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };

    serialize(&mut bytes, &NodeList(nodes), opts).map_err(RenderError::Serialize)?;

    Ok(String::from_utf8(bytes).map_err(|_| RenderError::Utf8)?)
}

impl Document {
    pub fn to_html(&self) -> Result<String> {
        serialize_nodes(&self.children)
    }
}

struct NodeList<'a>(&'a [Node]);

impl Serialize for NodeList<'_> {
    fn serialize<S>(&self, serializer: &mut S, _traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        for node in self.0 {
            node.serialize(serializer, TraversalScope::IncludeNode)?;
        }
        Ok(())
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        match self {
            Node::Element(el) => {
                let include_node = matches!(traversal_scope, TraversalScope::IncludeNode);
                if include_node {
                    serializer.start_elem(
                        el.name.clone(),
                        el.attrs.iter().map(|a| (&a.name, a.value.as_str())),
                    )?;
                }
                for child in &el.children {
                    child.serialize(serializer, TraversalScope::IncludeNode)?;
                }
                if include_node {
                    serializer.end_elem(el.name.clone())?;
                }
                Ok(())
            }
            Node::Text(text) => serializer.write_text(text),
            Node::Comment(text) => serializer.write_comment(text),
            Node::Doctype(name) => serializer.write_doctype(name),
        }
    }
}
