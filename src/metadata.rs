//! Document metadata and section outline extraction.
//!
//! Each field is looked up through a priority list: the LaTeX command in the
//! source first, then the class markers of generated markup (current first,
//! deprecated after). The list is data ([`MetadataRules`]) so new producers can
//! be supported from configuration.

use std::sync::Arc;

use nom::{
    bytes::complete::is_not,
    character::complete::{char, multispace0},
    combinator::opt,
    error::{Error as NomError, ErrorKind},
    sequence::{delimited, pair, preceded},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::html::{self, elements_in, find_in, Element, Node, ParseLimits};
use crate::logging::{default_logger, Logger};

/// Metadata of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub document_class: Option<String>,
    pub sections: Vec<Section>,
}

/// One heading of the outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub level: u8,
    pub title: String,
    pub slug: String,
}

/// Where a field may be found, in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldRule {
    /// LaTeX command name without the backslash, e.g. `title`.
    pub command: Option<String>,
    /// Class names to look for, tried in order.
    pub classes: Vec<String>,
}

impl FieldRule {
    fn new(command: &str, classes: &[&str]) -> Self {
        Self {
            command: Some(command.to_string()),
            classes: classes.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Lookup rules for every metadata field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataRules {
    pub title: FieldRule,
    pub author: FieldRule,
    pub date: FieldRule,
    pub document_class: FieldRule,
    /// Use the first `<h1>` when no other title source matches.
    pub title_from_first_heading: bool,
    /// Inputs larger than this skip HTML parsing and get only the command scan.
    pub max_input_bytes: Option<usize>,
    /// Likewise for inputs nesting elements deeper than this.
    pub max_depth: Option<usize>,
}

impl Default for MetadataRules {
    fn default() -> Self {
        Self {
            title: FieldRule::new("title", &["doc-title", "title"]),
            author: FieldRule::new("author", &["doc-author", "author"]),
            date: FieldRule::new("date", &["doc-date", "date"]),
            document_class: FieldRule::new("documentclass", &[]),
            title_from_first_heading: true,
            max_input_bytes: Some(64 * 1024 * 1024),
            max_depth: Some(html::DEFAULT_MAX_DEPTH),
        }
    }
}

/// Derives [`DocumentMetadata`] from a fragment or LaTeX source.
pub struct MetadataExtractor {
    rules: MetadataRules,
    logger: Arc<dyn Logger>,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new(MetadataRules::default(), default_logger())
    }
}

impl MetadataExtractor {
    pub fn new(rules: MetadataRules, logger: Arc<dyn Logger>) -> Self {
        Self { rules, logger }
    }

    /// Extract metadata. Never fails; missing fields stay `None`.
    pub fn extract(&self, source: &str) -> DocumentMetadata {
        let limits = ParseLimits {
            max_bytes: self.rules.max_input_bytes,
            max_depth: self.rules.max_depth,
        };
        let document = match html::parse_with_limits(source, limits) {
            Ok(document) => Some(document),
            Err(err) => {
                self.logger
                    .warn(&format!("metadata limited to a source scan: {}", err));
                None
            }
        };
        let nodes = document.as_ref().map(|d| d.children.as_slice());

        let mut title = self.field("title", &self.rules.title, source, nodes);
        if title.is_none() && self.rules.title_from_first_heading {
            title = nodes
                .and_then(|nodes| find_in(nodes, &|e: &Element| e.is("h1")))
                .map(|h1| collapse_whitespace(&h1.text_content()))
                .filter(|t| !t.is_empty());
        }

        DocumentMetadata {
            title,
            author: self.field("author", &self.rules.author, source, nodes),
            date: self.field("date", &self.rules.date, source, nodes),
            document_class: self.field(
                "document class",
                &self.rules.document_class,
                source,
                nodes,
            ),
            sections: nodes.map(sections).unwrap_or_default(),
        }
    }

    fn field(
        &self,
        label: &str,
        rule: &FieldRule,
        source: &str,
        nodes: Option<&[Node]>,
    ) -> Option<String> {
        if let Some(command) = &rule.command {
            if let Some(value) = find_command(source, command) {
                self.logger
                    .debug(&format!("{} taken from \\{}", label, command));
                return Some(value);
            }
        }

        let nodes = nodes?;
        for class in &rule.classes {
            let found = find_in(nodes, &|e: &Element| e.has_class(class))
                .map(|el| collapse_whitespace(&el.text_content()))
                .filter(|text| !text.is_empty());
            if found.is_some() {
                self.logger
                    .debug(&format!("{} taken from .{}", label, class));
                return found;
            }
        }

        None
    }
}

/// Every `h1`-`h6` in document order. Empty headings keep an empty slug.
fn sections(nodes: &[Node]) -> Vec<Section> {
    elements_in(nodes)
        .into_iter()
        .filter_map(|el| {
            let level = heading_level(el)?;
            let title = collapse_whitespace(&el.text_content());
            Some(Section {
                level,
                slug: slugify(&title),
                title,
            })
        })
        .collect()
}

fn heading_level(el: &Element) -> Option<u8> {
    match el.local_name() {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Anchor slug for a heading: lower-cased, punctuation dropped, whitespace
/// runs turned into `-`, no leading or trailing `-`. Not deduplicated.
pub fn slugify(text: &str) -> String {
    let kept: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect();

    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .trim_matches('-')
        .to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Value of the first `\name[opt]{value}` in `source` with a non-empty value.
fn find_command(source: &str, name: &str) -> Option<String> {
    let needle = format!("\\{}", name);
    let mut remaining = source;

    while let Some(pos) = remaining.find(&needle) {
        let after = &remaining[pos + needle.len()..];
        remaining = after;

        // `\title` must not match `\titlepage`
        if after.starts_with(|c: char| c.is_ascii_alphabetic()) {
            continue;
        }

        if let Ok((_, raw)) = command_argument(after) {
            let value = clean_value(raw);
            if !value.is_empty() {
                return Some(value);
            }
        }
    }

    None
}

/// Optional `[...]` then a balanced `{...}`.
fn command_argument(input: &str) -> IResult<&str, &str> {
    preceded(
        pair(
            multispace0,
            opt(delimited(char('['), is_not("]"), char(']'))),
        ),
        preceded(multispace0, braced),
    )(input)
}

/// Contents of a brace group, honouring nesting and `\{`, `\}` escapes.
fn braced(input: &str) -> IResult<&str, &str> {
    let (rest, _) = char('{')(input)?;
    let mut depth = 1usize;
    let mut escaped = false;

    for (i, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&rest[i + 1..], &rest[..i]));
                }
            }
            _ => {}
        }
    }

    Err(nom::Err::Error(NomError::new(input, ErrorKind::Char)))
}

fn clean_value(raw: &str) -> String {
    let text = raw
        .replace("\\\\", " ")
        .replace("\\and", ", ")
        .replace('~', " ");
    let text: String = text.chars().filter(|c| *c != '{' && *c != '}').collect();
    let text = decode_entities(&text);

    collapse_whitespace(&text).replace(" ,", ",")
}

/// Values scanned from HTML source may still hold entities like `&amp;`.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    html::parse(text)
        .map(|doc| doc.children.iter().map(Node::text_content).collect())
        .unwrap_or_else(|_| text.to_string())
}
