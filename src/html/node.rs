//! Immutable HTML node tree.
//!
//! The tree is built once from the parser output and never mutated in place:
//! transformations consume a tree and produce a new one.

use html5ever::QualName;

/// A node of a parsed fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    Doctype(String),
}

/// An attribute on an element.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

/// An element with its attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: QualName,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Text of this node and all descendants, without markup.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        collect_text(self, &mut text);
        text
    }
}

impl Element {
    /// Local (namespace-free) tag name.
    pub fn local_name(&self) -> &str {
        self.name.local.as_ref()
    }

    pub fn is(&self, local_name: &str) -> bool {
        self.local_name().eq_ignore_ascii_case(local_name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.local.as_ref() == name)
            .map(|a| a.value.as_str())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Direct child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// All descendant elements in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        collect_descendants(&self.children, &mut out);
        out
    }

    /// First descendant element matching `pred`, in document order.
    pub fn find<F>(&self, pred: F) -> Option<&Element>
    where
        F: Fn(&Element) -> bool,
    {
        find_in(&self.children, &pred)
    }

    pub fn text_content(&self) -> String {
        let mut text = String::new();
        for child in &self.children {
            collect_text(child, &mut text);
        }
        text
    }

    /// Same element, new children.
    pub fn with_children(self, children: Vec<Node>) -> Element {
        Element { children, ..self }
    }
}

/// All elements in `nodes` and below, in document order.
pub fn elements_in(nodes: &[Node]) -> Vec<&Element> {
    let mut out = Vec::new();
    collect_descendants(nodes, &mut out);
    out
}

/// First element in `nodes` or below matching `pred`.
pub fn find_in<'a, F>(nodes: &'a [Node], pred: &F) -> Option<&'a Element>
where
    F: Fn(&Element) -> bool,
{
    for node in nodes {
        if let Node::Element(el) = node {
            if pred(el) {
                return Some(el);
            }
            if let Some(found) = find_in(&el.children, pred) {
                return Some(found);
            }
        }
    }
    None
}

fn collect_descendants<'a>(nodes: &'a [Node], out: &mut Vec<&'a Element>) {
    for node in nodes {
        if let Node::Element(el) = node {
            out.push(el);
            collect_descendants(&el.children, out);
        }
    }
}

fn collect_text(node: &Node, text: &mut String) {
    match node {
        Node::Text(t) => text.push_str(t),
        Node::Element(el) => {
            for child in &el.children {
                collect_text(child, text);
            }
        }
        Node::Comment(_) | Node::Doctype(_) => {}
    }
}
