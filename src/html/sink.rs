//! html5ever TreeSink that collects a reference-counted scratch tree.
//!
//! The tree builder needs shared mutable handles while parsing; once parsing
//! finishes the scratch tree is converted into the immutable [`Node`] tree
//! and dropped. Neither step recurses deeper than the caller's nesting bound.

use std::borrow::Cow;
use std::cell::RefCell;
use std::mem;
use std::rc::{Rc, Weak};

use html5ever::tendril::StrTendril;
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute as Html5Attribute, QualName};

use super::node::{Attribute, Element, Node};

/// Handle used by the tree builder to reference scratch nodes.
pub type Handle = Rc<SinkNode>;

#[derive(Debug)]
pub enum SinkData {
    Document,
    Doctype {
        name: String,
    },
    Text {
        contents: RefCell<String>,
    },
    Comment {
        contents: String,
    },
    Element {
        name: QualName,
        attrs: RefCell<Vec<Attribute>>,
        template_contents: RefCell<Option<Handle>>,
    },
}

#[derive(Debug)]
pub struct SinkNode {
    data: SinkData,
    parent: RefCell<Option<Weak<SinkNode>>>,
    children: RefCell<Vec<Handle>>,
}

impl SinkNode {
    fn new(data: SinkData) -> Handle {
        Rc::new(SinkNode {
            data,
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
        })
    }

    fn parent(&self) -> Option<Handle> {
        self.parent.borrow().as_ref().and_then(Weak::upgrade)
    }
}

// Dropping a node would otherwise drop its children recursively, one stack
// frame per nesting level.
impl Drop for SinkNode {
    fn drop(&mut self) {
        let mut pending = mem::take(&mut *self.children.borrow_mut());
        while let Some(node) = pending.pop() {
            pending.append(&mut node.children.borrow_mut());
            if let SinkData::Element {
                template_contents, ..
            } = &node.data
            {
                if let Some(contents) = template_contents.borrow_mut().take() {
                    pending.push(contents);
                }
            }
        }
    }
}

/// The scratch tree nests deeper than the requested bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthExceeded;

/// TreeSink building the scratch tree.
///
/// Uses interior mutability because html5ever's TreeSink trait takes `&self`.
pub struct FragmentSink {
    document: Handle,
    quirks_mode: RefCell<QuirksMode>,
}

impl Default for FragmentSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentSink {
    pub fn new() -> Self {
        Self {
            document: SinkNode::new(SinkData::Document),
            quirks_mode: RefCell::new(QuirksMode::NoQuirks),
        }
    }

    /// Convert the parsed scratch tree into owned nodes (document children).
    ///
    /// Fails when elements nest more than `max_depth` levels below the
    /// document, counting `<html>` as level one.
    pub fn into_nodes(self, max_depth: Option<usize>) -> Result<Vec<Node>, DepthExceeded> {
        convert_children(&self.document, 0, max_depth.unwrap_or(usize::MAX))
    }
}

fn convert_children(handle: &Handle, depth: usize, limit: usize) -> Result<Vec<Node>, DepthExceeded> {
    let mut nodes = Vec::new();
    for child in handle.children.borrow().iter() {
        if let Some(node) = convert(child, depth, limit)? {
            nodes.push(node);
        }
    }
    Ok(nodes)
}

fn convert(handle: &Handle, depth: usize, limit: usize) -> Result<Option<Node>, DepthExceeded> {
    let node = match &handle.data {
        SinkData::Document => return Ok(None),
        SinkData::Doctype { name } => Node::Doctype(name.clone()),
        SinkData::Text { contents } => Node::Text(contents.borrow().clone()),
        SinkData::Comment { contents } => Node::Comment(contents.clone()),
        SinkData::Element {
            name,
            attrs,
            template_contents,
        } => {
            let depth = depth + 1;
            if depth > limit {
                return Err(DepthExceeded);
            }
            let children = match &*template_contents.borrow() {
                Some(contents) => convert_children(contents, depth, limit)?,
                None => convert_children(handle, depth, limit)?,
            };
            Node::Element(Element {
                name: name.clone(),
                attrs: attrs.borrow().clone(),
                children,
            })
        }
    };
    Ok(Some(node))
}

fn append_to(parent: &Handle, child: NodeOrText<Handle>) {
    match child {
        NodeOrText::AppendNode(node) => {
            detach(&node);
            *node.parent.borrow_mut() = Some(Rc::downgrade(parent));
            parent.children.borrow_mut().push(node);
        }
        NodeOrText::AppendText(text) => {
            if let Some(last) = parent.children.borrow().last() {
                if let SinkData::Text { contents } = &last.data {
                    contents.borrow_mut().push_str(&text);
                    return;
                }
            }
            let node = SinkNode::new(SinkData::Text {
                contents: RefCell::new(text.to_string()),
            });
            *node.parent.borrow_mut() = Some(Rc::downgrade(parent));
            parent.children.borrow_mut().push(node);
        }
    }
}

fn detach(target: &Handle) {
    if let Some(parent) = target.parent() {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, target));
    }
    *target.parent.borrow_mut() = None;
}

impl TreeSink for FragmentSink {
    type Handle = Handle;
    type Output = Self;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {
        // Lenient like browsers
    }

    fn get_document(&self) -> Self::Handle {
        self.document.clone()
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        static EMPTY: QualName = QualName {
            prefix: None,
            ns: html5ever::ns!(),
            local: html5ever::local_name!(""),
        };

        match &target.data {
            SinkData::Element { name, .. } => name,
            _ => &EMPTY,
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Html5Attribute>,
        flags: ElementFlags,
    ) -> Self::Handle {
        let attrs = attrs
            .into_iter()
            .map(|a| Attribute {
                name: a.name,
                value: a.value.to_string(),
            })
            .collect();

        let template_contents = if flags.template {
            Some(SinkNode::new(SinkData::Document))
        } else {
            None
        };

        SinkNode::new(SinkData::Element {
            name,
            attrs: RefCell::new(attrs),
            template_contents: RefCell::new(template_contents),
        })
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        SinkNode::new(SinkData::Comment {
            contents: text.to_string(),
        })
    }

    fn create_pi(&self, _target: StrTendril, data: StrTendril) -> Self::Handle {
        // Processing instructions only appear in bogus markup; keep them as comments
        SinkNode::new(SinkData::Comment {
            contents: data.to_string(),
        })
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        append_to(parent, child);
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if element.parent().is_some() {
            self.append_before_sibling(element, child);
        } else {
            append_to(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        let doctype = SinkNode::new(SinkData::Doctype {
            name: name.to_string(),
        });
        append_to(&self.document, NodeOrText::AppendNode(doctype));
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        match &target.data {
            SinkData::Element {
                template_contents, ..
            } => template_contents
                .borrow()
                .clone()
                .unwrap_or_else(|| target.clone()),
            _ => target.clone(),
        }
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        *self.quirks_mode.borrow_mut() = mode;
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let Some(parent) = sibling.parent() else {
            return;
        };

        let index = parent
            .children
            .borrow()
            .iter()
            .position(|child| Rc::ptr_eq(child, sibling));
        let Some(index) = index else {
            return;
        };

        let node = match new_node {
            NodeOrText::AppendNode(node) => {
                detach(&node);
                node
            }
            NodeOrText::AppendText(text) => {
                if index > 0 {
                    let children = parent.children.borrow();
                    if let SinkData::Text { contents } = &children[index - 1].data {
                        contents.borrow_mut().push_str(&text);
                        return;
                    }
                }
                SinkNode::new(SinkData::Text {
                    contents: RefCell::new(text.to_string()),
                })
            }
        };

        // Detaching may have shifted the sibling.
        let index = parent
            .children
            .borrow()
            .iter()
            .position(|child| Rc::ptr_eq(child, sibling))
            .unwrap_or(index);

        *node.parent.borrow_mut() = Some(Rc::downgrade(&parent));
        parent.children.borrow_mut().insert(index, node);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Html5Attribute>) {
        if let SinkData::Element {
            attrs: existing, ..
        } = &target.data
        {
            let mut existing = existing.borrow_mut();
            for attr in attrs {
                if !existing.iter().any(|a| a.name == attr.name) {
                    existing.push(Attribute {
                        name: attr.name,
                        value: attr.value.to_string(),
                    });
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        detach(target);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let children: Vec<Handle> = node.children.borrow_mut().drain(..).collect();
        for child in children {
            *child.parent.borrow_mut() = None;
            append_to(new_parent, NodeOrText::AppendNode(child));
        }
    }
}
