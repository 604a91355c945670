//! Tolerant markup tree.
//!
//! html5ever does the actual parsing (unclosed tags, bad entities and stray
//! end tags are all recovered from, never reported as failures). The rcdom it
//! produces is converted into the small [`MarkupNode`] tree so the rest of the
//! compiler pattern-matches on variants instead of probing rcdom handles.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Element(MarkupElement),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupElement {
    /// Lowercased by html5ever
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<MarkupNode>,
}

impl MarkupElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Concatenated text of the direct text children. Script and style
    /// elements hold their raw content this way.
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                MarkupNode::Text(value) => Some(value.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Parse markup into a tree. html5ever reads from an in-memory buffer, so the
/// only failure mode is an I/O error that cannot happen; it maps to an empty
/// tree.
pub fn parse_markup(text: &str) -> Vec<MarkupNode> {
    let dom = match parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut text.as_bytes())
    {
        Ok(dom) => dom,
        Err(e) => {
            tracing::debug!("markup reader failed: {}", e);
            return Vec::new();
        }
    };

    convert_children(&dom.document)
}

fn convert_children(handle: &Handle) -> Vec<MarkupNode> {
    handle
        .children
        .borrow()
        .iter()
        .flat_map(convert_node)
        .collect()
}

fn convert_node(handle: &Handle) -> Vec<MarkupNode> {
    match &handle.data {
        NodeData::Document => convert_children(handle),
        NodeData::Element { name, attrs, .. } => {
            let attrs = attrs
                .borrow()
                .iter()
                .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                .collect();
            vec![MarkupNode::Element(MarkupElement {
                name: name.local.to_string(),
                attrs,
                children: convert_children(handle),
            })]
        }
        NodeData::Text { contents } => vec![MarkupNode::Text(contents.borrow().to_string())],
        NodeData::Comment { contents } => vec![MarkupNode::Comment(contents.to_string())],
        NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => vec![],
    }
}
