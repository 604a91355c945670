use crate::markup::{MarkupElement, MarkupNode};

/// The MarkupVisitor trait is the single traversal mechanism for markup trees.
///
/// Rules:
/// 1. Traversal is depth-first in document order.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers call the `walk_*` functions to continue traversal unless pruning is intended.
pub trait MarkupVisitor {
    fn visit_nodes(&mut self, nodes: &[MarkupNode]) {
        walk_nodes(self, nodes);
    }

    fn visit_node(&mut self, node: &MarkupNode) {
        walk_node(self, node);
    }

    fn visit_element(&mut self, element: &MarkupElement) {
        walk_element(self, element);
    }

    fn visit_text(&mut self, _text: &str) {
        // Leaf node
    }

    fn visit_comment(&mut self, _comment: &str) {
        // Leaf node
    }
}

pub fn walk_nodes<V: MarkupVisitor + ?Sized>(visitor: &mut V, nodes: &[MarkupNode]) {
    for node in nodes {
        visitor.visit_node(node);
    }
}

pub fn walk_node<V: MarkupVisitor + ?Sized>(visitor: &mut V, node: &MarkupNode) {
    match node {
        MarkupNode::Element(el) => visitor.visit_element(el),
        MarkupNode::Text(text) => visitor.visit_text(text),
        MarkupNode::Comment(comment) => visitor.visit_comment(comment),
    }
}

pub fn walk_element<V: MarkupVisitor + ?Sized>(visitor: &mut V, element: &MarkupElement) {
    visitor.visit_nodes(&element.children);
}
