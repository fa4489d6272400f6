//! Arena-backed content tree.
//!
//! The tree models the part of a host page the engine augments: elements
//! with attributes and an optional annotation role, and text nodes carrying
//! visible text. Nodes are addressed by [`NodeId`]; removing a node only
//! detaches it, so ids held by a caller never dangle into another node.

use std::cmp::Ordering;
use std::fmt;

use crate::error::AnnotateError;
use crate::models::annotation::{Annotation, NoteId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub tag: String,
    /// Host attributes in source order. Annotation attributes are not stored here.
    pub attributes: Vec<(String, String)>,
    pub annotation: Option<Annotation>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn annotated(annotation: Annotation) -> Self {
        Self {
            tag: "span".to_string(),
            attributes: Vec::new(),
            annotation: Some(annotation),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(Element),
    Text(String),
    /// A host comment. Never visible and never annotated.
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Hierarchical document owned by the host page.
#[derive(Debug, Clone)]
pub struct ContentTree {
    nodes: Vec<NodeData>,
    root: NodeId,
    /// Markup before and after the root element, kept verbatim.
    prologue: String,
    epilogue: String,
}

impl Default for ContentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTree {
    /// Create a tree whose root is an empty `body` element.
    pub fn new() -> Self {
        Self::with_root(Element::new("body"))
    }

    pub fn with_root(root: Element) -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Element(root),
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
            prologue: String::new(),
            epilogue: String::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Declarations, DOCTYPE and comments preceding the root element.
    pub fn prologue(&self) -> &str {
        &self.prologue
    }

    pub fn set_prologue(&mut self, prologue: impl Into<String>) {
        self.prologue = prologue.into();
    }

    /// Whatever trails the root element.
    pub fn epilogue(&self) -> &str {
        &self.epilogue
    }

    pub fn set_epilogue(&mut self, epilogue: impl Into<String>) {
        self.epilogue = epilogue.into();
    }

    // === Node creation ===

    pub fn create_element(&mut self, element: Element) -> NodeId {
        self.push(NodeKind::Element(element))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    pub fn create_comment(&mut self, comment: impl Into<String>) -> NodeId {
        self.push(NodeKind::Comment(comment.into()))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    // === Node access ===

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            NodeKind::Text(_) | NodeKind::Comment(_) => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            NodeKind::Text(_) | NodeKind::Comment(_) => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element(_) | NodeKind::Comment(_) => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Text(_))
    }

    pub fn annotation(&self, id: NodeId) -> Option<&Annotation> {
        self.element(id).and_then(|element| element.annotation.as_ref())
    }

    pub fn set_annotation(&mut self, id: NodeId, annotation: Option<Annotation>) {
        if let Some(element) = self.element_mut(id) {
            element.annotation = annotation;
        }
    }

    /// Number of characters in a text node, 0 for elements.
    pub fn char_len(&self, id: NodeId) -> usize {
        self.text(id).map(|text| text.chars().count()).unwrap_or(0)
    }

    // === Navigation ===

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index
            .checked_sub(1)
            .and_then(|prev| self.children(parent).get(prev).copied())
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&node| self.parent(node))
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.ancestors(id).any(|node| node == self.root)
    }

    /// The node after `id` in document order: its first child, else the next
    /// sibling of the nearest ancestor-or-self that has one.
    pub fn next_in_order(&self, id: NodeId) -> Option<NodeId> {
        match self.children(id).first() {
            Some(&child) => Some(child),
            None => self.next_skipping_children(id),
        }
    }

    /// The node after the whole subtree of `id` in document order.
    pub fn next_skipping_children(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            if let Some(sibling) = self.next_sibling(current) {
                return Some(sibling);
            }
            current = self.parent(current)?;
        }
    }

    /// The node before `id` in document order: the deepest last descendant
    /// of its previous sibling, else its parent.
    pub fn previous_in_order(&self, id: NodeId) -> Option<NodeId> {
        match self.previous_sibling(id) {
            Some(sibling) => Some(self.last_descendant(sibling)),
            None => self.parent(id),
        }
    }

    /// Deepest last descendant of `id`, or `id` itself when it has no children.
    pub fn last_descendant(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(&last) = self.children(current).last() {
            current = last;
        }
        current
    }

    /// Pre-order traversal of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            root: id,
            next: Some(id),
        }
    }

    /// Compare two attached nodes by document order. An ancestor sorts before
    /// its descendants.
    pub fn compare_order(&self, a: NodeId, b: NodeId) -> Ordering {
        self.path_from_root(a).cmp(&self.path_from_root(b))
    }

    fn path_from_root(&self, id: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(index) = self.index_in_parent(current) {
            path.push(index);
            current = self.parent(current).unwrap_or(current);
        }
        path.reverse();
        path
    }

    // === Annotation queries ===

    /// Nearest ancestor (excluding `id`) whose annotation satisfies `predicate`.
    pub fn annotated_ancestor(
        &self,
        id: NodeId,
        predicate: impl Fn(&Annotation) -> bool,
    ) -> Option<NodeId> {
        self.ancestors(id)
            .find(|&node| self.annotation(node).is_some_and(&predicate))
    }

    /// Whether `id` sits inside a note's text payload.
    pub fn in_note_text(&self, id: NodeId) -> bool {
        self.annotated_ancestor(id, |a| matches!(a, Annotation::NoteText))
            .is_some()
    }

    /// A text node with non-whitespace content that belongs to the page's
    /// visible text.
    pub fn is_proper_leaf(&self, id: NodeId) -> bool {
        self.text(id).is_some_and(|text| !text.trim().is_empty()) && !self.in_note_text(id)
    }

    /// Every note element carrying `id`, in document order.
    pub fn note_elements(&self, id: NoteId) -> Vec<NodeId> {
        self.descendants(self.root)
            .filter(|&node| {
                self.annotation(node)
                    .and_then(Annotation::note)
                    .is_some_and(|(note, _)| note == id)
            })
            .collect()
    }

    // === Text content ===

    /// All text below `id`, including note payloads.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// Text below `id` as the reader sees it on the page, excluding note payloads.
    pub fn visible_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut walker = self.descendants(id);
        while let Some(node) = walker.next() {
            if matches!(self.annotation(node), Some(Annotation::NoteText)) {
                walker.skip_children(node);
                continue;
            }
            if let Some(text) = self.text(node) {
                out.push_str(text);
            }
        }
        out
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let NodeKind::Text(current) = &mut self.nodes[id.0].kind {
            *current = text.into();
        }
    }

    // === Mutation ===

    /// Remove `id` from its parent. The node and its subtree stay in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&child| child != id);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    pub fn insert_before(&mut self, reference: NodeId, new: NodeId) -> Result<(), AnnotateError> {
        self.detach(new);
        let parent = self
            .parent(reference)
            .ok_or_else(|| AnnotateError::structural(reference, "node has no parent"))?;
        let index = self
            .index_in_parent(reference)
            .ok_or_else(|| AnnotateError::structural(reference, "node missing from parent"))?;
        self.nodes[parent.0].children.insert(index, new);
        self.nodes[new.0].parent = Some(parent);
        Ok(())
    }

    pub fn insert_after(&mut self, reference: NodeId, new: NodeId) -> Result<(), AnnotateError> {
        self.detach(new);
        let parent = self
            .parent(reference)
            .ok_or_else(|| AnnotateError::structural(reference, "node has no parent"))?;
        let index = self
            .index_in_parent(reference)
            .ok_or_else(|| AnnotateError::structural(reference, "node missing from parent"))?;
        self.nodes[parent.0].children.insert(index + 1, new);
        self.nodes[new.0].parent = Some(parent);
        Ok(())
    }

    /// Put `wrapper` where `node` was and move `node` inside it.
    pub fn wrap(&mut self, node: NodeId, wrapper: NodeId) -> Result<(), AnnotateError> {
        self.insert_before(node, wrapper)?;
        self.append_child(wrapper, node);
        Ok(())
    }

    /// Replace `element` by its children, returning the parent they moved into.
    pub fn unwrap(&mut self, element: NodeId) -> Result<NodeId, AnnotateError> {
        let parent = self
            .parent(element)
            .ok_or_else(|| AnnotateError::structural(element, "element has no parent"))?;
        for child in self.children(element).to_vec() {
            self.insert_before(element, child)?;
        }
        self.detach(element);
        Ok(parent)
    }

    /// Split a text node at a character offset, DOM `splitText` style: `id`
    /// keeps the text before `offset` and the returned sibling, inserted
    /// right after it, holds the rest.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId, AnnotateError> {
        let text = self
            .text(id)
            .ok_or_else(|| AnnotateError::structural(id, "split target is not a text node"))?;
        if self.parent(id).is_none() {
            return Err(AnnotateError::structural(id, "text node has no parent"));
        }
        let at = byte_offset(text, offset);
        let tail = text[at..].to_string();
        let head = text[..at].to_string();

        self.set_text(id, head);
        let rest = self.create_text(tail);
        self.insert_after(id, rest)?;
        Ok(rest)
    }

    /// Merge adjacent text children of `parent` and drop empty ones.
    pub fn normalize(&mut self, parent: NodeId) {
        let mut kept: Vec<NodeId> = Vec::new();
        for child in self.children(parent).to_vec() {
            let Some(text) = self.text(child).map(str::to_owned) else {
                kept.push(child);
                continue;
            };
            if text.is_empty() {
                self.nodes[child.0].parent = None;
                continue;
            }
            match kept.last().copied() {
                Some(previous) if self.is_text(previous) => {
                    if let NodeKind::Text(existing) = &mut self.nodes[previous.0].kind {
                        existing.push_str(&text);
                    }
                    self.nodes[child.0].parent = None;
                }
                _ => kept.push(child),
            }
        }
        self.nodes[parent.0].children = kept;
    }
}

/// Pre-order iterator over a subtree. See [`ContentTree::descendants`].
pub struct Descendants<'a> {
    tree: &'a ContentTree,
    root: NodeId,
    next: Option<NodeId>,
}

impl Descendants<'_> {
    /// Do not descend into `node`; only valid for the node just returned.
    pub fn skip_children(&mut self, node: NodeId) {
        self.next = self.after_subtree(node);
    }

    fn after_subtree(&self, node: NodeId) -> Option<NodeId> {
        let mut current = node;
        loop {
            if current == self.root {
                return None;
            }
            if let Some(sibling) = self.tree.next_sibling(current) {
                return Some(sibling);
            }
            current = self.tree.parent(current)?;
        }
    }
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = match self.tree.children(current).first() {
            Some(&child) => Some(child),
            None => self.after_subtree(current),
        };
        Some(current)
    }
}

/// Byte index of a character offset, clamped to the end of the string.
pub(crate) fn byte_offset(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}
