//! Note engine: attach free text to a span of the page and navigate to it.
//!
//! A note confined to one container is a single *solid* wrapper around the
//! noted run. A note spanning containers is a *start*/*end* pair of boundary
//! elements framing the run, which itself stays unwrapped. Either way every
//! note element carries the id and a payload element with the note text.

use std::collections::BTreeMap;

use crate::editing::marker::{isolate, marker_of, split_marker_around};
use crate::editing::resolve::{TextLeaf, resolve_selection, resolve_text_leaves};
use crate::error::AnnotateError;
use crate::models::{
    Annotation, ContentTree, DEFAULT_LINK_WIDTH, Element, NodeId, NoteId, NoteKind, NoteLink, Page,
};

/// Host surface able to bring a node on screen.
pub trait Viewport {
    fn scroll_into_view(&mut self, tree: &ContentTree, node: NodeId);
}

/// Creates and removes notes and keeps the derived list of note links.
#[derive(Debug, Clone)]
pub struct NoteEngine {
    links: Option<Vec<NoteLink>>,
    link_width: usize,
}

impl Default for NoteEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteEngine {
    pub fn new() -> Self {
        Self::with_link_width(DEFAULT_LINK_WIDTH)
    }

    /// Engine whose links show at most `link_width` characters of note text.
    pub fn with_link_width(link_width: usize) -> Self {
        Self {
            links: None,
            link_width,
        }
    }

    /// Whether `node` (or its parent) is part of a note, or the current
    /// selection touches noted text.
    pub fn has_note(&self, page: &Page, node: Option<NodeId>) -> bool {
        let tree = &page.tree;
        if let Some(node) = node
            && (carries_note(tree, node) || tree.parent(node).is_some_and(|p| carries_note(tree, p)))
        {
            return true;
        }
        page.has_live_selection()
            && resolve_selection(tree, &page.selection)
                .iter()
                .any(|leaf| note_at(tree, leaf.node).is_some())
    }

    /// Attach `text` to the selected run (or the focused node's text).
    ///
    /// Returns `None` when `text` is empty, when there is nothing to attach
    /// to, when the run already overlaps a note, or when no unused id is left.
    pub fn create_note(
        &mut self,
        page: &mut Page,
        text: &str,
        focused: Option<NodeId>,
    ) -> Result<Option<NoteLink>, AnnotateError> {
        if text.is_empty() {
            return Ok(None);
        }

        let tree = &page.tree;
        let leaves: Vec<TextLeaf> = if page.has_live_selection() {
            page.selection
                .ranges()
                .iter()
                .map(|range| resolve_text_leaves(tree, range))
                .find(|leaves| !leaves.is_empty())
                .unwrap_or_default()
        } else if let Some(node) = focused {
            tree.descendants(node)
                .filter(|&leaf| tree.is_proper_leaf(leaf))
                .map(|leaf| TextLeaf::whole(tree, leaf))
                .collect()
        } else {
            return Ok(None);
        };

        if leaves.is_empty() {
            return Ok(None);
        }
        if let Some(existing) = leaves.iter().find_map(|leaf| note_at(tree, leaf.node)) {
            log::debug!("create_note: run overlaps note {existing}");
            return Ok(None);
        }

        let Some(id) = next_note_id(tree) else {
            log::warn!("create_note: note ids exhausted");
            return Ok(None);
        };
        let tree = &mut page.tree;

        // Marking and noting exclude each other: drop the colour of every
        // covered character first.
        let mut pieces = Vec::with_capacity(leaves.len());
        for leaf in leaves.iter().rev() {
            pieces.push(strip_marker(tree, *leaf)?);
        }
        pieces.reverse();

        let (first, last) = match (pieces.first(), pieces.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Ok(None),
        };
        let parent = tree.parent(first);
        let solid = pieces.iter().all(|&piece| tree.parent(piece) == parent);

        if solid {
            wrap_solid(tree, first, last, id, text)?;
        } else {
            let end = note_element(tree, id, NoteKind::End, text);
            tree.insert_after(last, end)?;
            let start = note_element(tree, id, NoteKind::Start, text);
            tree.insert_before(first, start)?;
        }

        let mut parents: Vec<NodeId> = pieces.iter().filter_map(|&p| tree.parent(p)).collect();
        parents.dedup();
        for parent in parents {
            tree.normalize(parent);
        }

        log::debug!(
            "create_note: note {id} as {}",
            if solid { "solid" } else { "start/end" }
        );
        page.selection.collapse();
        self.invalidate();
        Ok(Some(NoteLink::new(id, text, self.link_width)))
    }

    /// Remove the note at `focused`, or the first note under the selection.
    ///
    /// Solid wrappers are replaced by the text they enclosed; start/end
    /// boundaries are deleted and the span between them is left untouched.
    pub fn remove_note(
        &mut self,
        page: &mut Page,
        focused: Option<NodeId>,
    ) -> Result<Option<NoteId>, AnnotateError> {
        let tree = &page.tree;
        let id = focused
            .and_then(|node| direct_note_id(tree, node))
            .or_else(|| {
                if !page.has_live_selection() {
                    return None;
                }
                resolve_selection(tree, &page.selection)
                    .iter()
                    .find_map(|leaf| note_at(tree, leaf.node))
            });
        let Some(id) = id else {
            return Ok(None);
        };

        let elements = tree.note_elements(id);
        if elements.is_empty() {
            return Ok(None);
        }
        let count = |kind: NoteKind| {
            elements
                .iter()
                .filter(|&&node| tree.annotation(node).and_then(Annotation::note) == Some((id, kind)))
                .count()
        };
        if count(NoteKind::Start) != count(NoteKind::End) {
            return Err(AnnotateError::UnmatchedBoundary { id });
        }

        let tree = &mut page.tree;
        for element in elements {
            let kind = tree.annotation(element).and_then(Annotation::note).map(|(_, kind)| kind);
            let parent = match kind {
                Some(NoteKind::Solid) => {
                    for child in tree.children(element).to_vec() {
                        if matches!(tree.annotation(child), Some(Annotation::NoteText)) {
                            tree.detach(child);
                        }
                    }
                    tree.unwrap(element)?
                }
                _ => {
                    let parent = tree.parent(element).ok_or_else(|| {
                        AnnotateError::structural(element, "note boundary has no parent")
                    })?;
                    tree.detach(element);
                    parent
                }
            };
            tree.normalize(parent);
        }

        log::debug!("remove_note: removed note {id}");
        page.selection.collapse();
        self.invalidate();
        Ok(Some(id))
    }

    /// Note links in ascending id order, one per note.
    ///
    /// Computed on first use and cached until the next create or remove.
    pub fn note_links(&mut self, tree: &ContentTree) -> &[NoteLink] {
        let width = self.link_width;
        self.links.get_or_insert_with(|| collect_links(tree, width))
    }

    pub fn invalidate(&mut self) {
        self.links = None;
    }

    /// Scroll the first element of note `id` into view. Returns false when
    /// the note does not exist.
    pub fn go_to_note(
        &self,
        tree: &ContentTree,
        id: NoteId,
        viewport: &mut impl Viewport,
    ) -> bool {
        match tree.note_elements(id).first() {
            Some(&node) => {
                viewport.scroll_into_view(tree, node);
                true
            }
            None => {
                log::debug!("go_to_note: note {id} not found");
                false
            }
        }
    }
}

/// The note covering `node`: an enclosing solid note, or a start/end pair
/// the node sits between.
pub fn note_at(tree: &ContentTree, node: NodeId) -> Option<NoteId> {
    if let Some(solid) = tree.annotated_ancestor(node, |a| {
        matches!(a, Annotation::Note { kind: NoteKind::Solid, .. })
    }) {
        return tree.annotation(solid).and_then(Annotation::note).map(|(id, _)| id);
    }

    // Notes never overlap, so the nearest preceding boundary decides.
    let mut current = tree.previous_in_order(node);
    while let Some(candidate) = current {
        match tree.annotation(candidate).and_then(Annotation::note) {
            Some((id, NoteKind::Start)) => return Some(id),
            Some((_, NoteKind::End)) => return None,
            _ => {}
        }
        current = tree.previous_in_order(candidate);
    }
    None
}

/// One more than the largest note id on the page, 1 when there is none.
///
/// `None` when the largest id is already `u32::MAX`.
pub fn next_note_id(tree: &ContentTree) -> Option<NoteId> {
    match tree
        .descendants(tree.root())
        .filter_map(|node| tree.annotation(node).and_then(Annotation::note))
        .map(|(id, _)| id)
        .max()
    {
        Some(largest) => largest.next(),
        None => Some(NoteId::first()),
    }
}

/// Whether any note element remains in the tree.
pub fn any_note(tree: &ContentTree) -> bool {
    tree.descendants(tree.root())
        .any(|node| tree.annotation(node).and_then(Annotation::note).is_some())
}

/// Text held in a note element's payload.
pub fn note_text(tree: &ContentTree, note: NodeId) -> String {
    tree.children(note)
        .iter()
        .find(|&&child| matches!(tree.annotation(child), Some(Annotation::NoteText)))
        .map(|&payload| tree.text_content(payload))
        .unwrap_or_default()
}

fn collect_links(tree: &ContentTree, width: usize) -> Vec<NoteLink> {
    let mut links = BTreeMap::new();
    for node in tree.descendants(tree.root()) {
        if let Some((id, _)) = tree.annotation(node).and_then(Annotation::note) {
            links
                .entry(id)
                .or_insert_with(|| NoteLink::new(id, &note_text(tree, node), width));
        }
    }
    links.into_values().collect()
}

fn carries_note(tree: &ContentTree, node: NodeId) -> bool {
    matches!(
        tree.annotation(node),
        Some(Annotation::Note { .. } | Annotation::NoteText)
    )
}

/// Id carried by `node` or its parent, looking through a payload to its note.
fn direct_note_id(tree: &ContentTree, node: NodeId) -> Option<NoteId> {
    [Some(node), tree.parent(node)]
        .into_iter()
        .flatten()
        .find_map(|candidate| match tree.annotation(candidate)? {
            Annotation::Note { id, .. } => Some(*id),
            Annotation::NoteText => tree
                .parent(candidate)
                .and_then(|note| tree.annotation(note))
                .and_then(Annotation::note)
                .map(|(id, _)| id),
            Annotation::Marker { .. } => None,
        })
}

/// Isolate a leaf's covered text and take it out of any marker.
fn strip_marker(tree: &mut ContentTree, leaf: TextLeaf) -> Result<NodeId, AnnotateError> {
    let piece = isolate(tree, leaf)?;
    if let Some(marker) = marker_of(tree, piece) {
        split_marker_around(tree, marker, piece)?;
        tree.unwrap(marker)?;
    }
    Ok(piece)
}

fn wrap_solid(
    tree: &mut ContentTree,
    first: NodeId,
    last: NodeId,
    id: NoteId,
    text: &str,
) -> Result<(), AnnotateError> {
    let parent = tree
        .parent(first)
        .ok_or_else(|| AnnotateError::structural(first, "noted text has no parent"))?;
    let from = tree
        .index_in_parent(first)
        .ok_or_else(|| AnnotateError::structural(first, "noted text missing from parent"))?;
    let to = tree
        .index_in_parent(last)
        .ok_or_else(|| AnnotateError::structural(last, "noted text missing from parent"))?;
    let run = tree.children(parent)[from..=to].to_vec();

    let note = tree.create_element(Element::annotated(Annotation::Note {
        id,
        kind: NoteKind::Solid,
    }));
    tree.insert_before(first, note)?;
    for node in run {
        tree.append_child(note, node);
    }
    let payload = note_payload(tree, text);
    tree.append_child(note, payload);
    Ok(())
}

fn note_element(tree: &mut ContentTree, id: NoteId, kind: NoteKind, text: &str) -> NodeId {
    let element = tree.create_element(Element::annotated(Annotation::Note { id, kind }));
    let payload = note_payload(tree, text);
    tree.append_child(element, payload);
    element
}

fn note_payload(tree: &mut ContentTree, text: &str) -> NodeId {
    let payload = tree.create_element(Element::annotated(Annotation::NoteText));
    let content = tree.create_text(text);
    tree.append_child(payload, content);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::marker::mark;
    use crate::models::{Boundary, Selection, TextRange};
    use crate::tests::{page_from, render, select, text_node};
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct RecordingViewport {
        scrolled_to: Vec<NodeId>,
    }

    impl Viewport for RecordingViewport {
        fn scroll_into_view(&mut self, _tree: &ContentTree, node: NodeId) {
            self.scrolled_to.push(node);
        }
    }

    fn id(value: u32) -> NoteId {
        NoteId::new(value).unwrap()
    }

    fn select_across(page: &mut Page, from: (&str, usize), to: (&str, usize)) {
        let start = text_node(&page.tree, from.0);
        let end = text_node(&page.tree, to.0);
        page.selection = Selection::single(TextRange::new(
            Boundary::new(start, from.1),
            Boundary::new(end, to.1),
        ));
    }

    #[test]
    fn test_solid_note_wraps_single_leaf() {
        let mut page = page_from("<body><p>Hello world</p></body>");
        let mut notes = NoteEngine::new();
        select(&mut page, "world");

        let link = notes.create_note(&mut page, "remark", None).unwrap().unwrap();

        assert_eq!(link, NoteLink::new(id(1), "remark", DEFAULT_LINK_WIDTH));
        insta::assert_snapshot!(
            render(&page.tree),
            @r#"<body><p>Hello <span data-pagemark-note="1" data-pagemark-kind="solid">world<span data-pagemark-note-text="">remark</span></span></p></body>"#
        );
        assert_eq!(page.tree.visible_text(page.tree.root()), "Hello world");
    }

    #[test]
    fn test_solid_note_replaces_marker() {
        let mut page = page_from("<body><p>Hello world</p></body>");
        let mut notes = NoteEngine::new();
        select(&mut page, "world");
        mark(&mut page, &"green".into(), None).unwrap();

        select(&mut page, "world");
        notes.create_note(&mut page, "remark", None).unwrap().unwrap();

        insta::assert_snapshot!(
            render(&page.tree),
            @r#"<body><p>Hello <span data-pagemark-note="1" data-pagemark-kind="solid">world<span data-pagemark-note-text="">remark</span></span></p></body>"#
        );
    }

    #[test]
    fn test_cross_node_note_inserts_boundaries() {
        let mut page = page_from("<body><p>first para</p><p>second para</p></body>");
        let mut notes = NoteEngine::new();
        select_across(&mut page, ("first para", 6), ("second para", 6));

        let link = notes.create_note(&mut page, "remark", None).unwrap().unwrap();

        assert_eq!(link.text, "1: remark");
        insta::assert_snapshot!(
            render(&page.tree),
            @r#"<body><p>first <span data-pagemark-note="1" data-pagemark-kind="start"><span data-pagemark-note-text="">remark</span></span>para</p><p>second<span data-pagemark-note="1" data-pagemark-kind="end"><span data-pagemark-note-text="">remark</span></span> para</p></body>"#
        );
        assert_eq!(
            page.tree.visible_text(page.tree.root()),
            "first parasecond para"
        );
    }

    #[test]
    fn test_note_ids_are_max_plus_one() {
        let mut page = page_from("<body><p>alpha</p><p>beta</p><p>gamma</p></body>");
        let mut notes = NoteEngine::new();

        select(&mut page, "alpha");
        let first = notes.create_note(&mut page, "a", None).unwrap().unwrap();
        select(&mut page, "beta");
        let second = notes.create_note(&mut page, "b", None).unwrap().unwrap();
        assert_eq!((first.id, second.id), (id(1), id(2)));

        let alpha = text_node(&page.tree, "alpha");
        assert_eq!(notes.remove_note(&mut page, Some(alpha)).unwrap(), Some(id(1)));

        select(&mut page, "gamma");
        let third = notes.create_note(&mut page, "c", None).unwrap().unwrap();
        assert_eq!(third.id, id(3));
    }

    #[test]
    fn test_create_note_refuses_when_ids_are_exhausted() {
        let mut page = page_from(
            r#"<body><p><span data-pagemark-note="4294967295" data-pagemark-kind="solid">last<span data-pagemark-note-text="">x</span></span></p><p>fresh</p></body>"#,
        );
        let mut notes = NoteEngine::new();
        assert_eq!(next_note_id(&page.tree), None);

        select(&mut page, "fresh");
        assert_eq!(notes.create_note(&mut page, "again", None).unwrap(), None);
        assert_eq!(
            notes.note_links(&page.tree).iter().map(|l| l.id).collect::<Vec<_>>(),
            vec![id(u32::MAX)]
        );
    }

    #[test]
    fn test_create_note_requires_text_and_target() {
        let mut page = page_from("<body><p>Hello</p></body>");
        let mut notes = NoteEngine::new();

        assert_eq!(notes.create_note(&mut page, "remark", None).unwrap(), None);

        select(&mut page, "Hello");
        assert_eq!(notes.create_note(&mut page, "", None).unwrap(), None);
        assert_eq!(render(&page.tree), "<body><p>Hello</p></body>");
    }

    #[test]
    fn test_create_note_on_focused_node() {
        let mut page = page_from("<body><p>Hello</p><p>other</p></body>");
        let mut notes = NoteEngine::new();
        let paragraph = page.tree.children(page.tree.root())[0];

        notes.create_note(&mut page, "whole", Some(paragraph)).unwrap().unwrap();

        insta::assert_snapshot!(
            render(&page.tree),
            @r#"<body><p><span data-pagemark-note="1" data-pagemark-kind="solid">Hello<span data-pagemark-note-text="">whole</span></span></p><p>other</p></body>"#
        );
    }

    #[test]
    fn test_overlapping_note_is_refused() {
        let mut page = page_from("<body><p>Hello world</p></body>");
        let mut notes = NoteEngine::new();
        select(&mut page, "world");
        notes.create_note(&mut page, "first", None).unwrap();

        select(&mut page, "Hello world");
        assert_eq!(notes.create_note(&mut page, "second", None).unwrap(), None);
        assert_eq!(notes.note_links(&page.tree).len(), 1);
    }

    #[test]
    fn test_remove_solid_note_restores_text() {
        let mut page = page_from("<body><p>Hello world</p></body>");
        let mut notes = NoteEngine::new();
        select(&mut page, "world");
        notes.create_note(&mut page, "remark", None).unwrap();

        select(&mut page, "world");
        assert_eq!(notes.remove_note(&mut page, None).unwrap(), Some(id(1)));

        insta::assert_snapshot!(render(&page.tree), @"<body><p>Hello world</p></body>");
        assert!(!any_note(&page.tree));
    }

    #[test]
    fn test_remove_cross_node_note_via_selection() {
        let mut page = page_from("<body><p>first para</p><p>second para</p></body>");
        let mut notes = NoteEngine::new();
        select_across(&mut page, ("first para", 0), ("second para", 11));
        notes.create_note(&mut page, "remark", None).unwrap();

        select_across(&mut page, ("first para", 0), ("second para", 11));
        assert_eq!(notes.remove_note(&mut page, None).unwrap(), Some(id(1)));

        insta::assert_snapshot!(
            render(&page.tree),
            @"<body><p>first para</p><p>second para</p></body>"
        );
        assert!(notes.note_links(&page.tree).is_empty());
    }

    #[test]
    fn test_remove_note_via_focused_payload() {
        let mut page = page_from("<body><p>Hello world</p></body>");
        let mut notes = NoteEngine::new();
        select(&mut page, "Hello");
        notes.create_note(&mut page, "remark", None).unwrap();
        let payload_text = text_node(&page.tree, "remark");

        assert_eq!(
            notes.remove_note(&mut page, Some(payload_text)).unwrap(),
            Some(id(1))
        );
        assert_eq!(render(&page.tree), "<body><p>Hello world</p></body>");
    }

    #[test]
    fn test_remove_note_without_target() {
        let mut page = page_from("<body><p>Hello world</p></body>");
        let mut notes = NoteEngine::new();

        assert_eq!(notes.remove_note(&mut page, None).unwrap(), None);
        select(&mut page, "Hello");
        assert_eq!(notes.remove_note(&mut page, None).unwrap(), None);
    }

    #[test]
    fn test_unmatched_boundary_is_structural_error() {
        let mut page = page_from(
            r#"<body><p><span data-pagemark-note="4" data-pagemark-kind="start"><span data-pagemark-note-text="">x</span></span>dangling</p></body>"#,
        );
        let mut notes = NoteEngine::new();
        select(&mut page, "dangling");

        let err = notes.remove_note(&mut page, None).unwrap_err();

        assert_eq!(err, AnnotateError::UnmatchedBoundary { id: id(4) });
    }

    #[test]
    fn test_note_links_sorted_unique_and_cached() {
        let mut page = page_from(
            r#"<body><p><span data-pagemark-note="3" data-pagemark-kind="start"><span data-pagemark-note-text="">third note</span></span>a</p><p>b<span data-pagemark-note="3" data-pagemark-kind="end"><span data-pagemark-note-text="">third note</span></span><span data-pagemark-note="1" data-pagemark-kind="solid">c<span data-pagemark-note-text="">a rather long first note</span></span></p></body>"#,
        );
        let mut notes = NoteEngine::new();

        let links = notes.note_links(&page.tree).to_vec();
        assert_eq!(
            links,
            vec![
                NoteLink {
                    id: id(1),
                    text: "1: a rather long f...".to_string()
                },
                NoteLink {
                    id: id(3),
                    text: "3: third note".to_string()
                },
            ]
        );

        // Edits made behind the engine's back are not seen until invalidated.
        let c = text_node(&page.tree, "c");
        let solid = page.tree.parent(c).unwrap();
        page.tree.unwrap(solid).unwrap();
        assert_eq!(notes.note_links(&page.tree).len(), 2);
        notes.invalidate();
        assert_eq!(notes.note_links(&page.tree).len(), 1);
    }

    #[test]
    fn test_has_note() {
        let mut page = page_from("<body><p>Hello world</p><p>other</p></body>");
        let mut notes = NoteEngine::new();
        select(&mut page, "world");
        notes.create_note(&mut page, "remark", None).unwrap();

        let world = text_node(&page.tree, "world");
        let other = text_node(&page.tree, "other");
        assert!(notes.has_note(&page, Some(world)));
        assert!(!notes.has_note(&page, Some(other)));
        assert!(!notes.has_note(&page, None));

        select(&mut page, "world");
        assert!(notes.has_note(&page, None));
    }

    #[test]
    fn test_note_at_inside_span() {
        let mut page = page_from("<body><p>one</p><p>two</p><p>three</p><p>four</p></body>");
        let mut notes = NoteEngine::new();
        select_across(&mut page, ("one", 0), ("three", 5));
        notes.create_note(&mut page, "span", None).unwrap();

        assert_eq!(note_at(&page.tree, text_node(&page.tree, "two")), Some(id(1)));
        assert_eq!(note_at(&page.tree, text_node(&page.tree, "four")), None);
    }

    #[test]
    fn test_mark_skips_noted_text() {
        let mut page = page_from("<body><p>Hello world</p></body>");
        let mut notes = NoteEngine::new();
        select(&mut page, "world");
        notes.create_note(&mut page, "remark", None).unwrap();

        select(&mut page, "Hello world");
        assert!(mark(&mut page, &"green".into(), None).unwrap());

        insta::assert_snapshot!(
            render(&page.tree),
            @r#"<body><p><span data-pagemark-marker="green">Hello </span><span data-pagemark-note="1" data-pagemark-kind="solid">world<span data-pagemark-note-text="">remark</span></span></p></body>"#
        );
    }

    #[test]
    fn test_go_to_note() {
        let mut page = page_from("<body><p>Hello world</p></body>");
        let mut notes = NoteEngine::new();
        select(&mut page, "world");
        notes.create_note(&mut page, "remark", None).unwrap();
        let mut viewport = RecordingViewport::default();

        assert!(notes.go_to_note(&page.tree, id(1), &mut viewport));
        assert!(!notes.go_to_note(&page.tree, id(9), &mut viewport));

        let target = page.tree.note_elements(id(1))[0];
        assert_eq!(viewport.scrolled_to, vec![target]);
    }
}
