//! Marker engine: apply, remove and recolour highlight markers.
//!
//! A marker is an element annotated with [`Annotation::Marker`]. Markers only
//! ever wrap text, never nest, and each wraps one run of a single colour.
//! Adjacent markers of the same colour are left as separate elements.

use std::collections::BTreeSet;

use crate::editing::note::note_at;
use crate::editing::resolve::{TextLeaf, resolve_selection};
use crate::error::AnnotateError;
use crate::models::{Annotation, ColourToken, ContentTree, Element, NodeId, Page};

/// Colours applied to the current selection, or to markers at `focused` when
/// nothing is selected.
///
/// `None` means there is nothing to act on; an empty set means the target is
/// unmarked.
pub fn colour_tokens_for_selection(
    page: &Page,
    focused: Option<NodeId>,
) -> Option<BTreeSet<ColourToken>> {
    let tree = &page.tree;
    let markers = if page.has_live_selection() {
        resolve_selection(tree, &page.selection)
            .iter()
            .filter_map(|leaf| marker_of(tree, leaf.node))
            .collect::<Vec<_>>()
    } else {
        markers_at(tree, focused?)
    };

    Some(
        markers
            .into_iter()
            .filter_map(|marker| marker_colour(tree, marker).cloned())
            .collect(),
    )
}

/// Highlight the selection (or recolour markers under `focused`) with `colour`.
///
/// Returns whether any text was newly wrapped or recoloured. Leaves already
/// carrying `colour` and leaves inside a note are left alone.
pub fn mark(
    page: &mut Page,
    colour: &ColourToken,
    focused: Option<NodeId>,
) -> Result<bool, AnnotateError> {
    let leaves = if page.has_live_selection() {
        resolve_selection(&page.tree, &page.selection)
    } else if let Some(node) = focused {
        marker_leaves(&page.tree, node)
    } else {
        return Ok(false);
    };

    let mut batch = Batch::new("mark");
    // Last to first: splitting a node keeps its head in place, so offsets of
    // earlier leaves on the same node stay valid.
    for leaf in leaves.into_iter().rev() {
        batch.record(mark_leaf(&mut page.tree, leaf, colour));
    }
    page.selection.collapse();
    batch.finish()
}

/// Remove markers covering the selection, or within/at `focused`.
///
/// With a selection only the covered part of a marker is unwrapped; the rest
/// keeps its colour.
pub fn unmark(page: &mut Page, focused: Option<NodeId>) -> Result<bool, AnnotateError> {
    let mut batch = Batch::new("unmark");

    if page.has_live_selection() {
        let leaves = resolve_selection(&page.tree, &page.selection);
        for leaf in leaves.into_iter().rev() {
            batch.record(unmark_leaf(&mut page.tree, leaf));
        }
    } else if let Some(node) = focused {
        for marker in markers_at(&page.tree, node) {
            batch.record(unwrap_marker(&mut page.tree, marker).map(|_| true));
        }
    } else {
        return Ok(false);
    }

    page.selection.collapse();
    batch.finish()
}

/// Recolour whole markers covering the selection (or at `focused`).
///
/// When the target carries no marker yet this behaves like [`mark`].
pub fn change_colour(
    page: &mut Page,
    colour: &ColourToken,
    focused: Option<NodeId>,
) -> Result<bool, AnnotateError> {
    let markers = if page.has_live_selection() {
        let mut markers = Vec::new();
        for leaf in resolve_selection(&page.tree, &page.selection) {
            if let Some(marker) = marker_of(&page.tree, leaf.node)
                && !markers.contains(&marker)
            {
                markers.push(marker);
            }
        }
        markers
    } else if let Some(node) = focused {
        markers_at(&page.tree, node)
    } else {
        return Ok(false);
    };

    if markers.is_empty() {
        return mark(page, colour, focused);
    }

    let mut changed = false;
    for marker in markers {
        if marker_colour(&page.tree, marker) != Some(colour) {
            page.tree.set_annotation(
                marker,
                Some(Annotation::Marker {
                    colour: colour.clone(),
                }),
            );
            changed = true;
        }
    }
    page.selection.collapse();
    log::debug!("change_colour to {colour}: changed={changed}");
    Ok(changed)
}

/// Whether any marker remains anywhere in the tree.
pub fn any_marker(tree: &ContentTree) -> bool {
    tree.descendants(tree.root())
        .any(|node| is_marker(tree, node))
}

pub fn is_marker(tree: &ContentTree, node: NodeId) -> bool {
    matches!(tree.annotation(node), Some(Annotation::Marker { .. }))
}

/// The marker enclosing `node`, if any.
pub fn marker_of(tree: &ContentTree, node: NodeId) -> Option<NodeId> {
    tree.annotated_ancestor(node, |a| matches!(a, Annotation::Marker { .. }))
}

pub fn marker_colour(tree: &ContentTree, marker: NodeId) -> Option<&ColourToken> {
    tree.annotation(marker).and_then(Annotation::marker_colour)
}

/// Markers a focused node refers to: the marker it is or sits in, otherwise
/// every marker below it.
pub fn markers_at(tree: &ContentTree, node: NodeId) -> Vec<NodeId> {
    if is_marker(tree, node) {
        return vec![node];
    }
    if let Some(marker) = marker_of(tree, node) {
        return vec![marker];
    }
    tree.descendants(node)
        .filter(|&descendant| is_marker(tree, descendant))
        .collect()
}

fn marker_leaves(tree: &ContentTree, node: NodeId) -> Vec<TextLeaf> {
    markers_at(tree, node)
        .into_iter()
        .flat_map(|marker| tree.descendants(marker).collect::<Vec<_>>())
        .filter(|&descendant| tree.is_proper_leaf(descendant))
        .map(|leaf| TextLeaf::whole(tree, leaf))
        .collect()
}

fn mark_leaf(
    tree: &mut ContentTree,
    leaf: TextLeaf,
    colour: &ColourToken,
) -> Result<bool, AnnotateError> {
    if note_at(tree, leaf.node).is_some() {
        log::trace!("leaf {} is inside a note, not marking", leaf.node);
        return Ok(false);
    }

    match marker_of(tree, leaf.node) {
        None => {
            let piece = isolate(tree, leaf)?;
            let marker = tree.create_element(Element::annotated(Annotation::Marker {
                colour: colour.clone(),
            }));
            tree.wrap(piece, marker)?;
            Ok(true)
        }
        Some(marker) if marker_colour(tree, marker) == Some(colour) => Ok(false),
        Some(marker) => {
            let piece = isolate(tree, leaf)?;
            split_marker_around(tree, marker, piece)?;
            tree.set_annotation(
                marker,
                Some(Annotation::Marker {
                    colour: colour.clone(),
                }),
            );
            Ok(true)
        }
    }
}

fn unmark_leaf(tree: &mut ContentTree, leaf: TextLeaf) -> Result<bool, AnnotateError> {
    let Some(marker) = marker_of(tree, leaf.node) else {
        return Ok(false);
    };
    let piece = isolate(tree, leaf)?;
    split_marker_around(tree, marker, piece)?;
    unwrap_marker(tree, marker)?;
    Ok(true)
}

/// Replace a marker by plain text carrying the same characters.
fn unwrap_marker(tree: &mut ContentTree, marker: NodeId) -> Result<(), AnnotateError> {
    let parent = tree.unwrap(marker)?;
    tree.normalize(parent);
    Ok(())
}

/// Split a leaf's text node so the covered characters sit in a node of their
/// own, which is returned.
pub(crate) fn isolate(tree: &mut ContentTree, leaf: TextLeaf) -> Result<NodeId, AnnotateError> {
    if leaf.end < tree.char_len(leaf.node) {
        tree.split_text(leaf.node, leaf.end)?;
    }
    if leaf.start > 0 {
        return tree.split_text(leaf.node, leaf.start);
    }
    Ok(leaf.node)
}

/// Leave `piece` as the only child of `marker`, moving the text before and
/// after it into new markers of the original colour on either side.
pub(crate) fn split_marker_around(
    tree: &mut ContentTree,
    marker: NodeId,
    piece: NodeId,
) -> Result<(), AnnotateError> {
    if tree.parent(piece) != Some(marker) {
        return Err(AnnotateError::structural(
            marker,
            "marker does not directly contain the text to split",
        ));
    }
    let template = tree
        .element(marker)
        .cloned()
        .ok_or_else(|| AnnotateError::structural(marker, "marker is not an element"))?;

    let children = tree.children(marker).to_vec();
    let index = tree
        .index_in_parent(piece)
        .ok_or_else(|| AnnotateError::structural(piece, "text missing from its marker"))?;
    let (before, rest) = children.split_at(index);
    let after = &rest[1..];

    if !before.is_empty() {
        let prefix = tree.create_element(template.clone());
        tree.insert_before(marker, prefix)?;
        for &child in before {
            tree.append_child(prefix, child);
        }
    }
    if !after.is_empty() {
        let suffix = tree.create_element(template);
        tree.insert_after(marker, suffix)?;
        for &child in after {
            tree.append_child(suffix, child);
        }
    }
    Ok(())
}

/// Best-effort processing over many leaves: the first failure is kept and
/// returned once every leaf has been tried.
pub(crate) struct Batch {
    operation: &'static str,
    changed: bool,
    error: Option<AnnotateError>,
}

impl Batch {
    pub(crate) fn new(operation: &'static str) -> Self {
        Self {
            operation,
            changed: false,
            error: None,
        }
    }

    pub(crate) fn record(&mut self, result: Result<bool, AnnotateError>) {
        match result {
            Ok(changed) => self.changed |= changed,
            Err(err) => {
                log::warn!("{}: skipping leaf: {err}", self.operation);
                self.error.get_or_insert(err);
            }
        }
    }

    pub(crate) fn finish(self) -> Result<bool, AnnotateError> {
        log::debug!("{}: changed={}", self.operation, self.changed);
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.changed),
        }
    }
}
