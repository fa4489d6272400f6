//! Tree range resolution: from a selection to the text leaves it covers.

use std::cmp::Ordering;

use crate::models::{Boundary, ContentTree, NodeId, Selection, TextRange};

/// A text node together with the character sub-range a selection covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLeaf {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
}

impl TextLeaf {
    pub fn new(node: NodeId, start: usize, end: usize) -> Self {
        Self { node, start, end }
    }

    /// A leaf covering all of `node`'s text.
    pub fn whole(tree: &ContentTree, node: NodeId) -> Self {
        Self::new(node, 0, tree.char_len(node))
    }

    pub fn covers_whole(&self, tree: &ContentTree) -> bool {
        self.start == 0 && self.end >= tree.char_len(self.node)
    }
}

/// Leaves covered by every range of `selection`, in document order.
///
/// Ranges may be added in any order; callers walk the result backwards
/// while splitting, which needs later text to come last.
pub fn resolve_selection(tree: &ContentTree, selection: &Selection) -> Vec<TextLeaf> {
    let mut leaves: Vec<TextLeaf> = selection
        .ranges()
        .iter()
        .flat_map(|range| resolve_text_leaves(tree, range))
        .collect();
    leaves.sort_by(|a, b| {
        tree.compare_order(a.node, b.node)
            .then(a.start.cmp(&b.start))
    });
    leaves
}

/// Ordered list of the text leaves `range` covers.
///
/// Boundaries are moved onto the nearest text node with non-whitespace
/// content before any offset arithmetic; whitespace-only nodes and note
/// payload text never appear in the result.
pub fn resolve_text_leaves(tree: &ContentTree, range: &TextRange) -> Vec<TextLeaf> {
    if range.is_collapsed() {
        return Vec::new();
    }

    let Some(start) = relocate_start(tree, range.start) else {
        log::trace!("range start {:?} has no text after it", range.start);
        return Vec::new();
    };
    let Some(end) = relocate_end(tree, range.end) else {
        log::trace!("range end {:?} has no text before it", range.end);
        return Vec::new();
    };

    if start.node == end.node {
        if start.offset < end.offset {
            return vec![TextLeaf::new(start.node, start.offset, end.offset)];
        }
        return Vec::new();
    }
    if tree.compare_order(start.node, end.node) == Ordering::Greater {
        return Vec::new();
    }

    let mut leaves = Vec::new();
    let mut current = Some(start.node);
    while let Some(node) = current {
        if tree.is_proper_leaf(node) {
            let from = if node == start.node { start.offset } else { 0 };
            let to = if node == end.node {
                end.offset
            } else {
                tree.char_len(node)
            };
            leaves.push(TextLeaf::new(node, from, to));
        }
        if node == end.node {
            break;
        }
        current = tree.next_in_order(node);
    }
    leaves
}

/// Move a start boundary forward to the first character of meaningful text
/// at or after it.
fn relocate_start(tree: &ContentTree, boundary: Boundary) -> Option<Boundary> {
    let candidate = if let Some(text) = tree.text(boundary.node) {
        let len = text.chars().count();
        let offset = boundary.offset.min(len);
        let rest: String = text.chars().skip(offset).collect();
        if !rest.trim().is_empty() && !tree.in_note_text(boundary.node) {
            return Some(Boundary::new(boundary.node, offset));
        }
        tree.next_in_order(boundary.node)
    } else {
        // Element boundary: the position sits before child `offset`.
        match tree.children(boundary.node).get(boundary.offset) {
            Some(&child) => Some(child),
            None => tree.next_skipping_children(boundary.node),
        }
    };

    let mut current = candidate;
    while let Some(node) = current {
        if tree.is_proper_leaf(node) {
            return Some(Boundary::new(node, 0));
        }
        current = tree.next_in_order(node);
    }
    None
}

/// Move an end boundary back to just after the last character of meaningful
/// text at or before it.
fn relocate_end(tree: &ContentTree, boundary: Boundary) -> Option<Boundary> {
    let candidate = if let Some(text) = tree.text(boundary.node) {
        let len = text.chars().count();
        let offset = boundary.offset.min(len);
        let head: String = text.chars().take(offset).collect();
        if !head.trim().is_empty() && !tree.in_note_text(boundary.node) {
            return Some(Boundary::new(boundary.node, offset));
        }
        tree.previous_in_order(boundary.node)
    } else {
        // Element boundary: the last content before child `offset`.
        match boundary.offset.checked_sub(1) {
            Some(index) => tree
                .children(boundary.node)
                .get(index)
                .or(tree.children(boundary.node).last())
                .map(|&child| tree.last_descendant(child)),
            None => tree.previous_in_order(boundary.node),
        }
    };

    let mut current = candidate;
    while let Some(node) = current {
        if tree.is_proper_leaf(node) {
            return Some(Boundary::new(node, tree.char_len(node)));
        }
        current = tree.previous_in_order(node);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{page_from, text_node};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collapsed_range_resolves_to_nothing() {
        let page = page_from("<body><p>Hello world</p></body>");
        let t = text_node(&page.tree, "Hello world");

        let leaves = resolve_text_leaves(&page.tree, &TextRange::within(t, 3, 3));

        assert!(leaves.is_empty());
    }

    #[test]
    fn test_single_node_keeps_offsets() {
        let page = page_from("<body><p>Hello world</p></body>");
        let t = text_node(&page.tree, "Hello world");

        let leaves = resolve_text_leaves(&page.tree, &TextRange::within(t, 0, 5));

        assert_eq!(leaves, vec![TextLeaf::new(t, 0, 5)]);
    }

    #[test]
    fn test_cross_paragraph_skips_whitespace_nodes() {
        let page = page_from("<body><p>first</p>\n  <p>second</p></body>");
        let first = text_node(&page.tree, "first");
        let second = text_node(&page.tree, "second");

        let range = TextRange::new(Boundary::new(first, 2), Boundary::new(second, 3));
        let leaves = resolve_text_leaves(&page.tree, &range);

        assert_eq!(
            leaves,
            vec![TextLeaf::new(first, 2, 5), TextLeaf::new(second, 0, 3)]
        );
    }

    #[test]
    fn test_boundaries_on_whitespace_are_relocated() {
        let page = page_from("<body><p>first</p>\n  <p>second</p>\n</body>");
        let gap = text_node(&page.tree, "\n  ");
        let trailing = text_node(&page.tree, "\n");
        let second = text_node(&page.tree, "second");

        let range = TextRange::new(Boundary::new(gap, 1), Boundary::new(trailing, 1));
        let leaves = resolve_text_leaves(&page.tree, &range);

        assert_eq!(leaves, vec![TextLeaf::new(second, 0, 6)]);
    }

    #[test]
    fn test_start_at_end_of_text_moves_to_next_leaf() {
        let page = page_from("<body><p>first</p><p>second</p></body>");
        let first = text_node(&page.tree, "first");
        let second = text_node(&page.tree, "second");

        let range = TextRange::new(Boundary::new(first, 5), Boundary::new(second, 6));
        let leaves = resolve_text_leaves(&page.tree, &range);

        assert_eq!(leaves, vec![TextLeaf::new(second, 0, 6)]);
    }

    #[test]
    fn test_element_boundaries_are_retargeted_to_text() {
        let page = page_from("<body><p>one</p><p>two</p><p>three</p></body>");
        let root = page.tree.root();
        let one = text_node(&page.tree, "one");
        let two = text_node(&page.tree, "two");

        // Before the first paragraph up to before the third.
        let range = TextRange::new(Boundary::new(root, 0), Boundary::new(root, 2));
        let leaves = resolve_text_leaves(&page.tree, &range);

        assert_eq!(
            leaves,
            vec![TextLeaf::new(one, 0, 3), TextLeaf::new(two, 0, 3)]
        );
    }

    #[test]
    fn test_whitespace_only_range_is_empty() {
        let page = page_from("<body><p>one</p>   <p>two</p></body>");
        let gap = text_node(&page.tree, "   ");

        let leaves = resolve_text_leaves(&page.tree, &TextRange::within(gap, 0, 3));

        assert!(leaves.is_empty());
    }

    #[test]
    fn test_nested_inline_markup_is_walked_in_order() {
        let page = page_from("<body><p>a <b>bold <i>deep</i></b> tail</p></body>");
        let a = text_node(&page.tree, "a ");
        let tail = text_node(&page.tree, " tail");

        let range = TextRange::new(Boundary::new(a, 0), Boundary::new(tail, 5));
        let texts: Vec<String> = resolve_text_leaves(&page.tree, &range)
            .iter()
            .map(|leaf| page.tree.text(leaf.node).unwrap_or_default().to_string())
            .collect();

        assert_eq!(texts, vec!["a ", "bold ", "deep", " tail"]);
    }

    #[test]
    fn test_multiple_ranges_resolve_in_order() {
        let page = page_from("<body><p>alpha</p><p>beta</p></body>");
        let alpha = text_node(&page.tree, "alpha");
        let beta = text_node(&page.tree, "beta");

        let selection = Selection::new([
            TextRange::within(alpha, 0, 2),
            TextRange::within(beta, 1, 4),
        ]);

        assert_eq!(
            resolve_selection(&page.tree, &selection),
            vec![TextLeaf::new(alpha, 0, 2), TextLeaf::new(beta, 1, 4)]
        );
    }

    #[test]
    fn test_ranges_added_out_of_order_resolve_in_document_order() {
        let page = page_from("<body><p>alpha beta gamma</p><p>delta</p></body>");
        let t = text_node(&page.tree, "alpha beta gamma");
        let delta = text_node(&page.tree, "delta");

        let selection = Selection::new([
            TextRange::within(delta, 0, 3),
            TextRange::within(t, 11, 16),
            TextRange::within(t, 0, 5),
        ]);

        assert_eq!(
            resolve_selection(&page.tree, &selection),
            vec![
                TextLeaf::new(t, 0, 5),
                TextLeaf::new(t, 11, 16),
                TextLeaf::new(delta, 0, 3),
            ]
        );
    }
}
