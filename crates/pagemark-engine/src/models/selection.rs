use crate::models::annotation::Annotation;
use crate::models::tree::{ContentTree, NodeId};

/// A position inside the tree.
///
/// On a text node `offset` counts characters; on an element it is the index
/// of the child the position sits before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A contiguous span between two boundaries, start first in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start: Boundary,
    pub end: Boundary,
}

impl TextRange {
    pub fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    /// A range covering `start..end` characters of one text node.
    pub fn within(node: NodeId, start: usize, end: usize) -> Self {
        Self::new(Boundary::new(node, start), Boundary::new(node, end))
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// The user's selection: zero or more disjoint ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ranges: Vec<TextRange>,
}

impl Selection {
    pub fn new(ranges: impl IntoIterator<Item = TextRange>) -> Self {
        Self {
            ranges: ranges.into_iter().collect(),
        }
    }

    pub fn single(range: TextRange) -> Self {
        Self::new([range])
    }

    pub fn ranges(&self) -> &[TextRange] {
        &self.ranges
    }

    pub fn add_range(&mut self, range: TextRange) {
        self.ranges.push(range);
    }

    /// True when nothing is selected. Callers must then fall back to a focused node.
    pub fn is_collapsed(&self) -> bool {
        self.ranges.iter().all(TextRange::is_collapsed)
    }

    pub fn collapse(&mut self) {
        self.ranges.clear();
    }

    /// Select the first occurrence of `needle` in the tree's visible text.
    ///
    /// The match may span several text nodes; the resulting range starts and
    /// ends on text nodes.
    pub fn find_text(tree: &ContentTree, needle: &str) -> Option<Self> {
        if needle.is_empty() {
            return None;
        }

        let mut text = String::new();
        // (node, first char index in `text`, char length)
        let mut pieces: Vec<(NodeId, usize, usize)> = Vec::new();
        let mut chars = 0;
        let mut walker = tree.descendants(tree.root());
        while let Some(node) = walker.next() {
            if matches!(tree.annotation(node), Some(Annotation::NoteText)) {
                walker.skip_children(node);
                continue;
            }
            if let Some(content) = tree.text(node) {
                let len = content.chars().count();
                pieces.push((node, chars, len));
                text.push_str(content);
                chars += len;
            }
        }

        let byte_start = text.find(needle)?;
        let start = text[..byte_start].chars().count();
        let end = start + needle.chars().count();

        let (start_node, start_base, _) = pieces
            .iter()
            .find(|(_, base, len)| start >= *base && start < base + len)?;
        let (end_node, end_base, _) = pieces
            .iter()
            .find(|(_, base, len)| end > *base && end <= base + len)?;

        Some(Self::single(TextRange::new(
            Boundary::new(*start_node, start - start_base),
            Boundary::new(*end_node, end - end_base),
        )))
    }
}
