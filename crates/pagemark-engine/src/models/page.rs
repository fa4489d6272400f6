use crate::models::selection::Selection;
use crate::models::tree::ContentTree;

/// A content tree together with the user's current selection on it.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub tree: ContentTree,
    pub selection: Selection,
}

impl Page {
    pub fn new(tree: ContentTree) -> Self {
        Self {
            tree,
            selection: Selection::default(),
        }
    }

    /// Whether there is a non-collapsed selection to act on.
    pub fn has_live_selection(&self) -> bool {
        !self.selection.is_collapsed()
    }

    /// Select the first occurrence of `needle`. Returns false and leaves the
    /// selection untouched when the text is absent.
    pub fn select_text(&mut self, needle: &str) -> bool {
        match Selection::find_text(&self.tree, needle) {
            Some(selection) => {
                self.selection = selection;
                true
            }
            None => false,
        }
    }
}
