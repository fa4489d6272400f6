use crate::models::{NoteId, NoteLink};

/// Result of applying a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Marker commands: whether the tree changed.
    Changed(bool),
    /// The link for a new note, `None` when nothing was attached.
    NoteCreated(Option<NoteLink>),
    /// The id of the removed note, `None` when there was no note to remove.
    NoteRemoved(Option<NoteId>),
}

impl Outcome {
    /// Whether the command modified the page.
    pub fn changed(&self) -> bool {
        match self {
            Outcome::Changed(changed) => *changed,
            Outcome::NoteCreated(link) => link.is_some(),
            Outcome::NoteRemoved(id) => id.is_some(),
        }
    }
}
