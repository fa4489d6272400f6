use crate::models::{ColourToken, NodeId, NoteId};

/// Errors raised while mutating a page.
///
/// Expected "nothing to do" conditions (no selection, no marker, no note) are
/// reported through return values, never through this type. Only tree shapes
/// the engine cannot work with end up here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnotateError {
    #[error("Structural inconsistency at node {node}: {reason}")]
    Structural { node: NodeId, reason: &'static str },
    #[error("Note {id} has a start boundary without a matching end (or vice versa)")]
    UnmatchedBoundary { id: NoteId },
    #[error("Colour {0} is not part of the palette")]
    UnknownColour(ColourToken),
}

impl AnnotateError {
    pub(crate) fn structural(node: NodeId, reason: &'static str) -> Self {
        AnnotateError::Structural { node, reason }
    }
}
