use crate::models::ColourToken;

/// Commands that can be applied to a page through the [`Annotator`](super::Annotator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cmd {
    Mark { colour: ColourToken },
    Unmark,
    ChangeColour { colour: ColourToken },
    CreateNote { text: String },
    RemoveNote,
}

impl Cmd {
    /// Colour the command applies, if it applies one.
    pub fn colour(&self) -> Option<&ColourToken> {
        match self {
            Cmd::Mark { colour } | Cmd::ChangeColour { colour } => Some(colour),
            _ => None,
        }
    }

    /// Name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Cmd::Mark { .. } => "mark",
            Cmd::Unmark => "unmark",
            Cmd::ChangeColour { .. } => "change_colour",
            Cmd::CreateNote { .. } => "create_note",
            Cmd::RemoveNote => "remove_note",
        }
    }
}
