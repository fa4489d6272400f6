use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque colour name applied by a marker (e.g. `"yellow"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColourToken(String);

impl ColourToken {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ColourToken {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ColourToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Positive note identifier. Zero is never a valid id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(u32);

impl NoteId {
    pub fn new(value: u32) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    /// Parse an id as stored on a page. Malformed or zero ids yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u32>().ok().and_then(Self::new)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// The id following this one, `None` once ids are exhausted.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }

    pub fn first() -> Self {
        Self(1)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a note element frames the text it annotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    /// One wrapper around a run confined to a single container.
    Solid,
    /// Opening boundary of a cross-node span.
    Start,
    /// Closing boundary of a cross-node span.
    End,
}

impl NoteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NoteKind::Solid => "solid",
            NoteKind::Start => "start",
            NoteKind::End => "end",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "solid" => Some(NoteKind::Solid),
            "start" => Some(NoteKind::Start),
            "end" => Some(NoteKind::End),
            _ => None,
        }
    }
}

/// Role an element plays in the annotation layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Annotation {
    Marker { colour: ColourToken },
    Note { id: NoteId, kind: NoteKind },
    /// Holds the note's text inside a note element. Never part of the page's visible text.
    NoteText,
}

impl Annotation {
    pub fn marker_colour(&self) -> Option<&ColourToken> {
        match self {
            Annotation::Marker { colour } => Some(colour),
            _ => None,
        }
    }

    pub fn note(&self) -> Option<(NoteId, NoteKind)> {
        match self {
            Annotation::Note { id, kind } => Some((*id, *kind)),
            _ => None,
        }
    }
}

/// Maximum number of note characters shown in a link before truncation.
pub const DEFAULT_LINK_WIDTH: usize = 15;

/// Navigable summary of a note: `{id}: {text}`, truncated with `...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteLink {
    pub id: NoteId,
    pub text: String,
}

impl NoteLink {
    pub fn new(id: NoteId, note_text: &str, width: usize) -> Self {
        let mut shown: String = note_text.chars().take(width).collect();
        if note_text.chars().count() > width {
            shown.push_str("...");
        }
        Self {
            id,
            text: format!("{id}: {shown}"),
        }
    }
}

/// The fixed set of colours a user can pick from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colours: Vec<ColourToken>,
}

impl Palette {
    pub fn new(colours: impl IntoIterator<Item = ColourToken>) -> Self {
        Self {
            colours: colours.into_iter().collect(),
        }
    }

    pub fn contains(&self, colour: &ColourToken) -> bool {
        self.colours.contains(colour)
    }

    pub fn colours(&self) -> &[ColourToken] {
        &self.colours
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(["yellow", "green", "blue", "pink"].map(ColourToken::from))
    }
}
