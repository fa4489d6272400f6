use std::collections::BTreeSet;

use crate::editing::commands::Cmd;
use crate::editing::marker::{any_marker, change_colour, colour_tokens_for_selection, mark, unmark};
use crate::editing::note::{NoteEngine, Viewport, any_note};
use crate::editing::outcome::Outcome;
use crate::error::AnnotateError;
use crate::models::{ColourToken, ContentTree, NodeId, NoteId, NoteLink, Page, Palette};

/// A page together with the engines and palette that annotate it.
///
/// All mutations go through [`Annotator::apply`], which checks colours
/// against the palette and keeps the note-link cache in step with the tree.
#[derive(Debug, Clone, Default)]
pub struct Annotator {
    page: Page,
    notes: NoteEngine,
    palette: Palette,
}

impl Annotator {
    pub fn new(page: Page) -> Self {
        Self::with_palette(page, Palette::default())
    }

    pub fn with_palette(page: Page, palette: Palette) -> Self {
        Self {
            page,
            notes: NoteEngine::new(),
            palette,
        }
    }

    /// Replace the note engine, e.g. to change the link width.
    pub fn with_notes(mut self, notes: NoteEngine) -> Self {
        self.notes = notes;
        self
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn tree(&self) -> &ContentTree {
        &self.page.tree
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn into_page(self) -> Page {
        self.page
    }

    /// Select the first occurrence of `needle` in the visible text.
    pub fn select_text(&mut self, needle: &str) -> bool {
        self.page.select_text(needle)
    }

    /// Apply a command to the current selection, or to `focused` when
    /// nothing is selected. A `focused` node no longer in the page is ignored.
    pub fn apply(&mut self, cmd: Cmd, focused: Option<NodeId>) -> Result<Outcome, AnnotateError> {
        if let Some(colour) = cmd.colour()
            && !self.palette.contains(colour)
        {
            return Err(AnnotateError::UnknownColour(colour.clone()));
        }
        log::debug!("apply {}", cmd.name());

        // Splits and merges detach nodes; a stale focus is no target.
        let focused = focused.filter(|&node| {
            let attached = self.page.tree.is_attached(node);
            if !attached {
                log::debug!("apply {}: focused node {node} is detached", cmd.name());
            }
            attached
        });

        let page = &mut self.page;
        match cmd {
            Cmd::Mark { colour } => mark(page, &colour, focused).map(Outcome::Changed),
            Cmd::Unmark => unmark(page, focused).map(Outcome::Changed),
            Cmd::ChangeColour { colour } => {
                change_colour(page, &colour, focused).map(Outcome::Changed)
            }
            Cmd::CreateNote { text } => self
                .notes
                .create_note(page, &text, focused)
                .map(Outcome::NoteCreated),
            Cmd::RemoveNote => self
                .notes
                .remove_note(page, focused)
                .map(Outcome::NoteRemoved),
        }
    }

    pub fn colour_tokens(&self, focused: Option<NodeId>) -> Option<BTreeSet<ColourToken>> {
        colour_tokens_for_selection(&self.page, focused)
    }

    pub fn has_note(&self, focused: Option<NodeId>) -> bool {
        self.notes.has_note(&self.page, focused)
    }

    pub fn note_links(&mut self) -> &[NoteLink] {
        self.notes.note_links(&self.page.tree)
    }

    pub fn go_to_note(&self, id: NoteId, viewport: &mut impl Viewport) -> bool {
        self.notes.go_to_note(&self.page.tree, id, viewport)
    }

    /// True when the page carries neither markers nor notes.
    pub fn is_pure(&self) -> bool {
        !any_marker(&self.page.tree) && !any_note(&self.page.tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{page_from, render};
    use pretty_assertions::assert_eq;

    fn annotator(html: &str) -> Annotator {
        Annotator::new(page_from(html))
    }

    #[test]
    fn test_unknown_colour_is_rejected_before_touching_the_page() {
        let mut annotator = annotator("<body><p>Hello</p></body>");
        assert!(annotator.select_text("Hello"));

        let err = annotator
            .apply(
                Cmd::Mark {
                    colour: "mauve".into(),
                },
                None,
            )
            .unwrap_err();

        assert_eq!(err, AnnotateError::UnknownColour("mauve".into()));
        assert_eq!(render(annotator.tree()), "<body><p>Hello</p></body>");
        assert!(annotator.page().has_live_selection());
    }

    #[test]
    fn test_apply_mark_then_unmark() {
        let mut annotator = annotator("<body><p>Hello world</p></body>");
        annotator.select_text("world");

        let outcome = annotator
            .apply(
                Cmd::Mark {
                    colour: "yellow".into(),
                },
                None,
            )
            .unwrap();
        assert_eq!(outcome, Outcome::Changed(true));
        assert!(!annotator.is_pure());

        annotator.select_text("world");
        assert_eq!(
            annotator.colour_tokens(None),
            Some(BTreeSet::from([ColourToken::from("yellow")]))
        );
        assert!(annotator.apply(Cmd::Unmark, None).unwrap().changed());
        assert!(annotator.is_pure());
    }

    #[test]
    fn test_apply_note_commands_keep_links_current() {
        let mut annotator = annotator("<body><p>Hello world</p></body>");
        assert!(annotator.note_links().is_empty());

        annotator.select_text("Hello");
        let outcome = annotator
            .apply(
                Cmd::CreateNote {
                    text: "greeting".to_string(),
                },
                None,
            )
            .unwrap();
        let link = match outcome {
            Outcome::NoteCreated(Some(link)) => link,
            other => panic!("expected a note link, got {other:?}"),
        };
        assert_eq!(link.text, "1: greeting");
        assert_eq!(annotator.note_links(), &[link.clone()]);
        assert!(!annotator.has_note(None));

        annotator.select_text("Hello");
        assert!(annotator.has_note(None));
        assert_eq!(
            annotator.apply(Cmd::RemoveNote, None).unwrap(),
            Outcome::NoteRemoved(Some(link.id))
        );
        assert!(annotator.note_links().is_empty());
        assert!(annotator.is_pure());
    }

    #[test]
    fn test_apply_without_target_changes_nothing() {
        let mut annotator = annotator("<body><p>Hello</p></body>");

        assert_eq!(annotator.apply(Cmd::Unmark, None).unwrap(), Outcome::Changed(false));
        assert_eq!(
            annotator
                .apply(
                    Cmd::CreateNote {
                        text: "x".to_string()
                    },
                    None
                )
                .unwrap(),
            Outcome::NoteCreated(None)
        );
        assert_eq!(annotator.apply(Cmd::RemoveNote, None).unwrap(), Outcome::NoteRemoved(None));
        assert!(annotator.is_pure());
    }

    #[test]
    fn test_detached_focus_is_ignored() {
        let mut annotator = annotator("<body><p>Hello world</p></body>");
        annotator.select_text("world");
        annotator
            .apply(
                Cmd::Mark {
                    colour: "yellow".into(),
                },
                None,
            )
            .unwrap();
        let world = crate::tests::text_node(annotator.tree(), "world");

        // Unmarking merges "world" back into "Hello ", detaching its node.
        annotator.select_text("world");
        annotator.apply(Cmd::Unmark, None).unwrap();
        assert!(!annotator.tree().is_attached(world));

        let outcome = annotator
            .apply(
                Cmd::Mark {
                    colour: "yellow".into(),
                },
                Some(world),
            )
            .unwrap();

        assert_eq!(outcome, Outcome::Changed(false));
        assert_eq!(render(annotator.tree()), "<body><p>Hello world</p></body>");
    }
}
