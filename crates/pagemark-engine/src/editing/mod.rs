/*!
 * # Editing Core Module
 *
 * Everything that changes a page's annotations lives here.
 *
 * ## Architecture Overview
 *
 * ### 1. The tree is the single source of truth
 * - Markers and notes are ordinary elements of the [`ContentTree`](crate::models::ContentTree),
 *   tagged with an [`Annotation`](crate::models::Annotation)
 * - No side index is kept: every query walks the tree, so a page read back
 *   from disk behaves exactly like one annotated in this session
 * - The page's visible text is never altered, only regrouped
 *
 * ### 2. Selections resolve to text leaves
 * - [`resolve`] turns each selected range into the ordered text nodes it
 *   covers, with boundaries clipped to non-whitespace text
 * - Engines work leaf by leaf, last to first, so splitting one leaf never
 *   shifts the offsets of the ones still pending
 *
 * ### 3. Command-based editing
 * - All edits are represented as **Commands** ([`Cmd`]) applied through the
 *   [`Annotator`], which checks colours against the palette
 * - Each command reports an [`Outcome`]; "nothing to do" is an outcome, not
 *   an error
 *
 * ## Module Structure
 *
 * - **`resolve`**: selection to text leaves
 * - **`marker`**: mark, unmark and recolour
 * - **`note`**: create, remove and navigate notes; cached note links
 * - **`commands`**: `Cmd` enum
 * - **`outcome`**: per-command result
 * - **`annotator`**: `Annotator` facade owning page, note engine and palette
 *
 * ## Usage Pattern
 *
 * ```rust
 * use pagemark_engine::editing::*;
 * use pagemark_engine::io::parse_page;
 * use pagemark_engine::models::Page;
 *
 * let tree = parse_page("<body><p>Hello world</p></body>").unwrap();
 * let mut annotator = Annotator::new(Page::new(tree));
 *
 * annotator.select_text("world");
 * let outcome = annotator
 *     .apply(Cmd::Mark { colour: "green".into() }, None)
 *     .unwrap();
 * assert!(outcome.changed());
 * ```
 */

pub mod annotator;
pub mod commands;
pub mod marker;
pub mod note;
pub mod outcome;
pub mod resolve;

pub use annotator::Annotator;
pub use commands::Cmd;
pub use marker::{
    any_marker, change_colour, colour_tokens_for_selection, mark, marker_colour, marker_of,
    markers_at, unmark,
};
pub use note::{NoteEngine, Viewport, any_note, next_note_id, note_at, note_text};
pub use outcome::Outcome;
pub use resolve::{TextLeaf, resolve_selection, resolve_text_leaves};
