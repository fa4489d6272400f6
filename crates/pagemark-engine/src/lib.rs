pub mod editing;
pub mod error;
pub mod io;
pub mod models;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use editing::{Annotator, Cmd, NoteEngine, Outcome, TextLeaf, Viewport};
pub use error::AnnotateError;
pub use io::*;
pub use models::*;
