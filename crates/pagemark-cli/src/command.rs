use anyhow::{Result, bail};
use pagemark_engine::editing::{Annotator, Cmd, Outcome};
use pagemark_engine::{ColourToken, io};
use relative_path::RelativePathBuf;
use std::path::Path;

pub const USAGE: &str = "Usage: pagemark-cli <page> <command> [args]
       pagemark-cli pages        list stored pages

Commands:
  mark [colour] <text>      highlight the first occurrence of <text>
  unmark <text>             remove highlighting from <text>
  recolour <colour> <text>  change the colour of markers under <text>
  note <text> <note>        attach <note> to <text>
  unnote <text>             remove the note on <text>
  links                     list note links
  colours <text>            show marker colours applied to <text>
  view                      open the page in the terminal viewer";

/// A parsed command line, minus the page path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Mark {
        colour: Option<String>,
        text: String,
    },
    Unmark {
        text: String,
    },
    Recolour {
        colour: String,
        text: String,
    },
    Note {
        text: String,
        note: String,
    },
    Unnote {
        text: String,
    },
    Links,
    Colours {
        text: String,
    },
    View,
}

impl CliCommand {
    pub fn parse(args: &[String]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = match args.as_slice() {
            ["mark", text] => CliCommand::Mark {
                colour: None,
                text: text.to_string(),
            },
            ["mark", colour, text] => CliCommand::Mark {
                colour: Some(colour.to_string()),
                text: text.to_string(),
            },
            ["unmark", text] => CliCommand::Unmark {
                text: text.to_string(),
            },
            ["recolour" | "recolor", colour, text] => CliCommand::Recolour {
                colour: colour.to_string(),
                text: text.to_string(),
            },
            ["note", text, note] => CliCommand::Note {
                text: text.to_string(),
                note: note.to_string(),
            },
            ["unnote", text] => CliCommand::Unnote {
                text: text.to_string(),
            },
            ["links"] => CliCommand::Links,
            ["colours" | "colors", text] => CliCommand::Colours {
                text: text.to_string(),
            },
            ["view"] => CliCommand::View,
            _ => bail!("unrecognised command\n{USAGE}"),
        };
        Ok(command)
    }

    /// Whether running the command changes the stored page.
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            CliCommand::Mark { .. }
                | CliCommand::Unmark { .. }
                | CliCommand::Recolour { .. }
                | CliCommand::Note { .. }
                | CliCommand::Unnote { .. }
        )
    }
}

/// Run a one-shot command and return the lines to print.
///
/// `View` is handled by the viewer and yields nothing here.
pub fn run(
    annotator: &mut Annotator,
    command: &CliCommand,
    default_colour: &ColourToken,
) -> Result<Vec<String>> {
    let cmd = match command {
        CliCommand::Links => {
            return Ok(annotator
                .note_links()
                .iter()
                .map(|link| link.text.clone())
                .collect());
        }
        CliCommand::Colours { text } => {
            select(annotator, text)?;
            let colours = annotator.colour_tokens(None).unwrap_or_default();
            if colours.is_empty() {
                return Ok(vec!["(unmarked)".to_string()]);
            }
            let names: Vec<&str> = colours.iter().map(ColourToken::as_str).collect();
            return Ok(vec![names.join(", ")]);
        }
        CliCommand::View => return Ok(Vec::new()),
        CliCommand::Mark { colour, text } => {
            select(annotator, text)?;
            Cmd::Mark {
                colour: colour
                    .as_deref()
                    .map(ColourToken::from)
                    .unwrap_or_else(|| default_colour.clone()),
            }
        }
        CliCommand::Unmark { text } => {
            select(annotator, text)?;
            Cmd::Unmark
        }
        CliCommand::Recolour { colour, text } => {
            select(annotator, text)?;
            Cmd::ChangeColour {
                colour: ColourToken::from(colour.as_str()),
            }
        }
        CliCommand::Note { text, note } => {
            select(annotator, text)?;
            Cmd::CreateNote { text: note.clone() }
        }
        CliCommand::Unnote { text } => {
            select(annotator, text)?;
            Cmd::RemoveNote
        }
    };

    let line = match annotator.apply(cmd, None)? {
        Outcome::Changed(true) => "updated".to_string(),
        Outcome::Changed(false) => "nothing to change".to_string(),
        Outcome::NoteCreated(Some(link)) => format!("created note {}", link.text),
        Outcome::NoteCreated(None) => "no note created".to_string(),
        Outcome::NoteRemoved(Some(id)) => format!("removed note {id}"),
        Outcome::NoteRemoved(None) => "no note found".to_string(),
    };
    Ok(vec![line])
}

/// Stored pages under `pages_root`, relative to it.
pub fn list_pages(pages_root: &Path) -> Result<Vec<String>> {
    let pages = io::scan_pages(pages_root)?;
    if pages.is_empty() {
        return Ok(vec!["(no pages)".to_string()]);
    }
    pages
        .iter()
        .map(|path| {
            let relative = path.strip_prefix(pages_root).unwrap_or(path);
            Ok(RelativePathBuf::from_path(relative)?.to_string())
        })
        .collect()
}

fn select(annotator: &mut Annotator, text: &str) -> Result<()> {
    if !annotator.select_text(text) {
        bail!("text {text:?} not found on page");
    }
    Ok(())
}
