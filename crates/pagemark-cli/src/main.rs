mod command;
mod render;
mod view;

use anyhow::{Context, Result};
use pagemark_config::Config;
use pagemark_engine::editing::{Annotator, NoteEngine};
use pagemark_engine::{ColourToken, Page, Palette, io};
use relative_path::RelativePathBuf;
use std::{env, path::PathBuf, process};

use command::{CliCommand, USAGE};

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().collect();
    let listing = args.len() == 2 && args[1] == "pages";
    if args.len() < 3 && !listing {
        eprintln!("{USAGE}");
        process::exit(1);
    }

    let config = load_config()?;
    if listing {
        if let Err(e) = io::validate_pages_dir(&config.pages_path) {
            eprintln!(
                "Error: Pages path '{}' is invalid: {e}",
                config.pages_path.display()
            );
            process::exit(1);
        }
        for line in command::list_pages(&config.pages_path)? {
            println!("{line}");
        }
        return Ok(());
    }

    let page_arg = PathBuf::from(&args[1]);
    let command = match CliCommand::parse(&args[2..]) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    // An absolute page path overrides the configured pages directory
    let (pages_root, relative_path) = if page_arg.is_absolute() {
        let root = page_arg
            .parent()
            .map(PathBuf::from)
            .context("page path has no parent directory")?;
        let name = page_arg
            .file_name()
            .context("page path has no file name")?;
        (root, RelativePathBuf::from_path(name)?)
    } else {
        (config.pages_path.clone(), RelativePathBuf::from_path(&page_arg)?)
    };

    if let Err(e) = io::validate_pages_dir(&pages_root) {
        eprintln!(
            "Error: Pages path '{}' is invalid: {e}",
            pages_root.display()
        );
        process::exit(1);
    }

    let tree = io::read_page(&relative_path, &pages_root)?;
    let palette = Palette::new(config.palette.iter().map(ColourToken::new));
    let mut annotator = Annotator::with_palette(Page::new(tree), palette)
        .with_notes(NoteEngine::with_link_width(config.note_link_width));

    if command == CliCommand::View {
        return view::run_viewer(relative_path.to_string(), annotator);
    }

    let before = io::serialize_page(annotator.tree());
    let default_colour = ColourToken::new(config.default_colour.as_str());
    for line in command::run(&mut annotator, &command, &default_colour)? {
        println!("{line}");
    }

    if command.mutates() && io::serialize_page(annotator.tree()) != before {
        io::write_page(&relative_path, &pages_root, annotator.tree())?;
        log::info!("saved {}", relative_path);
    }

    Ok(())
}

/// Settings come from the config file when there is one.
fn load_config() -> Result<Config> {
    let config_path = Config::config_path();
    let config = Config::load()
        .with_context(|| format!("failed to load config file '{}'", config_path.display()))?;
    match config {
        Some(config) => Ok(config),
        None => {
            log::debug!("no config at {}, using defaults", config_path.display());
            Ok(Config::new(env::current_dir()?))
        }
    }
}
