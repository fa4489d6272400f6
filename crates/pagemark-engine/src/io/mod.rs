pub mod markup;

pub use markup::{parse_page, serialize_page};

use crate::models::ContentTree;
use relative_path::RelativePath;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("Page not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed page markup: {0}")]
    Parse(#[from] roxmltree::Error),
    #[error("Invalid pages directory: {0}")]
    InvalidPagesDir(String),
}

/// File extensions recognised as stored pages.
pub const PAGE_EXTENSIONS: &[&str] = &["xhtml", "html"];

/// Read and parse a stored page
pub fn read_page(relative_path: &RelativePath, pages_root: &Path) -> Result<ContentTree, IoError> {
    let absolute_path = relative_path.to_path(pages_root);
    if !absolute_path.exists() {
        return Err(IoError::NotFound(absolute_path));
    }
    let source = fs::read_to_string(&absolute_path)?;
    parse_page(&source)
}

/// Serialize a page and write it under the pages root
pub fn write_page(
    relative_path: &RelativePath,
    pages_root: &Path,
    tree: &ContentTree,
) -> Result<(), IoError> {
    let absolute_path = relative_path.to_path(pages_root);

    if let Some(parent) = absolute_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&absolute_path, serialize_page(tree))?;
    log::debug!("wrote page {}", absolute_path.display());
    Ok(())
}

/// Scan for stored pages in the pages directory
pub fn scan_pages(pages_root: &Path) -> Result<Vec<PathBuf>, IoError> {
    if !pages_root.exists() {
        return Err(IoError::InvalidPagesDir(
            "pages directory not found".to_string(),
        ));
    }

    let mut files = Vec::new();
    scan_directory_recursive(pages_root, &mut files)?;
    files.sort();
    Ok(files)
}

fn scan_directory_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), IoError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_dir() {
            scan_directory_recursive(&path, files)?;
        } else if let Some(ext) = path.extension().and_then(|ext| ext.to_str())
            && PAGE_EXTENSIONS.contains(&ext)
        {
            files.push(path);
        }
    }

    Ok(())
}

pub fn validate_pages_dir(path: &Path) -> Result<(), IoError> {
    if !path.is_dir() {
        return Err(IoError::InvalidPagesDir(
            "Directory does not exist".to_string(),
        ));
    }

    Ok(())
}
