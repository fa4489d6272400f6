use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::io::{parse_page, serialize_page};
use crate::models::{ContentTree, NodeId, Page};

/// Create a temporary pages directory
pub fn create_test_pages_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Create a file (and its parent directories) under the pages directory
pub fn create_test_file(pages_dir: &TempDir, filename: &str, content: &str) -> PathBuf {
    let file_path = pages_dir.path().join(filename);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&file_path, content).unwrap();
    file_path
}

/// Page parsed from markup, with nothing selected
pub fn page_from(markup: &str) -> Page {
    Page::new(parse_page(markup).unwrap())
}

/// First attached text node whose content is exactly `text`
pub fn text_node(tree: &ContentTree, text: &str) -> NodeId {
    tree.descendants(tree.root())
        .find(|&node| tree.text(node) == Some(text))
        .unwrap_or_else(|| panic!("no text node {text:?}"))
}

pub fn render(tree: &ContentTree) -> String {
    serialize_page(tree)
}

/// Select the first occurrence of `needle` in the visible text
pub fn select(page: &mut Page, needle: &str) {
    assert!(page.select_text(needle), "{needle:?} not found on page");
}
