use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::models::{Block, BlockId, Document, Position, Run, Selection};

/// Create a temporary storage directory
pub fn create_test_store_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Write a raw stored value the way a file-backed store would
pub fn create_test_value(store_dir: &TempDir, key: &str, content: &str) -> PathBuf {
    let file_path = store_dir.path().join(format!("{key}.txt"));
    fs::write(&file_path, content).unwrap();
    file_path
}

/// One paragraph of plain text with the caret at its end
pub fn paragraph_doc(text: &str) -> (Document, Selection, BlockId) {
    let doc = Document::from_blocks([Block::paragraph(vec![Run::text(text)])]);
    let id = doc.first_text_block().unwrap();
    let len = doc.get(id).unwrap().len();
    (doc, Selection::caret(Position::new(id, len)), id)
}
