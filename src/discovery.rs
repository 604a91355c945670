//! Component file discovery
//!
//! Recursively scans directories for component documents.

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::compiler::SourceFile;

pub const DEFAULT_EXTENSION: &str = "html";

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Every file under `dir` with one of `extensions`, sorted by path.
/// Unreadable entries are skipped.
pub fn find_component_files(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && has_extension(entry.path(), extensions))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

pub fn load_source_file(path: &Path) -> std::io::Result<SourceFile> {
    let text = fs::read_to_string(path)?;
    Ok(SourceFile::new(path.to_string_lossy(), text))
}
