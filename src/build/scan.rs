//! Asset discovery.

use std::path::{Path, PathBuf};

use jwalk::WalkDir;

const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

/// Every file under `root`, sorted, skipping anything inside `excluded`.
///
/// A missing root yields no files.
pub fn collect_files(root: &Path, excluded: &[&Path]) -> Vec<PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .sort(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_str().unwrap_or_default();
            !IGNORED_FILES.contains(&name)
        })
        .map(|e| e.path())
        .filter(|p| !excluded.iter().any(|dir| p.starts_with(dir)))
        .collect();
    files.sort();
    files
}
