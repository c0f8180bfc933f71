//! Working-tree file discovery
//!
//! The contact CSV, the attached document and the browser binary are all
//! expected somewhere under the working directory; callers only configure a
//! file name and the first match wins.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Scan `root` recursively for a file with exactly `name`, returning its
/// absolute path. Directories that cannot be read are skipped.
pub fn find_in_tree(root: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == name)
        .and_then(|entry| {
            let path = entry.into_path();
            path.canonicalize().ok().or(Some(path))
        })
}

/// Scan the current working directory tree for `name`.
pub fn find_in_working_tree(name: &str) -> Option<PathBuf> {
    find_in_tree(Path::new("."), name)
}
