//! Canonical-order directory traversal shared by the overlay and the analyzer
//!
//! Entries are yielded lazily and sorted by file name at every level, so the
//! order never depends on how the filesystem enumerates directories.

use crate::mods::SIDECAR_FILE;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// A file that a mod contributes to the virtual tree
#[derive(Debug, Clone)]
pub struct PayloadFile {
    /// Absolute path inside the mod directory
    pub source: PathBuf,
    /// Path relative to the mod root
    pub relative: PathBuf,
    pub size: u64,
}

impl PayloadFile {
    /// `/`-joined relative path, used as a conflict key
    pub fn key(&self) -> String {
        relative_key(&self.relative)
    }
}

/// Join the normal components of a relative path with `/`
pub fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Every payload file of a mod in canonical order.
///
/// The metadata sidecar at the mod root is not payload and is skipped.
pub fn payload_files(mod_root: &Path) -> impl Iterator<Item = walkdir::Result<PayloadFile>> + '_ {
    WalkDir::new(mod_root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e)),
            };
            if !entry.file_type().is_file() {
                return None;
            }
            if entry.depth() == 1 && entry.file_name() == SIDECAR_FILE {
                return None;
            }
            let relative = entry.path().strip_prefix(mod_root).ok()?.to_path_buf();
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => return Some(Err(e)),
            };
            Some(Ok(PayloadFile {
                source: entry.path().to_path_buf(),
                relative,
                size,
            }))
        })
}

/// Every entry below `root` in canonical order, following directory symlinks
pub fn tree_entries(root: &Path) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
}
