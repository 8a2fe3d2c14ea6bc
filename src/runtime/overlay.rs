//! Copies enabled mods onto the virtual game directory in load order

use super::walk::payload_files;
use crate::error::Result;
use crate::mods::validate_mod_id;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

/// Per-mod overlay statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModOverlayStats {
    pub id: String,
    pub files_processed: usize,
    pub bytes_processed: u64,
    pub errors: Vec<String>,
}

/// Overlay statistics across all mods
#[derive(Debug, Clone, Default, Serialize)]
pub struct OverlayReport {
    /// Applied mods, in the order they were applied
    pub mods: Vec<ModOverlayStats>,
    /// Mods named in the load order whose directory is gone
    pub skipped: Vec<String>,
    pub files_processed: usize,
    pub bytes_processed: u64,
}

impl OverlayReport {
    pub fn error_count(&self) -> usize {
        self.mods.iter().map(|m| m.errors.len()).sum()
    }
}

/// Applies mod payloads on top of a mirror
#[derive(Debug, Clone)]
pub struct OverlayEngine {
    mods_dir: PathBuf,
}

impl OverlayEngine {
    pub fn new(mods_dir: impl Into<PathBuf>) -> Self {
        Self {
            mods_dir: mods_dir.into(),
        }
    }

    /// Copy every payload file of each mod to the same relative path under
    /// `virtual_root`, in the given order, replacing whatever is there.
    ///
    /// The last mod to provide a path wins. Existing entries are unlinked
    /// before writing so mirror links never carry writes back to their target.
    pub fn apply_overlay(&self, load_order: &[String], virtual_root: &Path) -> Result<OverlayReport> {
        std::fs::create_dir_all(virtual_root)?;
        let mut report = OverlayReport::default();

        for (position, id) in load_order.iter().enumerate() {
            let mod_root = self.mods_dir.join(id);
            if validate_mod_id(id).is_err() || !mod_root.is_dir() {
                tracing::warn!("Mod \"{}\" not found, skipping", id);
                report.skipped.push(id.clone());
                continue;
            }

            tracing::debug!("Overlaying mod {}/{}: {}", position + 1, load_order.len(), id);
            let stats = overlay_mod(id, &mod_root, virtual_root);
            tracing::info!(
                "{}: {} files overlaid, {} bytes",
                id,
                stats.files_processed,
                stats.bytes_processed
            );

            report.files_processed += stats.files_processed;
            report.bytes_processed += stats.bytes_processed;
            report.mods.push(stats);
        }

        tracing::info!(
            "Overlay complete: {} mods, {} files, {} bytes ({} skipped)",
            report.mods.len(),
            report.files_processed,
            report.bytes_processed,
            report.skipped.len()
        );

        Ok(report)
    }
}

fn overlay_mod(id: &str, mod_root: &Path, virtual_root: &Path) -> ModOverlayStats {
    let mut stats = ModOverlayStats {
        id: id.to_string(),
        ..Default::default()
    };

    for file in payload_files(mod_root) {
        let file = match file {
            Ok(file) => file,
            Err(e) => {
                stats.errors.push(e.to_string());
                continue;
            }
        };

        match overlay_file(&file.source, virtual_root, &file.relative) {
            Ok(bytes) => {
                stats.files_processed += 1;
                stats.bytes_processed += bytes;
            }
            Err(e) => {
                tracing::warn!("{}: failed to overlay {}: {}", id, file.key(), e);
                stats.errors.push(format!("{}: {}", file.key(), e));
            }
        }
    }

    stats
}

/// Place one file, returning the number of bytes written
fn overlay_file(source: &Path, virtual_root: &Path, relative: &Path) -> io::Result<u64> {
    if let Some(parent) = relative.parent() {
        ensure_real_dirs(virtual_root, parent)?;
    }

    let dest = virtual_root.join(relative);
    match std::fs::symlink_metadata(&dest) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&dest)?,
        Ok(_) => std::fs::remove_file(&dest)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    std::fs::copy(source, &dest)
}

/// Create each directory of `relative_dir` under `root`, replacing any
/// non-directory (file or link) that is in the way.
fn ensure_real_dirs(root: &Path, relative_dir: &Path) -> io::Result<()> {
    let mut current = root.to_path_buf();
    for component in relative_dir.components() {
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                std::fs::remove_file(&current)?;
                std::fs::create_dir(&current)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => std::fs::create_dir(&current)?,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
