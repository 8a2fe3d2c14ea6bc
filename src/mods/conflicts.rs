//! Mod conflict detection
//!
//! Walks enabled mods exactly as the overlay would and records, per relative
//! path, which mods provide it and which one ends up on top. A file that
//! replaces a directory (or the reverse) is a conflict too.

use super::validate_mod_id;
use crate::error::Result;
use crate::runtime::walk::{payload_files, PayloadFile};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A path in the merged tree and who provides it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedFile {
    pub relative_path: String,
    /// Mod whose copy ends up in the virtual tree
    pub winner: String,
    pub size_bytes: u64,
    /// Distinct contributing mods in load order
    pub contributors: Vec<String>,
    pub conflict: bool,
}

/// A path provided by more than one mod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRecord {
    pub relative_path: String,
    pub contributors: Vec<String>,
}

impl ConflictRecord {
    pub fn winner(&self) -> &str {
        self.contributors.last().map(String::as_str).unwrap_or_default()
    }
}

/// Launch preview
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    /// Sorted by relative path
    pub files: Vec<PlannedFile>,
    pub total_files: usize,
    pub conflict_count: usize,
    /// Size of the winning copies
    pub total_size_bytes: u64,
    /// Entries that could not be read; the rest of the scan continues
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Where the merged tree is built
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_path: Option<PathBuf>,
}

impl ConflictReport {
    pub fn conflicts(&self) -> Vec<ConflictRecord> {
        self.files
            .iter()
            .filter(|f| f.conflict)
            .map(|f| ConflictRecord {
                relative_path: f.relative_path.clone(),
                contributors: f.contributors.clone(),
            })
            .collect()
    }

    /// Conflicts grouped by the mod that wins them
    pub fn conflicts_by_winner(&self) -> BTreeMap<&str, Vec<&PlannedFile>> {
        let mut grouped: BTreeMap<&str, Vec<&PlannedFile>> = BTreeMap::new();
        for file in self.files.iter().filter(|f| f.conflict) {
            grouped.entry(file.winner.as_str()).or_default().push(file);
        }
        grouped
    }
}

/// Computes path collisions without writing anything
#[derive(Debug, Clone)]
pub struct ConflictAnalyzer {
    mods_dir: PathBuf,
}

impl ConflictAnalyzer {
    pub fn new(mods_dir: impl Into<PathBuf>) -> Self {
        Self {
            mods_dir: mods_dir.into(),
        }
    }

    /// Analyze `enabled` in load order (lowest precedence first).
    ///
    /// Mods without a directory are ignored, matching the overlay. Paths are
    /// compared case-insensitively because the game resolves them that way;
    /// the listed spelling is the winner's.
    pub fn analyze(&self, enabled: &[String]) -> Result<ConflictReport> {
        let mut planned: BTreeMap<String, PlannedFile> = BTreeMap::new();
        let mut errors = Vec::new();

        for id in enabled {
            let mod_root = self.mods_dir.join(id);
            if validate_mod_id(id).is_err() || !mod_root.is_dir() {
                tracing::debug!("Conflict scan: mod \"{}\" not found", id);
                continue;
            }

            for file in payload_files(&mod_root) {
                match file {
                    Ok(file) => plan_file(&mut planned, id, &file),
                    Err(e) => {
                        tracing::warn!("Conflict scan of {}: {}", id, e);
                        errors.push(format!("{}: {}", id, e));
                    }
                }
            }
        }

        let files: Vec<PlannedFile> = planned.into_values().collect();
        let conflict_count = files.iter().filter(|f| f.conflict).count();
        let total_size_bytes = files.iter().map(|f| f.size_bytes).sum();

        tracing::info!(
            "Conflict scan: {} files from {} mods, {} conflicts",
            files.len(),
            enabled.len(),
            conflict_count
        );

        Ok(ConflictReport {
            total_files: files.len(),
            conflict_count,
            total_size_bytes,
            files,
            errors,
            merged_path: None,
        })
    }
}

/// Place one file in the plan the way the overlay places it.
///
/// A file replaces any planned file at one of its parent directories and any
/// planned files below its own path. Those shadowed mods count as
/// contributors of the surviving path.
fn plan_file(planned: &mut BTreeMap<String, PlannedFile>, id: &str, file: &PayloadFile) {
    let spelling = file.key();
    let key = spelling.to_ascii_lowercase();
    let below = format!("{}/", key);

    let mut shadowed: Vec<String> = key
        .match_indices('/')
        .map(|(idx, _)| &key[..idx])
        .filter(|parent| planned.contains_key(*parent))
        .map(str::to_string)
        .collect();
    shadowed.extend(
        planned
            .range(below.clone()..)
            .take_while(|(k, _)| k.starts_with(&below))
            .map(|(k, _)| k.clone()),
    );

    let mut inherited: Vec<String> = Vec::new();
    for k in shadowed {
        if let Some(gone) = planned.remove(&k) {
            tracing::debug!("Conflict scan: {} shadows {}", spelling, gone.relative_path);
            for contributor in gone.contributors {
                if !inherited.contains(&contributor) {
                    inherited.push(contributor);
                }
            }
        }
    }

    let entry = planned.entry(key).or_insert_with(|| PlannedFile {
        relative_path: spelling.clone(),
        winner: id.to_string(),
        size_bytes: file.size,
        contributors: Vec::new(),
        conflict: false,
    });
    for contributor in inherited.into_iter().chain(std::iter::once(id.to_string())) {
        if !entry.contributors.contains(&contributor) {
            entry.contributors.push(contributor);
        }
    }
    entry.relative_path = spelling;
    entry.winner = id.to_string();
    entry.size_bytes = file.size;
    entry.conflict = entry.contributors.len() > 1;
}

/// Format a conflict for display
pub fn format_conflict(record: &ConflictRecord) -> String {
    format!(
        "{}\n  {} (winner: {})",
        record.relative_path,
        record.contributors.join(" -> "),
        record.winner()
    )
}
