//! Per-mod sidecar metadata (`mod_loader_info.json`)

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Sidecar file name at each mod root. Never part of the mod payload.
pub const SIDECAR_FILE: &str = "mod_loader_info.json";

/// Category assigned to freshly imported mods
pub const DEFAULT_CATEGORY: &str = "Other";

/// Categories offered regardless of what mods use
pub const BUILTIN_CATEGORIES: &[&str] = &[
    "Other",
    "Gameplay",
    "Visual",
    "Audio",
    "UI",
    "Performance",
    "Utility",
    "Adult",
];

/// User-facing attributes of a mod.
///
/// `enabled` and `load_order` are informational only; launch precedence comes
/// from the load order configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModMetadata {
    pub display_name: String,
    pub original_name: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub category: String,
    pub author: String,
    pub version: String,
    pub import_date: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub enabled: bool,
    pub load_order: i64,
}

impl Default for ModMetadata {
    fn default() -> Self {
        let epoch = DateTime::<Utc>::default();
        Self {
            display_name: String::new(),
            original_name: String::new(),
            description: String::new(),
            tags: BTreeSet::new(),
            category: DEFAULT_CATEGORY.to_string(),
            author: String::new(),
            version: String::new(),
            import_date: epoch,
            last_modified: epoch,
            enabled: false,
            load_order: 0,
        }
    }
}

impl ModMetadata {
    /// Defaults derived from the mod's folder name
    pub fn defaults_for(id: &str) -> Self {
        Self {
            display_name: id.to_string(),
            original_name: id.to_string(),
            ..Self::default()
        }
    }

    /// Metadata for a mod imported right now
    pub fn new_import(id: &str) -> Self {
        let now = Utc::now();
        Self {
            import_date: now,
            last_modified: now,
            ..Self::defaults_for(id)
        }
    }

    /// Read the sidecar from `mod_dir`.
    ///
    /// A missing or unreadable sidecar yields folder-name defaults. Fields that
    /// are absent or blank fall back the same way.
    pub fn read(mod_dir: &Path, id: &str) -> Self {
        let path = mod_dir.join(SIDECAR_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::defaults_for(id),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                return Self::defaults_for(id);
            }
        };

        match serde_json::from_str::<ModMetadata>(&content) {
            Ok(mut meta) => {
                if meta.display_name.trim().is_empty() {
                    meta.display_name = id.to_string();
                }
                if meta.original_name.trim().is_empty() {
                    meta.original_name = id.to_string();
                }
                if meta.category.trim().is_empty() {
                    meta.category = DEFAULT_CATEGORY.to_string();
                }
                meta
            }
            Err(e) => {
                tracing::warn!("Corrupt metadata in {}: {}", path.display(), e);
                Self::defaults_for(id)
            }
        }
    }

    /// Write the sidecar into `mod_dir`
    pub fn write(&self, mod_dir: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(mod_dir.join(SIDECAR_FILE), content)?;
        Ok(())
    }

    /// Merge the fields set in `patch`, leaving the rest untouched
    pub fn apply(&mut self, patch: ModMetadataPatch) {
        if let Some(v) = patch.display_name {
            self.display_name = v;
        }
        if let Some(v) = patch.description {
            self.description = v;
        }
        if let Some(v) = patch.tags {
            self.tags = v;
        }
        if let Some(v) = patch.category {
            self.category = v;
        }
        if let Some(v) = patch.author {
            self.author = v;
        }
        if let Some(v) = patch.version {
            self.version = v;
        }
        if let Some(v) = patch.enabled {
            self.enabled = v;
        }
        if let Some(v) = patch.load_order {
            self.load_order = v;
        }
    }
}

/// Partial metadata update. `None` fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModMetadataPatch {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
    pub enabled: Option<bool>,
    pub load_order: Option<i64>,
}

impl ModMetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.description.is_none()
            && self.tags.is_none()
            && self.category.is_none()
            && self.author.is_none()
            && self.version.is_none()
            && self.enabled.is_none()
            && self.load_order.is_none()
    }
}
