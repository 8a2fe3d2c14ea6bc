//! Persistence for [`LoadOrderConfig`]

use super::LoadOrderConfig;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Reads and writes the load order configuration
#[cfg_attr(test, mockall::automock)]
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<LoadOrderConfig>;

    fn save(&self, config: &LoadOrderConfig) -> Result<()>;
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonConfigStore {
    /// Missing file yields the default configuration
    fn load(&self) -> Result<LoadOrderConfig> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LoadOrderConfig::default())
            }
            Err(e) => return Err(e.into()),
        };

        let mut config: LoadOrderConfig = serde_json::from_str(&content)?;
        if config.normalize() {
            tracing::info!("Repaired load order in {}", self.path.display());
        }
        Ok(config)
    }

    fn save(&self, config: &LoadOrderConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, content)?;
        tracing::debug!("Saved load order to {}", self.path.display());
        Ok(())
    }
}
