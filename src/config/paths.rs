//! Platform-appropriate path management

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolves every on-disk location the loader uses.
///
/// On Linux this follows the XDG base directory layout
/// (`~/.config/silverhand`, `~/.local/share/silverhand`); on Windows and macOS
/// the platform equivalents from [`ProjectDirs`].
#[derive(Debug, Clone)]
pub struct Paths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    /// Create a new Paths instance from the platform directories.
    ///
    /// Falls back to a `.silverhand` directory under the working directory when
    /// no home directory can be determined.
    pub fn new() -> Self {
        match ProjectDirs::from("", "", "silverhand") {
            Some(dirs) => Self {
                config_dir: dirs.config_dir().to_path_buf(),
                data_dir: dirs.data_dir().to_path_buf(),
            },
            None => Self::with_root(Path::new(".silverhand")),
        }
    }

    /// Keep config and data under a single root (portable installs, tests).
    pub fn with_root(root: &Path) -> Self {
        Self {
            config_dir: root.join("config"),
            data_dir: root.to_path_buf(),
        }
    }

    // ========== Config Paths ==========

    /// Config directory: ~/.config/silverhand/
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Settings file: ~/.config/silverhand/config.toml
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Enabled mods and load order: ~/.config/silverhand/load_order.json
    pub fn load_order_file(&self) -> PathBuf {
        self.config_dir.join("load_order.json")
    }

    // ========== Data Paths ==========

    /// Data directory: ~/.local/share/silverhand/
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// Imported mods: ~/.local/share/silverhand/mods/
    pub fn mods_dir(&self) -> PathBuf {
        self.data_dir.join("mods")
    }

    /// Directory for a single imported mod
    pub fn mod_dir(&self, mod_id: &str) -> PathBuf {
        self.mods_dir().join(mod_id)
    }

    /// Virtual game directory: ~/.local/share/silverhand/virtual_game/
    pub fn virtual_dir(&self) -> PathBuf {
        self.data_dir.join("virtual_game")
    }

    /// Log directory: ~/.local/share/silverhand/logs/
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    // ========== Utility Methods ==========

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::create_dir_all(self.data_dir())?;
        std::fs::create_dir_all(self.mods_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooted_paths_stay_under_root() {
        let paths = Paths::with_root(Path::new("/tmp/sh"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/sh/config/config.toml"));
        assert_eq!(paths.load_order_file(), PathBuf::from("/tmp/sh/config/load_order.json"));
        assert_eq!(paths.mod_dir("foo"), PathBuf::from("/tmp/sh/mods/foo"));
        assert_eq!(paths.virtual_dir(), PathBuf::from("/tmp/sh/virtual_game"));
    }
}
