//! Configuration management for Silverhand
//!
//! Uses platform paths:
//! - Settings: ~/.config/silverhand/config.toml
//! - Load order: ~/.config/silverhand/load_order.json
//! - Data: ~/.local/share/silverhand/

mod paths;

pub use paths::Paths;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Override for the imported mods directory
    pub mods_dir_override: Option<String>,

    /// Override for the virtual game directory
    pub virtual_dir_override: Option<String>,

    /// Game launch settings
    pub launch: LaunchConfig,

    /// Mirror settings
    pub mirror: MirrorConfig,

    /// Paths configuration
    #[serde(skip)]
    pub paths: Paths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mods_dir_override: None,
            virtual_dir_override: None,
            launch: LaunchConfig::default(),
            mirror: MirrorConfig::default(),
            paths: Paths::new(),
        }
    }
}

/// Launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Executable path relative to the game root
    pub executable: String,

    /// Extra arguments passed to the game
    pub args: Vec<String>,

    /// Command the executable is handed to, e.g. `wine` (none runs it directly)
    pub wrapper: Option<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            executable: crate::games::GAME_EXECUTABLE.to_string(),
            args: Vec::new(),
            wrapper: None,
        }
    }
}

/// Mirror configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// First strategy tried when mirroring a game file
    pub method: MirrorMethod,
}

/// How a game file is reproduced inside the virtual directory.
///
/// Strategies are tried in declaration order starting from the configured one,
/// so `Symlink` falls back to `Hardlink` and then `Copy`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MirrorMethod {
    #[default]
    Symlink,
    Hardlink,
    Copy,
}

impl MirrorMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorMethod::Symlink => "symlink",
            MirrorMethod::Hardlink => "hardlink",
            MirrorMethod::Copy => "copy",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MirrorMethod::Symlink => "Symlink",
            MirrorMethod::Hardlink => "Hardlink",
            MirrorMethod::Copy => "Full Copy",
        }
    }

    /// This method and every cheaper-to-expensive fallback after it.
    pub fn fallback_chain(&self) -> &'static [MirrorMethod] {
        const CHAIN: [MirrorMethod; 3] =
            [MirrorMethod::Symlink, MirrorMethod::Hardlink, MirrorMethod::Copy];
        match self {
            MirrorMethod::Symlink => &CHAIN,
            MirrorMethod::Hardlink => &CHAIN[1..],
            MirrorMethod::Copy => &CHAIN[2..],
        }
    }

    pub fn from_cli(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "symlink" => Some(MirrorMethod::Symlink),
            "hardlink" => Some(MirrorMethod::Hardlink),
            "copy" | "fullcopy" | "full-copy" | "full_copy" => Some(MirrorMethod::Copy),
            _ => None,
        }
    }
}

impl Config {
    /// Resolve the imported mods directory (override or default path)
    pub fn mods_dir(&self) -> PathBuf {
        self.mods_dir_override
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.paths.mods_dir())
    }

    /// Resolve the virtual game directory (override or default path)
    pub fn virtual_dir(&self) -> PathBuf {
        self.virtual_dir_override
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.paths.virtual_dir())
    }

    /// Ensure required directories exist, including overrides.
    pub fn ensure_dirs(&self) -> Result<()> {
        self.paths.ensure_dirs()?;
        std::fs::create_dir_all(self.mods_dir())?;
        Ok(())
    }

    /// Load settings from the default location or create them
    pub async fn load() -> Result<Self> {
        Self::load_with(Paths::new()).await
    }

    /// Load settings rooted at `paths`, writing defaults on first run
    pub async fn load_with(paths: Paths) -> Result<Self> {
        let config_path = paths.config_file();

        let mut config = if fs::try_exists(&config_path).await? {
            let content = fs::read_to_string(&config_path).await?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config {
                paths: paths.clone(),
                ..Config::default()
            };
            config.save().await?;
            config
        };

        config.paths = paths;
        Ok(config)
    }

    /// Save settings to disk
    pub async fn save(&self) -> Result<()> {
        let config_path = self.paths.config_file();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self).map_err(Error::from)?;
        fs::write(&config_path, content).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_chain_starts_at_configured_method() {
        assert_eq!(
            MirrorMethod::Symlink.fallback_chain(),
            &[MirrorMethod::Symlink, MirrorMethod::Hardlink, MirrorMethod::Copy]
        );
        assert_eq!(
            MirrorMethod::Hardlink.fallback_chain(),
            &[MirrorMethod::Hardlink, MirrorMethod::Copy]
        );
        assert_eq!(MirrorMethod::Copy.fallback_chain(), &[MirrorMethod::Copy]);
    }

    #[test]
    fn mirror_method_from_cli() {
        assert_eq!(MirrorMethod::from_cli("HardLink"), Some(MirrorMethod::Hardlink));
        assert_eq!(MirrorMethod::from_cli("full-copy"), Some(MirrorMethod::Copy));
        assert_eq!(MirrorMethod::from_cli("junction"), None);
    }

    #[tokio::test]
    async fn first_load_writes_defaults_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_root(dir.path());

        let mut config = Config::load_with(paths.clone()).await.unwrap();
        assert!(paths.config_file().exists());
        assert_eq!(config.launch.executable, "bin/x64/Cyberpunk2077.exe");
        assert_eq!(config.mods_dir(), paths.mods_dir());

        config.mirror.method = MirrorMethod::Copy;
        config.virtual_dir_override = Some("/srv/virtual".to_string());
        config.save().await.unwrap();

        let reloaded = Config::load_with(paths).await.unwrap();
        assert_eq!(reloaded.mirror.method, MirrorMethod::Copy);
        assert_eq!(reloaded.virtual_dir(), PathBuf::from("/srv/virtual"));
    }
}
