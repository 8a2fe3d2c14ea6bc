//! Cyberpunk 2077 installation layout and framework detection

use crate::error::{Error, Result};
use regex_lite::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Game executable, relative to the installation root
pub const GAME_EXECUTABLE: &str = "bin/x64/Cyberpunk2077.exe";

/// Top-level directories a mod may ship that map straight onto the game tree
pub const CANONICAL_ROOTS: &[&str] = &["archive", "r6", "redscript", "engine", "bin", "red4ext"];

/// Where packed `.archive` resources are loaded from
pub const ARCHIVE_MOD_DIR: &str = "archive/pc/mod";

/// RED4ext plugin DLLs recognized by name when they sit at the archive root
pub const KNOWN_PLUGINS: &[&str] = &[
    "VirtualCarDealer",
    "EquipmentEx",
    "InputLoader",
    "Codeware",
    "ArchiveXL",
    "TweakXL",
];

/// Loose root-level DLLs that are moved into place after extraction
pub const ORGANIZABLE_PLUGINS: &[&str] = &[
    "VirtualCarDealer",
    "ArchiveXL",
    "TweakXL",
    "Codeware",
    "EquipmentEx",
    "InputLoader",
    "RED4ext",
    "redscript",
];

/// Extensions that mark a directory as mod content
pub const CONTENT_EXTENSIONS: &[&str] = &["archive", "reds", "lua", "json", "yaml", "xml", "tweak", "dll"];

/// Cyber Engine Tweaks plugin directory
pub const CET_DIR: &str = "bin/x64/plugins/cyber_engine_tweaks";

/// A game installation rooted at `install_path`
#[derive(Debug, Clone)]
pub struct GameLayout {
    pub install_path: PathBuf,
    executable: String,
}

impl GameLayout {
    pub fn new(install_path: impl Into<PathBuf>) -> Self {
        Self {
            install_path: install_path.into(),
            executable: GAME_EXECUTABLE.to_string(),
        }
    }

    /// Use a non-default executable location (relative to the root)
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Relative executable path
    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Executable resolved under an arbitrary root (the installation or a virtual copy)
    pub fn executable_under(&self, root: &Path) -> PathBuf {
        root.join(&self.executable)
    }

    /// Check that `install_path` looks like a game installation.
    ///
    /// The directory must exist and contain the game executable.
    pub fn validate_install_path(&self) -> Result<()> {
        if !self.install_path.is_dir() {
            return Err(Error::MirrorSourceMissing(self.install_path.clone()));
        }
        let exe = self.executable_under(&self.install_path);
        if !exe.is_file() {
            return Err(Error::ExecutableNotFound(exe));
        }
        Ok(())
    }

    /// Report which files of a framework are present in this installation
    pub fn check_framework(&self, key: &str) -> Option<FrameworkStatus> {
        let framework = framework(key)?;
        let (present, missing) = framework
            .required_files
            .iter()
            .partition(|rel| self.install_path.join(rel).exists());
        Some(FrameworkStatus {
            framework,
            present,
            missing,
        })
    }

    /// Check every known framework
    pub fn check_frameworks(&self) -> Vec<FrameworkStatus> {
        FRAMEWORKS
            .iter()
            .filter_map(|f| self.check_framework(f.key))
            .collect()
    }
}

/// A script-extension framework that mods commonly depend on
#[derive(Debug, Clone, Serialize)]
pub struct Framework {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    pub nexus_url: &'static str,
    pub required_files: &'static [&'static str],
    pub aliases: &'static [&'static str],
    pub category: &'static str,
}

#[derive(Debug, Clone)]
pub struct FrameworkStatus {
    pub framework: &'static Framework,
    pub present: Vec<&'static str>,
    pub missing: Vec<&'static str>,
}

impl FrameworkStatus {
    pub fn is_installed(&self) -> bool {
        self.missing.is_empty()
    }
}

pub static FRAMEWORKS: &[Framework] = &[
    Framework {
        key: "archivexl",
        name: "ArchiveXL",
        description: "Framework for loading custom archive files",
        required: true,
        nexus_url: "https://www.nexusmods.com/cyberpunk2077/mods/4198",
        required_files: &["red4ext/plugins/ArchiveXL/ArchiveXL.dll"],
        aliases: &["archivexl", "archive_xl"],
        category: "Framework",
    },
    Framework {
        key: "tweakxl",
        name: "TweakXL",
        description: "Framework for loading custom tweaks and game modifications",
        required: true,
        nexus_url: "https://www.nexusmods.com/cyberpunk2077/mods/4197",
        required_files: &["red4ext/plugins/TweakXL/TweakXL.dll"],
        aliases: &["tweakxl", "tweak_xl"],
        category: "Framework",
    },
    Framework {
        key: "codeware",
        name: "Codeware",
        description: "Library for mod developers with common utilities and frameworks",
        required: true,
        nexus_url: "https://www.nexusmods.com/cyberpunk2077/mods/7780",
        required_files: &["red4ext/plugins/Codeware/Codeware.dll"],
        aliases: &["codeware"],
        category: "Framework",
    },
    Framework {
        key: "redscript",
        name: "REDScript",
        description: "Scripting framework for Cyberpunk 2077",
        required: true,
        nexus_url: "https://www.nexusmods.com/cyberpunk2077/mods/1511",
        required_files: &["engine/redscript.dll", "engine/config/base/scripts.ini"],
        aliases: &["redscript", "red_script"],
        category: "Framework",
    },
    Framework {
        key: "red4ext",
        name: "RED4ext",
        description: "Script extender for Cyberpunk 2077",
        required: true,
        nexus_url: "https://www.nexusmods.com/cyberpunk2077/mods/2380",
        required_files: &["red4ext/RED4ext.dll", "red4ext/config.ini"],
        aliases: &["red4ext", "red_4_ext"],
        category: "Framework",
    },
    Framework {
        key: "cyber_engine_tweaks",
        name: "Cyber Engine Tweaks",
        description: "Framework for Lua scripting and game modifications",
        required: false,
        nexus_url: "https://www.nexusmods.com/cyberpunk2077/mods/107",
        required_files: &["bin/x64/plugins/cyber_engine_tweaks/version.dll"],
        aliases: &["cet", "cyber_engine_tweaks", "cyberenginetweaks"],
        category: "Framework",
    },
    Framework {
        key: "input_loader",
        name: "Input Loader",
        description: "Framework for custom input bindings and controls",
        required: false,
        nexus_url: "https://www.nexusmods.com/cyberpunk2077/mods/4575",
        required_files: &["red4ext/plugins/InputLoader/InputLoader.dll"],
        aliases: &["inputloader", "input_loader"],
        category: "Framework",
    },
    Framework {
        key: "virtual_car_dealer",
        name: "Virtual Car Dealer",
        description: "Framework for vehicle spawning and management",
        required: false,
        nexus_url: "https://www.nexusmods.com/cyberpunk2077/mods/4454",
        required_files: &["red4ext/plugins/VirtualCarDealer/VirtualCarDealer.dll"],
        aliases: &["virtualcardealer", "virtual_car_dealer"],
        category: "Gameplay",
    },
    Framework {
        key: "equipment_ex",
        name: "Equipment-EX",
        description: "Framework for custom equipment and clothing",
        required: false,
        nexus_url: "https://www.nexusmods.com/cyberpunk2077/mods/6945",
        required_files: &["red4ext/plugins/EquipmentEx/EquipmentEx.dll"],
        aliases: &["equipmentex", "equipment_ex"],
        category: "Framework",
    },
];

/// Look up a framework by key or alias (case-insensitive)
pub fn framework(key: &str) -> Option<&'static Framework> {
    let key = key.to_ascii_lowercase();
    FRAMEWORKS
        .iter()
        .find(|f| f.key == key || f.aliases.iter().any(|a| *a == key))
}

/// Error-log patterns and the framework each one points at.
/// `None` means the framework name is taken from the first capture group.
static MISSING_PATTERNS: LazyLock<Vec<(Regex, Option<&'static str>)>> = LazyLock::new(|| {
    [
        (r"(?i)archivexl|archive_xl", Some("archivexl")),
        (r"(?i)tweakxl|tweak_xl", Some("tweakxl")),
        (r"(?i)codeware", Some("codeware")),
        (r"(?i)red4ext[\\/]plugins[\\/]([^\\/\s]+)", None),
        (r"(?i)virtualcardealer", Some("virtual_car_dealer")),
        (r"(?i)equipmentex", Some("equipment_ex")),
        (r"(?i)inputloader", Some("input_loader")),
    ]
    .into_iter()
    .filter_map(|(pattern, key)| Regex::new(pattern).ok().map(|re| (re, key)))
    .collect()
});

/// Scan script compiler output for references to frameworks that are not loaded.
///
/// Results are ordered as in [`FRAMEWORKS`] and contain each framework once.
pub fn detect_missing_frameworks(log_text: &str) -> Vec<&'static Framework> {
    let mut found = BTreeSet::new();

    for line in log_text.lines() {
        for (re, key) in MISSING_PATTERNS.iter() {
            let Some(caps) = re.captures(line) else {
                continue;
            };
            let matched = match key {
                Some(key) => framework(key),
                None => caps.get(1).and_then(|m| framework(m.as_str())),
            };
            if let Some(f) = matched {
                found.insert(f.key);
            }
        }
    }

    FRAMEWORKS.iter().filter(|f| found.contains(f.key)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn validate_install_path_requires_executable() {
        let dir = tempfile::tempdir().unwrap();
        let layout = GameLayout::new(dir.path());
        assert!(matches!(
            layout.validate_install_path(),
            Err(Error::ExecutableNotFound(_))
        ));

        let exe = dir.path().join(GAME_EXECUTABLE);
        fs::create_dir_all(exe.parent().unwrap()).unwrap();
        fs::write(&exe, b"MZ").unwrap();
        layout.validate_install_path().unwrap();

        let missing = GameLayout::new(dir.path().join("nope"));
        assert!(matches!(
            missing.validate_install_path(),
            Err(Error::MirrorSourceMissing(_))
        ));
    }

    #[test]
    fn check_framework_lists_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("engine")).unwrap();
        fs::write(dir.path().join("engine/redscript.dll"), b"").unwrap();

        let layout = GameLayout::new(dir.path());
        let status = layout.check_framework("REDScript").unwrap();
        assert!(!status.is_installed());
        assert_eq!(status.present, vec!["engine/redscript.dll"]);
        assert_eq!(status.missing, vec!["engine/config/base/scripts.ini"]);

        assert!(layout.check_framework("unknown").is_none());
        assert_eq!(layout.check_frameworks().len(), FRAMEWORKS.len());
    }

    #[test]
    fn detects_frameworks_from_compiler_log() {
        let log = "\
[ERROR] UNRESOLVED_TYPE: ArchiveXL.Resource not found
[ERROR] Could not load red4ext\\plugins\\InputLoader\\InputLoader.dll
[WARN] codeware: missing symbol
[ERROR] ArchiveXL again";
        let keys: Vec<_> = detect_missing_frameworks(log).iter().map(|f| f.key).collect();
        assert_eq!(keys, vec!["archivexl", "codeware", "input_loader"]);
        assert!(detect_missing_frameworks("all good").is_empty());
    }
}
