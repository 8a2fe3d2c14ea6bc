//! Enabled mods, load order and profiles (`load_order.json`)

mod store;

pub use store::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// Key of the profile every configuration starts with
pub const DEFAULT_PROFILE: &str = "default";

/// A saved set of enabled mods and their order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub name: String,
    pub enabled_mods: Vec<String>,
    pub load_order: Vec<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: "Default Profile".to_string(),
            enabled_mods: Vec::new(),
            load_order: Vec::new(),
        }
    }
}

/// Persisted launch configuration.
///
/// # Load order
///
/// `mod_load_order` is the only source of overlay precedence: later entries
/// win. Every enabled id appears in it exactly once. Disabled ids may stay in
/// it so their position survives being re-enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadOrderConfig {
    #[serde(alias = "gameInstallPath")]
    pub installation_path: String,
    pub enabled_mods: Vec<String>,
    pub mod_load_order: Vec<String>,
    pub profiles: BTreeMap<String, Profile>,
    pub current_profile: String,
}

impl Default for LoadOrderConfig {
    fn default() -> Self {
        Self {
            installation_path: String::new(),
            enabled_mods: Vec::new(),
            mod_load_order: Vec::new(),
            profiles: BTreeMap::from([(DEFAULT_PROFILE.to_string(), Profile::default())]),
            current_profile: DEFAULT_PROFILE.to_string(),
        }
    }
}

fn dedupe(ids: &mut Vec<String>) {
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(id.clone()));
}

impl LoadOrderConfig {
    /// Configured installation directory, if any
    pub fn installation_path(&self) -> Option<PathBuf> {
        let trimmed = self.installation_path.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }

    pub fn set_installation_path(&mut self, path: impl Into<PathBuf>) {
        self.installation_path = path.into().to_string_lossy().into_owned();
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled_mods.iter().any(|m| m == id)
    }

    /// Enable a mod; new ids go to the end of the load order (highest precedence)
    pub fn enable(&mut self, id: &str) {
        if !self.is_enabled(id) {
            self.enabled_mods.push(id.to_string());
        }
        if !self.mod_load_order.iter().any(|m| m == id) {
            self.mod_load_order.push(id.to_string());
        }
    }

    /// Disable a mod. Its load order position is kept.
    pub fn disable(&mut self, id: &str) {
        self.enabled_mods.retain(|m| m != id);
    }

    /// Replace the enabled set
    pub fn set_enabled(&mut self, ids: &[String]) {
        self.enabled_mods = ids.to_vec();
        self.normalize();
    }

    /// Replace the load order. Enabled ids missing from `order` are appended.
    pub fn set_load_order(&mut self, order: Vec<String>) {
        self.mod_load_order = order;
        self.normalize();
    }

    /// Move a mod to `index` in the load order (clamped to the end)
    pub fn move_mod(&mut self, id: &str, index: usize) -> Result<()> {
        let from = self
            .mod_load_order
            .iter()
            .position(|m| m == id)
            .ok_or_else(|| Error::ModNotFound(id.to_string()))?;
        let item = self.mod_load_order.remove(from);
        let index = index.min(self.mod_load_order.len());
        self.mod_load_order.insert(index, item);
        Ok(())
    }

    /// Drop every reference to a deleted mod, profiles included
    pub fn forget_mod(&mut self, id: &str) {
        self.enabled_mods.retain(|m| m != id);
        self.mod_load_order.retain(|m| m != id);
        for profile in self.profiles.values_mut() {
            profile.enabled_mods.retain(|m| m != id);
            profile.load_order.retain(|m| m != id);
        }
    }

    /// Enabled mods ordered by precedence, lowest first
    pub fn enabled_in_load_order(&self) -> Vec<String> {
        self.mod_load_order
            .iter()
            .filter(|id| self.is_enabled(id))
            .cloned()
            .collect()
    }

    /// Repair the load order invariant and the profile table.
    ///
    /// Returns true when anything changed.
    pub fn normalize(&mut self) -> bool {
        let before = self.clone();

        dedupe(&mut self.enabled_mods);
        dedupe(&mut self.mod_load_order);
        for id in &self.enabled_mods {
            if !self.mod_load_order.contains(id) {
                self.mod_load_order.push(id.clone());
            }
        }

        if self.profiles.is_empty() {
            self.profiles
                .insert(DEFAULT_PROFILE.to_string(), Profile::default());
        }
        if !self.profiles.contains_key(&self.current_profile) {
            self.current_profile = self
                .profiles
                .keys()
                .next()
                .cloned()
                .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        }

        *self != before
    }

    /// Store the current enabled set and order as a profile and make it current
    pub fn save_profile(&mut self, key: &str, name: Option<&str>) {
        let name = name
            .map(str::to_string)
            .or_else(|| self.profiles.get(key).map(|p| p.name.clone()))
            .unwrap_or_else(|| key.to_string());
        self.profiles.insert(
            key.to_string(),
            Profile {
                name,
                enabled_mods: self.enabled_mods.clone(),
                load_order: self.mod_load_order.clone(),
            },
        );
        self.current_profile = key.to_string();
    }

    /// Load a saved profile into the live configuration
    pub fn switch_profile(&mut self, key: &str) -> Result<()> {
        let profile = self
            .profiles
            .get(key)
            .cloned()
            .ok_or_else(|| Error::ProfileNotFound(key.to_string()))?;
        self.enabled_mods = profile.enabled_mods;
        self.mod_load_order = profile.load_order;
        self.current_profile = key.to_string();
        self.normalize();
        Ok(())
    }

    /// Remove a profile. Deleting the current one falls back to another.
    pub fn delete_profile(&mut self, key: &str) -> Result<()> {
        if self.profiles.remove(key).is_none() {
            return Err(Error::ProfileNotFound(key.to_string()));
        }
        self.normalize();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_has_default_profile() {
        let config = LoadOrderConfig::default();
        assert_eq!(config.current_profile, "default");
        assert_eq!(config.profiles["default"].name, "Default Profile");
        assert!(config.installation_path().is_none());
    }

    #[test]
    fn disable_keeps_position_for_reenable() {
        let mut config = LoadOrderConfig::default();
        config.enable("a");
        config.enable("b");
        config.enable("c");
        config.disable("b");

        assert_eq!(config.mod_load_order, ids(&["a", "b", "c"]));
        assert_eq!(config.enabled_in_load_order(), ids(&["a", "c"]));

        config.enable("b");
        assert_eq!(config.enabled_in_load_order(), ids(&["a", "b", "c"]));
    }

    #[test]
    fn set_load_order_keeps_enabled_invariant() {
        let mut config = LoadOrderConfig::default();
        config.set_enabled(&ids(&["x", "y", "x"]));
        assert_eq!(config.enabled_mods, ids(&["x", "y"]));

        config.set_load_order(ids(&["y", "z", "y"]));
        assert_eq!(config.mod_load_order, ids(&["y", "z", "x"]));
        assert_eq!(config.enabled_in_load_order(), ids(&["y", "x"]));
    }

    #[test]
    fn move_mod_clamps() {
        let mut config = LoadOrderConfig::default();
        config.set_load_order(ids(&["a", "b", "c"]));
        config.move_mod("a", 99).unwrap();
        assert_eq!(config.mod_load_order, ids(&["b", "c", "a"]));
        config.move_mod("c", 0).unwrap();
        assert_eq!(config.mod_load_order, ids(&["c", "b", "a"]));
        assert!(matches!(config.move_mod("zz", 0), Err(Error::ModNotFound(_))));
    }

    #[test]
    fn forget_mod_purges_profiles() {
        let mut config = LoadOrderConfig::default();
        config.enable("a");
        config.enable("b");
        config.save_profile("night", Some("Night City"));
        config.forget_mod("a");

        assert_eq!(config.mod_load_order, ids(&["b"]));
        assert_eq!(config.profiles["night"].enabled_mods, ids(&["b"]));
    }

    #[test]
    fn profiles_round_trip() {
        let mut config = LoadOrderConfig::default();
        config.enable("a");
        config.save_profile("one", None);
        assert_eq!(config.profiles["one"].name, "one");

        config.enable("b");
        config.save_profile("two", Some("Two"));

        config.switch_profile("one").unwrap();
        assert_eq!(config.enabled_in_load_order(), ids(&["a"]));
        assert_eq!(config.current_profile, "one");

        config.delete_profile("one").unwrap();
        assert_eq!(config.current_profile, "default");
        assert!(matches!(
            config.switch_profile("one"),
            Err(Error::ProfileNotFound(_))
        ));
    }

    #[test]
    fn accepts_legacy_install_path_key() {
        let config: LoadOrderConfig = serde_json::from_str(
            r#"{"gameInstallPath": "/games/cp2077", "enabledMods": ["a"], "modLoadOrder": []}"#,
        )
        .unwrap();
        assert_eq!(config.installation_path(), Some(PathBuf::from("/games/cp2077")));
        assert_eq!(config.current_profile, "default");

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"installationPath\""));
        assert!(json.contains("\"modLoadOrder\""));
    }
}
