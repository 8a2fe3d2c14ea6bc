//! Application facade tying configuration, mods and launch together

mod actions;

use crate::config::{Config, MirrorMethod};
use crate::games::GameLayout;
use crate::launch::{LaunchOrchestrator, LaunchOutcome, LaunchSettings, ProcessLauncher, SystemLauncher};
use crate::mods::{ArchiveImporter, ConflictReport, ModMetadataPatch, ModPackage, ModRepository, ProgressCallback};
use crate::profiles::{ConfigStore, JsonConfigStore, LoadOrderConfig};

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Main application struct that orchestrates all components
pub struct App {
    /// Application settings
    pub config: Arc<RwLock<Config>>,

    /// Imported mods
    pub mods: ModRepository,

    /// Load order persistence
    pub store: Arc<dyn ConfigStore>,

    /// Virtual environment and game process
    pub orchestrator: LaunchOrchestrator,
}

impl App {
    /// Create a new App instance backed by the on-disk load order
    pub async fn new(config: Config) -> Result<Self> {
        config.ensure_dirs().context("Failed to create directories")?;
        let store = JsonConfigStore::new(config.paths.load_order_file());
        Ok(Self::with_parts(config, Arc::new(store), Arc::new(SystemLauncher)))
    }

    pub fn with_parts(
        config: Config,
        store: Arc<dyn ConfigStore>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        let mods = ModRepository::new(config.mods_dir());
        let orchestrator = LaunchOrchestrator::new(LaunchSettings::from_config(&config), launcher);
        Self {
            config: Arc::new(RwLock::new(config)),
            mods,
            store,
            orchestrator,
        }
    }

    /// Current load order configuration
    pub fn load_order(&self) -> Result<LoadOrderConfig> {
        self.store.load().context("Failed to load the load order")
    }

    /// Load, change and save the load order configuration
    fn modify_load_order<R>(
        &self,
        change: impl FnOnce(&mut LoadOrderConfig) -> crate::error::Result<R>,
    ) -> Result<R> {
        let mut load_order = self.load_order()?;
        let result = change(&mut load_order)?;
        self.store
            .save(&load_order)
            .context("Failed to save the load order")?;
        Ok(result)
    }

    /// Import an archive into the mods directory
    pub async fn import_archive(
        &self,
        archive: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<ModPackage> {
        let mut importer = ArchiveImporter::new(self.mods.mods_dir());
        if let Some(progress) = progress {
            importer = importer.with_progress(progress);
        }
        let package = importer.import_archive(archive).await?;
        tracing::info!("Imported {} from {}", package.id, archive.display());
        Ok(package)
    }

    /// Enable or disable an imported mod
    pub fn set_mod_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        self.mods.get(id)?;
        self.modify_load_order(|load_order| {
            if enabled {
                load_order.enable(id);
            } else {
                load_order.disable(id);
            }
            Ok(())
        })?;

        let patch = ModMetadataPatch {
            enabled: Some(enabled),
            ..ModMetadataPatch::default()
        };
        if let Err(e) = self.mods.update(id, patch) {
            tracing::warn!("Failed to record enabled state for {}: {}", id, e);
        }
        Ok(())
    }

    /// Delete a mod and every reference to it
    pub fn remove_mod(&self, id: &str) -> Result<()> {
        self.mods.delete(id)?;
        self.modify_load_order(|load_order| {
            load_order.forget_mod(id);
            Ok(())
        })
    }

    pub fn edit_mod(&self, id: &str, patch: ModMetadataPatch) -> Result<ModPackage> {
        Ok(self.mods.update(id, patch)?)
    }

    /// Replace the load order
    pub fn set_load_order(&self, order: Vec<String>) -> Result<()> {
        self.modify_load_order(|load_order| {
            load_order.set_load_order(order);
            Ok(())
        })
    }

    /// Move a mod to a zero-based position in the load order
    pub fn move_mod(&self, id: &str, index: usize) -> Result<()> {
        self.modify_load_order(|load_order| load_order.move_mod(id, index))
    }

    /// Configured installation directory
    pub fn installation_path(&self) -> Result<PathBuf> {
        match self.load_order()?.installation_path() {
            Some(path) => Ok(path),
            None => bail!("No game installation set. Use 'silverhand game set-path <dir>' first."),
        }
    }

    /// Game layout rooted at the configured installation
    pub async fn game_layout(&self) -> Result<GameLayout> {
        let installation = self.installation_path()?;
        let executable = self.config.read().await.launch.executable.clone();
        Ok(GameLayout::new(installation).with_executable(executable))
    }

    /// Store the installation directory after checking the executable is there
    pub async fn set_installation_path(&self, path: &Path) -> Result<()> {
        let executable = self.config.read().await.launch.executable.clone();
        GameLayout::new(path)
            .with_executable(executable)
            .validate_install_path()?;
        self.modify_load_order(|load_order| {
            load_order.set_installation_path(path);
            Ok(())
        })
    }

    /// Merge preview of the enabled mods
    pub async fn preview(&self) -> Result<ConflictReport> {
        let order = self.load_order()?.enabled_in_load_order();
        Ok(self.orchestrator.preview(&order).await?)
    }

    /// Build the virtual environment and start the game
    pub async fn launch_game(&self) -> Result<LaunchOutcome> {
        let load_order = self.load_order()?;
        let installation = match load_order.installation_path() {
            Some(path) => path,
            None => bail!("No game installation set. Use 'silverhand game set-path <dir>' first."),
        };
        let order = load_order.enabled_in_load_order();
        Ok(self.orchestrator.launch(&installation, &order).await?)
    }

    /// Persist the first mirror strategy tried on the next launch
    pub async fn set_mirror_method(&self, method: MirrorMethod) -> Result<()> {
        let mut config = self.config.write().await;
        config.mirror.method = method;
        config.save().await?;
        self.orchestrator.set_settings(LaunchSettings::from_config(&config));
        Ok(())
    }

    /// Persist or clear the launch wrapper command
    pub async fn set_launch_wrapper(&self, wrapper: Option<&str>) -> Result<()> {
        let mut config = self.config.write().await;
        config.launch.wrapper = wrapper
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(ToOwned::to_owned);
        config.save().await?;
        self.orchestrator.set_settings(LaunchSettings::from_config(&config));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Paths;
    use crate::error::Error;
    use crate::games::GAME_EXECUTABLE;
    use crate::launch::process::MockProcessLauncher;
    use crate::launch::SpawnedProcess;
    use crate::mods::archive::tests::write_zip;
    use crate::profiles::MockConfigStore;

    fn config_in(root: &Path) -> Config {
        Config {
            paths: Paths::with_root(root),
            ..Config::default()
        }
    }

    fn app_with(root: &Path, store: MockConfigStore) -> App {
        App::with_parts(
            config_in(root),
            Arc::new(store),
            Arc::new(MockProcessLauncher::new()),
        )
    }

    #[tokio::test]
    async fn enable_saves_load_order_and_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = MockConfigStore::new();
        store
            .expect_load()
            .returning(|| Ok(LoadOrderConfig::default()));
        store
            .expect_save()
            .withf(|config| config.enabled_mods == vec!["Better Lights".to_string()])
            .times(1)
            .returning(|_| Ok(()));
        let app = app_with(tmp.path(), store);

        let archive = write_zip(tmp.path(), "Better Lights.zip", &[("lights.archive", b"x")]);
        app.import_archive(&archive, None).await.unwrap();
        app.set_mod_enabled("Better Lights", true).unwrap();

        assert!(app.mods.get("Better Lights").unwrap().metadata.enabled);
    }

    #[test]
    fn enabling_unknown_mod_does_not_save() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = MockConfigStore::new();
        store.expect_save().never();
        let app = app_with(tmp.path(), store);

        let err = app.set_mod_enabled("ghost", true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ModNotFound(_))
        ));
    }

    #[tokio::test]
    async fn remove_forgets_mod() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = MockConfigStore::new();
        store.expect_load().returning(|| {
            let mut config = LoadOrderConfig::default();
            config.enable("a");
            config.enable("b");
            Ok(config)
        });
        store
            .expect_save()
            .withf(|config| config.mod_load_order == vec!["b".to_string()])
            .times(1)
            .returning(|_| Ok(()));
        let app = app_with(tmp.path(), store);

        let archive = write_zip(tmp.path(), "a.zip", &[("a.archive", b"x")]);
        app.import_archive(&archive, None).await.unwrap();
        app.remove_mod("a").unwrap();
        assert!(!app.mods.mods_dir().join("a").exists());
    }

    #[tokio::test]
    async fn launch_requires_installation() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = MockConfigStore::new();
        store
            .expect_load()
            .returning(|| Ok(LoadOrderConfig::default()));
        let app = app_with(tmp.path(), store);

        let err = app.launch_game().await.unwrap_err();
        assert!(err.to_string().contains("set-path"));
    }

    #[tokio::test]
    async fn settings_changes_reach_the_next_launch() {
        let tmp = tempfile::tempdir().unwrap();
        let game = tmp.path().join("game");
        let exe = game.join(GAME_EXECUTABLE);
        std::fs::create_dir_all(exe.parent().unwrap()).unwrap();
        std::fs::write(&exe, b"MZ").unwrap();

        let mut store = MockConfigStore::new();
        store.expect_load().returning(move || {
            let mut config = LoadOrderConfig::default();
            config.set_installation_path(&game);
            Ok(config)
        });
        let mut launcher = MockProcessLauncher::new();
        launcher
            .expect_spawn_detached()
            .withf(|program, args, _| {
                program == Path::new("wine") && args[0].ends_with("Cyberpunk2077.exe")
            })
            .times(1)
            .return_once(|_, _, _| {
                let (_tx, rx) = tokio::sync::oneshot::channel();
                Ok(SpawnedProcess { pid: 31, exited: rx })
            });
        let app = App::with_parts(config_in(tmp.path()), Arc::new(store), Arc::new(launcher));

        app.set_launch_wrapper(Some(" wine ")).await.unwrap();
        app.set_mirror_method(MirrorMethod::Copy).await.unwrap();
        let settings = app.orchestrator.settings();
        assert_eq!(settings.wrapper.as_deref(), Some("wine"));
        assert_eq!(settings.mirror_method, MirrorMethod::Copy);

        let outcome = app.launch_game().await.unwrap();
        assert_eq!(outcome.pid, 31);
        assert!(outcome.mirror.copies > 0);
        assert_eq!(outcome.mirror.symlinks, 0);
    }

    #[tokio::test]
    async fn set_installation_path_checks_executable() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = MockConfigStore::new();
        store.expect_save().never();
        let app = app_with(tmp.path(), store);

        let err = app.set_installation_path(tmp.path()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ExecutableNotFound(_))
        ));
    }
}
