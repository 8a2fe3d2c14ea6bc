//! Game launch: build the virtual environment, start the game, track it

pub mod process;
pub mod session;

pub use process::{ProcessLauncher, SpawnedProcess, SystemLauncher};
pub use session::{BuildLock, GameRecord};

use crate::config::{Config, MirrorMethod};
use crate::error::{Error, Result};
use crate::games::GameLayout;
use crate::mods::{ConflictAnalyzer, ConflictReport};
use crate::runtime::{remove_tree, MirrorBuilder, MirrorStats, OverlayEngine, OverlayReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{watch, Mutex, OwnedMutexGuard};

/// Whether the game launched from the virtual environment is running
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GameStatus {
    #[default]
    Idle,
    Running {
        pid: u32,
        launched_at: DateTime<Utc>,
    },
}

impl GameStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, GameStatus::Running { .. })
    }
}

/// Serializable view of [`GameStatus`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameProcessInfo {
    pub is_running: bool,
    pub launched_at: Option<DateTime<Utc>>,
    pub process_id: Option<u32>,
}

impl From<&GameStatus> for GameProcessInfo {
    fn from(status: &GameStatus) -> Self {
        match status {
            GameStatus::Idle => Self {
                is_running: false,
                launched_at: None,
                process_id: None,
            },
            GameStatus::Running { pid, launched_at } => Self {
                is_running: true,
                launched_at: Some(*launched_at),
                process_id: Some(*pid),
            },
        }
    }
}

/// Locations and launch options
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub mods_dir: PathBuf,
    pub virtual_dir: PathBuf,
    pub executable: String,
    pub args: Vec<String>,
    pub wrapper: Option<String>,
    pub mirror_method: MirrorMethod,
}

impl LaunchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mods_dir: config.mods_dir(),
            virtual_dir: config.virtual_dir(),
            executable: config.launch.executable.clone(),
            args: config.launch.args.clone(),
            wrapper: config
                .launch
                .wrapper
                .as_deref()
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_string),
            mirror_method: config.mirror.method,
        }
    }
}

/// Result of a successful launch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOutcome {
    pub virtual_path: PathBuf,
    pub pid: u32,
    pub mirror: MirrorStats,
    pub overlay: OverlayReport,
}

/// Owns the virtual environment and the game status cell.
///
/// One build runs at a time; overlapping launches are rejected with
/// [`Error::LaunchInProgress`]. The build lock and the running game are also
/// published to other silverhand processes through [`session`] files.
#[derive(Clone)]
pub struct LaunchOrchestrator {
    settings: Arc<RwLock<LaunchSettings>>,
    launcher: Arc<dyn ProcessLauncher>,
    status: Arc<watch::Sender<GameStatus>>,
    build_lock: Arc<Mutex<()>>,
}

/// Guards held for the whole build, including by the blocking job
struct BuildGuard {
    _local: OwnedMutexGuard<()>,
    _shared: BuildLock,
}

impl LaunchOrchestrator {
    pub fn new(settings: LaunchSettings, launcher: Arc<dyn ProcessLauncher>) -> Self {
        let (status, _) = watch::channel(GameStatus::Idle);
        Self {
            settings: Arc::new(RwLock::new(settings)),
            launcher,
            status: Arc::new(status),
            build_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Settings used by the next preview, launch or clean
    pub fn settings(&self) -> LaunchSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_settings(&self, settings: LaunchSettings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// Current game status, including a game started by another process
    pub fn status(&self) -> GameStatus {
        let current = self.status.borrow().clone();
        if current.is_running() {
            return current;
        }
        match GameRecord::load_live(&session::state_dir(&self.settings().virtual_dir)) {
            Some(record) => GameStatus::Running {
                pid: record.pid,
                launched_at: record.launched_at,
            },
            None => current,
        }
    }

    /// Receive every status change
    pub fn subscribe_status(&self) -> watch::Receiver<GameStatus> {
        self.status.subscribe()
    }

    fn ensure_not_running(&self) -> Result<()> {
        match self.status() {
            GameStatus::Running { pid, .. } => Err(Error::GameRunning(pid)),
            GameStatus::Idle => Ok(()),
        }
    }

    /// Take the in-process lock, then the lock shared with other processes
    fn begin_build(&self, state_dir: &Path) -> Result<BuildGuard> {
        let local = self
            .build_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| Error::LaunchInProgress)?;
        let shared = BuildLock::acquire(state_dir)?;
        self.ensure_not_running()?;
        Ok(BuildGuard {
            _local: local,
            _shared: shared,
        })
    }

    /// Preview what a launch with `load_order` would merge
    pub async fn preview(&self, load_order: &[String]) -> Result<ConflictReport> {
        let settings = self.settings();
        let analyzer = ConflictAnalyzer::new(&settings.mods_dir);
        let order = load_order.to_vec();
        let mut report = tokio::task::spawn_blocking(move || analyzer.analyze(&order)).await??;
        report.merged_path = Some(settings.virtual_dir);
        Ok(report)
    }

    /// Rebuild the virtual environment and start the game from it.
    ///
    /// `load_order` holds the enabled mods, lowest precedence first. The
    /// installation is only ever read. The build locks live in the blocking
    /// job, so dropping this future does not release them before the job ends.
    pub async fn launch(&self, installation: &Path, load_order: &[String]) -> Result<LaunchOutcome> {
        let settings = self.settings();
        let virtual_dir = settings.virtual_dir.clone();
        let state_dir = session::state_dir(&virtual_dir);
        let build = self.begin_build(&state_dir)?;

        tracing::info!(
            "Building virtual environment at {} ({} mods)",
            virtual_dir.display(),
            load_order.len()
        );

        let (_build, built) = {
            let installation = installation.to_path_buf();
            let virtual_dir = virtual_dir.clone();
            let mods_dir = settings.mods_dir.clone();
            let method = settings.mirror_method;
            let order = load_order.to_vec();
            tokio::task::spawn_blocking(move || {
                let built = build_environment(&installation, &virtual_dir, &mods_dir, method, &order);
                (build, built)
            })
            .await?
        };
        let (mirror, overlay) = built?;

        let layout = GameLayout::new(installation).with_executable(&settings.executable);
        let executable = layout.executable_under(&virtual_dir);
        if !executable.is_file() {
            return Err(Error::ExecutableNotFound(executable));
        }

        let (program, args) = match &settings.wrapper {
            Some(wrapper) => {
                let mut args = vec![executable.to_string_lossy().into_owned()];
                args.extend(settings.args.iter().cloned());
                (PathBuf::from(wrapper), args)
            }
            None => (executable.clone(), settings.args.clone()),
        };

        tracing::info!("Launching {}", program.display());
        let spawned = self
            .launcher
            .spawn_detached(&program, &args, &virtual_dir)
            .map_err(Error::ProcessSpawn)?;
        let pid = spawned.pid;
        let launched_at = Utc::now();

        self.status.send_replace(GameStatus::Running { pid, launched_at });
        if let Err(e) = (GameRecord { pid, launched_at }).save(&state_dir) {
            tracing::warn!("Failed to record the running game: {}", e);
        }
        tracing::info!("Game started (pid {})", pid);

        let status = self.status.clone();
        let exited = spawned.exited;
        tokio::spawn(async move {
            let code = exited.await.ok().flatten();
            tracing::info!("Game exited (pid {}, code {:?})", pid, code);
            GameRecord::clear(&state_dir, pid);
            status.send_if_modified(|current| match current {
                GameStatus::Running { pid: running, .. } if *running == pid => {
                    *current = GameStatus::Idle;
                    true
                }
                _ => false,
            });
        });

        Ok(LaunchOutcome {
            virtual_path: virtual_dir,
            pid,
            mirror,
            overlay,
        })
    }

    /// Delete the virtual environment. Returns false if there was none.
    pub async fn clean_virtual_environment(&self) -> Result<bool> {
        let virtual_dir = self.settings().virtual_dir;
        let build = self.begin_build(&session::state_dir(&virtual_dir))?;

        let target = virtual_dir.clone();
        let existed = tokio::task::spawn_blocking(move || -> std::io::Result<bool> {
            let _build = build;
            let existed = std::fs::symlink_metadata(&target).is_ok();
            remove_tree(&target)?;
            Ok(existed)
        })
        .await??;

        if existed {
            tracing::info!("Removed virtual environment {}", virtual_dir.display());
        }
        Ok(existed)
    }
}

/// Mirror the installation and overlay the mods on top
fn build_environment(
    installation: &Path,
    virtual_dir: &Path,
    mods_dir: &Path,
    method: MirrorMethod,
    order: &[String],
) -> Result<(MirrorStats, OverlayReport)> {
    let mirror = MirrorBuilder::new(method).build_mirror(installation, virtual_dir)?;
    let overlay = OverlayEngine::new(mods_dir).apply_overlay(order, virtual_dir)?;
    Ok((mirror, overlay))
}
