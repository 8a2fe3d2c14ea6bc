//! State shared between silverhand processes
//!
//! Every CLI command runs in its own process, so the in-memory build lock and
//! status cell only cover one invocation. Two files next to the virtual
//! environment carry the same facts across processes: an advisory lock held
//! for the duration of a build, and a record of the running game.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use sysinfo::{Pid, ProcessesToUpdate, System};

const BUILD_LOCK_FILE: &str = ".silverhand-build.lock";
const GAME_RECORD_FILE: &str = ".silverhand-game.json";

/// Directory holding the shared state for `virtual_dir`
pub fn state_dir(virtual_dir: &Path) -> PathBuf {
    virtual_dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(virtual_dir)
        .to_path_buf()
}

/// Exclusive advisory lock on the build lock file, released on drop
#[derive(Debug)]
pub struct BuildLock {
    _file: File,
}

impl BuildLock {
    /// Take the lock or fail with [`Error::LaunchInProgress`] if another
    /// process holds it
    pub fn acquire(state_dir: &Path) -> Result<Self> {
        fs::create_dir_all(state_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(state_dir.join(BUILD_LOCK_FILE))?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { _file: file }),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                tracing::debug!("Build lock in {} is held elsewhere", state_dir.display());
                Err(Error::LaunchInProgress)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// The game started from the virtual environment, as seen by other processes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub pid: u32,
    pub launched_at: DateTime<Utc>,
}

impl GameRecord {
    fn path(state_dir: &Path) -> PathBuf {
        state_dir.join(GAME_RECORD_FILE)
    }

    pub fn save(&self, state_dir: &Path) -> Result<()> {
        fs::create_dir_all(state_dir)?;
        fs::write(Self::path(state_dir), serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// The recorded game if its process is still alive.
    ///
    /// A record left by a game that has exited is deleted.
    pub fn load_live(state_dir: &Path) -> Option<Self> {
        let path = Self::path(state_dir);
        let data = fs::read(&path).ok()?;
        let record = match serde_json::from_slice::<GameRecord>(&data) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Ignoring unreadable game record {}: {}", path.display(), e);
                fs::remove_file(&path).ok();
                return None;
            }
        };
        if process_alive(record.pid) {
            Some(record)
        } else {
            tracing::debug!("Clearing stale game record (pid {})", record.pid);
            fs::remove_file(&path).ok();
            None
        }
    }

    /// Delete the record if it still names `pid`
    pub fn clear(state_dir: &Path, pid: u32) {
        let path = Self::path(state_dir);
        let current = fs::read(&path)
            .ok()
            .and_then(|data| serde_json::from_slice::<GameRecord>(&data).ok());
        if current.is_some_and(|record| record.pid == pid) {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!("Failed to remove game record {}: {}", path.display(), e);
            }
        }
    }
}

pub fn process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exited_pid() -> u32 {
        let mut child = std::process::Command::new(std::env::current_exe().unwrap())
            .arg("--list")
            .stdout(std::process::Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id();
        child.wait().unwrap();
        pid
    }

    #[test]
    fn second_build_lock_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let held = BuildLock::acquire(tmp.path()).unwrap();
        assert!(matches!(
            BuildLock::acquire(tmp.path()),
            Err(Error::LaunchInProgress)
        ));
        drop(held);
        BuildLock::acquire(tmp.path()).unwrap();
    }

    #[test]
    fn live_record_is_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let record = GameRecord {
            pid: std::process::id(),
            launched_at: Utc::now(),
        };
        record.save(tmp.path()).unwrap();
        assert_eq!(GameRecord::load_live(tmp.path()), Some(record));
    }

    #[test]
    fn dead_record_is_removed() {
        let tmp = tempfile::tempdir().unwrap();
        GameRecord {
            pid: exited_pid(),
            launched_at: Utc::now(),
        }
        .save(tmp.path())
        .unwrap();

        assert_eq!(GameRecord::load_live(tmp.path()), None);
        assert!(!tmp.path().join(GAME_RECORD_FILE).exists());
    }

    #[test]
    fn clear_leaves_other_pids_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let record = GameRecord {
            pid: std::process::id(),
            launched_at: Utc::now(),
        };
        record.save(tmp.path()).unwrap();
        GameRecord::clear(tmp.path(), record.pid + 1);
        assert!(tmp.path().join(GAME_RECORD_FILE).exists());
        GameRecord::clear(tmp.path(), record.pid);
        assert!(!tmp.path().join(GAME_RECORD_FILE).exists());
    }

    #[test]
    fn state_dir_is_parent_of_virtual_dir() {
        assert_eq!(
            state_dir(Path::new("/data/virtual_game")),
            PathBuf::from("/data")
        );
        assert_eq!(state_dir(Path::new("virtual_game")), PathBuf::from("virtual_game"));
    }
}
