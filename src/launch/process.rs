//! Detached process spawning with exit notification

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use tokio::sync::oneshot;

/// A started process and a channel that fires with its exit code
#[derive(Debug)]
pub struct SpawnedProcess {
    pub pid: u32,
    /// Resolves when the process exits. `None` when no exit code is available
    /// (killed by a signal, or waiting failed).
    pub exited: oneshot::Receiver<Option<i32>>,
}

/// Starts the game process
#[cfg_attr(test, mockall::automock)]
pub trait ProcessLauncher: Send + Sync {
    /// Start `program` detached from this process with `working_dir` as its
    /// current directory.
    fn spawn_detached(
        &self,
        program: &Path,
        args: &[String],
        working_dir: &Path,
    ) -> io::Result<SpawnedProcess>;
}

/// Spawns real OS processes.
///
/// Exit is awaited on a plain thread so a host that shuts its runtime down
/// does not wait for the game to close.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn spawn_detached(
        &self,
        program: &Path,
        args: &[String],
        working_dir: &Path,
    ) -> io::Result<SpawnedProcess> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        configure_platform_spawn(&mut cmd);

        tracing::debug!("Command: {:?}", cmd);
        let mut child = cmd.spawn()?;
        let pid = child.id();

        let (tx, rx) = oneshot::channel();
        let waiter = std::thread::Builder::new().name(format!("wait-{}", pid));
        waiter.spawn(move || {
            let code = match child.wait() {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::warn!("Failed to wait for pid {}: {}", pid, e);
                    None
                }
            };
            let _ = tx.send(code);
        })?;

        Ok(SpawnedProcess { pid, exited: rx })
    }
}

/// Detach the child so it outlives us and does not share our console or signals.
fn configure_platform_spawn(cmd: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_exit_code() {
        let tmp = tempfile::tempdir().unwrap();
        let spawned = SystemLauncher
            .spawn_detached(
                Path::new("/bin/sh"),
                &["-c".to_string(), "exit 3".to_string()],
                tmp.path(),
            )
            .unwrap();
        assert!(spawned.pid > 0);
        assert_eq!(spawned.exited.await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let tmp = tempfile::tempdir().unwrap();
        let err = SystemLauncher
            .spawn_detached(&tmp.path().join("nope.exe"), &[], tmp.path())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
