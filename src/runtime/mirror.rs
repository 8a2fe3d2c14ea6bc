//! Link-based shadow copy of the game installation

use super::walk::{relative_key, tree_entries};
use crate::config::MirrorMethod;
use crate::error::{Error, Result};
use serde::Serialize;
use std::io;
use std::path::Path;

/// One way of reproducing a source file at a target path
pub trait MirrorStrategy: Send + Sync {
    fn kind(&self) -> MirrorMethod;

    fn place(&self, source: &Path, target: &Path) -> io::Result<()>;
}

pub struct SymlinkStrategy;

impl MirrorStrategy for SymlinkStrategy {
    fn kind(&self) -> MirrorMethod {
        MirrorMethod::Symlink
    }

    #[cfg(unix)]
    fn place(&self, source: &Path, target: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(source, target)
    }

    #[cfg(windows)]
    fn place(&self, source: &Path, target: &Path) -> io::Result<()> {
        std::os::windows::fs::symlink_file(source, target)
    }

    #[cfg(not(any(unix, windows)))]
    fn place(&self, _source: &Path, _target: &Path) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }
}

pub struct HardLinkStrategy;

impl MirrorStrategy for HardLinkStrategy {
    fn kind(&self) -> MirrorMethod {
        MirrorMethod::Hardlink
    }

    fn place(&self, source: &Path, target: &Path) -> io::Result<()> {
        std::fs::hard_link(source, target)
    }
}

pub struct CopyStrategy;

impl MirrorStrategy for CopyStrategy {
    fn kind(&self) -> MirrorMethod {
        MirrorMethod::Copy
    }

    fn place(&self, source: &Path, target: &Path) -> io::Result<()> {
        std::fs::copy(source, target).map(|_| ())
    }
}

/// Strategies for `method` and everything it falls back to, in order
pub fn strategies_for(method: MirrorMethod) -> Vec<Box<dyn MirrorStrategy>> {
    method
        .fallback_chain()
        .iter()
        .map(|m| -> Box<dyn MirrorStrategy> {
            match m {
                MirrorMethod::Symlink => Box::new(SymlinkStrategy),
                MirrorMethod::Hardlink => Box::new(HardLinkStrategy),
                MirrorMethod::Copy => Box::new(CopyStrategy),
            }
        })
        .collect()
}

/// A file that needed a later strategy than the first one
#[derive(Debug, Clone, Serialize)]
pub struct MirrorFallback {
    pub path: String,
    pub used: MirrorMethod,
    /// Errors from the strategies that were tried first
    pub errors: Vec<String>,
}

/// Mirror statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct MirrorStats {
    pub symlinks: usize,
    pub hard_links: usize,
    pub copies: usize,
    pub dirs_created: usize,
    pub fallbacks: Vec<MirrorFallback>,
    pub failures: Vec<String>,
}

impl MirrorStats {
    /// Files reproduced by any strategy
    pub fn linked(&self) -> usize {
        self.symlinks + self.hard_links + self.copies
    }

    /// True when any file fell back or could not be mirrored
    pub fn is_degraded(&self) -> bool {
        !self.fallbacks.is_empty() || !self.failures.is_empty()
    }

    fn record(&mut self, method: MirrorMethod) {
        match method {
            MirrorMethod::Symlink => self.symlinks += 1,
            MirrorMethod::Hardlink => self.hard_links += 1,
            MirrorMethod::Copy => self.copies += 1,
        }
    }
}

/// Builds the virtual game directory skeleton
pub struct MirrorBuilder {
    strategies: Vec<Box<dyn MirrorStrategy>>,
}

impl MirrorBuilder {
    pub fn new(method: MirrorMethod) -> Self {
        Self::with_strategies(strategies_for(method))
    }

    pub fn with_strategies(strategies: Vec<Box<dyn MirrorStrategy>>) -> Self {
        Self { strategies }
    }

    /// Replace `target` with a mirror of `source`.
    ///
    /// The target is deleted first. Every source directory becomes a real
    /// directory (directory symlinks are followed) and every file is placed by
    /// the first strategy that succeeds. A file that no strategy can place is
    /// recorded in [`MirrorStats::failures`] and the walk continues.
    pub fn build_mirror(&self, source: &Path, target: &Path) -> Result<MirrorStats> {
        if !source.is_dir() {
            return Err(Error::MirrorSourceMissing(source.to_path_buf()));
        }
        let source = source.canonicalize()?;

        remove_tree(target)?;
        std::fs::create_dir_all(target)?;

        tracing::info!(
            "Mirroring {} -> {}",
            source.display(),
            target.display()
        );

        let mut stats = MirrorStats::default();

        for entry in tree_entries(&source) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Mirror walk error: {}", e);
                    stats.failures.push(e.to_string());
                    continue;
                }
            };
            let Ok(relative) = entry.path().strip_prefix(&source) else {
                continue;
            };
            let dest = target.join(relative);

            if entry.file_type().is_dir() {
                match std::fs::create_dir_all(&dest) {
                    Ok(()) => stats.dirs_created += 1,
                    Err(e) => stats
                        .failures
                        .push(format!("{}: {}", relative_key(relative), e)),
                }
                continue;
            }

            self.place_file(entry.path(), &dest, &relative_key(relative), &mut stats);
        }

        tracing::info!(
            "Mirror complete: {} symlinks, {} hard links, {} copies, {} dirs ({} fallbacks, {} failures)",
            stats.symlinks,
            stats.hard_links,
            stats.copies,
            stats.dirs_created,
            stats.fallbacks.len(),
            stats.failures.len()
        );

        Ok(stats)
    }

    fn place_file(&self, source: &Path, dest: &Path, key: &str, stats: &mut MirrorStats) {
        let mut errors = Vec::new();

        for (idx, strategy) in self.strategies.iter().enumerate() {
            match strategy.place(source, dest) {
                Ok(()) => {
                    stats.record(strategy.kind());
                    if idx > 0 {
                        tracing::debug!("{} mirrored via {}", key, strategy.kind().as_str());
                        stats.fallbacks.push(MirrorFallback {
                            path: key.to_string(),
                            used: strategy.kind(),
                            errors,
                        });
                    }
                    return;
                }
                Err(e) => {
                    errors.push(format!("{}: {}", strategy.kind().as_str(), e));
                    // a half-created entry would block the next strategy
                    if std::fs::symlink_metadata(dest).is_ok() {
                        let _ = std::fs::remove_file(dest);
                    }
                }
            }
        }

        tracing::warn!("Failed to mirror {}: {}", key, errors.join("; "));
        stats.failures.push(format!("{}: {}", key, errors.join("; ")));
    }
}

/// Delete `path` whatever it is, without following links
pub fn remove_tree(path: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::PathBuf;
    use walkdir::WalkDir;

    /// Refuses to place one named file, delegating the rest
    struct Refuse<S> {
        inner: S,
        name: &'static str,
    }

    impl<S: MirrorStrategy> MirrorStrategy for Refuse<S> {
        fn kind(&self) -> MirrorMethod {
            self.inner.kind()
        }

        fn place(&self, source: &Path, target: &Path) -> io::Result<()> {
            if source.file_name().is_some_and(|n| n == self.name) {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            self.inner.place(source, target)
        }
    }

    fn refuse<S: MirrorStrategy + 'static>(inner: S, name: &'static str) -> Box<dyn MirrorStrategy> {
        Box::new(Refuse { inner, name })
    }

    fn install_fixture(root: &Path) {
        fs::create_dir_all(root.join("bin/x64")).unwrap();
        fs::create_dir_all(root.join("archive/pc/content")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("bin/x64/Cyberpunk2077.exe"), b"MZ").unwrap();
        fs::write(root.join("archive/pc/content/basegame.archive"), b"base").unwrap();
        fs::write(root.join("archive/pc/content/locked.bin"), b"locked").unwrap();
    }

    fn relative_paths(root: &Path) -> BTreeSet<PathBuf> {
        WalkDir::new(root)
            .min_depth(1)
            .follow_links(true)
            .into_iter()
            .map(|e| e.unwrap().path().strip_prefix(root).unwrap().to_path_buf())
            .collect()
    }

    #[test]
    fn missing_source_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = MirrorBuilder::new(MirrorMethod::Symlink)
            .build_mirror(&tmp.path().join("nope"), &tmp.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, Error::MirrorSourceMissing(_)));
    }

    #[test]
    fn mirror_replicates_structure_and_clears_target() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("game");
        let target = tmp.path().join("virtual");
        install_fixture(&source);
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("stale.txt"), b"old").unwrap();

        let stats = MirrorBuilder::new(MirrorMethod::Symlink)
            .build_mirror(&source, &target)
            .unwrap();

        assert_eq!(relative_paths(&source), relative_paths(&target));
        assert!(!target.join("stale.txt").exists());
        assert_eq!(stats.linked(), 3);
        assert_eq!(stats.dirs_created, 6);
        assert!(stats.failures.is_empty());
        assert_eq!(
            fs::read(target.join("archive/pc/content/basegame.archive")).unwrap(),
            b"base"
        );
    }

    #[test]
    fn refused_links_fall_back_to_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("game");
        let target = tmp.path().join("virtual");
        install_fixture(&source);

        let builder = MirrorBuilder::with_strategies(vec![
            refuse(SymlinkStrategy, "locked.bin"),
            refuse(HardLinkStrategy, "locked.bin"),
            Box::new(CopyStrategy) as Box<dyn MirrorStrategy>,
        ]);
        let stats = builder.build_mirror(&source, &target).unwrap();

        assert_eq!(stats.symlinks, 2);
        assert_eq!(stats.copies, 1);
        assert!(stats.failures.is_empty());
        assert!(stats.is_degraded());
        assert_eq!(stats.fallbacks.len(), 1);
        assert_eq!(stats.fallbacks[0].path, "archive/pc/content/locked.bin");
        assert_eq!(stats.fallbacks[0].used, MirrorMethod::Copy);
        assert_eq!(stats.fallbacks[0].errors.len(), 2);

        let copied = target.join("archive/pc/content/locked.bin");
        assert!(!fs::symlink_metadata(&copied).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(copied).unwrap(), b"locked");
    }

    #[test]
    fn unplaceable_file_does_not_abort_the_walk() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("game");
        let target = tmp.path().join("virtual");
        install_fixture(&source);

        let builder = MirrorBuilder::with_strategies(vec![refuse(CopyStrategy, "basegame.archive")]);
        let stats = builder.build_mirror(&source, &target).unwrap();

        assert_eq!(stats.copies, 2);
        assert_eq!(stats.failures.len(), 1);
        assert!(target.join("bin/x64/Cyberpunk2077.exe").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_become_real_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("game");
        let elsewhere = tmp.path().join("dlc");
        install_fixture(&source);
        fs::create_dir_all(&elsewhere).unwrap();
        fs::write(elsewhere.join("ep1.archive"), b"ep1").unwrap();
        std::os::unix::fs::symlink(&elsewhere, source.join("archive/pc/ep1")).unwrap();

        let target = tmp.path().join("virtual");
        MirrorBuilder::new(MirrorMethod::Symlink)
            .build_mirror(&source, &target)
            .unwrap();

        let dir_meta = fs::symlink_metadata(target.join("archive/pc/ep1")).unwrap();
        assert!(dir_meta.is_dir());
        assert_eq!(fs::read(target.join("archive/pc/ep1/ep1.archive")).unwrap(), b"ep1");
    }
}
