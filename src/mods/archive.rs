//! Archive import: extraction through the placement rules plus structure validation

use super::layout::{self, LayoutAssessment};
use super::metadata::ModMetadata;
use super::{validate_mod_id, ModPackage};
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Progress callback for extraction
/// Parameters: (current_file, processed_count, total_count)
pub type ProgressCallback = Arc<dyn Fn(String, usize, usize) + Send + Sync>;

/// Removes a partially imported mod directory unless disarmed.
struct PartialModGuard {
    path: PathBuf,
    armed: bool,
}

impl PartialModGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialModGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            tracing::warn!(
                "Failed to remove partial mod directory {}: {}",
                self.path.display(),
                e
            );
        } else {
            tracing::debug!("Rolled back partial import at {}", self.path.display());
        }
    }
}

/// Imports zip archives into the mods directory
#[derive(Clone)]
pub struct ArchiveImporter {
    mods_dir: PathBuf,
    progress: Option<ProgressCallback>,
}

impl ArchiveImporter {
    pub fn new(mods_dir: impl Into<PathBuf>) -> Self {
        Self {
            mods_dir: mods_dir.into(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Import an archive as a new mod.
    ///
    /// The mod id is the archive's file stem. Nothing is left on disk when the
    /// import fails, and an existing mod with the same id is never touched.
    pub async fn import_archive(&self, archive: &Path) -> Result<ModPackage> {
        let importer = self.clone();
        let archive = archive.to_path_buf();
        tokio::task::spawn_blocking(move || importer.import_blocking(&archive)).await?
    }

    /// Synchronous body of [`Self::import_archive`]
    pub fn import_blocking(&self, archive: &Path) -> Result<ModPackage> {
        if !archive.is_file() {
            return Err(Error::ArchiveNotFound(archive.to_path_buf()));
        }

        let id = archive
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidModId(archive.display().to_string()))?;
        validate_mod_id(&id)?;

        let mod_dir = self.mods_dir.join(&id);
        if mod_dir.exists() {
            return Err(Error::ModAlreadyExists(id));
        }

        std::fs::create_dir_all(&self.mods_dir)?;
        std::fs::create_dir(&mod_dir)?;
        let guard = PartialModGuard::new(mod_dir.clone());

        tracing::info!("Importing {} as \"{}\"", archive.display(), id);
        let extracted = self.extract_normalized(archive, &mod_dir)?;

        let assessment = layout::validate(&mod_dir)?;
        if assessment == LayoutAssessment::Invalid {
            tracing::warn!("Rejected \"{}\": no recognizable mod content", id);
            return Err(Error::InvalidStructure(id));
        }

        let metadata = ModMetadata::new_import(&id);
        metadata.write(&mod_dir)?;
        guard.disarm();

        tracing::info!("Imported \"{}\" ({} files, {:?})", id, extracted, assessment);

        Ok(ModPackage {
            id,
            path: mod_dir,
            metadata,
        })
    }

    /// Extract every file entry of a zip into `dest`, routed through the placement rules.
    fn extract_normalized(&self, archive: &Path, dest: &Path) -> Result<usize> {
        let failed = |reason: String| Error::ExtractionFailed {
            archive: archive.to_path_buf(),
            reason,
        };

        let file = std::fs::File::open(archive).map_err(|e| failed(e.to_string()))?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| failed(e.to_string()))?;

        let total = zip.len();
        let mut destinations = HashSet::new();
        let mut extracted = 0;

        for i in 0..total {
            let mut entry = zip.by_index(i).map_err(|e| failed(e.to_string()))?;
            let entry_name = entry.name().to_string();

            if let Some(ref cb) = self.progress {
                cb(entry_name.clone(), i + 1, total);
            }

            if entry.is_dir() {
                continue;
            }

            let Some(placement) = layout::place_entry(&entry_name) else {
                tracing::warn!("Skipping archive entry with empty path: {:?}", entry_name);
                continue;
            };

            if !destinations.insert(placement.destination.clone()) {
                tracing::warn!(
                    "{} overwrites an earlier entry at {}",
                    entry_name,
                    placement.destination
                );
            }
            tracing::debug!(
                "{} -> {} ({:?})",
                entry_name,
                placement.destination,
                placement.rule
            );

            let outpath = dest.join(&placement.destination);
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut outfile = std::fs::File::create(&outpath)?;
            std::io::copy(&mut entry, &mut outfile)
                .map_err(|e| failed(format!("{}: {}", entry_name, e)))?;
            extracted += 1;
        }

        Ok(extracted)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mods::metadata::SIDECAR_FILE;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use zip::write::SimpleFileOptions;

    /// Write a zip at `dir/<name>` containing `entries` (a trailing `/` makes a directory entry)
    pub(crate) fn write_zip(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join(name);
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (entry, content) in entries {
            if entry.ends_with('/') {
                zip.add_directory(*entry, options).unwrap();
            } else {
                zip.start_file(*entry, options).unwrap();
                zip.write_all(content).unwrap();
            }
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn loose_archive_lands_in_archive_pc_mod() {
        let tmp = tempfile::tempdir().unwrap();
        let zip = write_zip(tmp.path(), "foo.zip", &[("foo.archive", b"packed")]);
        let importer = ArchiveImporter::new(tmp.path().join("mods"));

        let package = importer.import_blocking(&zip).unwrap();
        assert_eq!(package.id, "foo");
        let placed = package.path.join("archive/pc/mod/foo.archive");
        assert_eq!(std::fs::read(placed).unwrap(), b"packed");
        assert!(package.path.join(SIDECAR_FILE).is_file());
        assert_eq!(package.metadata.display_name, "foo");
    }

    #[test]
    fn known_plugin_dll_lands_in_red4ext_plugins() {
        let tmp = tempfile::tempdir().unwrap();
        let zip = write_zip(
            tmp.path(),
            "codeware.zip",
            &[("docs/", b""), ("Codeware.dll", b"MZ")],
        );
        let importer = ArchiveImporter::new(tmp.path().join("mods"));

        let package = importer.import_blocking(&zip).unwrap();
        assert!(package
            .path
            .join("red4ext/plugins/Codeware/Codeware.dll")
            .is_file());
        assert!(!package.path.join("docs").exists());
    }

    #[test]
    fn existing_mod_is_left_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let mods = tmp.path().join("mods");
        std::fs::create_dir_all(mods.join("foo")).unwrap();
        std::fs::write(mods.join("foo/keep.txt"), b"original").unwrap();
        let zip = write_zip(tmp.path(), "foo.zip", &[("foo.archive", b"new")]);

        let err = ArchiveImporter::new(&mods).import_blocking(&zip).unwrap_err();
        assert!(matches!(err, Error::ModAlreadyExists(ref id) if id == "foo"));
        assert_eq!(std::fs::read(mods.join("foo/keep.txt")).unwrap(), b"original");
        assert!(!mods.join("foo/archive").exists());
    }

    #[test]
    fn invalid_structure_rolls_back() {
        let tmp = tempfile::tempdir().unwrap();
        let zip = write_zip(tmp.path(), "junk.zip", &[("readme.txt", b"hello")]);
        let mods = tmp.path().join("mods");

        let err = ArchiveImporter::new(&mods).import_blocking(&zip).unwrap_err();
        assert!(matches!(err, Error::InvalidStructure(_)));
        assert!(!mods.join("junk").exists());
    }

    #[test]
    fn corrupt_archive_rolls_back() {
        let tmp = tempfile::tempdir().unwrap();
        let bogus = tmp.path().join("broken.zip");
        std::fs::write(&bogus, b"this is not a zip").unwrap();
        let mods = tmp.path().join("mods");

        let err = ArchiveImporter::new(&mods).import_blocking(&bogus).unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed { .. }));
        assert!(!mods.join("broken").exists());
    }

    #[test]
    fn missing_archive_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ArchiveImporter::new(tmp.path())
            .import_blocking(&tmp.path().join("nope.zip"))
            .unwrap_err();
        assert!(matches!(err, Error::ArchiveNotFound(_)));
    }

    #[test]
    fn traversal_entries_stay_inside_mod_root() {
        let tmp = tempfile::tempdir().unwrap();
        let zip = write_zip(
            tmp.path(),
            "sneaky.zip",
            &[("../../escape.reds", b"x"), ("..\\r6\\tweaks\\a.yaml", b"y")],
        );
        let mods = tmp.path().join("mods");

        let package = ArchiveImporter::new(&mods).import_blocking(&zip).unwrap();
        assert!(package.path.join("r6/scripts/escape.reds").is_file());
        assert!(package.path.join("r6/tweaks/a.yaml").is_file());
        assert!(!tmp.path().join("escape.reds").exists());
    }

    #[tokio::test]
    async fn reports_progress_per_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let zip = write_zip(
            tmp.path(),
            "multi.zip",
            &[("a.reds", b"1"), ("b.reds", b"2"), ("c.lua", b"3")],
        );
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let importer = ArchiveImporter::new(tmp.path().join("mods")).with_progress(Arc::new(
            move |_, processed, total| {
                assert_eq!(total, 3);
                counter.store(processed, Ordering::SeqCst);
            },
        ));

        importer.import_archive(&zip).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
