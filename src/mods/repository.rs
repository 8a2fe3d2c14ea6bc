//! On-disk mod enumeration merged with sidecar metadata

use super::metadata::{ModMetadata, ModMetadataPatch, BUILTIN_CATEGORIES};
use super::{validate_mod_id, ModPackage};
use crate::error::{Error, Result};
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Read and write access to the imported mods directory
#[derive(Debug, Clone)]
pub struct ModRepository {
    mods_dir: PathBuf,
}

impl ModRepository {
    pub fn new(mods_dir: impl Into<PathBuf>) -> Self {
        Self {
            mods_dir: mods_dir.into(),
        }
    }

    pub fn mods_dir(&self) -> &Path {
        &self.mods_dir
    }

    /// Directory of a mod, after checking that the id is a plain name
    pub fn mod_path(&self, id: &str) -> Result<PathBuf> {
        validate_mod_id(id)?;
        Ok(self.mods_dir.join(id))
    }

    /// List all mods.
    ///
    /// Sorted by the informational `loadOrder` field, then import date, then id.
    /// This is display order only; launch precedence comes from the load order
    /// configuration.
    pub fn list(&self) -> Result<Vec<ModPackage>> {
        let entries = match std::fs::read_dir(&self.mods_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut mods = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!("Skipping mod directory with non UTF-8 name: {:?}", entry.file_name());
                continue;
            };
            let path = entry.path();
            let metadata = ModMetadata::read(&path, &id);
            mods.push(ModPackage { id, path, metadata });
        }

        mods.sort_by(|a, b| {
            a.metadata
                .load_order
                .cmp(&b.metadata.load_order)
                .then(a.metadata.import_date.cmp(&b.metadata.import_date))
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(mods)
    }

    /// Get a single mod
    pub fn get(&self, id: &str) -> Result<ModPackage> {
        let path = self.mod_path(id)?;
        if !path.is_dir() {
            return Err(Error::ModNotFound(id.to_string()));
        }
        let metadata = ModMetadata::read(&path, id);
        Ok(ModPackage {
            id: id.to_string(),
            path,
            metadata,
        })
    }

    /// Merge `patch` into a mod's sidecar and stamp `lastModified`
    pub fn update(&self, id: &str, patch: ModMetadataPatch) -> Result<ModPackage> {
        let mut package = self.get(id)?;
        package.metadata.apply(patch);
        package.metadata.last_modified = Utc::now();
        package.metadata.write(&package.path)?;
        tracing::info!("Updated metadata for \"{}\"", id);
        Ok(package)
    }

    /// Remove a mod directory.
    ///
    /// The load order configuration is not touched; callers purge references.
    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.mod_path(id)?;
        if !path.is_dir() {
            return Err(Error::ModNotFound(id.to_string()));
        }
        std::fs::remove_dir_all(&path)?;
        tracing::info!("Deleted mod \"{}\"", id);
        Ok(())
    }

    /// Built-in plus in-use categories, and every tag in use, both sorted
    pub fn categories_and_tags(&self) -> Result<(Vec<String>, Vec<String>)> {
        let mut categories: BTreeSet<String> =
            BUILTIN_CATEGORIES.iter().map(|c| c.to_string()).collect();
        let mut tags = BTreeSet::new();

        for package in self.list()? {
            categories.insert(package.metadata.category);
            tags.extend(package.metadata.tags);
        }

        Ok((categories.into_iter().collect(), tags.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mods::archive::tests::write_zip;
    use crate::mods::ArchiveImporter;
    use chrono::TimeZone;

    fn seed(mods_dir: &Path, id: &str, load_order: i64, imported_secs: i64) {
        let dir = mods_dir.join(id);
        std::fs::create_dir_all(dir.join("r6/scripts")).unwrap();
        let mut meta = ModMetadata::defaults_for(id);
        meta.load_order = load_order;
        meta.import_date = Utc.timestamp_opt(imported_secs, 0).unwrap();
        meta.write(&dir).unwrap();
    }

    #[test]
    fn missing_mods_dir_lists_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = ModRepository::new(tmp.path().join("absent"));
        assert!(repo.list().unwrap().is_empty());
    }

    #[test]
    fn list_orders_by_load_order_then_import_date() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path(), "late", 0, 200);
        seed(tmp.path(), "early", 0, 100);
        seed(tmp.path(), "last", 5, 0);
        std::fs::create_dir_all(tmp.path().join("bare")).unwrap();
        std::fs::write(tmp.path().join("stray.txt"), b"").unwrap();

        let ids: Vec<_> = ModRepository::new(tmp.path())
            .list()
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["bare", "early", "late", "last"]);
    }

    #[test]
    fn import_then_list_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let mods = tmp.path().join("mods");
        let zip = write_zip(tmp.path(), "foo.zip", &[("foo.archive", b"x")]);
        ArchiveImporter::new(&mods).import_blocking(&zip).unwrap();

        let listed = ModRepository::new(&mods).list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "foo");
        assert_eq!(listed[0].metadata.display_name, "foo");
    }

    #[test]
    fn update_merges_and_stamps() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path(), "m", 0, 0);
        let repo = ModRepository::new(tmp.path());
        let before = repo.get("m").unwrap().metadata;

        let updated = repo
            .update(
                "m",
                ModMetadataPatch {
                    author: Some("Alt".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.metadata.author, "Alt");
        assert_eq!(updated.metadata.display_name, before.display_name);
        assert!(updated.metadata.last_modified > before.last_modified);
        assert_eq!(repo.get("m").unwrap().metadata.author, "Alt");
    }

    #[test]
    fn delete_and_invalid_ids() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path(), "gone", 0, 0);
        let repo = ModRepository::new(tmp.path());

        repo.delete("gone").unwrap();
        assert!(!tmp.path().join("gone").exists());
        assert!(matches!(repo.delete("gone"), Err(Error::ModNotFound(_))));
        assert!(matches!(repo.get("../etc"), Err(Error::InvalidModId(_))));
    }

    #[test]
    fn categories_include_builtins_and_custom() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path(), "a", 0, 0);
        let repo = ModRepository::new(tmp.path());
        repo.update(
            "a",
            ModMetadataPatch {
                category: Some("Weapons".into()),
                tags: Some(["guns".to_string(), "ammo".to_string()].into()),
                ..Default::default()
            },
        )
        .unwrap();

        let (categories, tags) = repo.categories_and_tags().unwrap();
        assert!(categories.contains(&"Weapons".to_string()));
        assert!(categories.contains(&"Adult".to_string()));
        assert_eq!(categories.len(), BUILTIN_CATEGORIES.len() + 1);
        assert_eq!(tags, vec!["ammo", "guns"]);
    }
}
