//! Mod management - import, metadata, and conflict analysis

pub(crate) mod archive;
mod conflicts;
pub mod layout;
pub mod metadata;
mod repository;

pub use archive::*;
pub use conflicts::*;
pub use metadata::{ModMetadata, ModMetadataPatch, SIDECAR_FILE};
pub use repository::ModRepository;

use crate::error::{Error, Result};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

/// An imported mod.
///
/// The id is the mod's directory name under the mods directory and is unique.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModPackage {
    pub id: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub metadata: ModMetadata,
}

/// Mod ids double as directory names: exactly one normal path component.
pub fn validate_mod_id(id: &str) -> Result<()> {
    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !id.contains(&['/', '\\'][..]) => Ok(()),
        _ => Err(Error::InvalidModId(id.to_string())),
    }
}
