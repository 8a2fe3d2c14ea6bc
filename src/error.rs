//! Error types for the mod loader core.
//!
//! Every fallible library function returns [`Result<T>`]. Conditions that are
//! reported rather than raised (mirror fallbacks, mods missing from disk during
//! overlay) live in the stats types of [`crate::runtime`] instead.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by importing, listing, building and launching.
#[derive(Error, Debug)]
pub enum Error {
    /// The archive handed to the importer does not exist.
    #[error("Archive not found: {}", .0.display())]
    ArchiveNotFound(PathBuf),

    /// A mod directory with the archive's derived id is already present.
    #[error("Mod \"{0}\" already exists")]
    ModAlreadyExists(String),

    /// The archive could not be opened or one of its entries could not be read.
    #[error("Failed to extract {}: {reason}", archive.display())]
    ExtractionFailed { archive: PathBuf, reason: String },

    /// Nothing recognizable as mod content survived normalization.
    #[error(
        "Invalid mod structure for \"{0}\". Mod must contain archive/, r6/, redscript/, engine/, bin/ or red4ext/ content"
    )]
    InvalidStructure(String),

    #[error("Mod \"{0}\" not found")]
    ModNotFound(String),

    /// Mod ids are directory names and must be a single path component.
    #[error("Invalid mod id \"{0}\"")]
    InvalidModId(String),

    /// The installation directory to mirror is missing.
    #[error("Game installation not found: {}", .0.display())]
    MirrorSourceMissing(PathBuf),

    /// The game executable is not present inside the virtual environment.
    #[error("Game executable not found in virtual environment: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    #[error("Failed to start game process: {0}")]
    ProcessSpawn(#[source] std::io::Error),

    /// Another build of the virtual environment is still running.
    #[error("A launch is already in progress")]
    LaunchInProgress,

    /// The game is still running from the virtual environment.
    #[error("Game is already running (pid {0})")]
    GameRunning(u32),

    #[error("Profile \"{0}\" not found")]
    ProfileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse config: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// A background build task panicked or was cancelled.
    #[error("Build task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
