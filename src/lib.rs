//! Silverhand - a non-destructive mod loader for Cyberpunk 2077
//!
//! Mods are imported into a private library and never touch the game
//! installation. On launch the installation is mirrored into a virtual game
//! directory (symlinks, hard links or copies), enabled mods are copied on top
//! in load order, and the game is started from there.

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod app;
pub mod config;
pub mod error;
pub mod games;
pub mod launch;
pub mod mods;
pub mod profiles;
pub mod runtime;
pub mod shell;

pub use app::App;
pub use config::Config;
pub use error::{Error, Result};
