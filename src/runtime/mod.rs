//! Virtual game directory: mirror of the installation plus mod overlay

pub mod mirror;
pub mod overlay;
pub mod walk;

pub use mirror::{remove_tree, MirrorBuilder, MirrorFallback, MirrorStats, MirrorStrategy};
pub use overlay::{ModOverlayStats, OverlayEngine, OverlayReport};
pub use walk::{payload_files, PayloadFile};
