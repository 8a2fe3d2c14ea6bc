//! Opening folders in the host file browser

use crate::error::{Error, Result};
use std::path::Path;

/// Show `path` in the system file browser
pub fn reveal(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }
    tracing::debug!("Opening {}", path.display());
    open::that(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_not_opened() {
        let tmp = tempfile::tempdir().unwrap();
        let err = reveal(&tmp.path().join("absent")).unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound));
    }
}
