use std::fmt;
use std::path::PathBuf;

/// The snapshot could not be written. The previous file on disk is left untouched.
#[derive(Debug, Clone)]
pub struct PersistenceError {
    pub path: PathBuf,
    pub stage: &'static str,
    pub detail: String,
}

impl PersistenceError {
    pub(crate) fn new(path: &std::path::Path, stage: &'static str, err: impl fmt::Display) -> Self {
        Self {
            path: path.to_path_buf(),
            stage,
            detail: err.to_string(),
        }
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "snapshot write failed (path={}, stage={}): {}",
            self.path.display(),
            self.stage,
            self.detail
        )
    }
}

impl std::error::Error for PersistenceError {}
