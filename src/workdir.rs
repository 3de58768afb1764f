/*!
 * Working directory for node repositories
 */

use crate::error::{DealerError, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

const TEMP_PREFIX: &str = "deal-maker";

/// Directory holding every repo the session creates
///
/// A temporary workdir is removed when dropped; a provided one is left in place.
#[derive(Debug)]
pub enum Workdir {
    Provided(PathBuf),
    Temporary(TempDir),
}

impl Workdir {
    /// Use `requested` if given (created when missing, must be empty otherwise),
    /// or a fresh temporary directory
    pub fn prepare(requested: Option<&Path>) -> Result<Self> {
        match requested {
            Some(path) => {
                if !path.exists() {
                    std::fs::create_dir_all(path)?;
                } else if !is_empty(path)? {
                    return Err(DealerError::WorkdirNotEmpty(path.to_path_buf()));
                }
                info!(workdir = %path.display(), "Using provided workdir");
                Ok(Workdir::Provided(path.to_path_buf()))
            }
            None => {
                let dir = tempfile::Builder::new().prefix(TEMP_PREFIX).tempdir()?;
                info!(workdir = %dir.path().display(), "Created temporary workdir");
                Ok(Workdir::Temporary(dir))
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Workdir::Provided(path) => path,
            Workdir::Temporary(dir) => dir.path(),
        }
    }
}

/// True when `path` is a directory with no entries
pub fn is_empty(path: &Path) -> Result<bool> {
    let mut entries = std::fs::read_dir(path)?;
    Ok(entries.next().is_none())
}
