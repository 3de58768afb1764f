/*!
 * Locating the `go-filecoin` binary
 *
 * Resolution order: an explicit path, the binary built inside the GOPATH
 * source checkout, then the first match on `PATH`.
 */

use crate::error::{DealerError, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const BINARY_NAME: &str = "go-filecoin";

/// Location of the binary inside a GOPATH source checkout
const GOPATH_CHECKOUT: &str = "src/github.com/filecoin-project/go-filecoin/go-filecoin";

/// Resolve the node binary
///
/// An explicit path is taken as given and only checked for existence.
pub fn resolve(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path);
        }
        return Err(DealerError::BinaryNotFound {
            searched: vec![path],
        });
    }

    let mut searched = Vec::new();

    if let Some(gopath) = gopath() {
        let candidate = gopath.join(GOPATH_CHECKOUT);
        debug!(path = %candidate.display(), "Checking GOPATH build");
        if candidate.is_file() {
            return Ok(candidate);
        }
        searched.push(candidate);
    }

    if let Some(path_var) = std::env::var_os("PATH") {
        if let Some(found) = find_in_path(BINARY_NAME, &path_var) {
            return Ok(found);
        }
    }
    searched.push(PathBuf::from(format!("$PATH/{}", BINARY_NAME)));

    Err(DealerError::BinaryNotFound { searched })
}

/// `$GOPATH`, or `~/go` when unset
fn gopath() -> Option<PathBuf> {
    match std::env::var_os("GOPATH") {
        Some(gp) if !gp.is_empty() => Some(PathBuf::from(gp)),
        _ => dirs::home_dir().map(|home| home.join("go")),
    }
}

/// First executable file called `name` in a `PATH`-style list
pub fn find_in_path(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
