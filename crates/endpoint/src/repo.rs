//! Repository-directory resolution.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use protocol::DaemonAddress;
use tracing::debug;

use crate::{parse_address, EndpointError};

/// Environment variable naming the repository directory.
pub const ENV_REPO_PATH: &str = "IPFS_PATH";

/// Repository directory used when [`ENV_REPO_PATH`] is unset.
pub const DEFAULT_REPO_PATH: &str = "~/.ipfs";

/// File inside the repository holding the API listener's multiaddr.
pub const API_FILE: &str = "api";

/// Resolves the local daemon from the process environment.
pub fn resolve_local() -> Result<DaemonAddress, EndpointError> {
    resolve_with(|name| std::env::var(name).ok())
}

/// Resolves the local daemon using `lookup` in place of the process environment.
///
/// An empty `IPFS_PATH` counts as unset.
pub fn resolve_with(lookup: impl Fn(&str) -> Option<String>) -> Result<DaemonAddress, EndpointError> {
    let repo = lookup(ENV_REPO_PATH)
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REPO_PATH.to_string());
    api_address(&repo)
}

/// Reads and parses the `api` file of the repository at `repo`.
///
/// `repo` may start with `~`.
pub fn api_address(repo: &str) -> Result<DaemonAddress, EndpointError> {
    let path = expand_home(repo)?.join(API_FILE);
    let contents = std::fs::read_to_string(&path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => EndpointError::ApiFileMissing { path: path.clone() },
        _ => EndpointError::ApiFileUnreadable {
            path: path.clone(),
            source,
        },
    })?;
    let address = parse_address(&contents)?;
    debug!(api_file = %path.display(), %address, "resolved daemon address");
    Ok(address)
}

/// Expands a leading `~` or `~/` to the current user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf, EndpointError> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return Ok(PathBuf::from(path)),
    };
    let home = dirs::home_dir().ok_or_else(|| EndpointError::NoHomeDirectory {
        path: path.to_string(),
    })?;
    Ok(if rest.is_empty() {
        home
    } else {
        home.join(Path::new(rest))
    })
}
