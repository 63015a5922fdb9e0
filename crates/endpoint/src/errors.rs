//! Errors raised while locating the daemon.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a hint into a daemon address.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The repository has no `api` file, which usually means the daemon is not running.
    #[error("no api file at {path}; is the daemon running?")]
    ApiFileMissing {
        /// Path that was checked.
        path: PathBuf,
    },

    /// The `api` file exists but could not be read.
    #[error("failed to read api file {path}")]
    ApiFileUnreadable {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A path began with `~` but the home directory is unknown.
    #[error("cannot expand '~' in {path}: home directory is unknown")]
    NoHomeDirectory {
        /// The unexpanded path.
        path: String,
    },

    /// The address string could not be parsed or uses an unsupported transport.
    #[error("invalid daemon address '{address}': {reason}")]
    InvalidAddress {
        /// The rejected address text.
        address: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl EndpointError {
    pub(crate) fn invalid(address: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}
