//! Facade error type.

use endpoint::EndpointError;
use protocol::{Cid, DaemonError, RetryPolicy};
use thiserror::Error;
use transport::TransportError;

/// Failure of a facade operation.
///
/// RPC failures pass through unchanged in [`Error::Rpc`]; the remaining
/// variants cover replies the daemon sent successfully but that do not mean
/// what the operation needs.
#[derive(Debug, Error)]
pub enum Error {
    /// The daemon endpoint could not be resolved.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// Sending the command or decoding its reply failed.
    #[error(transparent)]
    Rpc(#[from] transport::Error),

    /// The reply decoded, but lacked what the operation needs.
    #[error("'{command}' returned an unexpected response: {detail}")]
    UnexpectedResponse {
        /// Command whose reply was rejected.
        command: String,
        /// What was missing or wrong.
        detail: String,
    },

    /// The daemon reported that one block of a removal batch failed.
    #[error("failed to remove block {cid}: {message}")]
    BlockRemoval {
        /// The block that was not removed.
        cid: Cid,
        /// The daemon's per-block message.
        message: String,
    },
}

impl Error {
    pub(crate) fn unexpected(command: &str, detail: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            command: command.to_string(),
            detail: detail.into(),
        }
    }

    /// Returns the daemon-reported error, if this is one.
    pub fn as_daemon(&self) -> Option<&DaemonError> {
        match self {
            Self::Rpc(error) => error.as_daemon(),
            _ => None,
        }
    }

    /// Returns `true` if the daemon reported that the target does not exist.
    pub fn is_not_found(&self) -> bool {
        self.as_daemon().is_some_and(|error| error.code.is_not_found())
    }

    /// Returns `true` if the caller's cancellation signal ended the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Rpc(error) if error.is_cancelled())
    }

    /// Returns the retry advice for this error.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Rpc(error) => error.retry_policy(),
            _ => RetryPolicy::NonRetryable,
        }
    }
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Self {
        Self::Rpc(error.into())
    }
}

impl From<DaemonError> for Error {
    fn from(error: DaemonError) -> Self {
        Self::Rpc(error.into())
    }
}

#[cfg(test)]
mod tests {
    use protocol::{ErrorChannel, ErrorCode};

    use super::*;

    fn daemon(code: ErrorCode) -> Error {
        DaemonError {
            command: "block/stat".to_string(),
            message: "block not found".to_string(),
            code,
            channel: ErrorChannel::Envelope,
        }
        .into()
    }

    #[test]
    fn not_found_is_read_from_the_daemon_code() {
        assert!(daemon(ErrorCode::NOT_FOUND).is_not_found());
        assert!(!daemon(ErrorCode::NORMAL).is_not_found());
        assert!(!Error::unexpected("add", "no root").is_not_found());
    }

    #[test]
    fn cancellation_passes_through() {
        let error: Error = TransportError::Cancelled.into();

        assert!(error.is_cancelled());
        assert_eq!(error.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[test]
    fn messages_name_the_failure() {
        let error = Error::BlockRemoval {
            cid: Cid::new("QmGone").unwrap(),
            message: "pinned: recursive".to_string(),
        };

        assert_eq!(error.to_string(), "failed to remove block QmGone: pinned: recursive");
    }
}
