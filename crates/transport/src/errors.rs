//! Error taxonomy for the RPC core.
//!
//! Every request produces exactly one of: a decoded value, an [`Error::Daemon`],
//! an [`Error::Transport`], or an [`Error::Decode`]. The variants let callers
//! tell "the daemon says X failed" apart from "the exchange never completed"
//! and from "the client could not understand the daemon".
//!
//! Nothing here is retried. [`Error::retry_policy`] is advice for the caller.

use protocol::{DaemonError, RetryPolicy};
use reqwest::StatusCode;
use thiserror::Error;

/// Boxed error carried by response bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Any failure produced by sending a request or decoding its reply.
#[derive(Debug, Error)]
pub enum Error {
    /// The exchange never reached a well-formed application response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The daemon executed the command and reported a failure.
    #[error(transparent)]
    Daemon(#[from] DaemonError),

    /// The reply was neither a valid value nor an error envelope.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl Error {
    /// Returns the retry advice for this error.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Transport(error) => error.retry_policy(),
            Self::Daemon(error) => error.retry_policy(),
            Self::Decode(_) => RetryPolicy::NonRetryable,
        }
    }

    /// Returns the daemon error, if this is one.
    pub fn as_daemon(&self) -> Option<&DaemonError> {
        match self {
            Self::Daemon(error) => Some(error),
            _ => None,
        }
    }

    /// Returns `true` if the caller's cancellation signal ended the request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Cancelled))
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failures of the HTTP exchange itself.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client")]
    ClientInit {
        /// Builder failure.
        #[source]
        source: reqwest::Error,
    },

    /// The command name and arguments did not form a valid URL.
    #[error("invalid request URL for command '{command}': {reason}")]
    InvalidUrl {
        /// Command being sent.
        command: String,
        /// Parser message.
        reason: String,
    },

    /// The daemon could not be reached (DNS failure, refused, unreachable).
    #[error("failed to connect to the daemon")]
    Connect {
        /// Connection failure.
        #[source]
        source: reqwest::Error,
    },

    /// The configured timeout elapsed.
    #[error("request timed out")]
    Timeout {
        /// Timeout failure.
        #[source]
        source: reqwest::Error,
    },

    /// The caller's cancellation signal fired.
    #[error("request cancelled")]
    Cancelled,

    /// The daemon answered with a redirect. Redirects are never followed.
    #[error("unexpected redirect ({status}) to {}", .location.as_deref().unwrap_or("<no location>"))]
    UnexpectedRedirect {
        /// The 3xx status received.
        status: StatusCode,
        /// The `Location` header, if any.
        location: Option<String>,
    },

    /// A non-success status whose body was not an error envelope.
    #[error("daemon responded with {status}: {snippet}")]
    Status {
        /// The status received.
        status: StatusCode,
        /// The start of the response body.
        snippet: String,
    },

    /// Reading an attachment failed while the request body was being sent.
    #[error("failed to send attachment '{name}'")]
    Attachment {
        /// Name of the failing attachment.
        name: String,
        /// Send failure wrapping the read error.
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP exchange failed for another reason before a response arrived.
    #[error("HTTP request failed")]
    Request {
        /// Request failure.
        #[source]
        source: reqwest::Error,
    },

    /// The response body failed while being read (reset, truncated chunking).
    #[error("response body failed")]
    Body {
        /// Body failure.
        #[source]
        source: BoxError,
    },
}

impl TransportError {
    /// Returns the retry advice for this error.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } | Self::Request { .. } | Self::Body { .. } => {
                RetryPolicy::Retryable { after: None }
            }
            Self::Status { status, .. } if status.is_server_error() => {
                RetryPolicy::Retryable { after: None }
            }
            _ => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

/// The daemon's reply could not be understood.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The body (or one frame of it) is not valid JSON.
    #[error("'{command}' returned malformed JSON")]
    InvalidJson {
        /// Command whose reply failed.
        command: String,
        /// Parser failure.
        #[source]
        source: serde_json::Error,
    },

    /// The JSON is valid but does not have the expected shape.
    #[error("'{command}' returned an unexpected value")]
    UnexpectedShape {
        /// Command whose reply failed.
        command: String,
        /// Deserialisation failure.
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Attachment read errors
// ---------------------------------------------------------------------------

/// An attachment's reader failed while the multipart body was being streamed.
///
/// Travels inside the HTTP client's error chain; the sender recovers the name
/// and reports [`TransportError::Attachment`].
#[derive(Debug, Error)]
#[error("failed to read attachment '{name}'")]
pub struct AttachmentReadError {
    pub(crate) name: String,
    #[source]
    pub(crate) source: std::io::Error,
}

impl AttachmentReadError {
    /// Name of the failing attachment.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Finds an [`AttachmentReadError`] anywhere in `error`'s source chain.
pub(crate) fn failed_attachment(error: &(dyn std::error::Error + 'static)) -> Option<String> {
    let mut current = Some(error);
    while let Some(error) = current {
        if let Some(read) = error.downcast_ref::<AttachmentReadError>() {
            return Some(read.name.clone());
        }
        current = error.source();
    }
    None
}
