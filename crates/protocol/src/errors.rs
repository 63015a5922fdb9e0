//! Daemon-reported errors and retry semantics.
//!
//! [`DaemonError`] covers failures the daemon reports about a command it
//! executed. It can arrive on two channels:
//!
//! - [`ErrorChannel::Envelope`]: a JSON error envelope in the body, either as
//!   the single reply value or as any element of a streamed reply.
//! - [`ErrorChannel::Trailer`]: the `X-Stream-Error` trailer, set by the daemon
//!   when a streaming reply fails after its headers were already flushed.
//!
//! Transport and decode failures are defined in the `transport` crate; they
//! never masquerade as a [`DaemonError`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Nothing in this workspace retries on its own. The policy is advice for the
/// caller, who owns any retry loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried unchanged.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// Retrying without changing the inputs will fail the same way.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Machine-readable code carried by a daemon error.
///
/// The daemon uses a small enumerated set, but any integer it sends is kept
/// verbatim so callers can match on codes this crate does not name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(i64);

impl ErrorCode {
    /// A generic command failure.
    pub const NORMAL: Self = Self(0);
    /// The request was malformed (bad argument, unknown option value).
    pub const CLIENT: Self = Self(1);
    /// The daemon hit an internal bug.
    pub const IMPLEMENTATION: Self = Self(2);
    /// The requested object, key or command does not exist.
    pub const NOT_FOUND: Self = Self(3);
    /// The daemon cannot continue serving.
    pub const FATAL: Self = Self(4);

    /// Creates an [`ErrorCode`] from the raw integer sent by the daemon.
    pub fn new(code: i64) -> Self {
        Self(code)
    }

    /// Returns the raw integer value.
    pub fn as_i64(self) -> i64 {
        self.0
    }

    /// Returns `true` for [`ErrorCode::NOT_FOUND`].
    pub fn is_not_found(self) -> bool {
        self == Self::NOT_FOUND
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match *self {
            Self::NORMAL => "normal",
            Self::CLIENT => "client",
            Self::IMPLEMENTATION => "implementation",
            Self::NOT_FOUND => "not found",
            Self::FATAL => "fatal",
            _ => return write!(f, "{}", self.0),
        };
        write!(f, "{} ({label})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Daemon errors
// ---------------------------------------------------------------------------

/// Where a [`DaemonError`] was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorChannel {
    /// The error envelope appeared in the response body.
    Envelope,
    /// The `X-Stream-Error` trailer was set after the body ended.
    ///
    /// Any elements already yielded from the stream are valid; the failure
    /// applies to the remainder only.
    Trailer,
}

/// A failure the daemon reported about a command it executed.
///
/// Generally not retryable without changing the request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{command}: {message}")]
pub struct DaemonError {
    /// The command that failed (e.g. `"pin/add"`).
    pub command: String,
    /// Human-readable description from the daemon.
    pub message: String,
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Channel the error arrived on.
    pub channel: ErrorChannel,
}

impl DaemonError {
    /// Builds an error from the value of the `X-Stream-Error` trailer.
    ///
    /// The trailer normally carries a bare message; a JSON envelope is also
    /// accepted so that its code survives.
    pub fn from_trailer(command: impl Into<String>, value: &str) -> Self {
        let command = command.into();
        match serde_json::from_str::<Value>(value)
            .ok()
            .as_ref()
            .and_then(ErrorEnvelope::detect)
        {
            Some(envelope) => envelope.into_error(command, ErrorChannel::Trailer),
            None => Self {
                command,
                message: value.trim().to_string(),
                code: ErrorCode::NORMAL,
                channel: ErrorChannel::Trailer,
            },
        }
    }

    /// Returns the retry advice for this error.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::NonRetryable
    }
}

// ---------------------------------------------------------------------------
// Error envelope
// ---------------------------------------------------------------------------

/// The JSON shape the daemon uses for an in-band failure:
/// `{"Message": "...", "Code": 0, "Type": "error"}`.
///
/// `Type` is optional; when present it must be `"error"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Human-readable description.
    #[serde(rename = "Message")]
    pub message: String,
    /// Machine-readable code.
    #[serde(rename = "Code")]
    pub code: ErrorCode,
}

impl ErrorEnvelope {
    /// Returns the envelope if `value` has the error shape, `None` otherwise.
    pub fn detect(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let message = object.get("Message")?.as_str()?;
        let code = object.get("Code")?.as_i64()?;
        match object.get("Type") {
            None => {}
            Some(Value::String(kind)) if kind == "error" => {}
            Some(_) => return None,
        }
        Some(Self {
            message: message.to_string(),
            code: ErrorCode::new(code),
        })
    }

    /// Attaches the command name and channel, producing a [`DaemonError`].
    pub fn into_error(self, command: impl Into<String>, channel: ErrorChannel) -> DaemonError {
        DaemonError {
            command: command.into(),
            message: self.message,
            code: self.code,
            channel,
        }
    }
}
