//! Wire-level domain for the daemon's command API.
//!
//! This crate contains every value type shared between the endpoint resolver,
//! the RPC core, and the facades: the daemon address, typed option values,
//! client-wide default options, newtype identifiers, and the daemon error
//! envelope together with its retry semantics.
//!
//! ## Architectural Layer
//!
//! **Domain definitions.** This crate has no I/O dependencies. It defines
//! *what* travels over the wire; the `transport` crate defines *how*.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`Cid`, `PeerId`, `KeyName`, `ContentPath`) |
//! | [`types`] | Wire constants, `DaemonAddress`, `OptionValue`, `ApiOptions` |
//! | [`errors`] | `DaemonError`, the error envelope, and `RetryPolicy` |

pub mod errors;
pub mod identifiers;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{DaemonError, ErrorChannel, ErrorCode, ErrorEnvelope, RetryPolicy};
pub use identifiers::{Cid, ContentPath, KeyName, PeerId};
pub use types::{
    ApiOptions, DaemonAddress, OptionValue, Scheme, API_PREFIX, ARGUMENT_KEY,
    CHUNKED_OUTPUT_HEADER, STREAM_ERROR_TRAILER, STREAM_OUTPUT_HEADER,
};
