//! RPC core for the daemon's HTTP command API.
//!
//! Every daemon command is an HTTP `POST` to `/api/v0/<command>` with
//! positional arguments and named options in the query string and, for
//! commands that take file data, a streamed `multipart/form-data` body. This
//! crate builds those requests, sends them, and decodes the replies.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP concerns live here: URL encoding, the
//! multipart wire format, redirect and connection policy, trailer handling and
//! cancellation. The `coreapi` facades see only [`HttpClient`],
//! [`RequestBuilder`] and [`Response`].
//!
//! ## Error Channels
//!
//! The daemon reports failures in two ways and both surface as
//! [`Error::Daemon`]:
//!
//! - an in-band JSON envelope `{"Message": .., "Code": ..}` in place of the
//!   expected value, on any status;
//! - the `X-Stream-Error` HTTP trailer, set after a streaming body has
//!   already started.
//!
//! Transport failures ([`TransportError`]) and malformed replies
//! ([`DecodeError`]) are kept distinct from daemon-reported errors.
//!
//! ## Cancellation
//!
//! [`HttpClient::send`] takes a `CancellationToken`. Firing it aborts the
//! request in flight, or any body read pending on the returned [`Response`],
//! and releases the connection.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`request`] | `RequestBuilder` and the frozen `Request` |
//! | [`attachment`] | File and directory entries for upload |
//! | [`multipart`] | Streamed multipart encoder |
//! | [`client`] | `HttpClient`, the sender |
//! | [`response`] | `Response` and single-value decoding |
//! | [`stream`] | Newline-delimited value and raw byte streams |
//! | [`errors`] | The error taxonomy |

pub mod attachment;
mod body;
pub mod client;
pub mod errors;
pub mod multipart;
pub mod request;
pub mod response;
pub mod stream;

pub use attachment::{Attachment, AttachmentReader};
pub use client::{HttpClient, HttpClientBuilder};
pub use errors::{AttachmentReadError, BoxError, DecodeError, Error, TransportError};
pub use multipart::{MultipartBody, MultipartStream};
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use stream::{ByteStream, ValueStream};

// Callers need the token type to cancel requests.
pub use tokio_util::sync::CancellationToken;
