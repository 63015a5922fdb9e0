//! The live response handle and single-value decoding.
//!
//! A [`Response`] wraps a successful (2xx) reply whose body may still be
//! streaming. Every consuming method releases the connection before it
//! returns, and dropping the handle releases it too.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;
use protocol::{ErrorChannel, ErrorEnvelope, CHUNKED_OUTPUT_HEADER, STREAM_OUTPUT_HEADER};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::body::BodyReader;
use crate::errors::BoxError;
use crate::stream::{ByteStream, ValueStream};
use crate::{DecodeError, Error};

/// A reply from the daemon, headers received, body pending.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: BodyReader,
}

impl Response {
    /// Wraps an `http::Response` whose body yields `Bytes` frames.
    ///
    /// `cancel` aborts any body read that is in progress when it fires.
    pub fn from_http<B>(
        command: impl Into<String>,
        response: http::Response<B>,
        cancel: CancellationToken,
    ) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = response.into_parts();
        let body = body.map_err(|error| -> BoxError { error.into() }).boxed_unsync();
        Self {
            status: parts.status,
            headers: parts.headers,
            body: BodyReader::new(command.into(), body, cancel),
        }
    }

    /// The command this response answers.
    pub fn command(&self) -> &str {
        self.body.command()
    }

    /// The HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns `true` if the daemon flagged the body as a stream of values or
    /// raw chunked output.
    pub fn is_streaming(&self) -> bool {
        self.headers.contains_key(STREAM_OUTPUT_HEADER)
            || self.headers.contains_key(CHUNKED_OUTPUT_HEADER)
    }

    /// Reads exactly one JSON value and deserialises it into `T`.
    ///
    /// An error envelope, or a stream-error trailer, is returned as
    /// [`Error::Daemon`]. An empty body decodes as JSON `null`, so `T = ()`
    /// accepts commands that reply with nothing.
    pub async fn decode_one<T: DeserializeOwned>(mut self) -> Result<T, Error> {
        let command = self.command().to_string();
        let body = self.body.read_to_end().await?;

        let value = match serde_json::Deserializer::from_slice(&body)
            .into_iter::<Value>()
            .next()
        {
            None => Value::Null,
            Some(Ok(value)) => value,
            Some(Err(source)) => {
                if let Some(error) = self.body.trailer_error() {
                    return Err(error.into());
                }
                return Err(DecodeError::InvalidJson { command, source }.into());
            }
        };

        if let Some(envelope) = ErrorEnvelope::detect(&value) {
            debug!(%command, code = %envelope.code, "daemon reported an error");
            return Err(envelope.into_error(command, ErrorChannel::Envelope).into());
        }
        if let Some(error) = self.body.trailer_error() {
            return Err(error.into());
        }
        serde_json::from_value(value)
            .map_err(|source| DecodeError::UnexpectedShape { command, source }.into())
    }

    /// Decodes the body as a lazy stream of newline-delimited JSON values.
    pub fn decode_stream<T>(self) -> ValueStream<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        ValueStream::new(self.body)
    }

    /// Exposes the raw body as a stream of byte chunks.
    pub fn bytes_stream(self) -> ByteStream {
        ByteStream::new(self.body)
    }

    /// Collects the raw body.
    pub async fn bytes(mut self) -> Result<Bytes, Error> {
        let body = self.body.read_to_end().await?;
        match self.body.trailer_error() {
            Some(error) => Err(error.into()),
            None => Ok(body),
        }
    }

    /// Drains the body, reporting only failures.
    ///
    /// Used for commands whose output the caller ignores. Error envelopes in
    /// the body are still honoured.
    pub async fn discard(self) -> Result<(), Error> {
        let _: Value = self.decode_one().await?;
        Ok(())
    }

    /// Releases the connection without reading the rest of the body.
    pub fn close(mut self) {
        self.body.close();
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("command", &self.command())
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
