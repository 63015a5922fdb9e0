//! Frame-level access to a live response body.
//!
//! Trailers arrive as the last frame of an `http_body::Body`, after every data
//! frame. [`BodyReader`] records them as it reads so the decoders can consult
//! the stream-error trailer once the body has ended.

use bytes::{Bytes, BytesMut};
use http::HeaderMap;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::BodyExt;
use protocol::{DaemonError, STREAM_ERROR_TRAILER};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::errors::BoxError;
use crate::TransportError;

/// Type-erased response body.
pub(crate) type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// Reads a response body chunk by chunk, honouring cancellation.
///
/// The body is dropped, and with it the connection, at end of body, on error,
/// on cancellation, on [`BodyReader::close`], or when the reader is dropped,
/// whichever comes first. Later calls are no-ops.
pub(crate) struct BodyReader {
    command: String,
    body: Option<ResponseBody>,
    trailers: Option<HeaderMap>,
    cancel: CancellationToken,
}

impl BodyReader {
    pub(crate) fn new(command: String, body: ResponseBody, cancel: CancellationToken) -> Self {
        Self {
            command,
            body: Some(body),
            trailers: None,
            cancel,
        }
    }

    pub(crate) fn command(&self) -> &str {
        &self.command
    }

    /// Returns the next non-empty data chunk, or `None` at end of body.
    pub(crate) async fn chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            let Some(body) = self.body.as_mut() else {
                return Ok(None);
            };
            let frame = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                frame = body.frame() => Some(frame),
            };

            match frame {
                None => {
                    self.close();
                    return Err(TransportError::Cancelled);
                }
                Some(None) => {
                    self.close();
                    return Ok(None);
                }
                Some(Some(Err(source))) => {
                    self.close();
                    return Err(TransportError::Body { source });
                }
                Some(Some(Ok(frame))) => match frame.into_data() {
                    Ok(data) if data.is_empty() => {}
                    Ok(data) => return Ok(Some(data)),
                    Err(frame) => {
                        if let Ok(trailers) = frame.into_trailers() {
                            self.trailers
                                .get_or_insert_with(HeaderMap::new)
                                .extend(trailers);
                        }
                    }
                },
            }
        }
    }

    /// Reads the rest of the body into memory.
    pub(crate) async fn read_to_end(&mut self) -> Result<Bytes, TransportError> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }

    /// Returns the error carried by the stream-error trailer, if the body has
    /// ended and the daemon set it.
    pub(crate) fn trailer_error(&self) -> Option<DaemonError> {
        let value = self.trailers.as_ref()?.get(STREAM_ERROR_TRAILER)?;
        let text = String::from_utf8_lossy(value.as_bytes());
        if text.trim().is_empty() {
            return None;
        }
        Some(DaemonError::from_trailer(self.command.clone(), &text))
    }

    /// Releases the connection. Idempotent.
    pub(crate) fn close(&mut self) {
        if self.body.take().is_some() {
            trace!(command = %self.command, "released response body");
        }
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.body.is_none()
    }
}

impl Drop for BodyReader {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Synthetic bodies for decoder tests.

    use bytes::Bytes;
    use futures::stream::{self, BoxStream, StreamExt};
    use http::{HeaderMap, HeaderName, HeaderValue};
    use http_body::Frame;
    use http_body_util::{BodyExt, StreamBody};
    use protocol::STREAM_ERROR_TRAILER;

    use super::ResponseBody;
    use crate::errors::BoxError;

    pub(crate) type FrameStream = BoxStream<'static, Result<Frame<Bytes>, BoxError>>;

    pub(crate) fn data(text: &str) -> Result<Frame<Bytes>, BoxError> {
        Ok(Frame::data(Bytes::from(text.to_string())))
    }

    pub(crate) fn stream_error_trailer(message: &str) -> Result<Frame<Bytes>, BoxError> {
        let mut trailers = HeaderMap::new();
        trailers.insert(
            HeaderName::from_bytes(STREAM_ERROR_TRAILER.as_bytes()).unwrap(),
            HeaderValue::from_str(message).unwrap(),
        );
        Ok(Frame::trailers(trailers))
    }

    pub(crate) fn reset() -> Result<Frame<Bytes>, BoxError> {
        Err("connection reset by peer".into())
    }

    /// A body yielding `frames` and then ending.
    pub(crate) fn body(frames: Vec<Result<Frame<Bytes>, BoxError>>) -> ResponseBody {
        from_stream(stream::iter(frames).boxed())
    }

    /// A body yielding `frames` and then never producing another frame.
    pub(crate) fn stalled_body(frames: Vec<Result<Frame<Bytes>, BoxError>>) -> ResponseBody {
        from_stream(stream::iter(frames).chain(stream::pending()).boxed())
    }

    fn from_stream(frames: FrameStream) -> ResponseBody {
        StreamBody::new(frames).boxed_unsync()
    }
}
