//! Streaming decoders.
//!
//! [`ValueStream`] turns a body of newline-delimited JSON values into a
//! `futures::Stream` of decoded items. [`ByteStream`] exposes the raw chunks.
//! Both apply the same end-of-body rule: once the body ends, the stream-error
//! trailer is checked before anything else is yielded, so a failed stream
//! always ends in an error after its valid prefix.
//!
//! ```text
//! Open --value--> Yielding --value--> Yielding ...
//!  |                 |
//!  |                 +--end of body--> Closed
//!  +--error (envelope, trailer, transport, decode)--> Closed
//! ```
//!
//! There is no way back to `Open`; retrying means issuing a new request.

use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use protocol::{ErrorChannel, ErrorEnvelope};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::body::BodyReader;
use crate::{DecodeError, Error};

// ---------------------------------------------------------------------------
// Line framing
// ---------------------------------------------------------------------------

/// Splits incoming chunks into newline-terminated frames.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: BytesMut,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Returns the next complete, non-blank line without its terminator.
    fn next_line(&mut self) -> Option<Bytes> {
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line = self.pending.split_to(end + 1).freeze();
            line.truncate(end);
            if !is_blank(&line) {
                return Some(line);
            }
        }
        None
    }

    /// Returns whatever is left once the body has ended, if it is not blank.
    fn take_remainder(&mut self) -> Option<Bytes> {
        let rest = self.pending.split().freeze();
        (!is_blank(&rest)).then_some(rest)
    }
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

// ---------------------------------------------------------------------------
// Value stream state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Yielding,
    Closed,
}

struct StreamDecoder<T> {
    body: BodyReader,
    lines: LineBuffer,
    state: State,
    _item: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> StreamDecoder<T> {
    fn new(body: BodyReader) -> Self {
        Self {
            body,
            lines: LineBuffer::default(),
            state: State::Open,
            _item: PhantomData,
        }
    }

    async fn next(&mut self) -> Option<Result<T, Error>> {
        loop {
            if self.state == State::Closed {
                return None;
            }
            if let Some(line) = self.lines.next_line() {
                return Some(self.decode(&line));
            }
            match self.body.chunk().await {
                Ok(Some(chunk)) => self.lines.push(&chunk),
                Ok(None) => {
                    if let Some(error) = self.body.trailer_error() {
                        warn!(command = %self.body.command(), %error, "stream failed after headers were sent");
                        return Some(self.fail(error.into()));
                    }
                    if let Some(rest) = self.lines.take_remainder() {
                        return Some(self.decode(&rest));
                    }
                    self.finish();
                    return None;
                }
                Err(error) => return Some(self.fail(error.into())),
            }
        }
    }

    fn decode(&mut self, frame: &[u8]) -> Result<T, Error> {
        let command = self.body.command().to_string();
        let value: Value = match serde_json::from_slice(frame) {
            Ok(value) => value,
            Err(source) => return self.fail(DecodeError::InvalidJson { command, source }.into()),
        };
        if let Some(envelope) = ErrorEnvelope::detect(&value) {
            debug!(%command, code = %envelope.code, "daemon reported an error mid-stream");
            return self.fail(envelope.into_error(command, ErrorChannel::Envelope).into());
        }
        match serde_json::from_value(value) {
            Ok(item) => {
                self.state = State::Yielding;
                Ok(item)
            }
            Err(source) => self.fail(DecodeError::UnexpectedShape { command, source }.into()),
        }
    }

    fn fail(&mut self, error: Error) -> Result<T, Error> {
        self.finish();
        Err(error)
    }

    fn finish(&mut self) {
        self.state = State::Closed;
        self.body.close();
    }
}

/// A lazy sequence of decoded values from a streaming reply.
///
/// Single-consumer. Ends with `None` after a clean end of body, or after
/// yielding exactly one `Err`. Dropping it early releases the connection.
#[must_use = "streams do nothing unless polled"]
pub struct ValueStream<T> {
    inner: BoxStream<'static, Result<T, Error>>,
}

impl<T> ValueStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub(crate) fn new(body: BodyReader) -> Self {
        let decoder = StreamDecoder::<T>::new(body);
        let inner = stream::unfold(decoder, |mut decoder| async move {
            let item = decoder.next().await?;
            Some((item, decoder))
        })
        .boxed();
        Self { inner }
    }

    /// Collects every remaining value, stopping at the first error.
    pub async fn try_collect_all(mut self) -> Result<Vec<T>, Error> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        Ok(items)
    }
}

impl<T> Stream for ValueStream<T> {
    type Item = Result<T, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl<T> std::fmt::Debug for ValueStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueStream").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Raw byte stream
// ---------------------------------------------------------------------------

/// The raw body of a reply as a stream of chunks.
///
/// Ends with an [`Error::Daemon`] if the stream-error trailer was set.
#[must_use = "streams do nothing unless polled"]
pub struct ByteStream {
    inner: BoxStream<'static, Result<Bytes, Error>>,
}

impl ByteStream {
    pub(crate) fn new(body: BodyReader) -> Self {
        let inner = stream::unfold(Some(body), |state| async move {
            let mut body = state?;
            match body.chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(body))),
                Ok(None) => body.trailer_error().map(|error| (Err(error.into()), None)),
                Err(error) => Some((Err(error.into()), None)),
            }
        })
        .boxed();
        Self { inner }
    }

    /// Collects the remaining chunks into one buffer.
    pub async fn concat(mut self) -> Result<Bytes, Error> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }
}

impl Stream for ByteStream {
    type Item = Result<Bytes, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use protocol::ErrorCode;
    use serde::Deserialize;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::body::test_support::*;
    use crate::body::ResponseBody;
    use crate::TransportError;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "PascalCase")]
    struct Progress {
        name: String,
    }

    fn values(body: ResponseBody) -> ValueStream<Progress> {
        ValueStream::new(BodyReader::new(
            "add".to_string(),
            body,
            CancellationToken::new(),
        ))
    }

    async fn drain<T>(mut stream: ValueStream<T>) -> Vec<Result<T, Error>> {
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item);
        }
        out
    }

    fn names(items: &[Result<Progress, Error>]) -> Vec<&str> {
        items
            .iter()
            .filter_map(|item| item.as_ref().ok())
            .map(|p| p.name.as_str())
            .collect()
    }

    #[test]
    fn line_buffer_skips_blank_lines_and_holds_partial_ones() {
        let mut lines = LineBuffer::default();
        lines.push(b"{\"a\":1}\n\n  \n{\"b\"");

        assert_eq!(lines.next_line().as_deref(), Some(&b"{\"a\":1}"[..]));
        assert_eq!(lines.next_line(), None);

        lines.push(b":2}\n");
        assert_eq!(lines.next_line().as_deref(), Some(&b"{\"b\":2}"[..]));
        assert_eq!(lines.take_remainder(), None);
    }

    #[tokio::test]
    async fn yields_values_in_arrival_order_then_ends() {
        let stream = values(body(vec![
            data("{\"Name\":\"a\"}\n{\"Name\":\"b\"}\n"),
            data("{\"Name\":"),
            data("\"c\"}\n"),
        ]));

        let items = drain(stream).await;

        assert_eq!(items.len(), 3);
        assert_eq!(names(&items), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn final_value_without_newline_is_yielded() {
        let items = drain(values(body(vec![data("{\"Name\":\"only\"}")]))).await;

        assert_eq!(names(&items), ["only"]);
    }

    #[tokio::test]
    async fn trailer_after_three_frames_yields_three_values_then_daemon_error() {
        let stream = values(body(vec![
            data("{\"Name\":\"1\"}\n"),
            data("{\"Name\":\"2\"}\n"),
            data("{\"Name\":\"3\"}\n"),
            stream_error_trailer("context canceled"),
        ]));

        let items = drain(stream).await;

        assert_eq!(items.len(), 4);
        assert_eq!(names(&items), ["1", "2", "3"]);
        let error = items[3].as_ref().unwrap_err().as_daemon().unwrap();
        assert_eq!(error.channel, ErrorChannel::Trailer);
        assert_eq!(error.message, "context canceled");
    }

    #[tokio::test]
    async fn trailer_suppresses_an_unterminated_final_frame() {
        let stream = values(body(vec![
            data("{\"Name\":\"1\"}\n{\"Name\":\"partial\"}"),
            stream_error_trailer("aborted"),
        ]));

        let items = drain(stream).await;

        assert_eq!(names(&items), ["1"]);
        assert!(items[1].as_ref().unwrap_err().as_daemon().is_some());
    }

    #[tokio::test]
    async fn reset_after_two_frames_yields_two_values_then_transport_error() {
        let stream = values(body(vec![
            data("{\"Name\":\"1\"}\n"),
            data("{\"Name\":\"2\"}\n"),
            reset(),
        ]));

        let items = drain(stream).await;

        assert_eq!(items.len(), 3);
        assert_eq!(names(&items), ["1", "2"]);
        assert!(matches!(
            items[2],
            Err(Error::Transport(TransportError::Body { .. }))
        ));
    }

    #[tokio::test]
    async fn in_band_envelope_ends_the_stream() {
        let stream = values(body(vec![
            data("{\"Name\":\"1\"}\n"),
            data("{\"Message\":\"no space left\",\"Code\":0,\"Type\":\"error\"}\n"),
            data("{\"Name\":\"never\"}\n"),
        ]));

        let items = drain(stream).await;

        assert_eq!(items.len(), 2);
        let error = items[1].as_ref().unwrap_err().as_daemon().unwrap();
        assert_eq!(error.code, ErrorCode::NORMAL);
        assert_eq!(error.channel, ErrorChannel::Envelope);
    }

    #[tokio::test]
    async fn envelope_as_the_first_frame_errors_from_open() {
        let items = drain(values(body(vec![data("{\"Message\":\"not pinned\",\"Code\":3}\n")]))).await;

        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap_err().as_daemon().unwrap().code.is_not_found());
    }

    #[tokio::test]
    async fn malformed_frame_is_a_decode_error() {
        let items = drain(values(body(vec![data("{\"Name\":\"1\"}\nnot json\n")]))).await;

        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(Error::Decode(DecodeError::InvalidJson { .. }))));
    }

    #[tokio::test]
    async fn cancellation_unblocks_a_pending_read() {
        let cancel = CancellationToken::new();
        let mut stream = ValueStream::<Progress>::new(BodyReader::new(
            "log/tail".to_string(),
            stalled_body(vec![data("{\"Name\":\"first\"}\n")]),
            cancel.clone(),
        ));

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.name, "first");

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let next = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("cancellation did not unblock the read");
        assert!(next.unwrap().unwrap_err().is_cancelled());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn byte_stream_ends_with_trailer_error() {
        let mut stream = ByteStream::new(BodyReader::new(
            "cat".to_string(),
            body(vec![data("abc"), data("def"), stream_error_trailer("block lost")]),
            CancellationToken::new(),
        ));

        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from_static(b"def"));
        assert!(stream.next().await.unwrap().unwrap_err().as_daemon().is_some());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn byte_stream_concat_joins_chunks() {
        let stream = ByteStream::new(BodyReader::new(
            "cat".to_string(),
            body(vec![data("hello "), data("world")]),
            CancellationToken::new(),
        ));

        assert_eq!(stream.concat().await.unwrap(), Bytes::from_static(b"hello world"));
    }
}
