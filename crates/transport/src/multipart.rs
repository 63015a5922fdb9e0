//! Streamed `multipart/form-data` encoding of attachments.
//!
//! Wire layout, one part per attachment in insertion order:
//!
//! ```text
//! --<boundary>\r\n
//! Content-Disposition: form-data; name="file"; filename="<url-escaped name>"\r\n
//! Content-Type: application/octet-stream | application/x-directory\r\n
//! [Content-Length: <declared length>\r\n]
//! \r\n
//! <attachment bytes, directories carry none>\r\n
//! ...
//! --<boundary>--\r\n
//! ```
//!
//! Attachment bytes are pulled from each reader as the HTTP client polls the
//! body, so memory use does not grow with the upload size.

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tokio_util::io::ReaderStream;

use crate::attachment::AttachmentKind;
use crate::errors::AttachmentReadError;
use crate::Attachment;

const FILE_CONTENT_TYPE: &str = "application/octet-stream";
const DIRECTORY_CONTENT_TYPE: &str = "application/x-directory";
const CRLF: &[u8] = b"\r\n";

/// Chunks of an encoded multipart body.
pub type MultipartStream = BoxStream<'static, Result<Bytes, AttachmentReadError>>;

/// An encoded, not yet consumed, multipart body.
pub struct MultipartBody {
    boundary: String,
    stream: MultipartStream,
}

impl MultipartBody {
    /// Encodes `attachments`, or returns `None` when there are none so that
    /// payload-less commands carry no body and no multipart content type.
    pub fn encode(attachments: Vec<Attachment>) -> Option<Self> {
        if attachments.is_empty() {
            return None;
        }
        let boundary = uuid::Uuid::new_v4().simple().to_string();
        let parts: Vec<MultipartStream> = attachments
            .into_iter()
            .map(|attachment| encode_part(&boundary, attachment))
            .collect();
        let closing = Bytes::from(format!("--{boundary}--\r\n"));

        let stream = stream::iter(parts)
            .flatten()
            .chain(stream::once(async move { Ok(closing) }))
            // Stop at the first failed read; nothing after it is sent.
            .scan(false, |failed, chunk| {
                let next = if *failed {
                    None
                } else {
                    *failed = chunk.is_err();
                    Some(chunk)
                };
                futures::future::ready(next)
            })
            .boxed();

        Some(Self { boundary, stream })
    }

    /// The boundary token separating parts.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The value of the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Consumes the body, returning its chunk stream.
    pub fn into_stream(self) -> MultipartStream {
        self.stream
    }
}

impl std::fmt::Debug for MultipartBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartBody")
            .field("boundary", &self.boundary)
            .finish_non_exhaustive()
    }
}

fn part_header(boundary: &str, name: &str, content_type: &str, length: Option<u64>) -> Bytes {
    let filename: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
    let mut header = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: {content_type}\r\n"
    );
    if let Some(length) = length {
        header.push_str(&format!("Content-Length: {length}\r\n"));
    }
    header.push_str("\r\n");
    Bytes::from(header)
}

fn encode_part(boundary: &str, attachment: Attachment) -> MultipartStream {
    let Attachment { name, kind } = attachment;
    match kind {
        AttachmentKind::Directory => {
            let header = part_header(boundary, &name, DIRECTORY_CONTENT_TYPE, None);
            stream::iter([Ok(header), Ok(Bytes::from_static(CRLF))]).boxed()
        }
        AttachmentKind::File { reader, length } => {
            let header = part_header(boundary, &name, FILE_CONTENT_TYPE, length);
            let body = ReaderStream::new(reader).map_err(move |source| AttachmentReadError {
                name: name.clone(),
                source,
            });
            stream::once(async move { Ok(header) })
                .chain(body)
                .chain(stream::once(async { Ok(Bytes::from_static(CRLF)) }))
                .boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::{AsyncRead, ReadBuf};

    use super::*;

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::other("device unplugged")))
        }
    }

    struct Part {
        headers: String,
        data: Vec<u8>,
    }

    async fn collect(body: MultipartBody) -> (String, Vec<u8>) {
        let boundary = body.boundary().to_string();
        let chunks: Vec<Bytes> = body.into_stream().try_collect().await.unwrap();
        (boundary, chunks.concat())
    }

    fn parse(boundary: &str, body: &[u8]) -> Vec<Part> {
        let text = String::from_utf8(body.to_vec()).unwrap();
        let delimiter = format!("--{boundary}");
        let mut segments = text.split(delimiter.as_str());
        assert_eq!(segments.next(), Some(""));

        let mut parts = Vec::new();
        for segment in segments {
            if segment == "--\r\n" {
                break;
            }
            let segment = segment.strip_prefix("\r\n").unwrap();
            let (headers, rest) = segment.split_once("\r\n\r\n").unwrap();
            let data = rest.strip_suffix("\r\n").unwrap();
            parts.push(Part {
                headers: headers.to_string(),
                data: data.as_bytes().to_vec(),
            });
        }
        parts
    }

    #[test]
    fn no_attachments_means_no_body() {
        assert!(MultipartBody::encode(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn parts_follow_insertion_order_and_keep_their_bytes() {
        let body = MultipartBody::encode(vec![
            Attachment::bytes("a", &b"abc"[..]),
            Attachment::reader("b", &b"hello"[..]),
        ])
        .unwrap();
        assert!(body.content_type().starts_with("multipart/form-data; boundary="));

        let (boundary, encoded) = collect(body).await;
        let parts = parse(&boundary, &encoded);

        assert_eq!(parts.len(), 2);
        assert!(parts[0].headers.contains("filename=\"a\""));
        assert_eq!(parts[0].data, b"abc");
        assert!(parts[1].headers.contains("filename=\"b\""));
        assert_eq!(parts[1].data, b"hello");
        assert!(encoded.ends_with(format!("--{boundary}--\r\n").as_bytes()));
    }

    #[tokio::test]
    async fn declared_length_becomes_part_content_length() {
        let body = MultipartBody::encode(vec![
            Attachment::bytes("known", &b"12345"[..]),
            Attachment::reader("unknown", &b"xyz"[..]),
        ])
        .unwrap();

        let (boundary, encoded) = collect(body).await;
        let parts = parse(&boundary, &encoded);

        assert!(parts[0].headers.contains("Content-Length: 5"));
        assert!(!parts[1].headers.contains("Content-Length"));
    }

    #[tokio::test]
    async fn directory_entries_are_flagged_and_empty() {
        let body = MultipartBody::encode(vec![
            Attachment::directory("photos"),
            Attachment::bytes("photos/cat one.jpg", &b"meow"[..]),
        ])
        .unwrap();

        let (boundary, encoded) = collect(body).await;
        let parts = parse(&boundary, &encoded);

        assert!(parts[0].headers.contains("Content-Type: application/x-directory"));
        assert!(parts[0].data.is_empty());
        assert!(parts[1].headers.contains("Content-Type: application/octet-stream"));
        assert!(parts[1].headers.contains("filename=\"photos%2Fcat+one.jpg\""));
    }

    #[tokio::test]
    async fn read_failure_names_the_attachment_and_stops_the_body() {
        let body = MultipartBody::encode(vec![
            Attachment::reader("broken.bin", FailingReader),
            Attachment::bytes("never-sent", &b"zzz"[..]),
        ])
        .unwrap();

        let chunks: Vec<Result<Bytes, AttachmentReadError>> = body.into_stream().collect().await;

        let error = chunks.last().unwrap().as_ref().unwrap_err();
        assert_eq!(error.name(), "broken.bin");
        assert_eq!(chunks.iter().filter(|c| c.is_err()).count(), 1);
        assert!(chunks
            .iter()
            .filter_map(|c| c.as_ref().ok())
            .all(|c| !c.windows(10).any(|w| w == b"never-sent")));
    }
}
