//! Named payload streams attached to a request.

use std::io::Cursor;

use bytes::Bytes;
use tokio::io::AsyncRead;

/// Reader type backing a file attachment.
pub type AttachmentReader = Box<dyn AsyncRead + Send + Unpin>;

/// What an attachment represents in the daemon's view of the upload.
pub(crate) enum AttachmentKind {
    /// A leaf file whose bytes are streamed from `reader`.
    File {
        reader: AttachmentReader,
        length: Option<u64>,
    },
    /// An interior directory node; carries no bytes.
    Directory,
}

/// One named payload stream.
///
/// Names are slash-separated paths (`"dir/file.txt"`); the daemon rebuilds
/// nested structure from them together with the directory entries. The
/// request owns the reader until the multipart encoder consumes it.
pub struct Attachment {
    pub(crate) name: String,
    pub(crate) kind: AttachmentKind,
}

impl Attachment {
    /// Creates a file attachment read from `reader`, of unknown length.
    pub fn reader(name: impl Into<String>, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            name: name.into(),
            kind: AttachmentKind::File {
                reader: Box::new(reader),
                length: None,
            },
        }
    }

    /// Creates a file attachment from in-memory bytes; the length is known.
    pub fn bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let length = data.len() as u64;
        Self::reader(name, Cursor::new(data)).with_length(length)
    }

    /// Creates a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AttachmentKind::Directory,
        }
    }

    /// Declares the byte length of a file attachment. Ignored for directories.
    #[must_use]
    pub fn with_length(mut self, declared: u64) -> Self {
        if let AttachmentKind::File { length, .. } = &mut self.kind {
            *length = Some(declared);
        }
        self
    }

    /// Returns the attachment's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared byte length, if any.
    pub fn length(&self) -> Option<u64> {
        match &self.kind {
            AttachmentKind::File { length, .. } => *length,
            AttachmentKind::Directory => None,
        }
    }

    /// Returns `true` for directory entries.
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, AttachmentKind::Directory)
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("name", &self.name)
            .field("directory", &self.is_directory())
            .field("length", &self.length())
            .finish()
    }
}
