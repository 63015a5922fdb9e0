//! File import and retrieval: `add`, `cat`, `ls`.
//!
//! `add` uploads one or more attachments. Nested structure is expressed with
//! slash-separated attachment names plus [`Attachment::directory`] entries for
//! the directories themselves, parents before children:
//!
//! ```no_run
//! # async fn run(api: coreapi::HttpApi) -> Result<(), coreapi::Error> {
//! use coreapi::unixfs::AddOptions;
//! use transport::Attachment;
//!
//! let root = api
//!     .unixfs()
//!     .add(
//!         vec![
//!             Attachment::directory("site"),
//!             Attachment::bytes("site/index.html", "<h1>hi</h1>"),
//!         ],
//!         AddOptions::default(),
//!     )
//!     .await?;
//! println!("added {}", root.cid);
//! # Ok(())
//! # }
//! ```

use futures::stream::{self, StreamExt, TryStreamExt};
use protocol::{Cid, ContentPath};
use serde::Deserialize;
use tracing::debug;
use transport::{Attachment, ByteStream, ValueStream};

use crate::{null_as_default, Error, HttpApi, ResultStream};

/// Options for [`UnixfsApi::add`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Pin the added content. Daemon default: `true`.
    pub pin: Option<bool>,
    /// CID version of the produced objects.
    pub cid_version: Option<u32>,
    /// Multihash function, e.g. `"sha2-256"`.
    pub hash: Option<String>,
    /// Chunking algorithm, e.g. `"size-262144"`.
    pub chunker: Option<String>,
    /// Store leaves as raw blocks.
    pub raw_leaves: Option<bool>,
    /// Compute CIDs without storing anything.
    pub only_hash: bool,
    /// Wrap the added entries in a directory.
    pub wrap_with_directory: bool,
}

/// One event from an `add` reply.
///
/// Progress events carry `bytes` and no `hash`; every added object yields one
/// event with its `hash`. The root arrives last.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddEvent {
    /// Attachment name the event refers to.
    #[serde(default)]
    pub name: String,
    /// CID of the added object; absent on progress events.
    #[serde(default)]
    pub hash: Option<Cid>,
    /// Cumulative size, as a decimal string.
    #[serde(default)]
    pub size: Option<String>,
    /// Bytes processed so far.
    #[serde(default)]
    pub bytes: Option<u64>,
}

impl AddEvent {
    /// Returns `true` for progress reports.
    pub fn is_progress(&self) -> bool {
        self.hash.is_none()
    }
}

/// The result of a completed `add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedObject {
    /// Name of the root entry.
    pub name: String,
    /// CID of the root.
    pub cid: Cid,
    /// Cumulative size, when the daemon reported a parsable one.
    pub size: Option<u64>,
}

impl AddedObject {
    /// The immutable path of the added object.
    pub fn path(&self) -> ContentPath {
        ContentPath::from_cid(&self.cid)
    }
}

/// A directory entry from `ls`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LsLink {
    /// Entry name within the directory.
    pub name: String,
    /// CID of the entry.
    pub hash: Cid,
    /// Size of the entry in bytes.
    #[serde(default)]
    pub size: u64,
    /// 1 = directory, 2 = file, others as reported.
    #[serde(rename = "Type", default)]
    pub kind: i32,
    /// Symlink target; empty for other kinds.
    #[serde(default)]
    pub target: String,
}

impl LsLink {
    /// Returns `true` for subdirectories.
    pub fn is_directory(&self) -> bool {
        self.kind == 1
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsObject {
    #[serde(default, deserialize_with = "null_as_default")]
    links: Vec<LsLink>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsOutput {
    #[serde(default, deserialize_with = "null_as_default")]
    objects: Vec<LsObject>,
}

/// File operations.
#[derive(Debug, Clone, Copy)]
pub struct UnixfsApi<'a> {
    api: &'a HttpApi,
}

impl<'a> UnixfsApi<'a> {
    pub(crate) fn new(api: &'a HttpApi) -> Self {
        Self { api }
    }

    /// Adds `entries` and returns the root object.
    pub async fn add(&self, entries: Vec<Attachment>, options: AddOptions) -> Result<AddedObject, Error> {
        let events = self.add_events(entries, options).await?;
        let root = root_of(events).await?;
        debug!(cid = %root.cid, "added content");
        Ok(root)
    }

    /// Adds `entries` and streams every event, progress reports included.
    pub async fn add_events(
        &self,
        entries: Vec<Attachment>,
        options: AddOptions,
    ) -> Result<ValueStream<AddEvent>, Error> {
        let request = entries
            .into_iter()
            .fold(self.api.request("add"), |builder, entry| builder.attachment(entry))
            .option_if("pin", options.pin)
            .option_if("cid-version", options.cid_version)
            .option_if("hash", options.hash)
            .option_if("chunker", options.chunker)
            .option_if("raw-leaves", options.raw_leaves)
            .option("only-hash", options.only_hash)
            .option("wrap-with-directory", options.wrap_with_directory)
            .option("progress", true)
            .build();
        self.api.stream(request).await
    }

    /// Streams the contents of the file at `path`.
    pub async fn cat(&self, path: &ContentPath) -> Result<ByteStream, Error> {
        self.api.bytes(self.api.request("cat").arg(path.as_str()).build()).await
    }

    /// Streams the entries of the directory at `path`.
    pub async fn ls(&self, path: &ContentPath) -> Result<ResultStream<LsLink>, Error> {
        let request = self
            .api
            .request("ls")
            .arg(path.as_str())
            .option("stream", true)
            .build();
        let outputs = self.api.stream::<LsOutput>(request).await?;
        Ok(outputs
            .map_err(Error::from)
            .map_ok(|output| {
                let links = output.objects.into_iter().flat_map(|object| object.links);
                stream::iter(links.map(Ok::<_, Error>))
            })
            .try_flatten()
            .boxed())
    }
}

/// Consumes an `add` event stream and returns the last object it reported.
async fn root_of(mut events: ValueStream<AddEvent>) -> Result<AddedObject, Error> {
    let mut root = None;
    while let Some(event) = events.next().await {
        let event = event?;
        if let Some(cid) = event.hash {
            root = Some(AddedObject {
                name: event.name,
                cid,
                size: event.size.and_then(|size| size.parse().ok()),
            });
        }
    }
    root.ok_or_else(|| Error::unexpected("add", "reply ended without a root hash"))
}
