//! Raw block storage: `block/put`, `block/get`, `block/stat`, `block/rm`.

use futures::StreamExt;
use protocol::{Cid, ContentPath};
use serde::Deserialize;
use tracing::warn;
use transport::{Attachment, ByteStream};

use crate::{Error, HttpApi};

/// Options for [`BlockApi::put`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockPutOptions {
    /// Codec of the stored block, e.g. `"raw"` or `"dag-pb"`.
    pub cid_codec: Option<String>,
    /// Multihash function.
    pub mhtype: Option<String>,
    /// Multihash length; `-1` selects the function's default.
    pub mhlen: Option<i64>,
    /// Pin the block.
    pub pin: Option<bool>,
}

/// Identity and size of a stored block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockStat {
    /// The block's CID.
    pub key: Cid,
    /// Size of the block in bytes.
    pub size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RemovedBlock {
    hash: Cid,
    #[serde(default)]
    error: String,
}

/// Block operations.
#[derive(Debug, Clone, Copy)]
pub struct BlockApi<'a> {
    api: &'a HttpApi,
}

impl<'a> BlockApi<'a> {
    pub(crate) fn new(api: &'a HttpApi) -> Self {
        Self { api }
    }

    /// Stores the bytes of `data` as one block.
    pub async fn put(&self, data: Attachment, options: BlockPutOptions) -> Result<BlockStat, Error> {
        let request = self
            .api
            .request("block/put")
            .attachment(data)
            .option_if("cid-codec", options.cid_codec)
            .option_if("mhtype", options.mhtype)
            .option_if("mhlen", options.mhlen)
            .option_if("pin", options.pin)
            .build();
        self.api.exec(request).await
    }

    /// Streams the raw bytes of the block at `path`.
    pub async fn get(&self, path: &ContentPath) -> Result<ByteStream, Error> {
        self.api
            .bytes(self.api.request("block/get").arg(path.as_str()).build())
            .await
    }

    /// Returns the identity and size of the block at `path`.
    pub async fn stat(&self, path: &ContentPath) -> Result<BlockStat, Error> {
        self.api
            .exec(self.api.request("block/stat").arg(path.as_str()).build())
            .await
    }

    /// Removes the block at `path`.
    ///
    /// The daemon answers with one entry per block; an entry carrying an
    /// error message fails the call with [`Error::BlockRemoval`].
    pub async fn rm(&self, path: &ContentPath, force: bool) -> Result<(), Error> {
        let request = self
            .api
            .request("block/rm")
            .arg(path.as_str())
            .option("force", force)
            .build();
        let mut removed = self.api.stream::<RemovedBlock>(request).await?;
        while let Some(entry) = removed.next().await {
            let entry = entry?;
            if !entry.error.is_empty() {
                warn!(cid = %entry.hash, error = %entry.error, "block removal failed");
                return Err(Error::BlockRemoval {
                    cid: entry.hash,
                    message: entry.error,
                });
            }
        }
        Ok(())
    }
}
