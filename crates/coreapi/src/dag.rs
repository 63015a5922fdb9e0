//! Linked data nodes: `dag/put`, `dag/get`, `dag/stat`.

use protocol::{Cid, ContentPath};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use transport::{Attachment, ByteStream};

use crate::{Error, HttpApi};

/// Options for [`DagApi::put`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DagPutOptions {
    /// Codec the node is stored with. Daemon default: `"dag-cbor"`.
    pub store_codec: Option<String>,
    /// Codec the uploaded bytes are written in. Daemon default: `"dag-json"`.
    pub input_codec: Option<String>,
    /// Multihash function.
    pub hash: Option<String>,
    /// Pin the stored node.
    pub pin: Option<bool>,
}

/// A CID in its linked-data JSON form, `{"/": "<cid>"}`.
#[derive(Debug, Deserialize)]
struct CidLink {
    #[serde(rename = "/")]
    cid: Cid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PutOutput {
    cid: CidLink,
}

/// Totals reported by `dag/stat`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DagStat {
    /// Combined size of every block reachable from the root.
    #[serde(default)]
    pub total_size: u64,
    /// Number of blocks reachable from the root.
    #[serde(default)]
    pub num_blocks: u64,
}

/// Linked data operations.
#[derive(Debug, Clone, Copy)]
pub struct DagApi<'a> {
    api: &'a HttpApi,
}

impl<'a> DagApi<'a> {
    pub(crate) fn new(api: &'a HttpApi) -> Self {
        Self { api }
    }

    /// Stores the encoded node in `data` and returns its CID.
    pub async fn put(&self, data: Attachment, options: DagPutOptions) -> Result<Cid, Error> {
        let request = self
            .api
            .request("dag/put")
            .attachment(data)
            .option_if("store-codec", options.store_codec)
            .option_if("input-codec", options.input_codec)
            .option_if("hash", options.hash)
            .option_if("pin", options.pin)
            .build();
        let output: PutOutput = self.api.exec(request).await?;
        Ok(output.cid.cid)
    }

    /// Streams the node at `path` encoded with `output_codec`, or the
    /// daemon's default (`"dag-json"`) when `None`.
    pub async fn get(&self, path: &ContentPath, output_codec: Option<&str>) -> Result<ByteStream, Error> {
        let request = self
            .api
            .request("dag/get")
            .arg(path.as_str())
            .option_if("output-codec", output_codec)
            .build();
        self.api.bytes(request).await
    }

    /// Fetches the node at `path` as `dag-json` and decodes it into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &ContentPath) -> Result<T, Error> {
        let request = self
            .api
            .request("dag/get")
            .arg(path.as_str())
            .option("output-codec", "dag-json")
            .build();
        self.api.exec(request).await
    }

    /// Returns the size and block count of the graph rooted at `path`.
    pub async fn stat(&self, path: &ContentPath) -> Result<DagStat, Error> {
        let request = self
            .api
            .request("dag/stat")
            .arg(path.as_str())
            .option("progress", false)
            .build();
        self.api.exec(request).await
    }
}
