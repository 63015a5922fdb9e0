//! Merkle DAG objects: `object/stat`, `object/links`, `object/data`.

use protocol::{Cid, ContentPath};
use serde::Deserialize;
use transport::ByteStream;

use crate::{null_as_default, Error, HttpApi};

/// Sizes and link count of one object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectStat {
    /// The object's CID.
    pub hash: Cid,
    /// Number of outgoing links.
    #[serde(default)]
    pub num_links: u64,
    /// Size of the encoded block.
    #[serde(default)]
    pub block_size: u64,
    /// Size of the encoded links.
    #[serde(default)]
    pub links_size: u64,
    /// Size of the data segment.
    #[serde(default)]
    pub data_size: u64,
    /// Size of the object and everything it links to.
    #[serde(default)]
    pub cumulative_size: u64,
}

/// One outgoing link of an object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectLink {
    /// Link name; empty for unnamed links.
    #[serde(default)]
    pub name: String,
    /// Target of the link.
    pub hash: Cid,
    /// Cumulative size of the target.
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LinksOutput {
    #[serde(default, deserialize_with = "null_as_default")]
    links: Vec<ObjectLink>,
}

/// Object operations.
#[derive(Debug, Clone, Copy)]
pub struct ObjectApi<'a> {
    api: &'a HttpApi,
}

impl<'a> ObjectApi<'a> {
    pub(crate) fn new(api: &'a HttpApi) -> Self {
        Self { api }
    }

    /// Returns the sizes and link count of the object at `path`.
    pub async fn stat(&self, path: &ContentPath) -> Result<ObjectStat, Error> {
        self.api
            .exec(self.api.request("object/stat").arg(path.as_str()).build())
            .await
    }

    /// Lists the outgoing links of the object at `path`.
    pub async fn links(&self, path: &ContentPath) -> Result<Vec<ObjectLink>, Error> {
        let output: LinksOutput = self
            .api
            .exec(self.api.request("object/links").arg(path.as_str()).build())
            .await?;
        Ok(output.links)
    }

    /// Streams the raw data segment of the object at `path`.
    pub async fn data(&self, path: &ContentPath) -> Result<ByteStream, Error> {
        self.api
            .bytes(self.api.request("object/data").arg(path.as_str()).build())
            .await
    }
}
