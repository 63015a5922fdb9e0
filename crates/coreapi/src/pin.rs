//! Pinning: `pin/add`, `pin/ls`, `pin/rm`, `pin/update`.

use protocol::{Cid, ContentPath};
use serde::Deserialize;
use transport::ValueStream;

use crate::{null_as_default, Error, HttpApi};

/// Which pins `pin/ls` lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinType {
    /// Every pin.
    #[default]
    All,
    /// Objects pinned on their own.
    Direct,
    /// Objects kept alive by a recursive pin above them.
    Indirect,
    /// Roots pinned together with everything below them.
    Recursive,
}

impl PinType {
    /// The value of the `type` option.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Direct => "direct",
            Self::Indirect => "indirect",
            Self::Recursive => "recursive",
        }
    }
}

/// One pinned object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PinEntry {
    /// The pinned object.
    pub cid: Cid,
    /// `"direct"`, `"indirect"`, `"recursive"`, or an indirect pin's origin.
    #[serde(rename = "Type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PinsOutput {
    #[serde(default, deserialize_with = "null_as_default")]
    pins: Vec<Cid>,
}

/// Pin operations.
#[derive(Debug, Clone, Copy)]
pub struct PinApi<'a> {
    api: &'a HttpApi,
}

impl<'a> PinApi<'a> {
    pub(crate) fn new(api: &'a HttpApi) -> Self {
        Self { api }
    }

    /// Pins `path`, returning the pinned CIDs.
    pub async fn add(&self, path: &ContentPath, recursive: bool) -> Result<Vec<Cid>, Error> {
        let request = self
            .api
            .request("pin/add")
            .arg(path.as_str())
            .option("recursive", recursive)
            .build();
        let output: PinsOutput = self.api.exec(request).await?;
        Ok(output.pins)
    }

    /// Streams the pins of kind `kind`.
    pub async fn ls(&self, kind: PinType) -> Result<ValueStream<PinEntry>, Error> {
        let request = self
            .api
            .request("pin/ls")
            .option("type", kind.as_str())
            .option("stream", true)
            .build();
        self.api.stream(request).await
    }

    /// Unpins `path`, returning the unpinned CIDs.
    pub async fn rm(&self, path: &ContentPath, recursive: bool) -> Result<Vec<Cid>, Error> {
        let request = self
            .api
            .request("pin/rm")
            .arg(path.as_str())
            .option("recursive", recursive)
            .build();
        let output: PinsOutput = self.api.exec(request).await?;
        Ok(output.pins)
    }

    /// Moves a recursive pin from `from` to `to`, keeping `from` pinned
    /// unless `unpin` is set.
    pub async fn update(&self, from: &ContentPath, to: &ContentPath, unpin: bool) -> Result<(), Error> {
        let request = self
            .api
            .request("pin/update")
            .arg(from.as_str())
            .arg(to.as_str())
            .option("unpin", unpin)
            .build();
        self.api.exec_discard(request).await
    }
}
