//! Peer connections: `swarm/peers`, `swarm/connect`, `swarm/disconnect`,
//! `swarm/addrs/local`.

use protocol::PeerId;
use serde::Deserialize;

use crate::{null_as_default, Error, HttpApi};

/// A connected peer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SwarmPeer {
    /// The remote multiaddress of the connection.
    pub addr: String,
    /// The remote peer.
    pub peer: PeerId,
    /// Round-trip estimate, e.g. `"12ms"`; empty unless requested.
    #[serde(default)]
    pub latency: String,
    /// Stream multiplexer in use; empty unless requested.
    #[serde(default)]
    pub muxer: String,
    /// `1` inbound, `2` outbound, `0` unknown.
    #[serde(default)]
    pub direction: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PeersOutput {
    #[serde(default, deserialize_with = "null_as_default")]
    peers: Vec<SwarmPeer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StringsOutput {
    #[serde(default, deserialize_with = "null_as_default")]
    strings: Vec<String>,
}

/// Swarm operations.
#[derive(Debug, Clone, Copy)]
pub struct SwarmApi<'a> {
    api: &'a HttpApi,
}

impl<'a> SwarmApi<'a> {
    pub(crate) fn new(api: &'a HttpApi) -> Self {
        Self { api }
    }

    /// Lists currently connected peers.
    pub async fn peers(&self) -> Result<Vec<SwarmPeer>, Error> {
        let output: PeersOutput = self.api.exec(self.api.request("swarm/peers").build()).await?;
        Ok(output.peers)
    }

    /// Opens a connection to the peer at multiaddress `addr`.
    pub async fn connect(&self, addr: &str) -> Result<(), Error> {
        self.api
            .exec_discard(self.api.request("swarm/connect").arg(addr).build())
            .await
    }

    /// Closes the connection to the peer at multiaddress `addr`.
    pub async fn disconnect(&self, addr: &str) -> Result<(), Error> {
        self.api
            .exec_discard(self.api.request("swarm/disconnect").arg(addr).build())
            .await
    }

    /// Lists the addresses this node listens on.
    pub async fn local_addrs(&self) -> Result<Vec<String>, Error> {
        let output: StringsOutput = self
            .api
            .exec(self.api.request("swarm/addrs/local").build())
            .await?;
        Ok(output.strings)
    }
}
