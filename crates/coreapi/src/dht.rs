//! Content and peer routing: `routing/findprovs`, `routing/findpeer`,
//! `routing/provide`.
//!
//! Routing commands stream query events. Each event has a numeric type and a
//! list of peer responses; only some event types carry results:
//!
//! | Type | Meaning |
//! |------|---------|
//! | 0 | sending query |
//! | 1 | peer response |
//! | 2 | final peer (result of `findpeer`) |
//! | 3 | query error |
//! | 4 | provider (result of `findprovs`) |
//! | 5 | value |
//! | 6 | adding peer |
//! | 7 | dialing peer |

use futures::stream::{self, StreamExt, TryStreamExt};
use protocol::{ContentPath, PeerId};
use serde::Deserialize;
use tracing::debug;

use crate::{null_as_default, Error, HttpApi, ResultStream};

/// Kind of a routing query event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "i32")]
pub enum QueryEventType {
    /// A query was sent to a peer.
    SendingQuery,
    /// A peer answered with closer peers.
    PeerResponse,
    /// The peer being searched for was found.
    FinalPeer,
    /// A peer failed to answer.
    QueryError,
    /// A provider record was found.
    Provider,
    /// A value record was found.
    Value,
    /// A peer was added to the query.
    AddingPeer,
    /// A peer is being dialed.
    DialingPeer,
    /// A code this client does not know.
    Other(i32),
}

impl From<i32> for QueryEventType {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::SendingQuery,
            1 => Self::PeerResponse,
            2 => Self::FinalPeer,
            3 => Self::QueryError,
            4 => Self::Provider,
            5 => Self::Value,
            6 => Self::AddingPeer,
            7 => Self::DialingPeer,
            other => Self::Other(other),
        }
    }
}

/// A peer and the addresses it is reachable at.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeerInfo {
    /// The peer's identity.
    #[serde(rename = "ID")]
    pub id: PeerId,
    /// Known multiaddresses; may be empty.
    #[serde(rename = "Addrs", default, deserialize_with = "null_as_default")]
    pub addrs: Vec<String>,
}

/// One event of a routing query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryEvent {
    /// The peer the event concerns; empty for local events.
    #[serde(rename = "ID", default)]
    pub id: String,
    /// What happened.
    #[serde(rename = "Type")]
    pub kind: QueryEventType,
    /// Peers carried by the event.
    #[serde(rename = "Responses", default, deserialize_with = "null_as_default")]
    pub responses: Vec<PeerInfo>,
    /// Free-form detail, e.g. an error message.
    #[serde(rename = "Extra", default)]
    pub extra: String,
}

/// Routing operations.
#[derive(Debug, Clone, Copy)]
pub struct DhtApi<'a> {
    api: &'a HttpApi,
}

impl<'a> DhtApi<'a> {
    pub(crate) fn new(api: &'a HttpApi) -> Self {
        Self { api }
    }

    /// Streams peers that provide `path`, up to `limit` of them.
    pub async fn find_providers(&self, path: &ContentPath, limit: Option<u32>) -> Result<ResultStream<PeerInfo>, Error> {
        let request = self
            .api
            .request("routing/findprovs")
            .arg(path.as_str())
            .option_if("num-providers", limit)
            .build();
        let events = self.api.stream::<QueryEvent>(request).await?;
        Ok(events
            .map_err(Error::from)
            .map_ok(|event| stream::iter(providers(event).into_iter().map(Ok::<_, Error>)))
            .try_flatten()
            .boxed())
    }

    /// Looks up the addresses of `peer`.
    pub async fn find_peer(&self, peer: &PeerId) -> Result<PeerInfo, Error> {
        let request = self
            .api
            .request("routing/findpeer")
            .arg(peer.as_str())
            .build();
        let mut events = self.api.stream::<QueryEvent>(request).await?;
        while let Some(event) = events.next().await {
            if let Some(found) = final_peer(event?) {
                return Ok(found);
            }
        }
        Err(Error::unexpected("routing/findpeer", "query ended without a final peer"))
    }

    /// Announces that this node provides `path`.
    pub async fn provide(&self, path: &ContentPath, recursive: bool) -> Result<(), Error> {
        let request = self
            .api
            .request("routing/provide")
            .arg(path.as_str())
            .option("recursive", recursive)
            .build();
        let mut events = self.api.stream::<QueryEvent>(request).await?;
        while let Some(event) = events.next().await {
            let event = event?;
            if event.kind == QueryEventType::QueryError {
                debug!(peer = %event.id, error = %event.extra, "provide query error");
            }
        }
        Ok(())
    }
}

fn providers(event: QueryEvent) -> Vec<PeerInfo> {
    match event.kind {
        QueryEventType::Provider => event.responses,
        _ => Vec::new(),
    }
}

fn final_peer(event: QueryEvent) -> Option<PeerInfo> {
    match event.kind {
        QueryEventType::FinalPeer => event.responses.into_iter().next(),
        _ => None,
    }
}
