//! Typed operations over the daemon's command API.
//!
//! [`HttpApi`] bundles an [`HttpClient`] with a cancellation token and hands
//! out thin facades, one per capability. Each facade method builds a request,
//! sends it, and turns the decoded reply into a domain value:
//!
//! ```no_run
//! # async fn run() -> Result<(), coreapi::Error> {
//! let api = coreapi::HttpApi::local()?;
//! let version = api.version().await?;
//! let peers = api.swarm().peers().await?;
//! println!("daemon {} has {} peers", version.version, peers.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architectural Layer
//!
//! **Facades.** No HTTP detail lives here; the `transport` crate owns the
//! wire. Facades only know command names, option names, and reply shapes.
//!
//! ## Module Layout
//!
//! | Module | Commands |
//! |--------|----------|
//! | [`unixfs`] | `add`, `cat`, `ls` |
//! | [`block`] | `block/put`, `block/get`, `block/stat`, `block/rm` |
//! | [`dag`] | `dag/put`, `dag/get`, `dag/stat` |
//! | [`object`] | `object/stat`, `object/links`, `object/data` |
//! | [`pin`] | `pin/add`, `pin/ls`, `pin/rm`, `pin/update` |
//! | [`name`] | `name/publish`, `name/resolve` |
//! | [`key`] | `key/gen`, `key/list`, `key/rename`, `key/rm` |
//! | [`dht`] | `routing/findprovs`, `routing/findpeer`, `routing/provide` |
//! | [`swarm`] | `swarm/peers`, `swarm/connect`, `swarm/disconnect`, `swarm/addrs/local` |
//! | [`pubsub`] | `pubsub/pub`, `pubsub/sub`, `pubsub/ls`, `pubsub/peers` |

use futures::stream::BoxStream;
use protocol::{ApiOptions, DaemonAddress};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use transport::{ByteStream, CancellationToken, HttpClient, Request, RequestBuilder, Response, ValueStream};

pub mod block;
pub mod dag;
pub mod dht;
pub mod errors;
pub mod key;
pub mod name;
pub mod object;
pub mod pin;
pub mod pubsub;
pub mod swarm;
pub mod unixfs;

pub use block::BlockApi;
pub use dag::DagApi;
pub use dht::DhtApi;
pub use errors::Error;
pub use key::KeyApi;
pub use name::NameApi;
pub use object::ObjectApi;
pub use pin::PinApi;
pub use pubsub::PubsubApi;
pub use swarm::SwarmApi;
pub use unixfs::UnixfsApi;

/// A stream of facade results.
pub type ResultStream<T> = BoxStream<'static, Result<T, Error>>;

/// The daemon's build information (`version`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionInfo {
    /// Release version, e.g. `"0.29.0"`.
    pub version: String,
    /// Source commit the daemon was built from; empty for release builds.
    #[serde(default)]
    pub commit: String,
    /// Repository format version.
    #[serde(default)]
    pub repo: String,
    /// Target platform as `<arch>/<os>`.
    #[serde(default)]
    pub system: String,
    /// Toolchain the daemon was built with.
    #[serde(default)]
    pub golang: String,
}

/// Entry point to the daemon's typed operations.
///
/// Cheap to clone. Derived handles share the underlying transport.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: HttpClient,
    cancel: CancellationToken,
}

impl HttpApi {
    /// Connects to the daemon at `address`.
    pub fn new(address: DaemonAddress) -> Result<Self, Error> {
        Ok(Self::from_client(HttpClient::new(address)?))
    }

    /// Wraps an already configured client.
    pub fn from_client(client: HttpClient) -> Self {
        Self {
            client,
            cancel: CancellationToken::new(),
        }
    }

    /// Connects to the local daemon named by `IPFS_PATH` or the default
    /// repository.
    pub fn local() -> Result<Self, Error> {
        Self::new(endpoint::resolve_local()?)
    }

    /// Connects to the daemon whose repository lives at `repo`.
    pub fn from_repo(repo: &str) -> Result<Self, Error> {
        Self::new(endpoint::api_address(repo)?)
    }

    /// Derives a handle whose requests carry `options` on top of the current
    /// defaults.
    #[must_use]
    pub fn with_options(&self, options: ApiOptions) -> Self {
        Self {
            client: self.client.with_options(options),
            cancel: self.cancel.clone(),
        }
    }

    /// Derives a handle whose requests are aborted when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(&self, cancel: CancellationToken) -> Self {
        Self {
            client: self.client.clone(),
            cancel,
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// The token aborting this handle's requests.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Starts a request for an arbitrary command.
    pub fn request(&self, command: impl Into<String>) -> RequestBuilder {
        self.client.request(command)
    }

    /// Sends an arbitrary request under this handle's cancellation token.
    pub async fn send(&self, request: Request) -> Result<Response, Error> {
        Ok(self.client.send(request, &self.cancel).await?)
    }

    /// Returns the daemon's version information.
    pub async fn version(&self) -> Result<VersionInfo, Error> {
        self.exec(self.request("version").build()).await
    }

    /// File import and retrieval.
    pub fn unixfs(&self) -> UnixfsApi<'_> {
        UnixfsApi::new(self)
    }

    /// Raw block storage.
    pub fn block(&self) -> BlockApi<'_> {
        BlockApi::new(self)
    }

    /// Linked data nodes.
    pub fn dag(&self) -> DagApi<'_> {
        DagApi::new(self)
    }

    /// Merkle DAG objects.
    pub fn object(&self) -> ObjectApi<'_> {
        ObjectApi::new(self)
    }

    /// Pinning.
    pub fn pin(&self) -> PinApi<'_> {
        PinApi::new(self)
    }

    /// Name publishing and resolution.
    pub fn name(&self) -> NameApi<'_> {
        NameApi::new(self)
    }

    /// Keystore management.
    pub fn key(&self) -> KeyApi<'_> {
        KeyApi::new(self)
    }

    /// Content and peer routing.
    pub fn dht(&self) -> DhtApi<'_> {
        DhtApi::new(self)
    }

    /// Peer connections.
    pub fn swarm(&self) -> SwarmApi<'_> {
        SwarmApi::new(self)
    }

    /// Publish/subscribe messaging.
    pub fn pubsub(&self) -> PubsubApi<'_> {
        PubsubApi::new(self)
    }

    // -- helpers shared by the facades --------------------------------------

    /// Sends `request` and decodes one value.
    pub(crate) async fn exec<T: DeserializeOwned>(&self, request: Request) -> Result<T, Error> {
        Ok(self.send(request).await?.decode_one().await?)
    }

    /// Sends `request` and drains the reply, keeping only failures.
    pub(crate) async fn exec_discard(&self, request: Request) -> Result<(), Error> {
        Ok(self.send(request).await?.discard().await?)
    }

    /// Sends `request` and decodes the reply as a stream of values.
    pub(crate) async fn stream<T>(&self, request: Request) -> Result<ValueStream<T>, Error>
    where
        T: DeserializeOwned + Send + 'static,
    {
        Ok(self.send(request).await?.decode_stream())
    }

    /// Sends `request` and exposes the raw reply.
    pub(crate) async fn bytes(&self, request: Request) -> Result<ByteStream, Error> {
        Ok(self.send(request).await?.bytes_stream())
    }
}

/// Deserialises a JSON `null` or missing field as an empty collection.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
