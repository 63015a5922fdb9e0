//! Daemon address discovery.
//!
//! Turns the hints a program has about where the daemon listens into a
//! concrete [`protocol::DaemonAddress`]:
//!
//! - the `IPFS_PATH` environment variable, naming the repository directory;
//! - the default repository directory, `~/.ipfs`;
//! - the repository's `api` file, holding the listener's multiaddr;
//! - an explicit address string (multiaddr, URL, or `host:port`).
//!
//! ## Architectural Layer
//!
//! **Configuration.** This is the only crate that reads the environment or
//! the filesystem. The RPC core receives one resolved address and never looks
//! for configuration on its own.
//!
//! ## Resolution order
//!
//! | Source | Used when |
//! |--------|-----------|
//! | explicit address | the caller passes one to [`parse_address`] |
//! | `$IPFS_PATH/api` | `IPFS_PATH` is set and non-empty |
//! | `~/.ipfs/api` | otherwise |

mod address;
mod errors;
mod repo;

pub use address::parse_address;
pub use errors::EndpointError;
pub use repo::{
    api_address, expand_home, resolve_local, resolve_with, API_FILE, DEFAULT_REPO_PATH,
    ENV_REPO_PATH,
};
