//! Mutable names: `name/publish`, `name/resolve`.

use protocol::{ContentPath, KeyName};
use serde::Deserialize;

use crate::{Error, HttpApi};

/// Options for [`NameApi::publish`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Key to publish under. Daemon default: `self`.
    pub key: Option<KeyName>,
    /// Record validity, e.g. `"24h"`.
    pub lifetime: Option<String>,
    /// Cache hint for resolvers, e.g. `"1m"`.
    pub ttl: Option<String>,
    /// Resolve `path` before publishing.
    pub resolve: Option<bool>,
    /// Publish even when the node is offline.
    pub allow_offline: Option<bool>,
}

/// Options for [`NameApi::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Follow names that point at other names.
    pub recursive: bool,
    /// Skip the daemon's name cache.
    pub nocache: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            nocache: false,
        }
    }
}

/// A published name and the path it points to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NameEntry {
    /// The published name, as an IPNS identifier.
    pub name: String,
    /// The path the name now points to.
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResolveOutput {
    path: String,
}

/// Name operations.
#[derive(Debug, Clone, Copy)]
pub struct NameApi<'a> {
    api: &'a HttpApi,
}

impl<'a> NameApi<'a> {
    pub(crate) fn new(api: &'a HttpApi) -> Self {
        Self { api }
    }

    /// Points a name at `path`.
    pub async fn publish(&self, path: &ContentPath, options: PublishOptions) -> Result<NameEntry, Error> {
        let request = self
            .api
            .request("name/publish")
            .arg(path.as_str())
            .option_if("key", options.key.map(|key| key.to_string()))
            .option_if("lifetime", options.lifetime)
            .option_if("ttl", options.ttl)
            .option_if("resolve", options.resolve)
            .option_if("allow-offline", options.allow_offline)
            .build();
        self.api.exec(request).await
    }

    /// Resolves `name` to the path it currently points at.
    pub async fn resolve(&self, name: &str, options: ResolveOptions) -> Result<String, Error> {
        let request = self
            .api
            .request("name/resolve")
            .arg(name)
            .option("recursive", options.recursive)
            .option("nocache", options.nocache)
            .build();
        let output: ResolveOutput = self.api.exec(request).await?;
        Ok(output.path)
    }
}
