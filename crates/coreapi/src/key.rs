//! Keystore: `key/gen`, `key/list`, `key/rename`, `key/rm`.

use protocol::{KeyName, PeerId};
use serde::Deserialize;

use crate::{null_as_default, Error, HttpApi};

/// Key algorithms the daemon can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Ed25519 signing key.
    Ed25519,
    /// RSA key of configurable size.
    Rsa,
}

impl KeyType {
    /// The name the daemon expects for this algorithm.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::Rsa => "rsa",
        }
    }
}

/// Options for [`KeyApi::generate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyGenOptions {
    /// Algorithm. Daemon default: Ed25519.
    pub key_type: Option<KeyType>,
    /// Key size in bits. Only meaningful for RSA.
    pub size: Option<u32>,
}

/// A named key and the peer ID it derives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyInfo {
    /// The key's name in the keystore.
    #[serde(rename = "Name")]
    pub name: KeyName,
    /// The peer ID derived from the public key.
    #[serde(rename = "Id")]
    pub id: PeerId,
}

/// The outcome of [`KeyApi::rename`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenamedKey {
    /// The old name.
    #[serde(rename = "Was")]
    pub was: KeyName,
    /// The new name.
    #[serde(rename = "Now")]
    pub now: KeyName,
    /// The peer ID of the renamed key.
    #[serde(rename = "Id")]
    pub id: PeerId,
    /// Whether an existing key named `now` was replaced.
    #[serde(rename = "Overwrite", default)]
    pub overwrite: bool,
}

#[derive(Debug, Deserialize)]
struct KeyList {
    #[serde(rename = "Keys", default, deserialize_with = "null_as_default")]
    keys: Vec<KeyInfo>,
}

/// Key operations.
#[derive(Debug, Clone, Copy)]
pub struct KeyApi<'a> {
    api: &'a HttpApi,
}

impl<'a> KeyApi<'a> {
    pub(crate) fn new(api: &'a HttpApi) -> Self {
        Self { api }
    }

    /// Creates a key called `name`.
    pub async fn generate(&self, name: &KeyName, options: KeyGenOptions) -> Result<KeyInfo, Error> {
        let request = self
            .api
            .request("key/gen")
            .arg(name.as_str())
            .option_if("type", options.key_type.map(KeyType::as_str))
            .option_if("size", options.size)
            .build();
        self.api.exec(request).await
    }

    /// Lists every key in the keystore.
    pub async fn list(&self) -> Result<Vec<KeyInfo>, Error> {
        let list: KeyList = self.api.exec(self.api.request("key/list").build()).await?;
        Ok(list.keys)
    }

    /// Renames key `old` to `new`, replacing an existing `new` if `force`.
    pub async fn rename(&self, old: &KeyName, new: &KeyName, force: bool) -> Result<RenamedKey, Error> {
        let request = self
            .api
            .request("key/rename")
            .arg(old.as_str())
            .arg(new.as_str())
            .option("force", force)
            .build();
        self.api.exec(request).await
    }

    /// Deletes key `name` and returns what was removed.
    pub async fn remove(&self, name: &KeyName) -> Result<KeyInfo, Error> {
        let list: KeyList = self
            .api
            .exec(self.api.request("key/rm").arg(name.as_str()).build())
            .await?;
        list.keys
            .into_iter()
            .next()
            .ok_or_else(|| Error::unexpected("key/rm", "reply listed no removed key"))
    }
}
