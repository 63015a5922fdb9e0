//! Newtype identifiers.
//!
//! Every value the daemon hands back as an opaque string with an identity is
//! represented as a distinct newtype. This prevents accidentally passing, for
//! example, a [`PeerId`] where a [`Cid`] is expected even though both are
//! strings on the wire.
//!
//! No format validation happens here: the daemon is the authority on whether a
//! CID or peer ID is well-formed.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display, AsRef<str>.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// A content identifier as printed by the daemon (e.g. `"bafy..."`, `"Qm..."`).
    Cid
}

string_id! {
    /// A libp2p peer identity.
    PeerId
}

string_id! {
    /// The name of a key in the daemon's keystore (e.g. `"self"`).
    KeyName
}

string_id! {
    /// A content path: `/ipfs/<cid>/sub/path`, `/ipns/<name>`, or a bare CID.
    ContentPath
}

impl ContentPath {
    /// Builds the immutable path `/ipfs/<cid>` for a content identifier.
    pub fn from_cid(cid: &Cid) -> Self {
        Self(format!("/ipfs/{cid}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identifiers_are_rejected() {
        assert!(Cid::new("").is_none());
        assert!(PeerId::new(String::new()).is_none());
    }

    #[test]
    fn identifiers_deserialize_from_plain_strings() {
        let cid: Cid = serde_json::from_str(r#""bafyroot""#).unwrap();
        assert_eq!(cid.as_str(), "bafyroot");
        assert_eq!(ContentPath::from_cid(&cid).to_string(), "/ipfs/bafyroot");
    }
}
