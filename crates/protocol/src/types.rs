//! Shared value types for the daemon wire protocol.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! behaviour that the RPC core depends on: how an address renders into a base
//! URL, how an option value serialises into a query string, and how
//! client-wide defaults merge.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Wire constants
// ---------------------------------------------------------------------------

/// Path prefix every command is mounted under.
pub const API_PREFIX: &str = "/api/v0";

/// Query key used for each positional argument, repeated in order.
pub const ARGUMENT_KEY: &str = "arg";

/// Trailer the daemon sets when a streaming reply fails after its headers were sent.
pub const STREAM_ERROR_TRAILER: &str = "X-Stream-Error";

/// Header marking a reply as a stream of values.
pub const STREAM_OUTPUT_HEADER: &str = "X-Stream-Output";

/// Header marking a reply as raw chunked output.
pub const CHUNKED_OUTPUT_HEADER: &str = "X-Chunked-Output";

// ---------------------------------------------------------------------------
// Daemon address
// ---------------------------------------------------------------------------

/// URL scheme used to reach the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain HTTP; the daemon's default.
    #[default]
    Http,
    /// HTTP over TLS.
    Https,
}

impl Scheme {
    /// Returns the scheme as it appears in a URL.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network location of the daemon's API listener.
///
/// Resolved once at client construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DaemonAddress {
    /// URL scheme.
    pub scheme: Scheme,
    /// Host name or IP literal (IPv6 without brackets).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl DaemonAddress {
    /// Creates a plain-HTTP address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: Scheme::Http,
            host: host.into(),
            port,
        }
    }

    /// Returns a copy of this address with a different scheme.
    #[must_use]
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Renders `<scheme>://<host>:<port>` with IPv6 literals bracketed.
    pub fn origin(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => format!("{}://[{}]:{}", self.scheme, self.host, self.port),
            _ => format!("{}://{}:{}", self.scheme, self.host, self.port),
        }
    }

    /// Renders the base URL commands are appended to: `<origin>/api/v0/`.
    pub fn api_base(&self) -> String {
        format!("{}{API_PREFIX}/", self.origin())
    }
}

impl std::fmt::Display for DaemonAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.origin())
    }
}

// ---------------------------------------------------------------------------
// Option values
// ---------------------------------------------------------------------------

/// A typed scalar option value.
///
/// Rendered into the query string by [`OptionValue::to_query_value`];
/// booleans become `"true"` / `"false"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// A string option.
    String(String),
    /// A boolean flag.
    Bool(bool),
    /// A signed integer option.
    Int(i64),
    /// An unsigned integer option (sizes, counts).
    UInt(u64),
}

impl OptionValue {
    /// Returns the value as it appears on the right-hand side of `name=value`.
    pub fn to_query_value(&self) -> String {
        match self {
            Self::String(value) => value.clone(),
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::UInt(value) => value.to_string(),
        }
    }
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_query_value())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<u64> for OptionValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<usize> for OptionValue {
    fn from(value: usize) -> Self {
        Self::UInt(value as u64)
    }
}

// ---------------------------------------------------------------------------
// Client-wide defaults
// ---------------------------------------------------------------------------

/// Options applied to every request a client issues.
///
/// Attached to a client at construction or derivation time. Call-site options
/// always take precedence over these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiOptions {
    /// Run commands without touching the network (`offline=true`).
    ///
    /// `None` leaves the daemon's own default in effect.
    pub offline: Option<bool>,
}

impl ApiOptions {
    /// Returns options with `offline` set.
    #[must_use]
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = Some(offline);
        self
    }

    /// Layers `newer` on top of `self`: fields `newer` sets win, fields it
    /// leaves unset are inherited.
    #[must_use]
    pub fn merge(self, newer: Self) -> Self {
        Self {
            offline: newer.offline.or(self.offline),
        }
    }

    /// Returns the options as `name → value` pairs, omitting unset fields.
    pub fn to_options(self) -> BTreeMap<String, OptionValue> {
        let mut options = BTreeMap::new();
        if let Some(offline) = self.offline {
            options.insert("offline".to_string(), OptionValue::Bool(offline));
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(OptionValue::from(true), "true")]
    #[case(OptionValue::from(false), "false")]
    #[case(OptionValue::from(-3_i64), "-3")]
    #[case(OptionValue::from(1_u64 << 40), "1099511627776")]
    #[case(OptionValue::from("sha2-256"), "sha2-256")]
    fn option_values_render_for_the_query_string(
        #[case] value: OptionValue,
        #[case] expected: &str,
    ) {
        assert_eq!(value.to_query_value(), expected);
    }

    #[rstest]
    #[case(DaemonAddress::new("127.0.0.1", 5001), "http://127.0.0.1:5001/api/v0/")]
    #[case(DaemonAddress::new("::1", 5001), "http://[::1]:5001/api/v0/")]
    #[case(
        DaemonAddress::new("node.example", 443).with_scheme(Scheme::Https),
        "https://node.example:443/api/v0/"
    )]
    fn api_base_renders_origin_and_prefix(#[case] address: DaemonAddress, #[case] expected: &str) {
        assert_eq!(address.api_base(), expected);
    }

    #[test]
    fn merge_prefers_newer_settings_and_inherits_unset_ones() {
        let base = ApiOptions::default().offline(true);

        assert_eq!(base.merge(ApiOptions::default()).offline, Some(true));
        assert_eq!(base.merge(ApiOptions::default().offline(false)).offline, Some(false));
    }

    #[test]
    fn unset_options_produce_no_pairs() {
        assert!(ApiOptions::default().to_options().is_empty());
        assert_eq!(
            ApiOptions::default().offline(true).to_options().get("offline"),
            Some(&OptionValue::Bool(true))
        );
    }
}
