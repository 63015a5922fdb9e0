//! Address string parsing.
//!
//! The daemon writes its API listener into the `api` file as a multiaddr
//! (`/ip4/127.0.0.1/tcp/5001`). Users also pass URLs and `host:port` pairs,
//! so all three forms are accepted.

use std::net::{Ipv4Addr, Ipv6Addr};

use protocol::{DaemonAddress, Scheme};
use url::{Host, Url};

use crate::EndpointError;

/// Parses a multiaddr, URL, or `host:port` into a [`DaemonAddress`].
///
/// Supported multiaddrs are `/ip4`, `/ip6`, `/dns`, `/dns4` and `/dns6`
/// followed by `/tcp/<port>`, optionally ending in `/http`, `/https` or
/// `/tls/http`. Anything else (UDP, unix sockets, p2p circuits) is rejected.
pub fn parse_address(text: &str) -> Result<DaemonAddress, EndpointError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(EndpointError::invalid(text, "address is empty"));
    }
    if text.starts_with('/') {
        parse_multiaddr(text)
    } else if text.contains("://") {
        parse_url(text, text)
    } else {
        parse_url(&format!("http://{text}"), text)
    }
}

fn parse_multiaddr(text: &str) -> Result<DaemonAddress, EndpointError> {
    let mut components = text.split('/').filter(|c| !c.is_empty());

    let host = match (components.next(), components.next()) {
        (Some("ip4"), Some(value)) => value
            .parse::<Ipv4Addr>()
            .map_err(|e| EndpointError::invalid(text, format!("bad ip4 address: {e}")))?
            .to_string(),
        (Some("ip6"), Some(value)) => value
            .parse::<Ipv6Addr>()
            .map_err(|e| EndpointError::invalid(text, format!("bad ip6 address: {e}")))?
            .to_string(),
        (Some("dns" | "dns4" | "dns6"), Some(value)) => value.to_string(),
        (Some(protocol), Some(_)) => {
            return Err(EndpointError::invalid(
                text,
                format!("unsupported network protocol '{protocol}'"),
            ))
        }
        _ => return Err(EndpointError::invalid(text, "missing network component")),
    };

    let port = match (components.next(), components.next()) {
        (Some("tcp"), Some(value)) => value
            .parse::<u16>()
            .map_err(|e| EndpointError::invalid(text, format!("bad tcp port: {e}")))?,
        (Some("tcp"), None) => return Err(EndpointError::invalid(text, "missing tcp port")),
        (Some(protocol), _) => {
            return Err(EndpointError::invalid(
                text,
                format!("unsupported transport '{protocol}'; only tcp is supported"),
            ))
        }
        (None, _) => return Err(EndpointError::invalid(text, "missing /tcp/<port>")),
    };

    let remainder: Vec<&str> = components.collect();
    let scheme = match remainder.as_slice() {
        [] | ["http"] => Scheme::Http,
        ["https"] | ["tls", "http"] => Scheme::Https,
        other => {
            return Err(EndpointError::invalid(
                text,
                format!("unsupported trailing components '/{}'", other.join("/")),
            ))
        }
    };

    Ok(DaemonAddress::new(host, port).with_scheme(scheme))
}

fn parse_url(url_text: &str, original: &str) -> Result<DaemonAddress, EndpointError> {
    let url = Url::parse(url_text).map_err(|e| EndpointError::invalid(original, e.to_string()))?;

    let scheme = match url.scheme() {
        "http" => Scheme::Http,
        "https" => Scheme::Https,
        other => {
            return Err(EndpointError::invalid(
                original,
                format!("unsupported scheme '{other}'"),
            ))
        }
    };
    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        None => return Err(EndpointError::invalid(original, "missing host")),
    };
    let port = url
        .port_or_known_default()
        .ok_or_else(|| EndpointError::invalid(original, "missing port"))?;

    Ok(DaemonAddress::new(host, port).with_scheme(scheme))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("/ip4/127.0.0.1/tcp/5001", Scheme::Http, "127.0.0.1", 5001)]
    #[case("/ip4/10.0.0.2/tcp/80/http", Scheme::Http, "10.0.0.2", 80)]
    #[case("/ip6/::1/tcp/5001", Scheme::Http, "::1", 5001)]
    #[case("/dns4/node.example/tcp/443/https", Scheme::Https, "node.example", 443)]
    #[case("/dns/node.example/tcp/443/tls/http", Scheme::Https, "node.example", 443)]
    #[case("/ip4/127.0.0.1/tcp/5001/", Scheme::Http, "127.0.0.1", 5001)]
    #[case("http://localhost:5001", Scheme::Http, "localhost", 5001)]
    #[case("https://[::1]:8443", Scheme::Https, "::1", 8443)]
    #[case("https://gateway.example", Scheme::Https, "gateway.example", 443)]
    #[case("127.0.0.1:5001", Scheme::Http, "127.0.0.1", 5001)]
    #[case("  /ip4/127.0.0.1/tcp/5001\n", Scheme::Http, "127.0.0.1", 5001)]
    fn accepted_addresses(
        #[case] text: &str,
        #[case] scheme: Scheme,
        #[case] host: &str,
        #[case] port: u16,
    ) {
        let address = parse_address(text).unwrap();
        assert_eq!(address.scheme, scheme);
        assert_eq!(address.host, host);
        assert_eq!(address.port, port);
    }

    #[rstest]
    #[case("")]
    #[case("/ip4/999.0.0.1/tcp/5001")]
    #[case("/ip4/127.0.0.1/udp/5001")]
    #[case("/ip4/127.0.0.1/tcp/notaport")]
    #[case("/ip4/127.0.0.1")]
    #[case("/unix/tmp/api.sock")]
    #[case("/ip4/127.0.0.1/tcp/5001/ws")]
    #[case("ftp://localhost:21")]
    fn rejected_addresses(#[case] text: &str) {
        assert!(matches!(
            parse_address(text),
            Err(EndpointError::InvalidAddress { .. })
        ));
    }
}
