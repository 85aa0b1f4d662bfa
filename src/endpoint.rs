// SPDX-License-Identifier: AGPL-3.0-or-later

//! Parses `scheme://host:port` endpoint strings and resolves them to
//! socket addresses, preserving resolver order.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::BadEndpoint;

/// Transport scheme named by an endpoint string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Tcp,
    Udp,
    Http,
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scheme::Tcp => "tcp",
            Scheme::Udp => "udp",
            Scheme::Http => "http",
            Scheme::Https => "https",
        })
    }
}

impl Scheme {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "tcp" => Some(Scheme::Tcp),
            "udp" => Some(Scheme::Udp),
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            _ => None,
        }
    }
}

/// A parsed `scheme://host:port` endpoint, resolved to zero or more
/// stream-socket addresses. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Addresses in resolver order. May be empty if resolution failed;
    /// failure is only fatal when a consumer actually needs an address.
    pub resolved_addresses: Vec<SocketAddr>,
}

impl Endpoint {
    /// Parses `scheme://host:port`. `host` may be a dotted-quad IPv4
    /// address, a bracketed or unbracketed IPv6 address, or a DNS name.
    /// Resolution is attempted eagerly but its failure does not make
    /// parsing itself fail.
    pub fn parse(raw: &str) -> Result<Self, BadEndpoint> {
        let bad = |reason: &str| BadEndpoint {
            endpoint: raw.to_string(),
            reason: reason.to_string(),
        };

        let (scheme_str, rest) = raw.split_once("://").ok_or_else(|| bad("missing scheme://"))?;
        let scheme = Scheme::parse(scheme_str)
            .ok_or_else(|| bad("unsupported scheme (expected tcp, udp, http, https)"))?;

        let (host, port_str) = split_host_port(rest).ok_or_else(|| bad("missing :port"))?;
        let port: u16 = port_str.parse().map_err(|_| bad("port is not a valid u16"))?;

        if host.is_empty() {
            return Err(bad("empty host"));
        }
        if !is_valid_authority(host) {
            return Err(bad("host is not a valid IPv4/IPv6 address or DNS name"));
        }

        let resolved_addresses = resolve(host, port);

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            resolved_addresses,
        })
    }

    /// The first resolved address, as used by every current consumer
    /// (the source never iterates beyond the first on failure; a
    /// happy-eyeballs retry is a permitted extension, not required).
    pub fn first_address(&self) -> Option<SocketAddr> {
        self.resolved_addresses.first().copied()
    }
}

fn split_host_port(authority: &str) -> Option<(&str, &str)> {
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, rest) = rest.split_once(']')?;
        let port = rest.strip_prefix(':')?;
        return Some((host, port));
    }
    authority.rsplit_once(':')
}

fn is_valid_authority(host: &str) -> bool {
    if host.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

fn resolve(host: &str, port: u16) -> Vec<SocketAddr> {
    match (host, port).to_socket_addrs() {
        Ok(iter) => iter.collect(),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_ipv4() {
        let ep = Endpoint::parse("tcp://127.0.0.1:8080").expect("should parse");
        assert_eq!(ep.scheme, Scheme::Tcp);
        assert_eq!(ep.host, "127.0.0.1");
        assert_eq!(ep.port, 8080);
        assert_eq!(ep.resolved_addresses.first().map(|a| a.port()), Some(8080));
    }

    #[test]
    fn parses_https_dns_name() {
        let ep = Endpoint::parse("https://discovery.example.com:443").expect("should parse");
        assert_eq!(ep.scheme, Scheme::Https);
        assert_eq!(ep.host, "discovery.example.com");
        assert_eq!(ep.port, 443);
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let ep = Endpoint::parse("tcp://[::1]:9000").expect("should parse");
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.port, 9000);
    }

    #[test]
    fn rejects_unknown_scheme() {
        let err = Endpoint::parse("ftp://host:21").unwrap_err();
        assert!(err.reason.contains("scheme"));
    }

    #[test]
    fn rejects_missing_port() {
        assert!(Endpoint::parse("tcp://127.0.0.1").is_err());
    }

    #[test]
    fn rejects_malformed_string() {
        assert!(Endpoint::parse("not-an-endpoint").is_err());
    }
}
