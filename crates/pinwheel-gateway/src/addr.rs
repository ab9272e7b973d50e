//! Multiaddress handling for the listener and the upstream node.
//!
//! The proxy only ever dials TCP, so this supports the TCP shapes of a
//! multiaddress (`/ip4/…/tcp/…`, `/ip6/…/tcp/…`, `/dns/…/tcp/…` and the
//! family-pinned `dns4`/`dns6` variants). DNS-bearing addresses are
//! resolved once, at construction time, with a bounded timeout.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ProxyError;

/// Timeout applied when resolving DNS multiaddresses at boot.
pub const DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Host component of a TCP multiaddress.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Host {
    Ip(IpAddr),
    /// DNS name plus an optional address-family restriction.
    Dns { name: String, family: DnsFamily },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DnsFamily {
    Any,
    V4,
    V6,
}

/// A TCP multiaddress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpMultiaddr {
    host: Host,
    port: u16,
    original: String,
}

impl FromStr for TcpMultiaddr {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| ProxyError::Addr {
            addr: s.to_owned(),
            reason: reason.to_owned(),
        };

        let mut parts = s.strip_prefix('/').ok_or_else(|| err("missing leading /"))?.split('/');

        let proto = parts.next().ok_or_else(|| err("empty address"))?;
        let host_str = parts.next().ok_or_else(|| err("missing host"))?;

        let host = match proto {
            "ip4" => Host::Ip(
                host_str
                    .parse::<std::net::Ipv4Addr>()
                    .map_err(|_| err("invalid IPv4 address"))?
                    .into(),
            ),
            "ip6" => Host::Ip(
                host_str
                    .parse::<std::net::Ipv6Addr>()
                    .map_err(|_| err("invalid IPv6 address"))?
                    .into(),
            ),
            "dns" | "dns4" | "dns6" => {
                if host_str.is_empty() {
                    return Err(err("empty DNS name"));
                }
                let family = match proto {
                    "dns4" => DnsFamily::V4,
                    "dns6" => DnsFamily::V6,
                    _ => DnsFamily::Any,
                };
                Host::Dns {
                    name: host_str.to_owned(),
                    family,
                }
            }
            other => return Err(err(&format!("unsupported protocol {other}"))),
        };

        match parts.next() {
            Some("tcp") => {}
            _ => return Err(err("expected /tcp/<port>")),
        }
        let port = parts
            .next()
            .ok_or_else(|| err("missing port"))?
            .parse::<u16>()
            .map_err(|_| err("invalid port"))?;

        if parts.next().is_some() {
            return Err(err("trailing protocol components"));
        }

        Ok(Self {
            host,
            port,
            original: s.to_owned(),
        })
    }
}

impl std::fmt::Display for TcpMultiaddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.original)
    }
}

impl TcpMultiaddr {
    /// Whether this address needs DNS resolution before dialing.
    pub fn is_dns(&self) -> bool {
        matches!(self.host, Host::Dns { .. })
    }

    /// The TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolves this address to a dialable socket address.
    ///
    /// IP-literal addresses resolve immediately. DNS addresses are looked
    /// up with `timeout`, honoring the `dns4`/`dns6` family restriction,
    /// and the first candidate wins.
    pub async fn resolve(&self, timeout: Duration) -> Result<SocketAddr, ProxyError> {
        match &self.host {
            Host::Ip(ip) => Ok(SocketAddr::new(*ip, self.port)),
            Host::Dns { name, family } => {
                let lookup = tokio::net::lookup_host((name.as_str(), self.port));
                let addrs = tokio::time::timeout(timeout, lookup)
                    .await
                    .map_err(|_| ProxyError::ResolveTimeout(self.original.clone()))??;

                let family = *family;
                addrs
                    .into_iter()
                    .find(|addr| match family {
                        DnsFamily::Any => true,
                        DnsFamily::V4 => addr.is_ipv4(),
                        DnsFamily::V6 => addr.is_ipv6(),
                    })
                    .ok_or_else(|| ProxyError::ResolveEmpty(self.original.clone()))
            }
        }
    }
}
