//! Proxy configuration with JSON loading and environment overrides.

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Json};
use figment::Figment;
use serde::Deserialize;

use crate::addr::TcpMultiaddr;
use crate::error::ProxyError;

/// Floor hyper enforces on its per-connection read buffer.
const MIN_MAX_HEADER_BYTES: usize = 8 * 1024;

/// Configuration of the proxy server.
///
/// Read-only after [`validate`](Self::validate); the server keeps it
/// behind an `Arc` for the lifetime of the process.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Multiaddress the proxy listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Multiaddress of the IPFS daemon requests are forwarded to. May be
    /// DNS-bearing; it is resolved once at construction.
    #[serde(default = "default_node_addr")]
    pub node_addr: String,

    /// Use https toward the daemon.
    #[serde(default)]
    pub node_https: bool,

    /// Emit a request span per proxied request.
    #[serde(default)]
    pub tracing: bool,

    /// Maximum duration for reading an entire request. Zero disables it.
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub read_timeout: Duration,

    /// Maximum duration for writing a response. Zero disables it.
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub write_timeout: Duration,

    /// Maximum duration for reading request headers. Also bounds how long
    /// an idle keep-alive connection waits for its next request.
    #[serde(
        default = "default_read_header_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub read_header_timeout: Duration,

    /// Keep-alive idle limit carried in the configuration surface.
    #[serde(
        default = "default_idle_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub idle_timeout: Duration,

    /// Upper bound on request header bytes.
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            node_addr: default_node_addr(),
            node_https: false,
            tracing: false,
            read_timeout: Duration::ZERO,
            write_timeout: Duration::ZERO,
            read_header_timeout: default_read_header_timeout(),
            idle_timeout: default_idle_timeout(),
            max_header_bytes: default_max_header_bytes(),
        }
    }
}

fn default_listen_addr() -> String {
    "/ip4/127.0.0.1/tcp/9095".to_owned()
}

fn default_node_addr() -> String {
    "/ip4/127.0.0.1/tcp/5001".to_owned()
}

const fn default_read_header_timeout() -> Duration {
    Duration::from_secs(5)
}

const fn default_idle_timeout() -> Duration {
    Duration::from_secs(60)
}

const fn default_max_header_bytes() -> usize {
    16 * 1024
}

impl ProxyConfig {
    /// Loads configuration from a JSON file.
    ///
    /// Environment variables prefixed with `PINWHEEL_` override file
    /// settings.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ProxyError> {
        let figment = Figment::new()
            .merge(Json::file(path.as_ref()))
            .merge(Env::prefixed("PINWHEEL_"));

        let config: Self = figment
            .extract()
            .map_err(|e| ProxyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a JSON string (tests and embedding).
    pub fn parse(content: &str) -> Result<Self, ProxyError> {
        let config: Self = Figment::new()
            .merge(Json::string(content))
            .extract()
            .map_err(|e| ProxyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the fields have working values.
    pub fn validate(&self) -> Result<(), ProxyError> {
        let _: TcpMultiaddr = self.listen_addr.parse()?;
        let _: TcpMultiaddr = self.node_addr.parse()?;

        if self.max_header_bytes < MIN_MAX_HEADER_BYTES {
            return Err(ProxyError::Config(format!(
                "max_header_bytes must be at least {MIN_MAX_HEADER_BYTES}"
            )));
        }

        Ok(())
    }

    /// The listen multiaddress, parsed.
    pub fn listen_multiaddr(&self) -> Result<TcpMultiaddr, ProxyError> {
        self.listen_addr.parse()
    }

    /// The node multiaddress, parsed.
    pub fn node_multiaddr(&self) -> Result<TcpMultiaddr, ProxyError> {
        self.node_addr.parse()
    }

    /// Scheme used toward the daemon.
    pub fn node_scheme(&self) -> &'static str {
        if self.node_https {
            "https"
        } else {
            "http"
        }
    }
}

pub(crate) fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

/// Parses `"100ms"`, `"15s"`, `"5m"` or a bare number of seconds.
pub(crate) fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Some(stripped) = s.strip_suffix("ms") {
        let ms: u64 = stripped
            .trim()
            .parse()
            .map_err(|_| format!("invalid duration: {s}"))?;
        Ok(Duration::from_millis(ms))
    } else if let Some(stripped) = s.strip_suffix('s') {
        let secs: u64 = stripped
            .trim()
            .parse()
            .map_err(|_| format!("invalid duration: {s}"))?;
        Ok(Duration::from_secs(secs))
    } else if let Some(stripped) = s.strip_suffix('m') {
        let mins: u64 = stripped
            .trim()
            .parse()
            .map_err(|_| format!("invalid duration: {s}"))?;
        Ok(Duration::from_secs(mins * 60))
    } else {
        let secs: u64 = s.parse().map_err(|_| format!("invalid duration: {s}"))?;
        Ok(Duration::from_secs(secs))
    }
}
