//! Gateway error types.

use thiserror::Error;

/// Errors raised while constructing or running the proxy.
///
/// Request-level failures never surface through this type; they are
/// written to the client in the daemon's `{"Message": …}` shape by the
/// handlers themselves.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid multiaddress {addr}: {reason}")]
    Addr { addr: String, reason: String },

    #[error("resolving {0} timed out")]
    ResolveTimeout(String),

    #[error("{0} did not resolve to any address")]
    ResolveEmpty(String),

    #[error("upstream URL error: {0}")]
    UpstreamUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
