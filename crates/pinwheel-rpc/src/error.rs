//! RPC error type.

use thiserror::Error;

/// Errors surfaced by [`RpcClient`](crate::RpcClient) implementations.
#[derive(Error, Debug, Clone)]
pub enum RpcError {
    /// The calling peer is not authorized for the target method.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// The remote endpoint could not be reached.
    #[error("endpoint unavailable: {0}")]
    Unavailable(String),

    /// The call reached the remote side and failed there.
    #[error("{0}")]
    Failed(String),
}

impl RpcError {
    /// Whether this error is an authorization failure.
    ///
    /// Aggregating callers skip these silently instead of logging them as
    /// peer failures.
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}
