//! RPC surface between the pinwheel gateway and the rest of the cluster.
//!
//! The gateway never talks to the pin store, the consensus layer or the
//! IPFS connector directly; it holds an [`RpcClient`] capability that the
//! enclosing cluster peer installs once its own RPC plumbing is ready.
//! This crate defines that capability and the request/response types that
//! cross it.

mod client;
mod error;
mod types;

pub use client::RpcClient;
pub use error::RpcError;
pub use types::{
    AddParams, AddedOutput, ClusterPin, FilesWriteRequest, PeerId, PinPath, RepoStat, UidKey,
    UidSecret,
};

/// Convenience alias used throughout the gateway.
pub type RpcResult<T> = Result<T, RpcError>;
