//! The RPC capability handed to the gateway.

use async_trait::async_trait;
use cid::Cid;

use crate::types::{
    ClusterPin, FilesWriteRequest, PeerId, PinPath, RepoStat, UidKey, UidSecret,
};
use crate::RpcResult;

/// Calls the gateway issues against the rest of the cluster.
///
/// Methods are grouped by the component that serves them: the cluster
/// pin/uid service, the IPFS connector, and the consensus layer. A call
/// that does not take an explicit deadline inherits none; callers decide
/// whether to wrap it in a timeout.
#[async_trait]
pub trait RpcClient: Send + Sync {
    // --- Cluster ---

    /// Pin the content behind an IPFS path. Returns the created pin.
    async fn pin_path(&self, pin: PinPath) -> RpcResult<ClusterPin>;

    /// Unpin the content behind an IPFS path. Returns the removed pin.
    async fn unpin_path(&self, pin: PinPath) -> RpcResult<ClusterPin>;

    /// Unpin a CID directly.
    async fn unpin(&self, cid: Cid) -> RpcResult<ClusterPin>;

    /// Look up the pin record for a CID. Errors when not pinned.
    async fn pin_get(&self, cid: Cid) -> RpcResult<ClusterPin>;

    /// List every pin tracked by the cluster.
    async fn pins(&self) -> RpcResult<Vec<ClusterPin>>;

    /// Mint a new uid and its secret material.
    async fn uid_new(&self, name: &str) -> RpcResult<UidSecret>;

    /// Exchange uid (and optional hash) for a session key.
    async fn uid_login(&self, uid: &str, hash: &str) -> RpcResult<UidKey>;

    /// Fetch content as the daemon's `get` would return it
    /// (args: `[path, output, archive, compress, compression-level]`).
    async fn file_get(&self, args: Vec<String>) -> RpcResult<Vec<u8>>;

    /// Copy within a uid's mutable filesystem (`[uid, source, dest]`).
    async fn files_cp(&self, args: Vec<String>) -> RpcResult<()>;

    /// Flush a path of a uid's mutable filesystem (`[uid, path]`).
    async fn files_flush(&self, args: Vec<String>) -> RpcResult<()>;

    /// List a directory of a uid's mutable filesystem (`[uid, path]`).
    async fn files_ls(&self, args: Vec<String>) -> RpcResult<serde_json::Value>;

    /// Create a directory (`[uid, path, parents]`).
    async fn files_mkdir(&self, args: Vec<String>) -> RpcResult<()>;

    /// Move an entry (`[uid, source, dest]`).
    async fn files_mv(&self, args: Vec<String>) -> RpcResult<()>;

    /// Read file bytes (`[uid, path, offset, count]`).
    async fn files_read(&self, args: Vec<String>) -> RpcResult<Vec<u8>>;

    /// Remove an entry (`[uid, path, recursive]`).
    async fn files_rm(&self, args: Vec<String>) -> RpcResult<()>;

    /// Stat an entry (`[uid, path, format, hash, size, with-local]`).
    async fn files_stat(&self, args: Vec<String>) -> RpcResult<serde_json::Value>;

    /// Write a file from a buffered multipart envelope.
    async fn files_write(&self, req: FilesWriteRequest) -> RpcResult<()>;

    // --- IPFS connector ---

    /// Resolve an IPFS path to its CID.
    async fn resolve(&self, path: &str) -> RpcResult<Cid>;

    /// Repository statistics of one peer's IPFS daemon.
    async fn repo_stat(&self, peer: &PeerId) -> RpcResult<RepoStat>;

    // --- Consensus ---

    /// The current cluster peer set.
    async fn peers(&self) -> RpcResult<Vec<PeerId>>;
}
