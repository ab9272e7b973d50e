//! Request and response types crossing the cluster RPC boundary.

use bytes::Bytes;
use cid::Cid;
use serde::{Deserialize, Serialize};

use crate::RpcError;

/// A pin record as tracked by the cluster pin store.
///
/// The gateway only ever reads the CID back out of it; allocation and
/// replication details stay on the cluster side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterPin {
    pub cid: Cid,
}

impl ClusterPin {
    pub fn new(cid: Cid) -> Self {
        Self { cid }
    }
}

/// A pin request addressed by IPFS path rather than CID.
///
/// `pin_update` carries the CID of an existing pin whose allocations the
/// new pin should inherit (the `pin/update` fast path).
#[derive(Debug, Clone, Default)]
pub struct PinPath {
    pub path: String,
    pub pin_update: Option<Cid>,
}

impl PinPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            pin_update: None,
        }
    }

    pub fn with_update(mut self, from: Cid) -> Self {
        self.pin_update = Some(from);
        self
    }
}

/// Secret material minted by `UidNew`. Opaque to the gateway: it is
/// marshalled back to the client exactly as the cluster produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UidSecret(pub serde_json::Value);

/// Session key returned by `UidLogin`. Opaque, like [`UidSecret`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UidKey(pub serde_json::Value);

/// Repository statistics for a single IPFS daemon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStat {
    #[serde(rename = "RepoSize")]
    pub repo_size: u64,
    #[serde(rename = "StorageMax")]
    pub storage_max: u64,
}

/// Identifier of a cluster peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Envelope for the `IPFSFilesWrite` call.
///
/// `params` is the ordered vector
/// `[uid, path, offset, create, truncate, count, raw-leaves, cid-version, hash]`;
/// empty strings mean "unspecified". The body is a buffered multipart
/// form with a single `file` part.
#[derive(Debug, Clone)]
pub struct FilesWriteRequest {
    pub content_type: String,
    pub body: Bytes,
    pub params: Vec<String>,
}

/// Options controlling a cluster add.
///
/// These mirror the options the content adder understands; the gateway
/// fills them from the `/add` query string, which is mostly compatible
/// with the daemon's own add options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddParams {
    pub name: String,
    pub layout: String,
    pub chunker: String,
    pub raw_leaves: bool,
    pub hidden: bool,
    pub wrap_with_directory: bool,
    pub shard: bool,
    pub replication_min: i64,
    pub replication_max: i64,
}

impl Default for AddParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            layout: String::new(),
            chunker: "size-262144".to_owned(),
            raw_leaves: false,
            hidden: false,
            wrap_with_directory: false,
            shard: false,
            replication_min: 0,
            replication_max: 0,
        }
    }
}

impl AddParams {
    /// Parses add options from decoded query pairs. Unrecognized keys are
    /// ignored; recognized keys with unparseable values are an error.
    pub fn from_query(pairs: &[(String, String)]) -> Result<Self, RpcError> {
        let mut params = Self::default();

        for (key, value) in pairs {
            match key.as_str() {
                "name" => params.name = value.clone(),
                "layout" => params.layout = value.clone(),
                "chunker" => params.chunker = value.clone(),
                "raw-leaves" => params.raw_leaves = parse_bool(key, value)?,
                "hidden" => params.hidden = parse_bool(key, value)?,
                "wrap-with-directory" => params.wrap_with_directory = parse_bool(key, value)?,
                "shard" => params.shard = parse_bool(key, value)?,
                "replication-min" => params.replication_min = parse_int(key, value)?,
                "replication-max" => params.replication_max = parse_int(key, value)?,
                _ => {}
            }
        }

        Ok(params)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, RpcError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(RpcError::Failed(format!(
            "parameter {key} invalid: {value}"
        ))),
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64, RpcError> {
    value
        .parse()
        .map_err(|_| RpcError::Failed(format!("parameter {key} invalid: {value}")))
}

/// One record emitted by the content adder per ingested entry.
#[derive(Debug, Clone)]
pub struct AddedOutput {
    pub name: String,
    pub cid: Cid,
    pub bytes: u64,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn add_params_defaults() {
        let params = AddParams::from_query(&[]).unwrap();
        assert_eq!(params, AddParams::default());
        assert_eq!(params.chunker, "size-262144");
    }

    #[test]
    fn add_params_recognized_options() {
        let params = AddParams::from_query(&pairs(&[
            ("name", "photos"),
            ("raw-leaves", "true"),
            ("replication-min", "2"),
            ("replication-max", "3"),
            ("chunker", "rabin"),
        ]))
        .unwrap();

        assert_eq!(params.name, "photos");
        assert!(params.raw_leaves);
        assert_eq!(params.replication_min, 2);
        assert_eq!(params.replication_max, 3);
        assert_eq!(params.chunker, "rabin");
    }

    #[test]
    fn add_params_ignores_unknown_keys() {
        let params = AddParams::from_query(&pairs(&[("progress", "true")])).unwrap();
        assert_eq!(params, AddParams::default());
    }

    #[test]
    fn add_params_rejects_bad_values() {
        assert!(AddParams::from_query(&pairs(&[("raw-leaves", "maybe")])).is_err());
        assert!(AddParams::from_query(&pairs(&[("replication-min", "two")])).is_err());
    }

    #[test]
    fn repo_stat_wire_names() {
        let stat = RepoStat {
            repo_size: 10,
            storage_max: 100,
        };
        let json = serde_json::to_value(&stat).unwrap();
        assert_eq!(json["RepoSize"], 10);
        assert_eq!(json["StorageMax"], 100);
    }
}
