//! The `repo/stat` hijack: best-effort aggregation across all peers.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use futures::future::join_all;
use http::Method;
use tracing::{debug, error};

use pinwheel_rpc::RepoStat;

use crate::handlers::{learned_headers, require_rpc, ProxyState};
use crate::ipfs::{error_response, json_response};

pub async fn repo_stat(State(state): State<Arc<ProxyState>>, method: Method) -> Response {
    let extra = learned_headers(&state, &method);
    let rpc = require_rpc!(state, extra);

    let peers = match rpc.peers().await {
        Ok(peers) => peers,
        Err(e) => return error_response(extra, e.to_string(), None),
    };

    // One in-flight call per peer; the per-peer futures are dropped (and
    // with them any pending work) when this handler returns.
    let stats = join_all(peers.iter().map(|peer| rpc.repo_stat(peer))).await;

    let mut total = RepoStat::default();
    for (peer, result) in peers.iter().zip(stats) {
        match result {
            Ok(stat) => {
                total.repo_size += stat.repo_size;
                total.storage_max += stat.storage_max;
            }
            Err(e) if e.is_authorization() => {
                debug!(%peer, error = %e, "skipping unauthorized repo/stat");
            }
            Err(e) => {
                error!(%peer, error = %e, "repo/stat errored");
            }
        }
    }

    json_response(extra, &total)
}
