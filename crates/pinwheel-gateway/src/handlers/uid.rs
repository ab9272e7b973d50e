//! Uid endpoint hijacks: `uid/new` and `uid/login`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Response;
use http::{Method, Uri};
use uuid::Uuid;

use crate::handlers::{learned_headers, require_rpc, uid_spawn, ProxyState, QueryArgs};
use crate::ipfs::{error_response, json_response};

pub async fn uid_new(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let extra = learned_headers(&state, &method);
    let args = QueryArgs(pairs);

    // Callers may name the identity; otherwise mint a random one.
    let name = match args.get("uid") {
        Some(uid) if !uid.is_empty() => uid.to_owned(),
        _ => format!("uid-{}", Uuid::new_v4()),
    };

    let rpc = require_rpc!(state, extra);

    let secret = match rpc.uid_new(&name).await {
        Ok(secret) => secret,
        Err(e) => return error_response(extra, e.to_string(), None),
    };

    // The fresh uid gets its filesystem namespace right away.
    if let Err(e) = uid_spawn(&rpc, &name).await {
        return error_response(extra, e.to_string(), None);
    }

    json_response(extra, &secret)
}

pub async fn uid_login(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let extra = learned_headers(&state, &method);
    let args = QueryArgs(pairs);

    let uid = match args.get("uid") {
        Some(uid) if !uid.is_empty() => uid,
        _ => return error_response(extra, format!("error reading request: {uri}"), None),
    };
    let hash = args.get("hash").unwrap_or_default();

    let rpc = require_rpc!(state, extra);

    match rpc.uid_login(uid, hash).await {
        Ok(key) => json_response(extra, &key),
        Err(e) => error_response(extra, e.to_string(), None),
    }
}
