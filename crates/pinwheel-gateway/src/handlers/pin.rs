//! Pin endpoint hijacks: `pin/add`, `pin/rm`, `pin/ls`, `pin/update`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use http::{Method, StatusCode};
use tracing::warn;

use pinwheel_rpc::PinPath;

use crate::handlers::{learned_headers, require_rpc, ProxyState, QueryArgs};
use crate::ipfs::{
    decode_cid, error_response, json_response, IpfsPath, PinLsResponse, PinOpResponse,
    PinTypeEntry,
};

/// Which side of the pin/unpin template is running.
#[derive(Debug, Clone, Copy)]
enum PinAction {
    Pin,
    Unpin,
}

pub async fn pin_add(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    pin_op(state, method, QueryArgs(pairs), PinAction::Pin).await
}

pub async fn pin_rm(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    pin_op(state, method, QueryArgs(pairs), PinAction::Unpin).await
}

pub async fn pin_add_slash(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    Path(arg): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    pin_op(state, method, slash_args(pairs, arg), PinAction::Pin).await
}

pub async fn pin_rm_slash(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    Path(arg): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    pin_op(state, method, slash_args(pairs, arg), PinAction::Unpin).await
}

pub async fn pin_ls_slash(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    Path(arg): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    pin_ls_inner(state, method, slash_args(pairs, arg)).await
}

/// Converts a trailing-path-argument request into the canonical `?arg=`
/// form. Clients doing this are using an undocumented API shape.
fn slash_args(pairs: Vec<(String, String)>, arg: String) -> QueryArgs {
    warn!(
        "You are using an undocumented form of the IPFS API. Consider passing \
         your command arguments with the '?arg=' query parameter"
    );
    let mut args = QueryArgs(pairs);
    args.set("arg", arg);
    args
}

async fn pin_op(
    state: Arc<ProxyState>,
    method: Method,
    args: QueryArgs,
    action: PinAction,
) -> Response {
    let extra = learned_headers(&state, &method);

    let arg = args.owned("arg");
    let path = match IpfsPath::parse(&arg) {
        Ok(path) => path,
        Err(e) => {
            return error_response(extra, format!("Error parsing IPFS Path: {e}"), None);
        }
    };

    let rpc = require_rpc!(state, extra);
    let pin_path = PinPath::new(path.as_str());
    let result = match action {
        PinAction::Pin => rpc.pin_path(pin_path).await,
        PinAction::Unpin => rpc.unpin_path(pin_path).await,
    };

    match result {
        Ok(pin) => json_response(
            extra,
            &PinOpResponse {
                pins: vec![pin.cid.to_string()],
            },
        ),
        Err(e) => error_response(extra, e.to_string(), None),
    }
}

pub async fn pin_ls(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    pin_ls_inner(state, method, QueryArgs(pairs)).await
}

async fn pin_ls_inner(state: Arc<ProxyState>, method: Method, args: QueryArgs) -> Response {
    let extra = learned_headers(&state, &method);
    let rpc = require_rpc!(state, extra);

    let mut listing = PinLsResponse::default();

    match args.get("arg") {
        Some(arg) if !arg.is_empty() => {
            let cid = match decode_cid(arg) {
                Ok(cid) => cid,
                Err(e) => return error_response(extra, e, None),
            };
            match rpc.pin_get(cid).await {
                Ok(pin) => {
                    listing
                        .keys
                        .insert(pin.cid.to_string(), PinTypeEntry::recursive());
                }
                Err(_) => {
                    return error_response(
                        extra,
                        format!("Error: path '{arg}' is not pinned"),
                        None,
                    );
                }
            }
        }
        _ => match rpc.pins().await {
            Ok(pins) => {
                for pin in pins {
                    listing
                        .keys
                        .insert(pin.cid.to_string(), PinTypeEntry::recursive());
                }
            }
            Err(e) => return error_response(extra, e.to_string(), None),
        },
    }

    json_response(extra, &listing)
}

pub async fn pin_update(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let extra = learned_headers(&state, &method);
    let args = QueryArgs(pairs);

    // Mimic the daemon's complaints when arguments are missing.
    let paths = args.all("arg");
    if paths.is_empty() {
        return error_response(
            extra,
            "argument \"from-path\" is required",
            Some(StatusCode::BAD_REQUEST),
        );
    }
    if paths.len() == 1 {
        return error_response(
            extra,
            "argument \"to-path\" is required",
            Some(StatusCode::BAD_REQUEST),
        );
    }

    let unpin = args.get("unpin") != Some("false");

    let from = match IpfsPath::parse(paths[0]) {
        Ok(path) => path,
        Err(e) => {
            return error_response(
                extra,
                format!("error parsing \"from-path\" argument: {e}"),
                None,
            );
        }
    };
    let to = match IpfsPath::parse(paths[1]) {
        Ok(path) => path,
        Err(e) => {
            return error_response(
                extra,
                format!("error parsing \"to-path\" argument: {e}"),
                None,
            );
        }
    };

    let rpc = require_rpc!(state, extra);

    // Resolve the from-path so the new pin can inherit its allocations
    // and so we know what to unpin afterwards.
    let from_cid = match rpc.resolve(from.as_str()).await {
        Ok(cid) => cid,
        Err(e) => return error_response(extra, e.to_string(), None),
    };

    let pin = match rpc
        .pin_path(PinPath::new(to.as_str()).with_update(from_cid))
        .await
    {
        Ok(pin) => pin,
        Err(e) => return error_response(extra, e.to_string(), None),
    };

    if unpin {
        if let Err(e) = rpc.unpin(from_cid).await {
            return error_response(extra, e.to_string(), None);
        }
    }

    json_response(
        extra,
        &PinOpResponse {
            pins: vec![from_cid.to_string(), pin.cid.to_string()],
        },
    )
}
