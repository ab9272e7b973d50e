//! The `/add` hijack: streaming multipart ingest into the cluster.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Query, State};
use axum::response::Response;
use bytes::Bytes;
use http::{header, Method, StatusCode};
use http_body::Frame;
use http_body_util::StreamBody;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use pinwheel_rpc::{AddParams, AddedOutput};

use crate::add::{ndjson_record, stream_error_trailer, AdderError, STREAM_ERROR_TRAILER};
use crate::handlers::{learned_headers, require_rpc, ProxyState, QueryArgs};
use crate::ipfs::error_response;

/// How long a freshly added pin gets to become globally visible before
/// the post-add unpin is issued.
const UNPIN_SETTLE: Duration = Duration::from_millis(100);

pub async fn add(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    Query(pairs): Query<Vec<(String, String)>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let extra = learned_headers(&state, &method);

    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(e) => {
            return error_response(extra, format!("error reading request: {e}"), None);
        }
    };

    let args = QueryArgs(pairs);

    if args.get("only-hash") == Some("true") {
        return error_response(
            extra,
            "only-hash is not supported when adding to cluster",
            None,
        );
    }

    let unpin_after = args.get("pin") == Some("false");

    // Most daemon add options translate directly to cluster add options.
    let mut params = match AddParams::from_query(&args.0) {
        Ok(params) => params,
        Err(e) => {
            return error_response(extra, format!("error parsing options:{e}"), None);
        }
    };
    if args.get("trickle") == Some("true") {
        params.layout = "trickle".to_owned();
    }

    warn!(options = ?params, "proxy/add does not support all IPFS add parameters");

    let rpc = require_rpc!(state, extra);

    let (frame_tx, frame_rx) =
        mpsc::channel::<Result<Frame<Bytes>, Infallible>>(16);
    let (out_tx, mut out_rx) = mpsc::channel::<AddedOutput>(16);

    // Pump adder records to the wire as they arrive.
    let record_tx = frame_tx.clone();
    let record_pump = tokio::spawn(async move {
        while let Some(out) = out_rx.recv().await {
            if record_tx
                .send(Ok(Frame::data(ndjson_record(&out))))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let adder = state.adder.clone();
    let lifetime = state.lifetime.clone();
    let unpin_rpc = rpc.clone();
    tokio::spawn(async move {
        // The proxy lifetime is the add's parent: shutdown abandons the
        // upload mid-flight.
        let result = tokio::select! {
            _ = lifetime.cancelled() => {
                Err(AdderError::Aborted("proxy is shutting down".to_owned()))
            }
            result = adder.add_multipart(rpc, params, multipart, out_tx) => result,
        };

        // All produced records are on the wire before any trailer.
        let _ = record_pump.await;

        match result {
            Err(e) => {
                let _ = frame_tx.send(Ok(stream_error_trailer(&e.to_string()))).await;
            }
            Ok(root) if unpin_after => {
                tokio::time::sleep(UNPIN_SETTLE).await;
                if let Err(e) = unpin_rpc.unpin(root).await {
                    let _ = frame_tx
                        .send(Ok(stream_error_trailer(&e.to_string())))
                        .await;
                }
            }
            Ok(_) => {}
        }
    });

    let body = Body::new(StreamBody::new(ReceiverStream::new(frame_rx)));

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::TRAILER, STREAM_ERROR_TRAILER);
    if let Some(headers) = response.headers_mut() {
        for (name, value) in &extra {
            headers.insert(name.clone(), value.clone());
        }
    }

    response.body(body).unwrap_or_default()
}
