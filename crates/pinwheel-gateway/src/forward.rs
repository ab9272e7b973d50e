//! Reverse-proxy core: everything the router does not hijack is relayed
//! to the IPFS daemon byte-for-byte, bodies streamed in both directions.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use http::{header, HeaderMap, Method, StatusCode};
use tracing::error;

use crate::error::ProxyError;
use crate::headers::HeaderCache;

/// Hop-by-hop headers that must not be relayed (RFC 9110 §7.6.1).
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Single-host forwarder toward the resolved upstream URL.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    base: String,
    header_cache: Arc<HeaderCache>,
}

impl Forwarder {
    /// `base` is the composed upstream URL, e.g. `http://127.0.0.1:5001`.
    pub fn new(base: String, header_cache: Arc<HeaderCache>) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProxyError::UpstreamUrl(e.to_string()))?;

        Ok(Self {
            client,
            base,
            header_cache,
        })
    }

    /// Relays one request to the daemon and streams the answer back.
    ///
    /// Successful responses feed the header cache so later hijacked
    /// responses can mimic the daemon's headers for the same method.
    pub async fn forward(&self, req: Request) -> Response {
        let method = req.method().clone();
        let path_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .to_owned();
        let url = format!("{}{}", self.base, path_query);

        let headers = filter_headers(req.headers());
        let body = reqwest::Body::wrap_stream(req.into_body().into_data_stream());

        let upstream = self
            .client
            .request(method.clone(), &url)
            .headers(headers)
            .body(body)
            .send()
            .await;

        let upstream = match upstream {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, url = %url, "upstream request failed");
                return Response::builder()
                    .status(StatusCode::BAD_GATEWAY)
                    .body(Body::empty())
                    .unwrap_or_default();
            }
        };

        self.header_cache.remember(&method, upstream.headers());

        let mut builder = Response::builder().status(upstream.status());
        if let Some(headers) = builder.headers_mut() {
            *headers = filter_headers(upstream.headers());
        }

        builder
            .body(Body::from_stream(upstream.bytes_stream()))
            .unwrap_or_default()
    }
}

/// Copies `headers` minus `Host` and the hop-by-hop set.
fn filter_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::new();
    for (name, value) in headers {
        if name == header::HOST {
            continue;
        }
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }
    filtered
}

/// Whether `method` belongs to the hijackable set. Everything else goes
/// straight to the daemon, hijacked path or not.
pub fn is_hijackable(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::GET | Method::PUT)
}
