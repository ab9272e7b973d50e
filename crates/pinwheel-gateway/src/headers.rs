//! Per-method cache of headers learned from the upstream daemon.
//!
//! Hijacked responses should be indistinguishable from daemon responses,
//! CORS headers included. The forwarder records a small allowlist of
//! response headers the first time it sees a reply for a given request
//! method; hijack handlers replay them. Until something has been learned
//! for a method, handlers fall back to a safe minimum (their own
//! content type only).

use dashmap::DashMap;
use http::{HeaderMap, Method};

/// Response headers worth replaying on hijacked endpoints.
const REMEMBERED_HEADERS: &[&str] = &[
    "access-control-allow-origin",
    "access-control-allow-methods",
    "access-control-allow-headers",
    "access-control-allow-credentials",
    "access-control-expose-headers",
    "server",
    "vary",
];

/// Concurrent map from request method to learned header set. Read-mostly;
/// each method's slot is filled once and then only replayed.
#[derive(Debug, Default)]
pub struct HeaderCache {
    by_method: DashMap<Method, HeaderMap>,
}

impl HeaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the allowlisted subset of `headers` for `method`, unless a
    /// set was already learned for it.
    pub fn remember(&self, method: &Method, headers: &HeaderMap) {
        if self.by_method.contains_key(method) {
            return;
        }

        let mut learned = HeaderMap::new();
        for name in REMEMBERED_HEADERS {
            for value in headers.get_all(*name) {
                if let Ok(header_name) = name.parse::<http::HeaderName>() {
                    learned.append(header_name, value.clone());
                }
            }
        }

        if !learned.is_empty() {
            self.by_method.entry(method.clone()).or_insert(learned);
        }
    }

    /// The learned header set for `method`, empty when nothing was
    /// learned yet.
    pub fn learned(&self, method: &Method) -> HeaderMap {
        self.by_method
            .get(method)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}
