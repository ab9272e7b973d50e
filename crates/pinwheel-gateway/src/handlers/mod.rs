//! Hijack handlers and the request router.
//!
//! A fixed set of `/api/v0` paths is served locally for POST/GET/PUT.
//! Everything else (other paths, and other methods on hijacked paths)
//! is relayed to the daemon by the forwarder.

pub mod add;
pub mod files;
pub mod pin;
pub mod repo;
pub mod uid;

use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::response::Response;
use axum::routing::{on, MethodFilter};
use axum::Router;
use http::{HeaderMap, Method};
use tokio_util::sync::CancellationToken;

use pinwheel_rpc::{FilesWriteRequest, RpcClient, RpcError};

use crate::add::ContentAdder;
use crate::config::ProxyConfig;
use crate::forward::Forwarder;
use crate::headers::HeaderCache;
use crate::multipart::encode_file;
use crate::trace::RequestTraceLayer;

/// Shared state behind every handler.
pub struct ProxyState {
    pub config: Arc<ProxyConfig>,
    rpc: OnceLock<Arc<dyn RpcClient>>,
    pub adder: Arc<dyn ContentAdder>,
    pub forwarder: Forwarder,
    pub header_cache: Arc<HeaderCache>,
    /// Process-lifetime signal; cancelled on shutdown. Parent of the add
    /// path so shutdown aborts in-flight uploads.
    pub lifetime: CancellationToken,
}

impl ProxyState {
    pub fn new(
        config: Arc<ProxyConfig>,
        adder: Arc<dyn ContentAdder>,
        forwarder: Forwarder,
        header_cache: Arc<HeaderCache>,
        lifetime: CancellationToken,
    ) -> Self {
        Self {
            config,
            rpc: OnceLock::new(),
            adder,
            forwarder,
            header_cache,
            lifetime,
        }
    }

    /// Installs the RPC capability. Returns false if one was already
    /// installed (the second install is ignored). Normally called by the
    /// server when the ready signal is delivered.
    pub fn install_rpc(&self, client: Arc<dyn RpcClient>) -> bool {
        self.rpc.set(client).is_ok()
    }

    /// The RPC capability. Present for every request the serve loop lets
    /// through: serving starts only after the ready signal.
    pub(crate) fn rpc(&self) -> Option<Arc<dyn RpcClient>> {
        self.rpc.get().cloned()
    }
}

/// Decoded query pairs, order-preserving so repeated `arg` values keep
/// their positions.
#[derive(Debug, Clone, Default)]
pub struct QueryArgs(pub Vec<(String, String)>);

impl QueryArgs {
    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `key`, in query order.
    pub fn all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// First value for `key`, or `default` when absent or empty.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.get(key) {
            Some(v) if !v.is_empty() => v,
            _ => default,
        }
    }

    /// Owned value for `key`, empty string when absent.
    pub fn owned(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_owned()
    }

    /// Replaces every value of `key` with a single one.
    pub fn set(&mut self, key: &str, value: String) {
        self.0.retain(|(k, _)| k != key);
        self.0.push((key.to_owned(), value));
    }
}

/// Fetches the RPC handle or answers with a daemon-shaped error.
macro_rules! require_rpc {
    ($state:expr, $extra:expr) => {
        match $state.rpc() {
            Some(rpc) => rpc,
            None => {
                return crate::ipfs::error_response($extra, "cluster RPC is not ready", None);
            }
        }
    };
}
pub(crate) use require_rpc;

/// The headers a hijacked response starts from for this method.
pub(crate) fn learned_headers(state: &ProxyState, method: &Method) -> HeaderMap {
    state.header_cache.learned(method)
}

/// Writes the current Unix timestamp into `time.txt` at the root of the
/// uid's mutable filesystem. Announces liveness and makes sure the
/// namespace exists; runs before every mutating filesystem operation.
pub(crate) async fn uid_spawn(rpc: &Arc<dyn RpcClient>, uid: &str) -> Result<(), RpcError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let form = encode_file("time.txt", now.to_string().as_bytes());

    rpc.files_write(FilesWriteRequest {
        content_type: form.content_type,
        body: form.body,
        params: vec![
            uid.to_owned(),
            "time.txt".to_owned(),
            "0".to_owned(),
            "true".to_owned(),
            "true".to_owned(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        ],
    })
    .await
}

/// Relay handler for everything that is not hijacked.
pub async fn forward_upstream(State(state): State<Arc<ProxyState>>, req: Request) -> Response {
    state.forwarder.forward(req).await
}

/// Builds the router: the hijack table for POST/GET/PUT, the forwarder
/// for every other method and path.
pub fn build_router(state: Arc<ProxyState>) -> Router {
    let hijack = MethodFilter::POST
        .or(MethodFilter::GET)
        .or(MethodFilter::PUT);

    let mut router = Router::new()
        .route("/api/v0/pin/add", on(hijack, pin::pin_add))
        .route("/api/v0/pin/add/{arg}", on(hijack, pin::pin_add_slash))
        .route("/api/v0/pin/rm", on(hijack, pin::pin_rm))
        .route("/api/v0/pin/rm/{arg}", on(hijack, pin::pin_rm_slash))
        .route("/api/v0/pin/ls", on(hijack, pin::pin_ls))
        .route("/api/v0/pin/ls/{arg}", on(hijack, pin::pin_ls_slash))
        .route("/api/v0/pin/update", on(hijack, pin::pin_update))
        .route("/api/v0/add", on(hijack, add::add))
        .route("/api/v0/file/add", on(hijack, add::add))
        .route("/api/v0/repo/stat", on(hijack, repo::repo_stat))
        .route("/api/v0/uid/new", on(hijack, uid::uid_new))
        .route("/api/v0/uid/login", on(hijack, uid::uid_login))
        .route("/api/v0/file/get", on(hijack, files::file_get))
        .route("/api/v0/file/cat", on(hijack, files::file_cat))
        .route("/api/v0/files/cp", on(hijack, files::files_cp))
        .route("/api/v0/files/flush", on(hijack, files::files_flush))
        .route("/api/v0/files/ls", on(hijack, files::files_ls))
        .route("/api/v0/files/mkdir", on(hijack, files::files_mkdir))
        .route("/api/v0/files/mv", on(hijack, files::files_mv))
        .route("/api/v0/files/read", on(hijack, files::files_read))
        .route("/api/v0/files/rm", on(hijack, files::files_rm))
        .route("/api/v0/files/stat", on(hijack, files::files_stat))
        .route("/api/v0/files/write", on(hijack, files::files_write))
        .fallback(forward_upstream)
        .method_not_allowed_fallback(forward_upstream)
        .layer(DefaultBodyLimit::disable())
        .with_state(state.clone());

    if state.config.tracing {
        router = router.layer(RequestTraceLayer::new());
    }

    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_args_multi_value() {
        let args = QueryArgs(vec![
            ("arg".into(), "/ipfs/a".into()),
            ("unpin".into(), "false".into()),
            ("arg".into(), "/ipfs/b".into()),
        ]);

        assert_eq!(args.all("arg"), vec!["/ipfs/a", "/ipfs/b"]);
        assert_eq!(args.get("arg"), Some("/ipfs/a"));
        assert_eq!(args.get("unpin"), Some("false"));
        assert_eq!(args.get("missing"), None);
    }

    #[test]
    fn query_args_set_replaces_all() {
        let mut args = QueryArgs(vec![
            ("arg".into(), "old".into()),
            ("arg".into(), "older".into()),
        ]);
        args.set("arg", "new".into());
        assert_eq!(args.all("arg"), vec!["new"]);
    }

    #[test]
    fn query_args_defaults() {
        let args = QueryArgs(vec![("path".into(), String::new())]);
        assert_eq!(args.get_or("path", "/"), "/");
        assert_eq!(args.get_or("missing", "/"), "/");
        assert_eq!(args.owned("missing"), "");
    }
}
