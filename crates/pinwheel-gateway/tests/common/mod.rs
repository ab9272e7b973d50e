//! Shared fixtures for gateway integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Multipart;
use axum::response::Response;
use axum::Router;
use cid::Cid;
use http::{HeaderMap, Request};
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use pinwheel_gateway::add::{AdderError, ContentAdder};
use pinwheel_gateway::config::ProxyConfig;
use pinwheel_gateway::forward::Forwarder;
use pinwheel_gateway::handlers::{build_router, ProxyState};
use pinwheel_gateway::headers::HeaderCache;
use pinwheel_rpc::{
    AddParams, AddedOutput, ClusterPin, FilesWriteRequest, PeerId, PinPath, RepoStat, RpcClient,
    RpcError, RpcResult, UidKey, UidSecret,
};

/// Known-good CIDv0 values for request fixtures.
pub const CID_A: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
pub const CID_B: &str = "QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn";
pub const CID_C: &str = "QmQPeNsJPyVWPFDVHb77w8G42Fvo15z4bG2X8D2GhfbSXc";

pub fn cid(text: &str) -> Cid {
    text.parse().expect("fixture CID must be valid")
}

/// Everything a handler did against the mock RPC, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    PinPath { path: String, update: Option<String> },
    UnpinPath { path: String },
    Unpin { cid: String },
    PinGet { cid: String },
    Pins,
    UidNew { name: String },
    UidLogin { uid: String, hash: String },
    FileGet { args: Vec<String> },
    FilesOp { method: &'static str, args: Vec<String> },
    FilesWrite { params: Vec<String>, body_len: usize },
    Resolve { path: String },
    RepoStat { peer: String },
    Peers,
}

/// In-memory cluster fake: echoes CIDs back out of paths, keeps a pin
/// set, and records every call. Failures are injected per method name.
#[derive(Default)]
pub struct MockRpc {
    calls: Mutex<Vec<Call>>,
    pinned: Mutex<Vec<Cid>>,
    peers: Mutex<Vec<PeerId>>,
    repo_stats: Mutex<Vec<(String, RpcResult<RepoStat>)>>,
    file_get_data: Mutex<Vec<u8>>,
    failures: Mutex<Vec<(&'static str, String)>>,
}

impl MockRpc {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_pins(self: Arc<Self>, cids: &[&str]) -> Arc<Self> {
        *self.pinned.lock().unwrap() = cids.iter().map(|c| cid(c)).collect();
        self
    }

    pub fn with_peers(self: Arc<Self>, peers: &[&str]) -> Arc<Self> {
        *self.peers.lock().unwrap() = peers.iter().map(|p| PeerId(p.to_string())).collect();
        self
    }

    pub fn with_repo_stat(self: Arc<Self>, peer: &str, result: RpcResult<RepoStat>) -> Arc<Self> {
        self.repo_stats
            .lock()
            .unwrap()
            .push((peer.to_owned(), result));
        self
    }

    pub fn with_file_get(self: Arc<Self>, data: &[u8]) -> Arc<Self> {
        *self.file_get_data.lock().unwrap() = data.to_vec();
        self
    }

    /// Makes `method` fail with `message`.
    pub fn failing(self: Arc<Self>, method: &'static str, message: &str) -> Arc<Self> {
        self.failures
            .lock()
            .unwrap()
            .push((method, message.to_owned()));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded `files_write` params, spawn-hook writes included.
    pub fn files_writes(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::FilesWrite { params, .. } => Some(params),
                _ => None,
            })
            .collect()
    }

    /// How many spawn-hook writes (`time.txt`) were recorded.
    pub fn spawn_count(&self) -> usize {
        self.files_writes()
            .iter()
            .filter(|params| params.get(1).map(String::as_str) == Some("time.txt"))
            .count()
    }

    pub fn unpins(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Unpin { cid } => Some(cid),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failure(&self, method: &'static str) -> RpcResult<()> {
        let failures = self.failures.lock().unwrap();
        match failures.iter().find(|(m, _)| *m == method) {
            Some((_, message)) => Err(RpcError::Failed(message.clone())),
            None => Ok(()),
        }
    }

    fn cid_from_path(path: &str) -> Cid {
        let segment = path.split('/').nth(2).unwrap_or(path);
        cid(segment)
    }
}

#[async_trait]
impl RpcClient for MockRpc {
    async fn pin_path(&self, pin: PinPath) -> RpcResult<ClusterPin> {
        self.record(Call::PinPath {
            path: pin.path.clone(),
            update: pin.pin_update.map(|c| c.to_string()),
        });
        self.check_failure("pin_path")?;
        let cid = Self::cid_from_path(&pin.path);
        self.pinned.lock().unwrap().push(cid);
        Ok(ClusterPin::new(cid))
    }

    async fn unpin_path(&self, pin: PinPath) -> RpcResult<ClusterPin> {
        self.record(Call::UnpinPath {
            path: pin.path.clone(),
        });
        self.check_failure("unpin_path")?;
        let cid = Self::cid_from_path(&pin.path);
        self.pinned.lock().unwrap().retain(|c| *c != cid);
        Ok(ClusterPin::new(cid))
    }

    async fn unpin(&self, cid: Cid) -> RpcResult<ClusterPin> {
        self.record(Call::Unpin {
            cid: cid.to_string(),
        });
        self.check_failure("unpin")?;
        self.pinned.lock().unwrap().retain(|c| *c != cid);
        Ok(ClusterPin::new(cid))
    }

    async fn pin_get(&self, cid: Cid) -> RpcResult<ClusterPin> {
        self.record(Call::PinGet {
            cid: cid.to_string(),
        });
        self.check_failure("pin_get")?;
        if self.pinned.lock().unwrap().contains(&cid) {
            Ok(ClusterPin::new(cid))
        } else {
            Err(RpcError::Failed("not pinned".to_owned()))
        }
    }

    async fn pins(&self) -> RpcResult<Vec<ClusterPin>> {
        self.record(Call::Pins);
        self.check_failure("pins")?;
        Ok(self
            .pinned
            .lock()
            .unwrap()
            .iter()
            .map(|c| ClusterPin::new(*c))
            .collect())
    }

    async fn uid_new(&self, name: &str) -> RpcResult<UidSecret> {
        self.record(Call::UidNew {
            name: name.to_owned(),
        });
        self.check_failure("uid_new")?;
        Ok(UidSecret(serde_json::json!({
            "UID": name,
            "PeerName": "mock-peer",
            "PrivKey": format!("secret-{name}"),
        })))
    }

    async fn uid_login(&self, uid: &str, hash: &str) -> RpcResult<UidKey> {
        self.record(Call::UidLogin {
            uid: uid.to_owned(),
            hash: hash.to_owned(),
        });
        self.check_failure("uid_login")?;
        Ok(UidKey(serde_json::json!({ "Key": format!("key-{uid}") })))
    }

    async fn file_get(&self, args: Vec<String>) -> RpcResult<Vec<u8>> {
        self.record(Call::FileGet { args });
        self.check_failure("file_get")?;
        Ok(self.file_get_data.lock().unwrap().clone())
    }

    async fn files_cp(&self, args: Vec<String>) -> RpcResult<()> {
        self.record(Call::FilesOp {
            method: "files_cp",
            args,
        });
        self.check_failure("files_cp")
    }

    async fn files_flush(&self, args: Vec<String>) -> RpcResult<()> {
        self.record(Call::FilesOp {
            method: "files_flush",
            args,
        });
        self.check_failure("files_flush")
    }

    async fn files_ls(&self, args: Vec<String>) -> RpcResult<serde_json::Value> {
        self.record(Call::FilesOp {
            method: "files_ls",
            args,
        });
        self.check_failure("files_ls")?;
        Ok(serde_json::json!({
            "Entries": [{ "Name": "time.txt", "Type": 0 }]
        }))
    }

    async fn files_mkdir(&self, args: Vec<String>) -> RpcResult<()> {
        self.record(Call::FilesOp {
            method: "files_mkdir",
            args,
        });
        self.check_failure("files_mkdir")
    }

    async fn files_mv(&self, args: Vec<String>) -> RpcResult<()> {
        self.record(Call::FilesOp {
            method: "files_mv",
            args,
        });
        self.check_failure("files_mv")
    }

    async fn files_read(&self, args: Vec<String>) -> RpcResult<Vec<u8>> {
        self.record(Call::FilesOp {
            method: "files_read",
            args,
        });
        self.check_failure("files_read")?;
        Ok(b"file-content".to_vec())
    }

    async fn files_rm(&self, args: Vec<String>) -> RpcResult<()> {
        self.record(Call::FilesOp {
            method: "files_rm",
            args,
        });
        self.check_failure("files_rm")
    }

    async fn files_stat(&self, args: Vec<String>) -> RpcResult<serde_json::Value> {
        self.record(Call::FilesOp {
            method: "files_stat",
            args,
        });
        self.check_failure("files_stat")?;
        Ok(serde_json::json!({ "Size": 12, "Type": "file" }))
    }

    async fn files_write(&self, req: FilesWriteRequest) -> RpcResult<()> {
        self.record(Call::FilesWrite {
            params: req.params.clone(),
            body_len: req.body.len(),
        });
        self.check_failure("files_write")
    }

    async fn resolve(&self, path: &str) -> RpcResult<Cid> {
        self.record(Call::Resolve {
            path: path.to_owned(),
        });
        self.check_failure("resolve")?;
        Ok(Self::cid_from_path(path))
    }

    async fn repo_stat(&self, peer: &PeerId) -> RpcResult<RepoStat> {
        self.record(Call::RepoStat {
            peer: peer.0.clone(),
        });
        let stats = self.repo_stats.lock().unwrap();
        match stats.iter().find(|(p, _)| *p == peer.0) {
            Some((_, result)) => result.clone(),
            None => Ok(RepoStat::default()),
        }
    }

    async fn peers(&self) -> RpcResult<Vec<PeerId>> {
        self.record(Call::Peers);
        self.check_failure("peers")?;
        Ok(self.peers.lock().unwrap().clone())
    }
}

/// Adder double: drains the multipart body, emits scripted records and
/// returns a fixed root (or a scripted failure).
pub struct MockAdder {
    pub outputs: Vec<AddedOutput>,
    pub root: Cid,
    pub fail: Option<String>,
    pub seen_params: Mutex<Option<AddParams>>,
    pub consumed: Mutex<usize>,
}

impl MockAdder {
    pub fn new(root: &str) -> Arc<Self> {
        Arc::new(Self {
            outputs: Vec::new(),
            root: cid(root),
            fail: None,
            seen_params: Mutex::new(None),
            consumed: Mutex::new(0),
        })
    }

    pub fn with_output(self: Arc<Self>, name: &str, out_cid: &str, bytes: u64) -> Arc<Self> {
        let mut adder = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("adder already shared"));
        adder.outputs.push(AddedOutput {
            name: name.to_owned(),
            cid: cid(out_cid),
            bytes,
            size: 0,
        });
        Arc::new(adder)
    }

    pub fn failing(self: Arc<Self>, message: &str) -> Arc<Self> {
        let mut adder = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("adder already shared"));
        adder.fail = Some(message.to_owned());
        Arc::new(adder)
    }
}

#[async_trait]
impl ContentAdder for MockAdder {
    async fn add_multipart(
        &self,
        _rpc: Arc<dyn RpcClient>,
        params: AddParams,
        mut parts: Multipart,
        output: mpsc::Sender<AddedOutput>,
    ) -> Result<Cid, AdderError> {
        *self.seen_params.lock().unwrap() = Some(params);

        let mut total = 0;
        while let Some(field) = parts
            .next_field()
            .await
            .map_err(|e| AdderError::Read(e.to_string()))?
        {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AdderError::Read(e.to_string()))?;
            total += bytes.len();
        }
        *self.consumed.lock().unwrap() = total;

        if let Some(message) = &self.fail {
            return Err(AdderError::Failed(message.clone()));
        }

        for out in &self.outputs {
            let _ = output.send(out.clone()).await;
        }

        Ok(self.root)
    }
}

/// A stand-in daemon: answers every request with its method and path and
/// a recognizable CORS header, so forwarding is observable.
pub async fn spawn_daemon_stub() -> SocketAddr {
    async fn echo(req: Request<Body>) -> Response {
        let label = format!(
            "daemon:{}:{}",
            req.method(),
            req.uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/")
        );
        Response::builder()
            .header("Access-Control-Allow-Origin", "*")
            .header("Server", "daemon-stub")
            .body(Body::from(label))
            .unwrap()
    }

    let app = Router::new().fallback(echo);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Router-level harness around [`build_router`].
pub struct TestProxy {
    pub rpc: Arc<MockRpc>,
    pub adder: Arc<MockAdder>,
    pub router: Router,
    pub lifetime: CancellationToken,
}

impl TestProxy {
    pub fn new(rpc: Arc<MockRpc>, adder: Arc<MockAdder>, upstream: String) -> Self {
        let config = Arc::new(ProxyConfig::default());
        let header_cache = Arc::new(HeaderCache::new());
        let forwarder = Forwarder::new(upstream, header_cache.clone()).unwrap();
        let lifetime = CancellationToken::new();

        let state = Arc::new(ProxyState::new(
            config,
            adder.clone(),
            forwarder,
            header_cache,
            lifetime.clone(),
        ));
        state.install_rpc(rpc.clone());

        let router = build_router(state);

        Self {
            rpc,
            adder,
            router,
            lifetime,
        }
    }

    /// Harness with no reachable upstream (hijack-only tests).
    pub fn hijack_only(rpc: Arc<MockRpc>) -> Self {
        Self::new(rpc, MockAdder::new(CID_A), "http://127.0.0.1:1".to_owned())
    }
}

pub fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn multipart_request(method: &str, uri: &str, content: &[u8]) -> Request<Body> {
    let form = pinwheel_gateway::multipart::encode_file("data.bin", content);
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, form.content_type)
        .body(Body::from(form.body))
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Drains a streamed response frame by frame, separating data from
/// trailers.
pub async fn streamed_body(response: Response) -> (Vec<u8>, HeaderMap) {
    let mut body = response.into_body();
    let mut data = Vec::new();
    let mut trailers = HeaderMap::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.unwrap();
        match frame.into_data() {
            Ok(chunk) => data.extend_from_slice(&chunk),
            Err(frame) => {
                if let Ok(t) = frame.into_trailers() {
                    trailers.extend(t);
                }
            }
        }
    }

    (data, trailers)
}
