//! Proxy server lifecycle: construction, the RPC-ready barrier, the
//! serve loop and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use pinwheel_rpc::RpcClient;

use crate::add::ContentAdder;
use crate::addr::DNS_TIMEOUT;
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::forward::Forwarder;
use crate::handlers::{build_router, ProxyState};
use crate::headers::HeaderCache;

/// The IPFS API proxy.
///
/// Construction validates configuration, resolves the upstream address
/// (DNS resolved exactly once, with a bounded timeout) and binds the
/// listener. The serve loop starts in the background but accepts nothing
/// until [`set_client`](Self::set_client) delivers the RPC capability.
pub struct Server {
    state: Arc<ProxyState>,
    node_url: String,
    local_addr: SocketAddr,
    ready_tx: watch::Sender<bool>,
    lifetime: CancellationToken,
    tasks: TaskTracker,
    shutdown: Mutex<bool>,
}

impl Server {
    /// Builds the proxy and spawns its (still gated) serve task.
    ///
    /// Fails on configuration, DNS resolution and bind errors.
    pub async fn new(
        config: ProxyConfig,
        adder: Arc<dyn ContentAdder>,
    ) -> Result<Self, ProxyError> {
        config.validate()?;

        let node_maddr = config.node_multiaddr()?;
        let node_sock = node_maddr.resolve(DNS_TIMEOUT).await?;
        let node_url = format!("{}://{}", config.node_scheme(), node_sock);

        let listen_maddr = config.listen_multiaddr()?;
        let listen_sock = listen_maddr.resolve(DNS_TIMEOUT).await?;
        let listener = TcpListener::bind(listen_sock).await?;
        let local_addr = listener.local_addr()?;

        let header_cache = Arc::new(HeaderCache::new());
        let forwarder = Forwarder::new(node_url.clone(), header_cache.clone())?;
        let lifetime = CancellationToken::new();
        let config = Arc::new(config);

        let state = Arc::new(ProxyState::new(
            config.clone(),
            adder,
            forwarder,
            header_cache,
            lifetime.clone(),
        ));
        let router = build_router(state.clone());

        let (ready_tx, ready_rx) = watch::channel(false);
        let tasks = TaskTracker::new();
        let shutdown = Mutex::new(false);

        tasks.spawn(run(
            listener,
            router,
            config,
            ready_rx,
            lifetime.clone(),
            tasks.clone(),
        ));

        Ok(Self {
            state,
            node_url,
            local_addr,
            ready_tx,
            lifetime,
            tasks,
            shutdown,
        })
    }

    /// Installs the RPC capability and delivers the ready signal, once.
    /// The serve loop accepts its first connection only after this.
    pub fn set_client(&self, client: Arc<dyn RpcClient>) {
        if self.state.install_rpc(client) {
            let _ = self.ready_tx.send(true);
        } else {
            warn!("rpc client was already installed; ignoring");
        }
    }

    /// Stops accepting, drains in-flight requests and waits for every
    /// background task. Safe to call repeatedly; later calls return
    /// immediately.
    pub async fn shutdown(&self) -> Result<(), ProxyError> {
        let mut done = self.shutdown.lock().await;
        if *done {
            debug!("already shutdown");
            return Ok(());
        }

        info!("stopping IPFS proxy");

        // Cancels the serve loop, unblocks a serve task still waiting on
        // the ready signal, and aborts in-flight adds.
        self.lifetime.cancel();

        self.tasks.close();
        self.tasks.wait().await;

        *done = true;
        Ok(())
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The composed upstream URL (`http[s]://host:port`).
    pub fn node_url(&self) -> &str {
        &self.node_url
    }
}

/// Waits for the ready signal, then serves until cancelled.
async fn run(
    listener: TcpListener,
    router: Router,
    config: Arc<ProxyConfig>,
    mut ready_rx: watch::Receiver<bool>,
    lifetime: CancellationToken,
    tasks: TaskTracker,
) {
    tokio::select! {
        _ = lifetime.cancelled() => return,
        changed = ready_rx.changed() => {
            if changed.is_err() || !*ready_rx.borrow() {
                return;
            }
        }
    }

    // A shutdown may have started between the ready signal and here; do
    // not enter the accept loop in that case. Never block on the
    // shutdown lock: Server::shutdown holds it while waiting for this
    // task.
    if lifetime.is_cancelled() {
        return;
    }

    info!(
        listen = %config.listen_addr,
        node = %config.node_addr,
        "IPFS proxy serving"
    );

    serve(listener, router, &config, lifetime, tasks).await;
}

/// Accept loop. Each connection is served on its own tracked task; on
/// cancellation the listener closes, keep-alives are disabled and
/// in-flight requests drain.
async fn serve(
    listener: TcpListener,
    router: Router,
    config: &ProxyConfig,
    lifetime: CancellationToken,
    tasks: TaskTracker,
) {
    let service = TowerToHyperService::new(router);
    let graceful = GracefulShutdown::new();

    let mut builder = auto::Builder::new(TokioExecutor::new()).http1_only();
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(config.read_header_timeout)
        .max_buf_size(config.max_header_bytes)
        // Keep-alives stay on while serving; clients batch API calls
        // over one connection.
        .keep_alive(true);

    loop {
        tokio::select! {
            _ = lifetime.cancelled() => break,
            accepted = listener.accept() => {
                let (stream, _peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        if lifetime.is_cancelled() {
                            break;
                        }
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };

                let io = TokioIo::new(stream);
                let conn = builder
                    .serve_connection_with_upgrades(io, service.clone())
                    .into_owned();
                let watched = graceful.watch(conn);
                tasks.spawn(async move {
                    if let Err(e) = watched.await {
                        debug!(error = %e, "connection ended with error");
                    }
                });
            }
        }
    }

    drop(listener);
    graceful.shutdown().await;
}
