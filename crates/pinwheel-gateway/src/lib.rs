//! IPFS API proxy for the pinwheel cluster.
//!
//! Sits between IPFS API clients and an IPFS daemon: a fixed set of
//! `/api/v0` endpoints is hijacked and answered from cluster RPC (pin
//! state, content addition, per-uid mutable filesystems); everything
//! else is reverse-proxied to the daemon untouched. Responses on the
//! hijack side keep the daemon's wire shapes so clients cannot tell the
//! difference.
//!
//! The proxy is a library component: the enclosing cluster binary builds
//! a [`Server`], installs the RPC capability with
//! [`Server::set_client`] once cluster plumbing is up, and tears it down
//! with [`Server::shutdown`].

pub mod add;
pub mod addr;
pub mod config;
pub mod error;
pub mod forward;
pub mod handlers;
pub mod headers;
pub mod ipfs;
pub mod monitor;
pub mod multipart;
pub mod server;
pub mod trace;

pub use add::{AdderError, ContentAdder};
pub use config::ProxyConfig;
pub use error::ProxyError;
pub use monitor::MonitorConfig;
pub use server::Server;
