//! The content-adder seam and the streamed add response.
//!
//! The adder collaborator consumes the multipart body, builds the DAG in
//! coordination with the cluster, and reports per-entry results as they
//! complete. The gateway turns those into newline-delimited JSON records
//! on an already-committed response; failures after the status line has
//! been sent travel in the `X-Stream-Error` trailer.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Multipart;
use bytes::Bytes;
use cid::Cid;
use http::{HeaderMap, HeaderName, HeaderValue};
use http_body::Frame;
use thiserror::Error;
use tokio::sync::mpsc;

use pinwheel_rpc::{AddParams, AddedOutput, RpcClient};

use crate::ipfs::AddRecord;

/// Trailer carrying mid-stream failures.
pub const STREAM_ERROR_TRAILER: &str = "X-Stream-Error";

/// Errors from the adder collaborator.
#[derive(Error, Debug)]
pub enum AdderError {
    /// The proxy is shutting down; the upload was abandoned.
    #[error("add aborted: {0}")]
    Aborted(String),

    /// The multipart body could not be consumed.
    #[error("error reading request: {0}")]
    Read(String),

    /// DAG building or cluster coordination failed.
    #[error("{0}")]
    Failed(String),
}

/// Streams multipart content into the cluster.
///
/// Implementations send one [`AddedOutput`] per completed entry through
/// `output` while the add is in flight, and finally return the root CID
/// of the built DAG.
#[async_trait]
pub trait ContentAdder: Send + Sync {
    async fn add_multipart(
        &self,
        rpc: Arc<dyn RpcClient>,
        params: AddParams,
        parts: Multipart,
        output: mpsc::Sender<AddedOutput>,
    ) -> Result<Cid, AdderError>;
}

/// One NDJSON line for an adder record, daemon-shaped.
pub(crate) fn ndjson_record(out: &AddedOutput) -> Bytes {
    let record = AddRecord {
        name: out.name.clone(),
        hash: out.cid.to_string(),
        bytes: out.bytes,
        size: if out.size == 0 {
            String::new()
        } else {
            out.size.to_string()
        },
    };

    let mut line = serde_json::to_vec(&record).unwrap_or_default();
    line.push(b'\n');
    Bytes::from(line)
}

/// A trailers frame carrying `X-Stream-Error`.
pub(crate) fn stream_error_trailer(message: &str) -> Frame<Bytes> {
    let mut trailers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(message) {
        trailers.insert(HeaderName::from_static("x-stream-error"), value);
    }
    Frame::trailers(trailers)
}
