//! Wire shapes of the IPFS daemon API.
//!
//! Hijacked endpoints must answer exactly as the daemon would, down to
//! the error body. Everything the proxy writes on the hijack side goes
//! through the helpers here.

use std::collections::BTreeMap;

use axum::body::Body;
use axum::response::Response;
use cid::Cid;
use http::{header, HeaderMap, StatusCode};
use serde::Serialize;

/// Error body written for hijack-side failures: `{"Message": "…"}`.
#[derive(Debug, Serialize)]
pub struct IpfsError {
    #[serde(rename = "Message")]
    pub message: String,
}

/// Response of `pin/add`, `pin/rm` and `pin/update`.
#[derive(Debug, Serialize)]
pub struct PinOpResponse {
    #[serde(rename = "Pins")]
    pub pins: Vec<String>,
}

/// One entry of a `pin/ls` listing. The cluster pins everything
/// recursively, so the type is always `"recursive"`.
#[derive(Debug, Serialize)]
pub struct PinTypeEntry {
    #[serde(rename = "Type")]
    pub pin_type: &'static str,
}

impl PinTypeEntry {
    pub fn recursive() -> Self {
        Self {
            pin_type: "recursive",
        }
    }
}

/// Response of `pin/ls`.
#[derive(Debug, Default, Serialize)]
pub struct PinLsResponse {
    #[serde(rename = "Keys")]
    pub keys: BTreeMap<String, PinTypeEntry>,
}

/// One newline-delimited record of an `add` response.
#[derive(Debug, Serialize)]
pub struct AddRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Hash", skip_serializing_if = "String::is_empty")]
    pub hash: String,
    #[serde(rename = "Bytes", skip_serializing_if = "is_zero")]
    pub bytes: u64,
    #[serde(rename = "Size", skip_serializing_if = "String::is_empty")]
    pub size: String,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

/// Writes an error response just like the daemon: `{"Message": …}` with
/// the given status, or 500 when none is given.
pub fn error_response(extra: HeaderMap, message: impl Into<String>, code: Option<StatusCode>) -> Response {
    let body = serde_json::to_vec(&IpfsError {
        message: message.into(),
    })
    .unwrap_or_default();

    let mut response = Response::builder()
        .status(code.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(headers) = response.headers_mut() {
        merge_extra(headers, &extra);
    }
    response.body(Body::from(body)).unwrap_or_default()
}

/// 200 with a JSON body.
pub fn json_response<T: Serialize>(extra: HeaderMap, value: &T) -> Response {
    let body = serde_json::to_vec(value).unwrap_or_default();
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(headers) = response.headers_mut() {
        merge_extra(headers, &extra);
    }
    response.body(Body::from(body)).unwrap_or_default()
}

/// 200 with raw bytes, no content type of our own.
pub fn raw_response(extra: HeaderMap, bytes: Vec<u8>) -> Response {
    let mut response = Response::builder().status(StatusCode::OK);
    if let Some(headers) = response.headers_mut() {
        merge_extra(headers, &extra);
    }
    response.body(Body::from(bytes)).unwrap_or_default()
}

/// 200 with an empty body.
pub fn empty_response(extra: HeaderMap) -> Response {
    raw_response(extra, Vec::new())
}

fn merge_extra(headers: &mut HeaderMap, extra: &HeaderMap) {
    for (name, value) in extra {
        headers.insert(name.clone(), value.clone());
    }
}

/// A parsed IPFS path.
///
/// Accepts bare CIDs (`Qm…`, rewritten to `/ipfs/Qm…`), `/ipfs/<cid>[/…]`,
/// `/ipld/<cid>[/…]` and `/ipns/<name>[/…]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpfsPath {
    repr: String,
}

impl IpfsPath {
    pub fn parse(text: &str) -> Result<Self, String> {
        if text.is_empty() {
            return Err("path is empty".to_owned());
        }

        let parts: Vec<&str> = text.split('/').collect();

        // A single segment must be a bare CID.
        if parts.len() == 1 {
            let cid = decode_cid(text)?;
            return Ok(Self {
                repr: format!("/ipfs/{cid}"),
            });
        }

        // Not rooted at "/": tolerate "cid/sub/path" shorthand.
        if !parts[0].is_empty() {
            decode_cid(parts[0])?;
            return Ok(Self {
                repr: format!("/ipfs/{text}"),
            });
        }

        if parts.len() < 3 {
            return Err(format!("path does not begin with '/': {text}"));
        }

        match parts[1] {
            "ipfs" | "ipld" => {
                decode_cid(parts[2])?;
            }
            "ipns" => {
                if parts[2].is_empty() {
                    return Err("ipns path with empty name".to_owned());
                }
            }
            ns => return Err(format!("unknown namespace {ns}")),
        }

        Ok(Self {
            repr: text.to_owned(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.repr
    }
}

impl std::fmt::Display for IpfsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.repr)
    }
}

/// Decodes a CID, reporting the daemon-style message on failure.
pub fn decode_cid(text: &str) -> Result<Cid, String> {
    Cid::try_from(text).map_err(|e| format!("invalid cid: {e}"))
}
