//! Mutable-filesystem hijacks (`file/*` and `files/*`).
//!
//! Every endpoint here addresses a uid's namespace. Mutating endpoints
//! run the uid spawn hook first so the namespace exists and its liveness
//! marker is fresh; read-only endpoints skip it.

use std::io::Cursor;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Query, State};
use axum::response::Response;
use http::{Method, Uri};

use pinwheel_rpc::FilesWriteRequest;

use crate::handlers::{learned_headers, require_rpc, uid_spawn, ProxyState, QueryArgs};
use crate::ipfs::{empty_response, error_response, json_response, raw_response};
use crate::multipart::FormFileWriter;

/// Fetches a required, non-empty query value; the daemon-style error
/// names the full request URL.
fn required<'a>(args: &'a QueryArgs, key: &str, uri: &Uri) -> Result<&'a str, String> {
    match args.get(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(format!("error reading request: {uri}")),
    }
}

pub async fn file_get(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let extra = learned_headers(&state, &method);
    let args = QueryArgs(pairs);

    let arg = match required(&args, "arg", &uri) {
        Ok(arg) => arg.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };

    let rpc = require_rpc!(state, extra);

    match rpc.file_get(file_get_args(&args, arg)).await {
        Ok(bytes) => raw_response(extra, bytes),
        Err(e) => error_response(extra, e.to_string(), None),
    }
}

pub async fn file_cat(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let extra = learned_headers(&state, &method);
    let args = QueryArgs(pairs);

    let arg = match required(&args, "arg", &uri) {
        Ok(arg) => arg.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };

    let rpc = require_rpc!(state, extra);

    let archive = match rpc.file_get(file_get_args(&args, arg)).await {
        Ok(bytes) => bytes,
        Err(e) => return error_response(extra, e.to_string(), None),
    };

    // The connector hands back a tar stream; flatten it into one byte
    // run for cat-style consumption.
    let concatenated =
        tokio::task::spawn_blocking(move || extract_and_concatenate(archive)).await;

    match concatenated {
        Ok(Ok(bytes)) => raw_response(extra, bytes),
        Ok(Err(e)) => error_response(extra, e.to_string(), None),
        Err(e) => error_response(extra, e.to_string(), None),
    }
}

/// Args for the connector's file-get:
/// `[path, output, archive, compress, compression-level]`.
fn file_get_args(args: &QueryArgs, arg: String) -> Vec<String> {
    vec![
        arg,
        args.owned("output"),
        args.owned("archive"),
        args.owned("compress"),
        args.owned("compression-level"),
    ]
}

/// Unpacks a tar archive into a temporary directory and concatenates all
/// regular files in lexicographic path order. The tar format does not
/// promise a useful entry order, so the sort keeps output deterministic.
fn extract_and_concatenate(archive: Vec<u8>) -> std::io::Result<Vec<u8>> {
    let dir = tempfile::tempdir()?;

    let mut tar = tar::Archive::new(Cursor::new(archive));
    tar.unpack(dir.path())?;

    let mut files = Vec::new();
    collect_files(dir.path(), &mut files)?;
    files.sort();

    let mut out = Vec::new();
    for path in files {
        out.extend(std::fs::read(path)?);
    }

    Ok(out)
}

fn collect_files(dir: &FsPath, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

pub async fn files_cp(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let extra = learned_headers(&state, &method);
    let args = QueryArgs(pairs);

    let uid = match required(&args, "uid", &uri) {
        Ok(uid) => uid.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };

    let rpc = require_rpc!(state, extra);

    if let Err(e) = uid_spawn(&rpc, &uid).await {
        return error_response(extra, e.to_string(), None);
    }

    let source = match required(&args, "source", &uri) {
        Ok(source) => source.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };
    let dest = match required(&args, "dest", &uri) {
        Ok(dest) => dest.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };

    match rpc.files_cp(vec![uid, source, dest]).await {
        Ok(()) => empty_response(extra),
        Err(e) => error_response(extra, e.to_string(), None),
    }
}

pub async fn files_flush(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let extra = learned_headers(&state, &method);
    let args = QueryArgs(pairs);

    let uid = match required(&args, "uid", &uri) {
        Ok(uid) => uid.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };

    let rpc = require_rpc!(state, extra);

    if let Err(e) = uid_spawn(&rpc, &uid).await {
        return error_response(extra, e.to_string(), None);
    }

    let path = args.get_or("path", "/").to_owned();

    match rpc.files_flush(vec![uid, path]).await {
        Ok(()) => empty_response(extra),
        Err(e) => error_response(extra, e.to_string(), None),
    }
}

pub async fn files_ls(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let extra = learned_headers(&state, &method);
    let args = QueryArgs(pairs);

    let uid = match required(&args, "uid", &uri) {
        Ok(uid) => uid.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };
    let path = args.get_or("path", "/").to_owned();

    let rpc = require_rpc!(state, extra);

    match rpc.files_ls(vec![uid, path]).await {
        Ok(listing) => json_response(extra, &listing),
        Err(e) => error_response(extra, e.to_string(), None),
    }
}

pub async fn files_mkdir(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let extra = learned_headers(&state, &method);
    let args = QueryArgs(pairs);

    let uid = match required(&args, "uid", &uri) {
        Ok(uid) => uid.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };
    let path = match required(&args, "path", &uri) {
        Ok(path) => path.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };

    let rpc = require_rpc!(state, extra);

    // The namespace root always exists; only deeper directories warrant
    // the spawn hook.
    if path != "/" {
        if let Err(e) = uid_spawn(&rpc, &uid).await {
            return error_response(extra, e.to_string(), None);
        }
    }

    let parents = args.get_or("parents", "false").to_owned();

    match rpc.files_mkdir(vec![uid, path, parents]).await {
        Ok(()) => empty_response(extra),
        Err(e) => error_response(extra, e.to_string(), None),
    }
}

pub async fn files_mv(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let extra = learned_headers(&state, &method);
    let args = QueryArgs(pairs);

    let uid = match required(&args, "uid", &uri) {
        Ok(uid) => uid.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };

    let rpc = require_rpc!(state, extra);

    if let Err(e) = uid_spawn(&rpc, &uid).await {
        return error_response(extra, e.to_string(), None);
    }

    let source = args.get_or("source", "/").to_owned();
    let dest = args.get_or("dest", "/").to_owned();

    match rpc.files_mv(vec![uid, source, dest]).await {
        Ok(()) => empty_response(extra),
        Err(e) => error_response(extra, e.to_string(), None),
    }
}

pub async fn files_read(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let extra = learned_headers(&state, &method);
    let args = QueryArgs(pairs);

    let uid = match required(&args, "uid", &uri) {
        Ok(uid) => uid.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };
    let path = match required(&args, "path", &uri) {
        Ok(path) => path.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };
    let offset = args.owned("offset");
    let count = args.owned("count");

    let rpc = require_rpc!(state, extra);

    match rpc.files_read(vec![uid, path, offset, count]).await {
        Ok(bytes) => raw_response(extra, bytes),
        Err(e) => error_response(extra, e.to_string(), None),
    }
}

pub async fn files_rm(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let extra = learned_headers(&state, &method);
    let args = QueryArgs(pairs);

    let uid = match required(&args, "uid", &uri) {
        Ok(uid) => uid.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };

    let rpc = require_rpc!(state, extra);

    if let Err(e) = uid_spawn(&rpc, &uid).await {
        return error_response(extra, e.to_string(), None);
    }

    let path = match required(&args, "path", &uri) {
        Ok(path) => path.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };
    if path == "/" {
        return error_response(extra, format!("can not remove path: {path}"), None);
    }

    let recursive = args.get_or("recursive", "false").to_owned();

    match rpc.files_rm(vec![uid, path, recursive]).await {
        Ok(()) => empty_response(extra),
        Err(e) => error_response(extra, e.to_string(), None),
    }
}

pub async fn files_stat(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let extra = learned_headers(&state, &method);
    let args = QueryArgs(pairs);

    let uid = match required(&args, "uid", &uri) {
        Ok(uid) => uid.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };
    let path = match required(&args, "path", &uri) {
        Ok(path) => path.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };

    let format = args.owned("format");
    let hash = args.owned("hash");
    let size = args.owned("size");
    let with_local = args.owned("with-local");

    let rpc = require_rpc!(state, extra);

    match rpc
        .files_stat(vec![uid, path, format, hash, size, with_local])
        .await
    {
        Ok(stat) => json_response(extra, &stat),
        Err(e) => error_response(extra, e.to_string(), None),
    }
}

pub async fn files_write(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let extra = learned_headers(&state, &method);
    let args = QueryArgs(pairs);

    let uid = match required(&args, "uid", &uri) {
        Ok(uid) => uid.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };

    let rpc = require_rpc!(state, extra);

    if let Err(e) = uid_spawn(&rpc, &uid).await {
        return error_response(extra, e.to_string(), None);
    }

    let path = match required(&args, "path", &uri) {
        Ok(path) => path.to_owned(),
        Err(e) => return error_response(extra, e, None),
    };

    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(e) => return error_response(extra, e.to_string(), None),
    };

    // Re-encode the incoming parts into the single-part envelope the
    // filesystem RPC expects, concatenating their bytes in order.
    let mut writer = FormFileWriter::new("upload");
    loop {
        match multipart.next_field().await {
            Ok(Some(mut field)) => loop {
                match field.chunk().await {
                    Ok(Some(chunk)) => writer.write(&chunk),
                    Ok(None) => break,
                    Err(e) => return error_response(extra, e.to_string(), None),
                }
            },
            Ok(None) => break,
            Err(e) => return error_response(extra, e.to_string(), None),
        }
    }
    let form = writer.finish();

    let request = FilesWriteRequest {
        content_type: form.content_type,
        body: form.body,
        params: vec![
            uid,
            path,
            args.owned("offset"),
            args.owned("create"),
            args.owned("truncate"),
            args.owned("count"),
            args.owned("raw-leaves"),
            args.owned("cid-version"),
            args.owned("hash"),
        ],
    };

    match rpc.files_write(request).await {
        Ok(()) => empty_response(extra),
        Err(e) => error_response(extra, e.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tar_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn concatenates_in_lexicographic_order() {
        let archive = tar_with(&[("b.txt", "world"), ("a.txt", "hello ")]);
        let bytes = extract_and_concatenate(archive).unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[test]
    fn walks_nested_directories() {
        let archive = tar_with(&[("dir/inner.txt", "nested"), ("top.txt", "|top")]);
        let bytes = extract_and_concatenate(archive).unwrap();
        assert_eq!(bytes, b"nested|top");
    }

    #[test]
    fn empty_archive_yields_empty_output() {
        let archive = tar_with(&[]);
        let bytes = extract_and_concatenate(archive).unwrap();
        assert!(bytes.is_empty());
    }
}
