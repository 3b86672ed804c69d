use std::path::{Path, PathBuf};

use crate::cache::Cache;
use crate::compress;
use crate::fileserve::{self, FileInfo, ServeError};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, ResponseBody};
use crate::http::{self, date};
use crate::logging;
use crate::mime;
use crate::path_resolve::{self, PathError};

pub struct Handler<'a> {
    pub root: &'a Path,
    pub cache: &'a Cache,
    pub keep_alive_timeout_secs: u64,
}

impl<'a> Handler<'a> {
    pub fn new(root: &'a Path, cache: &'a Cache, keep_alive_timeout_secs: u64) -> Self {
        Self {
            root,
            cache,
            keep_alive_timeout_secs,
        }
    }

    /// Runs the full dispatch: method check, path resolution, cache consult,
    /// conditional evaluation, file serve, and access logging. Never returns
    /// an `Err` — every failure mode is mapped to a response, matching
    /// SPEC_FULL.md §7 ("handler never throws").
    pub async fn handle(&self, request: &Request, client_ip: &str) -> Response {
        let mut response = self.handle_inner(request).await;
        response.keep_alive = response.keep_alive && request.keep_alive;
        response.finalize_connection_header(self.keep_alive_timeout_secs);

        logging::log_access(
            client_ip,
            method_name(request.method),
            &request.uri,
            response.status,
            response.body_len() as usize,
        );

        if request.method == Method::Head {
            response.clear_body_for_head();
        }

        response
    }

    async fn handle_inner(&self, request: &Request) -> Response {
        if request.method != Method::Get && request.method != Method::Head {
            return error_response(501);
        }

        let uri_path = if request.uri == "/" {
            "/index.html".to_string()
        } else {
            request.uri.clone()
        };

        let resolved = match path_resolve::resolve(self.root, &uri_path) {
            Ok(path) => path,
            Err(PathError::Traversal) | Err(PathError::OutsideRoot) | Err(PathError::NotResolvable) => {
                return error_response(403);
            }
        };

        let resolved_str = resolved.to_string_lossy().to_string();
        let encoding = compress::negotiate(request.header("accept-encoding"));

        if let Some(hit) = self.cache.lookup(&resolved_str, encoding.token()) {
            if let Some(if_none_match) = request.header("if-none-match") {
                if http::etag_matches(if_none_match, &hit.etag) {
                    return not_modified_cached(&hit.etag);
                }
            }
            let mut response = Response::new(200);
            response.body = ResponseBody::Cached {
                bytes: hit.bytes,
                header_len: hit.header_len,
            };
            return response;
        }

        self.serve_fresh(&resolved, &resolved_str, &encoding, request).await
    }

    async fn serve_fresh(
        &self,
        resolved: &PathBuf,
        resolved_str: &str,
        encoding: &compress::Encoding,
        request: &Request,
    ) -> Response {
        let info = match fileserve::stat(resolved).await {
            Ok(info) => info,
            Err(ServeError::NotFound) | Err(ServeError::Io) => return error_response(404),
        };

        if let Some(if_none_match) = request.header("if-none-match") {
            if http::etag_matches(if_none_match, &info.etag) {
                return not_modified_if_none_match(&info);
            }
        } else if let Some(if_modified_since) = request.header("if-modified-since") {
            if let Some(since) = date::parse(if_modified_since) {
                if info.modified <= since {
                    return not_modified_if_modified_since(&info);
                }
            }
        }

        let mut response = Response::new(200);
        if fileserve::serve(resolved, &info, request, &mut response)
            .await
            .is_err()
        {
            return error_response(404);
        }

        // Cache only fresh, fully in-memory responses under the per-entry
        // size cap; streamed (uncompressed, on-disk) bodies are never
        // cached, matching the original's "only the compressible, in-memory
        // path calls cache_response" behavior.
        if let ResponseBody::InMemory(body) = &response.body {
            if body.len() < 1024 * 1024 {
                let mut framed = response.framed_head_with_forced_keepalive(self.keep_alive_timeout_secs);
                framed.extend_from_slice(body);
                self.cache.insert(resolved_str, encoding.token(), &info.etag, framed);
            }
        }

        response
    }
}

/// 304 for a cache hit: ETag only, matching `find_cached_response`'s
/// not-modified branch (`http.c:1006`), which never touches
/// Cache-Control/Vary since the cached bytes already carry them.
fn not_modified_cached(etag: &str) -> Response {
    let mut response = Response::new(304);
    response.set_header("ETag", etag);
    response.body = ResponseBody::Empty;
    response
}

/// 304 for a fresh If-None-Match match: ETag, Cache-Control, Vary
/// (`http.c:1128-1150`).
fn not_modified_if_none_match(info: &FileInfo) -> Response {
    let mut response = Response::new(304);
    response.set_header("ETag", &info.etag);
    response.set_header("Cache-Control", mime::cache_control_for(info.mime));
    response.set_header("Vary", "Accept-Encoding, User-Agent");
    response.body = ResponseBody::Empty;
    response
}

/// 304 for a fresh If-Modified-Since match: ETag, Last-Modified, Vary
/// (`http.c:1195-1201`).
fn not_modified_if_modified_since(info: &FileInfo) -> Response {
    let mut response = Response::new(304);
    response.set_header("ETag", &info.etag);
    response.set_header("Last-Modified", date::format(info.modified));
    response.set_header("Vary", "Accept-Encoding, User-Agent");
    response.body = ResponseBody::Empty;
    response
}

pub fn error_response(status: u16) -> Response {
    let mut response = Response::new(status);
    let body = format!("{} {}", status, crate::http::response::status_text(status));
    response.set_header("Content-Type", "text/plain; charset=utf-8");
    response.set_header("Content-Length", body.len().to_string());
    response.keep_alive = status != 400 && status != 403 && status != 501 && status != 505;
    response.body = ResponseBody::InMemory(body.into_bytes());
    response
}

fn method_name(method: Method) -> &'static str {
    match method {
        Method::Get => "GET",
        Method::Head => "HEAD",
        Method::Other => "OTHER",
    }
}
