use std::sync::Arc;

/// Body representation as a proper sum type instead of flag combinations
/// (`is_file`/`is_cached`/`compressed_body != null`) — SPEC_FULL.md §9.
/// Not `Clone`: an open file handle can't be duplicated cheaply, and every
/// caller that needs an independent copy of a response builds one from
/// scratch instead (see `Response::framed_head_with_forced_keepalive`).
pub enum ResponseBody {
    Empty,
    InMemory(Vec<u8>),
    /// A response already fully framed (status line + headers + body) as
    /// retrieved from the cache; written verbatim. `header_len` marks where
    /// the body starts, so a HEAD request can write just the head without
    /// re-parsing the stored bytes.
    Cached { bytes: Arc<[u8]>, header_len: usize },
    /// An open file to be streamed in fixed-size chunks starting at the
    /// current position, known length.
    File {
        handle: tokio::fs::File,
        len: u64,
    },
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Empty => write!(f, "Empty"),
            ResponseBody::InMemory(b) => write!(f, "InMemory({} bytes)", b.len()),
            ResponseBody::Cached { bytes, .. } => write!(f, "Cached({} bytes)", bytes.len()),
            ResponseBody::File { len, .. } => write!(f, "File({} bytes)", len),
        }
    }
}

#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub status_text: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
    pub keep_alive: bool,
    /// Set by `clear_body_for_head` for a `Cached` body: the writer emits
    /// only the head slice (`bytes[..header_len]`) instead of the full blob.
    pub head_only: bool,
}

pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            status_text: status_text(status),
            headers: vec![("Server".to_string(), "nanoserve".to_string())],
            body: ResponseBody::Empty,
            keep_alive: true,
            head_only: false,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            existing.1 = value;
        } else {
            self.headers.push((name.to_string(), value));
        }
    }

    pub fn body_len(&self) -> u64 {
        match &self.body {
            ResponseBody::Empty => 0,
            ResponseBody::InMemory(b) => b.len() as u64,
            ResponseBody::Cached { bytes, header_len } => (bytes.len() - header_len) as u64,
            ResponseBody::File { len, .. } => *len,
        }
    }

    /// Clears the body while keeping every header (including
    /// `Content-Length`) intact, for HEAD responses. For a cached response
    /// the headers live inside the stored byte blob rather than in
    /// `self.headers`, so instead of discarding the body this just marks
    /// the response to write only the cached head slice.
    pub fn clear_body_for_head(&mut self) {
        match &self.body {
            ResponseBody::Cached { .. } => self.head_only = true,
            _ => self.body = ResponseBody::Empty,
        }
    }

    /// Frames the status line + headers (not the body) into `out`. Callers
    /// append exactly one `Connection` header themselves via
    /// `finalize_connection_header` before calling this, and must have set
    /// `Content-Length` exactly once (SPEC_FULL.md §9a).
    pub fn write_head(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(b"HTTP/1.1 ");
        out.extend_from_slice(self.status.to_string().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.status_text.as_bytes());
        out.extend_from_slice(b"\r\n");
        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
    }

    /// Appends the single `Connection` header (keep-alive carries a
    /// `Keep-Alive: timeout=N` companion) right before framing. Must run
    /// exactly once per response.
    pub fn finalize_connection_header(&mut self, keep_alive_timeout_secs: u64) {
        if self.keep_alive {
            self.set_header("Connection", "keep-alive");
            self.set_header("Keep-Alive", format!("timeout={}", keep_alive_timeout_secs));
        } else {
            self.set_header("Connection", "close");
        }
    }

    /// Frames status line + headers as if this response were forced
    /// keep-alive, without mutating or cloning `self`. Used when caching a
    /// fresh response: the cached copy must always offer keep-alive (the
    /// original request's `Connection` header has no bearing on what a later,
    /// unrelated request serving from the cache should get), but the live
    /// response being returned to the current caller keeps its own
    /// `Connection` header as already finalized.
    pub fn framed_head_with_forced_keepalive(&self, keep_alive_timeout_secs: u64) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"HTTP/1.1 ");
        out.extend_from_slice(self.status.to_string().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.status_text.as_bytes());
        out.extend_from_slice(b"\r\n");
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("connection") || name.eq_ignore_ascii_case("keep-alive") {
                continue;
            }
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"Connection: keep-alive\r\n");
        out.extend_from_slice(format!("Keep-Alive: timeout={}\r\n", keep_alive_timeout_secs).as_bytes());
        out.extend_from_slice(b"\r\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_header_replaces_existing_case_insensitively() {
        let mut r = Response::new(200);
        r.set_header("content-type", "text/plain");
        r.set_header("Content-Type", "text/html");
        let matches: Vec<_> = r
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].1, "text/html");
    }

    #[test]
    fn write_head_emits_status_line_and_terminator() {
        let mut r = Response::new(404);
        r.set_header("Content-Length", "0");
        let mut out = Vec::new();
        r.write_head(&mut out);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn finalize_connection_header_is_exclusive() {
        let mut r = Response::new(200);
        r.keep_alive = true;
        r.finalize_connection_header(60);
        assert_eq!(
            r.headers
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case("connection"))
                .count(),
            1
        );
        assert!(r.headers.iter().any(|(k, v)| k == "Keep-Alive" && v == "timeout=60"));
    }

    #[test]
    fn framed_head_with_forced_keepalive_overrides_close() {
        let mut r = Response::new(200);
        r.keep_alive = false;
        r.finalize_connection_header(60);
        let framed = r.framed_head_with_forced_keepalive(30);
        let text = String::from_utf8(framed).unwrap();
        assert!(text.contains("Connection: keep-alive"));
        assert!(text.contains("Keep-Alive: timeout=30"));
        assert!(!text.contains("Connection: close"));
    }
}
