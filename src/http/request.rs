pub const MAX_HEADERS: usize = 64;
pub const MAX_HEADER_BLOCK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub uri: String,
    pub version: Version,
    pub headers: Vec<(String, String)>,
    pub keep_alive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Malformed start line, or more header bytes than fit the connection
    /// buffer without a terminator in sight.
    BadRequest,
    UnsupportedVersion,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Parses a complete request (start line + headers, terminated by the blank
/// line) out of `buf`. Returns the parsed request and the number of bytes it
/// consumed, so the caller can shift the remainder of the buffer for
/// pipelined requests. Does not consume or expect a body.
pub fn parse(buf: &[u8]) -> Result<Option<(Request, usize)>, ParseError> {
    let Some(header_end) = find_header_terminator(buf) else {
        if buf.len() > MAX_HEADER_BLOCK {
            return Err(ParseError::BadRequest);
        }
        return Ok(None);
    };

    let header_block = &buf[..header_end];
    let mut lines = header_block.split(|&b| b == b'\n');

    let request_line = lines.next().ok_or(ParseError::BadRequest)?;
    let request_line = trim_crlf(request_line);
    let (method_bytes, uri_bytes, version_bytes) =
        parse_request_line(request_line).ok_or(ParseError::BadRequest)?;

    let method = match method_bytes {
        b"GET" => Method::Get,
        b"HEAD" => Method::Head,
        _ => Method::Other,
    };

    let version = match version_bytes {
        b"HTTP/1.1" => Version::Http11,
        b"HTTP/1.0" => Version::Http10,
        _ => return Err(ParseError::UnsupportedVersion),
    };

    let uri = std::str::from_utf8(uri_bytes)
        .map_err(|_| ParseError::BadRequest)?
        .to_string();
    if uri.is_empty() || uri.len() > 2047 || !uri.starts_with('/') {
        return Err(ParseError::BadRequest);
    }

    let mut headers = Vec::new();
    for line in lines {
        let line = trim_crlf(line);
        if line.is_empty() {
            continue;
        }
        if headers.len() >= MAX_HEADERS {
            return Err(ParseError::BadRequest);
        }
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            continue;
        };
        let name = std::str::from_utf8(&line[..colon])
            .map_err(|_| ParseError::BadRequest)?
            .to_string();
        let value = std::str::from_utf8(trim_ascii_whitespace(&line[colon + 1..]))
            .map_err(|_| ParseError::BadRequest)?
            .to_string();
        headers.push((name, value));
    }

    let keep_alive = derive_keep_alive(version, &headers);

    let request = Request {
        method,
        uri,
        version,
        headers,
        keep_alive,
    };

    Ok(Some((request, header_end + 4)))
}

fn derive_keep_alive(version: Version, headers: &[(String, String)]) -> bool {
    let connection = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("connection"))
        .map(|(_, v)| v.as_str());

    match connection {
        Some(v) if v.to_ascii_lowercase().contains("close") => false,
        Some(v) if v.to_ascii_lowercase().contains("keep-alive") => true,
        _ => version == Version::Http11,
    }
}

fn find_header_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn trim_crlf(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b'\r' || line[end - 1] == b'\n') {
        end -= 1;
    }
    &line[..end]
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let mut start = 0;
    let mut end = bytes.len();
    while start < end && (bytes[start] == b' ' || bytes[start] == b'\t') {
        start += 1;
    }
    while end > start && (bytes[end - 1] == b' ' || bytes[end - 1] == b'\t') {
        end -= 1;
    }
    &bytes[start..end]
}

fn parse_request_line(line: &[u8]) -> Option<(&[u8], &[u8], &[u8])> {
    let mut parts = line.split(|&b| b == b' ').filter(|p| !p.is_empty());
    let method = parts.next()?;
    let uri = parts.next()?;
    let version = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((method, uri, version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_get() {
        let raw = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let (req, consumed) = parse(raw).unwrap().unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.uri, "/index.html");
        assert_eq!(req.version, Version::Http11);
        assert!(req.keep_alive);
        assert_eq!(consumed, raw.len());
        assert_eq!(req.header("host"), Some("example.com"));
    }

    #[test]
    fn returns_none_for_incomplete_request() {
        let raw = b"GET /index.html HTTP/1.1\r\nHost: exa";
        assert!(parse(raw).unwrap().is_none());
    }

    #[test]
    fn rejects_malformed_start_line() {
        let raw = b"GET /only-two-tokens\r\n\r\n";
        assert_eq!(parse(raw), Err(ParseError::BadRequest));
    }

    #[test]
    fn rejects_unsupported_version() {
        let raw = b"GET / HTTP/2.0\r\n\r\n";
        assert_eq!(parse(raw), Err(ParseError::UnsupportedVersion));
    }

    #[test]
    fn connection_close_overrides_http11_default() {
        let raw = b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n";
        let (req, _) = parse(raw).unwrap().unwrap();
        assert!(!req.keep_alive);
    }

    #[test]
    fn connection_keep_alive_enables_http10() {
        let raw = b"GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n";
        let (req, _) = parse(raw).unwrap().unwrap();
        assert!(req.keep_alive);
    }

    #[test]
    fn http10_defaults_to_close() {
        let raw = b"GET / HTTP/1.0\r\n\r\n";
        let (req, _) = parse(raw).unwrap().unwrap();
        assert!(!req.keep_alive);
    }

    #[test]
    fn rejects_oversized_header_block() {
        let mut raw = Vec::from(&b"GET / HTTP/1.1\r\n"[..]);
        raw.extend(std::iter::repeat(b'a').take(MAX_HEADER_BLOCK + 10));
        assert_eq!(parse(&raw), Err(ParseError::BadRequest));
    }

    #[test]
    fn pipelined_requests_report_correct_consumed_length() {
        let raw = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let (req, consumed) = parse(raw).unwrap().unwrap();
        assert_eq!(req.uri, "/a");
        let (req2, _) = parse(&raw[consumed..]).unwrap().unwrap();
        assert_eq!(req2.uri, "/b");
    }
}
