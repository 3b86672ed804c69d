pub mod date;
pub mod request;
pub mod response;

pub use request::{parse, Method, ParseError, Request, Version};
pub use response::{Response, ResponseBody};

/// Parses a comma-separated `If-None-Match` value into tokens with `W/`
/// weak-validator prefixes and surrounding quotes stripped, matching the
/// original's token parser. A bare `*` token matches any ETag.
pub fn parse_etag_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|tok| {
            let tok = tok.trim();
            let tok = tok.strip_prefix("W/").unwrap_or(tok);
            tok.trim_matches('"').to_string()
        })
        .collect()
}

pub fn strip_etag_quotes(etag: &str) -> &str {
    let etag = etag.strip_prefix("W/").unwrap_or(etag);
    etag.trim_matches('"')
}

pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let target = strip_etag_quotes(etag);
    parse_etag_list(if_none_match)
        .iter()
        .any(|tok| tok == "*" || tok == target)
}
