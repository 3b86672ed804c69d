use std::io::Write;

use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;

use crate::mime::MimeType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gzip,
    Deflate,
    Identity,
}

impl Encoding {
    pub fn token(self) -> &'static str {
        match self {
            Encoding::Gzip => "gzip",
            Encoding::Deflate => "deflate",
            Encoding::Identity => "none",
        }
    }

    pub fn header_value(self) -> Option<&'static str> {
        match self {
            Encoding::Gzip => Some("gzip"),
            Encoding::Deflate => Some("deflate"),
            Encoding::Identity => None,
        }
    }
}

/// Scans `Accept-Encoding` preferring gzip over deflate, with no q-value
/// parsing — a plain substring search, matching `http_negotiate_compression`.
pub fn negotiate(accept_encoding: Option<&str>) -> Encoding {
    let Some(value) = accept_encoding else {
        return Encoding::Identity;
    };
    let lower = value.to_ascii_lowercase();
    if lower.contains("gzip") {
        Encoding::Gzip
    } else if lower.contains("deflate") {
        Encoding::Deflate
    } else {
        Encoding::Identity
    }
}

const COMPRESSIBLE_SIZE_CAP: u64 = 10 * 1024 * 1024;

pub fn should_compress(mime: MimeType, encoding: Encoding, size: u64) -> bool {
    encoding != Encoding::Identity && mime.is_compressible() && size <= COMPRESSIBLE_SIZE_CAP
}

/// Compression level by MIME type: text/script types get the default level,
/// images and generic binary get the minimum (they rarely compress well and
/// the cost isn't worth it), fonts and SVG get the maximum (small, static,
/// worth spending CPU once).
fn level_for(mime: MimeType) -> Compression {
    match mime {
        MimeType::Html | MimeType::Css | MimeType::Javascript => Compression::default(),
        MimeType::Png | MimeType::Jpeg | MimeType::Gif | MimeType::OctetStream => {
            Compression::fast()
        }
        MimeType::Woff | MimeType::Woff2 | MimeType::Ttf | MimeType::Eot | MimeType::Svg => {
            Compression::best()
        }
        _ => Compression::default(),
    }
}

#[derive(Debug)]
pub struct CompressError;

/// Compresses `body` with the given encoding and a level chosen by MIME
/// type. The source's manual buffer-sizing/retry dance
/// (`body_len+128` then `2x`) is not needed with `flate2`'s streaming writer,
/// which always drains to completion; the same sizing is kept only as the
/// output `Vec`'s initial capacity hint to avoid reallocation.
pub fn compress(body: &[u8], mime: MimeType, encoding: Encoding) -> Result<Vec<u8>, CompressError> {
    let level = level_for(mime);
    let capacity_hint = body.len() + 128;

    match encoding {
        Encoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::with_capacity(capacity_hint), level);
            encoder.write_all(body).map_err(|_| CompressError)?;
            encoder.finish().map_err(|_| CompressError)
        }
        Encoding::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::with_capacity(capacity_hint), level);
            encoder.write_all(body).map_err(|_| CompressError)?;
            encoder.finish().map_err(|_| CompressError)
        }
        Encoding::Identity => Ok(body.to_vec()),
    }
}
