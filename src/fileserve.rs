use std::path::Path;
use std::time::SystemTime;

use tokio::fs;

use crate::compress;
use crate::http::response::{Response, ResponseBody};
use crate::http::{date, Request};
use crate::mime::{self, MimeType};

pub struct FileInfo {
    pub size: u64,
    pub modified: SystemTime,
    pub etag: String,
    pub mime: MimeType,
}

#[derive(Debug)]
pub enum ServeError {
    NotFound,
    Io,
}

/// `stat`s the resolved path and computes its ETag
/// (`"<hex inode>-<hex size>-<hex mtime>"`), rejecting anything that isn't a
/// regular file.
pub async fn stat(path: &Path) -> Result<FileInfo, ServeError> {
    let metadata = fs::metadata(path).await.map_err(|_| ServeError::NotFound)?;
    if !metadata.is_file() {
        return Err(ServeError::NotFound);
    }

    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let mtime_secs = modified
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    #[cfg(unix)]
    let inode = {
        use std::os::unix::fs::MetadataExt;
        metadata.ino()
    };
    #[cfg(not(unix))]
    let inode: u64 = 0;

    let etag = format!("\"{:x}-{:x}-{:x}\"", inode, metadata.len(), mtime_secs);

    Ok(FileInfo {
        size: metadata.len(),
        modified,
        etag,
        mime: mime::get_mime_type_enum(path),
    })
}

/// Serves the file at `path` into `response`: reads fully into memory and
/// compresses when negotiated and eligible, otherwise leaves the response
/// holding an open file handle for chunked streaming by the connection
/// writer. Always sets Content-Type/Last-Modified/ETag/Vary/Cache-Control.
pub async fn serve(
    path: &Path,
    info: &FileInfo,
    request: &Request,
    response: &mut Response,
) -> Result<(), ServeError> {
    response.set_header("Content-Type", info.mime.as_str());
    response.set_header("Last-Modified", date::format(info.modified));
    response.set_header("ETag", &info.etag);
    response.set_header("Vary", "Accept-Encoding, User-Agent");
    response.set_header("Cache-Control", mime::cache_control_for(info.mime));

    let encoding = compress::negotiate(request.header("accept-encoding"));

    if compress::should_compress(info.mime, encoding, info.size) {
        let raw = fs::read(path).await.map_err(|_| ServeError::Io)?;
        match compress::compress(&raw, info.mime, encoding) {
            Ok(compressed) => {
                response.set_header("Content-Encoding", encoding.header_value().unwrap());
                response.set_header("Content-Length", compressed.len().to_string());
                response.body = ResponseBody::InMemory(compressed);
                return Ok(());
            }
            Err(_) => {
                // Compression failed; fall through and serve the file
                // uncompressed rather than fail the request.
                response.headers.retain(|(k, _)| !k.eq_ignore_ascii_case("content-encoding"));
            }
        }
    }

    let handle = fs::File::open(path).await.map_err(|_| ServeError::Io)?;
    response.set_header("Content-Length", info.size.to_string());
    response.body = ResponseBody::File {
        handle,
        len: info.size,
    };
    Ok(())
}
