use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::buffer_pool::BufferPool;
use crate::cache::Cache;
use crate::handler::{self, Handler};
use crate::http::request::{self, ParseError};
use crate::http::response::{Response, ResponseBody};
use crate::rate_limit::RateLimiter;

const SLOW_LORIS_TIMEOUT: Duration = Duration::from_secs(10);
const SLOW_LORIS_MIN_BYTES: usize = 4;
const SLOW_LORIS_READ_WINDOW: Duration = Duration::from_secs(5);
const SLOW_LORIS_MAX_SINGLE_BYTE_READS: u32 = 100;

pub struct ConnectionContext<'a> {
    pub root: &'a std::path::Path,
    pub cache: &'a Cache,
    pub rate_limiter: &'a RateLimiter,
    pub buffer_pool: &'a BufferPool,
    pub keep_alive_timeout: Duration,
}

/// Runs one connection end to end: acquires a pooled buffer, reads until a
/// complete request is available, dispatches it through the handler, writes
/// the framed response, and repeats until keep-alive ends or a timeout/abuse
/// heuristic closes the socket. Mirrors the state machine in SPEC_FULL.md
/// §4.9 (reading -> dispatching -> writing -> reading | closed), realized as
/// `.await` suspension instead of a manually tracked readiness mode.
pub async fn run(mut stream: TcpStream, client_ip: String, ctx: ConnectionContext<'_>) {
    let Some(mut buffer) = ctx.buffer_pool.acquire() else {
        // Pool exhausted: reject rather than allocate (SPEC_FULL.md §4.1).
        return;
    };
    buffer.clear();

    let connection_start = Instant::now();
    let mut total_bytes_received: usize = 0;
    let mut single_byte_reads = 0u32;
    let mut single_byte_window_start = Instant::now();

    let handler = Handler::new(ctx.root, ctx.cache, ctx.keep_alive_timeout.as_secs());

    'connection: loop {
        // Try to parse a request already sitting in the buffer (pipelining).
        loop {
            match request::parse(&buffer) {
                Ok(Some((request, consumed))) => {
                    buffer.drain(..consumed);
                    let response = handler.handle(&request, &client_ip).await;
                    let keep_alive = response.keep_alive;
                    if write_response(&mut stream, response).await.is_err() {
                        break 'connection;
                    }
                    if !keep_alive {
                        break 'connection;
                    }
                    continue;
                }
                Ok(None) => break,
                Err(ParseError::UnsupportedVersion) => {
                    let mut response = handler::error_response(505);
                    response.finalize_connection_header(ctx.keep_alive_timeout.as_secs());
                    let _ = write_response(&mut stream, response).await;
                    break 'connection;
                }
                Err(ParseError::BadRequest) => {
                    let mut response = handler::error_response(400);
                    response.finalize_connection_header(ctx.keep_alive_timeout.as_secs());
                    let _ = write_response(&mut stream, response).await;
                    break 'connection;
                }
            }
        }

        let mut chunk = [0u8; 4096];
        let read_result = timeout(ctx.keep_alive_timeout, stream.read(&mut chunk)).await;

        let n = match read_result {
            Ok(Ok(0)) => break 'connection,
            Ok(Ok(n)) => n,
            Ok(Err(_)) => break 'connection,
            Err(_) => break 'connection, // idle timeout
        };

        if n == 1 {
            if single_byte_window_start.elapsed() > SLOW_LORIS_READ_WINDOW {
                single_byte_window_start = Instant::now();
                single_byte_reads = 0;
            }
            single_byte_reads += 1;
            if single_byte_reads > SLOW_LORIS_MAX_SINGLE_BYTE_READS {
                break 'connection;
            }
        }

        total_bytes_received += n;

        if connection_start.elapsed() > SLOW_LORIS_TIMEOUT
            && total_bytes_received < SLOW_LORIS_MIN_BYTES
        {
            break 'connection;
        }

        buffer.extend_from_slice(&chunk[..n]);
    }

    ctx.buffer_pool.release(buffer);
    ctx.rate_limiter.release_connection(&client_ip);
}

async fn write_response(stream: &mut TcpStream, response: Response) -> std::io::Result<()> {
    let mut framed = Vec::with_capacity(512);
    response.write_head(&mut framed);

    match response.body {
        ResponseBody::Empty => {
            stream.write_all(&framed).await?;
        }
        ResponseBody::InMemory(body) => {
            framed.extend_from_slice(&body);
            stream.write_all(&framed).await?;
        }
        ResponseBody::Cached { bytes, header_len } => {
            // Cached bytes are already a complete framed response; the
            // freshly built `framed` head (status line + our own headers)
            // is discarded in favor of the stored one. For HEAD requests
            // only the head slice is written, body omitted.
            let slice: &[u8] = if response.head_only {
                &bytes[..header_len]
            } else {
                &bytes
            };
            stream.write_all(slice).await?;
        }
        ResponseBody::File { mut handle, len } => {
            stream.write_all(&framed).await?;
            let mut remaining = len;
            let mut chunk = [0u8; 64 * 1024];
            while remaining > 0 {
                let to_read = chunk.len().min(remaining as usize);
                let n = tokio::io::AsyncReadExt::read(&mut handle, &mut chunk[..to_read]).await?;
                if n == 0 {
                    break;
                }
                stream.write_all(&chunk[..n]).await?;
                remaining -= n as u64;
            }
        }
    }

    stream.flush().await?;
    Ok(())
}
