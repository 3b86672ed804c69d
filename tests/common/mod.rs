use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use nanoserve::buffer_pool::BufferPool;
use nanoserve::cache::Cache;
use nanoserve::connection::{self, ConnectionContext};
use nanoserve::rate_limit::{RateLimiter, RateLimiterConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Writes `request` to a fresh connection and reads back one full response:
/// the head (parsed into status + headers) and, when `Content-Length` is
/// present, exactly that many body bytes. Good enough for the request shapes
/// these tests issue; it does not handle chunked transfer encoding, which
/// this server never emits.
pub async fn roundtrip(addr: SocketAddr, request: &str) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    read_response(&mut stream).await
}

pub async fn read_response(stream: &mut TcpStream) -> RawResponse {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = find_header_end(&raw) {
            break pos;
        }
        let n = timeout(Duration::from_secs(2), stream.read(&mut chunk))
            .await
            .expect("timed out waiting for response head")
            .unwrap();
        assert!(n > 0, "connection closed before a full response head arrived");
        raw.extend_from_slice(&chunk[..n]);
    };

    let head = std::str::from_utf8(&raw[..header_end]).unwrap();
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap();
    let status: u16 = status_line.split_whitespace().nth(1).unwrap().parse().unwrap();

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.push((k.trim().to_string(), v.trim().to_string()));
        }
    }

    let body_start = header_end + 4;
    let mut body = raw[body_start..].to_vec();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok());

    if let Some(expected) = content_length {
        while body.len() < expected {
            let n = timeout(Duration::from_secs(2), stream.read(&mut chunk))
                .await
                .expect("timed out waiting for response body")
                .unwrap();
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
    }

    RawResponse {
        status,
        headers,
        body,
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

pub struct TestServer {
    pub addr: SocketAddr,
    root: std::path::PathBuf,
    cache: Arc<Cache>,
    rate_limiter: Arc<RateLimiter>,
    buffer_pool: Arc<BufferPool>,
}

/// Binds an ephemeral local listener and spawns an accept loop that hands
/// each connection to `connection::run`, the same per-connection entry point
/// `worker::run` uses. Standing up a whole worker thread (with its
/// `SO_REUSEPORT` socket and CPU pinning) per test would be both slow and
/// irrelevant to what these tests check, so this harness reuses only the
/// per-connection plumbing.
pub async fn spawn(root: &std::path::Path, development_mode: bool) -> TestServer {
    spawn_with_buffer_capacity(root, development_mode, 64).await
}

pub async fn spawn_with_buffer_capacity(
    root: &std::path::Path,
    development_mode: bool,
    buffer_capacity: usize,
) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let cache = Arc::new(Cache::new(128, 5 * 1024 * 1024, 100 * 1024 * 1024, 3600));
    let rate_limiter = Arc::new(RateLimiter::new(
        64,
        RateLimiterConfig {
            window: Duration::from_secs(60),
            max_requests_per_window: 1000,
            max_concurrent_per_ip: 1000,
            violations_before_ban: 3,
            ban_duration: Duration::from_secs(600),
            development_mode,
        },
    ));
    let buffer_pool = Arc::new(BufferPool::new(buffer_capacity));
    let root = root.to_path_buf();

    let accept_root = root.clone();
    let accept_cache = Arc::clone(&cache);
    let accept_rate_limiter = Arc::clone(&rate_limiter);
    let accept_buffer_pool = Arc::clone(&buffer_pool);

    tokio::spawn(async move {
        loop {
            let Ok((stream, peer)) = listener.accept().await else {
                break;
            };
            let _ = stream.set_nodelay(true);
            let root = accept_root.clone();
            let cache = Arc::clone(&accept_cache);
            let rate_limiter = Arc::clone(&accept_rate_limiter);
            let buffer_pool = Arc::clone(&accept_buffer_pool);
            tokio::spawn(async move {
                connection::run(
                    stream,
                    peer.ip().to_string(),
                    ConnectionContext {
                        root: &root,
                        cache: &cache,
                        rate_limiter: &rate_limiter,
                        buffer_pool: &buffer_pool,
                        keep_alive_timeout: Duration::from_secs(5),
                    },
                )
                .await;
            });
        }
    });

    TestServer {
        addr,
        root,
        cache,
        rate_limiter,
        buffer_pool,
    }
}

impl TestServer {
    pub fn cache_stats(&self) -> nanoserve::cache::CacheStats {
        self.cache.stats()
    }

    #[allow(dead_code)]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    #[allow(dead_code)]
    pub fn buffer_pool_available(&self) -> usize {
        self.buffer_pool.available()
    }

    #[allow(dead_code)]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}
