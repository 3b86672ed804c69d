use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::buffer_pool::BufferPool;
use crate::cache::Cache;
use crate::connection::{self, ConnectionContext};
use crate::rate_limit::{Admission, RateLimiter};

const STATS_INTERVAL: Duration = Duration::from_secs(10);

/// State one worker thread owns and every connection task spawned from it
/// borrows: the document root, response cache, rate limiter, and a fixed
/// pool of read buffers. One instance per worker, not one per server —
/// mirrors `worker_t` in the original, minus the epoll fd and client table
/// that Tokio's task scheduler makes unnecessary.
pub struct WorkerShared {
    pub root: std::path::PathBuf,
    pub cache: Cache,
    pub rate_limiter: RateLimiter,
    pub buffer_pool: BufferPool,
    pub keep_alive_timeout: Duration,
}

/// One worker's event loop: accept connections from the shared listener,
/// gate them through the rate limiter, and spawn a task per connection.
/// Mirrors `worker_run`'s accept-then-dispatch cycle, with `epoll_wait`'s
/// readiness polling replaced by `listener.accept().await` and the periodic
/// stats/cleanup tick realized as a second branch of the same `select!`
/// instead of a wall-clock check made once per epoll iteration.
///
/// Each spawned connection task runs inside its own Tokio task, which is
/// Tokio's own panic boundary: a panic inside `connection::run` unwinds that
/// task only, logs via the runtime's default hook, and never brings down the
/// worker thread's executor. No manual `catch_unwind` is needed here; it
/// would only be needed if connection handling ran inline on this loop.
pub async fn run(
    worker_id: usize,
    listener: Arc<TcpListener>,
    shared: Arc<WorkerShared>,
    shutdown: Arc<AtomicBool>,
) {
    tracing::info!(worker_id, "worker starting");

    let mut connection_count: u64 = 0;
    let mut requests_at_last_tick: u64 = 0;
    let mut stats_tick = tokio::time::interval(STATS_INTERVAL);
    stats_tick.tick().await; // first tick fires immediately; skip it
    // A short tick purely so the loop re-checks `shutdown` even while
    // `accept()` has nothing to return — the async equivalent of the
    // original's 1-second `epoll_wait` timeout.
    let mut shutdown_poll = tokio::time::interval(Duration::from_millis(500));

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        tokio::select! {
            _ = shutdown_poll.tick() => {
                continue;
            }
            accept_result = listener.accept() => {
                let (stream, addr) = match accept_result {
                    Ok(pair) => pair,
                    Err(err) => {
                        tracing::warn!(worker_id, error = %err, "accept failed");
                        continue;
                    }
                };

                let client_ip = addr.ip().to_string();

                if shared.rate_limiter.check_and_admit(&client_ip) == Admission::Deny {
                    tracing::warn!(worker_id, ip = %client_ip, "rejecting connection: rate limited");
                    drop(stream);
                    continue;
                }

                let _ = stream.set_nodelay(true);
                connection_count += 1;

                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    connection::run(
                        stream,
                        client_ip,
                        ConnectionContext {
                            root: &shared.root,
                            cache: &shared.cache,
                            rate_limiter: &shared.rate_limiter,
                            buffer_pool: &shared.buffer_pool,
                            keep_alive_timeout: shared.keep_alive_timeout,
                        },
                    )
                    .await;
                });
            }
            _ = stats_tick.tick() => {
                let stats = shared.cache.stats();
                let requests = stats.hits + stats.misses;
                let rate = requests.saturating_sub(requests_at_last_tick) / STATS_INTERVAL.as_secs();
                requests_at_last_tick = requests;

                tracing::info!(
                    worker_id,
                    requests_per_sec = rate,
                    total_connections = connection_count,
                    cache_hits = stats.hits,
                    cache_misses = stats.misses,
                    "worker stats tick",
                );

                shared.rate_limiter.cleanup_idle();
            }
        }
    }

    tracing::info!(worker_id, "worker shutting down gracefully");
}
