use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::os::unix::io::{AsRawFd, FromRawFd};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::buffer_pool::BufferPool;
use crate::cache::Cache;
use crate::config::ServerConfig;
use crate::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::worker::{self, WorkerShared};

/// Binds the listening socket with `SO_REUSEADDR`/`SO_REUSEPORT` set before
/// `bind`, matching `master_init`'s socket setup. Built with raw `libc` calls
/// rather than `std::net::TcpListener::bind` because std offers no way to
/// set `SO_REUSEPORT` before binding.
fn bind_listener(port: u16) -> std::io::Result<StdTcpListener> {
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(std::io::Error::last_os_error());
        }

        let optval: libc::c_int = 1;
        let opt_ptr = &optval as *const libc::c_int as *const libc::c_void;
        let opt_len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

        if libc::setsockopt(fd, libc::SOL_SOCKET, libc::SO_REUSEADDR, opt_ptr, opt_len) < 0 {
            let err = std::io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }
        // SO_REUSEPORT lets every worker thread's runtime `accept()` off the
        // same bound address; harmless to also hold the listener behind an
        // `Arc` as this code does, but kept for parity with the original's
        // socket setup and so the kernel load-balances `accept()` wakeups
        // across threads instead of a thundering herd on one `Arc`'d fd.
        if libc::setsockopt(fd, libc::SOL_SOCKET, libc::SO_REUSEPORT, opt_ptr, opt_len) < 0 {
            tracing::warn!("SO_REUSEPORT unavailable on this platform, continuing without it");
        }

        let addr: SocketAddr = format!("0.0.0.0:{}", port).parse().expect("valid socket addr");
        let sockaddr = socket_addr_to_sockaddr_in(&addr);

        let bind_result = libc::bind(
            fd,
            &sockaddr as *const libc::sockaddr_in as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        );
        if bind_result < 0 {
            let err = std::io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        if libc::listen(fd, libc::SOMAXCONN) < 0 {
            let err = std::io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);

        Ok(StdTcpListener::from_raw_fd(fd))
    }
}

fn socket_addr_to_sockaddr_in(addr: &SocketAddr) -> libc::sockaddr_in {
    let SocketAddr::V4(v4) = addr else {
        panic!("only IPv4 listeners are supported");
    };
    libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: v4.port().to_be(),
        sin_addr: libc::in_addr {
            s_addr: u32::from_ne_bytes(v4.ip().octets()),
        },
        sin_zero: [0; 8],
    }
}

/// Raises the process's open-file-descriptor limit, matching
/// `set_resource_limits`'s `RLIMIT_NOFILE` bump. Failure is logged and
/// otherwise ignored — the process runs with whatever limit the platform
/// already grants, same as the original's "continuing anyway" comment.
fn raise_fd_limit(target: u64) {
    let limit = libc::rlimit {
        rlim_cur: target,
        rlim_max: target,
    };
    let result = unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &limit) };
    if result != 0 {
        tracing::warn!(
            error = %std::io::Error::last_os_error(),
            "failed to raise RLIMIT_NOFILE, continuing with existing limit",
        );
    }
}

/// Pins the calling thread to `cpu_id % available_cpus`, matching
/// `set_worker_cpu_affinity`. A platform without `sched_setaffinity`
/// (anything non-Linux) simply runs unpinned.
#[cfg(target_os = "linux")]
fn pin_to_cpu(worker_id: usize) {
    unsafe {
        let num_cpus = libc::sysconf(libc::_SC_NPROCESSORS_ONLN);
        if num_cpus <= 0 {
            return;
        }
        let cpu_id = worker_id % num_cpus as usize;

        let mut cpu_set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut cpu_set);
        libc::CPU_SET(cpu_id, &mut cpu_set);

        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &cpu_set) != 0 {
            tracing::warn!(worker_id, "failed to set CPU affinity, continuing unpinned");
        } else {
            tracing::info!(worker_id, cpu_id, "worker pinned to CPU");
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_to_cpu(_worker_id: usize) {}

/// Spawns `config.workers` OS threads, each running its own single-threaded
/// Tokio runtime against the shared listener, and blocks until every worker
/// thread exits. Mirrors `master_run`'s fork-and-wait loop with threads
/// standing in for processes (Open Question 2, `DESIGN.md`).
pub fn run(config: ServerConfig, shutdown: Arc<AtomicBool>) -> std::io::Result<()> {
    raise_fd_limit(200_000);

    let std_listener = bind_listener(config.port)?;
    std_listener.set_nonblocking(true)?;
    tracing::info!(port = config.port, workers = config.workers, "listening");

    let mut handles = Vec::with_capacity(config.workers);

    for worker_id in 0..config.workers {
        let raw_fd = std_listener.as_raw_fd();
        // Each worker thread gets an independently `dup`'d fd so closing one
        // worker's listener handle on shutdown never closes the others'.
        let dup_fd = unsafe { libc::dup(raw_fd) };
        if dup_fd < 0 {
            return Err(std::io::Error::last_os_error());
        }
        let worker_std_listener = unsafe { StdTcpListener::from_raw_fd(dup_fd) };
        worker_std_listener.set_nonblocking(true)?;

        let root = config.root_dir.clone();
        let keep_alive_timeout = Duration::from_secs(config.keep_alive_timeout_secs);
        let max_connections = config.max_connections_per_worker;
        let rate_limiter_config = RateLimiterConfig {
            window: Duration::from_secs(config.rate_limit_window_secs),
            max_requests_per_window: config.rate_limit_max_requests,
            max_concurrent_per_ip: config.rate_limit_max_concurrent_per_ip,
            violations_before_ban: config.rate_limit_violations_before_ban,
            ban_duration: Duration::from_secs(config.rate_limit_ban_duration_secs),
            development_mode: config.development_mode,
        };
        let cache_table_size = config.cache_table_size;
        let cache_max_entry_bytes = config.cache_max_entry_bytes;
        let cache_max_total_bytes = config.cache_max_total_bytes;
        let cache_ttl_secs = config.cache_ttl_secs;
        let rate_limit_table_size = config.rate_limit_table_size;
        let shutdown = Arc::clone(&shutdown);

        let handle = std::thread::Builder::new()
            .name(format!("worker-{}", worker_id))
            .spawn(move || {
                pin_to_cpu(worker_id);

                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build worker's Tokio runtime");

                runtime.block_on(async move {
                    let listener = TcpListener::from_std(worker_std_listener)
                        .expect("failed to adopt listener into Tokio runtime");

                    let shared = Arc::new(WorkerShared {
                        root,
                        cache: Cache::new(cache_table_size, cache_max_entry_bytes, cache_max_total_bytes, cache_ttl_secs),
                        rate_limiter: RateLimiter::new(rate_limit_table_size, rate_limiter_config),
                        buffer_pool: BufferPool::new(max_connections),
                        keep_alive_timeout,
                    });

                    worker::run(worker_id, Arc::new(listener), shared, shutdown).await;
                });
            })
            .expect("failed to spawn worker thread");

        handles.push(handle);
    }

    drop(std_listener);

    for handle in handles {
        let _ = handle.join();
    }

    Ok(())
}
