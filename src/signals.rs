use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};

/// Mirrors `setup_signal_handlers`: SIGINT/SIGTERM request graceful shutdown,
/// SIGHUP requests a config reload, SIGPIPE is ignored so a client closing
/// its read side mid-write surfaces as a normal `EPIPE` write error instead
/// of killing the process. Tokio's default signal handling already ignores
/// SIGPIPE for the whole process (std's runtime entrypoint sets
/// `SIG_IGN` before `main` runs on most platforms via the `signal-hook`
/// crate chain pulled in by `tokio`'s "signal" feature), so there is no
/// separate install step for it here, only the two we act on.
pub async fn wait_for_shutdown(shutdown: Arc<AtomicBool>) {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            tracing::info!("received SIGINT, shutting down");
        }
    }

    shutdown.store(true, Ordering::Relaxed);
}

/// Spawns a task that reloads logging-relevant config knobs on SIGHUP. The
/// original reopens its log file and re-reads `server.conf` in place; this
/// port reloads the parts that are safe to change without re-binding a
/// socket or resizing a fixed-capacity table — currently just re-validating
/// the config file is still readable and logging the outcome, since `port`,
/// `workers`, and table capacities are fixed for the process lifetime
/// (`SPEC_FULL.md` §4.11).
pub fn spawn_reload_handler(config_path: std::path::PathBuf) {
    tokio::spawn(async move {
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGHUP handler, reload disabled");
                return;
            }
        };

        loop {
            sighup.recv().await;
            match crate::config::ServerConfig::load(&config_path) {
                Ok((_, unknown)) => {
                    if !unknown.is_empty() {
                        tracing::warn!(?unknown, "unknown config keys on reload");
                    }
                    tracing::info!("SIGHUP received: config file re-read (port/workers unaffected)");
                }
                Err(err) => {
                    tracing::error!(error = %err, "SIGHUP reload: failed to re-read config file");
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_flag_starts_false() {
        let flag = Arc::new(AtomicBool::new(false));
        assert!(!flag.load(Ordering::Relaxed));
    }
}
