use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;

use nanoserve::config::{Cli, ServerConfig};
use nanoserve::{logging, master, signals};

/// Creates any missing leading directories for `path`'s parent, matching
/// `ensure_directories_exist` — the original's own hand-rolled recursive
/// `mkdir`, here just `std::fs::create_dir_all` on the parent component.
fn ensure_parent_dirs(path: &std::path::Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                eprintln!("failed to create directory {}: {}", parent.display(), err);
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let (mut config, unknown_keys) = match ServerConfig::load(&cli.config_file) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!(
                "warning: failed to load {}: {} — using defaults",
                cli.config_file.display(),
                err
            );
            (ServerConfig::default(), Vec::new())
        }
    };
    config.apply_cli(&cli);

    ensure_parent_dirs(&config.log_file);
    if let Err(err) = std::fs::create_dir_all(&config.root_dir) {
        eprintln!("failed to create root directory {}: {}", config.root_dir.display(), err);
    }

    if let Err(err) = logging::init(&config.log_file, config.development_mode) {
        eprintln!("failed to initialize logging: {}", err);
        std::process::exit(1);
    }

    for key in &unknown_keys {
        tracing::warn!(key, "unknown config key ignored");
    }
    if config.development_mode {
        tracing::info!("development mode enabled: rate limiting and bans are bypassed");
    }

    tracing::info!(
        port = config.port,
        workers = config.workers,
        root = %config.root_dir.display(),
        "nanoserve starting",
    );

    let shutdown = Arc::new(AtomicBool::new(false));

    let signal_runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build signal-handling runtime");
    let signal_shutdown = Arc::clone(&shutdown);
    let config_path_for_reload = cli.config_file.clone();
    std::thread::spawn(move || {
        signal_runtime.block_on(async move {
            signals::spawn_reload_handler(config_path_for_reload);
            signals::wait_for_shutdown(signal_shutdown).await;
        });
    });

    if let Err(err) = master::run(config, shutdown) {
        tracing::error!(error = %err, "server exited with error");
        std::process::exit(1);
    }

    tracing::info!("nanoserve shutdown complete");
}
