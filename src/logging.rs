use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Replaces non-printable ASCII bytes with `?` before a client-controlled
/// string (method, URI, header value) reaches the log, matching the
/// original's `sanitize_for_log`.
pub fn sanitize_for_log(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii_graphic() || ch == ' ' {
            out.push(ch);
        } else {
            out.push('?');
        }
    }
    out
}

/// Initializes the global `tracing` subscriber: leveled, filtered by
/// `RUST_LOG` (defaulting to `info`, or `debug` in development mode),
/// writing to both the configured log file and stderr.
pub fn init(log_file: &Path, development_mode: bool) -> std::io::Result<()> {
    if let Some(parent) = log_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    let default_level = if development_mode { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let writer = Mutex::new(file).and(std::io::stderr);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .init();

    Ok(())
}

/// One access-log record per completed request, combined-log-style:
/// `ip "METHOD URI" status bytes`.
pub fn log_access(ip: &str, method: &str, uri: &str, status: u16, bytes: usize) {
    let method = sanitize_for_log(method);
    let uri = sanitize_for_log(uri);
    let mut line = String::with_capacity(ip.len() + method.len() + uri.len() + 24);
    let _ = write!(line, "{} \"{} {}\" {} {}", ip, method, uri, status, bytes);
    tracing::info!(target: "access", "{}", line);
}
