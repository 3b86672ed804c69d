use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },
}

/// Command-line surface: `server [-d|--dev] [-h|--help] [config_file]`.
#[derive(Debug, Parser)]
#[command(name = "nanoserve", about = "Event-driven static file server")]
pub struct Cli {
    /// Force development mode regardless of the config file.
    #[arg(short, long)]
    pub dev: bool,

    /// Path to the config file.
    #[arg(default_value = "config/server.conf")]
    pub config_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub workers: usize,
    pub root_dir: PathBuf,
    pub log_file: PathBuf,
    pub keep_alive_timeout_secs: u64,
    pub development_mode: bool,

    // Tunables the core needs defaults for; not present in every deployment's
    // config file, so they carry their own defaults independent of the
    // required keys above.
    pub max_connections_per_worker: usize,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_requests: u32,
    pub rate_limit_max_concurrent_per_ip: u32,
    pub rate_limit_violations_before_ban: u32,
    pub rate_limit_ban_duration_secs: u64,
    pub cache_table_size: usize,
    pub cache_max_entry_bytes: usize,
    pub cache_max_total_bytes: usize,
    pub cache_ttl_secs: u64,
    pub rate_limit_table_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            workers: 4,
            root_dir: PathBuf::from("./content"),
            log_file: PathBuf::from("logs/server.log"),
            keep_alive_timeout_secs: 60,
            development_mode: false,
            max_connections_per_worker: 4096,
            rate_limit_window_secs: 60,
            rate_limit_max_requests: 1000,
            rate_limit_max_concurrent_per_ip: 50,
            rate_limit_violations_before_ban: 3,
            rate_limit_ban_duration_secs: 600,
            cache_table_size: 10_000,
            cache_max_entry_bytes: 5 * 1024 * 1024,
            cache_max_total_bytes: 100 * 1024 * 1024,
            cache_ttl_secs: 3600,
            rate_limit_table_size: 4096,
        }
    }
}

impl ServerConfig {
    /// Parses a `key = value` file, one directive per line. `#`-prefixed and
    /// blank lines are skipped; unknown keys are returned to the caller to
    /// log at warn rather than silently dropped.
    pub fn load(path: &Path) -> Result<(Self, Vec<String>), ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::default();
        let mut unknown_keys = Vec::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            config.apply(key, value, &mut unknown_keys)?;
        }

        Ok((config, unknown_keys))
    }

    fn apply(
        &mut self,
        key: &str,
        value: &str,
        unknown_keys: &mut Vec<String>,
    ) -> Result<(), ConfigError> {
        let parse_u16 = || {
            value
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })
        };
        let parse_u64 = || {
            value
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })
        };
        let parse_usize = || {
            value
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })
        };
        let parse_bool = || match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            }),
        };

        match key {
            "port" => self.port = parse_u16()?,
            "workers" => self.workers = parse_usize()?,
            "root_dir" => self.root_dir = PathBuf::from(value),
            "log_file" => self.log_file = PathBuf::from(value),
            "keep_alive_timeout" => self.keep_alive_timeout_secs = parse_u64()?,
            "development_mode" => self.development_mode = parse_bool()?,
            "max_connections_per_worker" => self.max_connections_per_worker = parse_usize()?,
            "rate_limit_window" => self.rate_limit_window_secs = parse_u64()?,
            "rate_limit_max_requests" => {
                self.rate_limit_max_requests =
                    value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?
            }
            "rate_limit_max_concurrent_per_ip" => {
                self.rate_limit_max_concurrent_per_ip =
                    value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?
            }
            "rate_limit_violations_before_ban" => {
                self.rate_limit_violations_before_ban =
                    value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?
            }
            "rate_limit_ban_duration" => self.rate_limit_ban_duration_secs = parse_u64()?,
            "cache_table_size" => self.cache_table_size = parse_usize()?,
            "cache_max_entry_bytes" => self.cache_max_entry_bytes = parse_usize()?,
            "cache_max_total_bytes" => self.cache_max_total_bytes = parse_usize()?,
            "cache_ttl" => self.cache_ttl_secs = parse_u64()?,
            "rate_limit_table_size" => self.rate_limit_table_size = parse_usize()?,
            other => unknown_keys.push(other.to_string()),
        }
        Ok(())
    }

    /// Applies CLI overrides on top of a loaded config. Only `--dev` can
    /// override the file today; the listen port and worker count are fixed
    /// for the process lifetime once chosen (see SPEC_FULL.md §4.11).
    pub fn apply_cli(&mut self, cli: &Cli) {
        if cli.dev {
            self.development_mode = true;
        }
    }
}
