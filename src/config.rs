//! Runtime configuration (spec §6 "Configuration", SPEC_FULL §2.3).
//!
//! `clap` v4 derive with the `env` feature, following the pack's dominant
//! idiom rather than the teacher's legacy `clap` 2.x builder API (see
//! DESIGN.md).

use std::path::PathBuf;

use clap::Parser;

use crate::error::StartupError;

#[derive(Debug, Parser)]
#[command(name = "reeldb-server", about = "A concurrent movie-catalog server")]
pub struct Config {
    /// Path to the SQLite database file.
    #[arg(long, env = "REELDB_DATABASE_PATH", default_value = "reeldb.sqlite3")]
    pub database_path: PathBuf,

    /// TCP port to listen on.
    #[arg(long, env = "REELDB_PORT", default_value_t = 7878)]
    pub port: u16,

    /// Number of worker threads. Defaults to the host's available
    /// parallelism.
    #[arg(long, env = "REELDB_WORKER_COUNT")]
    pub worker_count: Option<usize>,

    /// Work queue capacity; must be a power of two.
    #[arg(long, env = "REELDB_QUEUE_CAPACITY", default_value_t = 256)]
    pub queue_capacity: usize,

    /// Read/write timeout applied to accepted client sockets, in seconds.
    #[arg(long, env = "REELDB_CLIENT_TIMEOUT_SECONDS", default_value_t = 60)]
    pub client_timeout_seconds: u64,

    /// Spin-retry budget for the admission path when the queue is full.
    #[arg(long, env = "REELDB_MAX_ENQUEUE_RETRIES", default_value_t = 16)]
    pub max_enqueue_retries: u32,

    /// Listener backlog (spec §6: "small (5-32)").
    #[arg(long, env = "REELDB_BACKLOG", default_value_t = 16)]
    pub backlog: u32,

    /// Log level passed to the logger initialized in `main` (SPEC_FULL §2.1).
    #[arg(long, env = "REELDB_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Resolve `worker_count`, falling back to host parallelism.
    pub fn resolved_worker_count(&self) -> usize {
        self.worker_count
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4))
    }

    /// Validate invariants not already enforced by `clap` (spec §2.3:
    /// "queue capacity must be a power of two, port must be nonzero").
    pub fn validate(&self) -> Result<(), StartupError> {
        if self.port == 0 {
            return Err(StartupError::Config("port must be nonzero".into()));
        }
        if !self.queue_capacity.is_power_of_two() {
            return Err(StartupError::Config(format!(
                "queue_capacity must be a power of two, got {}",
                self.queue_capacity
            )));
        }
        if self.resolved_worker_count() == 0 {
            return Err(StartupError::Config("worker_count must be positive".into()));
        }
        Ok(())
    }

    pub fn log_filter(&self) -> log::LevelFilter {
        match self.log_level.to_ascii_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            "off" => log::LevelFilter::Off,
            _ => log::LevelFilter::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two_queue_capacity() {
        let mut cfg = Config::parse_from(["reeldb-server"]);
        cfg.queue_capacity = 100;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_port() {
        let mut cfg = Config::parse_from(["reeldb-server"]);
        cfg.port = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn defaults_validate_cleanly() {
        let cfg = Config::parse_from(["reeldb-server"]);
        assert!(cfg.validate().is_ok());
    }
}
