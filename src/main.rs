//! Binary entry point: parse configuration, set up logging and the store,
//! install signal handlers, start the worker pool, and run the accept loop
//! (spec §6 "Exit codes": 0 on clean shutdown, non-zero on init failure).

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use reeldb::config::Config;
use reeldb::error::StartupError;
use reeldb::{db, net, pool, queue::WorkQueue};

fn main() -> ExitCode {
    let config = Config::parse();
    simple_logger::SimpleLogger::new()
        .with_level(config.log_filter())
        .init()
        .expect("logger can only be initialized once");

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("startup failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> Result<(), StartupError> {
    config.validate()?;

    db::setup(&config.database_path).map_err(|source| StartupError::Database {
        path: config.database_path.display().to_string(),
        source,
    })?;

    pool::install_signal_handlers().map_err(|e| StartupError::Config(format!("signal setup failed: {e}")))?;

    let work_queue = Arc::new(WorkQueue::new(config.queue_capacity));
    let mut workers = pool::WorkerPool::start(
        config.database_path.clone(),
        work_queue.clone(),
        config.resolved_worker_count(),
    )?;

    let listener = net::bind(config.port, config.backlog).map_err(|source| StartupError::Listener {
        port: config.port,
        source,
    })?;
    log::info!(
        "listening on port {} with {} workers",
        config.port,
        config.resolved_worker_count()
    );

    let timeout = std::time::Duration::from_secs(config.client_timeout_seconds);
    listener
        .set_nonblocking(true)
        .map_err(|source| StartupError::Listener { port: config.port, source })?;

    loop {
        if pool::shutdown_requested() {
            break;
        }
        match listener.accept() {
            Ok((stream, _addr)) => {
                if let Err(e) = net::configure_accepted(&stream, timeout) {
                    log::warn!("failed to configure accepted socket: {e}");
                    continue;
                }
                if !workers.add_work(stream, config.max_enqueue_retries) {
                    log::warn!("admission rejected a connection (queue full or pool dead)");
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(pool::poll_interval());
            }
            Err(e) => {
                log::warn!("accept failed: {e}");
            }
        }
    }

    log::info!("shutdown requested, draining workers");
    workers.shutdown();
    Ok(())
}
