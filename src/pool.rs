//! Component F — Worker Pool (spec §4.F).
//!
//! A fixed-size pool of worker threads, each owning one store
//! [`Connection`](crate::db::Connection) for its whole lifetime. Lifecycle
//! mirrors the teacher's `Executor` (`src/database.rs`): a `Mutex`/`Condvar`
//! pair gates blocking waits, and worker threads are plain `std::thread`
//! spawns held in a registry keyed by worker id — except here the registry
//! is consulted for liveness probing and respawn, not just join-on-drop, so
//! it is an `FnvHashMap` rather than a `Vec`: probing a specific worker by
//! id is the hot path (every `add_work` call), and FNV is the pack's go-to
//! hasher for small, trusted integer-keyed maps where `SipHash`'s DoS
//! resistance buys nothing (teacher `Cargo.toml`, `fnv = "1.0"`).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use fnv::FnvHashMap;
use once_cell::sync::Lazy;

use crate::db;
use crate::handler;
use crate::model::WorkItem;
use crate::queue::WorkQueue;

/// Set by the SIGINT/SIGTERM handlers, read by the main accept loop and by
/// every worker's hot loop (spec §5, "process-wide `shutdown_requested`
/// flag"). A `Lazy<AtomicBool>` rather than a field on `WorkerPool` because
/// the signal handler that sets it runs with no access to the pool value —
/// signal-hook's `flag::register` needs a `'static` target.
static SHUTDOWN_REQUESTED: Lazy<AtomicBool> = Lazy::new(|| AtomicBool::new(false));

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Acquire)
}

/// One worker's externally-visible liveness flag (spec §3, "A `Worker` (F)
/// is a thread with a `finished` flag readable by others and writable by
/// itself or the main thread").
struct WorkerSlot {
    finished: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerSlot {
    /// A zero-signal liveness probe: `is_finished` costs nothing and tells
    /// us whether the thread has actually exited, independent of whether
    /// anyone asked it to (spec §4.F, "zero-signal probe").
    fn is_alive(&self) -> bool {
        match &self.handle {
            Some(h) => !h.is_finished(),
            None => false,
        }
    }
}

struct WorkerContext {
    database_path: PathBuf,
    queue: Arc<WorkQueue>,
}

/// The fixed-size pool plus the registry backing liveness/respawn.
pub struct WorkerPool {
    ctx: Arc<WorkerContext>,
    queue: Arc<WorkQueue>,
    workers: FnvHashMap<u32, WorkerSlot>,
    next_id: u32,
}

impl WorkerPool {
    /// Spawn `count` workers against `database_path`, sharing `queue`.
    /// Spec §6 "Exit codes": returns [`crate::error::StartupError::Pool`]
    /// if not a single worker could be started.
    pub fn start(
        database_path: PathBuf,
        queue: Arc<WorkQueue>,
        count: usize,
    ) -> Result<Self, crate::error::StartupError> {
        let ctx = Arc::new(WorkerContext { database_path, queue: queue.clone() });
        let mut pool = WorkerPool {
            ctx,
            queue,
            workers: FnvHashMap::default(),
            next_id: 0,
        };
        for _ in 0..count {
            pool.spawn_one();
        }
        if pool.workers.is_empty() {
            return Err(crate::error::StartupError::Pool);
        }
        Ok(pool)
    }

    fn spawn_one(&mut self) {
        let id = self.next_id;
        self.next_id += 1;
        let finished = Arc::new(AtomicBool::new(false));
        let finished_for_thread = finished.clone();
        let ctx = self.ctx.clone();
        let handle = std::thread::Builder::new()
            .name(format!("reeldb-worker-{id}"))
            .spawn(move || worker_loop(id, ctx, finished_for_thread))
            .ok();
        if handle.is_none() {
            log::warn!("worker {id} failed to spawn");
            return;
        }
        self.workers.insert(id, WorkerSlot { finished, handle });
        log::info!("worker {id} started");
    }

    /// Admission path (spec §4.F "Liveness"): probe every worker, respawn
    /// any that died, then hand `item` to the queue with up to `retries`
    /// attempts on a full queue.
    pub fn add_work(&mut self, item: WorkItem, retries: u32) -> bool {
        self.reap_and_respawn();
        if self.workers.is_empty() {
            return false;
        }
        let mut attempt = 0;
        let mut item = item;
        loop {
            match self.queue.push(item) {
                Ok(()) => return true,
                Err((crate::error::QueueError::ShuttingDown, _)) => return false,
                Err((crate::error::QueueError::Full, rejected)) => {
                    attempt += 1;
                    if attempt > retries || shutdown_requested() {
                        return false;
                    }
                    std::hint::spin_loop();
                    std::thread::yield_now();
                    item = rejected;
                }
            }
        }
    }

    fn reap_and_respawn(&mut self) {
        let dead: Vec<u32> = self
            .workers
            .iter()
            .filter(|(_, slot)| !slot.is_alive())
            .map(|(id, _)| *id)
            .collect();
        for id in dead {
            log::warn!("worker {id} found dead on probe, respawning");
            self.workers.remove(&id);
            self.spawn_one();
        }
    }

    /// Observed by the main loop once `shutdown_requested()` is true:
    /// unblock every worker's `wait_not_empty`, join them all, and drop the
    /// queue (spec §4.F "Shutdown").
    pub fn shutdown(mut self) {
        self.queue.shutdown();
        for (id, slot) in self.workers.drain() {
            slot.finished.store(true, Ordering::Release);
            if let Some(handle) = slot.handle {
                if handle.join().is_err() {
                    log::warn!("worker {id} panicked during shutdown join");
                }
            }
        }
    }
}

fn worker_loop(id: u32, ctx: Arc<WorkerContext>, finished: Arc<AtomicBool>) {
    let mut conn = match db::connect(&ctx.database_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("worker {id} failed to connect to database: {e}");
            finished.store(true, Ordering::Release);
            return;
        }
    };
    while !finished.load(Ordering::Acquire) && !shutdown_requested() {
        let socket = match ctx.queue.pop_blocking() {
            Some(item) => item,
            None => break,
        };
        let hard_failure = handler::handle_connection(socket, &mut conn);
        if hard_failure {
            log::error!("worker {id} exiting after hard failure");
            break;
        }
    }
    if let Err(e) = db::disconnect(conn) {
        log::warn!("worker {id} error closing connection on exit: {e}");
    }
    finished.store(true, Ordering::Release);
    log::info!("worker {id} exiting");
}

/// Install the signal policy from spec §4.F: SIGINT/SIGTERM set the
/// process-wide shutdown flag, SIGPIPE is ignored so a mid-response
/// disconnect surfaces as an ordinary write error, and a no-op handler is
/// installed for `SIGUSR1` purely so `signal_hook::low_level::raise` can use
/// it to unblock a worker's blocking wait without terminating anything.
pub fn install_signal_handlers() -> Result<(), std::io::Error> {
    register_shutdown_flag(signal_hook::consts::SIGINT)?;
    register_shutdown_flag(signal_hook::consts::SIGTERM)?;
    unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGPIPE, || {})?;
    }
    unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGUSR1, || {})?;
    }
    Ok(())
}

/// `signal_hook::flag::register` wants an `Arc<AtomicBool>` it owns the
/// write end of; `SHUTDOWN_REQUESTED` is a bare static, so install a
/// low-level handler that stores into it directly instead.
fn register_shutdown_flag(signal: std::os::raw::c_int) -> Result<(), std::io::Error> {
    unsafe {
        signal_hook::low_level::register(signal, || {
            SHUTDOWN_REQUESTED.store(true, Ordering::Release);
        })?;
    }
    Ok(())
}

/// Block until woken by `SIGUSR1` or any short interval elapses; used by
/// the main accept loop to periodically recheck `shutdown_requested`
/// without a separate wakeup channel.
pub fn poll_interval() -> Duration {
    Duration::from_millis(200)
}
