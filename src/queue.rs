//! Component E — Work Queue (spec §4.E).
//!
//! A bounded single-producer / multi-consumer ring of [`WorkItem`]s. The
//! spec's hand-rolled counter/CAS ring is the kind of lock-free structure
//! `crossbeam_queue::ArrayQueue` already is (Vyukov's bounded MPMC
//! algorithm); `WorkQueue` wraps it and layers the blocking
//! `wait_not_empty`/signal-on-push contract the spec requires on top,
//! the same way the teacher's `Executor` pairs a lock-free-shaped
//! structure with a `Mutex`/`Condvar` pair purely for the blocking wait
//! path (`src/database.rs`).

use std::sync::{Condvar, Mutex};

use crossbeam_queue::ArrayQueue;
use crossbeam_utils::CachePadded;

use crate::error::QueueError;
use crate::model::WorkItem;

/// Bounded ring plus the blocking-wait machinery around it.
///
/// `capacity` must be a power of two (spec §4.E); [`WorkQueue::new`]
/// rounds up to satisfy this rather than rejecting the caller's value,
/// since the configuration layer already validates it before pool start.
pub struct WorkQueue {
    ring: CachePadded<ArrayQueue<WorkItem>>,
    wait: Mutex<()>,
    not_empty: Condvar,
    shutdown: std::sync::atomic::AtomicBool,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(1);
        WorkQueue {
            ring: CachePadded::new(ArrayQueue::new(capacity)),
            wait: Mutex::new(()),
            not_empty: Condvar::new(),
            shutdown: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Not thread-safe against concurrent producers (spec §4.E); the
    /// accept loop is this queue's sole producer. On a full queue the item
    /// is handed back so the caller can retry rather than losing it.
    pub fn push(&self, item: WorkItem) -> Result<(), (QueueError, WorkItem)> {
        if self.shutdown.load(std::sync::atomic::Ordering::Acquire) {
            return Err((QueueError::ShuttingDown, item));
        }
        match self.ring.push(item) {
            Ok(()) => {
                // Hold the wait mutex across notify so a consumer that is
                // about to check `is_empty` under it can't miss this wakeup.
                let _guard = self.wait.lock().unwrap();
                self.not_empty.notify_one();
                Ok(())
            }
            Err(rejected) => Err((QueueError::Full, rejected)),
        }
    }

    /// Block until an item is available or shutdown is signalled, then pop
    /// one. Returns `None` only once shutdown has been signalled and the
    /// ring has drained.
    pub fn pop_blocking(&self) -> Option<WorkItem> {
        loop {
            if let Some(item) = self.ring.pop() {
                return Some(item);
            }
            if self.shutdown.load(std::sync::atomic::Ordering::Acquire) {
                return None;
            }
            let guard = self.wait.lock().unwrap();
            if !self.ring.is_empty() || self.shutdown.load(std::sync::atomic::Ordering::Acquire) {
                continue;
            }
            let _ = self.not_empty.wait(guard).unwrap();
        }
    }

    /// Non-blocking pop, used by the rare caller that wants to drain what's
    /// left without waiting (e.g. shutdown bookkeeping).
    pub fn try_pop(&self) -> Option<WorkItem> {
        self.ring.pop()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Wake every thread blocked in `pop_blocking` without pushing work
    /// (spec §4.F, "signals every worker ... to unblock them from
    /// `wait_not_empty`").
    pub fn shutdown(&self) {
        self.shutdown.store(true, std::sync::atomic::Ordering::Release);
        let _guard = self.wait.lock().unwrap();
        self.not_empty.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn dummy_socket() -> WorkItem {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        drop(server);
        client
    }

    #[test]
    fn rounds_capacity_up_to_a_power_of_two() {
        let q = WorkQueue::new(5);
        assert_eq!(q.capacity(), 8);
    }

    #[test]
    fn push_then_pop_round_trips() {
        let q = WorkQueue::new(4);
        assert!(q.push(dummy_socket()).is_ok());
        assert_eq!(q.len(), 1);
        assert!(q.try_pop().is_some());
        assert!(q.is_empty());
    }

    #[test]
    fn push_rejects_once_full() {
        let q = WorkQueue::new(1);
        assert!(q.push(dummy_socket()).is_ok());
        match q.push(dummy_socket()) {
            Err((QueueError::Full, _item)) => {}
            Ok(()) => panic!("expected Full, got Ok"),
            Err((other, _)) => panic!("expected Full, got {other:?}"),
        }
    }

    #[test]
    fn pop_blocking_wakes_on_push() {
        let q = Arc::new(WorkQueue::new(4));
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.pop_blocking());
        thread::sleep(Duration::from_millis(50));
        q.push(dummy_socket()).unwrap();
        assert!(handle.join().unwrap().is_some());
    }

    #[test]
    fn pop_blocking_returns_none_after_shutdown() {
        let q = Arc::new(WorkQueue::new(4));
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.pop_blocking());
        thread::sleep(Duration::from_millis(50));
        q.shutdown();
        assert!(handle.join().unwrap().is_none());
    }

    #[test]
    fn push_rejected_after_shutdown() {
        let q = WorkQueue::new(4);
        q.shutdown();
        match q.push(dummy_socket()) {
            Err((QueueError::ShuttingDown, _item)) => {}
            Ok(()) => panic!("expected ShuttingDown, got Ok"),
            Err((other, _)) => panic!("expected ShuttingDown, got {other:?}"),
        }
    }
}
