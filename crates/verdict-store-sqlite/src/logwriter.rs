// crates/verdict-store-sqlite/src/logwriter.rs
// ============================================================================
// Module: Buffered Execution-Log Writer
// Description: Fire-and-forget execution-log persistence with backpressure.
// Purpose: Keep the evaluation path unblocked while batching appends into
//          the store.
// Dependencies: verdict-core
// ============================================================================

//! ## Overview
//! The writer buffers execution records in a bounded in-memory ring and
//! drains them in batches on a background worker. Backpressure policy:
//! evaluations are never blocked — when the ring is full the *oldest*
//! pending log entry is dropped and the dropped-log counter increments.
//! Persistence failures are counted and the batch is abandoned; the
//! evaluation path never observes them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use verdict_core::EngineTelemetry;
use verdict_core::ExecutionRecord;
use verdict_core::ExecutionSink;
use verdict_core::RuleStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum records drained per worker batch.
const BATCH_MAX: usize = 64;
/// Worker wake-up interval when idle.
const IDLE_WAIT: Duration = Duration::from_millis(200);
/// Grace period granted to the worker on shutdown.
const STOP_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// SECTION: Shared State
// ============================================================================

/// Ring buffer shared between producers and the worker.
struct Ring {
    /// Pending records, oldest first.
    pending: Mutex<VecDeque<ExecutionRecord>>,
    /// Wakes the worker on new records or shutdown.
    wake: Condvar,
    /// Ring capacity.
    capacity: usize,
    /// Records shed under backpressure.
    dropped: AtomicU64,
    /// Persistence failures observed by the worker.
    write_failures: AtomicU64,
    /// Shutdown flag.
    stopping: AtomicBool,
}

impl Ring {
    /// Acquires the pending-queue guard, recovering from poisoning.
    fn pending(&self) -> std::sync::MutexGuard<'_, VecDeque<ExecutionRecord>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Buffered, batching execution-log writer.
///
/// # Invariants
/// - `append` never blocks on I/O and never fails.
/// - Overflow drops the oldest pending entry, never the newest evaluation.
pub struct BufferedLogWriter {
    /// Shared ring state.
    ring: Arc<Ring>,
    /// Worker join handle.
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl BufferedLogWriter {
    /// Spawns a writer draining into the given store.
    #[must_use]
    pub fn spawn(
        store: Arc<dyn RuleStore>,
        capacity: usize,
        telemetry: Arc<dyn EngineTelemetry>,
    ) -> Self {
        let ring = Arc::new(Ring {
            pending: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            wake: Condvar::new(),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            stopping: AtomicBool::new(false),
        });
        let worker_ring = Arc::clone(&ring);
        let worker = thread::spawn(move || drain_loop(&worker_ring, &store, &telemetry));
        Self {
            ring,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Returns the number of persistence failures observed so far.
    #[must_use]
    pub fn write_failures(&self) -> u64 {
        self.ring.write_failures.load(Ordering::Relaxed)
    }

    /// Blocks until the pending queue is empty or the timeout elapses.
    ///
    /// Returns `true` when the queue drained in time.
    #[must_use]
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if self.ring.pending().is_empty() {
                return true;
            }
            self.ring.wake.notify_all();
            thread::sleep(Duration::from_millis(10));
        }
        self.ring.pending().is_empty()
    }

    /// Signals shutdown and waits briefly for the worker to drain.
    fn shutdown(&self) {
        self.ring.stopping.store(true, Ordering::Relaxed);
        self.ring.wake.notify_all();
        let Ok(mut slot) = self.worker.lock() else {
            return;
        };
        if let Some(worker) = slot.take() {
            let deadline = std::time::Instant::now() + STOP_GRACE;
            while !worker.is_finished() && std::time::Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if worker.is_finished() {
                let _ = worker.join();
            }
        }
    }
}

impl ExecutionSink for BufferedLogWriter {
    fn append(&self, record: ExecutionRecord) {
        {
            let mut pending = self.ring.pending();
            if pending.len() >= self.ring.capacity {
                pending.pop_front();
                self.ring.dropped.fetch_add(1, Ordering::Relaxed);
            }
            pending.push_back(record);
        }
        self.ring.wake.notify_one();
    }

    fn dropped_count(&self) -> u64 {
        self.ring.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for BufferedLogWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// Worker loop draining batches into the store until shutdown.
fn drain_loop(ring: &Arc<Ring>, store: &Arc<dyn RuleStore>, telemetry: &Arc<dyn EngineTelemetry>) {
    loop {
        let batch = next_batch(ring);
        if batch.is_empty() && ring.stopping.load(Ordering::Relaxed) {
            return;
        }
        for record in batch {
            if let Err(err) = store.append_execution(&record) {
                ring.write_failures.fetch_add(1, Ordering::Relaxed);
                telemetry.note("EXECUTION_LOG_WRITE_FAILED", &err.to_string());
            }
        }
    }
}

/// Waits for work and drains up to one batch.
fn next_batch(ring: &Arc<Ring>) -> Vec<ExecutionRecord> {
    let mut pending = ring.pending();
    while pending.is_empty() && !ring.stopping.load(Ordering::Relaxed) {
        let (guard, _timeout) = match ring.wake.wait_timeout(pending, IDLE_WAIT) {
            Ok(outcome) => outcome,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending = guard;
    }
    let take = pending.len().min(BATCH_MAX);
    pending.drain(.. take).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
