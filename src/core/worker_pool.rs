//! Worker pool and shutdown coordinator
//!
//! This module provides the `WorkerPool`, a fixed set of OS threads that pull
//! requests from the shared `RequestQueue`, execute them with the
//! `TransactionEngine` and hand the results to a `ResultSink`.
//!
//! # Worker Loop
//!
//! ```text
//! Idle ──dequeue──▶ Dispatching ──▶ Executing ──▶ Done ──▶ Idle
//!   │
//!   └── stop flag set and queue empty ──▶ exit
//! ```
//!
//! Idle workers block on the queue's condition variable; they never poll.
//!
//! # Shutdown
//!
//! `shutdown` closes the queue to new requests, waits for it to drain, raises
//! the stop flag and joins every worker. Requests dequeued just before the
//! flag was raised are finished by their workers before they observe
//! `(stop && empty)` and exit.
//!
//! Each worker holds a consumer lease on the queue for as long as its thread
//! runs. If every worker has died the drain wait ends early and the requests
//! still queued are reported as abandoned.

use crate::core::engine::TransactionEngine;
use crate::core::request_queue::RequestQueue;
use crate::core::traits::ResultSink;
use crate::types::{BankError, Request, RequestKind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::SystemTime;
use tracing::{debug, error, info, trace};

/// Where a worker is in its loop, used for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Dispatching,
    Executing,
    Done,
}

/// A single long-lived worker
pub struct Worker {
    id: usize,
    queue: Arc<RequestQueue>,
    engine: TransactionEngine,
    sink: Arc<dyn ResultSink>,
}

impl Worker {
    /// Create a new worker
    pub fn new(
        id: usize,
        queue: Arc<RequestQueue>,
        engine: TransactionEngine,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            id,
            queue,
            engine,
            sink,
        }
    }

    /// Run the worker's main loop until the stop flag is set and the queue is empty
    ///
    /// # Returns
    ///
    /// The number of requests this worker processed
    pub fn run(self) -> u64 {
        debug!("Worker {} started", self.id);
        let mut processed = 0;

        loop {
            trace!(worker = self.id, state = ?WorkerState::Idle);
            let Some(request) = self.queue.dequeue() else {
                break;
            };
            self.process(request);
            processed += 1;
        }

        debug!("Worker {} stopped after {} requests", self.id, processed);
        processed
    }

    fn process(&self, request: Request) {
        let kind = match request.kind {
            RequestKind::Check { .. } => "check",
            RequestKind::Transfer { .. } => "transfer",
        };
        trace!(worker = self.id, request = request.id, kind, state = ?WorkerState::Dispatching);

        trace!(worker = self.id, request = request.id, state = ?WorkerState::Executing);
        let outcome = match self.engine.execute(&request) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Worker {}: request {} failed: {}", self.id, request.id, e);
                return;
            }
        };

        let record = request.complete(outcome, SystemTime::now());
        if let Err(e) = self.sink.record(&record) {
            error!(
                "Worker {}: failed to record result of request {}: {}",
                self.id, record.request_id, e
            );
        }
        trace!(worker = self.id, request = record.request_id, %outcome, state = ?WorkerState::Done);
    }
}

/// Per-worker statistics returned by `WorkerPool::shutdown`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Requests processed by each worker, indexed by worker id
    pub processed: Vec<u64>,
}

impl ShutdownReport {
    /// Requests processed across all workers
    pub fn total(&self) -> u64 {
        self.processed.iter().sum()
    }
}

/// Fixed pool of worker threads sharing one request queue
pub struct WorkerPool {
    queue: Arc<RequestQueue>,
    workers: Vec<JoinHandle<u64>>,
}

impl WorkerPool {
    /// Spawn `count` workers
    ///
    /// # Arguments
    ///
    /// * `count` - Number of worker threads (at least one)
    /// * `queue` - Queue the workers pull from
    /// * `engine` - Engine shared by every worker
    /// * `sink` - Destination for completed request records
    ///
    /// # Errors
    ///
    /// Returns `BankError::InvalidWorkerCount` for a zero count, or
    /// `BankError::WorkerSpawn` if the OS refuses a thread. Workers already
    /// started are stopped and joined before the error is returned.
    pub fn spawn(
        count: usize,
        queue: Arc<RequestQueue>,
        engine: TransactionEngine,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self, BankError> {
        if count == 0 {
            return Err(BankError::InvalidWorkerCount { count: 0 });
        }

        let mut pool = WorkerPool {
            queue: Arc::clone(&queue),
            workers: Vec::with_capacity(count),
        };

        for id in 0..count {
            let worker = Worker::new(id, Arc::clone(&queue), engine.clone(), Arc::clone(&sink));
            let lease = queue.attach_consumer();
            let handle = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || {
                    let _lease = lease;
                    worker.run()
                })
                .map_err(|e| BankError::WorkerSpawn {
                    worker: id,
                    message: e.to_string(),
                })?;
            pool.workers.push(handle);
        }

        info!("Started {} workers", count);
        Ok(pool)
    }

    /// Number of running workers
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the pool has no running workers
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Drain the queue, stop the workers and join them
    ///
    /// Blocks until every request enqueued before this call has been
    /// processed, or until no worker is left alive to process them. No
    /// request can be enqueued once this has started.
    ///
    /// # Errors
    ///
    /// Returns `BankError::WorkerPanicked` if a worker thread panicked. All
    /// other workers are still joined.
    pub fn shutdown(mut self) -> Result<ShutdownReport, BankError> {
        self.queue.close();
        debug!("Waiting for {} queued requests to drain", self.queue.size());
        let abandoned = self.queue.wait_until_drained();
        if abandoned > 0 {
            error!("No workers left alive, {} queued requests abandoned", abandoned);
        }

        self.queue.signal_stop();
        let report = Self::join_all(std::mem::take(&mut self.workers))?;

        info!(
            "Worker pool stopped, {} requests processed by {} workers",
            report.total(),
            report.processed.len()
        );
        Ok(report)
    }

    fn join_all(workers: Vec<JoinHandle<u64>>) -> Result<ShutdownReport, BankError> {
        let mut processed = Vec::with_capacity(workers.len());
        let mut first_panic = None;

        for (id, handle) in workers.into_iter().enumerate() {
            match handle.join() {
                Ok(count) => processed.push(count),
                Err(_) => {
                    error!("Worker {} panicked", id);
                    processed.push(0);
                    first_panic.get_or_insert(BankError::WorkerPanicked { worker: id });
                }
            }
        }

        match first_panic {
            Some(e) => Err(e),
            None => Ok(ShutdownReport { processed }),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.queue.close();
        self.queue.signal_stop();
        let _ = Self::join_all(std::mem::take(&mut self.workers));
    }
}
