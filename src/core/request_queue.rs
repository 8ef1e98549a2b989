//! Request queue shared by the producer and the worker pool
//!
//! This module provides the `RequestQueue`, a FIFO of pending requests guarded
//! by a single mutex. The mutex protects the pending requests together with the
//! two lifecycle flags, so every check-then-wait happens atomically:
//!
//! - `accepting`: cleared by `close`; later enqueues are rejected
//! - `stopping`: set by `signal_stop`; idle workers wake up and exit once the
//!   queue is empty
//!
//! The same mutex also counts the consumers still attached through a
//! `ConsumerLease`, so a drain wait can tell when nobody is left to serve it.
//!
//! # Blocking
//!
//! Nothing spins. Workers park on the `available` condition variable until a
//! request arrives or the stop flag is raised; the shutdown coordinator parks
//! on `drained` until the last pending request has been dequeued.

use crate::types::{BankError, Request};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{trace, warn};

#[derive(Debug)]
struct QueueState {
    pending: VecDeque<Request>,
    accepting: bool,
    stopping: bool,
    consumers: usize,
}

/// Thread-safe FIFO between the producer and the workers
#[derive(Debug)]
pub struct RequestQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    drained: Condvar,
}

impl RequestQueue {
    /// Create an empty queue that accepts requests
    pub fn new() -> Self {
        RequestQueue {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                accepting: true,
                stopping: false,
                consumers: 0,
            }),
            available: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    /// Append a request to the tail of the queue
    ///
    /// Wakes one idle worker.
    ///
    /// # Errors
    ///
    /// Returns `BankError::QueueClosed` if `close` has already been called.
    /// The rejected request is dropped.
    pub fn enqueue(&self, request: Request) -> Result<(), BankError> {
        let mut state = self.state.lock();
        if !state.accepting {
            warn!(request = request.id, "Request queue is closed, request dropped");
            return Err(BankError::QueueClosed {
                request: request.id,
            });
        }

        trace!(request = request.id, pending = state.pending.len() + 1, "Enqueued");
        state.pending.push_back(request);
        drop(state);

        self.available.notify_one();
        Ok(())
    }

    /// Remove the request at the head of the queue without blocking
    #[cfg(test)]
    pub fn try_dequeue(&self) -> Option<Request> {
        let mut state = self.state.lock();
        self.pop_front(&mut state)
    }

    /// Wait for the next request
    ///
    /// Blocks while the queue is empty and the stop flag is clear.
    ///
    /// # Returns
    ///
    /// * `Some(request)` - The request at the head of the queue
    /// * `None` - The stop flag is set and the queue is empty; the worker
    ///   should exit
    pub fn dequeue(&self) -> Option<Request> {
        let mut state = self.state.lock();
        loop {
            if let Some(request) = self.pop_front(&mut state) {
                return Some(request);
            }
            if state.stopping {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    fn pop_front(&self, state: &mut QueueState) -> Option<Request> {
        let request = state.pending.pop_front()?;
        if state.pending.is_empty() {
            self.drained.notify_all();
        }
        Some(request)
    }

    /// Number of requests waiting to be dequeued
    pub fn size(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Whether no requests are waiting
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Stop accepting new requests
    ///
    /// Requests already queued stay queued and will still be served.
    pub fn close(&self) {
        self.state.lock().accepting = false;
    }

    /// Whether `close` has been called
    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        !self.state.lock().accepting
    }

    /// Register a consumer; it stays attached until the lease is dropped
    pub fn attach_consumer(self: &Arc<Self>) -> ConsumerLease {
        self.state.lock().consumers += 1;
        ConsumerLease {
            queue: Arc::clone(self),
        }
    }

    /// Block until every queued request has been dequeued
    ///
    /// Dequeued requests may still be executing when this returns. The wait
    /// also ends once no consumer is attached any more, since nothing could
    /// drain the queue after that.
    ///
    /// # Returns
    ///
    /// The number of requests left behind, zero after a normal drain
    pub fn wait_until_drained(&self) -> usize {
        let mut state = self.state.lock();
        while !state.pending.is_empty() && state.consumers > 0 {
            self.drained.wait(&mut state);
        }
        state.pending.len()
    }

    /// Raise the stop flag and wake every idle worker
    ///
    /// Workers keep draining the queue; `dequeue` only returns `None` once the
    /// flag is set and nothing is left.
    pub fn signal_stop(&self) {
        self.state.lock().stopping = true;
        self.available.notify_all();
    }
}

/// Keeps a consumer counted by its queue
///
/// Dropped when the consumer exits, including while unwinding from a panic.
#[derive(Debug)]
pub struct ConsumerLease {
    queue: Arc<RequestQueue>,
}

impl Drop for ConsumerLease {
    fn drop(&mut self) {
        let mut state = self.queue.state.lock();
        state.consumers -= 1;
        if state.consumers == 0 {
            self.queue.drained.notify_all();
        }
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_new_queue_is_empty() {
        let queue = RequestQueue::new();
        assert_eq!(queue.size(), 0);
        assert!(queue.is_empty());
        assert!(!queue.is_closed());
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn test_fifo_order() {
        let queue = RequestQueue::new();
        for id in 1..=5 {
            queue.enqueue(Request::check(id, 1)).unwrap();
        }
        assert_eq!(queue.size(), 5);

        let ids: Vec<_> = std::iter::from_fn(|| queue.try_dequeue())
            .map(|request| request.id)
            .collect();

        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_size_tracks_interleaved_operations() {
        let queue = RequestQueue::new();
        queue.enqueue(Request::check(1, 1)).unwrap();
        queue.enqueue(Request::check(2, 1)).unwrap();
        assert_eq!(queue.try_dequeue().unwrap().id, 1);
        queue.enqueue(Request::check(3, 1)).unwrap();

        assert_eq!(queue.size(), 2);
        assert_eq!(queue.try_dequeue().unwrap().id, 2);
        assert_eq!(queue.try_dequeue().unwrap().id, 3);
        assert_eq!(queue.size(), 0);
    }

    #[test]
    fn test_enqueue_after_close_is_rejected() {
        let queue = RequestQueue::new();
        queue.enqueue(Request::check(1, 1)).unwrap();
        queue.close();

        let result = queue.enqueue(Request::check(2, 1));

        assert_eq!(result.unwrap_err(), BankError::QueueClosed { request: 2 });
        assert_eq!(queue.size(), 1);
        assert!(queue.is_closed());
    }

    #[test]
    fn test_close_keeps_pending_requests() {
        let queue = RequestQueue::new();
        queue.enqueue(Request::check(1, 1)).unwrap();
        queue.close();
        queue.signal_stop();

        assert_eq!(queue.dequeue().unwrap().id, 1);
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_dequeue_blocks_until_enqueue() {
        let queue = Arc::new(RequestQueue::new());
        let (tx, rx) = mpsc::channel();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let request = queue.dequeue();
                tx.send(request.map(|r| r.id)).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        queue.enqueue(Request::check(7, 1)).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Some(7));
        consumer.join().unwrap();
    }

    #[test]
    fn test_signal_stop_wakes_idle_workers() {
        let queue = Arc::new(RequestQueue::new());

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.dequeue().is_none())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        queue.signal_stop();

        for worker in workers {
            assert!(worker.join().unwrap());
        }
    }

    #[test]
    fn test_stop_does_not_discard_pending_work() {
        let queue = RequestQueue::new();
        for id in 1..=3 {
            queue.enqueue(Request::check(id, 1)).unwrap();
        }
        queue.signal_stop();

        let ids: Vec<_> = std::iter::from_fn(|| queue.dequeue())
            .map(|request| request.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_wait_until_drained_returns_immediately_when_empty() {
        let queue = Arc::new(RequestQueue::new());
        let _lease = queue.attach_consumer();
        assert_eq!(queue.wait_until_drained(), 0);
    }

    #[test]
    fn test_wait_until_drained_waits_for_consumer() {
        let queue = Arc::new(RequestQueue::new());
        for id in 1..=100 {
            queue.enqueue(Request::check(id, 1)).unwrap();
        }

        let consumer = {
            let lease = queue.attach_consumer();
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let _lease = lease;
                let mut served = 0;
                while queue.try_dequeue().is_some() {
                    served += 1;
                    thread::yield_now();
                }
                served
            })
        };

        assert_eq!(queue.wait_until_drained(), 0);
        assert!(queue.is_empty());
        assert_eq!(consumer.join().unwrap(), 100);
    }

    #[test]
    fn test_wait_until_drained_gives_up_when_consumers_detach() {
        let queue = Arc::new(RequestQueue::new());
        for id in 1..=5 {
            queue.enqueue(Request::check(id, 1)).unwrap();
        }
        let (tx, rx) = mpsc::channel();

        let consumer = {
            let lease = queue.attach_consumer();
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let _lease = lease;
                queue.dequeue().map(|r| r.id)
            })
        };
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || tx.send(queue.wait_until_drained()).unwrap())
        };

        assert_eq!(consumer.join().unwrap(), Some(1));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 4);
        waiter.join().unwrap();
    }

    #[test]
    fn test_wait_without_consumers_reports_pending() {
        let queue = RequestQueue::new();
        queue.enqueue(Request::check(1, 1)).unwrap();
        assert_eq!(queue.wait_until_drained(), 1);
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        let queue = Arc::new(RequestQueue::new());

        let producers: Vec<_> = (0..4u64)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..250 {
                        queue.enqueue(Request::check(p * 1000 + i, 1)).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        assert_eq!(queue.size(), 1000);
        let mut ids: Vec<_> = std::iter::from_fn(|| queue.try_dequeue())
            .map(|r| r.id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 1000);
    }
}
