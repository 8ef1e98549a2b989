//! Core business logic module
//!
//! This module contains the concurrent request processing components:
//! - `traits` - Trait abstractions for result sinks
//! - `account_store` - Arena of individually lockable accounts
//! - `request_queue` - FIFO between the producer and the workers
//! - `engine` - Balance checks and lock-ordered atomic transfers
//! - `worker_pool` - Worker threads and the shutdown coordinator

pub mod account_store;
pub mod engine;
pub mod request_queue;
pub mod traits;
pub mod worker_pool;

pub use account_store::{AccountGuard, AccountStore};
pub use engine::TransactionEngine;
pub use request_queue::{ConsumerLease, RequestQueue};
pub use traits::ResultSink;
pub use worker_pool::{ShutdownReport, WorkerPool};
