//! Rust Bank Server Library
//! # Overview
//!
//! This library provides an in-memory account ledger driven by a line-oriented
//! command stream and processed concurrently by a fixed pool of worker threads.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (accounts, requests, outcomes, errors)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Concurrent processing components:
//!   - [`core::account_store`] - Arena of individually lockable accounts
//!   - [`core::request_queue`] - FIFO between the producer and the workers
//!   - [`core::engine`] - Balance checks and lock-ordered atomic transfers
//!   - [`core::worker_pool`] - Worker threads and the shutdown coordinator
//! - [`io`] - Command parsing and the result log
//! - [`server`] - The producer loop tying everything together
//!
//! # Request Types
//!
//! - **Balance Check**: Read one account under its lock
//! - **Transfer**: Apply several signed amounts (ten by default) atomically;
//!   if any account would go negative nothing is written and the first such
//!   account (by ascending id) is reported
//!
//! # Concurrency
//!
//! - One mutex guards the request queue; idle workers block on a condition variable
//! - Every account has its own lock; multiple locks are always taken in
//!   ascending account id order, which rules out deadlock between transfers
//! - The result log has its own lock, never held together with an account lock

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod logging;
pub mod server;
pub mod types;

pub use crate::core::{AccountStore, RequestQueue, ResultSink, TransactionEngine, WorkerPool};
pub use server::{BankServer, ServerConfig, SessionSummary};
pub use types::{
    Account, AccountId, BankError, Balance, Outcome, Request, RequestError, RequestKind,
    ResultRecord, TransactionPair,
};
