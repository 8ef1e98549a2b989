//! Error types for the bank server
//!
//! This module defines the errors that can occur while starting the server,
//! validating incoming commands and running the worker pool.
//!
//! # Error Categories
//!
//! - **Startup Errors**: Invalid worker/account counts, output file cannot be created
//! - **Request Errors**: Malformed commands, rejected before anything is enqueued
//! - **Runtime Errors**: I/O failures on the result log, worker faults
//!
//! Insufficient funds is deliberately absent: it is a regular transfer
//! outcome, not an error.

use crate::types::{AccountId, RequestId, MAX_AMOUNT};
use thiserror::Error;

/// Main error type for the bank server
///
/// Each variant includes enough context to report the problem to the operator
/// without further lookups.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BankError {
    /// Worker thread count below one
    ///
    /// This is a fatal startup error.
    #[error("Invalid worker thread amount {count}, must be at least 1")]
    InvalidWorkerCount {
        /// The rejected count
        count: i64,
    },

    /// Account count below one
    ///
    /// This is a fatal startup error.
    #[error("Account creation failed: invalid account count {count}, must be at least 1")]
    InvalidAccountCount {
        /// The rejected count
        count: i64,
    },

    /// Transfer pair limit below one
    #[error("Invalid transaction pair limit {limit}, must be at least 1")]
    InvalidPairLimit {
        /// The rejected limit
        limit: usize,
    },

    /// Initial balance below zero or above `MAX_AMOUNT`
    #[error("Invalid initial balance {balance}, must be within 0..={}", MAX_AMOUNT)]
    InvalidInitialBalance {
        /// The rejected balance
        balance: i64,
    },

    /// The output file could not be created
    ///
    /// This is a fatal startup error.
    #[error("Failed to create output file '{path}': {message}")]
    OutputFile {
        /// Path of the output file
        path: String,
        /// Description of the underlying I/O error
        message: String,
    },

    /// I/O error while reading commands or writing results
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// A request was submitted after the queue stopped accepting work
    #[error("Request {request} rejected: the request queue is closed")]
    QueueClosed {
        /// Id of the rejected request
        request: RequestId,
    },

    /// An account id outside `1..=accounts` reached the account store
    #[error("Account {account} does not exist (valid ids are 1..={accounts})")]
    AccountOutOfRange {
        /// The offending account id
        account: AccountId,
        /// Number of accounts in the store
        accounts: usize,
    },

    /// Applying an amount would overflow the balance type
    #[error("Balance overflow on account {account}")]
    BalanceOverflow {
        /// The account whose balance would overflow
        account: AccountId,
    },

    /// A worker thread could not be started
    #[error("Failed to spawn worker {worker}: {message}")]
    WorkerSpawn {
        /// Index of the worker
        worker: usize,
        /// Description of the failure
        message: String,
    },

    /// A worker thread panicked before it could be joined
    #[error("Worker {worker} panicked")]
    WorkerPanicked {
        /// Index of the worker
        worker: usize,
    },
}

// Conversion from io::Error to BankError
impl From<std::io::Error> for BankError {
    fn from(error: std::io::Error) -> Self {
        BankError::IoError {
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to BankError
impl From<csv::Error> for BankError {
    fn from(error: csv::Error) -> Self {
        BankError::IoError {
            message: error.to_string(),
        }
    }
}

impl BankError {
    /// Create an AccountOutOfRange error
    pub fn account_out_of_range(account: AccountId, accounts: usize) -> Self {
        BankError::AccountOutOfRange { account, accounts }
    }

    /// Create a BalanceOverflow error
    pub fn balance_overflow(account: AccountId) -> Self {
        BankError::BalanceOverflow { account }
    }

    /// Create an OutputFile error
    pub fn output_file(path: &str, error: &std::io::Error) -> Self {
        BankError::OutputFile {
            path: path.to_string(),
            message: error.to_string(),
        }
    }
}

/// Reasons a command line is rejected by the producer
///
/// Every variant is recoverable: the line is reported back to the operator
/// and nothing is enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The line contained no tokens
    #[error("empty command, no action taken")]
    EmptyCommand,

    /// The first token is not a known command
    #[error("unknown command '{command}', no action taken")]
    UnknownCommand {
        /// The unrecognised token
        command: String,
    },

    /// `CHECK` without an account id
    #[error("balance check was not provided an account id")]
    MissingAccountId,

    /// An account id token is not an integer
    #[error("'{token}' is not a valid account id")]
    InvalidAccountId {
        /// The offending token
        token: String,
    },

    /// An account id outside `1..=accounts`
    #[error("account {account} does not exist (valid ids are 1..={accounts})")]
    AccountOutOfRange {
        /// The offending account id
        account: i64,
        /// Number of accounts in the store
        accounts: usize,
    },

    /// A transfer account id without a matching amount
    #[error("account {account} was not provided a transaction amount")]
    MissingAmount {
        /// The account left dangling
        account: i64,
    },

    /// An amount token is not an integer
    #[error("'{token}' is not a valid transaction amount")]
    InvalidAmount {
        /// The offending token
        token: String,
    },

    /// An amount whose magnitude exceeds `MAX_AMOUNT`
    #[error("transaction amount {amount} is outside the allowed range of -{max}..={max}")]
    AmountOutOfRange {
        /// The offending amount
        amount: i64,
        /// Largest accepted magnitude
        max: i64,
    },

    /// `TRANS` without any pairs
    #[error("no transaction pairs were provided with transaction request")]
    NoTransactionPairs,

    /// More pairs than the configured limit
    #[error("{count} transaction pairs exceed the limit of {max}")]
    TooManyPairs {
        /// Number of pairs supplied
        count: usize,
        /// Configured maximum
        max: usize,
    },
}
