//! Request-related types for the bank server
//!
//! This module defines the requests the producer submits to the worker pool,
//! the outcomes workers compute for them, and the completed result records
//! written to the output log.

use super::account::{AccountId, Amount, Balance};
use std::fmt;
use std::time::SystemTime;

/// Request identifier
///
/// Assigned by the producer, starting at 1 and increasing by one for every
/// accepted request.
pub type RequestId = u64;

/// A single `(account, amount)` leg of a transfer
///
/// A negative amount debits the account, a positive amount credits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionPair {
    /// Account the amount is applied to
    pub account: AccountId,

    /// Signed amount to add to the account balance
    pub amount: Amount,
}

impl TransactionPair {
    pub fn new(account: AccountId, amount: Amount) -> Self {
        TransactionPair { account, amount }
    }
}

/// The work a request asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Read the balance of a single account
    Check {
        /// Account to read
        account: AccountId,
    },

    /// Apply every pair atomically, or none of them
    ///
    /// Pairs are kept in submission order here; the engine reorders them
    /// before acquiring locks.
    Transfer {
        /// The transfer legs (at least one)
        pairs: Vec<TransactionPair>,
    },
}

/// A request accepted by the producer and waiting in the queue
///
/// Requests are immutable once enqueued. The worker that dequeues one owns it
/// and turns it into a [`ResultRecord`] once processing finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Unique id, increasing in submission order
    pub id: RequestId,

    /// What to do
    pub kind: RequestKind,

    /// When the producer accepted the request
    pub submitted_at: SystemTime,
}

impl Request {
    /// Build a balance check request stamped with the current time
    pub fn check(id: RequestId, account: AccountId) -> Self {
        Request {
            id,
            kind: RequestKind::Check { account },
            submitted_at: SystemTime::now(),
        }
    }

    /// Build a transfer request stamped with the current time
    pub fn transfer(id: RequestId, pairs: Vec<TransactionPair>) -> Self {
        Request {
            id,
            kind: RequestKind::Transfer { pairs },
            submitted_at: SystemTime::now(),
        }
    }

    /// Consume the request, producing the record for the output log
    ///
    /// # Arguments
    ///
    /// * `outcome` - What processing the request produced
    /// * `completed_at` - When the worker finished processing it
    pub fn complete(self, outcome: Outcome, completed_at: SystemTime) -> ResultRecord {
        ResultRecord {
            request_id: self.id,
            outcome,
            submitted_at: self.submitted_at,
            completed_at,
        }
    }
}

/// Result of executing a request
///
/// Workers can only ever produce one of these three outcomes; malformed input
/// is rejected before it reaches the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Balance check result
    Balance(Balance),

    /// Transfer committed
    Ok,

    /// Transfer aborted, the given account would have gone negative
    ///
    /// This is the first such account by ascending id.
    InsufficientFunds(AccountId),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Balance(balance) => write!(f, "BAL {}", balance),
            Outcome::Ok => write!(f, "OK"),
            Outcome::InsufficientFunds(account) => write!(f, "ISF {}", account),
        }
    }
}

/// A completed request, ready to be written to the output log
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub request_id: RequestId,
    pub outcome: Outcome,
    pub submitted_at: SystemTime,
    pub completed_at: SystemTime,
}
