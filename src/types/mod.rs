//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account ids, balances and snapshots
//! - `request`: Requests, outcomes and result records
//! - `error`: Error types for the bank server

pub mod account;
pub mod error;
pub mod request;

pub use account::{Account, AccountId, Amount, Balance, MAX_AMOUNT};
pub use error::{BankError, RequestError};
pub use request::{Outcome, Request, RequestId, RequestKind, ResultRecord, TransactionPair};
