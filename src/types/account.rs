//! Account-related types for the bank server
//!
//! This module defines account identifiers, balances and the `Account`
//! snapshot type handed out by the account store.

/// Account identifier
///
/// Accounts are numbered from 1 to N inclusive. Zero is never a valid id.
pub type AccountId = u32;

/// Account balance
///
/// Balances are whole currency units. Committed balances are never negative.
pub type Balance = i64;

/// Signed amount applied to a balance by a transaction pair
pub type Amount = i64;

/// Largest magnitude accepted for a single amount or starting balance
///
/// Keeps every reachable balance far inside the `Balance` range, so applying
/// an accepted transfer cannot overflow.
pub const MAX_AMOUNT: Amount = i32::MAX as Amount;

/// Point-in-time view of a single account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    /// The account id (1-indexed)
    pub id: AccountId,

    /// The balance at the time the snapshot was taken
    pub balance: Balance,
}

impl Account {
    /// Create a new account snapshot
    pub fn new(id: AccountId, balance: Balance) -> Self {
        Account { id, balance }
    }
}
