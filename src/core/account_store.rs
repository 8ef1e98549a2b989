//! Account storage module
//!
//! This module provides the `AccountStore`, an arena of numbered accounts where
//! every account owns its own lock.
//!
//! The AccountStore is responsible for:
//! - Creating the N accounts once at startup (`initialize_accounts`)
//! - Handing out per-account guards through which balances are read and written
//! - Producing consistent snapshots and tearing the accounts down (`free_accounts`)
//!
//! # Indexing
//!
//! Account ids are 1-indexed. Account `id` lives at arena index `id - 1`; the
//! translation happens in exactly one place (`handle`).
//!
//! # Lock Ordering
//!
//! Any caller holding more than one guard at a time must have acquired them in
//! ascending account id order. `snapshot` and the transaction engine both
//! follow this rule.

use crate::types::{Account, AccountId, BankError, Balance, MAX_AMOUNT};
use parking_lot::{Mutex, MutexGuard};

/// A single account slot in the arena
#[derive(Debug)]
struct AccountHandle {
    id: AccountId,
    balance: Mutex<Balance>,
}

/// Fixed-size arena of individually lockable accounts
#[derive(Debug)]
pub struct AccountStore {
    accounts: Vec<AccountHandle>,
}

impl AccountStore {
    /// Create `count` accounts with a zero balance
    ///
    /// # Arguments
    ///
    /// * `count` - Number of accounts to create (ids `1..=count`)
    ///
    /// # Errors
    ///
    /// Returns `BankError::InvalidAccountCount` if `count` is zero or does not
    /// fit the account id type.
    pub fn initialize_accounts(count: usize) -> Result<Self, BankError> {
        Self::with_initial_balance(count, 0)
    }

    /// Create `count` accounts, each starting at `balance`
    ///
    /// # Errors
    ///
    /// Returns an error if `count` is invalid or `balance` is outside
    /// `0..=MAX_AMOUNT`.
    pub fn with_initial_balance(count: usize, balance: Balance) -> Result<Self, BankError> {
        if count == 0 || count > AccountId::MAX as usize {
            return Err(BankError::InvalidAccountCount {
                count: count as i64,
            });
        }
        if !(0..=MAX_AMOUNT).contains(&balance) {
            return Err(BankError::InvalidInitialBalance { balance });
        }

        let accounts = (1..=count as AccountId)
            .map(|id| AccountHandle {
                id,
                balance: Mutex::new(balance),
            })
            .collect();

        Ok(AccountStore { accounts })
    }

    /// Number of accounts in the store
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Always false: a store holds at least one account
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn handle(&self, id: AccountId) -> Result<&AccountHandle, BankError> {
        if id == 0 {
            return Err(BankError::account_out_of_range(id, self.len()));
        }
        self.accounts
            .get(id as usize - 1)
            .ok_or_else(|| BankError::account_out_of_range(id, self.len()))
    }

    /// Acquire the lock of a single account
    ///
    /// Blocks while another thread holds the same account. The lock is
    /// released when the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns `BankError::AccountOutOfRange` if the id is not in `1..=len()`.
    pub fn lock(&self, id: AccountId) -> Result<AccountGuard<'_>, BankError> {
        let handle = self.handle(id)?;
        Ok(AccountGuard {
            id: handle.id,
            balance: handle.balance.lock(),
        })
    }

    /// Lock, read and release a single account
    pub fn read_account(&self, id: AccountId) -> Result<Balance, BankError> {
        Ok(self.lock(id)?.read_account())
    }

    /// Lock, overwrite and release a single account
    pub fn write_account(&self, id: AccountId, balance: Balance) -> Result<(), BankError> {
        self.lock(id)?.write_account(balance);
        Ok(())
    }

    /// Consistent view of every account
    ///
    /// Holds all account locks (acquired in ascending id order) while copying,
    /// so no half-applied transfer can be observed.
    pub fn snapshot(&self) -> Vec<Account> {
        let guards: Vec<MutexGuard<'_, Balance>> =
            self.accounts.iter().map(|handle| handle.balance.lock()).collect();

        self.accounts
            .iter()
            .zip(guards.iter())
            .map(|(handle, balance)| Account::new(handle.id, **balance))
            .collect()
    }

    /// Tear down the store, returning the final balances
    pub fn free_accounts(self) -> Vec<Account> {
        self.accounts
            .into_iter()
            .map(|handle| Account::new(handle.id, handle.balance.into_inner()))
            .collect()
    }
}

/// Exclusive access to one account for as long as the guard lives
#[derive(Debug)]
pub struct AccountGuard<'a> {
    id: AccountId,
    balance: MutexGuard<'a, Balance>,
}

impl AccountGuard<'_> {
    /// Id of the locked account
    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Current balance of the locked account
    pub fn read_account(&self) -> Balance {
        *self.balance
    }

    /// Replace the balance of the locked account
    pub fn write_account(&mut self, balance: Balance) {
        *self.balance = balance;
    }
}
