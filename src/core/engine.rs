//! Transaction processing engine
//!
//! This module provides the `TransactionEngine`, which executes balance checks
//! and multi-account transfers against the shared `AccountStore`.
//!
//! The engine enforces the following rules:
//! - Locks on several accounts are always taken in ascending account id order,
//!   so two transfers sharing accounts can never wait on each other in a cycle
//! - A transfer touching the same account more than once locks it once and
//!   applies its pairs in sequence
//! - A transfer either commits every pair or writes nothing; the first account
//!   (by ascending id) that would go negative is reported as insufficient funds

use crate::core::account_store::{AccountGuard, AccountStore};
use crate::types::{AccountId, BankError, Balance, Outcome, Request, RequestKind, TransactionPair};
use std::sync::Arc;
use tracing::trace;

/// A locked account together with its projected balance
struct HeldAccount<'a> {
    guard: AccountGuard<'a>,
    projected: Balance,
}

/// Executes requests against the account store
///
/// Cheap to clone; every clone shares the same store.
#[derive(Debug, Clone)]
pub struct TransactionEngine {
    accounts: Arc<AccountStore>,
}

impl TransactionEngine {
    /// Create a new TransactionEngine over a shared store
    pub fn new(accounts: Arc<AccountStore>) -> Self {
        TransactionEngine { accounts }
    }

    /// The store this engine operates on
    pub fn accounts(&self) -> &Arc<AccountStore> {
        &self.accounts
    }

    /// Execute a dequeued request
    ///
    /// Routes the request to the balance check or transfer protocol.
    ///
    /// # Errors
    ///
    /// Only returns an error for input the producer should have rejected
    /// (an unknown account id) or for a balance that would overflow.
    pub fn execute(&self, request: &Request) -> Result<Outcome, BankError> {
        match &request.kind {
            RequestKind::Check { account } => self.check_balance(*account),
            RequestKind::Transfer { pairs } => self.transfer(pairs),
        }
    }

    /// Read a single account balance under its lock
    ///
    /// # Returns
    ///
    /// `Outcome::Balance` with the balance at the time the lock was held
    pub fn check_balance(&self, account: AccountId) -> Result<Outcome, BankError> {
        let balance = self.accounts.lock(account)?.read_account();
        Ok(Outcome::Balance(balance))
    }

    /// Apply a set of transaction pairs atomically
    ///
    /// 1. Sorts the pairs by account id (stable, so repeated ids keep their
    ///    submission order)
    /// 2. Locks every distinct account once, in ascending id order
    /// 3. Projects each pair onto its account's running balance; the first
    ///    projection below zero aborts the whole transfer
    /// 4. Writes every projected balance back
    /// 5. Releases all locks when the held guards drop
    ///
    /// # Arguments
    ///
    /// * `pairs` - The transfer legs, in any order
    ///
    /// # Returns
    ///
    /// * `Ok(Outcome::Ok)` - Every pair was committed
    /// * `Ok(Outcome::InsufficientFunds(id))` - Nothing was written; `id` is the
    ///   first account in ascending order whose balance would have gone negative
    ///
    /// # Errors
    ///
    /// Returns an error if a pair names an account outside the store or a
    /// projected balance overflows. No balance is written in either case.
    pub fn transfer(&self, pairs: &[TransactionPair]) -> Result<Outcome, BankError> {
        let mut sorted = pairs.to_vec();
        sorted.sort_by_key(|pair| pair.account);

        let mut held = self.lock_in_order(&sorted)?;

        let mut slot = 0;
        for pair in &sorted {
            while held[slot].guard.id() != pair.account {
                slot += 1;
            }
            let entry = &mut held[slot];
            let new_balance = entry
                .projected
                .checked_add(pair.amount)
                .ok_or_else(|| BankError::balance_overflow(pair.account))?;

            if new_balance < 0 {
                trace!(account = pair.account, new_balance, "Transfer aborted");
                return Ok(Outcome::InsufficientFunds(pair.account));
            }
            entry.projected = new_balance;
        }

        for entry in &mut held {
            entry.guard.write_account(entry.projected);
        }

        Ok(Outcome::Ok)
    }

    /// Lock each distinct account named by `sorted` in ascending order
    fn lock_in_order(&self, sorted: &[TransactionPair]) -> Result<Vec<HeldAccount<'_>>, BankError> {
        let mut held: Vec<HeldAccount<'_>> = Vec::with_capacity(sorted.len());

        for pair in sorted {
            let last = held.last().map(|entry| entry.guard.id());
            if last == Some(pair.account) {
                continue;
            }
            debug_assert!(last.map_or(true, |id| id < pair.account));

            let guard = self.accounts.lock(pair.account)?;
            let projected = guard.read_account();
            held.push(HeldAccount { guard, projected });
        }

        Ok(held)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn engine(accounts: usize) -> TransactionEngine {
        TransactionEngine::new(Arc::new(AccountStore::initialize_accounts(accounts).unwrap()))
    }

    fn pairs(raw: &[(AccountId, i64)]) -> Vec<TransactionPair> {
        raw.iter()
            .map(|&(account, amount)| TransactionPair::new(account, amount))
            .collect()
    }

    fn balance(engine: &TransactionEngine, account: AccountId) -> Balance {
        engine.accounts().read_account(account).unwrap()
    }

    #[test]
    fn test_reference_scenario() {
        let engine = engine(3);

        assert_eq!(engine.transfer(&pairs(&[(1, 100), (2, 50)])).unwrap(), Outcome::Ok);
        assert_eq!(
            engine.transfer(&pairs(&[(1, -200)])).unwrap(),
            Outcome::InsufficientFunds(1)
        );
        assert_eq!(balance(&engine, 1), 100);
        assert_eq!(engine.check_balance(2).unwrap(), Outcome::Balance(50));
    }

    #[test]
    fn test_check_balance_of_fresh_account() {
        let engine = engine(2);
        assert_eq!(engine.check_balance(2).unwrap(), Outcome::Balance(0));
    }

    #[test]
    fn test_transfer_moves_funds() {
        let engine = engine(2);
        engine.transfer(&pairs(&[(1, 80)])).unwrap();

        let outcome = engine.transfer(&pairs(&[(1, -30), (2, 30)])).unwrap();

        assert_eq!(outcome, Outcome::Ok);
        assert_eq!(balance(&engine, 1), 50);
        assert_eq!(balance(&engine, 2), 30);
    }

    #[test]
    fn test_insufficient_funds_reports_lowest_offending_id() {
        let engine = engine(4);
        engine.transfer(&pairs(&[(1, 10)])).unwrap();

        // Submitted highest id first; both 2 and 4 would go negative
        let outcome = engine
            .transfer(&pairs(&[(4, -5), (1, 5), (2, -1)]))
            .unwrap();

        assert_eq!(outcome, Outcome::InsufficientFunds(2));
    }

    #[test]
    fn test_insufficient_funds_leaves_every_account_unchanged() {
        let engine = engine(3);
        engine.transfer(&pairs(&[(1, 100), (2, 100), (3, 100)])).unwrap();

        let outcome = engine
            .transfer(&pairs(&[(1, 50), (2, -20), (3, -101)]))
            .unwrap();

        assert_eq!(outcome, Outcome::InsufficientFunds(3));
        for id in 1..=3 {
            assert_eq!(balance(&engine, id), 100);
        }
    }

    #[test]
    fn test_balance_may_reach_exactly_zero() {
        let engine = engine(1);
        engine.transfer(&pairs(&[(1, 40)])).unwrap();

        assert_eq!(engine.transfer(&pairs(&[(1, -40)])).unwrap(), Outcome::Ok);
        assert_eq!(balance(&engine, 1), 0);
    }

    #[test]
    fn test_repeated_account_applies_every_pair() {
        let engine = engine(2);

        let outcome = engine
            .transfer(&pairs(&[(1, 100), (2, 5), (1, -30)]))
            .unwrap();

        assert_eq!(outcome, Outcome::Ok);
        assert_eq!(balance(&engine, 1), 70);
        assert_eq!(balance(&engine, 2), 5);
    }

    #[test]
    fn test_repeated_account_is_checked_in_submission_order() {
        let engine = engine(1);

        // The debit comes first and projects below zero before the credit lands
        let outcome = engine.transfer(&pairs(&[(1, -50), (1, 100)])).unwrap();

        assert_eq!(outcome, Outcome::InsufficientFunds(1));
        assert_eq!(balance(&engine, 1), 0);
    }

    #[test]
    fn test_out_of_range_account_writes_nothing() {
        let engine = engine(2);

        let result = engine.transfer(&pairs(&[(1, 10), (3, 10)]));

        assert_eq!(
            result.unwrap_err(),
            BankError::AccountOutOfRange {
                account: 3,
                accounts: 2
            }
        );
        assert_eq!(balance(&engine, 1), 0);
    }

    #[test]
    fn test_overflow_is_reported_without_writing() {
        let engine = engine(2);
        engine.accounts().write_account(2, Balance::MAX).unwrap();

        let result = engine.transfer(&pairs(&[(1, 1), (2, 1)]));

        assert_eq!(result.unwrap_err(), BankError::BalanceOverflow { account: 2 });
        assert_eq!(balance(&engine, 1), 0);
        assert_eq!(balance(&engine, 2), Balance::MAX);
    }

    #[test]
    fn test_execute_routes_by_kind() {
        let engine = engine(2);

        let transfer = Request::transfer(1, pairs(&[(2, 15)]));
        let check = Request::check(2, 2);

        assert_eq!(engine.execute(&transfer).unwrap(), Outcome::Ok);
        assert_eq!(engine.execute(&check).unwrap(), Outcome::Balance(15));
    }

    #[test]
    fn test_check_never_sees_intermediate_state() {
        let engine = engine(1);
        engine.transfer(&pairs(&[(1, 1000)])).unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let engine = engine.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for _ in 0..2000 {
                    // Net zero, but the first leg alone would move the balance
                    engine.transfer(&pairs(&[(1, 500), (1, -500)])).unwrap();
                }
                done.store(true, Ordering::Release);
            })
        };

        while !done.load(Ordering::Acquire) {
            assert_eq!(engine.check_balance(1).unwrap(), Outcome::Balance(1000));
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_snapshot_never_sees_half_a_transfer() {
        let engine = engine(2);
        engine.transfer(&pairs(&[(1, 1000), (2, 1000)])).unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let movers: Vec<_> = [(1, 2), (2, 1)]
            .into_iter()
            .map(|(from, to)| {
                let engine = engine.clone();
                thread::spawn(move || {
                    for _ in 0..2000 {
                        engine.transfer(&pairs(&[(from, -3), (to, 3)])).unwrap();
                    }
                })
            })
            .collect();

        let checker = {
            let engine = engine.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let total: Balance = engine
                        .accounts()
                        .snapshot()
                        .iter()
                        .map(|account| account.balance)
                        .sum();
                    assert_eq!(total, 2000);
                }
            })
        };

        for mover in movers {
            mover.join().unwrap();
        }
        done.store(true, Ordering::Release);
        checker.join().unwrap();
    }

    #[test]
    fn test_overlapping_transfers_never_deadlock() {
        const ACCOUNTS: usize = 6;
        const THREADS: usize = 8;
        const TRANSFERS: usize = 500;
        const START: Balance = 1_000;

        let engine = engine(ACCOUNTS);
        let ids: Vec<_> = (1..=ACCOUNTS as AccountId).collect();
        engine
            .transfer(&ids.iter().map(|&id| TransactionPair::new(id, START)).collect::<Vec<_>>())
            .unwrap();

        let (tx, rx) = mpsc::channel();
        for _ in 0..THREADS {
            let engine = engine.clone();
            let tx = tx.clone();
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..TRANSFERS {
                    // Zero-sum legs over a random, overlapping, unordered account set
                    let legs = rng.gen_range(1..=5);
                    let mut batch = Vec::with_capacity(legs * 2);
                    for _ in 0..legs {
                        let from = rng.gen_range(1..=ACCOUNTS as AccountId);
                        let to = rng.gen_range(1..=ACCOUNTS as AccountId);
                        let amount = rng.gen_range(1..=50);
                        batch.push(TransactionPair::new(to, amount));
                        batch.push(TransactionPair::new(from, -amount));
                    }
                    engine.transfer(&batch).unwrap();
                }
                tx.send(()).unwrap();
            });
        }
        drop(tx);

        for _ in 0..THREADS {
            rx.recv_timeout(Duration::from_secs(30))
                .expect("transfers did not finish; possible deadlock");
        }

        let accounts = engine.accounts().snapshot();
        assert!(accounts.iter().all(|account| account.balance >= 0));
        assert_eq!(
            accounts.iter().map(|account| account.balance).sum::<Balance>(),
            START * ACCOUNTS as Balance
        );
    }
}
