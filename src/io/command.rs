//! Command line parsing for the producer loop
//!
//! Turns one line of operator input into a validated `Command`. Every check
//! that keeps malformed work away from the workers happens here: account ids
//! are range-checked against the store, amounts must stay within `MAX_AMOUNT`
//! in magnitude, and transfers must carry at least one and at most `max_pairs`
//! complete `(id, amount)` pairs.
//!
//! # Grammar
//!
//! ```text
//! CHECK <account_id>
//! TRANS <id1> <amt1> [<id2> <amt2> ...]
//! END
//! ```
//!
//! Tokens are separated by any amount of whitespace. Command words are case
//! sensitive.

use crate::types::{AccountId, Amount, RequestError, TransactionPair, MAX_AMOUNT};

/// Default upper bound on pairs in one transfer
pub const DEFAULT_MAX_PAIRS: usize = 10;

/// A validated operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Balance check of one account
    Check(AccountId),
    /// Atomic transfer over one or more pairs
    Transfer(Vec<TransactionPair>),
    /// Stop accepting requests and shut down
    End,
}

/// Parser bound to the size of the account store
#[derive(Debug, Clone, Copy)]
pub struct CommandParser {
    accounts: usize,
    max_pairs: usize,
}

impl CommandParser {
    /// Create a parser for a store of `accounts` accounts
    pub fn new(accounts: usize, max_pairs: usize) -> Self {
        CommandParser {
            accounts,
            max_pairs,
        }
    }

    /// Parse and validate a single input line
    ///
    /// # Errors
    ///
    /// Returns a `RequestError` describing the first problem found. Nothing
    /// should be enqueued for a rejected line.
    pub fn parse(&self, line: &str) -> Result<Command, RequestError> {
        let mut tokens = line.split_whitespace();
        let command = tokens.next().ok_or(RequestError::EmptyCommand)?;

        match command {
            "END" => Ok(Command::End),
            "CHECK" => {
                let token = tokens.next().ok_or(RequestError::MissingAccountId)?;
                Ok(Command::Check(self.parse_account(token)?))
            }
            "TRANS" => {
                let rest: Vec<&str> = tokens.collect();
                self.parse_pairs(&rest).map(Command::Transfer)
            }
            other => Err(RequestError::UnknownCommand {
                command: other.to_string(),
            }),
        }
    }

    fn parse_pairs(&self, tokens: &[&str]) -> Result<Vec<TransactionPair>, RequestError> {
        let count = tokens.len().div_ceil(2);
        if count == 0 {
            return Err(RequestError::NoTransactionPairs);
        }
        if count > self.max_pairs {
            return Err(RequestError::TooManyPairs {
                count,
                max: self.max_pairs,
            });
        }

        tokens
            .chunks(2)
            .map(|chunk| -> Result<TransactionPair, RequestError> {
                let account = self.parse_account(chunk[0])?;
                let amount = chunk.get(1).ok_or(RequestError::MissingAmount {
                    account: account as i64,
                })?;
                Ok(TransactionPair::new(account, parse_amount(amount)?))
            })
            .collect()
    }

    fn parse_account(&self, token: &str) -> Result<AccountId, RequestError> {
        let raw: i64 = token.parse().map_err(|_| RequestError::InvalidAccountId {
            token: token.to_string(),
        })?;

        if raw < 1 || raw as u64 > self.accounts as u64 {
            return Err(RequestError::AccountOutOfRange {
                account: raw,
                accounts: self.accounts,
            });
        }
        Ok(raw as AccountId)
    }
}

fn parse_amount(token: &str) -> Result<Amount, RequestError> {
    let amount: Amount = token.parse().map_err(|_| RequestError::InvalidAmount {
        token: token.to_string(),
    })?;

    if amount.unsigned_abs() > MAX_AMOUNT.unsigned_abs() {
        return Err(RequestError::AmountOutOfRange {
            amount,
            max: MAX_AMOUNT,
        });
    }
    Ok(amount)
}
