use crate::io::DEFAULT_MAX_PAIRS;
use crate::server::ServerConfig;
use crate::types::{AccountId, BankError, MAX_AMOUNT};
use clap::Parser;
use std::path::PathBuf;

/// Run the concurrent in-memory bank account server
#[derive(Parser, Debug)]
#[command(name = "bank-server")]
#[command(about = "Concurrent in-memory bank account server", long_about = None)]
pub struct CliArgs {
    /// Number of worker threads (at least 1)
    #[arg(value_name = "WORKERS", allow_negative_numbers = true)]
    pub workers: i64,

    /// Number of accounts, numbered 1..=ACCOUNTS (at least 1)
    #[arg(value_name = "ACCOUNTS", allow_negative_numbers = true)]
    pub accounts: i64,

    /// Output file receiving one line per completed request
    #[arg(value_name = "OUTPUT")]
    pub output_file: PathBuf,

    /// Maximum number of (account, amount) pairs in one TRANS request
    #[arg(
        long = "max-pairs",
        value_name = "COUNT",
        default_value_t = DEFAULT_MAX_PAIRS,
        help = "Maximum transaction pairs per TRANS request (default: 10)"
    )]
    pub max_pairs: usize,

    /// Starting balance of every account
    #[arg(
        long = "initial-balance",
        value_name = "AMOUNT",
        default_value_t = 0,
        allow_negative_numbers = true
    )]
    pub initial_balance: i64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long = "log-level", value_name = "FILTER", default_value = "warn")]
    pub log_level: String,
}

impl CliArgs {
    /// Validate the arguments into a ServerConfig
    ///
    /// # Errors
    ///
    /// Returns the startup error for the first invalid value:
    /// - worker count below 1
    /// - account count below 1 (or beyond the account id range)
    /// - pair limit of 0
    /// - initial balance outside `0..=MAX_AMOUNT`
    pub fn to_server_config(&self) -> Result<ServerConfig, BankError> {
        if self.workers < 1 {
            return Err(BankError::InvalidWorkerCount {
                count: self.workers,
            });
        }
        if self.accounts < 1 || self.accounts > AccountId::MAX as i64 {
            return Err(BankError::InvalidAccountCount {
                count: self.accounts,
            });
        }
        if self.max_pairs == 0 {
            return Err(BankError::InvalidPairLimit {
                limit: self.max_pairs,
            });
        }
        if !(0..=MAX_AMOUNT).contains(&self.initial_balance) {
            return Err(BankError::InvalidInitialBalance {
                balance: self.initial_balance,
            });
        }

        Ok(ServerConfig {
            workers: self.workers as usize,
            accounts: self.accounts as usize,
            output_file: self.output_file.clone(),
            max_pairs: self.max_pairs,
            initial_balance: self.initial_balance,
        })
    }
}
