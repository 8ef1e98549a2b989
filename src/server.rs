//! Bank server session
//!
//! This module wires the components together and runs the producer loop:
//!
//! ```text
//! BankServer
//!     ├── CommandParser          (validates operator input)
//!     ├── Arc<RequestQueue>      (producer → workers)
//!     ├── WorkerPool             (N threads + shutdown coordinator)
//!     │   └── TransactionEngine  (lock-ordered execution)
//!     ├── Arc<AccountStore>      (per-account locks)
//!     └── Arc<dyn ResultSink>    (output log)
//! ```
//!
//! The producer reads one command per line, assigns request ids, enqueues
//! valid requests and echoes `ID <n>` or `INVALID REQUEST: <reason>` to the
//! console. `END` (or end of input) runs the shutdown protocol and tears the
//! session down.

use crate::core::{AccountStore, RequestQueue, ResultSink, TransactionEngine, WorkerPool};
use crate::io::{Command, CommandParser, ResultLog};
use crate::types::{Account, Balance, BankError, Request, RequestId};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Validated startup configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Number of worker threads
    pub workers: usize,
    /// Number of accounts (ids `1..=accounts`)
    pub accounts: usize,
    /// Path of the result log
    pub output_file: PathBuf,
    /// Maximum pairs per transfer
    pub max_pairs: usize,
    /// Starting balance of every account
    pub initial_balance: Balance,
}

/// What happened during a session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSummary {
    /// Requests enqueued
    pub accepted: u64,
    /// Lines rejected as invalid
    pub rejected: u64,
    /// Requests processed by the workers
    pub processed: u64,
    /// Balances after the last worker stopped
    pub final_accounts: Vec<Account>,
}

/// A running server: accounts initialised, workers started
pub struct BankServer {
    parser: CommandParser,
    accounts: Arc<AccountStore>,
    queue: Arc<RequestQueue>,
    pool: WorkerPool,
    sink: Arc<dyn ResultSink>,
}

impl BankServer {
    /// Create the output file, initialise the accounts and start the workers
    ///
    /// # Errors
    ///
    /// Returns a startup error if the output file cannot be created, the
    /// account store rejects the configuration, or a worker cannot be spawned.
    pub fn start(config: &ServerConfig) -> Result<Self, BankError> {
        let sink = Arc::new(ResultLog::create(&config.output_file)?);
        Self::with_sink(config, sink)
    }

    /// Start a server that records results into `sink`
    pub fn with_sink(config: &ServerConfig, sink: Arc<dyn ResultSink>) -> Result<Self, BankError> {
        let accounts = Arc::new(AccountStore::with_initial_balance(
            config.accounts,
            config.initial_balance,
        )?);
        let queue = Arc::new(RequestQueue::new());
        let engine = TransactionEngine::new(Arc::clone(&accounts));
        let pool = WorkerPool::spawn(
            config.workers,
            Arc::clone(&queue),
            engine,
            Arc::clone(&sink),
        )?;

        info!(
            "Bank server started with {} accounts and {} workers",
            config.accounts, config.workers
        );

        Ok(BankServer {
            parser: CommandParser::new(config.accounts, config.max_pairs),
            accounts,
            queue,
            pool,
            sink,
        })
    }

    /// Run the producer loop until `END` or end of input, then shut down
    ///
    /// # Arguments
    ///
    /// * `input` - Source of command lines
    /// * `console` - Receives the prompt and per-line responses
    ///
    /// # Errors
    ///
    /// Returns an error if reading input, writing the console or flushing
    /// the result log fails, or if a worker panicked.
    pub fn run<R: BufRead, W: Write>(
        self,
        mut input: R,
        console: &mut W,
    ) -> Result<SessionSummary, BankError> {
        let mut summary = SessionSummary::default();
        let mut next_id: RequestId = 1;
        let mut line = String::new();

        loop {
            write!(console, "> ")?;
            console.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                info!("End of input, shutting down");
                writeln!(console)?;
                break;
            }

            let request = match self.parser.parse(&line) {
                Ok(Command::End) => break,
                Ok(Command::Check(account)) => Request::check(next_id, account),
                Ok(Command::Transfer(pairs)) => Request::transfer(next_id, pairs),
                Err(e) => {
                    warn!("Invalid request '{}': {}", line.trim(), e);
                    writeln!(console, "< INVALID REQUEST: {}", e)?;
                    summary.rejected += 1;
                    continue;
                }
            };

            self.queue.enqueue(request)?;
            debug!(request = next_id, "Accepted");
            writeln!(console, "< ID {}", next_id)?;
            next_id += 1;
            summary.accepted += 1;
        }

        self.shutdown(summary)
    }

    /// Drain and stop the workers, flush the log and free the accounts
    fn shutdown(self, mut summary: SessionSummary) -> Result<SessionSummary, BankError> {
        let BankServer {
            accounts,
            pool,
            sink,
            ..
        } = self;

        let report = pool.shutdown()?;
        for (worker, processed) in report.processed.iter().enumerate() {
            debug!("Worker {} processed {} requests", worker, processed);
        }
        summary.processed = report.total();

        sink.flush()?;

        summary.final_accounts = match Arc::try_unwrap(accounts) {
            Ok(store) => store.free_accounts(),
            Err(shared) => shared.snapshot(),
        };
        let total: Balance = summary
            .final_accounts
            .iter()
            .map(|account| account.balance)
            .sum();
        info!(
            "Session closed: {} accepted, {} rejected, total balance {} across {} accounts",
            summary.accepted,
            summary.rejected,
            total,
            summary.final_accounts.len()
        );

        Ok(summary)
    }
}

/// Start a server from `config` and run it to completion
pub fn run<R: BufRead, W: Write>(
    config: &ServerConfig,
    input: R,
    console: &mut W,
) -> Result<SessionSummary, BankError> {
    BankServer::start(config)?.run(input, console)
}
