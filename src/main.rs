//! Bank Server CLI
//!
//! Command-line entry point for the concurrent in-memory bank account server.
//!
//! # Usage
//!
//! ```bash
//! bank-server <# of worker threads> <# of accounts> <output file>
//! bank-server --max-pairs 20 --initial-balance 1000 8 500 results.txt
//! ```
//!
//! Commands are read from stdin, one per line:
//!
//! - `CHECK <account_id>`
//! - `TRANS <id1> <amt1> [<id2> <amt2> ...]`
//! - `END`
//!
//! # Exit Codes
//!
//! - 0: Success, or a startup error (bad arguments, invalid counts, output file)
//! - 1: Error while running (I/O failure, worker panic)

use rust_bank_server::{cli, logging, server};
use std::io;
use std::process;

fn main() {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            // Covers --help/--version as well as malformed arguments
            let _ = e.print();
            return;
        }
    };

    logging::init_logging(&args.log_level);

    let config = match args.to_server_config() {
        Ok(config) => config,
        Err(e) => {
            println!("ERROR: {}", e);
            return;
        }
    };

    let server = match server::BankServer::start(&config) {
        Ok(server) => server,
        Err(e) => {
            println!("ERROR: {}", e);
            return;
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    if let Err(e) = server.run(stdin.lock(), &mut stdout) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
