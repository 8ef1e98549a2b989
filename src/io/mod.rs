//! I/O module
//!
//! Handles operator input and result output.
//!
//! # Components
//!
//! - `command` - Parsing and validation of `CHECK` / `TRANS` / `END` lines
//! - `result_log` - Output record formatting and the shared result log

pub mod command;
pub mod result_log;

pub use command::{Command, CommandParser, DEFAULT_MAX_PAIRS};
pub use result_log::{format_timestamp, MemorySink, ResultLog};
