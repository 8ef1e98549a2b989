// CLI module
// Command-line interface and argument parsing

mod args;

pub use args::CliArgs;

use clap::Parser;

/// Parse command-line arguments using clap
///
/// Unlike `CliArgs::parse`, this does not exit the process on failure. The
/// caller prints the returned error (which also covers `--help` and
/// `--version`) and decides how to exit.
pub fn parse_args() -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse()
}
