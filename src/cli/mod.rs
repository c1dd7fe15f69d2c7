//! CLI module for strata
//!
//! Provides command-line interface for:
//! - upgrade: rewrite outdated segments in the current format
//! - check: report the version verdict of every segment

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{check, run_command, upgrade};
pub use errors::{CliError, CliErrorCode, CliResult};

use crate::observability::init_tracing;

/// Main CLI entry point
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let verbose = match &cli.command {
        Command::Upgrade { verbose, .. } | Command::Check { verbose, .. } => *verbose,
    };
    init_tracing(verbose);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_command(cli.command, &mut out)
}
