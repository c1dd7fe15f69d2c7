//! CLI argument definitions using clap
//!
//! Commands:
//! - strata upgrade <path> [--verbose] [--delete-prior-commits] [--store-impl <name>]
//! - strata check <path> [--min-major <N>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::storage::StoreImpl;

/// strata - segment index maintenance tool
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rewrite every outdated segment of an index in the current format
    Upgrade {
        /// Index directory
        path: PathBuf,

        /// Stream progress to stderr
        #[arg(short, long)]
        verbose: bool,

        /// Delete older commit points after upgrading
        #[arg(long)]
        delete_prior_commits: bool,

        /// Store implementation: fs or fs-nosync
        #[arg(long, default_value_t = StoreImpl::Fs)]
        store_impl: StoreImpl,
    },

    /// Report the version verdict of every segment of an index
    Check {
        /// Index directory
        path: PathBuf,

        /// Lowest major to admit; one below the default opts into the
        /// read-only band
        #[arg(long)]
        min_major: Option<u32>,

        /// Stream progress to stderr
        #[arg(short, long)]
        verbose: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_flags() {
        let cli = Cli::try_parse_from([
            "strata",
            "upgrade",
            "/data/idx",
            "--verbose",
            "--delete-prior-commits",
            "--store-impl",
            "fs-nosync",
        ])
        .unwrap();
        match cli.command {
            Command::Upgrade {
                path,
                verbose,
                delete_prior_commits,
                store_impl,
            } => {
                assert_eq!(path, PathBuf::from("/data/idx"));
                assert!(verbose);
                assert!(delete_prior_commits);
                assert_eq!(store_impl, StoreImpl::FsNoSync);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_upgrade_defaults() {
        let cli = Cli::try_parse_from(["strata", "upgrade", "idx"]).unwrap();
        match cli.command {
            Command::Upgrade {
                verbose,
                delete_prior_commits,
                store_impl,
                ..
            } => {
                assert!(!verbose);
                assert!(!delete_prior_commits);
                assert_eq!(store_impl, StoreImpl::Fs);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_store_impl_and_missing_path() {
        assert!(Cli::try_parse_from(["strata", "upgrade", "idx", "--store-impl", "tape"]).is_err());
        assert!(Cli::try_parse_from(["strata", "upgrade"]).is_err());
    }

    #[test]
    fn test_check_min_major() {
        let cli = Cli::try_parse_from(["strata", "check", "idx", "--min-major", "8"]).unwrap();
        assert!(matches!(cli.command, Command::Check { min_major: Some(8), .. }));
    }
}
