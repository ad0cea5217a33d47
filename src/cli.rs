use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Keep TOTP accounts and show their current codes.
#[derive(Debug, Parser)]
#[clap(name = "vimiotp", version, about)]
pub struct Cli {
    /// Directory holding credentials.json and config.json.
    #[clap(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Increase logging verbosity. Can be repeated.
    #[clap(short, long, global = true, parse(from_occurrences))]
    pub verbose: i8,

    /// Decrease logging verbosity. Can be repeated.
    #[clap(short, long, global = true, parse(from_occurrences))]
    pub quiet: i8,

    /// Emit logs as JSON lines.
    #[clap(long, global = true)]
    pub json_logs: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List stored accounts.
    List,
    /// Add an account by hand.
    Add {
        name: String,
        /// Base32 secret; spaces are ignored.
        secret: String,
        #[clap(long, default_value = "")]
        issuer: String,
    },
    /// Delete an account by id.
    Delete { id: String },
    /// Print the current code of every account.
    Codes,
    /// Show codes with a live countdown.
    Watch {
        /// Stop after this many one-second ticks.
        #[clap(long)]
        ticks: Option<u64>,
    },
    /// Write a JSON backup.
    Export {
        /// Output file; defaults to vimiotp-backup-YYYY-MM-DD.json here.
        #[clap(long)]
        out: Option<PathBuf>,
    },
    /// Restore accounts from a JSON backup.
    Import { path: PathBuf },
    /// Import from decoded QR payloads, one per line (`-` for stdin).
    Scan {
        #[clap(value_name = "FILE|-")]
        input: String,
        /// When several codes are found, add the one at this 1-based position.
        #[clap(long = "accept", value_name = "N")]
        accept: Vec<usize>,
        /// When several codes are found, add all of them.
        #[clap(long, conflicts_with = "accept")]
        all: bool,
    },
    /// Add an account from an otpauth:// URI.
    AcceptUri { uri: String },
}
