//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroreplay inspect --log <path>
//! - aeroreplay patches --log <path>
//! - aeroreplay playback --log <path> --at <ms>
//! - aeroreplay apply --log <path> --time <ms> --node <name> --level <level> [--point]
//! - aeroreplay remove --log <path> --time <ms> --node <name>
//! - aeroreplay discard --log <path>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// aeroreplay - review and correct recorded training sessions
#[derive(Parser, Debug)]
#[command(name = "aeroreplay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Options every command shares
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Path to the recorded session log
    #[arg(long)]
    pub log: PathBuf,

    /// Path to a session configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Reviewer name recorded with every patch file operation
    #[arg(long, default_value = "reviewer")]
    pub user: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every played-back entry and whether it is patched
    Inspect {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// List every patch record
    Patches {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Show the latest patched view of each kind as of a time
    Playback {
        #[command(flatten)]
        session: SessionArgs,

        /// Playback position in ms
        #[arg(long)]
        at: i64,
    },

    /// Set a node's short-term level and persist the patch
    Apply {
        #[command(flatten)]
        session: SessionArgs,

        /// Edit time in ms
        #[arg(long)]
        time: i64,

        /// Performance node name
        #[arg(long)]
        node: String,

        /// New level: BELOW, AT, ABOVE or UNKNOWN
        #[arg(long)]
        level: String,

        /// Patch only the entry at the time instead of its whole span
        #[arg(long)]
        point: bool,
    },

    /// Remove the patches for a node around a time and persist
    Remove {
        #[command(flatten)]
        session: SessionArgs,

        /// Time in ms
        #[arg(long)]
        time: i64,

        /// Performance node name
        #[arg(long)]
        node: String,
    },

    /// Delete the patch file
    Discard {
        #[command(flatten)]
        session: SessionArgs,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
