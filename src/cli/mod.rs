//! CLI module for aeroreplay
//!
//! Provides command-line access to a review session:
//! - inspect: List played-back entries
//! - patches: List patch records
//! - playback: Show the latest views as of a time
//! - apply: Set a node's level over its span
//! - remove: Drop a node's patches around a time
//! - discard: Delete the patch file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, SessionArgs};
pub use commands::{apply, discard, inspect, patches, playback, remove, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
