//! Review sessions
//!
//! A session loads one recorded log, merges its patch file, and exposes the
//! lookup, cursor, edit and persistence operations a review front end needs.

mod config;
mod engine;
mod errors;
mod filter;

pub use config::SessionConfig;
pub use engine::{LogSource, SessionEngine};
pub use errors::{SessionError, SessionResult};
pub use filter::{MessageFilter, TimeWindow};
