//! aeroreplay - patch overlays and replay reconstruction for training-session logs
//!
//! A recorded session log is read once and never modified. Reviewer
//! corrections are kept as patch records on per-entry overlays, spread over
//! assessment spans, and persisted to a sibling patch file.

pub mod assessment;
pub mod cli;
pub mod observability;
pub mod overlay;
pub mod patch;
pub mod patch_file;
pub mod rollup;
pub mod session;
pub mod session_log;
pub mod span;
