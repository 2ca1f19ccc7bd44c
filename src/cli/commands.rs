//! CLI command implementations
//!
//! Every command opens a fresh session over the whole log, performs one
//! operation, and writes a single JSON response to stdout. Mutating commands
//! persist the patch file before responding.

use serde_json::{json, Value};

use crate::assessment::AssessmentLevel;
use crate::observability::Logger;
use crate::session::{MessageFilter, SessionConfig, SessionEngine, TimeWindow};
use crate::session_log::MessageKind;
use crate::span::{ApplyRequest, ApplyResult, SpanMode};

use super::args::{Cli, Command, SessionArgs};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    match run_command(cli.command) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Best effort: stdout may be the thing that failed
            let _ = write_error(e.code_str(), e.message());
            Err(e)
        }
    }
}

/// Dispatch a parsed command
pub fn run_command(command: Command) -> CliResult<()> {
    let data = match command {
        Command::Inspect { session } => inspect(&session)?,
        Command::Patches { session } => patches(&session)?,
        Command::Playback { session, at } => playback(&session, at)?,
        Command::Apply {
            session,
            time,
            node,
            level,
            point,
        } => apply(&session, time, &node, &level, point)?,
        Command::Remove {
            session,
            time,
            node,
        } => remove(&session, time, &node)?,
        Command::Discard { session } => discard(&session)?,
    };
    write_response(data)
}

fn load_config(args: &SessionArgs) -> CliResult<SessionConfig> {
    match &args.config {
        Some(path) => Ok(SessionConfig::load(path)?),
        None => Ok(SessionConfig::default()),
    }
}

fn open_session(args: &SessionArgs) -> CliResult<SessionEngine> {
    let config = load_config(args)?;
    let engine = SessionEngine::open(
        &args.log,
        TimeWindow::all(),
        &args.user,
        MessageFilter::all(),
        None,
        config,
        Logger::stderr(),
    )?;
    Ok(engine)
}

/// List every entry with its kind, time and patch count
pub fn inspect(args: &SessionArgs) -> CliResult<Value> {
    let engine = open_session(args)?;
    let entries: Vec<Value> = engine
        .overlays()
        .iter()
        .map(|o| {
            json!({
                "timestamp": o.timestamp(),
                "kind": o.kind().as_str(),
                "synthetic": o.is_synthetic(),
                "patches": o.patch_count(),
            })
        })
        .collect();
    Ok(json!({
        "session_id": engine.id().to_string(),
        "log": engine.log_path().display().to_string(),
        "entries": entries,
    }))
}

/// List every patch record with the time of the entry carrying it
pub fn patches(args: &SessionArgs) -> CliResult<Value> {
    let engine = open_session(args)?;
    let records = engine
        .patches()
        .into_iter()
        .map(|(at, record)| {
            Ok(json!({
                "entry_timestamp": at,
                "record": serde_json::to_value(record)?,
            }))
        })
        .collect::<CliResult<Vec<Value>>>()?;
    Ok(json!({ "patches": records }))
}

/// Seek to `at` and report the latest view of each kind delivered by then,
/// plus how many entries of each kind are still to come
pub fn playback(args: &SessionArgs, at: i64) -> CliResult<Value> {
    let engine = open_session(args)?;
    engine.seek(at);

    let mut latest = serde_json::Map::new();
    for (kind, entry) in engine.latest_messages(&MessageKind::ALL) {
        latest.insert(kind.as_str().to_string(), serde_json::to_value(entry)?);
    }
    let mut upcoming = serde_json::Map::new();
    for kind in MessageKind::ALL {
        let count = engine.future_messages(&[kind]).len();
        upcoming.insert(kind.as_str().to_string(), json!(count));
    }
    Ok(json!({
        "at": at,
        "cursor": engine.cursor(),
        "latest": latest,
        "upcoming": upcoming,
    }))
}

/// Set a node's short-term level at `time` and persist
pub fn apply(args: &SessionArgs, time: i64, node: &str, level: &str, point: bool) -> CliResult<Value> {
    let level = AssessmentLevel::parse(level)
        .ok_or_else(|| CliError::invalid_argument(format!("unknown level '{}'", level)))?;

    let mut engine = open_session(args)?;
    let mut requested = engine.state_at(time, node).ok_or_else(|| {
        CliError::invalid_argument(format!("node '{}' has no assessment at or before {}", node, time))
    })?;
    requested.short_term = level;
    requested.short_term_timestamp = time;

    let mode = if point { SpanMode::Point } else { SpanMode::WholeSpan };
    let result = engine.apply(&ApplyRequest::single(node, requested, time, mode))?;
    let written = engine.persist_patches()?;
    Ok(describe(&result, written))
}

/// Remove the patches for `node` around `time` and persist
pub fn remove(args: &SessionArgs, time: i64, node: &str) -> CliResult<Value> {
    let mut engine = open_session(args)?;
    let result = engine.remove(time, node)?;
    let written = engine.persist_patches()?;
    Ok(describe(&result, written))
}

/// Delete the patch file and back up any legacy file
pub fn discard(args: &SessionArgs) -> CliResult<Value> {
    let mut engine = open_session(args)?;
    let removed = engine.delete_patch_file()?;
    Ok(json!({ "removed": removed }))
}

fn describe(result: &ApplyResult, written: usize) -> Value {
    json!({
        "current_index": result.current_index(),
        "affected": result.affected_indices().iter().collect::<Vec<_>>(),
        "inserted_index": result.inserted_index(),
        "entries_written": written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{PerformanceNode, PerformanceState, PerformanceTree};
    use crate::session_log::{write_entries, LogEntry};
    use std::path::Path;
    use tempfile::TempDir;

    fn assessment(seq: u64, ts: i64, level: AssessmentLevel) -> LogEntry {
        LogEntry::performance(
            seq,
            ts,
            PerformanceTree::new(vec![PerformanceNode::new(
                "Task1",
                PerformanceState {
                    short_term: level,
                    ..PerformanceState::default()
                },
            )]),
        )
    }

    fn session(dir: &Path) -> SessionArgs {
        let log = dir.join("session.log");
        write_entries(
            &log,
            &[
                assessment(1, 10, AssessmentLevel::BelowExpectation),
                assessment(2, 20, AssessmentLevel::AtExpectation),
                assessment(3, 30, AssessmentLevel::AtExpectation),
            ],
        )
        .unwrap();
        SessionArgs {
            log,
            config: None,
            user: "reviewer".to_string(),
        }
    }

    #[test]
    fn test_playback_shows_patched_view_at_position() {
        let dir = TempDir::new().unwrap();
        let args = session(dir.path());
        apply(&args, 20, "Task1", "ABOVE", true).unwrap();

        let data = playback(&args, 20).unwrap();
        assert_eq!(data["cursor"], 2);
        let latest = serde_json::to_string(&data["latest"]["performance_assessment"]).unwrap();
        assert!(latest.contains("ABOVE"));
        assert_eq!(data["upcoming"]["performance_assessment"], 1);
        assert_eq!(data["upcoming"]["lesson_score"], 0);
    }

    #[test]
    fn test_playback_before_first_entry_is_empty() {
        let dir = TempDir::new().unwrap();
        let args = session(dir.path());

        let data = playback(&args, 5).unwrap();
        assert_eq!(data["cursor"], 0);
        assert!(data["latest"].as_object().unwrap().is_empty());
        assert_eq!(data["upcoming"]["performance_assessment"], 3);
    }
}
