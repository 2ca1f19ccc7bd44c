//! Session Engine Tests
//!
//! - Playback cursor delivery and seeking
//! - Latest and future message queries see patched views
//! - Score edits target the active scenario's score
//! - A missing scenario definition disables roll-up without failing
//! - Invalid construction arguments are rejected

use aeroreplay::assessment::{
    AssessmentLevel, GradedScoreNode, LessonScore, PerformanceNode, PerformanceState,
    PerformanceTree,
};
use aeroreplay::observability::{Logger, MemorySink};
use aeroreplay::overlay::MessageOverlay;
use aeroreplay::rollup::{RollupEngine, RollupError, ScenarioInfo};
use aeroreplay::session::{
    LogSource, MessageFilter, SessionConfig, SessionEngine, SessionError, TimeWindow,
};
use aeroreplay::session_log::{LogEntry, MessageKind};
use aeroreplay::span::{ApplyRequest, SpanError, SpanMode};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

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

fn score_tree(name: &str, grade: AssessmentLevel) -> LessonScore {
    LessonScore::new(GradedScoreNode {
        name: name.to_string(),
        grade,
        children: Vec::new(),
    })
}

/// perf @10, domain @15, perf @20, score "Alpha" @40, score "Beta" @50
fn entries() -> Vec<LogEntry> {
    vec![
        assessment(1, 10, AssessmentLevel::BelowExpectation),
        LogEntry::other(2, 15, MessageKind::Domain, serde_json::json!({"event": "takeoff"})).unwrap(),
        assessment(3, 20, AssessmentLevel::AtExpectation),
        LogEntry::score(4, 40, score_tree("Alpha", AssessmentLevel::BelowExpectation)),
        LogEntry::score(5, 50, score_tree("Beta", AssessmentLevel::BelowExpectation)),
    ]
}

fn build(
    dir: &Path,
    rollup: Option<Box<dyn RollupEngine>>,
    config: SessionConfig,
    logger: Logger,
) -> Result<SessionEngine, SessionError> {
    SessionEngine::new(
        LogSource::in_memory(dir.join("session.log"), entries()),
        TimeWindow::all(),
        "reviewer",
        MessageFilter::all(),
        rollup,
        config,
        logger,
    )
}

fn engine(dir: &Path) -> SessionEngine {
    build(dir, None, SessionConfig::default(), Logger::disabled()).unwrap()
}

/// Roll-up engine that only reports a scenario and how loading went.
struct FixedScenario {
    info: ScenarioInfo,
    load_result: fn(&Path) -> Result<(), RollupError>,
}

impl FixedScenario {
    fn boxed(name: &str, load_result: fn(&Path) -> Result<(), RollupError>) -> Box<dyn RollupEngine> {
        Box::new(Self {
            info: ScenarioInfo::new(name),
            load_result,
        })
    }
}

impl RollupEngine for FixedScenario {
    fn load(&mut self, scenario_definition: &Path) -> Result<(), RollupError> {
        (self.load_result)(scenario_definition)
    }

    fn apply_and_roll_up(&mut self, _edited_node: &str, _tree: &mut PerformanceTree) -> Vec<String> {
        Vec::new()
    }

    fn scenario(&self) -> Option<&ScenarioInfo> {
        Some(&self.info)
    }
}

fn loads(_: &Path) -> Result<(), RollupError> {
    Ok(())
}

fn missing(path: &Path) -> Result<(), RollupError> {
    Err(RollupError::NotFound(path.to_path_buf()))
}

fn unreadable(path: &Path) -> Result<(), RollupError> {
    Err(RollupError::Io {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
    })
}

fn with_definition(path: PathBuf) -> SessionConfig {
    SessionConfig {
        scenario_definition: Some(path),
        ..SessionConfig::default()
    }
}

// =============================================================================
// Cursor
// =============================================================================

#[test]
fn test_advance_cursor_delivers_matches_in_order() {
    let dir = TempDir::new().unwrap();
    let engine = engine(dir.path());
    let is_assessment = |o: &MessageOverlay| o.kind() == MessageKind::PerformanceAssessment;

    assert_eq!(engine.advance_cursor(is_assessment), Some(0));
    assert_eq!(engine.cursor(), 1);
    assert_eq!(engine.advance_cursor(is_assessment), Some(2));
    assert_eq!(engine.cursor(), 3);
    assert_eq!(engine.advance_cursor(is_assessment), None);
    assert_eq!(engine.cursor(), engine.len());

    engine.reset_cursor();
    assert_eq!(engine.cursor(), 0);
}

#[test]
fn test_latest_and_future_messages() {
    let dir = TempDir::new().unwrap();
    let engine = engine(dir.path());
    engine.seek(20);
    assert_eq!(engine.cursor(), 3);

    let latest = engine.latest_messages(&[MessageKind::PerformanceAssessment, MessageKind::Domain]);
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[&MessageKind::PerformanceAssessment].timestamp(), 20);
    assert_eq!(latest[&MessageKind::Domain].timestamp(), 15);
    assert!(engine.latest_messages(&[MessageKind::LessonScore]).is_empty());

    let future: Vec<i64> = engine
        .future_messages(&[MessageKind::LessonScore])
        .iter()
        .map(|e| e.timestamp())
        .collect();
    assert_eq!(future, vec![40, 50]);
}

#[test]
fn test_latest_message_reflects_patches() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(dir.path());
    let mut requested = engine.state_at(10, "Task1").unwrap();
    requested.short_term = AssessmentLevel::AboveExpectation;
    engine
        .apply(&ApplyRequest::single("Task1", requested, 10, SpanMode::Point))
        .unwrap();

    engine.seek(10);
    let latest = engine.latest_messages(&[MessageKind::PerformanceAssessment]);
    let state = latest[&MessageKind::PerformanceAssessment]
        .performance_tree()
        .unwrap()
        .state("Task1")
        .unwrap();
    assert_eq!(state.short_term, AssessmentLevel::AboveExpectation);
}

// =============================================================================
// Score path
// =============================================================================

#[test]
fn test_score_edit_targets_active_scenario() {
    let dir = TempDir::new().unwrap();
    let mut engine = build(
        dir.path(),
        Some(FixedScenario::boxed("Alpha", loads)),
        SessionConfig::default(),
        Logger::disabled(),
    )
    .unwrap();
    assert!(engine.has_rollup());

    let replacement = score_tree("Alpha", AssessmentLevel::AboveExpectation);
    let result = engine.apply_score(replacement.clone()).unwrap();

    assert_eq!(result.current_index(), Some(3));
    assert_eq!(engine.overlay_at(40).unwrap().view().lesson_score(), Some(&replacement));
    assert!(!engine.overlay_at(50).unwrap().has_patches());
}

#[test]
fn test_score_edit_falls_back_to_latest_score() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine(dir.path());

    let replacement = score_tree("Beta", AssessmentLevel::AtExpectation);
    let result = engine.apply_score(replacement).unwrap();
    assert_eq!(result.current_index(), Some(4));
    assert!(engine.overlay_at(50).unwrap().has_patches());
}

#[test]
fn test_score_edit_without_score_entry_fails() {
    let dir = TempDir::new().unwrap();
    let mut engine = SessionEngine::new(
        LogSource::in_memory(dir.path().join("s.log"), vec![assessment(1, 10, AssessmentLevel::Unknown)]),
        TimeWindow::all(),
        "reviewer",
        MessageFilter::all(),
        None,
        SessionConfig::default(),
        Logger::disabled(),
    )
    .unwrap();

    let err = engine
        .apply_score(score_tree("Alpha", AssessmentLevel::AtExpectation))
        .unwrap_err();
    assert!(matches!(err, SessionError::Span(SpanError::NoScoreEntry)));
}

// =============================================================================
// Roll-up loading
// =============================================================================

#[test]
fn test_missing_definition_disables_rollup() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::new());
    let engine = build(
        dir.path(),
        Some(FixedScenario::boxed("Alpha", missing)),
        with_definition(dir.path().join("scenario.xml")),
        Logger::new(sink.clone()),
    )
    .unwrap();

    assert!(!engine.has_rollup());
    assert!(sink.contains_event("ROLLUP_UNAVAILABLE"));
}

#[test]
fn test_unreadable_definition_fails_open() {
    let dir = TempDir::new().unwrap();
    let result = build(
        dir.path(),
        Some(FixedScenario::boxed("Alpha", unreadable)),
        with_definition(dir.path().join("scenario.xml")),
        Logger::disabled(),
    );
    assert!(matches!(result, Err(SessionError::Rollup(RollupError::Io { .. }))));
}

#[test]
fn test_loaded_definition_keeps_rollup() {
    let dir = TempDir::new().unwrap();
    let engine = build(
        dir.path(),
        Some(FixedScenario::boxed("Alpha", loads)),
        with_definition(dir.path().join("scenario.xml")),
        Logger::disabled(),
    )
    .unwrap();
    assert!(engine.has_rollup());
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_invalid_arguments_are_rejected() {
    assert!(matches!(
        MessageFilter::new(Vec::new()),
        Err(SessionError::EmptyFilter)
    ));
    assert!(matches!(
        TimeWindow::new(20, 10),
        Err(SessionError::InvertedWindow { start: 20, end: 10 })
    ));

    let dir = TempDir::new().unwrap();
    let clashing = SessionConfig {
        legacy_patch_suffix: ".patches".to_string(),
        ..SessionConfig::default()
    };
    assert!(matches!(
        build(dir.path(), None, clashing, Logger::disabled()),
        Err(SessionError::Config(_))
    ));
}

#[test]
fn test_filter_limits_playback() {
    let dir = TempDir::new().unwrap();
    let engine = SessionEngine::new(
        LogSource::in_memory(dir.path().join("session.log"), entries()),
        TimeWindow::new(0, 45).unwrap(),
        "reviewer",
        MessageFilter::new([MessageKind::PerformanceAssessment, MessageKind::LessonScore]).unwrap(),
        None,
        SessionConfig::default(),
        Logger::disabled(),
    )
    .unwrap();

    let times: Vec<i64> = engine.overlays().iter().map(|o| o.timestamp()).collect();
    assert_eq!(times, vec![10, 20, 40]);
}

#[test]
fn test_each_session_has_a_distinct_id() {
    let dir = TempDir::new().unwrap();
    let a = engine(dir.path());
    let b = engine(dir.path());
    assert_ne!(a.id(), b.id());
    assert_eq!(a.username(), "reviewer");
}
