//! Review session engine
//!
//! Owns the overlay list for one log and exposes every caller-facing
//! operation: lookup, the playback cursor, edits, and patch file I/O.
//!
//! All mutation happens synchronously inside `&mut self` calls. The playback
//! cursor alone sits behind a mutex so concurrent readers of one session can
//! advance it through `&self`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::assessment::{LessonScore, PerformanceState};
use crate::observability::{Event, Logger};
use crate::overlay::MessageOverlay;
use crate::patch::{PatchBody, PatchRecord};
use crate::patch_file::{merge_patches, PatchStore};
use crate::rollup::RollupEngine;
use crate::session_log::{LogEntry, MessageKind, SequencePolicy, SessionLogReader};
use crate::span::{ApplyRequest, ApplyResult, SpanResolver};

use super::config::SessionConfig;
use super::errors::{SessionError, SessionResult};
use super::filter::{selects, MessageFilter, TimeWindow};

/// A recorded log and where it came from
#[derive(Debug, Clone)]
pub struct LogSource {
    path: PathBuf,
    entries: Vec<LogEntry>,
}

impl LogSource {
    /// Reads the log at `path`, checking strict sequence order.
    pub fn read(path: &Path, actor: &str) -> SessionResult<Self> {
        let entries = SessionLogReader::open(path, SequencePolicy::Strict)
            .and_then(|mut reader| reader.read_all())
            .map_err(|source| SessionError::Log {
                actor: actor.to_string(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Entries already in memory; `path` still names the patch file location.
    pub fn in_memory(path: impl Into<PathBuf>, entries: Vec<LogEntry>) -> Self {
        Self {
            path: path.into(),
            entries,
        }
    }

    /// Log path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One reviewer's session over one recorded log.
pub struct SessionEngine {
    id: Uuid,
    log_path: PathBuf,
    username: String,
    overlays: Vec<MessageOverlay>,
    /// Persisted patches outside the window or filter; written back untouched.
    retained_patches: Vec<LogEntry>,
    cursor: Mutex<usize>,
    rollup: Option<Box<dyn RollupEngine>>,
    store: PatchStore,
    logger: Logger,
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("id", &self.id)
            .field("log_path", &self.log_path)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl SessionEngine {
    /// Builds a session from `source`, merging any persisted patches.
    ///
    /// # Errors
    ///
    /// - `BlankUsername`, `Config` for invalid arguments
    /// - `Rollup` if the scenario definition exists but cannot be loaded
    /// - `PatchFile` if the patch file cannot be read or decoded
    pub fn new(
        source: LogSource,
        window: TimeWindow,
        username: &str,
        filter: MessageFilter,
        rollup: Option<Box<dyn RollupEngine>>,
        config: SessionConfig,
        logger: Logger,
    ) -> SessionResult<Self> {
        if username.trim().is_empty() {
            return Err(SessionError::BlankUsername);
        }
        config.validate()?;

        let rollup = load_rollup(rollup, &config, &logger)?;

        let overlays: Vec<MessageOverlay> = source
            .entries
            .into_iter()
            .filter(|e| selects(&filter, &window, e))
            .map(|e| MessageOverlay::new(Arc::new(e)).with_incremental_replay(config.incremental_replay))
            .collect();

        let store = PatchStore::new(config.patch_paths(&source.path), username, logger.clone());
        let loaded = store.load()?;
        let (in_view, retained_patches): (Vec<LogEntry>, Vec<LogEntry>) = loaded
            .entries
            .into_iter()
            .partition(|e| selects(&filter, &window, e));
        let overlays = merge_patches(overlays, in_view, &logger);

        let id = Uuid::new_v4();
        let patched = overlays.iter().filter(|o| o.has_patches()).count();
        logger.event(
            Event::SessionOpened,
            &[
                ("actor", username),
                ("log", &source.path.display().to_string()),
                ("overlays", &overlays.len().to_string()),
                ("patched", &patched.to_string()),
                ("session_id", &id.to_string()),
            ],
        );

        Ok(Self {
            id,
            log_path: source.path,
            username: username.to_string(),
            overlays,
            retained_patches,
            cursor: Mutex::new(0),
            rollup,
            store,
            logger,
        })
    }

    /// Reads the log at `log_path` and builds a session over it.
    pub fn open(
        log_path: &Path,
        window: TimeWindow,
        username: &str,
        filter: MessageFilter,
        rollup: Option<Box<dyn RollupEngine>>,
        config: SessionConfig,
        logger: Logger,
    ) -> SessionResult<Self> {
        let source = LogSource::read(log_path, username)?;
        Self::new(source, window, username, filter, rollup, config, logger)
    }

    /// Session id, unique per construction
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Reviewer name
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Path of the recorded log
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Returns true while a roll-up engine is attached
    pub fn has_rollup(&self) -> bool {
        self.rollup.is_some()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Every overlay, in time order
    pub fn overlays(&self) -> &[MessageOverlay] {
        &self.overlays
    }

    /// Number of overlays
    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    /// Returns true if nothing is played back
    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    /// Overlay at `index`
    pub fn overlay(&self, index: usize) -> Option<&MessageOverlay> {
        self.overlays.get(index)
    }

    /// First overlay stamped exactly `timestamp`
    pub fn overlay_at(&self, timestamp: i64) -> Option<&MessageOverlay> {
        let index = self.overlays.partition_point(|o| o.timestamp() < timestamp);
        self.overlays.get(index).filter(|o| o.timestamp() == timestamp)
    }

    /// Index of the last overlay at or before `timestamp`
    pub fn index_at_or_before(&self, timestamp: i64) -> Option<usize> {
        self.overlays
            .partition_point(|o| o.timestamp() <= timestamp)
            .checked_sub(1)
    }

    /// Current state of `node` on the nearest assessment at or before
    /// `timestamp`
    pub fn state_at(&self, timestamp: i64, node: &str) -> Option<PerformanceState> {
        self.overlays
            .iter()
            .rev()
            .filter(|o| o.timestamp() <= timestamp && o.kind() == MessageKind::PerformanceAssessment)
            .find_map(|o| o.state_of(node).cloned())
    }

    // =========================================================================
    // Playback cursor
    // =========================================================================

    /// Index of the next overlay to deliver
    pub fn cursor(&self) -> usize {
        *self.lock_cursor()
    }

    /// Moves the cursor back to the start
    pub fn reset_cursor(&self) {
        *self.lock_cursor() = 0;
    }

    /// Places the cursor on the first overlay after `timestamp`
    pub fn seek(&self, timestamp: i64) {
        let next = self.overlays.partition_point(|o| o.timestamp() <= timestamp);
        *self.lock_cursor() = next;
    }

    /// Delivers the next overlay that satisfies `predicate` and moves the
    /// cursor past it. Returns `None`, leaving the cursor at the end, when
    /// none remains.
    pub fn advance_cursor<F>(&self, predicate: F) -> Option<usize>
    where
        F: Fn(&MessageOverlay) -> bool,
    {
        let mut cursor = self.lock_cursor();
        let found = self.overlays[(*cursor).min(self.overlays.len())..]
            .iter()
            .position(predicate)
            .map(|offset| *cursor + offset);
        *cursor = match found {
            Some(index) => index + 1,
            None => self.overlays.len(),
        };
        found
    }

    /// Latest view of each requested kind delivered before the cursor
    pub fn latest_messages(&self, kinds: &[MessageKind]) -> BTreeMap<MessageKind, &LogEntry> {
        let cursor = self.cursor().min(self.overlays.len());
        let mut latest = BTreeMap::new();
        for overlay in self.overlays[..cursor].iter().rev() {
            if kinds.contains(&overlay.kind()) && !latest.contains_key(&overlay.kind()) {
                latest.insert(overlay.kind(), overlay.view());
                if latest.len() == kinds.len() {
                    break;
                }
            }
        }
        latest
    }

    /// Views of the requested kinds at or after the cursor, in time order
    pub fn future_messages(&self, kinds: &[MessageKind]) -> Vec<&LogEntry> {
        let cursor = self.cursor().min(self.overlays.len());
        self.overlays[cursor..]
            .iter()
            .filter(|o| kinds.contains(&o.kind()))
            .map(|o| o.view())
            .collect()
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Applies node edits across their spans.
    pub fn apply(&mut self, request: &ApplyRequest) -> SessionResult<ApplyResult> {
        let result = SpanResolver::new(&mut self.overlays, &self.logger)
            .with_rollup(rollup_handle(&mut self.rollup))
            .apply(request)?;
        self.track_insertion(&result);
        Ok(result)
    }

    /// Replaces the published score.
    pub fn apply_score(&mut self, score: LessonScore) -> SessionResult<ApplyResult> {
        let result = SpanResolver::new(&mut self.overlays, &self.logger)
            .with_rollup(rollup_handle(&mut self.rollup))
            .apply_score(score)?;
        Ok(result)
    }

    /// Replaces an existing record's content.
    pub fn edit(&mut self, existing: &PatchRecord, replacement: &PatchBody) -> SessionResult<ApplyResult> {
        let result = SpanResolver::new(&mut self.overlays, &self.logger)
            .with_rollup(rollup_handle(&mut self.rollup))
            .edit(existing, replacement)?;
        self.track_insertion(&result);
        Ok(result)
    }

    /// Removes the span of patches for `target` around `timestamp`.
    pub fn remove(&mut self, timestamp: i64, target: &str) -> SessionResult<ApplyResult> {
        let result = SpanResolver::new(&mut self.overlays, &self.logger).remove(timestamp, target)?;
        Ok(result)
    }

    /// Every patch record, with the timestamp of the overlay holding it
    pub fn patches(&self) -> Vec<(i64, &PatchRecord)> {
        self.overlays
            .iter()
            .flat_map(|o| o.patches().map(move |r| (o.timestamp(), r)))
            .collect()
    }

    // =========================================================================
    // Patch file
    // =========================================================================

    /// Writes the patched view of every patched overlay to the patch file.
    /// Returns the number of entries written.
    pub fn persist_patches(&self) -> SessionResult<usize> {
        let entries = self
            .retained_patches
            .iter()
            .cloned()
            .chain(self.overlays.iter().filter_map(|o| o.patched_entry().cloned()));
        Ok(self.store.persist(entries)?)
    }

    /// Deletes the patch file. In-memory patches are kept.
    pub fn delete_patch_file(&mut self) -> SessionResult<bool> {
        self.retained_patches.clear();
        Ok(self.store.delete()?)
    }

    fn lock_cursor(&self) -> MutexGuard<'_, usize> {
        match self.cursor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// An overlay inserted before the cursor shifts it by one.
    fn track_insertion(&self, result: &ApplyResult) {
        if let Some(inserted) = result.inserted_index() {
            let mut cursor = self.lock_cursor();
            if inserted < *cursor {
                *cursor += 1;
            }
        }
    }
}

fn rollup_handle(rollup: &mut Option<Box<dyn RollupEngine>>) -> Option<&mut dyn RollupEngine> {
    match rollup {
        Some(engine) => Some(&mut **engine),
        None => None,
    }
}

/// Loads the scenario definition, if one is configured; without one the
/// engine is used as given. A missing definition disables roll-up for the
/// session; any other failure is fatal.
fn load_rollup(
    rollup: Option<Box<dyn RollupEngine>>,
    config: &SessionConfig,
    logger: &Logger,
) -> SessionResult<Option<Box<dyn RollupEngine>>> {
    let Some(mut engine) = rollup else {
        return Ok(None);
    };
    let Some(definition) = config.scenario_definition.as_ref() else {
        return Ok(Some(engine));
    };
    match engine.load(definition) {
        Ok(()) => Ok(Some(engine)),
        Err(e) if e.is_not_found() => {
            logger.event(
                Event::RollupUnavailable,
                &[
                    ("path", &definition.display().to_string()),
                    ("reason", &e.to_string()),
                ],
            );
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{AssessmentLevel, PerformanceNode, PerformanceTree};
    use crate::span::SpanMode;
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

    fn engine(dir: &Path, entries: Vec<LogEntry>) -> SessionEngine {
        SessionEngine::new(
            LogSource::in_memory(dir.join("s.log"), entries),
            TimeWindow::all(),
            "reviewer",
            MessageFilter::all(),
            None,
            SessionConfig::default(),
            Logger::disabled(),
        )
        .unwrap()
    }

    #[test]
    fn test_blank_username_rejected() {
        let dir = TempDir::new().unwrap();
        let result = SessionEngine::new(
            LogSource::in_memory(dir.path().join("s.log"), Vec::new()),
            TimeWindow::all(),
            "  ",
            MessageFilter::all(),
            None,
            SessionConfig::default(),
            Logger::disabled(),
        );
        assert!(matches!(result, Err(SessionError::BlankUsername)));
    }

    #[test]
    fn test_lookup_by_time() {
        let dir = TempDir::new().unwrap();
        let engine = engine(
            dir.path(),
            vec![
                assessment(1, 10, AssessmentLevel::Unknown),
                assessment(2, 20, AssessmentLevel::Unknown),
            ],
        );
        assert_eq!(engine.overlay_at(20).map(|o| o.timestamp()), Some(20));
        assert!(engine.overlay_at(15).is_none());
        assert_eq!(engine.index_at_or_before(15), Some(0));
        assert_eq!(engine.index_at_or_before(5), None);
        assert_eq!(engine.index_at_or_before(99), Some(1));
    }

    #[test]
    fn test_insertion_before_cursor_shifts_it() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(
            dir.path(),
            vec![
                assessment(1, 10, AssessmentLevel::BelowExpectation),
                assessment(2, 20, AssessmentLevel::AtExpectation),
            ],
        );
        engine.seek(20);
        assert_eq!(engine.cursor(), 2);

        let mut requested = engine.state_at(15, "Task1").unwrap();
        requested.short_term = AssessmentLevel::AboveExpectation;
        let result = engine
            .apply(&ApplyRequest::single("Task1", requested, 15, SpanMode::Point))
            .unwrap();
        assert_eq!(result.inserted_index(), Some(1));
        assert_eq!(engine.cursor(), 3);
    }
}
