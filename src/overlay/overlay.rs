//! MessageOverlay - one played-back entry and its corrections
//!
//! An overlay owns:
//! - a shared, immutable original entry
//! - patch records sorted by `(time, identity)`
//! - a cached patched view (`None` means "no patches")
//! - a cached pre-batch view, frozen while a batch is open
//!
//! The patched view always equals the original folded with every record in
//! ascending key order. Batched (partial) updates replay from the original;
//! a single update that sorts last may extend the previous view instead, and
//! both paths give the same result.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::assessment::PerformanceState;
use crate::patch::{PatchBody, PatchKey, PatchRecord};
use crate::session_log::{LogEntry, MessageKind};

use super::errors::{OverlayError, OverlayResult};

/// One played-back entry plus its patch set.
#[derive(Debug, Clone)]
pub struct MessageOverlay {
    original: Arc<LogEntry>,
    synthetic: bool,
    node_names: Arc<HashSet<String>>,
    patches: BTreeMap<PatchKey, PatchRecord>,
    patched: Option<LogEntry>,
    pre_batch: Option<LogEntry>,
    in_batch: bool,
    incremental_replay: bool,
}

impl MessageOverlay {
    /// Wraps an original entry. The node-name index is built once here.
    pub fn new(original: Arc<LogEntry>) -> Self {
        let node_names = original
            .performance_tree()
            .map(|tree| tree.node_names())
            .unwrap_or_default();
        Self {
            original,
            synthetic: false,
            node_names: Arc::new(node_names),
            patches: BTreeMap::new(),
            patched: None,
            pre_batch: None,
            in_batch: false,
            incremental_replay: false,
        }
    }

    /// Allow single, non-batched updates to extend the last patched view.
    pub fn with_incremental_replay(mut self, enabled: bool) -> Self {
        self.incremental_replay = enabled;
        self
    }

    /// The immutable original entry
    #[inline]
    pub fn original(&self) -> &LogEntry {
        &self.original
    }

    /// Timestamp of the original (ms)
    #[inline]
    pub fn timestamp(&self) -> i64 {
        self.original.timestamp()
    }

    /// Kind of the original
    #[inline]
    pub fn kind(&self) -> MessageKind {
        self.original.kind()
    }

    /// True for overlays created by an edit rather than loaded from the log
    #[inline]
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// True if any patch record is held
    #[inline]
    pub fn has_patches(&self) -> bool {
        !self.patches.is_empty()
    }

    /// Records in fold order
    pub fn patches(&self) -> impl Iterator<Item = &PatchRecord> {
        self.patches.values()
    }

    /// Number of records held
    pub fn patch_count(&self) -> usize {
        self.patches.len()
    }

    /// The patched entry, or `None` when nothing is patched
    pub fn patched_entry(&self) -> Option<&LogEntry> {
        self.patched.as_ref()
    }

    /// What playback shows: the patched entry if any, else the original
    pub fn view(&self) -> &LogEntry {
        self.patched.as_ref().unwrap_or(&self.original)
    }

    /// The view as it was when the current batch opened; outside a batch,
    /// the current view.
    pub fn pre_batch_view(&self) -> &LogEntry {
        self.pre_batch.as_ref().unwrap_or_else(|| self.view())
    }

    /// Returns true if the original's performance tree has this node
    pub fn contains_target(&self, name: &str) -> bool {
        self.node_names.contains(name)
    }

    /// State of a node in the current view
    pub fn state_of(&self, name: &str) -> Option<&PerformanceState> {
        self.view().performance_tree()?.state(name)
    }

    /// State of a node in the pre-batch view
    pub fn pre_batch_state_of(&self, name: &str) -> Option<&PerformanceState> {
        self.pre_batch_view().performance_tree()?.state(name)
    }

    /// True if a field patch for this node is held
    pub fn has_patch_for(&self, target: &str) -> bool {
        self.patches.values().any(|r| r.target() == Some(target))
    }

    /// Freezes the pre-batch view. Nested calls keep the first snapshot.
    pub fn begin_batch(&mut self) {
        if self.in_batch {
            return;
        }
        self.pre_batch = Some(self.view().clone());
        self.in_batch = true;
    }

    /// Releases the pre-batch view; it tracks the current view again.
    pub fn end_batch(&mut self) {
        self.in_batch = false;
        self.pre_batch = None;
    }

    /// True while a batch is open
    pub fn in_batch(&self) -> bool {
        self.in_batch
    }

    /// Adds (or merges) a patch record and rebuilds the view.
    ///
    /// Returns whether the visible content changed.
    ///
    /// # Errors
    ///
    /// - `PatchAfterEntry` if the record is later than the original
    /// - `UnknownTarget` if the original's tree lacks the target node
    /// - `NotAnAssessment` / `NotAScore` if the variant does not fit the entry
    pub fn add_patch(&mut self, record: PatchRecord, is_partial: bool) -> OverlayResult<bool> {
        self.check_accepts(&record)?;

        let key = record.key();
        let merged = match self.patches.get_mut(&key) {
            Some(existing) => {
                existing.merge(&record);
                existing.clone()
            }
            None => {
                self.patches.insert(key.clone(), record.clone());
                record
            }
        };

        let sorts_last = self.patches.keys().next_back() == Some(&key);
        let before = self.view().clone();
        if !is_partial && self.incremental_replay && sorts_last {
            self.extend_view(&merged);
        } else {
            self.rebuild_from_original();
        }
        Ok(*self.view() != before)
    }

    /// Drops the record with this identity. Always replays from the original.
    ///
    /// Returns whether the visible content changed.
    pub fn remove_patch(&mut self, identity: &str) -> bool {
        let before_len = self.patches.len();
        self.patches.retain(|key, _| key.identity != identity);
        if self.patches.len() == before_len {
            return false;
        }
        let before = self.view().clone();
        self.rebuild_from_original();
        *self.view() != before
    }

    /// Drops every field patch aimed at `target`, returning the removed records.
    pub fn remove_patches_for(&mut self, target: &str) -> Vec<PatchRecord> {
        let identities: Vec<String> = self
            .patches
            .values()
            .filter(|r| r.target() == Some(target))
            .map(|r| r.identity().to_string())
            .collect();
        let removed: Vec<PatchRecord> = self
            .patches
            .values()
            .filter(|r| r.target() == Some(target))
            .cloned()
            .collect();
        for identity in &identities {
            self.remove_patch(identity);
        }
        removed
    }

    /// Drops every score patch, returning whether the view changed.
    pub fn remove_score_patches(&mut self) -> bool {
        let before_len = self.patches.len();
        self.patches
            .retain(|_, r| !matches!(r.body(), PatchBody::Score(_)));
        if self.patches.len() == before_len {
            return false;
        }
        let before = self.view().clone();
        self.rebuild_from_original();
        *self.view() != before
    }

    /// Clones this overlay (original payload and every record) as a
    /// synthetic overlay stamped with `time`.
    ///
    /// # Errors
    ///
    /// `PatchAfterEntry` if a carried record is later than `time`.
    pub fn synthesize_at(&self, time: i64) -> OverlayResult<MessageOverlay> {
        if let Some(latest) = self.patches.keys().map(|k| k.time).max() {
            if latest > time {
                return Err(OverlayError::PatchAfterEntry {
                    patch_time: latest,
                    entry_time: time,
                });
            }
        }
        let mut clone = MessageOverlay {
            original: Arc::new(self.original.restamped(time)),
            synthetic: true,
            node_names: Arc::clone(&self.node_names),
            patches: self.patches.clone(),
            patched: None,
            pre_batch: None,
            in_batch: false,
            incremental_replay: self.incremental_replay,
        };
        clone.rebuild_from_original();
        Ok(clone)
    }

    fn check_accepts(&self, record: &PatchRecord) -> OverlayResult<()> {
        let entry_time = self.timestamp();
        if record.time() > entry_time {
            return Err(OverlayError::PatchAfterEntry {
                patch_time: record.time(),
                entry_time,
            });
        }
        match record.body() {
            PatchBody::Field(patch) => {
                if self.original.performance_tree().is_none() {
                    return Err(OverlayError::NotAnAssessment(entry_time));
                }
                if !self.contains_target(patch.target()) {
                    return Err(OverlayError::UnknownTarget {
                        target: patch.target().to_string(),
                        timestamp: entry_time,
                    });
                }
            }
            PatchBody::Score(_) => {
                if self.original.lesson_score().is_none() {
                    return Err(OverlayError::NotAScore(entry_time));
                }
            }
        }
        Ok(())
    }

    fn rebuild_from_original(&mut self) {
        if self.patches.is_empty() {
            self.patched = None;
            return;
        }
        let mut working = (*self.original).clone();
        for record in self.patches.values() {
            record.apply_to(&mut working);
        }
        self.patched = Some(working);
    }

    fn extend_view(&mut self, record: &PatchRecord) {
        let mut working = self.view().clone();
        record.apply_to(&mut working);
        self.patched = Some(working);
    }

    /// Full replay from the original, bypassing the cache. Used to check
    /// the incremental path.
    pub fn replay_from_original(&self) -> LogEntry {
        let mut working = (*self.original).clone();
        for record in self.patches.values() {
            record.apply_to(&mut working);
        }
        working
    }
}
