//! Patch file merge
//!
//! Rebuilds patch records by walking the original overlays and the persisted
//! patched entries together, both ascending by time.
//!
//! For each original overlay, pending patch entries at or before its time are
//! consumed:
//!
//! - same time, kind and sequence: diff against the overlay and apply in place
//! - earlier: clone the nearest earlier overlay of that kind into a synthetic
//!   overlay at the entry's time, diff and apply there, insert it
//! - later: left for a later overlay
//!
//! Entries left once the originals run out become trailing synthetic
//! overlays. An entry with no earlier overlay of its kind is logged and
//! dropped.

use crate::assessment::diff_trees;
use crate::observability::{Event, Logger};
use crate::overlay::MessageOverlay;
use crate::patch::{FieldPatch, PatchRecord, ScorePatch};
use crate::session_log::LogEntry;

/// Merges persisted patched entries into freshly loaded overlays.
pub fn merge_patches(
    originals: Vec<MessageOverlay>,
    mut patches: Vec<LogEntry>,
    logger: &Logger,
) -> Vec<MessageOverlay> {
    patches.retain(|p| p.kind().is_patchable());
    patches.sort_by_key(|p| (p.timestamp(), p.sequence()));

    let mut merged: Vec<MessageOverlay> = Vec::with_capacity(originals.len() + patches.len());
    let mut pending = patches.into_iter().peekable();

    for mut overlay in originals {
        let time = overlay.timestamp();
        while let Some(patch) = pending.next_if(|p| p.timestamp() < time || same_entry(&overlay, p)) {
            if patch.timestamp() == time {
                apply_patch_entry(&mut overlay, &patch, logger);
            } else {
                attach_to_earlier(&mut merged, &patch, logger);
            }
        }
        merged.push(overlay);
    }

    for patch in pending {
        attach_to_earlier(&mut merged, &patch, logger);
    }
    merged
}

/// True if `patch` is the patched view of `overlay`'s entry.
fn same_entry(overlay: &MessageOverlay, patch: &LogEntry) -> bool {
    let original = overlay.original();
    original.timestamp() == patch.timestamp()
        && original.kind() == patch.kind()
        && original.sequence() == patch.sequence()
}

/// Applies `patch` to the overlay it was taken from, or else to the nearest
/// overlay of its kind at or before it, synthesizing one at the patch time
/// when the times differ.
fn attach_to_earlier(merged: &mut Vec<MessageOverlay>, patch: &LogEntry, logger: &Logger) {
    let time = patch.timestamp();
    if let Some(exact) = merged.iter().rposition(|o| same_entry(o, patch)) {
        apply_patch_entry(&mut merged[exact], patch, logger);
        return;
    }
    let Some(source) = merged
        .iter()
        .rposition(|o| o.kind() == patch.kind() && o.timestamp() <= time)
    else {
        logger.event(
            Event::PatchMessageOrphaned,
            &[
                ("kind", patch.kind().as_str()),
                ("timestamp", &time.to_string()),
            ],
        );
        return;
    };

    if merged[source].timestamp() == time {
        apply_patch_entry(&mut merged[source], patch, logger);
        return;
    }

    match merged[source].synthesize_at(time) {
        Ok(mut synthetic) => {
            apply_patch_entry(&mut synthetic, patch, logger);
            let at = merged.partition_point(|o| o.timestamp() <= time);
            merged.insert(at, synthetic);
            logger.event(
                Event::OverlaySynthesized,
                &[("index", &at.to_string()), ("timestamp", &time.to_string())],
            );
        }
        Err(e) => logger.event(
            Event::PatchRefused,
            &[("reason", &e.to_string()), ("timestamp", &time.to_string())],
        ),
    }
}

/// Rebuilds the records that turn the overlay's current view into `patch`
/// and adds them as one batch.
fn apply_patch_entry(overlay: &mut MessageOverlay, patch: &LogEntry, logger: &Logger) {
    let time = overlay.timestamp();
    let mut records = Vec::new();

    if let (Some(current), Some(patched)) = (overlay.view().performance_tree(), patch.performance_tree()) {
        for (name, diff) in diff_trees(current, patched) {
            if let Some(state) = patched.state(&name) {
                records.push(PatchRecord::field(time, FieldPatch::from_diff(name, &diff, state)));
            }
        }
    }
    if let (Some(current), Some(patched)) = (overlay.view().lesson_score(), patch.lesson_score()) {
        if current != patched {
            records.push(PatchRecord::score(time, ScorePatch::new(patched.clone())));
        }
    }

    overlay.begin_batch();
    for record in records {
        if let Err(e) = overlay.add_patch(record, true) {
            logger.event(
                Event::PatchRefused,
                &[("reason", &e.to_string()), ("timestamp", &time.to_string())],
            );
        }
    }
    overlay.end_batch();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{AssessmentLevel, PerformanceNode, PerformanceState, PerformanceTree};
    use crate::observability::MemorySink;
    use std::sync::Arc;

    fn tree(level: AssessmentLevel) -> PerformanceTree {
        PerformanceTree::new(vec![PerformanceNode::new(
            "Task1",
            PerformanceState {
                short_term: level,
                ..PerformanceState::default()
            },
        )])
    }

    fn overlay(seq: u64, ts: i64, level: AssessmentLevel) -> MessageOverlay {
        MessageOverlay::new(Arc::new(LogEntry::performance(seq, ts, tree(level))))
    }

    #[test]
    fn test_same_time_patch_applies_in_place() {
        let originals = vec![overlay(1, 10, AssessmentLevel::BelowExpectation)];
        let patches = vec![LogEntry::performance(1, 10, tree(AssessmentLevel::AtExpectation))];
        let merged = merge_patches(originals, patches, &Logger::disabled());

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].patch_count(), 1);
        assert_eq!(
            merged[0].state_of("Task1").unwrap().short_term,
            AssessmentLevel::AtExpectation
        );
    }

    #[test]
    fn test_between_and_trailing_patches_synthesize() {
        let originals = vec![
            overlay(1, 10, AssessmentLevel::BelowExpectation),
            overlay(2, 20, AssessmentLevel::BelowExpectation),
        ];
        let patches = vec![
            LogEntry::performance(1, 15, tree(AssessmentLevel::AtExpectation)),
            LogEntry::performance(2, 25, tree(AssessmentLevel::AboveExpectation)),
        ];
        let merged = merge_patches(originals, patches, &Logger::disabled());

        let times: Vec<i64> = merged.iter().map(|o| o.timestamp()).collect();
        assert_eq!(times, vec![10, 15, 20, 25]);
        assert!(merged[1].is_synthetic());
        assert!(merged[3].is_synthetic());
        assert!(!merged[2].has_patches());
        assert_eq!(
            merged[3].state_of("Task1").unwrap().short_term,
            AssessmentLevel::AboveExpectation
        );
    }

    #[test]
    fn test_same_time_entries_match_by_sequence() {
        let originals = vec![
            overlay(1, 10, AssessmentLevel::BelowExpectation),
            overlay(2, 10, AssessmentLevel::BelowExpectation),
        ];
        let patches = vec![LogEntry::performance(2, 10, tree(AssessmentLevel::AtExpectation))];
        let merged = merge_patches(originals, patches, &Logger::disabled());

        assert_eq!(merged.len(), 2);
        assert!(!merged[0].has_patches());
        assert_eq!(
            merged[1].state_of("Task1").unwrap().short_term,
            AssessmentLevel::AtExpectation
        );
    }

    #[test]
    fn test_evaluator_only_entry_is_rebuilt() {
        let originals = vec![overlay(1, 10, AssessmentLevel::BelowExpectation)];
        let mut attributed = tree(AssessmentLevel::BelowExpectation);
        attributed.find_mut("Task1").unwrap().state.evaluator = Some("bob".to_string());
        let patches = vec![LogEntry::performance(1, 10, attributed.clone())];
        let merged = merge_patches(originals, patches, &Logger::disabled());

        assert_eq!(merged[0].patch_count(), 1);
        assert_eq!(merged[0].view().performance_tree(), Some(&attributed));
    }

    #[test]
    fn test_orphan_patch_is_logged_and_dropped() {
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::new(sink.clone());
        let originals = vec![overlay(1, 10, AssessmentLevel::Unknown)];
        let patches = vec![LogEntry::performance(9, 5, tree(AssessmentLevel::AtExpectation))];
        let merged = merge_patches(originals, patches, &logger);

        assert_eq!(merged.len(), 1);
        assert!(!merged[0].has_patches());
        assert!(sink.contains_event("PATCH_MESSAGE_ORPHANED"));
    }
}
