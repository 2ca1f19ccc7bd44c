//! Span resolution
//!
//! Turns one user edit into patch records on every overlay it should reach.
//!
//! Every operation runs in two passes over the overlay list:
//!
//! 1. Scan: pick the anchor, build the patches, and collect the overlay
//!    indices each patch lands on. Nothing is mutated.
//! 2. Apply: add the planned records per overlay inside one batch, then
//!    insert a synthesized anchor if one was created.
//!
//! Each overlay receives the patch stamped with its own timestamp, so repeat
//! edits of a node on an overlay merge into a single record.

use std::collections::BTreeMap;

use crate::assessment::{LessonScore, PerformanceState, PerformanceTree};
use crate::observability::{Event, Logger};
use crate::overlay::MessageOverlay;
use crate::patch::{FieldPatch, PatchBody, PatchRecord, ScorePatch};
use crate::rollup::RollupEngine;
use crate::session_log::MessageKind;

use super::errors::{SpanError, SpanResult};
use super::predicate::span_equivalent;
use super::request::{ApplyRequest, ApplyResult, SpanMode};

/// Where an edit anchors
enum Anchor {
    /// An overlay already in the list
    Existing(usize),
    /// A clone of the preceding overlay, inserted after the scan
    Synthetic {
        overlay: Box<MessageOverlay>,
        insert_at: usize,
    },
}

/// One planned node edit and the anchor state it was diffed against
struct NodeEdit {
    patch: FieldPatch,
    reference: PerformanceState,
}

/// Applies, removes and edits patches over an ordered overlay list.
pub struct SpanResolver<'a> {
    overlays: &'a mut Vec<MessageOverlay>,
    rollup: Option<&'a mut dyn RollupEngine>,
    logger: &'a Logger,
}

impl<'a> SpanResolver<'a> {
    /// Resolver over `overlays`, which must be in time order.
    pub fn new(overlays: &'a mut Vec<MessageOverlay>, logger: &'a Logger) -> Self {
        Self {
            overlays,
            rollup: None,
            logger,
        }
    }

    /// Attaches a roll-up engine; parents it reports as changed join the edit.
    pub fn with_rollup(mut self, rollup: Option<&'a mut dyn RollupEngine>) -> Self {
        self.rollup = rollup;
        self
    }

    /// Applies the requested node states.
    ///
    /// # Errors
    ///
    /// - `NoTargets` / `BlankTarget` for malformed requests
    /// - `NoAnchor` if no assessment exists at or before the request time
    /// - `UnknownTarget` if the anchor does not assess a requested node
    pub fn apply(&mut self, request: &ApplyRequest) -> SpanResult<ApplyResult> {
        if request.targets().is_empty() {
            return Err(SpanError::NoTargets);
        }
        if request.targets().iter().any(|(name, _)| name.trim().is_empty()) {
            return Err(SpanError::BlankTarget);
        }

        let timestamp = request.timestamp();
        let anchor = self.locate_anchor(timestamp, request.mode())?;
        let edits = self.plan_edits(&anchor, request)?;

        if edits.is_empty() {
            return Ok(match anchor {
                Anchor::Existing(index) => ApplyResult::at(index),
                Anchor::Synthetic { .. } => ApplyResult::default(),
            });
        }

        // Scan
        let mut planned: BTreeMap<usize, Vec<PatchRecord>> = BTreeMap::new();
        let mut synthetic_records = Vec::new();
        for edit in &edits {
            let target = edit.patch.target();
            let (members, forward_from) = match &anchor {
                Anchor::Existing(index) => {
                    let members = match request.mode() {
                        SpanMode::WholeSpan => self.span_ending_at(*index, target),
                        SpanMode::Point => vec![*index],
                    };
                    (members, *index + 1)
                }
                Anchor::Synthetic { insert_at, .. } => {
                    synthetic_records.push(PatchRecord::field(timestamp, edit.patch.clone()));
                    (Vec::new(), *insert_at)
                }
            };

            let forward = self.continuing_from(forward_from, target, &edit.reference);
            for index in members.into_iter().chain(forward) {
                let time = self.overlays[index].timestamp();
                planned
                    .entry(index)
                    .or_default()
                    .push(PatchRecord::field(time, edit.patch.clone()));
            }
        }

        // Apply
        let mut result = match &anchor {
            Anchor::Existing(index) => ApplyResult::at(*index),
            Anchor::Synthetic { .. } => ApplyResult::default(),
        };
        for (index, records) in planned {
            if apply_batch(&mut self.overlays[index], records, self.logger) {
                result.mark_affected(index);
            }
        }
        if let Anchor::Synthetic {
            mut overlay,
            insert_at,
        } = anchor
        {
            apply_batch(&mut overlay, synthetic_records, self.logger);
            self.overlays.insert(insert_at, *overlay);
            result.mark_inserted(insert_at);
            result.mark_affected(insert_at);
            self.logger.event(
                Event::OverlaySynthesized,
                &[
                    ("index", &insert_at.to_string()),
                    ("timestamp", &timestamp.to_string()),
                ],
            );
        }

        let targets: Vec<&str> = edits.iter().map(|e| e.patch.target()).collect();
        self.logger.event(
            Event::PatchApplied,
            &[
                ("mode", request.mode().as_str()),
                ("overlays_changed", &result.affected_indices().len().to_string()),
                ("targets", &targets.join(",")),
                ("timestamp", &timestamp.to_string()),
            ],
        );
        Ok(result)
    }

    /// Replaces the published score.
    ///
    /// The target is the score entry whose root names the active scenario,
    /// falling back to the most recent score entry.
    pub fn apply_score(&mut self, score: LessonScore) -> SpanResult<ApplyResult> {
        let scenario = self
            .rollup
            .as_deref()
            .and_then(|r| r.scenario())
            .map(|s| s.name.clone());

        let score_indices: Vec<usize> = self
            .overlays
            .iter()
            .enumerate()
            .filter(|(_, o)| o.kind() == MessageKind::LessonScore)
            .map(|(i, _)| i)
            .collect();

        let matching = scenario.as_deref().and_then(|name| {
            score_indices.iter().rev().copied().find(|&i| {
                self.overlays[i]
                    .original()
                    .lesson_score()
                    .map(|s| s.scenario_name() == name)
                    .unwrap_or(false)
            })
        });
        let index = matching
            .or_else(|| score_indices.last().copied())
            .ok_or(SpanError::NoScoreEntry)?;

        let overlay = &mut self.overlays[index];
        let record = PatchRecord::score(overlay.timestamp(), ScorePatch::new(score));
        let changed = overlay.add_patch(record, false)?;

        let mut result = ApplyResult::at(index);
        if changed {
            result.mark_affected(index);
        }
        self.logger.event(
            Event::PatchApplied,
            &[
                ("mode", "score"),
                ("overlays_changed", &result.affected_indices().len().to_string()),
                ("timestamp", &self.overlays[index].timestamp().to_string()),
            ],
        );
        Ok(result)
    }

    /// Removes every patch for `target` across the span around `timestamp`.
    ///
    /// The anchor is the assessment at `timestamp`, else the nearest one
    /// before it. The span is the contiguous run around the anchor that
    /// carries a patch for `target` and stays equivalent on the patched view.
    /// Patches for other nodes are kept.
    pub fn remove(&mut self, timestamp: i64, target: &str) -> SpanResult<ApplyResult> {
        if target.trim().is_empty() {
            return Err(SpanError::BlankTarget);
        }
        let anchor = self
            .assessment_indices()
            .filter(|&i| self.overlays[i].timestamp() <= timestamp)
            .last()
            .ok_or(SpanError::NoAnchor(timestamp))?;

        let mut result = ApplyResult::at(anchor);
        let Some(reference) = self.overlays[anchor].state_of(target).cloned() else {
            return Err(SpanError::UnknownTarget {
                target: target.to_string(),
                timestamp: self.overlays[anchor].timestamp(),
            });
        };
        if !self.overlays[anchor].has_patch_for(target) {
            return Ok(result);
        }

        let candidates: Vec<usize> = self
            .assessment_indices()
            .filter(|&i| self.overlays[i].contains_target(target))
            .collect();
        let position = candidates.iter().position(|&i| i == anchor).unwrap_or(0);

        let mut members = vec![anchor];
        for &i in candidates[..position].iter().rev() {
            if !self.removable(i, target, |state| span_equivalent(state, &reference)) {
                break;
            }
            members.push(i);
        }
        for &i in &candidates[position + 1..] {
            if !self.removable(i, target, |state| span_equivalent(&reference, state)) {
                break;
            }
            members.push(i);
        }

        let mut removed = 0usize;
        for index in members {
            let overlay = &mut self.overlays[index];
            let before = overlay.view().clone();
            removed += overlay.remove_patches_for(target).len();
            if *overlay.view() != before {
                result.mark_affected(index);
            }
        }

        self.logger.event(
            Event::PatchRemoved,
            &[
                ("overlays_changed", &result.affected_indices().len().to_string()),
                ("records", &removed.to_string()),
                ("target", target),
                ("timestamp", &timestamp.to_string()),
            ],
        );
        Ok(result)
    }

    /// Replaces an existing record with new content.
    ///
    /// A field edit removes the span the record belongs to and re-applies
    /// the replacement fields across the whole span at the record's time. A
    /// score edit goes through the score path.
    pub fn edit(&mut self, existing: &PatchRecord, replacement: &PatchBody) -> SpanResult<ApplyResult> {
        match (existing.body(), replacement) {
            (PatchBody::Field(old), PatchBody::Field(new)) => {
                if old.target() != new.target() {
                    return Err(SpanError::InvalidEdit(format!(
                        "replacement targets {} but the record targets {}",
                        new.target(),
                        old.target()
                    )));
                }
                let target = old.target();
                let time = existing.time();
                let mut result = self.remove(time, target)?;

                let anchor = result.current_index().ok_or(SpanError::NoAnchor(time))?;
                let mut requested = self.overlays[anchor]
                    .state_of(target)
                    .cloned()
                    .ok_or_else(|| SpanError::UnknownTarget {
                        target: target.to_string(),
                        timestamp: time,
                    })?;
                new.apply_to(&mut requested);

                let anchor_time = self.overlays[anchor].timestamp();
                let request =
                    ApplyRequest::single(target, requested, anchor_time, SpanMode::WholeSpan);
                result.absorb(self.apply(&request)?);
                Ok(result)
            }
            (PatchBody::Score(_), PatchBody::Score(new)) => {
                self.apply_score(new.replacement().clone())
            }
            _ => Err(SpanError::InvalidEdit(
                "replacement variant differs from the record".to_string(),
            )),
        }
    }

    fn assessment_indices(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.overlays
            .iter()
            .enumerate()
            .filter(|(_, o)| o.kind() == MessageKind::PerformanceAssessment)
            .map(|(i, _)| i)
    }

    fn locate_anchor(&self, timestamp: i64, mode: SpanMode) -> SpanResult<Anchor> {
        if let Some(exact) = self
            .assessment_indices()
            .find(|&i| self.overlays[i].timestamp() == timestamp)
        {
            return Ok(Anchor::Existing(exact));
        }

        let preceding = self
            .assessment_indices()
            .filter(|&i| self.overlays[i].timestamp() < timestamp)
            .last()
            .ok_or(SpanError::NoAnchor(timestamp))?;

        match mode {
            SpanMode::WholeSpan => Ok(Anchor::Existing(preceding)),
            SpanMode::Point => {
                let overlay = self.overlays[preceding].synthesize_at(timestamp)?;
                let insert_at = self.overlays.partition_point(|o| o.timestamp() <= timestamp);
                Ok(Anchor::Synthetic {
                    overlay: Box::new(overlay),
                    insert_at,
                })
            }
        }
    }

    fn anchor_overlay<'s>(&'s self, anchor: &'s Anchor) -> &'s MessageOverlay {
        match anchor {
            Anchor::Existing(index) => &self.overlays[*index],
            Anchor::Synthetic { overlay, .. } => overlay,
        }
    }

    /// Diffs each requested state against the anchor, then asks roll-up
    /// for parents the edit changes.
    fn plan_edits(&mut self, anchor: &Anchor, request: &ApplyRequest) -> SpanResult<Vec<NodeEdit>> {
        let anchor_overlay = self.anchor_overlay(anchor);
        let anchor_time = anchor_overlay.timestamp();

        let mut edits = Vec::new();
        for (target, requested) in request.targets() {
            let before = anchor_overlay
                .state_of(target)
                .ok_or_else(|| SpanError::UnknownTarget {
                    target: target.clone(),
                    timestamp: anchor_time,
                })?;
            if let Some(patch) = FieldPatch::between(target.clone(), before, requested) {
                edits.push(NodeEdit {
                    patch,
                    reference: before.clone(),
                });
            }
        }

        let Some(tree) = anchor_overlay.view().performance_tree().cloned() else {
            return Ok(edits);
        };
        let anchor_tree = tree.clone();
        let Some(rollup) = self.rollup.as_deref_mut() else {
            return Ok(edits);
        };

        for edit in rolled_up_edits(rollup, tree, &anchor_tree, request) {
            if edits.iter().all(|e| e.patch.target() != edit.patch.target()) {
                edits.push(edit);
            }
        }
        Ok(edits)
    }

    /// The span containing `anchor`, built by walking forward from the first
    /// assessment: a member that breaks from the span's first member starts
    /// a new span. The last assessment's span is itself alone.
    fn span_ending_at(&self, anchor: usize, target: &str) -> Vec<usize> {
        if self.assessment_indices().next_back() == Some(anchor) {
            return vec![anchor];
        }

        let mut span = Vec::new();
        let mut first: Option<&PerformanceState> = None;
        for index in self.assessment_indices().take_while(|&i| i <= anchor) {
            let Some(state) = self.overlays[index].state_of(target) else {
                continue;
            };
            let continues = first.map(|head| span_equivalent(head, state)).unwrap_or(false);
            if !continues {
                span.clear();
                first = Some(state);
            }
            span.push(index);
        }
        span
    }

    /// Assessments from `start` on that continue `reference`, up to the
    /// first break. Overlays that do not assess the target are skipped.
    fn continuing_from(&self, start: usize, target: &str, reference: &PerformanceState) -> Vec<usize> {
        let mut out = Vec::new();
        for index in self.assessment_indices().filter(|&i| i >= start) {
            let Some(state) = self.overlays[index].state_of(target) else {
                continue;
            };
            if !span_equivalent(reference, state) {
                break;
            }
            out.push(index);
        }
        out
    }

    fn removable(
        &self,
        index: usize,
        target: &str,
        equivalent: impl Fn(&PerformanceState) -> bool,
    ) -> bool {
        let overlay = &self.overlays[index];
        overlay.has_patch_for(target) && overlay.state_of(target).map(equivalent).unwrap_or(false)
    }
}

/// Edits for parents that roll-up recomputes once the requested states are
/// in place.
fn rolled_up_edits(
    rollup: &mut dyn RollupEngine,
    mut tree: PerformanceTree,
    anchor_tree: &PerformanceTree,
    request: &ApplyRequest,
) -> Vec<NodeEdit> {
    for (target, requested) in request.targets() {
        if let Some(node) = tree.find_mut(target) {
            node.state = requested.clone();
        }
    }

    let mut parents: Vec<String> = Vec::new();
    for (target, _) in request.targets() {
        for name in rollup.apply_and_roll_up(target, &mut tree) {
            let requested = request.targets().iter().any(|(t, _)| *t == name);
            if !requested && !parents.contains(&name) {
                parents.push(name);
            }
        }
    }

    parents
        .into_iter()
        .filter_map(|name| {
            let before = anchor_tree.state(&name)?;
            let after = tree.state(&name)?;
            let patch = FieldPatch::between(name.clone(), before, after)?;
            Some(NodeEdit {
                patch,
                reference: before.clone(),
            })
        })
        .collect()
}

/// Adds `records` to one overlay as a single batch. Refusals are logged and
/// skipped. Returns whether the view changed.
fn apply_batch(overlay: &mut MessageOverlay, records: Vec<PatchRecord>, logger: &Logger) -> bool {
    let before = overlay.view().clone();
    overlay.begin_batch();
    for record in records {
        if let Err(e) = overlay.add_patch(record, true) {
            logger.event(
                Event::PatchRefused,
                &[
                    ("reason", &e.to_string()),
                    ("timestamp", &overlay.timestamp().to_string()),
                ],
            );
        }
    }
    overlay.end_batch();
    *overlay.view() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{AssessmentLevel, GradedScoreNode, PerformanceNode};
    use crate::session_log::LogEntry;
    use std::sync::Arc;

    fn level_state(level: AssessmentLevel) -> PerformanceState {
        PerformanceState {
            short_term: level,
            ..PerformanceState::default()
        }
    }

    fn assessment(seq: u64, ts: i64, level: AssessmentLevel) -> MessageOverlay {
        MessageOverlay::new(Arc::new(LogEntry::performance(
            seq,
            ts,
            PerformanceTree::new(vec![PerformanceNode::new("Task1", level_state(level))]),
        )))
    }

    fn levels(overlays: &[MessageOverlay]) -> Vec<(i64, AssessmentLevel)> {
        overlays
            .iter()
            .filter_map(|o| o.state_of("Task1").map(|s| (o.timestamp(), s.short_term)))
            .collect()
    }

    #[test]
    fn test_empty_request_rejected() {
        let mut overlays = vec![assessment(1, 10, AssessmentLevel::Unknown)];
        let logger = Logger::disabled();
        let mut resolver = SpanResolver::new(&mut overlays, &logger);
        let err = resolver.apply(&ApplyRequest::new(10, SpanMode::Point)).unwrap_err();
        assert_eq!(err, SpanError::NoTargets);

        let blank = ApplyRequest::single(" ", PerformanceState::default(), 10, SpanMode::Point);
        assert_eq!(resolver.apply(&blank).unwrap_err(), SpanError::BlankTarget);
    }

    #[test]
    fn test_no_anchor_before_first_assessment() {
        let mut overlays = vec![assessment(1, 10, AssessmentLevel::Unknown)];
        let logger = Logger::disabled();
        let mut resolver = SpanResolver::new(&mut overlays, &logger);
        let request = ApplyRequest::single(
            "Task1",
            level_state(AssessmentLevel::AtExpectation),
            5,
            SpanMode::WholeSpan,
        );
        assert_eq!(resolver.apply(&request).unwrap_err(), SpanError::NoAnchor(5));
    }

    #[test]
    fn test_whole_span_without_exact_anchor_uses_preceding() {
        let mut overlays = vec![
            assessment(1, 10, AssessmentLevel::BelowExpectation),
            assessment(2, 20, AssessmentLevel::BelowExpectation),
            assessment(3, 30, AssessmentLevel::AtExpectation),
        ];
        let logger = Logger::disabled();
        let result = SpanResolver::new(&mut overlays, &logger)
            .apply(&ApplyRequest::single(
                "Task1",
                level_state(AssessmentLevel::AtExpectation),
                15,
                SpanMode::WholeSpan,
            ))
            .unwrap();

        assert_eq!(result.current_index(), Some(0));
        assert_eq!(result.affected_indices().iter().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(overlays.len(), 3);
        assert!(!overlays[2].has_patches());
    }

    #[test]
    fn test_point_mode_synthesizes_at_request_time() {
        let mut overlays = vec![
            assessment(1, 10, AssessmentLevel::BelowExpectation),
            assessment(2, 20, AssessmentLevel::AtExpectation),
        ];
        let logger = Logger::disabled();
        let result = SpanResolver::new(&mut overlays, &logger)
            .apply(&ApplyRequest::single(
                "Task1",
                level_state(AssessmentLevel::AboveExpectation),
                15,
                SpanMode::Point,
            ))
            .unwrap();

        assert_eq!(result.inserted_index(), Some(1));
        assert_eq!(
            levels(&overlays),
            vec![
                (10, AssessmentLevel::BelowExpectation),
                (15, AssessmentLevel::AboveExpectation),
                (20, AssessmentLevel::AtExpectation),
            ]
        );
        assert!(overlays[1].is_synthetic());
    }

    #[test]
    fn test_noop_request_changes_nothing() {
        let mut overlays = vec![assessment(1, 10, AssessmentLevel::AtExpectation)];
        let logger = Logger::disabled();
        let result = SpanResolver::new(&mut overlays, &logger)
            .apply(&ApplyRequest::single(
                "Task1",
                level_state(AssessmentLevel::AtExpectation),
                10,
                SpanMode::WholeSpan,
            ))
            .unwrap();
        assert!(result.is_noop());
        assert!(!overlays[0].has_patches());
    }

    #[test]
    fn test_remove_restores_originals() {
        let mut overlays = vec![
            assessment(1, 10, AssessmentLevel::BelowExpectation),
            assessment(2, 20, AssessmentLevel::BelowExpectation),
            assessment(3, 30, AssessmentLevel::AtExpectation),
        ];
        let logger = Logger::disabled();
        let mut resolver = SpanResolver::new(&mut overlays, &logger);
        resolver
            .apply(&ApplyRequest::single(
                "Task1",
                level_state(AssessmentLevel::AtExpectation),
                10,
                SpanMode::WholeSpan,
            ))
            .unwrap();
        let removed = resolver.remove(10, "Task1").unwrap();
        assert_eq!(removed.affected_indices().len(), 2);
        assert!(overlays.iter().all(|o| !o.has_patches()));
    }

    #[test]
    fn test_score_falls_back_to_latest_score_entry() {
        let score = |grade| {
            LessonScore::new(GradedScoreNode {
                name: "Scenario".into(),
                grade,
                children: vec![],
            })
        };
        let mut overlays = vec![
            MessageOverlay::new(Arc::new(LogEntry::score(1, 10, score(AssessmentLevel::Unknown)))),
            MessageOverlay::new(Arc::new(LogEntry::score(
                2,
                20,
                score(AssessmentLevel::BelowExpectation),
            ))),
        ];
        let logger = Logger::disabled();
        let result = SpanResolver::new(&mut overlays, &logger)
            .apply_score(score(AssessmentLevel::AtExpectation))
            .unwrap();
        assert_eq!(result.current_index(), Some(1));
        assert!(result.affected_indices().contains(&1));
        assert!(!overlays[0].has_patches());
    }

    #[test]
    fn test_score_without_score_entry_fails() {
        let mut overlays = vec![assessment(1, 10, AssessmentLevel::Unknown)];
        let logger = Logger::disabled();
        let err = SpanResolver::new(&mut overlays, &logger)
            .apply_score(LessonScore::new(GradedScoreNode {
                name: "S".into(),
                grade: AssessmentLevel::AtExpectation,
                children: vec![],
            }))
            .unwrap_err();
        assert_eq!(err, SpanError::NoScoreEntry);
    }

    #[test]
    fn test_edit_rejects_target_change() {
        let mut overlays = vec![assessment(1, 10, AssessmentLevel::Unknown)];
        let logger = Logger::disabled();
        let mut patch = FieldPatch::new("Task1");
        patch.insert(
            crate::assessment::AssessmentField::ShortTerm,
            crate::assessment::FieldValue::Level(AssessmentLevel::AtExpectation),
        );
        let existing = PatchRecord::field(10, patch);
        let replacement = PatchBody::Field(FieldPatch::new("Task2"));
        let err = SpanResolver::new(&mut overlays, &logger)
            .edit(&existing, &replacement)
            .unwrap_err();
        assert!(matches!(err, SpanError::InvalidEdit(_)));
    }
}
