//! Field patches: per-field corrections to one performance node

use std::collections::BTreeMap;

use serde::Serialize;

use crate::assessment::{diff_states, AssessmentField, FieldValue, PerformanceState, StateDiff};

/// Changed fields of one named performance node.
///
/// Turning a hold flag on always carries the held value with it, so freezing
/// an assessment also freezes the value shown at that moment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldPatch {
    target: String,
    fields: BTreeMap<AssessmentField, FieldValue>,
}

impl FieldPatch {
    /// An empty patch for `target`
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Patch carrying the fields `diff` reports, with values from `requested`.
    pub fn from_diff(target: impl Into<String>, diff: &StateDiff, requested: &PerformanceState) -> Self {
        let mut patch = Self::new(target);
        for field in diff.changed() {
            patch.set_from(*field, requested);
        }
        patch
    }

    /// Patch turning `before` into `after`, or `None` when the two differ
    /// only by attribution (or not at all).
    pub fn between(
        target: impl Into<String>,
        before: &PerformanceState,
        after: &PerformanceState,
    ) -> Option<Self> {
        let diff = diff_states(before, after);
        if !diff.is_different() {
            return None;
        }
        Some(Self::from_diff(target, &diff, after))
    }

    /// Copies one field from `source`, plus the held value when it is a hold
    /// flag being turned on.
    pub fn set_from(&mut self, field: AssessmentField, source: &PerformanceState) {
        let value = source.get(field);
        if value.is_set_flag() {
            if let Some(held) = field.held_value() {
                self.fields.insert(held, source.get(held));
            }
        }
        self.fields.insert(field, value);
    }

    /// Inserts a field value verbatim
    pub fn insert(&mut self, field: AssessmentField, value: FieldValue) {
        self.fields.insert(field, value);
    }

    /// Target node name
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Patched fields
    pub fn fields(&self) -> &BTreeMap<AssessmentField, FieldValue> {
        &self.fields
    }

    /// Value for one field, if patched
    pub fn get(&self, field: AssessmentField) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    /// Returns true if no field is patched
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Merges a newer patch for the same target: its fields win per field.
    pub fn merge(&mut self, newer: &FieldPatch) {
        for (field, value) in &newer.fields {
            self.fields.insert(*field, value.clone());
        }
    }

    /// Writes the patched fields into `state`. Returns true if anything changed.
    pub fn apply_to(&self, state: &mut PerformanceState) -> bool {
        let mut changed = false;
        for (field, value) in &self.fields {
            if state.get(*field) != *value && state.set(*field, value) {
                changed = true;
            }
        }
        changed
    }
}
