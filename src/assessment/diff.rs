//! Field-by-field comparison of assessment snapshots
//!
//! A pure attribution change (only the evaluator differs) is not a content
//! change: [`StateDiff::is_different`] returns false for it.

use std::collections::BTreeSet;

use super::tree::PerformanceTree;
use super::types::{AssessmentField, PerformanceState};

/// Changed fields between two [`PerformanceState`]s.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateDiff {
    changed: BTreeSet<AssessmentField>,
}

impl StateDiff {
    /// The changed field tags
    pub fn changed(&self) -> &BTreeSet<AssessmentField> {
        &self.changed
    }

    /// Returns true if the field differs
    pub fn contains(&self, field: AssessmentField) -> bool {
        self.changed.contains(&field)
    }

    /// Returns true if nothing differs at all
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Content verdict: false when nothing or only the evaluator changed
    pub fn is_different(&self) -> bool {
        match self.changed.len() {
            0 => false,
            1 => !self.changed.contains(&AssessmentField::Evaluator),
            _ => true,
        }
    }
}

/// Compares every [`AssessmentField`] of `before` and `after`.
pub fn diff_states(before: &PerformanceState, after: &PerformanceState) -> StateDiff {
    let changed = AssessmentField::ALL
        .iter()
        .copied()
        .filter(|field| before.get(*field) != after.get(*field))
        .collect();
    StateDiff { changed }
}

/// Per-node diffs for every node present in both trees, in `after`'s walk
/// order. Nodes whose diff is empty are omitted.
pub fn diff_trees(before: &PerformanceTree, after: &PerformanceTree) -> Vec<(String, StateDiff)> {
    after
        .nodes()
        .into_iter()
        .filter_map(|node| {
            let original = before.state(&node.name)?;
            let diff = diff_states(original, &node.state);
            if diff.is_empty() {
                None
            } else {
                Some((node.name.clone(), diff))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{AssessmentLevel, NodeState, PerformanceNode};

    #[test]
    fn test_identical_states_not_different() {
        let s = PerformanceState::default();
        let d = diff_states(&s, &s.clone());
        assert!(d.is_empty());
        assert!(!d.is_different());
    }

    #[test]
    fn test_evaluator_only_is_not_different() {
        let a = PerformanceState::default();
        let b = PerformanceState {
            evaluator: Some("reviewer".into()),
            ..a.clone()
        };
        let d = diff_states(&a, &b);
        assert!(d.contains(AssessmentField::Evaluator));
        assert_eq!(d.changed().len(), 1);
        assert!(!d.is_different());
    }

    #[test]
    fn test_evaluator_plus_content_is_different() {
        let a = PerformanceState::default();
        let b = PerformanceState {
            evaluator: Some("reviewer".into()),
            short_term: AssessmentLevel::AtExpectation,
            ..a.clone()
        };
        let d = diff_states(&a, &b);
        assert!(d.is_different());
        assert_eq!(d.changed().len(), 2);
    }

    #[test]
    fn test_lifecycle_is_not_a_field() {
        let a = PerformanceState::default();
        let b = PerformanceState {
            node_state: NodeState::Finished,
            ..a.clone()
        };
        assert!(diff_states(&a, &b).is_empty());
    }

    #[test]
    fn test_collection_fields_compare_by_value() {
        let a = PerformanceState::default();
        let mut b = a.clone();
        b.explanations.insert("late".into());
        b.assessed_entities
            .insert("blue".into(), AssessmentLevel::BelowExpectation);
        let d = diff_states(&a, &b);
        assert!(d.contains(AssessmentField::Explanations));
        assert!(d.contains(AssessmentField::AssessedEntities));
    }

    #[test]
    fn test_diff_trees_reports_changed_nodes_only() {
        let before = PerformanceTree::new(vec![PerformanceNode::new(
            "Task1",
            PerformanceState::default(),
        )
        .with_child(PerformanceNode::new("C1", PerformanceState::default()))]);
        let mut after = before.clone();
        after.find_mut("C1").unwrap().state.confidence = 0.2;

        let diffs = diff_trees(&before, &after);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].0, "C1");
        assert!(diffs[0].1.contains(AssessmentField::Confidence));
    }
}
