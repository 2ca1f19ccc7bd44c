//! Span membership

use crate::assessment::{NodeState, PerformanceState};

/// Returns true if `candidate` continues the span that `reference` belongs to.
///
/// Both must carry the same short-term level and level timestamp, and the
/// same lifecycle state; a node finishing (ACTIVE to FINISHED) does not break
/// the span.
pub fn span_equivalent(reference: &PerformanceState, candidate: &PerformanceState) -> bool {
    reference.short_term == candidate.short_term
        && reference.short_term_timestamp == candidate.short_term_timestamp
        && (reference.node_state == candidate.node_state
            || (reference.node_state == NodeState::Active
                && candidate.node_state == NodeState::Finished))
}
