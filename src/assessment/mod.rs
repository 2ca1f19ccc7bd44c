//! Assessment model for recorded sessions
//!
//! - Performance trees with per-node assessments
//! - The published lesson score tree
//! - The diff evaluator used to build and rebuild field patches

mod diff;
mod tree;
mod types;

pub use diff::{diff_states, diff_trees, StateDiff};
pub use tree::{GradedScoreNode, LessonScore, PerformanceNode, PerformanceTree, RawScoreNode, ScoreNode};
pub use types::{AssessmentField, AssessmentLevel, FieldValue, NodeState, PerformanceState};
