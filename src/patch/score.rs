//! Score patches: wholesale replacement of the published lesson score

use serde::Serialize;

use crate::assessment::LessonScore;

/// Replacement score tree. The overall score is a terminal snapshot, so it is
/// never diffed: the replacement wins entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScorePatch {
    replacement: LessonScore,
}

impl ScorePatch {
    /// Create a score patch
    pub fn new(replacement: LessonScore) -> Self {
        Self { replacement }
    }

    /// The replacement tree
    pub fn replacement(&self) -> &LessonScore {
        &self.replacement
    }

    /// Writes the replacement over `score`. Returns true if anything changed.
    pub fn apply_to(&self, score: &mut LessonScore) -> bool {
        if *score == self.replacement {
            return false;
        }
        *score = self.replacement.clone();
        true
    }
}
