//! Log entries: the immutable unit of a recorded session
//!
//! An entry is created once at load time and never mutated. Overlays share
//! entries through `Arc` and build patched copies on the side.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::assessment::{LessonScore, PerformanceTree};

use super::errors::{SessionLogError, SessionLogResult};

/// Kind tag of a recorded message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MessageKind {
    /// Performance assessment carrying a performance tree
    PerformanceAssessment = 1,
    /// Published overall lesson score
    LessonScore = 2,
    /// Learner state update
    LearnerState = 3,
    /// Any other domain message
    Domain = 4,
}

impl MessageKind {
    /// Every kind, in wire-tag order
    pub const ALL: [MessageKind; 4] = [
        MessageKind::PerformanceAssessment,
        MessageKind::LessonScore,
        MessageKind::LearnerState,
        MessageKind::Domain,
    ];

    /// Convert from u8, returns None for invalid values
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(MessageKind::PerformanceAssessment),
            2 => Some(MessageKind::LessonScore),
            3 => Some(MessageKind::LearnerState),
            4 => Some(MessageKind::Domain),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::PerformanceAssessment => "performance_assessment",
            MessageKind::LessonScore => "lesson_score",
            MessageKind::LearnerState => "learner_state",
            MessageKind::Domain => "domain",
        }
    }

    /// Returns true for kinds that patches can target
    pub fn is_patchable(self) -> bool {
        matches!(self, MessageKind::PerformanceAssessment | MessageKind::LessonScore)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload of a log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum Payload {
    /// Performance tree of a performance assessment
    Performance(PerformanceTree),
    /// Published score tree
    Score(LessonScore),
    /// Opaque payload of every other kind
    Other(serde_json::Value),
}

impl Payload {
    /// Returns true if this payload may be carried by `kind`
    pub fn fits(&self, kind: MessageKind) -> bool {
        match self {
            Payload::Performance(_) => kind == MessageKind::PerformanceAssessment,
            Payload::Score(_) => kind == MessageKind::LessonScore,
            Payload::Other(_) => !kind.is_patchable(),
        }
    }

    /// Encodes the payload as tagged JSON
    pub fn encode(&self) -> SessionLogResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| SessionLogError::corruption(format!("Failed to encode payload: {}", e)))
    }

    /// Decodes a payload for a record of the given kind.
    ///
    /// The tagged form is tried first. Older logs stored the bare tree
    /// without a tag; that form is interpreted by the record's kind.
    pub fn decode(kind: MessageKind, sequence: u64, data: &[u8]) -> SessionLogResult<Self> {
        let tagged_error = match serde_json::from_slice::<Payload>(data) {
            Ok(payload) if payload.fits(kind) => return Ok(payload),
            Ok(_) => {
                return Err(SessionLogError::decode_failed(
                    sequence,
                    format!("Payload does not match record kind {}", kind),
                ))
            }
            Err(e) => e,
        };

        let legacy = match kind {
            MessageKind::PerformanceAssessment => {
                serde_json::from_slice::<PerformanceTree>(data).map(Payload::Performance)
            }
            MessageKind::LessonScore => {
                serde_json::from_slice::<LessonScore>(data).map(Payload::Score)
            }
            MessageKind::LearnerState | MessageKind::Domain => {
                serde_json::from_slice::<serde_json::Value>(data).map(Payload::Other)
            }
        };

        legacy.map_err(|legacy_error| {
            SessionLogError::decode_failed(
                sequence,
                format!(
                    "Undecodable {} payload (tagged: {}; legacy: {})",
                    kind, tagged_error, legacy_error
                ),
            )
        })
    }
}

/// One immutable recorded message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    sequence: u64,
    timestamp: i64,
    kind: MessageKind,
    payload: Payload,
}

impl LogEntry {
    /// Creates an entry, checking that the payload fits the kind.
    pub fn new(
        sequence: u64,
        timestamp: i64,
        kind: MessageKind,
        payload: Payload,
    ) -> SessionLogResult<Self> {
        if !payload.fits(kind) {
            return Err(SessionLogError::corruption_at_sequence(
                sequence,
                format!("Payload does not match record kind {}", kind),
            ));
        }
        Ok(Self {
            sequence,
            timestamp,
            kind,
            payload,
        })
    }

    /// Creates a performance-assessment entry
    pub fn performance(sequence: u64, timestamp: i64, tree: PerformanceTree) -> Self {
        Self {
            sequence,
            timestamp,
            kind: MessageKind::PerformanceAssessment,
            payload: Payload::Performance(tree),
        }
    }

    /// Creates a lesson-score entry
    pub fn score(sequence: u64, timestamp: i64, score: LessonScore) -> Self {
        Self {
            sequence,
            timestamp,
            kind: MessageKind::LessonScore,
            payload: Payload::Score(score),
        }
    }

    /// Creates an entry of a non-patchable kind
    pub fn other(
        sequence: u64,
        timestamp: i64,
        kind: MessageKind,
        body: serde_json::Value,
    ) -> SessionLogResult<Self> {
        Self::new(sequence, timestamp, kind, Payload::Other(body))
    }

    /// Sequence number in the source log
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Timestamp in ms
    #[inline]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Kind tag
    #[inline]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Payload
    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Performance tree, for performance assessments
    pub fn performance_tree(&self) -> Option<&PerformanceTree> {
        match &self.payload {
            Payload::Performance(tree) => Some(tree),
            _ => None,
        }
    }

    /// Lesson score, for score entries
    pub fn lesson_score(&self) -> Option<&LessonScore> {
        match &self.payload {
            Payload::Score(score) => Some(score),
            _ => None,
        }
    }

    /// Working copies only: originals are never handed out mutably.
    pub(crate) fn performance_tree_mut(&mut self) -> Option<&mut PerformanceTree> {
        match &mut self.payload {
            Payload::Performance(tree) => Some(tree),
            _ => None,
        }
    }

    pub(crate) fn lesson_score_mut(&mut self) -> Option<&mut LessonScore> {
        match &mut self.payload {
            Payload::Score(score) => Some(score),
            _ => None,
        }
    }

    /// A copy of this entry stamped with another timestamp
    pub(crate) fn restamped(&self, timestamp: i64) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{PerformanceNode, PerformanceState};

    fn tree() -> PerformanceTree {
        PerformanceTree::new(vec![PerformanceNode::new("Task1", PerformanceState::default())])
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            MessageKind::PerformanceAssessment,
            MessageKind::LessonScore,
            MessageKind::LearnerState,
            MessageKind::Domain,
        ] {
            assert_eq!(MessageKind::from_u8(kind.as_u8()), Some(kind));
        }
        assert_eq!(MessageKind::from_u8(0), None);
    }

    #[test]
    fn test_new_rejects_mismatched_payload() {
        let result = LogEntry::new(1, 10, MessageKind::LessonScore, Payload::Performance(tree()));
        assert!(result.is_err());
        assert!(LogEntry::other(1, 10, MessageKind::PerformanceAssessment, serde_json::json!({})).is_err());
    }

    #[test]
    fn test_decode_legacy_untagged_tree() {
        let legacy = serde_json::to_vec(&tree()).unwrap();
        let payload = Payload::decode(MessageKind::PerformanceAssessment, 3, &legacy).unwrap();
        assert_eq!(payload, Payload::Performance(tree()));
    }

    #[test]
    fn test_decode_garbage_fails_with_sequence() {
        let err = Payload::decode(MessageKind::LessonScore, 9, b"not json").unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("sequence_number: 9"));
    }

    #[test]
    fn test_restamped_keeps_payload() {
        let entry = LogEntry::performance(4, 100, tree());
        let moved = entry.restamped(150);
        assert_eq!(moved.timestamp(), 150);
        assert_eq!(moved.sequence(), 4);
        assert_eq!(moved.payload(), entry.payload());
    }
}
