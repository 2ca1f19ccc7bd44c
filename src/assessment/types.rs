//! Assessment value types
//!
//! A [`PerformanceState`] is the assessment attached to one node of a
//! performance tree. Every semantically independent piece of it is named by
//! an [`AssessmentField`] and can be read or written as a [`FieldValue`], which
//! is what field patches carry.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Assessed level of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentLevel {
    /// Not assessed yet
    #[default]
    Unknown,
    /// Below expectation
    BelowExpectation,
    /// At expectation
    AtExpectation,
    /// Above expectation
    AboveExpectation,
}

impl AssessmentLevel {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentLevel::Unknown => "UNKNOWN",
            AssessmentLevel::BelowExpectation => "BELOW_EXPECTATION",
            AssessmentLevel::AtExpectation => "AT_EXPECTATION",
            AssessmentLevel::AboveExpectation => "ABOVE_EXPECTATION",
        }
    }

    /// Parse from the string representation, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "UNKNOWN" => Some(AssessmentLevel::Unknown),
            "BELOW_EXPECTATION" | "BELOW" => Some(AssessmentLevel::BelowExpectation),
            "AT_EXPECTATION" | "AT" => Some(AssessmentLevel::AtExpectation),
            "ABOVE_EXPECTATION" | "ABOVE" => Some(AssessmentLevel::AboveExpectation),
            _ => None,
        }
    }
}

impl fmt::Display for AssessmentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a performance node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    /// Not started
    #[default]
    Unactivated,
    /// Currently being assessed
    Active,
    /// Completed
    Finished,
}

/// Assessment of one performance node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceState {
    /// Short-term assessed level
    pub short_term: AssessmentLevel,
    /// When the short-term level was assessed (ms)
    pub short_term_timestamp: i64,
    /// Long-term assessed level
    pub long_term: AssessmentLevel,
    /// When the long-term level was assessed (ms)
    pub long_term_timestamp: i64,
    /// Confidence in the assessment, 0.0..=1.0
    pub confidence: f64,
    /// Competence, 0.0..=1.0
    pub competence: f64,
    /// Trend, -1.0..=1.0
    pub trend: f64,
    /// Priority, lower is more urgent
    pub priority: Option<u32>,
    /// Freezes `short_term`
    pub assessment_hold: bool,
    /// Freezes `confidence`
    pub confidence_hold: bool,
    /// Freezes `competence`
    pub competence_hold: bool,
    /// Freezes `trend`
    pub trend_hold: bool,
    /// Freezes `priority`
    pub priority_hold: bool,
    /// Free-text observer comment
    pub observer_comment: Option<String>,
    /// Reference to observer media (audio/video clip)
    pub observer_media: Option<String>,
    /// Who produced the assessment
    pub evaluator: Option<String>,
    /// Per-entity levels for team assessments
    pub assessed_entities: BTreeMap<String, AssessmentLevel>,
    /// Resource considered authoritative for this assessment
    pub authoritative_resource: Option<String>,
    /// Reasons given for the assessment
    pub explanations: BTreeSet<String>,
    /// Node lifecycle
    pub node_state: NodeState,
}

impl Default for PerformanceState {
    fn default() -> Self {
        Self {
            short_term: AssessmentLevel::Unknown,
            short_term_timestamp: 0,
            long_term: AssessmentLevel::Unknown,
            long_term_timestamp: 0,
            confidence: 1.0,
            competence: 1.0,
            trend: 0.0,
            priority: None,
            assessment_hold: false,
            confidence_hold: false,
            competence_hold: false,
            trend_hold: false,
            priority_hold: false,
            observer_comment: None,
            observer_media: None,
            evaluator: None,
            assessed_entities: BTreeMap::new(),
            authoritative_resource: None,
            explanations: BTreeSet::new(),
            node_state: NodeState::Unactivated,
        }
    }
}

/// One semantically independent field of a [`PerformanceState`].
///
/// The lifecycle state is deliberately absent: it is recorded, never patched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentField {
    /// Short-term level
    ShortTerm,
    /// Short-term timestamp
    ShortTermTimestamp,
    /// Long-term level
    LongTerm,
    /// Long-term timestamp
    LongTermTimestamp,
    /// Confidence
    Confidence,
    /// Competence
    Competence,
    /// Trend
    Trend,
    /// Priority
    Priority,
    /// Assessment hold flag
    AssessmentHold,
    /// Confidence hold flag
    ConfidenceHold,
    /// Competence hold flag
    CompetenceHold,
    /// Trend hold flag
    TrendHold,
    /// Priority hold flag
    PriorityHold,
    /// Observer comment
    ObserverComment,
    /// Observer media
    ObserverMedia,
    /// Evaluator
    Evaluator,
    /// Assessed-entity map
    AssessedEntities,
    /// Authoritative resource
    AuthoritativeResource,
    /// Explanation set
    Explanations,
}

impl AssessmentField {
    /// Every field, in comparison order
    pub const ALL: [AssessmentField; 19] = [
        AssessmentField::ShortTerm,
        AssessmentField::ShortTermTimestamp,
        AssessmentField::LongTerm,
        AssessmentField::LongTermTimestamp,
        AssessmentField::Confidence,
        AssessmentField::Competence,
        AssessmentField::Trend,
        AssessmentField::Priority,
        AssessmentField::AssessmentHold,
        AssessmentField::ConfidenceHold,
        AssessmentField::CompetenceHold,
        AssessmentField::TrendHold,
        AssessmentField::PriorityHold,
        AssessmentField::ObserverComment,
        AssessmentField::ObserverMedia,
        AssessmentField::Evaluator,
        AssessmentField::AssessedEntities,
        AssessmentField::AuthoritativeResource,
        AssessmentField::Explanations,
    ];

    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentField::ShortTerm => "SHORT_TERM",
            AssessmentField::ShortTermTimestamp => "SHORT_TERM_TIMESTAMP",
            AssessmentField::LongTerm => "LONG_TERM",
            AssessmentField::LongTermTimestamp => "LONG_TERM_TIMESTAMP",
            AssessmentField::Confidence => "CONFIDENCE",
            AssessmentField::Competence => "COMPETENCE",
            AssessmentField::Trend => "TREND",
            AssessmentField::Priority => "PRIORITY",
            AssessmentField::AssessmentHold => "ASSESSMENT_HOLD",
            AssessmentField::ConfidenceHold => "CONFIDENCE_HOLD",
            AssessmentField::CompetenceHold => "COMPETENCE_HOLD",
            AssessmentField::TrendHold => "TREND_HOLD",
            AssessmentField::PriorityHold => "PRIORITY_HOLD",
            AssessmentField::ObserverComment => "OBSERVER_COMMENT",
            AssessmentField::ObserverMedia => "OBSERVER_MEDIA",
            AssessmentField::Evaluator => "EVALUATOR",
            AssessmentField::AssessedEntities => "ASSESSED_ENTITIES",
            AssessmentField::AuthoritativeResource => "AUTHORITATIVE_RESOURCE",
            AssessmentField::Explanations => "EXPLANATIONS",
        }
    }

    /// For a hold flag, the value field it freezes
    pub fn held_value(&self) -> Option<AssessmentField> {
        match self {
            AssessmentField::AssessmentHold => Some(AssessmentField::ShortTerm),
            AssessmentField::ConfidenceHold => Some(AssessmentField::Confidence),
            AssessmentField::CompetenceHold => Some(AssessmentField::Competence),
            AssessmentField::TrendHold => Some(AssessmentField::Trend),
            AssessmentField::PriorityHold => Some(AssessmentField::Priority),
            _ => None,
        }
    }

    /// Returns true for the five hold flags
    pub fn is_hold(&self) -> bool {
        self.held_value().is_some()
    }
}

impl fmt::Display for AssessmentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value of one [`AssessmentField`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// An assessment level
    Level(AssessmentLevel),
    /// A timestamp in ms
    Timestamp(i64),
    /// A fractional score (confidence, competence, trend)
    Score(f64),
    /// Optional priority
    Priority(Option<u32>),
    /// A hold flag
    Flag(bool),
    /// Optional free text
    Text(Option<String>),
    /// Per-entity levels
    Entities(BTreeMap<String, AssessmentLevel>),
    /// Explanation set
    Explanations(BTreeSet<String>),
}

impl FieldValue {
    /// Returns true for `Flag(true)`
    pub fn is_set_flag(&self) -> bool {
        matches!(self, FieldValue::Flag(true))
    }
}

impl PerformanceState {
    /// Reads one field.
    pub fn get(&self, field: AssessmentField) -> FieldValue {
        match field {
            AssessmentField::ShortTerm => FieldValue::Level(self.short_term),
            AssessmentField::ShortTermTimestamp => FieldValue::Timestamp(self.short_term_timestamp),
            AssessmentField::LongTerm => FieldValue::Level(self.long_term),
            AssessmentField::LongTermTimestamp => FieldValue::Timestamp(self.long_term_timestamp),
            AssessmentField::Confidence => FieldValue::Score(self.confidence),
            AssessmentField::Competence => FieldValue::Score(self.competence),
            AssessmentField::Trend => FieldValue::Score(self.trend),
            AssessmentField::Priority => FieldValue::Priority(self.priority),
            AssessmentField::AssessmentHold => FieldValue::Flag(self.assessment_hold),
            AssessmentField::ConfidenceHold => FieldValue::Flag(self.confidence_hold),
            AssessmentField::CompetenceHold => FieldValue::Flag(self.competence_hold),
            AssessmentField::TrendHold => FieldValue::Flag(self.trend_hold),
            AssessmentField::PriorityHold => FieldValue::Flag(self.priority_hold),
            AssessmentField::ObserverComment => FieldValue::Text(self.observer_comment.clone()),
            AssessmentField::ObserverMedia => FieldValue::Text(self.observer_media.clone()),
            AssessmentField::Evaluator => FieldValue::Text(self.evaluator.clone()),
            AssessmentField::AssessedEntities => {
                FieldValue::Entities(self.assessed_entities.clone())
            }
            AssessmentField::AuthoritativeResource => {
                FieldValue::Text(self.authoritative_resource.clone())
            }
            AssessmentField::Explanations => FieldValue::Explanations(self.explanations.clone()),
        }
    }

    /// Writes one field.
    ///
    /// Returns false, leaving the state untouched, when the value's type does
    /// not fit the field.
    pub fn set(&mut self, field: AssessmentField, value: &FieldValue) -> bool {
        match (field, value) {
            (AssessmentField::ShortTerm, FieldValue::Level(v)) => self.short_term = *v,
            (AssessmentField::ShortTermTimestamp, FieldValue::Timestamp(v)) => {
                self.short_term_timestamp = *v
            }
            (AssessmentField::LongTerm, FieldValue::Level(v)) => self.long_term = *v,
            (AssessmentField::LongTermTimestamp, FieldValue::Timestamp(v)) => {
                self.long_term_timestamp = *v
            }
            (AssessmentField::Confidence, FieldValue::Score(v)) => self.confidence = *v,
            (AssessmentField::Competence, FieldValue::Score(v)) => self.competence = *v,
            (AssessmentField::Trend, FieldValue::Score(v)) => self.trend = *v,
            (AssessmentField::Priority, FieldValue::Priority(v)) => self.priority = *v,
            (AssessmentField::AssessmentHold, FieldValue::Flag(v)) => self.assessment_hold = *v,
            (AssessmentField::ConfidenceHold, FieldValue::Flag(v)) => self.confidence_hold = *v,
            (AssessmentField::CompetenceHold, FieldValue::Flag(v)) => self.competence_hold = *v,
            (AssessmentField::TrendHold, FieldValue::Flag(v)) => self.trend_hold = *v,
            (AssessmentField::PriorityHold, FieldValue::Flag(v)) => self.priority_hold = *v,
            (AssessmentField::ObserverComment, FieldValue::Text(v)) => {
                self.observer_comment = v.clone()
            }
            (AssessmentField::ObserverMedia, FieldValue::Text(v)) => self.observer_media = v.clone(),
            (AssessmentField::Evaluator, FieldValue::Text(v)) => self.evaluator = v.clone(),
            (AssessmentField::AssessedEntities, FieldValue::Entities(v)) => {
                self.assessed_entities = v.clone()
            }
            (AssessmentField::AuthoritativeResource, FieldValue::Text(v)) => {
                self.authoritative_resource = v.clone()
            }
            (AssessmentField::Explanations, FieldValue::Explanations(v)) => {
                self.explanations = v.clone()
            }
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_covers_every_field() {
        let source = PerformanceState {
            short_term: AssessmentLevel::AtExpectation,
            short_term_timestamp: 5,
            long_term: AssessmentLevel::AboveExpectation,
            long_term_timestamp: 6,
            confidence: 0.5,
            competence: 0.25,
            trend: -0.5,
            priority: Some(2),
            assessment_hold: true,
            confidence_hold: true,
            competence_hold: true,
            trend_hold: true,
            priority_hold: true,
            observer_comment: Some("good".into()),
            observer_media: Some("clip.mp4".into()),
            evaluator: Some("alice".into()),
            assessed_entities: [("team-a".to_string(), AssessmentLevel::AtExpectation)].into(),
            authoritative_resource: Some("ref".into()),
            explanations: ["reason".to_string()].into(),
            node_state: NodeState::Active,
        };

        let mut target = PerformanceState {
            node_state: NodeState::Active,
            ..PerformanceState::default()
        };
        for field in AssessmentField::ALL {
            assert!(target.set(field, &source.get(field)), "field {}", field);
        }
        assert_eq!(target, source);
    }

    #[test]
    fn test_set_rejects_mismatched_type() {
        let mut state = PerformanceState::default();
        let before = state.clone();
        assert!(!state.set(AssessmentField::ShortTerm, &FieldValue::Flag(true)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_hold_pairs() {
        assert_eq!(
            AssessmentField::AssessmentHold.held_value(),
            Some(AssessmentField::ShortTerm)
        );
        assert_eq!(
            AssessmentField::PriorityHold.held_value(),
            Some(AssessmentField::Priority)
        );
        assert!(!AssessmentField::Evaluator.is_hold());
        assert_eq!(AssessmentField::ALL.iter().filter(|f| f.is_hold()).count(), 5);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(AssessmentLevel::parse("at"), Some(AssessmentLevel::AtExpectation));
        assert_eq!(
            AssessmentLevel::parse("BELOW_EXPECTATION"),
            Some(AssessmentLevel::BelowExpectation)
        );
        assert_eq!(AssessmentLevel::parse("meh"), None);
    }
}
