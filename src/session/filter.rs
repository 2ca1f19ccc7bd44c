//! Playback selection: which kinds, which time window

use std::collections::BTreeSet;

use crate::session_log::{LogEntry, MessageKind};

use super::errors::{SessionError, SessionResult};

/// Non-empty set of message kinds a session plays back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFilter {
    kinds: BTreeSet<MessageKind>,
}

impl MessageFilter {
    /// Filter accepting `kinds`; an empty set is rejected.
    pub fn new(kinds: impl IntoIterator<Item = MessageKind>) -> SessionResult<Self> {
        let kinds: BTreeSet<MessageKind> = kinds.into_iter().collect();
        if kinds.is_empty() {
            return Err(SessionError::EmptyFilter);
        }
        Ok(Self { kinds })
    }

    /// Filter accepting every kind
    pub fn all() -> Self {
        Self {
            kinds: [
                MessageKind::PerformanceAssessment,
                MessageKind::LessonScore,
                MessageKind::LearnerState,
                MessageKind::Domain,
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Returns true if `kind` is played back
    pub fn accepts(&self, kind: MessageKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Accepted kinds
    pub fn kinds(&self) -> impl Iterator<Item = MessageKind> + '_ {
        self.kinds.iter().copied()
    }
}

/// Inclusive time window in ms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: i64,
    end: i64,
}

impl TimeWindow {
    /// Window from `start` to `end`, both inclusive.
    pub fn new(start: i64, end: i64) -> SessionResult<Self> {
        if start > end {
            return Err(SessionError::InvertedWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Unbounded window
    pub fn all() -> Self {
        Self {
            start: i64::MIN,
            end: i64::MAX,
        }
    }

    /// Window start
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Window end
    pub fn end(&self) -> i64 {
        self.end
    }

    /// Returns true if `timestamp` lies inside the window
    pub fn contains(&self, timestamp: i64) -> bool {
        (self.start..=self.end).contains(&timestamp)
    }
}

/// Returns true if the session plays `entry` back
pub(crate) fn selects(filter: &MessageFilter, window: &TimeWindow, entry: &LogEntry) -> bool {
    filter.accepts(entry.kind()) && window.contains(entry.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_rejected() {
        assert!(matches!(
            MessageFilter::new(Vec::new()),
            Err(SessionError::EmptyFilter)
        ));
    }

    #[test]
    fn test_filter_accepts_named_kinds_only() {
        let filter = MessageFilter::new([MessageKind::LessonScore]).unwrap();
        assert!(filter.accepts(MessageKind::LessonScore));
        assert!(!filter.accepts(MessageKind::Domain));
        assert!(MessageFilter::all().accepts(MessageKind::Domain));
    }

    #[test]
    fn test_inverted_window_rejected() {
        assert!(matches!(
            TimeWindow::new(10, 5),
            Err(SessionError::InvertedWindow { start: 10, end: 5 })
        ));
        let window = TimeWindow::new(5, 10).unwrap();
        assert!(window.contains(5));
        assert!(window.contains(10));
        assert!(!window.contains(11));
    }
}
