//! Apply requests and results

use std::collections::BTreeSet;
use std::fmt;

use crate::assessment::PerformanceState;

/// How far one edit reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanMode {
    /// The whole span around the anchor, and forward while it continues
    #[default]
    WholeSpan,
    /// The anchor only (synthesized if needed), and forward while the span
    /// continues
    Point,
}

impl SpanMode {
    /// Mode name for log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanMode::WholeSpan => "whole_span",
            SpanMode::Point => "point",
        }
    }
}

impl fmt::Display for SpanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user edit: requested states for one or more nodes at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyRequest {
    targets: Vec<(String, PerformanceState)>,
    timestamp: i64,
    mode: SpanMode,
}

impl ApplyRequest {
    /// Empty request at `timestamp`
    pub fn new(timestamp: i64, mode: SpanMode) -> Self {
        Self {
            targets: Vec::new(),
            timestamp,
            mode,
        }
    }

    /// Request for a single node
    pub fn single(
        target: impl Into<String>,
        requested: PerformanceState,
        timestamp: i64,
        mode: SpanMode,
    ) -> Self {
        Self::new(timestamp, mode).with_target(target, requested)
    }

    /// Adds a requested node state. A repeated name replaces the earlier state.
    pub fn with_target(mut self, target: impl Into<String>, requested: PerformanceState) -> Self {
        let target = target.into();
        match self.targets.iter_mut().find(|(name, _)| *name == target) {
            Some(slot) => slot.1 = requested,
            None => self.targets.push((target, requested)),
        }
        self
    }

    /// Requested node states, in request order
    pub fn targets(&self) -> &[(String, PerformanceState)] {
        &self.targets
    }

    /// Request time (ms)
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Span mode
    pub fn mode(&self) -> SpanMode {
        self.mode
    }
}

/// Outcome of a mutating operation.
///
/// Indices refer to the overlay list after the operation, including any
/// overlay it inserted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplyResult {
    current_index: Option<usize>,
    affected: BTreeSet<usize>,
    inserted_index: Option<usize>,
}

impl ApplyResult {
    /// Result pointing at `current` with nothing changed yet
    pub fn at(current: usize) -> Self {
        Self {
            current_index: Some(current),
            ..Self::default()
        }
    }

    /// Overlay found or synthesized at the request time
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Every overlay whose visible content changed
    pub fn affected_indices(&self) -> &BTreeSet<usize> {
        &self.affected
    }

    /// Position of the synthesized overlay, if one was inserted
    pub fn inserted_index(&self) -> Option<usize> {
        self.inserted_index
    }

    /// True if nothing changed and nothing was inserted
    pub fn is_noop(&self) -> bool {
        self.affected.is_empty() && self.inserted_index.is_none()
    }

    pub(crate) fn mark_affected(&mut self, index: usize) {
        self.affected.insert(index);
    }

    /// Records an insertion at `index`, shifting every index at or after it.
    pub(crate) fn mark_inserted(&mut self, index: usize) {
        self.affected = self
            .affected
            .iter()
            .map(|&i| if i >= index { i + 1 } else { i })
            .collect();
        if let Some(current) = self.current_index.as_mut() {
            if *current >= index {
                *current += 1;
            }
        }
        self.inserted_index = Some(index);
        self.current_index = Some(index);
    }

    /// Folds a later result into this one. `later` indices are already in
    /// final coordinates; its current overlay wins.
    pub(crate) fn absorb(&mut self, later: ApplyResult) {
        if let Some(inserted) = later.inserted_index {
            self.affected = self
                .affected
                .iter()
                .map(|&i| if i >= inserted { i + 1 } else { i })
                .collect();
            self.inserted_index = Some(inserted);
        }
        self.affected.extend(later.affected);
        if later.current_index.is_some() {
            self.current_index = later.current_index;
        }
    }
}
