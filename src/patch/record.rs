//! Patch records: the minimal correction unit
//!
//! Every record has the same envelope (time, identity) around a variant body.
//! The identity is derived from `(variant, target, time)`, so two edits of the
//! same target at the same time always land on the same record and merge.

use std::fmt;

use serde::Serialize;

use crate::session_log::LogEntry;

use super::field::FieldPatch;
use super::score::ScorePatch;

/// Sort key of a record inside an overlay: time first, then identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PatchKey {
    /// Patch time in ms
    pub time: i64,
    /// Deterministic identity
    pub identity: String,
}

impl fmt::Display for PatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity)
    }
}

/// Variant payload of a patch record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum PatchBody {
    /// Per-field correction of one performance node
    Field(FieldPatch),
    /// Replacement of the published score tree
    Score(ScorePatch),
}

/// A time-stamped, identified correction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchRecord {
    time: i64,
    identity: String,
    body: PatchBody,
}

impl PatchRecord {
    /// Wraps a field patch
    pub fn field(time: i64, patch: FieldPatch) -> Self {
        Self {
            time,
            identity: field_identity(patch.target(), time),
            body: PatchBody::Field(patch),
        }
    }

    /// Wraps a score patch; score patches are keyed by time only
    pub fn score(time: i64, patch: ScorePatch) -> Self {
        Self {
            time,
            identity: score_identity(time),
            body: PatchBody::Score(patch),
        }
    }

    /// Patch time in ms
    #[inline]
    pub fn time(&self) -> i64 {
        self.time
    }

    /// Deterministic identity
    #[inline]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Variant body
    #[inline]
    pub fn body(&self) -> &PatchBody {
        &self.body
    }

    /// Sort key
    pub fn key(&self) -> PatchKey {
        PatchKey {
            time: self.time,
            identity: self.identity.clone(),
        }
    }

    /// Target node name, for field patches
    pub fn target(&self) -> Option<&str> {
        match &self.body {
            PatchBody::Field(patch) => Some(patch.target()),
            PatchBody::Score(_) => None,
        }
    }

    /// The same correction stamped with another time
    pub fn restamped(&self, time: i64) -> Self {
        match &self.body {
            PatchBody::Field(patch) => Self::field(time, patch.clone()),
            PatchBody::Score(patch) => Self::score(time, patch.clone()),
        }
    }

    /// Merges a newer record with the same identity into this one.
    ///
    /// Returns false, leaving this record untouched, when the identities or
    /// variants differ.
    pub fn merge(&mut self, newer: &PatchRecord) -> bool {
        if self.identity != newer.identity {
            return false;
        }
        match (&mut self.body, &newer.body) {
            (PatchBody::Field(existing), PatchBody::Field(incoming)) => {
                existing.merge(incoming);
                true
            }
            (PatchBody::Score(existing), PatchBody::Score(incoming)) => {
                *existing = incoming.clone();
                true
            }
            _ => false,
        }
    }

    /// Folds this record onto a working copy of an entry.
    ///
    /// A target missing from the working copy is skipped. Returns true if
    /// the entry changed.
    pub fn apply_to(&self, entry: &mut LogEntry) -> bool {
        match &self.body {
            PatchBody::Field(patch) => entry
                .performance_tree_mut()
                .and_then(|tree| tree.find_mut(patch.target()))
                .map(|node| patch.apply_to(&mut node.state))
                .unwrap_or(false),
            PatchBody::Score(patch) => entry
                .lesson_score_mut()
                .map(|score| patch.apply_to(score))
                .unwrap_or(false),
        }
    }
}

/// Identity of a field patch on `target` at `time`
pub fn field_identity(target: &str, time: i64) -> String {
    format!("field|{}|{}", target, time)
}

/// Identity of a score patch at `time`
pub fn score_identity(time: i64) -> String {
    format!("score|{}", time)
}
