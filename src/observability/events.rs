//! Observable events
//!
//! Every line the crate logs names one of these events. Each event has a
//! fixed severity so call sites cannot disagree about it.

use std::fmt;

use super::logger::Severity;

/// Observable events in a review session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Log and patch file loaded, overlays ready
    SessionOpened,
    /// Roll-up scenario definition missing; roll-up disabled
    RollupUnavailable,

    // Edits
    /// A patch changed one or more overlays
    PatchApplied,
    /// Patches removed from a span
    PatchRemoved,
    /// An overlay refused a patch record
    PatchRefused,
    /// A synthetic overlay was inserted
    OverlaySynthesized,

    // Patch file
    /// Patch file read and merged
    PatchFileLoaded,
    /// Patch file written and synced
    PatchFileWritten,
    /// Patch file removed
    PatchFileDeleted,
    /// Legacy patch file moved aside
    LegacyPatchFileBackedUp,
    /// A persisted patch message had no overlay to attach to
    PatchMessageOrphaned,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SessionOpened => "SESSION_OPENED",
            Event::RollupUnavailable => "ROLLUP_UNAVAILABLE",
            Event::PatchApplied => "PATCH_APPLIED",
            Event::PatchRemoved => "PATCH_REMOVED",
            Event::PatchRefused => "PATCH_REFUSED",
            Event::OverlaySynthesized => "OVERLAY_SYNTHESIZED",
            Event::PatchFileLoaded => "PATCH_FILE_LOADED",
            Event::PatchFileWritten => "PATCH_FILE_WRITTEN",
            Event::PatchFileDeleted => "PATCH_FILE_DELETED",
            Event::LegacyPatchFileBackedUp => "LEGACY_PATCH_FILE_BACKED_UP",
            Event::PatchMessageOrphaned => "PATCH_MESSAGE_ORPHANED",
        }
    }

    /// Severity this event is always logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::RollupUnavailable | Event::PatchRefused | Event::PatchMessageOrphaned => {
                Severity::Warn
            }
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
