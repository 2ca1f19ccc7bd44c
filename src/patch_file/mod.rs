//! Patch file persistence
//!
//! Patches live next to the log in their own file, holding the patched view
//! of every overlay that carries patches. Loading merges those views back
//! into the original overlays by diffing.

mod errors;
mod merge;
mod paths;
mod store;

pub use errors::{PatchFileError, PatchFileErrorCode, PatchFileResult, Severity};
pub use merge::merge_patches;
pub use paths::PatchPaths;
pub use store::{LoadedPatches, PatchSource, PatchStore};
