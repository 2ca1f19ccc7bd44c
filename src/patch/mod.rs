//! Patch records
//!
//! A patch is an out-of-band correction to one recorded entry. Two variants
//! share one envelope:
//!
//! - [`FieldPatch`]: changed fields of one performance node
//! - [`ScorePatch`]: a replacement published score tree

mod field;
mod record;
mod score;

pub use field::FieldPatch;
pub use record::{field_identity, score_identity, PatchBody, PatchKey, PatchRecord};
pub use score::ScorePatch;
