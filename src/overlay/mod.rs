//! Message overlays
//!
//! An overlay pairs one immutable recorded entry with the patch records that
//! correct it, and caches the reconstructed view that playback shows.

mod errors;
#[allow(clippy::module_inception)]
mod overlay;

pub use errors::{OverlayError, OverlayResult};
pub use overlay::MessageOverlay;
