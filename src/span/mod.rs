//! Span resolution
//!
//! A span is a maximal contiguous run of assessments that share one node's
//! short-term level, level timestamp and lifecycle. One user edit reaches
//! every overlay of the span it lands in and carries forward until the span
//! breaks; nothing outside it is touched.

mod errors;
mod predicate;
mod request;
mod resolver;

pub use errors::{SpanError, SpanResult};
pub use predicate::span_equivalent;
pub use request::{ApplyRequest, ApplyResult, SpanMode};
pub use resolver::SpanResolver;
