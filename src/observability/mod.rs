//! Observability for aeroreplay
//!
//! Structured JSON logging through an injected sink.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on patch semantics
//! 3. No async or background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use aeroreplay::observability::{Event, Logger, MemorySink};
//!
//! let sink = std::sync::Arc::new(MemorySink::new());
//! let logger = Logger::new(sink.clone());
//! logger.event(Event::PatchApplied, &[("node", "Task1")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{LogSink, Logger, MemorySink, NullSink, Severity, StderrSink};
