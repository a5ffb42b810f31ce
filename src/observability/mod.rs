//! Observability for the episode ledger
//!
//! Structured logging through `tracing`. Every significant lifecycle step
//! emits an `event` field drawn from [`Event`], so the same codes appear
//! in text and JSON output.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. Logs go to stderr

mod events;
mod logging;

pub use events::Event;
pub use logging::{init_tracing, LogFormat, DEFAULT_FILTER};
