//! Observability module providing structured logging.
//!
//! Logs go to stdout in the configured format. Every record emitted by the
//! cleaner is nested under a root span carrying the application name.

mod tracing_init;

pub use tracing_init::*;
