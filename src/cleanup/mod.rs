//! Periodic removal of expired files.
//!
//! The worker runs one tick immediately at startup and then every
//! `seconds_period` seconds until cancelled. A failed tick is logged and
//! retried on the next period; it never stops the loop.

mod error;
mod worker;

pub use error::TickError;
pub use worker::{CleanupRunResult, clean_tick, run_cleanup_loop, run_tick};
