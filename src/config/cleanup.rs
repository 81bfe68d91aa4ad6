//! Cleanup schedule configuration.
//!
//! # Example
//!
//! ```toml
//! [cleanup]
//! seconds_period = 20
//! remove_batch_size = 10
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Cleanup loop configuration.
///
/// Every tick looks up expired metadata records and deletes them together
/// with their file records, `remove_batch_size` identifiers per request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CleanupConfig {
    /// Seconds to sleep between the end of one tick and the start of the next.
    #[validate(range(min = 1))]
    pub seconds_period: u64,

    /// Maximum number of identifiers sent in one delete request.
    #[validate(range(min = 1))]
    pub remove_batch_size: u32,
}

impl CleanupConfig {
    /// Get the poll period as a Duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.seconds_period)
    }

    /// Get the batch size as a collection capacity.
    pub fn batch_size(&self) -> usize {
        self.remove_batch_size as usize
    }
}
