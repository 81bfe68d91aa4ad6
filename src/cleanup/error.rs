use thiserror::Error;

use crate::db::DbError;

/// Failure of a single cleanup tick.
///
/// Never fatal: the loop logs it and waits for the next tick.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("Failed to query expired records: {0}")]
    Query(#[source] DbError),

    #[error("{failed} of {attempted} batches failed, first error: {source}")]
    Batches {
        failed: usize,
        attempted: usize,
        #[source]
        source: DbError,
    },
}

impl TickError {
    /// Kind of the underlying database error, used as the `error_type` log field.
    pub fn kind(&self) -> &'static str {
        match self {
            TickError::Query(e) | TickError::Batches { source: e, .. } => e.kind(),
        }
    }
}
