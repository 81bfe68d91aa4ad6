//! Cleanup worker for expired files.
//!
//! Each tick looks up metadata records whose expiration has passed and
//! deletes them, together with the matching file records, in batches of
//! `remove_batch_size` identifiers. The two deletes of a batch are
//! independent requests, not a transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use tokio_util::sync::CancellationToken;

use super::TickError;
use crate::{
    config::CleanupConfig,
    db::{Bson, DbError, FILES_COLLECTION, FilesRepo, METADATA_COLLECTION},
};

/// Results from a single cleanup tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupRunResult {
    /// Number of metadata records deleted.
    pub metadata_deleted: u64,
    /// Number of file records deleted.
    pub files_deleted: u64,
    /// Number of batches attempted.
    pub batches: usize,
    /// Number of batches with a failed delete.
    pub failed_batches: usize,
}

impl CleanupRunResult {
    /// Total number of records deleted across both collections.
    pub fn total(&self) -> u64 {
        self.metadata_deleted + self.files_deleted
    }

    /// Check if any records were deleted.
    pub fn has_deletions(&self) -> bool {
        self.total() > 0
    }

    /// Per-collection totals that are worth reporting (strictly positive).
    pub fn deletion_reports(&self) -> Vec<(&'static str, u64)> {
        [
            (METADATA_COLLECTION, self.metadata_deleted),
            (FILES_COLLECTION, self.files_deleted),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .collect()
    }
}

/// Runs the cleanup loop until `cancel` fires.
///
/// A tick runs to completion before cancellation is observed; the sleep
/// between ticks is interrupted immediately.
pub async fn run_cleanup_loop(
    repo: Arc<dyn FilesRepo>,
    config: CleanupConfig,
    cancel: CancellationToken,
) {
    tracing::info!(
        seconds_period = config.seconds_period,
        remove_batch_size = config.remove_batch_size,
        "Starting cleanup loop"
    );

    let interval = config.interval();

    loop {
        clean_tick(repo.as_ref(), &config).await;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!("Cleanup loop stopped");
}

/// Run one tick against the current time, logging and swallowing any error.
///
/// Returns `None` when the tick failed.
pub async fn clean_tick(repo: &dyn FilesRepo, config: &CleanupConfig) -> Option<CleanupRunResult> {
    tracing::info!("Cleaning files");

    match run_tick(repo, config.batch_size(), Utc::now()).await {
        Ok(result) => Some(result),
        Err(e) => {
            tracing::error!(
                error_type = e.kind(),
                error_message = %e,
                "Database cleanup error"
            );
            None
        }
    }
}

/// Run one tick treating every record with `expiration <= now` as expired.
///
/// Deletion counts are logged even when the tick fails part way, since the
/// records deleted before the failure are gone either way.
pub async fn run_tick(
    repo: &dyn FilesRepo,
    batch_size: usize,
    now: DateTime<Utc>,
) -> Result<CleanupRunResult, TickError> {
    let mut result = CleanupRunResult::default();
    let outcome = delete_expired(repo, batch_size, epoch_seconds(now), &mut result).await;
    log_deletions(&result);
    outcome.map(|()| result)
}

/// Upper bound on the identifiers reserved up front; larger batches grow as
/// records arrive.
const MAX_RESERVED_BATCH: usize = 1024;

fn epoch_seconds(now: DateTime<Utc>) -> f64 {
    now.timestamp_micros() as f64 / 1_000_000.0
}

async fn delete_expired(
    repo: &dyn FilesRepo,
    batch_size: usize,
    now: f64,
    result: &mut CleanupRunResult,
) -> Result<(), TickError> {
    debug_assert!(batch_size > 0, "batch size is validated at load time");

    let mut identifiers = repo
        .find_expired_identifiers(now)
        .await
        .map_err(TickError::Query)?;

    let capacity = batch_size.min(MAX_RESERVED_BATCH);
    let mut batch = Vec::with_capacity(capacity);
    let mut first_error = None;

    while let Some(identifier) = identifiers.try_next().await.map_err(TickError::Query)? {
        batch.push(identifier);
        if batch.len() == batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(capacity));
            delete_batch(repo, &full, result, &mut first_error).await;
        }
    }

    if !batch.is_empty() {
        delete_batch(repo, &batch, result, &mut first_error).await;
    }

    match first_error {
        None => Ok(()),
        Some(source) => Err(TickError::Batches {
            failed: result.failed_batches,
            attempted: result.batches,
            source,
        }),
    }
}

/// Delete one batch from both collections. A failure abandons the rest of
/// this batch only; the caller moves on to the next one.
async fn delete_batch(
    repo: &dyn FilesRepo,
    batch: &[Bson],
    result: &mut CleanupRunResult,
    first_error: &mut Option<DbError>,
) {
    result.batches += 1;

    if let Err(e) = delete_from_both(repo, batch, result).await {
        result.failed_batches += 1;
        tracing::warn!(
            batch = result.batches,
            size = batch.len(),
            error_type = e.kind(),
            error_message = %e,
            "Batch deletion failed"
        );
        first_error.get_or_insert(e);
    }
}

// Metadata goes first: if the file delete then fails, the file record is
// orphaned rather than left behind with a live expiration.
async fn delete_from_both(
    repo: &dyn FilesRepo,
    batch: &[Bson],
    result: &mut CleanupRunResult,
) -> Result<(), DbError> {
    result.metadata_deleted += repo.delete_metadata(batch).await?;
    result.files_deleted += repo.delete_files(batch).await?;
    Ok(())
}

fn log_deletions(result: &CleanupRunResult) {
    for (collection, count) in result.deletion_reports() {
        tracing::info!(count, collection, "Data deleted");
    }

    if !result.has_deletions() {
        tracing::debug!(batches = result.batches, "Cleanup run complete, no records deleted");
    }
}
