//! Database access for the cleaner.
//!
//! The cleaner touches two collections: `files_metadata`, which carries the
//! expiration timestamp, and `files`, which holds the payload records. Both
//! are keyed by the same opaque `identifier`. The [`FilesRepo`] trait is the
//! only seam between the cleanup worker and the driver.

mod error;
mod mongo;
#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use async_trait::async_trait;
pub use error::{DbError, DbResult};
use futures::stream::BoxStream;
pub use mongo::MongoFilesRepo;
pub use mongodb::bson::Bson;

/// Collection holding one metadata record per stored file.
pub const METADATA_COLLECTION: &str = "files_metadata";
/// Collection holding the file records themselves.
pub const FILES_COLLECTION: &str = "files";
/// Field with the expiration timestamp, in seconds since the UNIX epoch.
pub const EXPIRATION_FIELD: &str = "expiration";
/// Field shared by both collections.
pub const IDENTIFIER_FIELD: &str = "identifier";

/// Lazily consumed sequence of identifiers, in cursor order.
pub type IdentifierStream = BoxStream<'static, DbResult<Bson>>;

/// Repository trait for the expired-file lookup and deletes.
#[async_trait]
pub trait FilesRepo: Send + Sync {
    /// Round-trip to the server.
    async fn ping(&self) -> DbResult<()>;

    /// Stream the identifiers of metadata records with `expiration <= now`.
    async fn find_expired_identifiers(&self, now: f64) -> DbResult<IdentifierStream>;

    /// Delete metadata records whose identifier is in `identifiers`.
    /// Returns the number of deleted records.
    async fn delete_metadata(&self, identifiers: &[Bson]) -> DbResult<u64>;

    /// Delete file records whose identifier is in `identifiers`.
    /// Returns the number of deleted records.
    async fn delete_files(&self, identifiers: &[Bson]) -> DbResult<u64>;
}

/// Check that the database answers within `timeout`.
///
/// Runs once at startup; the cleanup loop never re-checks.
pub async fn check_connection(repo: &dyn FilesRepo, timeout: Duration) -> DbResult<()> {
    tracing::info!("Checking database connection");

    let outcome = match tokio::time::timeout(timeout, repo.ping()).await {
        Ok(outcome) => outcome,
        Err(_) => Err(DbError::Unavailable(format!(
            "no reply within {}s",
            timeout.as_secs()
        ))),
    };

    if let Err(e) = &outcome {
        tracing::error!(
            error_type = e.kind(),
            error_message = %e,
            "Database is not available"
        );
    }

    outcome
}
