//! Background cleaner for expired file records.
//!
//! Periodically finds records in the `files_metadata` collection whose
//! `expiration` timestamp has passed and deletes them, together with the
//! matching records in the `files` collection, in fixed-size batches.

pub mod cleanup;
pub mod config;
pub mod db;
pub mod observability;

/// Application name, reported to the database server and attached to logs.
pub const APP_NAME: &str = "stealthy-cleaner";
