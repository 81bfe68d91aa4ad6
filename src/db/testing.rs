//! In-memory [`FilesRepo`] that records every call, for worker tests.

use std::{
    collections::HashSet,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use futures::StreamExt;

use super::{Bson, DbError, DbResult, FilesRepo, IdentifierStream};

#[derive(Default)]
pub struct RecordingRepo {
    identifiers: Vec<Bson>,
    failing_finds: usize,
    cursor_fails_after: Option<usize>,
    failing_metadata_calls: HashSet<usize>,
    failing_files_calls: HashSet<usize>,
    unreachable: bool,
    hanging_ping: bool,

    pings: AtomicUsize,
    finds: Mutex<Vec<f64>>,
    metadata_deletes: Mutex<Vec<Vec<Bson>>>,
    files_deletes: Mutex<Vec<Vec<Bson>>>,
}

impl RecordingRepo {
    /// Repo whose expired-record query yields `identifiers` in order.
    pub fn with_identifiers(identifiers: impl IntoIterator<Item = impl Into<Bson>>) -> Self {
        Self {
            identifiers: identifiers.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Fail the first `times` expired-record queries.
    pub fn failing_find(mut self, times: usize) -> Self {
        self.failing_finds = times;
        self
    }

    /// Yield `count` identifiers, then a cursor error.
    pub fn cursor_failing_after(mut self, count: usize) -> Self {
        self.cursor_fails_after = Some(count);
        self
    }

    /// Fail the metadata delete with the given zero-based call index.
    pub fn failing_metadata_delete(mut self, call: usize) -> Self {
        self.failing_metadata_calls.insert(call);
        self
    }

    /// Fail the files delete with the given zero-based call index.
    pub fn failing_files_delete(mut self, call: usize) -> Self {
        self.failing_files_calls.insert(call);
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn hanging_ping(mut self) -> Self {
        self.hanging_ping = true;
        self
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn find_calls(&self) -> Vec<f64> {
        self.finds.lock().unwrap().clone()
    }

    pub fn metadata_deletes(&self) -> Vec<Vec<Bson>> {
        self.metadata_deletes.lock().unwrap().clone()
    }

    pub fn files_deletes(&self) -> Vec<Vec<Bson>> {
        self.files_deletes.lock().unwrap().clone()
    }
}

fn record_delete(
    calls: &Mutex<Vec<Vec<Bson>>>,
    failing: &HashSet<usize>,
    identifiers: &[Bson],
) -> DbResult<u64> {
    let mut calls = calls.lock().unwrap();
    let index = calls.len();
    calls.push(identifiers.to_vec());
    if failing.contains(&index) {
        return Err(DbError::Unavailable(format!("delete call {index} failed")));
    }
    Ok(identifiers.len() as u64)
}

#[async_trait]
impl FilesRepo for RecordingRepo {
    async fn ping(&self) -> DbResult<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.hanging_ping {
            std::future::pending::<()>().await;
        }
        if self.unreachable {
            return Err(DbError::Unavailable("connection refused".into()));
        }
        Ok(())
    }

    async fn find_expired_identifiers(&self, now: f64) -> DbResult<IdentifierStream> {
        let call = {
            let mut finds = self.finds.lock().unwrap();
            finds.push(now);
            finds.len()
        };
        if call <= self.failing_finds {
            return Err(DbError::Unavailable("unexpected error".into()));
        }

        let mut items: Vec<DbResult<Bson>> = match self.cursor_fails_after {
            Some(count) => self.identifiers.iter().take(count).cloned().map(Ok).collect(),
            None => self.identifiers.iter().cloned().map(Ok).collect(),
        };
        if self.cursor_fails_after.is_some() {
            items.push(Err(DbError::Unavailable("cursor killed".into())));
        }

        Ok(futures::stream::iter(items).boxed())
    }

    async fn delete_metadata(&self, identifiers: &[Bson]) -> DbResult<u64> {
        record_delete(
            &self.metadata_deletes,
            &self.failing_metadata_calls,
            identifiers,
        )
    }

    async fn delete_files(&self, identifiers: &[Bson]) -> DbResult<u64> {
        record_delete(&self.files_deletes, &self.failing_files_calls, identifiers)
    }
}
