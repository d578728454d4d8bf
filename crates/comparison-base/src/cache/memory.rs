use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cache::ComparisonCache;
use crate::{CommitId, RequestUuid, Result};

type Key = (RequestUuid, CommitId, CommitId);

/// Process-local cache, shared between threads behind a mutex.
#[derive(Debug, Default)]
pub struct InMemoryComparisonCache {
    entries: Mutex<HashMap<Key, CommitId>>,
}

impl InMemoryComparisonCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Key, CommitId>> {
        // entries are plain values, a panic mid-insert cannot leave one half-written
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ComparisonCache for InMemoryComparisonCache {
    fn get(
        &self,
        request: RequestUuid,
        old: CommitId,
        new: CommitId,
    ) -> Result<Option<CommitId>> {
        Ok(self.entries().get(&(request, old, new)).copied())
    }

    fn put(&self, request: RequestUuid, old: CommitId, new: CommitId, base: CommitId) -> Result<()> {
        self.entries().insert((request, old, new), base);
        Ok(())
    }

    fn invalidate(&self, request: RequestUuid) -> Result<()> {
        self.entries().retain(|(r, _, _), _| *r != request);
        Ok(())
    }
}
