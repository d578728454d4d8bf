mod file;
mod lock;
mod memory;

pub use file::FileComparisonCache;
pub use memory::InMemoryComparisonCache;

use crate::{CommitId, RequestUuid, Result};

/// Memoized comparison bases keyed by `(request, old, new)`.
///
/// Entries are advisory: callers must check that a returned commit still exists.
/// Concurrent `put`s for the same key are allowed; the last writer wins.
pub trait ComparisonCache: Send + Sync {
    fn get(&self, request: RequestUuid, old: CommitId, new: CommitId)
    -> Result<Option<CommitId>>;

    fn put(&self, request: RequestUuid, old: CommitId, new: CommitId, base: CommitId)
    -> Result<()>;

    /// Drop every entry of `request`.
    fn invalidate(&self, request: RequestUuid) -> Result<()>;
}
