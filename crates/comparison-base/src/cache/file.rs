use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use git2::Repository;

use crate::cache::ComparisonCache;
use crate::cache::lock::CacheEntryLock;
use crate::{CommitId, RequestUuid, ResolverConfig, Result};

/// Cache persisted next to the repository so answers survive restarts.
///
/// Layout: `{root}/{request uuid}/{old}-{new}` holding the hex id of the comparison base.
/// Values are replaced by rename, so readers never see a partial write.
#[derive(Debug, Clone)]
pub struct FileComparisonCache {
    root: PathBuf,
}

impl FileComparisonCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache stored at `.git/info/pullbase/{config.cache_dir}`.
    pub fn for_repository(repo: &Repository, config: &ResolverConfig) -> Self {
        Self::new(repo.path().join("info/pullbase").join(&config.cache_dir))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn request_dir(&self, request: RequestUuid) -> PathBuf {
        self.root.join(request.to_string())
    }

    fn entry_path(&self, request: RequestUuid, old: CommitId, new: CommitId) -> PathBuf {
        self.request_dir(request).join(format!("{}-{}", old, new))
    }
}

impl ComparisonCache for FileComparisonCache {
    fn get(
        &self,
        request: RequestUuid,
        old: CommitId,
        new: CommitId,
    ) -> Result<Option<CommitId>> {
        let path = self.entry_path(request, old, new);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match content.trim().parse() {
            Ok(base) => Ok(Some(base)),
            Err(err) => {
                log::warn!("ignoring corrupt cache entry {}: {}", path.display(), err);
                Ok(None)
            }
        }
    }

    fn put(&self, request: RequestUuid, old: CommitId, new: CommitId, base: CommitId) -> Result<()> {
        let path = self.entry_path(request, old, new);
        let _guard = CacheEntryLock::acquire(&path)?;

        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, format!("{}\n", base))?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn invalidate(&self, request: RequestUuid) -> Result<()> {
        match fs::remove_dir_all(self.request_dir(request)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
