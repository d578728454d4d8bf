use fs2::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

use crate::Result;

/// Exclusive lock serializing writers of one cache entry.
///
/// The lock file is left on disk when released: unlinking it would let a waiting writer
/// lock an inode nobody else can see.
#[derive(Debug)]
pub(crate) struct CacheEntryLock {
    path: PathBuf,
    lock_file: File,
}

impl CacheEntryLock {
    pub(crate) fn acquire(entry_path: &Path) -> Result<Self> {
        let path = entry_path.with_extension("lock");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        file.lock_exclusive()?;

        log::debug!("acquired cache lock at {}", path.display());
        Ok(Self {
            path,
            lock_file: file,
        })
    }
}

impl Drop for CacheEntryLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.lock_file) {
            log::warn!(
                "failed to release cache lock at {}: {}",
                self.path.display(),
                err
            );
        }
        log::debug!("released cache lock at {}", self.path.display());
    }
}
