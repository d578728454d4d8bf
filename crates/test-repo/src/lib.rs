use std::path::{Path, PathBuf};

use git2::{Commit, Repository, Signature};
use pullbase_types::CommitId;
use tempfile::TempDir;

pub struct TestRepo {
    pub repo: Repository,
    _dir: TempDir,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, Error>;

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let repo = Repository::init(dir.path())?;
        Ok(Self { _dir: dir, repo })
    }

    pub fn path(&self) -> &Path {
        self._dir.path()
    }

    /// Opens a second handle on the same repository, e.g. for another thread.
    pub fn reopen(&self) -> Result<Repository> {
        Ok(Repository::open(self.path())?)
    }

    /// Create a commit without moving any ref.
    ///
    /// The tree starts from the first parent's tree (empty for root commits) with each
    /// `(name, content)` pair written as a top-level file.
    pub fn commit(
        &self,
        parents: &[CommitId],
        files: &[(&str, &str)],
        message: &str,
    ) -> Result<CommitId> {
        let parent_commits = parents
            .iter()
            .map(|p| self.repo.find_commit(p.oid()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let base_tree = match parent_commits.first() {
            Some(first) => Some(first.tree()?),
            None => None,
        };
        let mut builder = self.repo.treebuilder(base_tree.as_ref())?;
        for (name, content) in files {
            let blob = self.repo.blob(content.as_bytes())?;
            builder.insert(*name, blob, 0o100644)?;
        }
        let tree = self.repo.find_tree(builder.write()?)?;

        let sig = Signature::now("Test", "test@test.com")?;
        let parent_refs: Vec<&Commit> = parent_commits.iter().collect();
        let oid = self
            .repo
            .commit(None, &sig, &sig, message, &tree, &parent_refs)?;
        Ok(CommitId::from(oid))
    }

    pub fn set_branch(&self, name: &str, commit: CommitId) -> Result<()> {
        self.repo.reference(
            &format!("refs/heads/{}", name),
            commit.oid(),
            true,
            "test-repo: set branch",
        )?;
        Ok(())
    }

    pub fn ref_target(&self, name: &str) -> Option<CommitId> {
        self.repo
            .find_reference(name)
            .ok()
            .and_then(|r| r.target())
            .map(CommitId::from)
    }

    /// Delete the loose object file of `commit`, as if it had been pruned by gc.
    ///
    /// Handles opened before the removal may still hold the object in their caches,
    /// so callers should [`TestRepo::reopen`] afterwards.
    pub fn remove_object(&self, commit: CommitId) -> Result<()> {
        std::fs::remove_file(self.loose_object_path(commit))?;
        Ok(())
    }

    fn loose_object_path(&self, commit: CommitId) -> PathBuf {
        let hex = commit.to_string();
        self.repo
            .path()
            .join("objects")
            .join(&hex[..2])
            .join(&hex[2..])
    }
}
