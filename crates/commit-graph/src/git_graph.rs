use git2::{Oid, Repository, Signature, Time, Tree};

use crate::{
    CommitGraph, CommitId, Error, HelperIdentity, RefWriter, Result,
    conflict::resolve_conflict_prefer_ours,
};

/// [`CommitGraph`] backed by a libgit2 repository.
pub struct GitCommitGraph<'a> {
    repo: &'a Repository,
}

impl<'a> std::fmt::Debug for GitCommitGraph<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCommitGraph")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl<'a> GitCommitGraph<'a> {
    pub fn new(repo: &'a Repository) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &'a Repository {
        self.repo
    }

    fn find_commit(&self, commit: CommitId) -> Result<git2::Commit<'a>> {
        self.repo.find_commit(commit.oid()).map_err(|err| {
            if err.code() == git2::ErrorCode::NotFound {
                Error::CommitNotFound(commit)
            } else {
                Error::Git(err)
            }
        })
    }

    fn empty_tree(&self) -> Result<Tree<'a>> {
        let oid = self.repo.treebuilder(None)?.write()?;
        Ok(self.repo.find_tree(oid)?)
    }
}

impl CommitGraph for GitCommitGraph<'_> {
    fn exists(&self, commit: CommitId) -> Result<bool> {
        Ok(self.repo.odb()?.exists(commit.oid()))
    }

    fn merge_base(&self, a: CommitId, b: CommitId) -> Result<Option<CommitId>> {
        match self.repo.merge_base(a.oid(), b.oid()) {
            Ok(oid) => Ok(Some(CommitId::from(oid))),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(Error::Git(err)),
        }
    }

    fn parents(&self, commit: CommitId) -> Result<Vec<CommitId>> {
        let commit = self.find_commit(commit)?;
        Ok(commit.parent_ids().map(CommitId::from).collect())
    }

    fn message(&self, commit: CommitId) -> Result<String> {
        let commit = self.find_commit(commit)?;
        Ok(String::from_utf8_lossy(commit.message_bytes()).into_owned())
    }

    fn is_ancestor(&self, ancestor: CommitId, descendant: CommitId) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        Ok(self
            .repo
            .graph_descendant_of(descendant.oid(), ancestor.oid())?)
    }

    fn create_synthetic_merge(
        &self,
        first: CommitId,
        second: CommitId,
        identity: &HelperIdentity,
        message: &str,
    ) -> Result<CommitId> {
        let first_commit = self.find_commit(first)?;
        let second_commit = self.find_commit(second)?;

        let ancestor_tree = match self.merge_base(first, second)? {
            Some(base) => self.find_commit(base)?.tree()?,
            None => self.empty_tree()?,
        };
        let mut index = self.repo.merge_trees(
            &ancestor_tree,
            &first_commit.tree()?,
            &second_commit.tree()?,
            None,
        )?;
        let tree_oid: Oid = if index.has_conflicts() {
            log::debug!(
                "helper merge of {} and {} has conflicts, keeping first side",
                first.short(),
                second.short()
            );
            resolve_conflict_prefer_ours(self.repo, &mut index)?
        } else {
            index.write_tree_to(self.repo)?
        };
        let tree = self.repo.find_tree(tree_oid)?;

        let signature = Signature::new(&identity.name, &identity.email, &Time::new(identity.time, 0))?;
        let oid = self.repo.commit(
            None,
            &signature,
            &signature,
            message,
            &tree,
            &[&first_commit, &second_commit],
        )?;
        log::info!(
            "created helper commit {} for {} and {}",
            oid,
            first.short(),
            second.short()
        );
        Ok(CommitId::from(oid))
    }
}

impl RefWriter for GitCommitGraph<'_> {
    fn write_ref(&self, name: &str, target: CommitId, log_message: &str) -> Result<()> {
        log::info!("Updating ref: {} -> {}", name, target.short());
        let force_update = true;
        self.repo
            .reference(name, target.oid(), force_update, log_message)?;
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> Result<()> {
        match self.repo.find_reference(name) {
            Ok(mut reference) => {
                reference.delete()?;
                log::info!("Deleted ref: {}", name);
                Ok(())
            }
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(()),
            Err(err) => Err(Error::Git(err)),
        }
    }
}
