mod conflict;
mod git_graph;

pub use git_graph::GitCommitGraph;
pub use pullbase_types::CommitId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
    #[error("Commit not found: {0}")]
    CommitNotFound(CommitId),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Author and committer written into helper commits.
///
/// The timestamp is fixed so that creating a helper commit for the same pair of parents
/// always yields the same object id.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HelperIdentity {
    pub name: String,
    pub email: String,
    /// Seconds since the unix epoch, UTC.
    pub time: i64,
}

impl Default for HelperIdentity {
    fn default() -> Self {
        Self {
            name: "pullbase".to_string(),
            email: "pullbase@localhost".to_string(),
            time: 0,
        }
    }
}

/// Read-only view of a repository's commit DAG, plus creation of unreferenced helper commits.
pub trait CommitGraph {
    /// Whether the object store still holds `commit`.
    fn exists(&self, commit: CommitId) -> Result<bool>;

    /// Best common ancestor of `a` and `b`, or `None` when the histories are disjoint.
    fn merge_base(&self, a: CommitId, b: CommitId) -> Result<Option<CommitId>>;

    /// Parents of `commit` in stored order.
    fn parents(&self, commit: CommitId) -> Result<Vec<CommitId>>;

    /// Full commit message.
    fn message(&self, commit: CommitId) -> Result<String>;

    /// True when `ancestor` is reachable from `descendant` (a commit is its own ancestor).
    fn is_ancestor(&self, ancestor: CommitId, descendant: CommitId) -> Result<bool>;

    /// Create a merge commit of `first` and `second` (parents in that order) that changes no
    /// content of its own. No ref is updated.
    fn create_synthetic_merge(
        &self,
        first: CommitId,
        second: CommitId,
        identity: &HelperIdentity,
        message: &str,
    ) -> Result<CommitId>;
}

/// Writes named refs in the target repository.
pub trait RefWriter {
    fn write_ref(&self, name: &str, target: CommitId, log_message: &str) -> Result<()>;

    /// Deleting a ref that does not exist is not an error.
    fn delete_ref(&self, name: &str) -> Result<()>;
}
