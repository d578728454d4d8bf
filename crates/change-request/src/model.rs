use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pullbase_types::CommitId;

/// An account that can submit, comment on, or close change requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
}

impl User {
    /// Id of the built-in actor that performs automated changes.
    pub const SYSTEM_ID: i64 = -1;

    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn system() -> Self {
        Self::new(Self::SYSTEM_ID, "System")
    }

    pub fn is_system(&self) -> bool {
        self.id == Self::SYSTEM_ID
    }
}

/// A branch in a specific repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoBranch {
    pub repository: String,
    pub branch: String,
}

impl RepoBranch {
    pub fn new(repository: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
        }
    }

    pub fn ref_name(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }
}

/// One recorded push to the source branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    id: u64,
    target_head: CommitId,
    head_commit: CommitId,
    commits: Vec<CommitId>,
    date: DateTime<Utc>,
}

impl Update {
    pub fn new(
        id: u64,
        target_head: CommitId,
        head_commit: CommitId,
        commits: Vec<CommitId>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            target_head,
            head_commit,
            commits,
            date,
        }
    }

    /// Creation sequence; updates are ordered by this, never by date.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Tip of the target branch when the push was recorded.
    pub fn target_head(&self) -> CommitId {
        self.target_head
    }

    /// Tip of the source branch after the push.
    pub fn head_commit(&self) -> CommitId {
        self.head_commit
    }

    /// Commits introduced by this push.
    pub fn commits(&self) -> &[CommitId] {
        &self.commits
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn contains(&self, commit: CommitId) -> bool {
        self.commits.contains(&commit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseStatus {
    Merged,
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseInfo {
    pub status: CloseStatus,
    pub user: Option<User>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum CloseState {
    #[default]
    Open,
    Closed(CloseInfo),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStrategy {
    #[default]
    CreateMergeCommit,
    CreateMergeCommitIfNecessary,
    SquashSourceBranchCommits,
    RebaseSourceBranchCommits,
}

/// Result of the last attempt to merge the request head into the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePreview {
    pub target_head: CommitId,
    pub head_commit: CommitId,
    pub merge_strategy: MergeStrategy,
    /// `None` when the preview ran into conflicts.
    pub merge_commit: Option<CommitId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewResult {
    Approved,
    RequestedForChanges,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: Option<u64>,
    pub user: User,
    /// `None` while the review is still pending.
    pub result: Option<ReviewResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    Waiting,
    Pending,
    Running,
    Successful,
    Failed,
    Cancelled,
    TimedOut,
}

/// A build the request is verified by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub job_name: String,
    pub required: bool,
    pub build_status: BuildStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub user: Option<User>,
    pub content: String,
    pub date: DateTime<Utc>,
}

/// An entry in the request's activity log (title edits, target changes, approvals, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub user: Option<User>,
    pub description: String,
    pub date: DateTime<Utc>,
}
