mod change_request;
mod comparing;
mod issue_refs;
pub(crate) mod model;
mod refs;

pub use change_request::ChangeRequest;
pub use comparing::ComparingInfo;
pub use issue_refs::parse_fixed_issue_numbers;
pub use model::{
    BuildStatus, Change, CloseInfo, CloseState, CloseStatus, Comment, MergePreview,
    MergeStrategy, RepoBranch, Review, ReviewResult, Update, User, Verification,
};
pub use pullbase_types::{CommitId, RequestUuid};
pub use refs::REFS_PREFIX;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Commit graph error: {0}")]
    Graph(#[from] commit_graph::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Change request #{number} has no updates")]
    NoUpdates { number: u64 },
    #[error("Change request #{number} is not persisted yet")]
    NotPersisted { number: u64 },
    #[error("Change request #{number} has no merge preview commit")]
    NoMergeCommit { number: u64 },
    #[error("Invalid action: {message}")]
    InvalidAction { message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
