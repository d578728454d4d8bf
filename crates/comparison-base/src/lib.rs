mod cache;
mod config;
mod origin;
mod resolver;

pub use cache::{ComparisonCache, FileComparisonCache, InMemoryComparisonCache};
pub use config::ResolverConfig;
pub use origin::ComparisonOriginResolver;
pub use pullbase_types::{CommitId, RequestUuid};
pub use resolver::ComparisonBaseResolver;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Commit graph error: {0}")]
    Graph(#[from] commit_graph::Error),
    #[error("Change request error: {0}")]
    Request(#[from] change_request::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Commit {commit} is not part of any update of change request #{number}")]
    CommitNotInUpdates { number: u64, commit: CommitId },
    #[error("No parent of commit {commit} belongs to change request #{number}")]
    OriginUnreachable { number: u64, commit: CommitId },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
