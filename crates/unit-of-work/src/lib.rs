mod context;
mod transaction;

pub use context::{ActingContext, ContextGuard};
pub use transaction::{BoxError, Session, SessionFactory, Transaction};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to open session: {0}")]
    Open(#[source] BoxError),
    #[error("Failed to commit transaction: {0}")]
    Commit(#[source] BoxError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
