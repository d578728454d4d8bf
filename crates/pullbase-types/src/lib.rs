mod commit_id;
mod request_uuid;

pub use commit_id::{CommitId, InvalidCommitIdError};
pub use request_uuid::{InvalidRequestUuidError, RequestUuid};
