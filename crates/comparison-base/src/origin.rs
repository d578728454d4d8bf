use change_request::ChangeRequest;
use commit_graph::CommitGraph;

use crate::{CommitId, Error, Result};

/// Maps a commit shown to the user back onto the request's own history.
///
/// Helper commits created by [`crate::ComparisonBaseResolver`] are not part of any update;
/// their origin is the first parent that is.
pub struct ComparisonOriginResolver<'a> {
    graph: &'a dyn CommitGraph,
}

impl<'a> ComparisonOriginResolver<'a> {
    pub fn new(graph: &'a dyn CommitGraph) -> Self {
        Self { graph }
    }

    pub fn resolve_origin(&self, request: &ChangeRequest, candidate: CommitId) -> Result<CommitId> {
        if request.contains(candidate) {
            return Ok(candidate);
        }
        for parent in self.graph.parents(candidate)? {
            if request.contains(parent) {
                log::debug!(
                    "#{}: origin of {} is its parent {}",
                    request.number(),
                    candidate.short(),
                    parent.short()
                );
                return Ok(parent);
            }
        }
        Err(Error::OriginUnreachable {
            number: request.number(),
            commit: candidate,
        })
    }
}
