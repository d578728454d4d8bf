use crate::{ChangeRequest, CommitId};

/// Old and new side to display when showing a commit in the context of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparingInfo {
    pub old_commit: CommitId,
    pub new_commit: CommitId,
}

impl ChangeRequest {
    /// Pick the comparison for `commit` given the commit the viewer compared against.
    ///
    /// Positions are taken along `[base, commits of each update in creation order]`.
    /// Without a usable `compare_commit` the commit is shown against the base when it is
    /// the latest commit, otherwise against the latest commit. Returns `None` when
    /// `commit` is not part of the request or the request has no updates.
    pub fn comparing_info(
        &self,
        commit: CommitId,
        compare_commit: Option<CommitId>,
    ) -> Option<ComparingInfo> {
        let history = self.flattened_history().ok()?;
        let index = history.iter().position(|c| *c == commit)?;
        let compare_index =
            compare_commit.and_then(|compare| history.iter().position(|c| *c == compare));
        let last = history.len() - 1;

        let (old_commit, new_commit) = match compare_index {
            Some(ci) if ci < index => (history[ci], commit),
            Some(ci) if ci > index => (commit, history[ci]),
            _ if index == last => (history[0], commit),
            _ => (commit, history[last]),
        };
        Some(ComparingInfo {
            old_commit,
            new_commit,
        })
    }

    fn flattened_history(&self) -> crate::Result<Vec<CommitId>> {
        let mut history = vec![self.base_commit()];
        for update in self.sorted_updates()? {
            history.extend_from_slice(update.commits());
        }
        Ok(history)
    }
}
