use commit_graph::RefWriter;

use crate::{ChangeRequest, Error, Result};

pub const REFS_PREFIX: &str = "refs/pull/";

/// Refs published for a persisted request: `refs/pull/{number}/{base,head,merge}`.
impl ChangeRequest {
    pub fn base_ref(&self) -> Result<String> {
        self.pull_ref("base")
    }

    pub fn head_ref(&self) -> Result<String> {
        self.pull_ref("head")
    }

    pub fn merge_ref(&self) -> Result<String> {
        self.pull_ref("merge")
    }

    fn pull_ref(&self, kind: &str) -> Result<String> {
        if self.is_new() {
            return Err(Error::NotPersisted {
                number: self.number(),
            });
        }
        Ok(format!("{}{}/{}", REFS_PREFIX, self.number(), kind))
    }

    pub fn write_base_ref(&self, writer: &dyn RefWriter) -> Result<()> {
        let log_message = format!("pullbase: base of change request #{}", self.number());
        writer.write_ref(&self.base_ref()?, self.base_commit(), &log_message)?;
        Ok(())
    }

    pub fn write_head_ref(&self, writer: &dyn RefWriter) -> Result<()> {
        let head = self.latest_update()?.head_commit();
        let log_message = format!("pullbase: head of change request #{}", self.number());
        writer.write_ref(&self.head_ref()?, head, &log_message)?;
        Ok(())
    }

    pub fn write_merge_ref(&self, writer: &dyn RefWriter) -> Result<()> {
        let merge_commit = self
            .last_merge_preview()
            .and_then(|preview| preview.merge_commit)
            .ok_or(Error::NoMergeCommit {
                number: self.number(),
            })?;
        let log_message = format!("pullbase: merge preview of change request #{}", self.number());
        writer.write_ref(&self.merge_ref()?, merge_commit, &log_message)?;
        Ok(())
    }

    /// Remove all three refs; refs that were never written are skipped.
    pub fn delete_refs(&self, writer: &dyn RefWriter) -> Result<()> {
        for name in [self.base_ref()?, self.merge_ref()?, self.head_ref()?] {
            writer.delete_ref(&name)?;
        }
        Ok(())
    }
}
