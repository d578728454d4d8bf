use std::path::Path;

use crate::{Error, Result};
use git2::{Index, Oid, Repository};

/// Resolve every conflict in `index` by taking the first side ("ours") and write the tree.
pub(crate) fn resolve_conflict_prefer_ours(repo: &Repository, index: &mut Index) -> Result<Oid> {
    let mut resolutions = Vec::new();

    for conflict in index.conflicts()? {
        let c = conflict?;
        let path = c
            .our
            .as_ref()
            .or(c.ancestor.as_ref())
            .or(c.their.as_ref())
            .map(|e| e.path.clone())
            .ok_or_else(|| Error::Internal("conflict entry without any stage".to_string()))?;
        resolutions.push((path, c.our));
    }

    for (path_bytes, our_entry) in resolutions {
        let path = std::str::from_utf8(&path_bytes)
            .map(Path::new)
            .map_err(|e| Error::Internal(format!("non utf-8 path in conflict: {}", e)))?;

        index.conflict_remove(path)?;
        match our_entry {
            Some(mut entry) => {
                entry.flags = 0;
                index.add(&entry)?;
            }
            // our side deleted the file
            None => index.remove_path(path)?,
        }
    }

    Ok(index.write_tree_to(repo)?)
}

#[cfg(test)]
mod tests {
    use test_repo::TestRepo;

    use super::*;

    type Result = std::result::Result<(), Box<dyn std::error::Error>>;

    fn blob_text(repo: &TestRepo, tree_oid: Oid, name: &str) -> Option<String> {
        let tree = repo.repo.find_tree(tree_oid).ok()?;
        let entry = tree.get_name(name)?;
        let blob = repo.repo.find_blob(entry.id()).ok()?;
        Some(String::from_utf8_lossy(blob.content()).into_owned())
    }

    #[test]
    fn keeps_our_content_on_edit_edit_conflict() -> Result {
        //   O (file=base)
        //  / \
        // A   B    A: file=ours, B: file=theirs
        let repo = TestRepo::new()?;
        let o = repo.commit(&[], &[("file", "base")], "o")?;
        let a = repo.commit(&[o], &[("file", "ours")], "a")?;
        let b = repo.commit(&[o], &[("file", "theirs")], "b")?;

        let tree = |c: pullbase_types::CommitId| repo.repo.find_commit(c.oid())?.tree();
        let mut index = repo.repo.merge_trees(&tree(o)?, &tree(a)?, &tree(b)?, None)?;
        assert!(index.has_conflicts());

        let resolved = resolve_conflict_prefer_ours(&repo.repo, &mut index)?;
        assert_eq!(blob_text(&repo, resolved, "file").as_deref(), Some("ours"));
        Ok(())
    }

    #[test]
    fn drops_file_when_ours_deleted_it() -> Result {
        let repo = TestRepo::new()?;
        let o = repo.commit(&[], &[("file", "base"), ("keep", "k")], "o")?;

        let o_tree = repo.repo.find_commit(o.oid())?.tree()?;
        let mut builder = repo.repo.treebuilder(Some(&o_tree))?;
        builder.remove("file")?;
        let ours_tree = repo.repo.find_tree(builder.write()?)?;

        let b = repo.commit(&[o], &[("file", "theirs")], "b")?;
        let theirs_tree = repo.repo.find_commit(b.oid())?.tree()?;

        let mut index = repo
            .repo
            .merge_trees(&o_tree, &ours_tree, &theirs_tree, None)?;
        assert!(index.has_conflicts());

        let resolved = resolve_conflict_prefer_ours(&repo.repo, &mut index)?;
        assert_eq!(blob_text(&repo, resolved, "file"), None);
        assert_eq!(blob_text(&repo, resolved, "keep").as_deref(), Some("k"));
        Ok(())
    }
}
