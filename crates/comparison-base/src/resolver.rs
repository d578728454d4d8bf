use change_request::{ChangeRequest, Update};
use commit_graph::CommitGraph;

use crate::{CommitId, ComparisonCache, Error, ResolverConfig, Result};

/// Finds the commit to diff against when showing a change request between two of its
/// historical snapshots.
///
/// When `old` and the target state at `new`'s update share no dominating ancestor, a
/// helper merge of the two is created so that the diff shows only the source-side changes.
pub struct ComparisonBaseResolver<'a> {
    graph: &'a dyn CommitGraph,
    cache: &'a dyn ComparisonCache,
    config: ResolverConfig,
}

impl<'a> ComparisonBaseResolver<'a> {
    pub fn new(graph: &'a dyn CommitGraph, cache: &'a dyn ComparisonCache) -> Self {
        Self::with_config(graph, cache, ResolverConfig::default())
    }

    pub fn with_config(
        graph: &'a dyn CommitGraph,
        cache: &'a dyn ComparisonCache,
        config: ResolverConfig,
    ) -> Self {
        Self {
            graph,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Comparison base for showing `request` from snapshot `old` to snapshot `new`.
    ///
    /// `new` must be a commit introduced by one of the request's updates. `old` is not
    /// checked for containment.
    pub fn resolve_base(
        &self,
        request: &ChangeRequest,
        old: CommitId,
        new: CommitId,
    ) -> Result<CommitId> {
        if request.is_new() || old == new {
            return Ok(old);
        }

        if let Some(base) = self.cached(request, old, new)? {
            return Ok(base);
        }

        let update = containing_update(request, new)?.ok_or(Error::CommitNotInUpdates {
            number: request.number(),
            commit: new,
        })?;

        let Some(target_base) = self.graph.merge_base(update.target_head(), new)? else {
            log::debug!(
                "#{}: {} shares no history with target head {}, comparing against {}",
                request.number(),
                new.short(),
                update.target_head().short(),
                old.short()
            );
            return Ok(old);
        };

        let base = match self.graph.merge_base(target_base, old)? {
            Some(common) if common == target_base => old,
            Some(common) if common == old => target_base,
            _ => self.graph.create_synthetic_merge(
                old,
                target_base,
                &self.config.helper_identity,
                &self.config.helper_message,
            )?,
        };
        log::debug!(
            "#{}: comparison base of {}..{} is {}",
            request.number(),
            old.short(),
            new.short(),
            base.short()
        );

        if let Err(err) = self.cache.put(request.uuid(), old, new, base) {
            log::warn!(
                "#{}: failed to cache comparison base of {}..{}: {}",
                request.number(),
                old.short(),
                new.short(),
                err
            );
        }
        Ok(base)
    }

    fn cached(
        &self,
        request: &ChangeRequest,
        old: CommitId,
        new: CommitId,
    ) -> Result<Option<CommitId>> {
        let cached = match self.cache.get(request.uuid(), old, new) {
            Ok(cached) => cached,
            Err(err) => {
                log::warn!(
                    "#{}: comparison cache lookup failed, recomputing: {}",
                    request.number(),
                    err
                );
                return Ok(None);
            }
        };
        match cached {
            Some(base) if self.graph.exists(base)? => {
                log::debug!("#{}: cache hit for {}..{}", request.number(), old.short(), new.short());
                Ok(Some(base))
            }
            Some(base) => {
                log::debug!(
                    "#{}: cached base {} for {}..{} is gone, recomputing",
                    request.number(),
                    base.short(),
                    old.short(),
                    new.short()
                );
                Ok(None)
            }
            None => {
                log::debug!("#{}: cache miss for {}..{}", request.number(), old.short(), new.short());
                Ok(None)
            }
        }
    }
}

fn containing_update(request: &ChangeRequest, commit: CommitId) -> Result<Option<&Update>> {
    Ok(request
        .sorted_updates()?
        .iter()
        .find(|update| update.contains(commit)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComparisonCache, InMemoryComparisonCache};
    use change_request::RepoBranch;
    use commit_graph::{GitCommitGraph, HelperIdentity};
    use std::cell::Cell;
    use std::sync::Arc;
    use std::thread;
    use test_repo::TestRepo;

    type Result<T = ()> = std::result::Result<T, Box<dyn std::error::Error>>;

    /// Target `B`, then two pushes: `C1`, then `C2`-`C3` on top of it.
    struct Fixture {
        repo: TestRepo,
        b: CommitId,
        c1: CommitId,
        c2: CommitId,
        c3: CommitId,
        request: ChangeRequest,
    }

    fn fixture() -> Result<Fixture> {
        let repo = TestRepo::new()?;
        let b = repo.commit(&[], &[("README", "target")], "B")?;
        let c1 = repo.commit(&[b], &[("a.txt", "one")], "C1")?;
        let c2 = repo.commit(&[c1], &[("b.txt", "two")], "C2")?;
        let c3 = repo.commit(&[c2], &[("c.txt", "three")], "C3")?;

        let mut request = ChangeRequest::new(1, RepoBranch::new("project", "main"), b);
        request.add_update(b, c1, vec![c1]);
        request.add_update(b, c3, vec![c2, c3]);
        Ok(Fixture {
            repo,
            b,
            c1,
            c2,
            c3,
            request,
        })
    }

    /// Counts merge-base queries to tell cache hits from recomputation.
    struct CountingGraph<'a> {
        inner: GitCommitGraph<'a>,
        merge_bases: Cell<usize>,
    }

    impl<'a> CountingGraph<'a> {
        fn new(inner: GitCommitGraph<'a>) -> Self {
            Self {
                inner,
                merge_bases: Cell::new(0),
            }
        }
    }

    impl CommitGraph for CountingGraph<'_> {
        fn exists(&self, commit: CommitId) -> commit_graph::Result<bool> {
            self.inner.exists(commit)
        }

        fn merge_base(&self, a: CommitId, b: CommitId) -> commit_graph::Result<Option<CommitId>> {
            self.merge_bases.set(self.merge_bases.get() + 1);
            self.inner.merge_base(a, b)
        }

        fn parents(&self, commit: CommitId) -> commit_graph::Result<Vec<CommitId>> {
            self.inner.parents(commit)
        }

        fn message(&self, commit: CommitId) -> commit_graph::Result<String> {
            self.inner.message(commit)
        }

        fn is_ancestor(&self, ancestor: CommitId, descendant: CommitId) -> commit_graph::Result<bool> {
            self.inner.is_ancestor(ancestor, descendant)
        }

        fn create_synthetic_merge(
            &self,
            first: CommitId,
            second: CommitId,
            identity: &HelperIdentity,
            message: &str,
        ) -> commit_graph::Result<CommitId> {
            self.inner
                .create_synthetic_merge(first, second, identity, message)
        }
    }

    #[test]
    fn same_snapshot_is_its_own_base() -> Result {
        let f = fixture()?;
        let graph = GitCommitGraph::new(&f.repo.repo);
        let cache = InMemoryComparisonCache::new();
        let resolver = ComparisonBaseResolver::new(&graph, &cache);

        assert_eq!(resolver.resolve_base(&f.request, f.c3, f.c3)?, f.c3);
        assert!(cache.is_empty());
        Ok(())
    }

    #[test]
    fn new_request_returns_old() -> Result {
        let f = fixture()?;
        let graph = GitCommitGraph::new(&f.repo.repo);
        let cache = InMemoryComparisonCache::new();
        let resolver = ComparisonBaseResolver::new(&graph, &cache);
        let request = ChangeRequest::new(2, RepoBranch::new("project", "main"), f.b);

        assert_eq!(resolver.resolve_base(&request, f.c1, f.c3)?, f.c1);
        assert!(cache.is_empty());
        Ok(())
    }

    #[test]
    fn new_commit_outside_updates_is_an_error() -> Result {
        let f = fixture()?;
        let stray = f.repo.commit(&[f.b], &[("stray", "x")], "stray")?;
        let graph = GitCommitGraph::new(&f.repo.repo);
        let cache = InMemoryComparisonCache::new();
        let resolver = ComparisonBaseResolver::new(&graph, &cache);

        let err = resolver
            .resolve_base(&f.request, f.c1, stray)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::CommitNotInUpdates { number: 1, commit } if commit == stray
        ));
        Ok(())
    }

    #[test]
    fn end_to_end_linear_pushes() -> Result {
        let f = fixture()?;
        let graph = GitCommitGraph::new(&f.repo.repo);
        let cache = InMemoryComparisonCache::new();
        let resolver = ComparisonBaseResolver::new(&graph, &cache);

        // the target never moved: the older snapshot is the base
        assert_eq!(resolver.resolve_base(&f.request, f.c1, f.c3)?, f.c1);
        assert_eq!(resolver.resolve_base(&f.request, f.c1, f.c2)?, f.c1);
        assert_eq!(resolver.resolve_base(&f.request, f.b, f.c3)?, f.b);
        assert_eq!(cache.len(), 3);
        Ok(())
    }

    #[test]
    fn old_behind_target_resolves_to_target_base() -> Result {
        let mut f = fixture()?;
        let t1 = f.repo.commit(&[f.b], &[("target.txt", "t1")], "T1")?;
        let merged = f.repo.commit(&[f.c3, t1], &[], "merge target")?;
        f.request.add_update(t1, merged, vec![merged]);

        let graph = GitCommitGraph::new(&f.repo.repo);
        let cache = InMemoryComparisonCache::new();
        let resolver = ComparisonBaseResolver::new(&graph, &cache);

        assert_eq!(resolver.resolve_base(&f.request, f.b, merged)?, t1);
        Ok(())
    }

    #[test]
    fn rebased_push_gets_helper_commit() -> Result {
        let mut f = fixture()?;
        let t1 = f.repo.commit(&[f.b], &[("target.txt", "t1")], "T1")?;
        let rebased = f.repo.commit(&[t1], &[("a.txt", "one")], "C1 rebased")?;
        f.request.add_update(t1, rebased, vec![rebased]);

        let graph = GitCommitGraph::new(&f.repo.repo);
        let cache = InMemoryComparisonCache::new();
        let resolver = ComparisonBaseResolver::new(&graph, &cache);

        let base = resolver.resolve_base(&f.request, f.c1, rebased)?;
        assert_ne!(base, f.c1);
        assert_ne!(base, t1);
        assert_eq!(graph.parents(base)?, vec![f.c1, t1]);
        assert_eq!(graph.message(base)?, "helper commit");
        assert_eq!(
            cache.get(f.request.uuid(), f.c1, rebased)?,
            Some(base)
        );

        // recomputing from scratch yields the same helper commit
        let fresh_cache = InMemoryComparisonCache::new();
        let fresh = ComparisonBaseResolver::new(&graph, &fresh_cache);
        assert_eq!(fresh.resolve_base(&f.request, f.c1, rebased)?, base);
        Ok(())
    }

    #[test]
    fn helper_commit_uses_configured_identity() -> Result {
        let mut f = fixture()?;
        let t1 = f.repo.commit(&[f.b], &[("target.txt", "t1")], "T1")?;
        let rebased = f.repo.commit(&[t1], &[("a.txt", "one")], "C1 rebased")?;
        f.request.add_update(t1, rebased, vec![rebased]);

        let graph = GitCommitGraph::new(&f.repo.repo);
        let cache = InMemoryComparisonCache::new();
        let config = ResolverConfig {
            helper_identity: HelperIdentity {
                name: "reviewer".to_string(),
                email: "reviewer@example.com".to_string(),
                time: 1_700_000_000,
            },
            helper_message: "comparison base".to_string(),
            ..ResolverConfig::default()
        };
        let resolver = ComparisonBaseResolver::with_config(&graph, &cache, config);

        let base = resolver.resolve_base(&f.request, f.c1, rebased)?;
        let commit = f.repo.repo.find_commit(base.oid())?;
        assert_eq!(commit.author().name(), Some("reviewer"));
        assert_eq!(commit.committer().when().seconds(), 1_700_000_000);
        assert_eq!(commit.message(), Some("comparison base"));
        Ok(())
    }

    #[test]
    fn disjoint_history_falls_back_to_old_without_caching() -> Result {
        let mut f = fixture()?;
        let orphan = f.repo.commit(&[], &[("orphan", "x")], "orphan")?;
        f.request.add_update(f.b, orphan, vec![orphan]);

        let graph = GitCommitGraph::new(&f.repo.repo);
        let cache = InMemoryComparisonCache::new();
        let resolver = ComparisonBaseResolver::new(&graph, &cache);

        assert_eq!(resolver.resolve_base(&f.request, f.c1, orphan)?, f.c1);
        assert!(cache.is_empty());
        Ok(())
    }

    #[test]
    fn second_resolution_is_served_from_cache() -> Result {
        let f = fixture()?;
        let graph = CountingGraph::new(GitCommitGraph::new(&f.repo.repo));
        let cache = InMemoryComparisonCache::new();
        let resolver = ComparisonBaseResolver::new(&graph, &cache);

        let first = resolver.resolve_base(&f.request, f.c1, f.c3)?;
        let queries = graph.merge_bases.get();
        assert_eq!(queries, 2);

        let second = resolver.resolve_base(&f.request, f.c1, f.c3)?;
        assert_eq!(first, second);
        assert_eq!(graph.merge_bases.get(), queries);
        Ok(())
    }

    #[test]
    fn cached_commit_missing_from_store_is_recomputed() -> Result {
        let f = fixture()?;
        let bogus: CommitId = "ab".repeat(20).parse()?;
        let cache = InMemoryComparisonCache::new();
        cache.put(f.request.uuid(), f.c1, f.c3, bogus)?;

        let graph = GitCommitGraph::new(&f.repo.repo);
        let resolver = ComparisonBaseResolver::new(&graph, &cache);

        assert_eq!(resolver.resolve_base(&f.request, f.c1, f.c3)?, f.c1);
        assert_eq!(cache.get(f.request.uuid(), f.c1, f.c3)?, Some(f.c1));
        Ok(())
    }

    #[test]
    fn pruned_helper_commit_is_recreated() -> Result {
        let mut f = fixture()?;
        let t1 = f.repo.commit(&[f.b], &[("target.txt", "t1")], "T1")?;
        let rebased = f.repo.commit(&[t1], &[("a.txt", "one")], "C1 rebased")?;
        f.request.add_update(t1, rebased, vec![rebased]);
        let cache = InMemoryComparisonCache::new();

        let helper = {
            let graph = GitCommitGraph::new(&f.repo.repo);
            ComparisonBaseResolver::new(&graph, &cache).resolve_base(&f.request, f.c1, rebased)?
        };
        f.repo.remove_object(helper)?;

        let reopened = f.repo.reopen()?;
        let graph = GitCommitGraph::new(&reopened);
        assert!(!graph.exists(helper)?);

        let resolver = ComparisonBaseResolver::new(&graph, &cache);
        assert_eq!(resolver.resolve_base(&f.request, f.c1, rebased)?, helper);
        assert!(graph.exists(helper)?);
        Ok(())
    }

    #[test]
    fn resolves_from_file_cache_after_restart() -> Result {
        let f = fixture()?;
        let config = ResolverConfig::default();
        let graph = CountingGraph::new(GitCommitGraph::new(&f.repo.repo));

        let cache = crate::FileComparisonCache::for_repository(&f.repo.repo, &config);
        let resolver = ComparisonBaseResolver::with_config(&graph, &cache, config.clone());
        assert_eq!(resolver.resolve_base(&f.request, f.c1, f.c3)?, f.c1);
        let queries = graph.merge_bases.get();

        let restarted = crate::FileComparisonCache::for_repository(&f.repo.repo, &config);
        let resolver = ComparisonBaseResolver::with_config(&graph, &restarted, config);
        assert_eq!(resolver.resolve_base(&f.request, f.c1, f.c3)?, f.c1);
        assert_eq!(graph.merge_bases.get(), queries);
        Ok(())
    }

    #[test]
    fn concurrent_resolutions_agree() -> Result {
        let mut f = fixture()?;
        let t1 = f.repo.commit(&[f.b], &[("target.txt", "t1")], "T1")?;
        let rebased = f.repo.commit(&[t1], &[("a.txt", "one")], "C1 rebased")?;
        f.request.add_update(t1, rebased, vec![rebased]);

        let cache = Arc::new(InMemoryComparisonCache::new());
        let mut handles = vec![];
        for _ in 0..8 {
            let repo = f.repo.reopen()?;
            let cache = Arc::clone(&cache);
            let request = f.request.clone();
            let (old, new) = (f.c1, rebased);
            handles.push(thread::spawn(move || {
                let graph = GitCommitGraph::new(&repo);
                let resolver = ComparisonBaseResolver::new(&graph, cache.as_ref());
                resolver.resolve_base(&request, old, new).unwrap()
            }));
        }

        let bases = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>();
        assert!(bases.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(cache.get(f.request.uuid(), f.c1, rebased)?, Some(bases[0]));
        Ok(())
    }
}
