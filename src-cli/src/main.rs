mod store;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use change_request::{ChangeRequest, CloseStatus, CommitId, User};
use clap::{Parser, Subcommand, ValueEnum};
use commit_graph::{CommitGraph, GitCommitGraph};
use comparison_base::{
    ComparisonBaseResolver, ComparisonCache, ComparisonOriginResolver, FileComparisonCache,
    ResolverConfig,
};
use git2::Repository;
use log::LevelFilter;
use unit_of_work::{ActingContext, Transaction};

use crate::store::JsonStore;

#[derive(Parser)]
#[command(
    name = "pbase",
    about = "Comparison bases and refs of change requests stored as JSON"
)]
struct Cli {
    /// Path to the repository directory
    #[arg(short, long, default_value = ".")]
    repo: PathBuf,

    /// Change request JSON file
    #[arg(long)]
    request: PathBuf,

    /// Resolver settings (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the comparison base for showing the request from OLD to NEW
    Base { old: String, new: String },
    /// Map a displayed commit back onto the request's history
    Origin { commit: String },
    /// Print the old/new pair to show for a commit
    Comparing {
        commit: String,
        #[arg(long)]
        compare: Option<String>,
    },
    /// Summary of the request as JSON
    Show,
    /// Check that every commit the request pins still exists
    Validate,
    /// Publish or remove refs/pull/{number}/*
    Refs {
        #[command(subcommand)]
        action: RefsAction,
    },
    /// Close the request; discarded requests also lose their refs
    Close {
        #[arg(long, value_enum)]
        status: CloseArg,
        /// Id of the acting user (defaults to the system user)
        #[arg(long, requires = "user_name")]
        user_id: Option<i64>,
        #[arg(long, requires = "user_id")]
        user_name: Option<String>,
    },
    /// Drop the cached comparison bases of the request
    ClearCache,
}

#[derive(Subcommand)]
enum RefsAction {
    /// Write base and head refs, plus the merge ref when a merge preview exists
    Write,
    Delete,
}

#[derive(Clone, Copy, ValueEnum)]
enum CloseArg {
    Merged,
    Discarded,
}

impl From<CloseArg> for CloseStatus {
    fn from(arg: CloseArg) -> Self {
        match arg {
            CloseArg::Merged => CloseStatus::Merged,
            CloseArg::Discarded => CloseStatus::Discarded,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ResolverConfig> {
    let Some(path) = path else {
        return Ok(ResolverConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

/// Accepts anything `git rev-parse` does: full or abbreviated ids, ref names, `HEAD~2`.
fn resolve_commit(repo: &Repository, spec: &str) -> Result<CommitId> {
    let commit = repo
        .revparse_single(spec)
        .and_then(|object| object.peel_to_commit())
        .with_context(|| format!("no commit matches '{}'", spec))?;
    Ok(CommitId::from(commit.id()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let repo = Repository::open(&cli.repo)
        .with_context(|| format!("failed to open repository {}", cli.repo.display()))?;
    let store = JsonStore::new(&cli.request);
    let request = store
        .load()
        .map_err(|err| anyhow!(err))
        .with_context(|| format!("failed to load change request {}", cli.request.display()))?;
    log::info!("loaded {} from {}", request.number_and_title(), store.path().display());

    let graph = GitCommitGraph::new(&repo);
    match cli.command {
        Command::Base { old, new } => {
            let old = resolve_commit(&repo, &old)?;
            let new = resolve_commit(&repo, &new)?;
            let cache = FileComparisonCache::for_repository(&repo, &config);
            let resolver = ComparisonBaseResolver::with_config(&graph, &cache, config);
            println!("{}", resolver.resolve_base(&request, old, new)?);
        }
        Command::Origin { commit } => {
            let commit = resolve_commit(&repo, &commit)?;
            let resolver = ComparisonOriginResolver::new(&graph);
            println!("{}", resolver.resolve_origin(&request, commit)?);
        }
        Command::Comparing { commit, compare } => {
            let commit = resolve_commit(&repo, &commit)?;
            let compare = compare
                .map(|compare| resolve_commit(&repo, &compare))
                .transpose()?;
            let info = request.comparing_info(commit, compare).ok_or_else(|| {
                anyhow!(
                    "{} is not part of {}",
                    commit.short(),
                    request.number_and_title()
                )
            })?;
            println!("{} {}", info.old_commit, info.new_commit);
        }
        Command::Show => show(&repo, &graph, &request)?,
        Command::Validate => {
            if !request.is_valid(&graph)? {
                anyhow::bail!("{} references missing commits", request.number_and_title());
            }
            println!("ok");
        }
        Command::Refs { action } => match action {
            RefsAction::Write => {
                request.write_base_ref(&graph)?;
                request.write_head_ref(&graph)?;
                if request
                    .last_merge_preview()
                    .is_some_and(|preview| preview.merge_commit.is_some())
                {
                    request.write_merge_ref(&graph)?;
                }
            }
            RefsAction::Delete => request.delete_refs(&graph)?,
        },
        Command::Close {
            status,
            user_id,
            user_name,
        } => {
            let actor = match (user_id, user_name) {
                (Some(id), Some(name)) => User::new(id, name),
                _ => User::system(),
            };
            let _acting = ActingContext::push(actor);
            close(&cli.repo, &store, config, status.into())?;
        }
        Command::ClearCache => {
            FileComparisonCache::for_repository(&repo, &config).invalidate(request.uuid())?;
        }
    }
    Ok(())
}

fn show(repo: &Repository, graph: &dyn CommitGraph, request: &ChangeRequest) -> Result<()> {
    let summary = summary(repo, graph, request)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Current tip of the request's target branch, if the branch exists locally.
fn target_tip(repo: &Repository, request: &ChangeRequest) -> Option<CommitId> {
    repo.refname_to_id(&request.target().ref_name())
        .ok()
        .map(CommitId::from)
}

fn summary(
    repo: &Repository,
    graph: &dyn CommitGraph,
    request: &ChangeRequest,
) -> Result<serde_json::Value> {
    let merged_into_target = match target_tip(repo, request) {
        Some(tip) if !request.is_new() => Some(request.is_merged_into_target(graph, tip)?),
        _ => None,
    };
    let latest_head = request
        .latest_update()
        .ok()
        .map(|update| update.head_commit().to_string());
    Ok(serde_json::json!({
        "number": request.number(),
        "uuid": request.uuid().to_string(),
        "title": request.number_and_title(),
        "close": request.close_state(),
        "updates": request.updates().len(),
        "latest_head": latest_head,
        "valid": request.is_valid(graph)?,
        "merged_into_target": merged_into_target,
        "fixed_issues": request.fixed_issue_numbers(graph)?,
        "participants": request.participants(),
        "all_reviews_approved": request.is_all_reviews_approved(),
        "required_builds_successful": request.is_required_builds_successful(),
    }))
}

/// Close the request in its JSON file. Once saved, drop its cached comparison bases and,
/// for discarded requests, its refs.
fn close(
    repo_path: &Path,
    store: &JsonStore,
    config: ResolverConfig,
    status: CloseStatus,
) -> Result<()> {
    let actor = ActingContext::current::<User>().unwrap_or_else(User::system);
    let mut tx = Transaction::begin(store)?;
    tx.session()
        .request_mut()
        .close(status, Some(actor.clone()), chrono::Utc::now())?;

    let repo_path = repo_path.to_path_buf();
    tx.run_after_commit_as(actor, move |session| {
        let request = session.request();
        let repo = Repository::open(&repo_path)?;
        if request.is_discarded() {
            request.delete_refs(&GitCommitGraph::new(&repo))?;
        }
        FileComparisonCache::for_repository(&repo, &config).invalidate(request.uuid())?;
        Ok(())
    });
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use change_request::RepoBranch;
    use test_repo::TestRepo;

    type Result<T = ()> = std::result::Result<T, Box<dyn std::error::Error>>;

    #[test]
    fn summary_reads_target_branch_tip() -> Result {
        let repo = TestRepo::new()?;
        let base = repo.commit(&[], &[("a", "a")], "base")?;
        let head = repo.commit(&[base], &[("b", "b")], "Fixes #3")?;
        let graph = GitCommitGraph::new(&repo.repo);
        let mut request = ChangeRequest::new(9, RepoBranch::new("r", "main"), base);
        request.add_update(base, head, vec![head]);

        assert_eq!(target_tip(&repo.repo, &request), None);
        let shown = summary(&repo.repo, &graph, &request)?;
        assert!(shown["merged_into_target"].is_null());

        repo.set_branch("main", base)?;
        assert_eq!(target_tip(&repo.repo, &request), Some(base));
        let shown = summary(&repo.repo, &graph, &request)?;
        assert_eq!(shown["merged_into_target"], false);

        let merge = repo.commit(&[base, head], &[], "merge #9")?;
        repo.set_branch("main", merge)?;
        let shown = summary(&repo.repo, &graph, &request)?;
        assert_eq!(shown["merged_into_target"], true);
        assert_eq!(shown["fixed_issues"], serde_json::json!([3]));
        assert_eq!(shown["latest_head"], head.to_string());
        Ok(())
    }
}
