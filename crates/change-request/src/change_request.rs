use std::cell::{Cell, OnceCell};
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use commit_graph::CommitGraph;
use serde::{Deserialize, Serialize};

use crate::issue_refs::parse_fixed_issue_numbers;
use crate::model::{
    BuildStatus, Change, CloseInfo, CloseState, CloseStatus, Comment, MergePreview,
    MergeStrategy, RepoBranch, Review, ReviewResult, Update, User, Verification,
};
use crate::{CommitId, Error, RequestUuid, Result};

/// A proposal to merge `source` into `target`, tracked across every push to the source.
///
/// Derived views (sorted updates, validity, participants, ...) are memoized per instance.
/// They are never serialized and a clone starts with empty slots, so every loaded
/// representation computes its own. The slots make this type `!Sync`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChangeRequest {
    number: u64,
    uuid: RequestUuid,
    title: String,
    #[serde(skip)]
    no_space_title: OnceCell<String>,
    description: Option<String>,
    submitter: Option<User>,
    submit_date: DateTime<Utc>,
    target: RepoBranch,
    source: Option<RepoBranch>,
    base_commit: CommitId,
    #[serde(default)]
    merge_strategy: MergeStrategy,
    #[serde(default)]
    close: CloseState,
    #[serde(default)]
    updates: Vec<Update>,
    #[serde(default)]
    reviews: Vec<Review>,
    #[serde(default)]
    verifications: Vec<Verification>,
    #[serde(default)]
    comments: Vec<Comment>,
    #[serde(default)]
    changes: Vec<Change>,
    #[serde(default)]
    last_merge_preview: Option<MergePreview>,

    #[serde(skip)]
    sorted_updates: OnceCell<Vec<Update>>,
    #[serde(skip)]
    sorted_reviews: OnceCell<Vec<Review>>,
    #[serde(skip)]
    valid: OnceCell<bool>,
    /// `(target tip, merged)` of the last query; a different tip recomputes.
    #[serde(skip)]
    merged_into_target: Cell<Option<(CommitId, bool)>>,
    #[serde(skip)]
    participants: OnceCell<Vec<User>>,
    #[serde(skip)]
    fixed_issue_numbers: OnceCell<BTreeSet<u64>>,
}

impl Clone for ChangeRequest {
    fn clone(&self) -> Self {
        Self {
            number: self.number,
            uuid: self.uuid,
            title: self.title.clone(),
            no_space_title: OnceCell::new(),
            description: self.description.clone(),
            submitter: self.submitter.clone(),
            submit_date: self.submit_date,
            target: self.target.clone(),
            source: self.source.clone(),
            base_commit: self.base_commit,
            merge_strategy: self.merge_strategy,
            close: self.close.clone(),
            updates: self.updates.clone(),
            reviews: self.reviews.clone(),
            verifications: self.verifications.clone(),
            comments: self.comments.clone(),
            changes: self.changes.clone(),
            last_merge_preview: self.last_merge_preview.clone(),
            sorted_updates: OnceCell::new(),
            sorted_reviews: OnceCell::new(),
            valid: OnceCell::new(),
            merged_into_target: Cell::new(None),
            participants: OnceCell::new(),
            fixed_issue_numbers: OnceCell::new(),
        }
    }
}

impl ChangeRequest {
    /// A request that has not been opened yet: it has no updates until the first push is
    /// recorded with [`ChangeRequest::add_update`].
    pub fn new(number: u64, target: RepoBranch, base_commit: CommitId) -> Self {
        Self {
            number,
            uuid: RequestUuid::new(),
            title: String::new(),
            no_space_title: OnceCell::new(),
            description: None,
            submitter: None,
            submit_date: Utc::now(),
            target,
            source: None,
            base_commit,
            merge_strategy: MergeStrategy::default(),
            close: CloseState::Open,
            updates: Vec::new(),
            reviews: Vec::new(),
            verifications: Vec::new(),
            comments: Vec::new(),
            changes: Vec::new(),
            last_merge_preview: None,
            sorted_updates: OnceCell::new(),
            sorted_reviews: OnceCell::new(),
            valid: OnceCell::new(),
            merged_into_target: Cell::new(None),
            participants: OnceCell::new(),
            fixed_issue_numbers: OnceCell::new(),
        }
    }

    pub fn with_source(mut self, source: RepoBranch) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_submitter(mut self, submitter: User) -> Self {
        self.submitter = Some(submitter);
        self.participants = OnceCell::new();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.set_title(title);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    // ── identity & endpoints ───────────────────────────────────────────

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn uuid(&self) -> RequestUuid {
        self.uuid
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.no_space_title = OnceCell::new();
    }

    /// Title with all whitespace removed, used for fuzzy reference lookup.
    pub fn no_space_title(&self) -> &str {
        self.no_space_title.get_or_init(|| strip_whitespace(&self.title))
    }

    pub fn number_and_title(&self) -> String {
        format!("#{} - {}", self.number, self.title)
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub fn submitter(&self) -> Option<&User> {
        self.submitter.as_ref()
    }

    pub fn submit_date(&self) -> DateTime<Utc> {
        self.submit_date
    }

    pub fn target(&self) -> &RepoBranch {
        &self.target
    }

    /// `None` once the source branch or its repository has been deleted.
    pub fn source(&self) -> Option<&RepoBranch> {
        self.source.as_ref()
    }

    pub fn clear_source(&mut self) {
        self.source = None;
    }

    pub fn base_commit(&self) -> CommitId {
        self.base_commit
    }

    pub fn merge_strategy(&self) -> MergeStrategy {
        self.merge_strategy
    }

    pub fn set_merge_strategy(&mut self, merge_strategy: MergeStrategy) {
        self.merge_strategy = merge_strategy;
    }

    // ── updates & containment ──────────────────────────────────────────

    /// A request without any update has not been opened yet.
    pub fn is_new(&self) -> bool {
        self.updates.is_empty()
    }

    /// Updates in storage order. Use [`ChangeRequest::sorted_updates`] for creation order.
    pub fn updates(&self) -> &[Update] {
        &self.updates
    }

    /// Record a push. The new update gets the next creation sequence number.
    pub fn add_update(
        &mut self,
        target_head: CommitId,
        head_commit: CommitId,
        commits: Vec<CommitId>,
    ) -> &Update {
        let id = self.updates.iter().map(Update::id).max().map_or(1, |max| max + 1);
        self.push_update(Update::new(id, target_head, head_commit, commits, Utc::now()));
        &self.updates[self.updates.len() - 1]
    }

    /// Append an update loaded from storage, keeping its recorded id.
    pub fn push_update(&mut self, update: Update) {
        self.updates.push(update);
        self.invalidate_update_views();
    }

    pub fn set_updates(&mut self, updates: Vec<Update>) {
        self.updates = updates;
        self.invalidate_update_views();
    }

    fn invalidate_update_views(&mut self) {
        self.sorted_updates = OnceCell::new();
        self.fixed_issue_numbers = OnceCell::new();
        self.merged_into_target.set(None);
    }

    /// Updates ordered by creation sequence.
    pub fn sorted_updates(&self) -> Result<&[Update]> {
        if self.updates.is_empty() {
            return Err(Error::NoUpdates {
                number: self.number,
            });
        }
        let sorted = self.sorted_updates.get_or_init(|| {
            let mut sorted = self.updates.clone();
            sorted.sort_by_key(Update::id);
            sorted
        });
        Ok(sorted)
    }

    pub fn latest_update(&self) -> Result<&Update> {
        let sorted = self.sorted_updates()?;
        Ok(&sorted[sorted.len() - 1])
    }

    /// True iff `commit` is the base commit or was introduced by one of the updates.
    pub fn contains(&self, commit: CommitId) -> bool {
        commit == self.base_commit || self.updates.iter().any(|u| u.contains(commit))
    }

    pub fn can_comment_on_commit(&self, commit: CommitId) -> bool {
        self.contains(commit)
    }

    // ── lifecycle ──────────────────────────────────────────────────────

    pub fn close_state(&self) -> &CloseState {
        &self.close
    }

    pub fn close_info(&self) -> Option<&CloseInfo> {
        match &self.close {
            CloseState::Open => None,
            CloseState::Closed(info) => Some(info),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.close, CloseState::Open)
    }

    pub fn is_merged(&self) -> bool {
        self.close_info()
            .is_some_and(|info| info.status == CloseStatus::Merged)
    }

    pub fn is_discarded(&self) -> bool {
        self.close_info()
            .is_some_and(|info| info.status == CloseStatus::Discarded)
    }

    pub fn close(
        &mut self,
        status: CloseStatus,
        user: Option<User>,
        date: DateTime<Utc>,
    ) -> Result<()> {
        if let CloseState::Closed(info) = &self.close {
            return Err(Error::InvalidAction {
                message: format!(
                    "change request #{} is already closed ({:?})",
                    self.number, info.status
                ),
            });
        }
        self.close = CloseState::Closed(CloseInfo { status, user, date });
        log::info!("closed change request #{} as {:?}", self.number, status);
        Ok(())
    }

    /// Only discarded requests can be reopened; a merge is final.
    pub fn reopen(&mut self) -> Result<()> {
        match &self.close {
            CloseState::Open => Err(Error::InvalidAction {
                message: format!("change request #{} is already open", self.number),
            }),
            CloseState::Closed(info) if info.status == CloseStatus::Merged => {
                Err(Error::InvalidAction {
                    message: format!("change request #{} is merged", self.number),
                })
            }
            CloseState::Closed(_) => {
                self.close = CloseState::Open;
                Ok(())
            }
        }
    }

    // ── reviews & verifications ────────────────────────────────────────

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    pub fn add_review(&mut self, review: Review) {
        self.reviews.push(review);
        self.sorted_reviews = OnceCell::new();
    }

    /// Reviews ordered by id; reviews without an id keep their relative position at the end.
    pub fn sorted_reviews(&self) -> &[Review] {
        self.sorted_reviews.get_or_init(|| {
            let mut sorted = self.reviews.clone();
            sorted.sort_by_key(|r| (r.id.is_none(), r.id));
            sorted
        })
    }

    pub fn review_of(&self, user: &User) -> Option<&Review> {
        self.reviews.iter().find(|r| r.user == *user)
    }

    pub fn is_all_reviews_approved(&self) -> bool {
        self.reviews
            .iter()
            .all(|r| r.result == Some(ReviewResult::Approved))
    }

    pub fn verifications(&self) -> &[Verification] {
        &self.verifications
    }

    pub fn add_verification(&mut self, verification: Verification) {
        self.verifications.push(verification);
    }

    pub fn is_required_builds_successful(&self) -> bool {
        self.verifications
            .iter()
            .filter(|v| v.required)
            .all(|v| v.build_status == BuildStatus::Successful)
    }

    // ── activity ───────────────────────────────────────────────────────

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn add_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
        self.participants = OnceCell::new();
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn add_change(&mut self, change: Change) {
        self.changes.push(change);
        self.participants = OnceCell::new();
    }

    /// Submitter, comment authors and change authors in first-seen order, without the
    /// system user.
    pub fn participants(&self) -> &[User] {
        self.participants.get_or_init(|| {
            let candidates = self
                .submitter
                .iter()
                .chain(self.comments.iter().filter_map(|c| c.user.as_ref()))
                .chain(self.changes.iter().filter_map(|c| c.user.as_ref()));

            let mut participants: Vec<User> = Vec::new();
            for user in candidates {
                if !user.is_system() && !participants.contains(user) {
                    participants.push(user.clone());
                }
            }
            participants
        })
    }

    // ── merge preview ──────────────────────────────────────────────────

    /// May be stale relative to the current target and head.
    pub fn last_merge_preview(&self) -> Option<&MergePreview> {
        self.last_merge_preview.as_ref()
    }

    pub fn set_last_merge_preview(&mut self, preview: Option<MergePreview>) {
        self.last_merge_preview = preview;
    }

    // ── repository-backed views ────────────────────────────────────────

    /// Whether every commit the request pins still exists in the object store.
    ///
    /// Computed once per instance; history pruned afterwards is not noticed.
    pub fn is_valid(&self, graph: &dyn CommitGraph) -> Result<bool> {
        if let Some(valid) = self.valid.get() {
            return Ok(*valid);
        }
        let mut valid = graph.exists(self.base_commit)?;
        for update in &self.updates {
            if !valid {
                break;
            }
            valid = graph.exists(update.target_head())? && graph.exists(update.head_commit())?;
        }
        if !valid {
            log::warn!(
                "change request #{} references commits missing from the object store",
                self.number
            );
        }
        Ok(*self.valid.get_or_init(|| valid))
    }

    /// Whether the latest head is already reachable from `target_tip`.
    ///
    /// The answer is memoized for the last tip asked about; moving the target recomputes.
    pub fn is_merged_into_target(
        &self,
        graph: &dyn CommitGraph,
        target_tip: CommitId,
    ) -> Result<bool> {
        if let Some((tip, merged)) = self.merged_into_target.get() {
            if tip == target_tip {
                return Ok(merged);
            }
        }
        let head = self.latest_update()?.head_commit();
        let merged = graph.is_ancestor(head, target_tip)?;
        self.merged_into_target.set(Some((target_tip, merged)));
        Ok(merged)
    }

    /// Issue numbers closed by commit messages of all updates.
    pub fn fixed_issue_numbers(&self, graph: &dyn CommitGraph) -> Result<&BTreeSet<u64>> {
        if let Some(numbers) = self.fixed_issue_numbers.get() {
            return Ok(numbers);
        }
        let mut numbers = BTreeSet::new();
        for update in &self.updates {
            for commit in update.commits() {
                numbers.extend(parse_fixed_issue_numbers(&graph.message(*commit)?));
            }
        }
        Ok(self.fixed_issue_numbers.get_or_init(|| numbers))
    }
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}
