//! # Label Reconciler
//!
//! Decides and applies exactly one action per (change, target) pair:
//!
//! | change | target state | outcome |
//! |---|---|---|
//! | created | has `name` | skipped-conflict |
//! | created | lacks `name` | create |
//! | content edit | has `name` | edit in place |
//! | content edit | lacks `name` | create |
//! | rename | has new name | skipped-conflict (manual intervention) |
//! | rename | lacks new name, has old name | rename and edit |
//! | rename | lacks both names | create under the new name |
//! | deleted | any | skipped-noop |
//!
//! Existence reads only pick the branch. The single write that follows is the
//! authority: a `Conflict` on a created-triggered create or on a rename is
//! reported as skipped-conflict, every other write failure is surfaced.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::directory::{LabelDirectory, LabelError};
use crate::event::LabelChange;
use crate::models::{Label, Outcome, RepoRef};

/// The one mutating call a reconciliation may issue.
#[derive(Debug, Clone, Copy)]
enum Mutation<'a> {
    Create(&'a Label),
    Edit(&'a Label),
    Rename { old_name: &'a str, label: &'a Label },
}

impl Mutation<'_> {
    fn outcome(self) -> Outcome {
        match self {
            Self::Create(_) => Outcome::Created,
            Self::Edit(_) => Outcome::Edited,
            Self::Rename { .. } => Outcome::RenamedAndEdited,
        }
    }
}

/// Applies label changes to target repositories.
pub struct Reconciler<D> {
    directory: Arc<D>,
    dry_run: bool,
}

impl<D: LabelDirectory> Reconciler<D> {
    #[must_use]
    pub fn new(directory: Arc<D>) -> Self {
        Self {
            directory,
            dry_run: false,
        }
    }

    /// Decide outcomes and log intended writes without issuing them.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Reconcile one change against one target repository.
    #[instrument(skip(self, change), fields(repo = %repo, action = change.kind(), label = %change.label().name))]
    pub async fn reconcile(
        &self,
        repo: &RepoRef,
        change: &LabelChange,
    ) -> Result<Outcome, LabelError> {
        let outcome = match change {
            LabelChange::Deleted(_) => {
                info!("Deletions are not propagated; target left unchanged");
                Outcome::SkippedNoop
            }
            LabelChange::Created(label) => self.create_if_absent(repo, label).await?,
            LabelChange::ContentEdit(label) => self.edit_or_create(repo, label).await?,
            LabelChange::RenameEdit { old_name, label } => {
                self.rename_or_create(repo, old_name, label).await?
            }
        };

        info!(outcome = %outcome, "Reconciled");
        Ok(outcome)
    }

    async fn create_if_absent(&self, repo: &RepoRef, label: &Label) -> Result<Outcome, LabelError> {
        if self.directory.exists(repo, &label.name).await? {
            warn!("Label already exists in target, skipping create");
            return Ok(Outcome::SkippedConflict);
        }

        match self.apply(repo, Mutation::Create(label)).await {
            Err(LabelError::Conflict { .. }) => {
                warn!("Label appeared in target before create, skipping");
                Ok(Outcome::SkippedConflict)
            }
            result => result,
        }
    }

    async fn edit_or_create(&self, repo: &RepoRef, label: &Label) -> Result<Outcome, LabelError> {
        if self.directory.exists(repo, &label.name).await? {
            self.apply(repo, Mutation::Edit(label)).await
        } else {
            info!("Target never had this label, creating it");
            self.create_missing(repo, label).await
        }
    }

    async fn rename_or_create(
        &self,
        repo: &RepoRef,
        old_name: &str,
        label: &Label,
    ) -> Result<Outcome, LabelError> {
        if self.directory.exists(repo, &label.name).await? {
            warn!(
                old_name,
                "New label name already taken in target; not renaming or editing, manual intervention required"
            );
            return Ok(Outcome::SkippedConflict);
        }

        if !self.directory.exists(repo, old_name).await? {
            warn!(
                old_name,
                "Previous label name absent in target, creating under the new name"
            );
            return self.create_missing(repo, label).await;
        }

        match self.apply(repo, Mutation::Rename { old_name, label }).await {
            Err(LabelError::Conflict { .. }) => {
                warn!(
                    old_name,
                    "New label name appeared in target before rename; manual intervention required"
                );
                Ok(Outcome::SkippedConflict)
            }
            result => result,
        }
    }

    /// Create a label the exact-name lookup did not find. Name lookups are
    /// case-sensitive but the backend's uniqueness check is not, so a
    /// `Conflict` here usually means the target holds a case variant.
    async fn create_missing(&self, repo: &RepoRef, label: &Label) -> Result<Outcome, LabelError> {
        let result = self.apply(repo, Mutation::Create(label)).await;
        if matches!(result, Err(LabelError::Conflict { .. })) {
            warn!(
                "Create rejected as a conflict although no label with this exact name exists; \
                 the target likely has a case variant of it that must be renamed or removed by hand"
            );
        }
        result
    }

    /// Issue the single write for this reconciliation (or log it in dry-run mode).
    async fn apply(&self, repo: &RepoRef, mutation: Mutation<'_>) -> Result<Outcome, LabelError> {
        if self.dry_run {
            info!(mutation = ?mutation, "Dry run, skipping write");
            return Ok(mutation.outcome());
        }

        match mutation {
            Mutation::Create(label) => self.directory.create(repo, label).await?,
            Mutation::Edit(label) => self.directory.edit(repo, label).await?,
            Mutation::Rename { old_name, label } => {
                self.directory.rename_and_edit(repo, old_name, label).await?;
            }
        }

        Ok(mutation.outcome())
    }
}
