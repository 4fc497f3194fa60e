//! Bulk resync of every source label to every target.
//!
//! Runs all (label, target) reconciliations as one sequential unit. The first
//! failure aborts the remainder; operators re-run the whole job to retry.

use std::sync::Arc;

use tracing::{error, info};

use crate::directory::{LabelDirectory, RepositoryLister};
use crate::enumerator::RepositoryEnumerator;
use crate::error::SyncError;
use crate::event::LabelChange;
use crate::models::{OutcomeTally, RepoRef};
use crate::reconciler::Reconciler;

/// Summary of a completed resync.
#[derive(Debug, Default)]
pub struct BulkReport {
    /// Labels read from the source.
    pub labels: usize,
    /// Target repositories reconciled against.
    pub targets: usize,
    pub outcomes: OutcomeTally,
}

/// Re-applies the source repository's current labels to every target.
pub struct BulkResync<D, L> {
    directory: Arc<D>,
    reconciler: Reconciler<D>,
    enumerator: RepositoryEnumerator<L>,
    source: RepoRef,
}

impl<D: LabelDirectory, L: RepositoryLister> BulkResync<D, L> {
    #[must_use]
    pub fn new(
        directory: Arc<D>,
        reconciler: Reconciler<D>,
        enumerator: RepositoryEnumerator<L>,
        source: RepoRef,
    ) -> Self {
        Self {
            directory,
            reconciler,
            enumerator,
            source,
        }
    }

    /// Reconcile each source label as a content edit (edit if present, create
    /// otherwise) against every target, in sequence.
    pub async fn run(&self) -> Result<BulkReport, SyncError> {
        let labels = self.directory.list_labels(&self.source).await?;
        let targets = self.enumerator.targets().await?;
        info!(
            source = %self.source,
            labels = labels.len(),
            targets = targets.len(),
            "Starting bulk resync"
        );

        let mut report = BulkReport {
            labels: labels.len(),
            targets: targets.len(),
            outcomes: OutcomeTally::default(),
        };

        for label in labels {
            let name = label.name.clone();
            let change = LabelChange::ContentEdit(label);

            for repo in &targets {
                match self.reconciler.reconcile(repo, &change).await {
                    Ok(outcome) => report.outcomes.record(outcome),
                    Err(source) => {
                        let completed = report.outcomes.total();
                        error!(
                            label = %name,
                            repo = %repo,
                            completed,
                            error = %source,
                            "Bulk resync aborted"
                        );
                        return Err(SyncError::Aborted {
                            label: name,
                            repo: repo.clone(),
                            completed,
                            source,
                        });
                    }
                }
            }
        }

        info!(outcomes = %report.outcomes, "Bulk resync completed");
        Ok(report)
    }
}
