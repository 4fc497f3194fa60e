//! Event-triggered fan-out.
//!
//! One label change becomes one independent unit of work per target
//! repository. Units run on a bounded worker pool, share no mutable state and
//! report their own result; a failing target never cancels its siblings.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::directory::{LabelDirectory, RepositoryLister};
use crate::enumerator::RepositoryEnumerator;
use crate::error::SyncError;
use crate::event::{LabelChange, LabelEvent};
use crate::models::{Outcome, OutcomeTally, RepoRef};
use crate::reconciler::Reconciler;

/// Default number of targets reconciled at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Result of one (change, target) unit.
#[derive(Debug)]
pub struct TargetResult {
    pub repo: RepoRef,
    pub result: Result<Outcome, SyncError>,
}

/// Aggregated results of a fan-out run.
#[derive(Debug, Default)]
pub struct FanOutReport {
    /// Per-target results, ordered by repository.
    pub results: Vec<TargetResult>,
    /// Units that died before reporting (panics).
    pub worker_failures: Vec<String>,
}

impl FanOutReport {
    #[must_use]
    pub fn tally(&self) -> OutcomeTally {
        let mut tally = OutcomeTally::default();
        for outcome in self.results.iter().filter_map(|r| r.result.as_ref().ok()) {
            tally.record(*outcome);
        }
        tally
    }

    /// Targets whose reconciliation failed.
    pub fn failures(&self) -> impl Iterator<Item = (&RepoRef, &SyncError)> {
        self.results
            .iter()
            .filter_map(|r| r.result.as_ref().err().map(|e| (&r.repo, e)))
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures().count() + self.worker_failures.len()
    }

    /// Whether every unit succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    /// Outcome recorded for `repo`, if its unit succeeded.
    #[must_use]
    pub fn outcome_for(&self, repo: &RepoRef) -> Option<Outcome> {
        self.results
            .iter()
            .find(|r| &r.repo == repo)
            .and_then(|r| r.result.as_ref().ok().copied())
    }
}

/// Runs one label change against every target repository.
pub struct FanOutDriver<D, L> {
    reconciler: Arc<Reconciler<D>>,
    enumerator: RepositoryEnumerator<L>,
    concurrency: usize,
}

impl<D, L> FanOutDriver<D, L>
where
    D: LabelDirectory + 'static,
    L: RepositoryLister,
{
    #[must_use]
    pub fn new(reconciler: Reconciler<D>, enumerator: RepositoryEnumerator<L>) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            enumerator,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Bound the number of targets reconciled at once (minimum 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Classify a webhook event and fan it out.
    pub async fn run_event(&self, event: &LabelEvent) -> Result<FanOutReport, SyncError> {
        let change = event.to_change()?;
        self.run(change).await
    }

    /// Enumerate targets and fan `change` out to them.
    ///
    /// Only enumeration failure fails the whole run; per-target failures are
    /// recorded in the report.
    pub async fn run(&self, change: LabelChange) -> Result<FanOutReport, SyncError> {
        let targets = self.enumerator.targets().await?;
        Ok(self.dispatch(change, targets).await)
    }

    /// Reconcile `change` against each of `targets` as independent units.
    pub async fn dispatch(&self, change: LabelChange, targets: Vec<RepoRef>) -> FanOutReport {
        info!(
            action = change.kind(),
            label = %change.label().name,
            targets = targets.len(),
            concurrency = self.concurrency,
            "Fanning out label change"
        );

        let change = Arc::new(change);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<TargetResult> = JoinSet::new();

        for repo in targets {
            let reconciler = Arc::clone(&self.reconciler);
            let change = Arc::clone(&change);
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => reconciler
                        .reconcile(&repo, &change)
                        .await
                        .map_err(SyncError::from),
                    Err(_) => Err(SyncError::Worker("worker pool closed".to_string())),
                };
                TargetResult { repo, result }
            });
        }

        let mut report = FanOutReport::default();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(target) => {
                    if let Err(e) = &target.result {
                        error!(repo = %target.repo, error = %e, "Reconciliation failed");
                    }
                    report.results.push(target);
                }
                Err(join_error) => {
                    error!(error = %join_error, "Reconciliation task failed");
                    report.worker_failures.push(join_error.to_string());
                }
            }
        }
        report.results.sort_by(|a, b| a.repo.cmp(&b.repo));

        let failures = report.failure_count();
        if failures > 0 {
            warn!(
                outcomes = %report.tally(),
                failed = failures,
                "Fan-out completed with failures"
            );
        } else {
            info!(outcomes = %report.tally(), "Fan-out completed");
        }

        report
    }
}
