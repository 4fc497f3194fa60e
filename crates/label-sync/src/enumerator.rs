//! Target repository enumeration.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::directory::{LabelError, RepositoryLister};
use crate::models::RepoRef;

/// Lists the repositories a run reconciles against.
///
/// The cap is a hard limit applied by the listing source: repositories past it
/// are excluded, not sampled. Excluded names (always including the source
/// repository) and duplicates are dropped afterwards.
pub struct RepositoryEnumerator<L> {
    lister: Arc<L>,
    owner: String,
    max_count: usize,
    excluded: HashSet<String>,
}

impl<L: RepositoryLister> RepositoryEnumerator<L> {
    #[must_use]
    pub fn new(lister: Arc<L>, owner: impl Into<String>, max_count: usize) -> Self {
        Self {
            lister,
            owner: owner.into(),
            max_count,
            excluded: HashSet::new(),
        }
    }

    /// Never reconcile against `name` (a repository name within the owner).
    #[must_use]
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded.insert(name.into());
        self
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Enumerate targets in upstream order.
    pub async fn targets(&self) -> Result<Vec<RepoRef>, LabelError> {
        let listed = self
            .lister
            .list_repositories(&self.owner, self.max_count)
            .await?;
        let listed_count = listed.len();

        let mut seen = HashSet::new();
        let targets: Vec<RepoRef> = listed
            .into_iter()
            .filter(|repo| {
                let keep = !self.excluded.contains(&repo.name)
                    && !self.excluded.contains(&repo.full_name());
                if !keep {
                    debug!(repo = %repo, "Excluded from targets");
                }
                keep
            })
            .filter(|repo| seen.insert(repo.clone()))
            .collect();

        info!(
            owner = %self.owner,
            listed = listed_count,
            targets = targets.len(),
            "Enumerated target repositories"
        );
        Ok(targets)
    }
}
