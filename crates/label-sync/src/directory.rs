//! Label directory and repository listing abstractions.
//!
//! The reconciler and drivers only talk to these traits; [`crate::GitHubClient`]
//! implements both against the hosting API.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Label, RepoRef};

/// Errors from label directory and repository listing operations.
#[derive(Debug, Error)]
pub enum LabelError {
    /// An edit or rename referenced a label absent in the repository.
    #[error("label '{name}' not found in {repo}")]
    NotFound { repo: RepoRef, name: String },

    /// A create or rename target name is already present.
    #[error("label '{name}' already exists in {repo}")]
    Conflict { repo: RepoRef, name: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Rate limit exceeded, reset in {reset_in:?}")]
    RateLimited { reset_in: Duration },

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl LabelError {
    /// Auth failures, network faults and rate limits: terminal, never retried.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Api { .. } | Self::RateLimited { .. } | Self::Config(_)
        )
    }
}

/// Read and write access to one repository's label set.
#[async_trait]
pub trait LabelDirectory: Send + Sync {
    /// Fetch the label named exactly `name` (case-sensitive), or `None`.
    async fn get_label(&self, repo: &RepoRef, name: &str) -> Result<Option<Label>, LabelError>;

    /// Whether a label named exactly `name` exists. "Not found" is `Ok(false)`,
    /// never an error.
    async fn exists(&self, repo: &RepoRef, name: &str) -> Result<bool, LabelError> {
        Ok(self.get_label(repo, name).await?.is_some())
    }

    /// Every label currently defined in `repo`.
    async fn list_labels(&self, repo: &RepoRef) -> Result<Vec<Label>, LabelError>;

    /// Create a label. Fails with [`LabelError::Conflict`] if the name exists.
    async fn create(&self, repo: &RepoRef, label: &Label) -> Result<(), LabelError>;

    /// Update color/description of the label named `label.name`.
    /// Fails with [`LabelError::NotFound`] if it does not exist.
    async fn edit(&self, repo: &RepoRef, label: &Label) -> Result<(), LabelError>;

    /// Rename `old_name` to `label.name` and apply color/description in one call.
    /// Fails with [`LabelError::NotFound`] if `old_name` is missing and with
    /// [`LabelError::Conflict`] if the new name is taken.
    async fn rename_and_edit(
        &self,
        repo: &RepoRef,
        old_name: &str,
        label: &Label,
    ) -> Result<(), LabelError>;
}

/// Source of the organization's repositories.
#[async_trait]
pub trait RepositoryLister: Send + Sync {
    /// Non-archived repositories owned by `owner`, at most `max_count` of them,
    /// in upstream listing order.
    async fn list_repositories(
        &self,
        owner: &str,
        max_count: usize,
    ) -> Result<Vec<RepoRef>, LabelError>;
}
