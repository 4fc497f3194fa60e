//! Driver-level errors.

use thiserror::Error;

use crate::directory::LabelError;
use crate::models::RepoRef;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Label(#[from] LabelError),

    #[error("Invalid label event: {0}")]
    InvalidEvent(String),

    /// The bulk sequence stopped at its first failing (label, target) pair.
    #[error("Resync aborted at label '{label}' in {repo} after {completed} reconciliations: {source}")]
    Aborted {
        label: String,
        repo: RepoRef,
        completed: usize,
        #[source]
        source: LabelError,
    },

    /// A fan-out unit could not run to completion.
    #[error("Worker failed: {0}")]
    Worker(String),
}
