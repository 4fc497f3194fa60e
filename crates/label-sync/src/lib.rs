//! Organization-wide label propagation.
//!
//! This crate keeps the label sets of every repository in an organization
//! aligned with one canonical repository:
//! - Webhook payload parsing and signature verification
//! - Rename detection for overloaded `edited` events
//! - A reconciler that decides and applies one mutation per target repository
//! - A fan-out driver (independent units per target) and a sequential bulk resync
//! - A GitHub REST client for label and repository operations
//! - An HTTP webhook receiver (standalone service)

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Most async API methods can fail

pub mod bulk;
pub mod config;
pub mod directory;
pub mod enumerator;
pub mod error;
pub mod event;
pub mod fanout;
pub mod github;
pub mod models;
pub mod reconciler;
pub mod rename;
pub mod server;

pub use bulk::{BulkReport, BulkResync};
pub use config::Config;
pub use directory::{LabelDirectory, LabelError, RepositoryLister};
pub use enumerator::RepositoryEnumerator;
pub use error::SyncError;
pub use event::{verify_webhook_signature, LabelAction, LabelChange, LabelEvent};
pub use fanout::{FanOutDriver, FanOutReport, TargetResult};
pub use github::GitHubClient;
pub use models::{Label, Outcome, OutcomeTally, RepoRef};
pub use reconciler::Reconciler;
pub use rename::is_rename;
