//! Label webhook payload parsing and signature verification.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::SyncError;
use crate::models::{Label, RepoRef};
use crate::rename::is_rename;

type HmacSha256 = Hmac<Sha256>;

/// Verify a GitHub webhook signature (`X-Hub-Signature-256`) using HMAC-SHA256.
///
/// # Arguments
/// * `body` - Raw webhook body bytes
/// * `signature` - Header value, `sha256=` followed by the hex digest
/// * `secret` - Webhook signing secret
///
/// # Returns
/// `true` if signature is valid, `false` otherwise
#[must_use]
pub fn verify_webhook_signature(body: &[u8], signature: &str, secret: &str) -> bool {
    let Some(hex_digest) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(signature_bytes) = hex::decode(hex_digest) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    computed.as_slice().ct_eq(&signature_bytes).into()
}

/// Label event action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelAction {
    Created,
    Edited,
    Deleted,
    /// Unknown action (catch-all to avoid parse failures)
    #[serde(other)]
    Unknown,
}

/// Label as carried by the webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelPayload {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A single `{ "from": ... }` change record.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeFrom {
    pub from: String,
}

/// Changes attached to `edited` events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelChanges {
    /// Present only when the edit changed the name.
    #[serde(default)]
    pub name: Option<ChangeFrom>,
}

/// Repository owner.
#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// Repository the event originated from.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRepository {
    pub name: String,
    pub owner: Owner,
}

/// GitHub `label` webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelEvent {
    pub action: LabelAction,
    pub label: LabelPayload,
    #[serde(default)]
    pub changes: Option<LabelChanges>,
    #[serde(default)]
    pub repository: Option<EventRepository>,
}

impl LabelEvent {
    /// Parse a raw payload.
    pub fn from_slice(body: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(body).map_err(|e| SyncError::InvalidEvent(e.to_string()))
    }

    /// Name the label had before an `edited` event, when the payload carries one.
    #[must_use]
    pub fn previous_name(&self) -> Option<&str> {
        self.changes
            .as_ref()
            .and_then(|changes| changes.name.as_ref())
            .map(|change| change.from.as_str())
    }

    /// Repository the event came from, if the payload says.
    #[must_use]
    pub fn source(&self) -> Option<RepoRef> {
        self.repository
            .as_ref()
            .map(|repo| RepoRef::new(&repo.owner.login, &repo.name))
    }

    /// The payload's repository when it is not `source` (compared
    /// case-insensitively). Payloads without a repository are trusted.
    #[must_use]
    pub fn foreign_origin(&self, source: &RepoRef) -> Option<RepoRef> {
        self.source()
            .filter(|origin| !origin.full_name().eq_ignore_ascii_case(&source.full_name()))
    }

    /// Classify the event into the change the reconciler acts on.
    pub fn to_change(&self) -> Result<LabelChange, SyncError> {
        let label = Label::new(
            &self.label.name,
            &self.label.color,
            self.label.description.clone().unwrap_or_default(),
        );

        match self.action {
            LabelAction::Created => Ok(LabelChange::Created(label)),
            LabelAction::Deleted => Ok(LabelChange::Deleted(label)),
            LabelAction::Edited => match self.previous_name() {
                Some(previous) if is_rename(Some(previous), &label.name) => {
                    Ok(LabelChange::RenameEdit {
                        old_name: previous.to_string(),
                        label,
                    })
                }
                _ => Ok(LabelChange::ContentEdit(label)),
            },
            LabelAction::Unknown => Err(SyncError::InvalidEvent(format!(
                "unsupported label action for '{}'",
                self.label.name
            ))),
        }
    }
}

/// A label change, with renames split from content edits at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelChange {
    /// A label was created in the source.
    Created(Label),
    /// Color and/or description changed; the name is stable.
    ContentEdit(Label),
    /// The name changed from `old_name` to `label.name`.
    RenameEdit { old_name: String, label: Label },
    /// A label was deleted in the source. Never propagated.
    Deleted(Label),
}

impl LabelChange {
    /// The desired label state.
    #[must_use]
    pub fn label(&self) -> &Label {
        match self {
            Self::Created(label)
            | Self::ContentEdit(label)
            | Self::Deleted(label)
            | Self::RenameEdit { label, .. } => label,
        }
    }

    /// Short action name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::ContentEdit(_) => "edited",
            Self::RenameEdit { .. } => "renamed",
            Self::Deleted(_) => "deleted",
        }
    }
}
