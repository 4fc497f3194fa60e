//! Core types shared by the drivers, the reconciler and the client.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A label definition: the unit of reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Unique name within a repository (case-sensitive).
    pub name: String,
    /// Hex color code without the leading `#` (e.g. `ff0000`).
    pub color: String,
    /// Free text, possibly empty.
    #[serde(default)]
    pub description: String,
}

impl Label {
    /// Create a label, normalizing the color to the bare hex form the API expects.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        color: impl AsRef<str>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            color: color.as_ref().trim_start_matches('#').to_string(),
            description: description.into(),
        }
    }
}

/// Reference to a repository that receives reconciled labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoRef {
    /// Owning organization or user login.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoRef {
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// `owner/name` form.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(format!("expected owner/name, got '{s}'")),
        }
    }
}

/// Result of reconciling one label change against one target repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The label was created in the target.
    Created,
    /// Color/description were updated in place.
    Edited,
    /// The label was renamed and its color/description applied in one call.
    RenamedAndEdited,
    /// The mutation was withheld because it would collide with existing state.
    SkippedConflict,
    /// Nothing to do (deletions are never propagated).
    SkippedNoop,
}

impl Outcome {
    /// Whether the outcome changed the target's label set.
    #[must_use]
    pub fn is_mutation(self) -> bool {
        matches!(self, Self::Created | Self::Edited | Self::RenamedAndEdited)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Edited => write!(f, "edited"),
            Self::RenamedAndEdited => write!(f, "renamed-and-edited"),
            Self::SkippedConflict => write!(f, "skipped-conflict"),
            Self::SkippedNoop => write!(f, "skipped-noop"),
        }
    }
}

/// Per-outcome counters for a run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeTally(BTreeMap<Outcome, usize>);

impl OutcomeTally {
    pub fn record(&mut self, outcome: Outcome) {
        *self.0.entry(outcome).or_insert(0) += 1;
    }

    #[must_use]
    pub fn count(&self, outcome: Outcome) -> usize {
        self.0.get(&outcome).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }
}

impl fmt::Display for OutcomeTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "none");
        }
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(outcome, count)| format!("{outcome}={count}"))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}
