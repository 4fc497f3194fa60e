//! In-memory label directory and repository lister for driver tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use label_sync::{Label, LabelDirectory, LabelError, RepoRef, RepositoryLister};

/// A write observed by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Create(RepoRef, String),
    Edit(RepoRef, String),
    Rename(RepoRef, String, String),
}

/// A change another actor makes to a target right after a lookup answers.
#[derive(Debug, Clone)]
enum Interference {
    Insert(Label),
    Remove(String),
}

#[derive(Default)]
pub struct InMemoryDirectory {
    labels: Mutex<HashMap<RepoRef, BTreeMap<String, Label>>>,
    repos: Mutex<Vec<(RepoRef, bool)>>,
    failing: Mutex<HashSet<RepoRef>>,
    interference: Mutex<HashMap<(RepoRef, String), Interference>>,
    writes: Mutex<Vec<Write>>,
    reads: Mutex<Vec<(RepoRef, String)>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a non-archived repository with the given labels.
    pub fn with_repo(self, repo: &RepoRef, labels: &[Label]) -> Self {
        self.add_repo(repo, labels, false);
        self
    }

    pub fn with_archived_repo(self, repo: &RepoRef) -> Self {
        self.add_repo(repo, &[], true);
        self
    }

    /// Every call touching `repo` fails with a transport error.
    pub fn failing(self, repo: &RepoRef) -> Self {
        self.failing.lock().unwrap().insert(repo.clone());
        self
    }

    fn add_repo(&self, repo: &RepoRef, labels: &[Label], archived: bool) {
        self.repos.lock().unwrap().push((repo.clone(), archived));
        let set = labels
            .iter()
            .map(|label| (label.name.clone(), label.clone()))
            .collect();
        self.labels.lock().unwrap().insert(repo.clone(), set);
    }

    /// Once the lookup of `looked_up` in `repo` has answered, `label`
    /// appears in the target.
    pub fn insert_after_lookup(self, repo: &RepoRef, looked_up: &str, label: Label) -> Self {
        self.interference.lock().unwrap().insert(
            (repo.clone(), looked_up.to_string()),
            Interference::Insert(label),
        );
        self
    }

    /// Once the lookup of `name` in `repo` has answered, the label is removed.
    pub fn remove_after_lookup(self, repo: &RepoRef, name: &str) -> Self {
        self.interference.lock().unwrap().insert(
            (repo.clone(), name.to_string()),
            Interference::Remove(name.to_string()),
        );
        self
    }

    fn interfere(&self, repo: &RepoRef, name: &str) {
        let Some(interference) = self
            .interference
            .lock()
            .unwrap()
            .remove(&(repo.clone(), name.to_string()))
        else {
            return;
        };
        let mut labels = self.labels.lock().unwrap();
        let set = labels.entry(repo.clone()).or_default();
        match interference {
            Interference::Insert(label) => {
                set.insert(label.name.clone(), label);
            }
            Interference::Remove(name) => {
                set.remove(&name);
            }
        }
    }

    pub fn label(&self, repo: &RepoRef, name: &str) -> Option<Label> {
        self.labels
            .lock()
            .unwrap()
            .get(repo)
            .and_then(|set| set.get(name).cloned())
    }

    pub fn label_names(&self, repo: &RepoRef) -> Vec<String> {
        self.labels
            .lock()
            .unwrap()
            .get(repo)
            .map(|set| set.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn reads(&self) -> Vec<(RepoRef, String)> {
        self.reads.lock().unwrap().clone()
    }

    fn check(&self, repo: &RepoRef) -> Result<(), LabelError> {
        if self.failing.lock().unwrap().contains(repo) {
            return Err(LabelError::Api {
                status: 502,
                message: format!("{repo} unavailable"),
            });
        }
        Ok(())
    }
}

/// Label names are unique per repository ignoring letter case. `except` is the
/// label being renamed, which may keep its own name in another case.
fn taken(set: &BTreeMap<String, Label>, name: &str, except: Option<&str>) -> bool {
    set.keys()
        .filter(|existing| Some(existing.as_str()) != except)
        .any(|existing| existing.eq_ignore_ascii_case(name))
}

#[async_trait]
impl LabelDirectory for InMemoryDirectory {
    async fn get_label(&self, repo: &RepoRef, name: &str) -> Result<Option<Label>, LabelError> {
        self.check(repo)?;
        self.reads
            .lock()
            .unwrap()
            .push((repo.clone(), name.to_string()));
        let found = self.label(repo, name);
        self.interfere(repo, name);
        Ok(found)
    }

    async fn list_labels(&self, repo: &RepoRef) -> Result<Vec<Label>, LabelError> {
        self.check(repo)?;
        Ok(self
            .labels
            .lock()
            .unwrap()
            .get(repo)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn create(&self, repo: &RepoRef, label: &Label) -> Result<(), LabelError> {
        self.check(repo)?;
        let mut labels = self.labels.lock().unwrap();
        let set = labels.entry(repo.clone()).or_default();
        if taken(set, &label.name, None) {
            return Err(LabelError::Conflict {
                repo: repo.clone(),
                name: label.name.clone(),
            });
        }
        set.insert(label.name.clone(), label.clone());
        self.writes
            .lock()
            .unwrap()
            .push(Write::Create(repo.clone(), label.name.clone()));
        Ok(())
    }

    async fn edit(&self, repo: &RepoRef, label: &Label) -> Result<(), LabelError> {
        self.check(repo)?;
        let mut labels = self.labels.lock().unwrap();
        let Some(existing) = labels
            .get_mut(repo)
            .and_then(|set| set.get_mut(&label.name))
        else {
            return Err(LabelError::NotFound {
                repo: repo.clone(),
                name: label.name.clone(),
            });
        };
        existing.color.clone_from(&label.color);
        existing.description.clone_from(&label.description);
        self.writes
            .lock()
            .unwrap()
            .push(Write::Edit(repo.clone(), label.name.clone()));
        Ok(())
    }

    async fn rename_and_edit(
        &self,
        repo: &RepoRef,
        old_name: &str,
        label: &Label,
    ) -> Result<(), LabelError> {
        self.check(repo)?;
        let mut labels = self.labels.lock().unwrap();
        let set = labels.entry(repo.clone()).or_default();
        if !set.contains_key(old_name) {
            return Err(LabelError::NotFound {
                repo: repo.clone(),
                name: old_name.to_string(),
            });
        }
        if taken(set, &label.name, Some(old_name)) {
            return Err(LabelError::Conflict {
                repo: repo.clone(),
                name: label.name.clone(),
            });
        }
        set.remove(old_name);
        set.insert(label.name.clone(), label.clone());
        self.writes.lock().unwrap().push(Write::Rename(
            repo.clone(),
            old_name.to_string(),
            label.name.clone(),
        ));
        Ok(())
    }
}

#[async_trait]
impl RepositoryLister for InMemoryDirectory {
    async fn list_repositories(
        &self,
        owner: &str,
        max_count: usize,
    ) -> Result<Vec<RepoRef>, LabelError> {
        Ok(self
            .repos
            .lock()
            .unwrap()
            .iter()
            .filter(|(repo, archived)| repo.owner == owner && !archived)
            .map(|(repo, _)| repo.clone())
            .take(max_count)
            .collect())
    }
}

pub fn repo(name: &str) -> RepoRef {
    RepoRef::new("acme", name)
}

pub fn label(name: &str, color: &str, description: &str) -> Label {
    Label::new(name, color, description)
}
