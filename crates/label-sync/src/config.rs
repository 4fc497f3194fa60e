//! Configuration for label-sync runs and the webhook service.

use std::env;

use thiserror::Error;

use crate::fanout::DEFAULT_CONCURRENCY;
use crate::github::GITHUB_API_URL;
use crate::models::RepoRef;

/// Default cap on enumerated target repositories.
pub const DEFAULT_MAX_REPOS: usize = 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Label sync configuration.
#[derive(Clone)]
pub struct Config {
    /// GitHub token used for every API call.
    pub github_token: Option<String>,
    /// GitHub API root.
    pub api_url: String,
    /// Organization owning the source and target repositories.
    pub owner: Option<String>,
    /// Canonical repository name (within `owner`).
    pub source_repo: Option<String>,
    /// Hard cap on enumerated repositories.
    pub max_repos: usize,
    /// Targets reconciled at once by the fan-out driver.
    pub concurrency: usize,
    /// Repository names never reconciled against (the source is always excluded).
    pub exclude: Vec<String>,
    /// Decide outcomes without issuing writes.
    pub dry_run: bool,
    /// Webhook listener port.
    pub port: u16,
    /// Webhook signing secret for signature verification.
    pub webhook_secret: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        // GITHUB_REPOSITORY is "owner/name" inside Actions runners.
        let actions_repo = env::var("GITHUB_REPOSITORY")
            .ok()
            .and_then(|s| s.parse::<RepoRef>().ok());

        Self {
            github_token: env::var("GITHUB_TOKEN").ok().filter(|s| !s.is_empty()),
            api_url: env::var("GITHUB_API_URL").unwrap_or_else(|_| GITHUB_API_URL.to_string()),
            owner: env::var("LABEL_SYNC_OWNER")
                .or_else(|_| env::var("GITHUB_REPOSITORY_OWNER"))
                .ok()
                .filter(|s| !s.is_empty())
                .or_else(|| actions_repo.as_ref().map(|r| r.owner.clone())),
            source_repo: env::var("LABEL_SYNC_SOURCE_REPO")
                .ok()
                .filter(|s| !s.is_empty())
                .or_else(|| actions_repo.as_ref().map(|r| r.name.clone())),
            max_repos: env::var("LABEL_SYNC_MAX_REPOS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_REPOS),
            concurrency: env::var("LABEL_SYNC_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CONCURRENCY),
            exclude: env::var("LABEL_SYNC_EXCLUDE")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|r| r.trim().to_string())
                        .filter(|r| !r.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            dry_run: env::var("LABEL_SYNC_DRY_RUN")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            port: env::var("LABEL_SYNC_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            webhook_secret: env::var("LABEL_SYNC_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}

impl Config {
    /// Check that a run can be started.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github_token.is_none() {
            return Err(ConfigError::Missing("GITHUB_TOKEN"));
        }
        if self.owner.is_none() {
            return Err(ConfigError::Missing("LABEL_SYNC_OWNER"));
        }
        if self.source_repo.is_none() {
            return Err(ConfigError::Missing("LABEL_SYNC_SOURCE_REPO"));
        }
        if self.max_repos == 0 {
            return Err(ConfigError::Zero("LABEL_SYNC_MAX_REPOS"));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Zero("LABEL_SYNC_CONCURRENCY"));
        }
        Ok(())
    }

    /// The canonical repository.
    pub fn source(&self) -> Result<RepoRef, ConfigError> {
        let owner = self
            .owner
            .as_deref()
            .ok_or(ConfigError::Missing("LABEL_SYNC_OWNER"))?;
        let name = self
            .source_repo
            .as_deref()
            .ok_or(ConfigError::Missing("LABEL_SYNC_SOURCE_REPO"))?;
        Ok(RepoRef::new(owner, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "GITHUB_TOKEN",
        "GITHUB_API_URL",
        "GITHUB_REPOSITORY",
        "GITHUB_REPOSITORY_OWNER",
        "LABEL_SYNC_OWNER",
        "LABEL_SYNC_SOURCE_REPO",
        "LABEL_SYNC_MAX_REPOS",
        "LABEL_SYNC_CONCURRENCY",
        "LABEL_SYNC_EXCLUDE",
        "LABEL_SYNC_DRY_RUN",
        "LABEL_SYNC_PORT",
        "LABEL_SYNC_WEBHOOK_SECRET",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_default_config() {
        clear_env();

        let config = Config::default();
        assert!(config.github_token.is_none());
        assert_eq!(config.api_url, "https://api.github.com");
        assert_eq!(config.max_repos, 1000);
        assert_eq!(config.concurrency, 8);
        assert!(config.exclude.is_empty());
        assert!(!config.dry_run);
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.validate(),
            Err(ConfigError::Missing("GITHUB_TOKEN"))
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_env();
        env::set_var("GITHUB_TOKEN", "ghp_test");
        env::set_var("LABEL_SYNC_OWNER", "acme");
        env::set_var("LABEL_SYNC_SOURCE_REPO", "labels");
        env::set_var("LABEL_SYNC_MAX_REPOS", "50");
        env::set_var("LABEL_SYNC_EXCLUDE", "legacy, sandbox ,");
        env::set_var("LABEL_SYNC_DRY_RUN", "1");

        let config = Config::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.source().unwrap(), RepoRef::new("acme", "labels"));
        assert_eq!(config.max_repos, 50);
        assert_eq!(config.exclude, vec!["legacy", "sandbox"]);
        assert!(config.dry_run);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_falls_back_to_actions_env() {
        clear_env();
        env::set_var("GITHUB_TOKEN", "ghp_test");
        env::set_var("GITHUB_REPOSITORY", "acme/labels");

        let config = Config::default();
        assert_eq!(config.source().unwrap(), RepoRef::new("acme", "labels"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_cap_rejected() {
        clear_env();
        env::set_var("GITHUB_TOKEN", "ghp_test");
        env::set_var("LABEL_SYNC_OWNER", "acme");
        env::set_var("LABEL_SYNC_SOURCE_REPO", "labels");
        env::set_var("LABEL_SYNC_MAX_REPOS", "0");

        let config = Config::default();
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero("LABEL_SYNC_MAX_REPOS"))
        );

        clear_env();
    }
}
