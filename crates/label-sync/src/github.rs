//! GitHub REST client for label and repository operations.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::directory::{LabelDirectory, LabelError, RepositoryLister};
use crate::models::{Label, RepoRef};

/// Public GitHub API endpoint.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Page size for list endpoints (the API maximum).
const PER_PAGE: usize = 100;

/// Fallback wait reported when a rate-limit response carries no reset header.
const DEFAULT_RATE_LIMIT_RESET_SECS: u64 = 60;

/// GitHub API client for labels and organization repositories.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

#[derive(Debug, Deserialize)]
struct GitHubLabel {
    name: String,
    color: String,
    #[serde(default)]
    description: Option<String>,
}

impl From<GitHubLabel> for Label {
    fn from(label: GitHubLabel) -> Self {
        Label::new(label.name, label.color, label.description.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct GitHubOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GitHubRepository {
    name: String,
    owner: GitHubOwner,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Serialize)]
struct CreateLabelRequest<'a> {
    name: &'a str,
    color: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateLabelRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    new_name: Option<&'a str>,
    color: &'a str,
    description: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GitHubError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<GitHubErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GitHubErrorDetail {
    #[serde(default)]
    code: Option<String>,
}

/// A non-success response, read once.
struct ApiFailure {
    status: StatusCode,
    message: String,
    already_exists: bool,
}

impl ApiFailure {
    async fn read(response: Response) -> Self {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body: GitHubError = serde_json::from_str(&text).unwrap_or_default();
        let already_exists = body
            .errors
            .iter()
            .any(|detail| detail.code.as_deref() == Some("already_exists"));
        let message = if body.message.is_empty() {
            text
        } else {
            body.message
        };

        Self {
            status,
            message,
            already_exists,
        }
    }
}

impl From<ApiFailure> for LabelError {
    fn from(failure: ApiFailure) -> Self {
        LabelError::Api {
            status: failure.status.as_u16(),
            message: failure.message,
        }
    }
}

impl GitHubClient {
    /// Create a client against the public GitHub API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(token: &str) -> Result<Self, LabelError> {
        Self::with_base_url(token, GITHUB_API_URL)
    }

    /// Create a client against a custom API root (GitHub Enterprise, test servers).
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a usable base URL or the HTTP
    /// client cannot be created.
    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, LabelError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| LabelError::Config(format!("invalid API URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(LabelError::Config(format!(
                "API URL '{base_url}' cannot carry a path"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("label-sync/1.0"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: token.to_string(),
        })
    }

    /// Build an endpoint URL from path segments, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, LabelError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| LabelError::Config(format!("API URL '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn label_url(&self, repo: &RepoRef, name: &str) -> Result<Url, LabelError> {
        self.endpoint(&["repos", &repo.owner, &repo.name, "labels", name])
    }

    fn labels_url(&self, repo: &RepoRef) -> Result<Url, LabelError> {
        self.endpoint(&["repos", &repo.owner, &repo.name, "labels"])
    }

    /// Send an authenticated request, classifying rate-limit rejections.
    async fn send(&self, request: RequestBuilder) -> Result<Response, LabelError> {
        let response = request.bearer_auth(&self.token).send().await?;

        if let Some(reset_in) = Self::rate_limit_reset(&response) {
            return Err(LabelError::RateLimited { reset_in });
        }

        Ok(response)
    }

    /// Time until the rate limit resets, if this response is a rate-limit rejection.
    fn rate_limit_reset(response: &Response) -> Option<Duration> {
        let status = response.status();
        if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
            return None;
        }

        let headers = response.headers();
        let exhausted = headers
            .get("x-ratelimit-remaining")
            .and_then(|h| h.to_str().ok())
            == Some("0");
        if !exhausted && status != StatusCode::TOO_MANY_REQUESTS {
            return None;
        }

        let reset_in = headers
            .get("x-ratelimit-reset")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<i64>().ok())
            .map(|reset_timestamp| {
                let now = chrono::Utc::now().timestamp();
                Duration::from_secs(u64::try_from(reset_timestamp - now).unwrap_or(0))
            })
            .unwrap_or(Duration::from_secs(DEFAULT_RATE_LIMIT_RESET_SECS));

        Some(reset_in)
    }
}

#[async_trait]
impl LabelDirectory for GitHubClient {
    #[instrument(skip(self), fields(repo = %repo))]
    async fn get_label(&self, repo: &RepoRef, name: &str) -> Result<Option<Label>, LabelError> {
        let url = self.label_url(repo, name)?;
        let response = self.send(self.client.get(url)).await?;

        match response.status() {
            StatusCode::OK => {
                let label: GitHubLabel = response.json().await?;
                // Lookup by name is case-insensitive upstream; only an exact match counts.
                if label.name == name {
                    Ok(Some(label.into()))
                } else {
                    debug!(found = %label.name, "Label differs only by case");
                    Ok(None)
                }
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(ApiFailure::read(response).await.into()),
        }
    }

    #[instrument(skip(self), fields(repo = %repo))]
    async fn list_labels(&self, repo: &RepoRef) -> Result<Vec<Label>, LabelError> {
        let mut labels = Vec::new();

        for page in 1.. {
            let request = self
                .client
                .get(self.labels_url(repo)?)
                .query(&[("per_page", PER_PAGE), ("page", page)]);
            let response = self.send(request).await?;
            if !response.status().is_success() {
                return Err(ApiFailure::read(response).await.into());
            }

            let batch: Vec<GitHubLabel> = response.json().await?;
            let last_page = batch.len() < PER_PAGE;
            labels.extend(batch.into_iter().map(Label::from));
            if last_page {
                break;
            }
        }

        debug!(count = labels.len(), "Listed labels");
        Ok(labels)
    }

    #[instrument(skip(self, label), fields(repo = %repo, label = %label.name))]
    async fn create(&self, repo: &RepoRef, label: &Label) -> Result<(), LabelError> {
        let body = CreateLabelRequest {
            name: &label.name,
            color: &label.color,
            description: &label.description,
        };
        let response = self
            .send(self.client.post(self.labels_url(repo)?).json(&body))
            .await?;

        if response.status().is_success() {
            info!("Created label");
            return Ok(());
        }

        let failure = ApiFailure::read(response).await;
        if failure.status == StatusCode::UNPROCESSABLE_ENTITY && failure.already_exists {
            Err(LabelError::Conflict {
                repo: repo.clone(),
                name: label.name.clone(),
            })
        } else {
            Err(failure.into())
        }
    }

    #[instrument(skip(self, label), fields(repo = %repo, label = %label.name))]
    async fn edit(&self, repo: &RepoRef, label: &Label) -> Result<(), LabelError> {
        let body = UpdateLabelRequest {
            new_name: None,
            color: &label.color,
            description: &label.description,
        };
        let response = self
            .send(
                self.client
                    .patch(self.label_url(repo, &label.name)?)
                    .json(&body),
            )
            .await?;

        match response.status() {
            status if status.is_success() => {
                info!("Edited label");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(LabelError::NotFound {
                repo: repo.clone(),
                name: label.name.clone(),
            }),
            _ => Err(ApiFailure::read(response).await.into()),
        }
    }

    #[instrument(skip(self, label), fields(repo = %repo, old_name = %old_name, new_name = %label.name))]
    async fn rename_and_edit(
        &self,
        repo: &RepoRef,
        old_name: &str,
        label: &Label,
    ) -> Result<(), LabelError> {
        let body = UpdateLabelRequest {
            new_name: Some(&label.name),
            color: &label.color,
            description: &label.description,
        };
        let response = self
            .send(self.client.patch(self.label_url(repo, old_name)?).json(&body))
            .await?;

        if response.status().is_success() {
            info!("Renamed label");
            return Ok(());
        }
        if response.status() == StatusCode::NOT_FOUND {
            return Err(LabelError::NotFound {
                repo: repo.clone(),
                name: old_name.to_string(),
            });
        }

        let failure = ApiFailure::read(response).await;
        if failure.status == StatusCode::UNPROCESSABLE_ENTITY && failure.already_exists {
            Err(LabelError::Conflict {
                repo: repo.clone(),
                name: label.name.clone(),
            })
        } else {
            Err(failure.into())
        }
    }
}

#[async_trait]
impl RepositoryLister for GitHubClient {
    #[instrument(skip(self))]
    async fn list_repositories(
        &self,
        owner: &str,
        max_count: usize,
    ) -> Result<Vec<RepoRef>, LabelError> {
        let mut repos = Vec::new();
        if max_count == 0 {
            return Ok(repos);
        }

        for page in 1.. {
            let request = self
                .client
                .get(self.endpoint(&["orgs", owner, "repos"])?)
                .query(&[("type", "all")])
                .query(&[("per_page", PER_PAGE), ("page", page)]);
            let response = self.send(request).await?;
            if !response.status().is_success() {
                return Err(ApiFailure::read(response).await.into());
            }

            let batch: Vec<GitHubRepository> = response.json().await?;
            let last_page = batch.len() < PER_PAGE;
            repos.extend(
                batch
                    .into_iter()
                    .filter(|repo| !repo.archived)
                    .map(|repo| RepoRef::new(repo.owner.login, repo.name)),
            );

            if repos.len() >= max_count {
                if repos.len() > max_count || !last_page {
                    info!(max_count, "Repository cap reached, remaining repositories excluded");
                }
                repos.truncate(max_count);
                break;
            }
            if last_page {
                break;
            }
        }

        debug!(count = repos.len(), "Listed repositories");
        Ok(repos)
    }
}
