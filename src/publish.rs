//! Repository publishing: create a public repository, commit the generated
//! document as the site entry point, enable pages.
//!
//! Two external effects run in sequence, so there is a partial-failure window
//! between them: a commit failure after a successful creation is reported as
//! [`PublishError::Partial`] carrying the created repository identifier,
//! never folded into a generic failure.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::config::{PipelineConfig, PAGES_BRANCH, USER_AGENT};
use crate::generate::GeneratedArtifact;
use crate::profile::Secret;

/// Path the site is served from on the default branch.
pub const SITE_ENTRY_POINT: &str = "index.html";

const REPO_DESCRIPTION: &str = "Personal portfolio generated by folio-press";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("repository host rejected the access token")]
    Auth,
    #[error("repository name '{name}' already exists")]
    NameConflict { name: String },
    #[error("repository host unavailable: {0}")]
    Upstream(String),
    #[error("repository {repo} was created but the site commit failed: {reason}")]
    Partial { repo: RepoId, reason: String },
}

/// Identifier of a repository under the authenticated account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Terminal artifact of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub repo: RepoId,
    /// Commit on the default branch that carries the site entry point.
    pub commit: String,
    pub url: String,
}

/// Client for the source-control host. Implementations classify failures;
/// they never retry and never auto-rename on conflict.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Create a new public repository under the authenticated account.
    async fn create_repository(&self, token: &Secret, name: &str)
        -> Result<RepoId, PublishError>;

    /// Create `path` on the default branch, returning the commit identifier.
    async fn put_file(
        &self,
        token: &Secret,
        repo: &RepoId,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<String, PublishError>;

    /// Enable static-site serving from the default branch root.
    async fn enable_pages(&self, token: &Secret, repo: &RepoId) -> Result<(), PublishError>;

    /// Public URL the site will be served from.
    fn site_url(&self, repo: &RepoId) -> String;
}

/// Knobs for a single publish operation, owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub commit_message: String,
    /// Pause between creation and the first contents write.
    pub settle_delay: Duration,
    pub enable_pages: bool,
}

/// Repository name derived from the invocation's time context: deterministic
/// given the timestamp, collision-free per account at second granularity.
pub fn derive_repo_name(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}", prefix, now.format("%Y%m%d-%H%M%S"))
}

/// Run the publish stage: create the repository, settle, commit the artifact,
/// then best-effort pages enablement. Pages failures are logged and do not
/// fail the publish; the push succeeded and pages can be enabled manually.
pub async fn publish<H>(
    host: &H,
    artifact: &GeneratedArtifact,
    token: &Secret,
    name: &str,
    opts: &PublishOptions,
) -> Result<PublishResult, PublishError>
where
    H: RepoHost + ?Sized,
{
    info!(repo_name = name, byte_len = artifact.byte_len, "Publishing artifact");
    let repo = host.create_repository(token, name).await?;
    info!(repo = %repo, "Repository created");

    if !opts.settle_delay.is_zero() {
        tokio::time::sleep(opts.settle_delay).await;
    }

    let commit = match host
        .put_file(
            token,
            &repo,
            SITE_ENTRY_POINT,
            artifact.html.as_bytes(),
            &opts.commit_message,
        )
        .await
    {
        Ok(sha) => sha,
        Err(e) => {
            error!(repo = %repo, error = %e, "Site commit failed after repository creation");
            return Err(PublishError::Partial {
                repo,
                reason: e.to_string(),
            });
        }
    };
    info!(repo = %repo, commit = %commit, "Committed site entry point");

    if opts.enable_pages {
        if let Err(e) = host.enable_pages(token, &repo).await {
            warn!(
                repo = %repo,
                error = %e,
                "Could not enable pages automatically; enable it manually in the repository settings"
            );
        }
    }

    let url = host.site_url(&repo);
    info!(repo = %repo, url = %url, "Publish complete");
    Ok(PublishResult { repo, commit, url })
}

// Wire models for the repository host API.

#[derive(Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    description: &'a str,
    private: bool,
    auto_init: bool,
}

#[derive(Deserialize)]
struct CreatedRepo {
    name: String,
    owner: RepoOwner,
}

#[derive(Deserialize)]
struct RepoOwner {
    login: String,
}

#[derive(Serialize)]
struct PutFileRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
}

#[derive(Deserialize)]
struct PutFileResponse {
    commit: FileCommit,
}

#[derive(Deserialize)]
struct FileCommit {
    sha: String,
}

#[derive(Serialize)]
struct PagesRequest<'a> {
    source: PagesSource<'a>,
}

#[derive(Serialize)]
struct PagesSource<'a> {
    branch: &'a str,
    path: &'a str,
}

#[derive(Deserialize)]
struct HostErrorBody {
    message: Option<String>,
}

/// Production repository host client for the GitHub REST API.
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
}

impl GitHubClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.publish_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(GitHubClient {
            http,
            base_url: config.repo_host_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        response
            .text()
            .await
            .ok()
            .and_then(|body| serde_json::from_str::<HostErrorBody>(&body).ok())
            .and_then(|b| b.message)
            .unwrap_or_else(|| status.to_string())
    }
}

fn transport_failure(e: reqwest::Error) -> PublishError {
    if e.is_timeout() {
        PublishError::Upstream("request timed out".to_string())
    } else {
        PublishError::Upstream(format!("request failed: {e}"))
    }
}

#[async_trait]
impl RepoHost for GitHubClient {
    async fn create_repository(
        &self,
        token: &Secret,
        name: &str,
    ) -> Result<RepoId, PublishError> {
        let url = format!("{}/user/repos", self.base_url);
        let body = CreateRepoRequest {
            name,
            description: REPO_DESCRIPTION,
            private: false,
            // Creates an initial commit so the default branch exists.
            auto_init: true,
        };
        info!(repo_name = name, "Creating repository");
        let response = self
            .http
            .post(&url)
            .bearer_auth(token.expose())
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .map_err(transport_failure)?;

        match response.status() {
            StatusCode::CREATED => {
                let created: CreatedRepo = response
                    .json()
                    .await
                    .map_err(|e| PublishError::Upstream(format!("malformed response: {e}")))?;
                Ok(RepoId {
                    owner: created.owner.login,
                    name: created.name,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PublishError::Auth),
            StatusCode::UNPROCESSABLE_ENTITY => {
                let reason = Self::error_message(response).await;
                warn!(repo_name = name, reason = %reason, "Repository creation rejected");
                Err(PublishError::NameConflict {
                    name: name.to_string(),
                })
            }
            _ => Err(PublishError::Upstream(
                Self::error_message(response).await,
            )),
        }
    }

    async fn put_file(
        &self,
        token: &Secret,
        repo: &RepoId,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<String, PublishError> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.base_url, repo.owner, repo.name, path
        );
        let body = PutFileRequest {
            message,
            content: BASE64.encode(content),
            branch: PAGES_BRANCH,
        };
        info!(repo = %repo, path = path, bytes = content.len(), "Writing file");
        let response = self
            .http
            .put(&url)
            .bearer_auth(token.expose())
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .map_err(transport_failure)?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let put: PutFileResponse = response
                    .json()
                    .await
                    .map_err(|e| PublishError::Upstream(format!("malformed response: {e}")))?;
                Ok(put.commit.sha)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PublishError::Auth),
            _ => Err(PublishError::Upstream(
                Self::error_message(response).await,
            )),
        }
    }

    async fn enable_pages(&self, token: &Secret, repo: &RepoId) -> Result<(), PublishError> {
        let url = format!("{}/repos/{}/{}/pages", self.base_url, repo.owner, repo.name);
        let body = PagesRequest {
            source: PagesSource {
                branch: PAGES_BRANCH,
                path: "/",
            },
        };
        let response = self
            .http
            .post(&url)
            .bearer_auth(token.expose())
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        // 409 means pages is already enabled for the branch.
        if status.is_success() || status == StatusCode::CONFLICT {
            Ok(())
        } else {
            Err(PublishError::Upstream(
                Self::error_message(response).await,
            ))
        }
    }

    fn site_url(&self, repo: &RepoId) -> String {
        format!("https://{}.github.io/{}/", repo.owner, repo.name)
    }
}
