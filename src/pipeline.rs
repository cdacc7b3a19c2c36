//! Pipeline orchestration: Compile → Generate → Publish.
//!
//! The orchestrator sequences the stages in that fixed order, short-circuits
//! on the first failure, owns the sole retry policy, and is the only place
//! component errors are translated into the caller-visible outcome set. No
//! stage re-enters an earlier one once Publishing has begun.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::generate::{generate, CompletionClient, GenerateError, GeneratedArtifact};
use crate::profile::{Credentials, UserProfile};
use crate::prompt::{compile, PromptPayload};
use crate::publish::{
    derive_repo_name, publish, PublishError, PublishOptions, PublishResult, RepoHost, RepoId,
};

/// Where in the pipeline an outcome was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Generate,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Compile => "compile",
            Stage::Generate => "generate",
            Stage::Publish => "publish",
        })
    }
}

/// Caller-visible failure. A plain error guarantees the invocation created
/// no repository; a created repository is only ever reported through
/// [`Publication::Partial`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request itself is wrong; caught before any external call.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
    /// A credential was rejected. Never retried; the message never carries
    /// the secret.
    #[error("{stage}: credentials were rejected")]
    Auth { stage: Stage },
    /// A service stayed unavailable through the bounded retries.
    #[error("{stage}: upstream failed after {attempts} attempt(s): {reason}")]
    Upstream {
        stage: Stage,
        attempts: u32,
        reason: String,
    },
    /// The model produced output with no usable document. Retrying the same
    /// prompt without caller intervention is pointless.
    #[error("generated document failed validation: {reason}")]
    Validation { reason: String },
    /// The requested repository name is taken; surfaced for a caller
    /// decision, never auto-renamed.
    #[error("repository name '{name}' is already taken")]
    NameConflict { name: String },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::InvalidInput { .. } => Stage::Compile,
            PipelineError::Auth { stage } | PipelineError::Upstream { stage, .. } => *stage,
            PipelineError::Validation { .. } => Stage::Generate,
            PipelineError::NameConflict { .. } => Stage::Publish,
        }
    }
}

/// Repository created, site commit missing. Distinct from both success and
/// failure so callers can branch on it deliberately.
#[derive(Debug, Clone)]
pub struct PartialPublish {
    pub repo: RepoId,
    pub reason: String,
}

/// Terminal outcome of a pipeline invocation.
#[derive(Debug, Clone)]
pub enum Publication {
    Complete(PublishResult),
    Partial(PartialPublish),
}

/// One configured pipeline. Supports any number of invocations; each `run`
/// owns its payload, artifact and outcome, so concurrent invocations share
/// no mutable state.
pub struct Pipeline<C, H> {
    llm: Arc<C>,
    host: Arc<H>,
    config: PipelineConfig,
}

impl<C, H> Pipeline<C, H>
where
    C: CompletionClient + 'static,
    H: RepoHost + 'static,
{
    pub fn new(llm: C, host: H, config: PipelineConfig) -> Self {
        Pipeline {
            llm: Arc::new(llm),
            host: Arc::new(host),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline for one profile.
    ///
    /// Credentials are borrowed for the duration of the call chain and
    /// dropped on return; they are never stored or logged.
    pub async fn run(
        &self,
        profile: &UserProfile,
        creds: &Credentials,
    ) -> Result<Publication, PipelineError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, "Pipeline started");

        // Compile stage: the cheapest possible failures, caught before any
        // network round trip is spent.
        if creds.api_key.is_empty() {
            return Err(PipelineError::InvalidInput {
                reason: "LLM API key must not be empty".to_string(),
            });
        }
        if creds.token.is_empty() {
            return Err(PipelineError::InvalidInput {
                reason: "access token must not be empty".to_string(),
            });
        }
        let payload = compile(profile).map_err(|e| PipelineError::InvalidInput {
            reason: e.to_string(),
        })?;
        info!(%run_id, prompt_version = payload.version(), "Compiled prompt");

        let artifact = self
            .generate_with_retry(run_id, &payload, creds)
            .await?;

        let name = self
            .config
            .repo_name
            .clone()
            .unwrap_or_else(|| derive_repo_name(&self.config.repo_prefix, Utc::now()));

        self.publish_with_retry(run_id, artifact, creds, name).await
    }

    async fn generate_with_retry(
        &self,
        run_id: Uuid,
        payload: &PromptPayload,
        creds: &Credentials,
    ) -> Result<GeneratedArtifact, PipelineError> {
        let retry = &self.config.retry;
        let mut delay = retry.initial_delay;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match generate(self.llm.as_ref(), payload, &creds.api_key).await {
                Ok(artifact) => return Ok(artifact),
                Err(GenerateError::Upstream(reason)) if attempt < retry.max_attempts => {
                    warn!(
                        %run_id,
                        attempt,
                        reason = %reason,
                        delay_ms = delay.as_millis() as u64,
                        "Generation hit a transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.mul_f64(retry.backoff_multiplier).min(retry.max_delay);
                }
                Err(GenerateError::Upstream(reason)) => {
                    error!(%run_id, attempts = attempt, reason = %reason, "Generation failed after retries");
                    return Err(PipelineError::Upstream {
                        stage: Stage::Generate,
                        attempts: attempt,
                        reason,
                    });
                }
                Err(GenerateError::Auth) => {
                    return Err(PipelineError::Auth {
                        stage: Stage::Generate,
                    })
                }
                Err(GenerateError::Validation(reason)) => {
                    return Err(PipelineError::Validation { reason })
                }
            }
        }
    }

    async fn publish_with_retry(
        &self,
        run_id: Uuid,
        artifact: GeneratedArtifact,
        creds: &Credentials,
        name: String,
    ) -> Result<Publication, PipelineError> {
        let opts = PublishOptions {
            commit_message: self.config.commit_message.clone(),
            settle_delay: self.config.settle_delay,
            enable_pages: self.config.enable_pages,
        };
        let retry = &self.config.retry;
        let mut delay = retry.initial_delay;
        let mut attempt = 0;
        loop {
            attempt += 1;
            // Spawned so the creation-to-commit window always runs to
            // completion (or an explicit partial), even if the caller
            // abandons the invocation mid-publish.
            let host = Arc::clone(&self.host);
            let task_artifact = artifact.clone();
            let token = creds.token.clone();
            let task_name = name.clone();
            let task_opts = opts.clone();
            let handle = tokio::spawn(async move {
                publish(
                    host.as_ref(),
                    &task_artifact,
                    &token,
                    &task_name,
                    &task_opts,
                )
                .await
            });
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(%run_id, error = %e, "Publish task aborted");
                    return Err(PipelineError::Upstream {
                        stage: Stage::Publish,
                        attempts: attempt,
                        reason: "publish task aborted".to_string(),
                    });
                }
            };
            match outcome {
                Ok(result) => {
                    info!(%run_id, url = %result.url, "Pipeline succeeded");
                    return Ok(Publication::Complete(result));
                }
                // Never retried: the repository already exists and a second
                // commit attempt risks duplicate or divergent content.
                Err(PublishError::Partial { repo, reason }) => {
                    warn!(%run_id, repo = %repo, reason = %reason, "Pipeline ended partially published");
                    return Ok(Publication::Partial(PartialPublish { repo, reason }));
                }
                Err(PublishError::Upstream(reason)) if attempt < retry.max_attempts => {
                    warn!(
                        %run_id,
                        attempt,
                        reason = %reason,
                        delay_ms = delay.as_millis() as u64,
                        "Publish hit a transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.mul_f64(retry.backoff_multiplier).min(retry.max_delay);
                }
                Err(PublishError::Upstream(reason)) => {
                    error!(%run_id, attempts = attempt, reason = %reason, "Publish failed after retries");
                    return Err(PipelineError::Upstream {
                        stage: Stage::Publish,
                        attempts: attempt,
                        reason,
                    });
                }
                Err(PublishError::Auth) => {
                    return Err(PipelineError::Auth {
                        stage: Stage::Publish,
                    })
                }
                Err(PublishError::NameConflict { name }) => {
                    return Err(PipelineError::NameConflict { name })
                }
            }
        }
    }
}
