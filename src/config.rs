use std::time::Duration;

use tracing::info;

/// LLM model used for generation.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Ceiling on generated output; a one-file HTML site can be large.
pub const MAX_OUTPUT_TOKENS: u32 = 8192;

pub const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_REPO_HOST_BASE_URL: &str = "https://api.github.com";

/// Prefix for time-derived repository names.
pub const REPO_NAME_PREFIX: &str = "portfolio";

/// Branch the site is served from.
pub const PAGES_BRANCH: &str = "main";

pub const COMMIT_MESSAGE: &str = "Deploy generated portfolio";

/// Sent on every outbound request; the repository host requires one.
pub const USER_AGENT: &str = concat!("folio-press/", env!("CARGO_PKG_VERSION"));

/// Bounded-backoff policy for transient upstream failures. Owned by the
/// orchestrator; the service clients themselves never retry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first call included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// Per-invocation pipeline settings. Endpoints are overridable so tests can
/// point both clients at a local server.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub model: String,
    pub llm_base_url: String,
    pub repo_host_base_url: String,
    /// Explicit repository name; derived from the invocation time when unset.
    pub repo_name: Option<String>,
    pub repo_prefix: String,
    pub commit_message: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// Model inference is the slower call; keep this above `publish_timeout`.
    pub generate_timeout: Duration,
    pub publish_timeout: Duration,
    /// Pause between repository creation and the first contents write; the
    /// host needs a moment after auto-init before the branch accepts commits.
    pub settle_delay: Duration,
    pub enable_pages: bool,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            model: DEFAULT_MODEL.to_string(),
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            repo_host_base_url: DEFAULT_REPO_HOST_BASE_URL.to_string(),
            repo_name: None,
            repo_prefix: REPO_NAME_PREFIX.to_string(),
            commit_message: COMMIT_MESSAGE.to_string(),
            max_output_tokens: MAX_OUTPUT_TOKENS,
            temperature: 0.7,
            generate_timeout: Duration::from_secs(120),
            publish_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(2),
            enable_pages: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn trace_loaded(&self) {
        info!(
            model = %self.model,
            repo_prefix = %self.repo_prefix,
            max_attempts = self.retry.max_attempts,
            generate_timeout_secs = self.generate_timeout.as_secs(),
            publish_timeout_secs = self.publish_timeout.as_secs(),
            "Loaded pipeline config"
        );
    }
}
