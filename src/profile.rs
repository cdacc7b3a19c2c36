use std::fmt;

use serde::Deserialize;
use tracing::info;

/// The bundle of personal data one pipeline invocation turns into a site.
///
/// Owned by the caller; the pipeline reads it without retaining a reference.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    /// Short personal bio. Required, must be non-empty after trimming.
    pub bio: String,
    /// Ordered list of URLs to surface on the site. May be empty.
    #[serde(default)]
    pub links: Vec<String>,
    /// Free-text style descriptor. Required, must be non-empty after trimming.
    pub aesthetic: String,
    /// Optional colour-theme hint (e.g. "Dark & Minimal").
    #[serde(default)]
    pub color_theme: Option<String>,
    /// Optional layout hint (e.g. "Single Page").
    #[serde(default)]
    pub layout: Option<String>,
}

impl UserProfile {
    pub fn trace_loaded(&self) {
        info!(
            bio_len = self.bio.trim().len(),
            links_count = self.links.len(),
            aesthetic = %self.aesthetic.trim(),
            "Loaded user profile"
        );
    }
}

/// An opaque secret value. Redacted in Debug output; never serialized.
///
/// Secrets are threaded through the call chain as explicit parameters and
/// dropped when the invocation returns.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(raw: impl Into<String>) -> Self {
        Secret(raw.into())
    }

    /// The raw value, for handing to an HTTP client. Do not log.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

/// Per-invocation credentials for the two external services.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// LLM service API key.
    pub api_key: Secret,
    /// Source-control host access token (needs repo scope).
    pub token: Secret,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, token: impl Into<String>) -> Self {
        Credentials {
            api_key: Secret::new(api_key),
            token: Secret::new(token),
        }
    }
}
