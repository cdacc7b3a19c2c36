use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{error, info};

use crate::profile::{Credentials, UserProfile};

/// Environment variable carrying the LLM service API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Environment variable carrying the source-control host access token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Deserialize)]
struct StaticConfig {
    profile: UserProfile,
}

/// Loads a static YAML profile file (no secrets) and injects required env
/// vars for the credentials. Returns the profile and per-invocation
/// credentials, or an error naming what was missing.
pub fn load_profile<P: AsRef<Path>>(path: P) -> Result<(UserProfile, Credentials)> {
    let path_ref = path.as_ref();
    info!(profile_path = ?path_ref, "Loading profile from file");

    let content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(profile_path = ?path_ref, "Profile file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, profile_path = ?path_ref, "Failed to read profile file");
            return Err(anyhow::anyhow!(
                "Failed to read profile file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let static_conf: StaticConfig = match serde_yaml::from_str(&content) {
        Ok(conf) => {
            info!(profile_path = ?path_ref, "Parsed profile YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, profile_path = ?path_ref, "Failed to parse profile YAML");
            return Err(anyhow::anyhow!("Failed to parse profile YAML: {e}"));
        }
    };

    let api_key = std::env::var(API_KEY_ENV).with_context(|| {
        error!("{} environment variable not set", API_KEY_ENV);
        format!("{API_KEY_ENV} environment variable not set")
    })?;
    info!(key_present = !api_key.trim().is_empty(), "{} found in env", API_KEY_ENV);

    let token = std::env::var(TOKEN_ENV).with_context(|| {
        error!("{} environment variable not set", TOKEN_ENV);
        format!("{TOKEN_ENV} environment variable not set")
    })?;
    info!(token_present = !token.trim().is_empty(), "{} found in env", TOKEN_ENV);

    static_conf.profile.trace_loaded();
    Ok((static_conf.profile, Credentials::new(api_key, token)))
}
