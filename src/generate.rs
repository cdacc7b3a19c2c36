//! Content generation: one call to the completion service per invocation,
//! followed by extraction and validation of the returned document.
//!
//! The [`CompletionClient`] trait is the seam for tests and alternative
//! providers; [`GeminiClient`] is the production implementation. Retry policy
//! lives in the orchestrator, never here.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::config::{PipelineConfig, USER_AGENT};
use crate::extract::{extract_document, Extraction};
use crate::profile::Secret;
use crate::prompt::PromptPayload;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("completion service rejected the API key")]
    Auth,
    #[error("completion service unavailable: {0}")]
    Upstream(String),
    #[error("model output is not a usable document: {0}")]
    Validation(String),
}

/// The validated HTML document plus metadata. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
    pub html: String,
    pub byte_len: usize,
    /// SHA-256 of the document text, hex encoded.
    pub content_hash: String,
    pub extraction: Extraction,
}

/// Client for the LLM service. Implementations perform exactly one outbound
/// call per `complete` invocation and classify failures; they never retry.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Request raw model output for the given prompt.
    async fn complete(&self, prompt: &str, api_key: &Secret) -> Result<String, GenerateError>;
}

/// Run the generation stage: one model call, then deterministic extraction.
pub async fn generate<C>(
    client: &C,
    payload: &PromptPayload,
    api_key: &Secret,
) -> Result<GeneratedArtifact, GenerateError>
where
    C: CompletionClient + ?Sized,
{
    info!(
        prompt_version = payload.version(),
        prompt_len = payload.text().len(),
        "Requesting document from completion service"
    );
    let raw = client.complete(payload.text(), api_key).await?;

    let (html, extraction) =
        extract_document(&raw).map_err(|e| GenerateError::Validation(e.to_string()))?;

    let content_hash = {
        let mut hasher = Sha256::new();
        hasher.update(html.as_bytes());
        format!("{:x}", hasher.finalize())
    };
    let artifact = GeneratedArtifact {
        byte_len: html.len(),
        content_hash,
        extraction,
        html,
    };
    info!(
        byte_len = artifact.byte_len,
        content_hash = %artifact.content_hash,
        extraction = ?artifact.extraction,
        "Validated generated document"
    );
    Ok(artifact)
}

// Wire models for the generateContent endpoint.

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
}

/// Production completion client for the Gemini generateContent API.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    max_output_tokens: u32,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.generate_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(GeminiClient {
            http,
            base_url: config.llm_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, prompt: &str, api_key: &Secret) -> Result<String, GenerateError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.max_output_tokens,
                temperature: self.temperature,
            },
        };

        info!(model = %self.model, "Calling completion service");
        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerateError::Upstream("request timed out".to_string())
                } else {
                    GenerateError::Upstream(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let decoded: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Upstream(format!("malformed response: {e}")))?;
        if decoded.candidates.is_empty() {
            return Err(GenerateError::Upstream(
                "response contained no candidates".to_string(),
            ));
        }
        let text: String = decoded
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        Ok(text)
    }
}

fn classify_failure(status: StatusCode, body: &str) -> GenerateError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| status.to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerateError::Auth,
        // The service reports a bad key as a 400 rather than a 401.
        StatusCode::BAD_REQUEST if message.to_ascii_lowercase().contains("api key") => {
            GenerateError::Auth
        }
        _ => GenerateError::Upstream(message),
    }
}
