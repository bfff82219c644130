//! Gemini `generateContent` client.
//!
//! Thin HTTP wrapper for `POST {base}/models/{model}:generateContent`.
//! The API key travels in the `x-goog-api-key` header, never in the URL, so
//! it cannot leak into request-failure messages. Pure parsing in
//! `parse_response` for testability.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::{LlmConfig, LlmTimeouts};
use super::types::{Candidate, GenerateResponse, GenerationRequest, LlmError, Part};

const API_KEY_HEADER: &str = "x-goog-api-key";

// =============================================================================
// CLIENT
// =============================================================================

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    /// Build a client against `base_url` with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::HttpClientBuild`] if the TLS backend fails to
    /// initialize.
    pub fn new(base_url: impl Into<String>, timeouts: LlmTimeouts) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.into() })
    }

    /// Build a client from a parsed typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Self::new(config.base_url.clone(), config.timeouts)
    }

    async fn generate_content(&self, request: &GenerationRequest<'_>) -> Result<GenerateResponse, LlmError> {
        let url = endpoint(&self.base_url, request.model);
        let body = build_request(&request.parts);

        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, request.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::ApiRequest(e.without_url().to_string()))?;

        debug!(model = request.model, status, body_len = text.len(), "gemini: response received");

        if status != 200 {
            return Err(LlmError::ApiResponse { status, body: text });
        }

        parse_response(&text)
    }
}

#[async_trait::async_trait]
impl super::types::Generate for GeminiClient {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<GenerateResponse, LlmError> {
        self.generate_content(request).await
    }
}

fn endpoint(base_url: &str, model: &str) -> String {
    format!("{base_url}/models/{model}:generateContent")
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct ApiRequest<'a> {
    contents: [ApiContent<'a>; 1],
}

#[derive(Serialize)]
struct ApiContent<'a> {
    role: &'static str,
    parts: &'a [Part],
}

fn build_request(parts: &[Part]) -> ApiRequest<'_> {
    ApiRequest { contents: [ApiContent { role: "user", parts }] }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiCandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiCandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Finish reasons that mean the answer was withheld by a content filter.
const BLOCKING_FINISH_REASONS: &[&str] =
    &["SAFETY", "RECITATION", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII", "IMAGE_SAFETY"];

// =============================================================================
// PARSING
// =============================================================================

fn parse_response(json: &str) -> Result<GenerateResponse, LlmError> {
    let api: ApiResponse = serde_json::from_str(json).map_err(|e| LlmError::ApiParse(e.to_string()))?;

    if let Some(reason) = api.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(LlmError::Blocked { reason });
    }

    let candidates: Vec<Candidate> = api
        .candidates
        .into_iter()
        .map(|c| Candidate {
            parts: c
                .content
                .map(|content| content.parts)
                .unwrap_or_default()
                .into_iter()
                .filter(|p| !matches!(p, Part::Unknown(_)))
                .collect(),
            finish_reason: c.finish_reason,
        })
        .collect();

    // A filtered candidate arrives with a finish reason and no parts.
    if let Some(first) = candidates.first() {
        if first.parts.is_empty() {
            if let Some(reason) = first
                .finish_reason
                .as_deref()
                .filter(|r| BLOCKING_FINISH_REASONS.contains(r))
            {
                return Err(LlmError::Blocked { reason: reason.to_string() });
            }
        }
    }

    Ok(GenerateResponse { candidates, model_version: api.model_version })
}

#[cfg(test)]
#[path = "gemini_test.rs"]
mod tests;
