//! LLM types — generation request/response shapes and errors.
//!
//! Wire-compatible with the Gemini `generateContent` endpoint: a request is
//! one user turn made of ordered parts, a response is a list of candidates
//! whose parts carry either text or inline image data.

use serde::{Deserialize, Serialize};

use crate::message::InlineImage;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by LLM client operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The HTTP request to the provider failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The provider returned a non-success HTTP status.
    #[error("API response error: status {status}: {body}")]
    ApiResponse { status: u16, body: String },

    /// The provider response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The provider refused the prompt or withheld the answer.
    #[error("content blocked: {reason}")]
    Blocked { reason: String },

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::error::ErrorCode for LlmError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::ApiParse(_) => "E_API_PARSE",
            Self::Blocked { .. } => "E_CONTENT_BLOCKED",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::ApiRequest(_) | Self::ApiResponse { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// PARTS
// =============================================================================

/// One content part of a request or response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    /// Base64 image payload.
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineImage,
    },

    /// A plain text segment. `thought` marks reasoning summaries, which are
    /// not part of the answer.
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        thought: bool,
    },

    /// Any unrecognized part shape (function calls, code execution, ...).
    Unknown(serde_json::Value),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into(), thought: false }
    }

    #[must_use]
    pub fn image(image: InlineImage) -> Self {
        Self::InlineData { inline_data: image }
    }
}

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

/// One call to the generation service. Built per dispatch and discarded.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    pub api_key: &'a str,
    pub parts: Vec<Part>,
}

/// A response candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Normalized response from a generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    pub candidates: Vec<Candidate>,
    pub model_version: Option<String>,
}

impl GenerateResponse {
    /// Concatenated answer text of the first candidate, skipping thought
    /// parts. `None` when that text is empty.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let first = self.candidates.first()?;
        let text: String = first
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text, thought: false } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if text.is_empty() { None } else { Some(text) }
    }

    /// First inline image part of the first candidate.
    #[must_use]
    pub fn first_image(&self) -> Option<&InlineImage> {
        self.candidates.first()?.parts.iter().find_map(|p| match p {
            Part::InlineData { inline_data } if !inline_data.data.is_empty() => Some(inline_data),
            _ => None,
        })
    }
}

// =============================================================================
// GENERATE TRAIT
// =============================================================================

/// Provider-neutral async trait for one generation call. Enables mocking in
/// tests.
#[async_trait::async_trait]
pub trait Generate: Send + Sync {
    /// Issue exactly one call to the generation service.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the request fails, the provider answers
    /// with a non-success status, blocks the content, or the body is
    /// malformed.
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<GenerateResponse, LlmError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
