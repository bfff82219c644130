//! LLM configuration parsed from environment variables.

use super::types::LlmError;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_LLM_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LLM_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for LlmTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_LLM_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_LLM_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub base_url: String,
    /// Model used for image synthesis.
    pub image_model: String,
    /// Model used for text and multimodal analysis.
    pub text_model: String,
    pub timeouts: LlmTimeouts,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            timeouts: LlmTimeouts::default(),
        }
    }
}

impl LlmConfig {
    /// Build typed LLM config from environment variables.
    ///
    /// All optional:
    /// - `GEMINI_BASE_URL`: API root, default `v1beta` endpoint
    /// - `GEMINI_IMAGE_MODEL`: default `gemini-2.5-flash-image`
    /// - `GEMINI_TEXT_MODEL`: default `gemini-2.5-flash`
    /// - `LLM_REQUEST_TIMEOUT_SECS`: default 120
    /// - `LLM_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// The API key is not part of this config; it comes from the
    /// credential holder on every call.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ConfigParse`] if the base URL is not http(s) or a
    /// model name is blank.
    pub fn from_env() -> Result<Self, LlmError> {
        let base_url = parse_base_url(
            std::env::var("GEMINI_BASE_URL")
                .ok()
                .as_deref(),
        )?;
        let image_model = parse_model("GEMINI_IMAGE_MODEL", DEFAULT_IMAGE_MODEL)?;
        let text_model = parse_model("GEMINI_TEXT_MODEL", DEFAULT_TEXT_MODEL)?;
        let timeouts = LlmTimeouts {
            request_secs: env_parse_u64("LLM_REQUEST_TIMEOUT_SECS", DEFAULT_LLM_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("LLM_CONNECT_TIMEOUT_SECS", DEFAULT_LLM_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { base_url, image_model, text_model, timeouts })
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_base_url(raw: Option<&str>) -> Result<String, LlmError> {
    let url = raw.unwrap_or(DEFAULT_GEMINI_BASE_URL).trim().trim_end_matches('/');
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(LlmError::ConfigParse(format!("GEMINI_BASE_URL must be an http(s) URL, got '{url}'")));
    }
    Ok(url.to_string())
}

fn parse_model(key: &str, default: &str) -> Result<String, LlmError> {
    match std::env::var(key) {
        Ok(v) if v.trim().is_empty() => Err(LlmError::ConfigParse(format!("{key} is set but empty"))),
        Ok(v) => Ok(v.trim().to_string()),
        Err(_) => Ok(default.to_string()),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
