//! Conversation log entries.
//!
//! DESIGN
//! ======
//! A `Message` is immutable once built. Fields are private and the only
//! constructors are the role-specific ones below, each of which sets at
//! least one of `text`/`image_url`, so an empty message can never reach
//! the log.

use serde::{Deserialize, Serialize};

// =============================================================================
// ROLE
// =============================================================================

/// Author of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    Error,
}

// =============================================================================
// INLINE IMAGE
// =============================================================================

/// Base64-encoded image bytes plus MIME type.
///
/// Serializes in the remote service's `inlineData` shape
/// (`{ "mimeType": ..., "data": ... }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self { mime_type: mime_type.into(), data: data.into() }
    }

    /// Self-contained `data:<mime>;base64,<payload>` reference.
    #[must_use]
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Inverse of [`InlineImage::data_uri`]. Returns `None` for anything that
    /// is not a base64 data URI with a non-empty payload.
    #[must_use]
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let (mime_type, data) = rest.split_once(";base64,")?;
        if mime_type.is_empty() || data.is_empty() {
            return None;
        }
        Some(Self::new(mime_type, data))
    }
}

// =============================================================================
// MESSAGE
// =============================================================================

/// One entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
}

impl Message {
    /// User turn. A blank prompt is dropped from `text`; returns `None` when
    /// neither text nor image is present.
    #[must_use]
    pub fn user(prompt: &str, image: Option<&InlineImage>) -> Option<Self> {
        let text = non_blank(prompt);
        let image_url = image.map(InlineImage::data_uri);
        if text.is_none() && image_url.is_none() {
            return None;
        }
        Some(Self { role: Role::User, text, image_url })
    }

    /// Model prose.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self { role: Role::Model, text: Some(text.into()), image_url: None }
    }

    /// Model-generated image with a caption.
    pub fn model_image(caption: impl Into<String>, image: &InlineImage) -> Self {
        Self { role: Role::Model, text: Some(caption.into()), image_url: Some(image.data_uri()) }
    }

    /// User-facing failure explanation.
    pub fn error(text: impl Into<String>) -> Self {
        Self { role: Role::Error, text: Some(text.into()), image_url: None }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}

fn non_blank(s: &str) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s.to_string()) }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
