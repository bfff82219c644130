//! Remote query dispatcher — one prompt in, one log message out.
//!
//! DESIGN
//! ======
//! `try_dispatch` returns `Result<Message, TurnFailure>` so the failure path
//! is an ordinary value; `dispatch` folds the error side into an
//! `error`-role message. Exactly one call to the generation service per
//! invocation, none when the credential is missing or there is nothing to
//! send. No retries.

use std::sync::Arc;

use tracing::{info, warn};

use super::classify::{RequestKind, classify};
use super::failure::{TurnFailure, normalize_error};
use crate::credential::Credential;
use crate::error::ErrorCode;
use crate::llm::Generate;
use crate::llm::config::LlmConfig;
use crate::llm::types::{GenerateResponse, GenerationRequest, Part};
use crate::message::{InlineImage, Message};

/// Caption attached to every generated image.
pub const IMAGE_CAPTION: &str = "Aqui está a imagem que você pediu:";

pub struct Dispatcher {
    llm: Arc<dyn Generate>,
    image_model: String,
    text_model: String,
}

impl Dispatcher {
    pub fn new(llm: Arc<dyn Generate>, image_model: impl Into<String>, text_model: impl Into<String>) -> Self {
        Self { llm, image_model: image_model.into(), text_model: text_model.into() }
    }

    #[must_use]
    pub fn from_config(llm: Arc<dyn Generate>, config: &LlmConfig) -> Self {
        Self::new(llm, config.image_model.clone(), config.text_model.clone())
    }

    /// Dispatch and always produce a message; failures become `error` role.
    pub async fn dispatch(&self, prompt: &str, credential: Option<&Credential>, image: Option<&InlineImage>) -> Message {
        match self.try_dispatch(prompt, credential, image).await {
            Ok(message) => message,
            Err(failure) => failure.to_message(),
        }
    }

    /// Dispatch one request.
    ///
    /// # Errors
    ///
    /// Returns the [`TurnFailure`] category when no `model` message could be
    /// produced.
    pub async fn try_dispatch(
        &self,
        prompt: &str,
        credential: Option<&Credential>,
        image: Option<&InlineImage>,
    ) -> Result<Message, TurnFailure> {
        let credential = require_credential(credential)?;
        let kind = classify(prompt, image.is_some());
        info!(?kind, prompt_len = prompt.len(), has_image = image.is_some(), "dispatch: classified");
        self.run(kind, prompt, credential, image).await
    }

    /// Dispatch a prompt whose kind is already known, bypassing keyword
    /// classification. Used by the guided flow, whose generated prompts may
    /// embed user text that happens to contain (or lack) a trigger phrase.
    pub async fn dispatch_as(&self, kind: RequestKind, prompt: &str, credential: Option<&Credential>) -> Message {
        self.try_dispatch_as(kind, prompt, credential)
            .await
            .unwrap_or_else(TurnFailure::to_message)
    }

    async fn try_dispatch_as(
        &self,
        kind: RequestKind,
        prompt: &str,
        credential: Option<&Credential>,
    ) -> Result<Message, TurnFailure> {
        let credential = require_credential(credential)?;
        info!(?kind, prompt_len = prompt.len(), "dispatch: preclassified");
        self.run(kind, prompt, credential, None).await
    }

    async fn run(
        &self,
        kind: RequestKind,
        prompt: &str,
        credential: &Credential,
        image: Option<&InlineImage>,
    ) -> Result<Message, TurnFailure> {
        let result = match kind {
            RequestKind::ImageGeneration => self.generate_image(prompt, credential).await,
            RequestKind::TextOrMultimodal => self.answer(prompt, credential, image).await,
        };
        if let Err(failure) = &result {
            warn!(?kind, code = failure.error_code(), "dispatch: turn failed");
        }
        result
    }

    async fn generate_image(&self, prompt: &str, credential: &Credential) -> Result<Message, TurnFailure> {
        let request = GenerationRequest {
            model: &self.image_model,
            api_key: credential.expose(),
            parts: vec![Part::text(prompt)],
        };
        let response = self.call(&request).await?;
        match response.first_image() {
            Some(image) => Ok(Message::model_image(IMAGE_CAPTION, image)),
            None => Err(TurnFailure::NoImageInResponse),
        }
    }

    async fn answer(
        &self,
        prompt: &str,
        credential: &Credential,
        image: Option<&InlineImage>,
    ) -> Result<Message, TurnFailure> {
        let parts = build_parts(prompt, image);
        if parts.is_empty() {
            warn!("dispatch: empty request reached the dispatcher");
            return Err(TurnFailure::EmptyTextResponse);
        }
        let request = GenerationRequest { model: &self.text_model, api_key: credential.expose(), parts };
        let response = self.call(&request).await?;
        response
            .text()
            .map(Message::model_text)
            .ok_or(TurnFailure::EmptyTextResponse)
    }

    async fn call(&self, request: &GenerationRequest<'_>) -> Result<GenerateResponse, TurnFailure> {
        self.llm.generate(request).await.map_err(|e| {
            let failure = normalize_error(&e);
            warn!(
                model = request.model,
                error = %e,
                llm_code = e.error_code(),
                retryable = e.retryable(),
                category = failure.error_code(),
                "dispatch: remote call failed"
            );
            failure
        })
    }
}

/// Gate shared by every entry point: no credential, no remote call.
fn require_credential(credential: Option<&Credential>) -> Result<&Credential, TurnFailure> {
    credential.ok_or_else(|| {
        warn!(code = TurnFailure::MissingCredential.error_code(), "dispatch: no credential, skipping call");
        TurnFailure::MissingCredential
    })
}

/// Ordered parts for an analysis request: image first, then text.
fn build_parts(prompt: &str, image: Option<&InlineImage>) -> Vec<Part> {
    let mut parts = Vec::with_capacity(2);
    if let Some(image) = image {
        parts.push(Part::image(image.clone()));
    }
    if !prompt.trim().is_empty() {
        parts.push(Part::text(prompt));
    }
    parts
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
