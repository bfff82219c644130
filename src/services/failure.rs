//! Turn failures — the user-facing error taxonomy and the normalizer that
//! maps raw remote failures onto it.
//!
//! DESIGN
//! ======
//! Remote failures carry no reliable structured code, so `normalize`
//! inspects the failure text. Checks run in order: quota first, then
//! content blocking, then a generic fallback. The raw text is never shown
//! to the user; callers log it instead.

use crate::error::ErrorCode;
use crate::message::Message;

pub const MISSING_CREDENTIAL_TEXT: &str =
    "A chave da API do Google não foi fornecida. Por favor, configure-a para continuar.";
pub const IMAGE_ENCODING_TEXT: &str = "Desculpe, houve um erro ao processar sua imagem.";
pub const NO_IMAGE_TEXT: &str = "Desculpe, não consegui gerar uma imagem com esse prompt.";
pub const EMPTY_TEXT_RESPONSE_TEXT: &str = "Desculpe, não recebi uma resposta válida. Tente novamente.";
pub const QUOTA_EXCEEDED_TEXT: &str =
    "Você atingiu o limite de uso da API. Aguarde cerca de um minuto e tente novamente.";
pub const CONTENT_BLOCKED_TEXT: &str =
    "Sua solicitação foi bloqueada pelos filtros de segurança da IA. Tente reformular o pedido.";
pub const UNKNOWN_TEXT: &str = "Ocorreu um erro ao comunicar com a IA. Tente novamente mais tarde.";

const QUOTA_SIGNATURES: &[&str] = &["429", "RESOURCE_EXHAUSTED", "quota"];
const BLOCKED_SIGNATURES: &[&str] = &["SAFETY", "blocked"];

/// Why a turn produced an `error` message instead of a `model` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TurnFailure {
    #[error("{}", MISSING_CREDENTIAL_TEXT)]
    MissingCredential,
    #[error("{}", IMAGE_ENCODING_TEXT)]
    ImageEncodingFailure,
    #[error("{}", NO_IMAGE_TEXT)]
    NoImageInResponse,
    #[error("{}", EMPTY_TEXT_RESPONSE_TEXT)]
    EmptyTextResponse,
    #[error("{}", QUOTA_EXCEEDED_TEXT)]
    QuotaExceeded,
    #[error("{}", CONTENT_BLOCKED_TEXT)]
    ContentBlocked,
    #[error("{}", UNKNOWN_TEXT)]
    Unknown,
}

impl TurnFailure {
    /// Fixed user-facing text for this category.
    #[must_use]
    pub fn display_text(self) -> &'static str {
        match self {
            Self::MissingCredential => MISSING_CREDENTIAL_TEXT,
            Self::ImageEncodingFailure => IMAGE_ENCODING_TEXT,
            Self::NoImageInResponse => NO_IMAGE_TEXT,
            Self::EmptyTextResponse => EMPTY_TEXT_RESPONSE_TEXT,
            Self::QuotaExceeded => QUOTA_EXCEEDED_TEXT,
            Self::ContentBlocked => CONTENT_BLOCKED_TEXT,
            Self::Unknown => UNKNOWN_TEXT,
        }
    }

    /// The `error`-role log entry for this failure.
    #[must_use]
    pub fn to_message(self) -> Message {
        Message::error(self.display_text())
    }
}

impl ErrorCode for TurnFailure {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "E_MISSING_CREDENTIAL",
            Self::ImageEncodingFailure => "E_IMAGE_ENCODING",
            Self::NoImageInResponse => "E_NO_IMAGE_IN_RESPONSE",
            Self::EmptyTextResponse => "E_EMPTY_TEXT_RESPONSE",
            Self::QuotaExceeded => "E_QUOTA_EXCEEDED",
            Self::ContentBlocked => "E_CONTENT_BLOCKED",
            Self::Unknown => "E_UNKNOWN",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::QuotaExceeded | Self::EmptyTextResponse | Self::Unknown)
    }
}

/// Classify a raw remote failure by its message content.
#[must_use]
pub fn normalize(raw: &str) -> TurnFailure {
    if QUOTA_SIGNATURES.iter().any(|s| raw.contains(s)) {
        TurnFailure::QuotaExceeded
    } else if BLOCKED_SIGNATURES.iter().any(|s| raw.contains(s)) {
        TurnFailure::ContentBlocked
    } else {
        TurnFailure::Unknown
    }
}

/// [`normalize`] over any displayable error.
#[must_use]
pub fn normalize_error(err: &dyn std::fmt::Display) -> TurnFailure {
    normalize(&err.to_string())
}

#[cfg(test)]
#[path = "failure_test.rs"]
mod tests;
