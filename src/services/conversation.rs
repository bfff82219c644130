//! Conversation orchestrator — owns the message log and the turn state.
//!
//! DESIGN
//! ======
//! Two states, `Idle` and `AwaitingResponse`. A turn starts by taking the
//! state flag through `begin_turn`, which checks every guard under one lock
//! and hands back a `TurnGuard`; dropping the guard returns the session to
//! `Idle` on every exit path, including image-encoding failures and
//! cancelled futures. The log and the flag are only mutated here.
//!
//! Within a turn, the user message is appended before any dispatch starts,
//! and in the guided flow the cover result is appended before the text
//! stage is dispatched. Appends notify a `watch` channel carrying the log
//! length so a front end can re-render as results arrive.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use super::classify::RequestKind;
use super::creation::GuidedRequest;
use super::dispatch::Dispatcher;
use super::failure::TurnFailure;
use crate::credential::{Credential, CredentialHolder};
use crate::error::ErrorCode;
use crate::message::{InlineImage, Message};

/// Cosmetic pause between the two guided-flow stages.
pub const DEFAULT_GUIDED_PACING: Duration = Duration::from_millis(500);

pub const GREETING: &str = "Olá! Eu sou sua IA Universal. Como posso te ajudar hoje? Você pode me fazer perguntas, \
pedir para eu analisar uma imagem, criar imagens, ou usar as ferramentas para criar Cursos e E-books completos \
(com capa e conteúdo).";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingResponse,
}

/// Why a submission was refused. A refused submission never touches the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejected {
    #[error("a response is still pending")]
    Busy,
    #[error("no API credential configured")]
    MissingCredential,
    #[error("nothing to send")]
    EmptySubmission,
}

impl SubmitRejected {
    /// The `error`-role message a front end shows for this rejection. It is
    /// never appended to the log.
    #[must_use]
    pub fn notice(self) -> Message {
        match self {
            Self::Busy => Message::error("Aguarde a resposta anterior."),
            Self::MissingCredential => TurnFailure::MissingCredential.to_message(),
            Self::EmptySubmission => Message::error("Digite uma mensagem ou anexe uma imagem."),
        }
    }
}

impl ErrorCode for SubmitRejected {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Busy => "E_BUSY",
            Self::MissingCredential => "E_MISSING_CREDENTIAL",
            Self::EmptySubmission => "E_EMPTY_SUBMISSION",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// Image attached to a user turn.
#[derive(Debug, Clone)]
pub enum Attachment {
    /// Already base64-encoded.
    Encoded(InlineImage),
    /// A local file, encoded once the turn has started.
    File(PathBuf),
}

// =============================================================================
// CONVERSATION
// =============================================================================

pub struct Conversation {
    dispatcher: Dispatcher,
    credentials: Arc<CredentialHolder>,
    log: Mutex<Vec<Message>>,
    state: Mutex<SessionState>,
    appended: watch::Sender<usize>,
    pacing: Duration,
}

impl Conversation {
    #[must_use]
    pub fn new(dispatcher: Dispatcher, credentials: Arc<CredentialHolder>) -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            dispatcher,
            credentials,
            log: Mutex::new(Vec::new()),
            state: Mutex::new(SessionState::Idle),
            appended,
            pacing: DEFAULT_GUIDED_PACING,
        }
    }

    /// Override the pause between guided-flow stages (zero disables it).
    #[must_use]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Seed the log with the welcome message.
    #[must_use]
    pub fn with_greeting(self) -> Self {
        self.append(Message::model_text(GREETING));
        self
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialHolder> {
        &self.credentials
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Snapshot of the log in display order.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.lock_log().clone()
    }

    /// Messages from index `from` onwards.
    #[must_use]
    pub fn messages_since(&self, from: usize) -> Vec<Message> {
        self.lock_log()
            .get(from..)
            .map(<[Message]>::to_vec)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_log().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_log().is_empty()
    }

    /// Receiver of the log length, bumped on every append.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.appended.subscribe()
    }

    /// Submit one user turn and wait for its single result message.
    ///
    /// Returns the messages this turn appended: the user message followed by
    /// the model or error message.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitRejected`] without touching the log when a turn is
    /// already in flight, no credential is configured, or both prompt and
    /// attachment are absent.
    pub async fn submit(&self, prompt: &str, attachment: Option<Attachment>) -> Result<Vec<Message>, SubmitRejected> {
        let (_turn, credential) = self.begin_turn(prompt.trim().is_empty() && attachment.is_none())?;
        info!(prompt_len = prompt.len(), has_attachment = attachment.is_some(), "chat: turn submitted");
        let start = self.len();

        let image = match attachment {
            None => None,
            Some(Attachment::Encoded(image)) => Some(image),
            Some(Attachment::File(path)) => match crate::image::encode_file(&path).await {
                Ok(image) => Some(image),
                Err(e) => {
                    let failure = TurnFailure::ImageEncodingFailure;
                    warn!(error = %e, code = failure.error_code(), "chat: attachment encoding failed");
                    if let Some(user) = Message::user(prompt, None) {
                        self.append(user);
                    }
                    self.append(failure.to_message());
                    return Ok(self.messages_since(start));
                }
            },
        };

        let Some(user) = Message::user(prompt, image.as_ref()) else {
            // begin_turn rejected the empty case.
            return Ok(Vec::new());
        };
        self.append(user);

        let reply = self
            .dispatcher
            .dispatch(prompt, Some(&credential), image.as_ref())
            .await;
        self.append(reply);

        info!(appended = self.len() - start, "chat: turn complete");
        Ok(self.messages_since(start))
    }

    /// Run the two-stage guided creation flow: cover image, then long-form
    /// text, under one user-visible turn.
    ///
    /// Always appends exactly three messages: the title, the cover result and
    /// the text result. A failed cover stage does not stop the text stage.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitRejected`] without touching the log when a turn is
    /// already in flight or no credential is configured.
    pub async fn submit_guided(&self, request: &GuidedRequest) -> Result<Vec<Message>, SubmitRejected> {
        let (_turn, credential) = self.begin_turn(request.title.trim().is_empty())?;
        info!(title = %request.title, "chat: guided turn submitted");
        let start = self.len();

        let Some(user) = Message::user(&request.title, None) else {
            return Ok(Vec::new());
        };
        self.append(user);

        let cover = self
            .dispatcher
            .dispatch_as(RequestKind::ImageGeneration, &request.image_prompt, Some(&credential))
            .await;
        self.append(cover);

        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }

        let body = self
            .dispatcher
            .dispatch_as(RequestKind::TextOrMultimodal, &request.text_prompt, Some(&credential))
            .await;
        self.append(body);

        info!(appended = self.len() - start, "chat: guided turn complete");
        Ok(self.messages_since(start))
    }

    /// Check every guard and flip to `AwaitingResponse` atomically.
    fn begin_turn(&self, empty: bool) -> Result<(TurnGuard<'_>, Credential), SubmitRejected> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let verdict = if *state == SessionState::AwaitingResponse {
            Err(SubmitRejected::Busy)
        } else if empty {
            Err(SubmitRejected::EmptySubmission)
        } else {
            self.credentials
                .current()
                .ok_or(SubmitRejected::MissingCredential)
        };
        match verdict {
            Ok(credential) => {
                *state = SessionState::AwaitingResponse;
                Ok((TurnGuard { state: &self.state }, credential))
            }
            Err(rejected) => {
                info!(code = rejected.error_code(), "chat: submission rejected");
                Err(rejected)
            }
        }
    }

    fn append(&self, message: Message) {
        let len = {
            let mut log = self.lock_log();
            log.push(message);
            log.len()
        };
        self.appended.send_replace(len);
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, Vec<Message>> {
        self.log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Returns the session to `Idle` when dropped.
struct TurnGuard<'a> {
    state: &'a Mutex<SessionState>,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = SessionState::Idle;
    }
}

#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;
