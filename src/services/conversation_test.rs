use std::time::Duration;

use tokio::sync::Notify;

use super::*;
use crate::credential::MemoryStore;
use crate::llm::test_helpers::{MockGenerate, image_response, text_response};
use crate::llm::types::{LlmError, Part};
use crate::message::Role;
use crate::services::creation::{CreationForm, CreationKind};
use crate::services::failure::{IMAGE_ENCODING_TEXT, MISSING_CREDENTIAL_TEXT, NO_IMAGE_TEXT, QUOTA_EXCEEDED_TEXT};

fn keyed() -> Arc<CredentialHolder> {
    Arc::new(CredentialHolder::load(Box::new(MemoryStore::with_value("AIza-test"))).unwrap())
}

fn conversation(mock: &Arc<MockGenerate>, credentials: Arc<CredentialHolder>) -> Conversation {
    let dispatcher = Dispatcher::new(mock.clone(), "image-model", "text-model");
    Conversation::new(dispatcher, credentials).with_pacing(Duration::ZERO)
}

fn guided_request() -> GuidedRequest {
    CreationForm { topic: "Marketing Digital".into(), audience: "Iniciantes".into(), style: String::new() }
        .build(CreationKind::Course)
        .unwrap()
}

// =========================================================================
// plain turns
// =========================================================================

#[tokio::test]
async fn text_turn_appends_user_then_model() {
    let mock = Arc::new(MockGenerate::new(vec![Ok(text_response("A fotossíntese é..."))]));
    let convo = conversation(&mock, keyed());

    let appended = convo.submit("explique fotossíntese", None).await.unwrap();

    assert_eq!(appended.len(), 2);
    assert_eq!(appended[0].role(), Role::User);
    assert_eq!(appended[0].text(), Some("explique fotossíntese"));
    assert_eq!(appended[1].role(), Role::Model);
    assert_eq!(appended[1].text(), Some("A fotossíntese é..."));
    assert_eq!(convo.messages(), appended);
    assert_eq!(convo.state(), SessionState::Idle);
}

#[tokio::test]
async fn image_request_turn_appends_generated_image() {
    let mock = Arc::new(MockGenerate::new(vec![Ok(image_response("image/png", "iVBORw0KGgo="))]));
    let convo = conversation(&mock, keyed());

    let appended = convo.submit("desenhe um gato", None).await.unwrap();

    assert_eq!(appended[1].role(), Role::Model);
    assert_eq!(appended[1].image_url(), Some("data:image/png;base64,iVBORw0KGgo="));
    assert_eq!(mock.calls()[0].model, "image-model");
}

#[tokio::test]
async fn encoded_attachment_rides_on_user_message_and_request() {
    let mock = Arc::new(MockGenerate::new(vec![Ok(text_response("Um gato laranja."))]));
    let convo = conversation(&mock, keyed());
    let photo = InlineImage::new("image/jpeg", "/9j/4AAQ");

    let appended = convo
        .submit("o que é isto?", Some(Attachment::Encoded(photo.clone())))
        .await
        .unwrap();

    assert_eq!(appended[0].image_url(), Some("data:image/jpeg;base64,/9j/4AAQ"));
    assert_eq!(appended[1].text(), Some("Um gato laranja."));
    assert_eq!(mock.calls()[0].parts, vec![Part::image(photo), Part::text("o que é isto?")]);
}

#[tokio::test]
async fn remote_failure_becomes_error_message_and_releases_lock() {
    let err = LlmError::ApiResponse { status: 429, body: "RESOURCE_EXHAUSTED".into() };
    let mock = Arc::new(MockGenerate::new(vec![Err(err)]));
    let convo = conversation(&mock, keyed());

    let appended = convo.submit("explique", None).await.unwrap();

    assert_eq!(appended[1].role(), Role::Error);
    assert_eq!(appended[1].text(), Some(QUOTA_EXCEEDED_TEXT));
    assert_eq!(convo.state(), SessionState::Idle);
}

// =========================================================================
// rejections
// =========================================================================

#[tokio::test]
async fn missing_credential_rejects_without_mutation() {
    let mock = Arc::new(MockGenerate::new(vec![]));
    let convo = conversation(&mock, Arc::new(CredentialHolder::ephemeral()));

    let result = convo.submit("explique", None).await;

    assert_eq!(result, Err(SubmitRejected::MissingCredential));
    assert!(convo.is_empty());
    assert_eq!(mock.call_count(), 0);
    assert_eq!(convo.state(), SessionState::Idle);

    let notice = result.unwrap_err().notice();
    assert_eq!(notice.role(), Role::Error);
    assert_eq!(notice.text(), Some(MISSING_CREDENTIAL_TEXT));
}

#[tokio::test]
async fn empty_submission_is_rejected() {
    let mock = Arc::new(MockGenerate::new(vec![]));
    let convo = conversation(&mock, keyed());

    assert_eq!(convo.submit("   ", None).await, Err(SubmitRejected::EmptySubmission));
    assert!(convo.is_empty());
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn second_submit_while_pending_is_busy() {
    let gate = Arc::new(Notify::new());
    let mock = Arc::new(MockGenerate::gated(vec![Ok(text_response("primeira"))], gate.clone()));
    let convo = Arc::new(conversation(&mock, keyed()));

    let first = tokio::spawn({
        let convo = convo.clone();
        async move { convo.submit("explique", None).await }
    });
    while mock.call_count() == 0 {
        tokio::task::yield_now().await;
    }

    assert_eq!(convo.state(), SessionState::AwaitingResponse);
    let before = convo.len();
    assert_eq!(convo.submit("outra pergunta", None).await, Err(SubmitRejected::Busy));
    assert_eq!(convo.len(), before);

    gate.notify_one();
    let appended = first.await.unwrap().unwrap();
    assert_eq!(appended[1].text(), Some("primeira"));
    assert_eq!(mock.call_count(), 1);
    assert_eq!(convo.state(), SessionState::Idle);
}

#[tokio::test]
async fn cancelled_turn_returns_to_idle() {
    let gate = Arc::new(Notify::new());
    let mock = Arc::new(MockGenerate::gated(vec![], gate));
    let convo = conversation(&mock, keyed());

    let timed_out = tokio::time::timeout(Duration::from_millis(20), convo.submit("explique", None)).await;

    assert!(timed_out.is_err());
    assert_eq!(convo.state(), SessionState::Idle);
}

// =========================================================================
// attachment encoding
// =========================================================================

#[tokio::test]
async fn unreadable_attachment_appends_error_and_releases_lock() {
    let mock = Arc::new(MockGenerate::new(vec![]));
    let convo = conversation(&mock, keyed());
    let missing = std::env::temp_dir().join("ia-universal-missing-attachment.png");

    let appended = convo
        .submit("o que é isto?", Some(Attachment::File(missing)))
        .await
        .unwrap();

    assert_eq!(appended.len(), 2);
    assert_eq!(appended[0].role(), Role::User);
    assert!(appended[0].image_url().is_none());
    assert_eq!(appended[1].role(), Role::Error);
    assert_eq!(appended[1].text(), Some(IMAGE_ENCODING_TEXT));
    assert_eq!(mock.call_count(), 0);
    assert_eq!(convo.state(), SessionState::Idle);
}

#[tokio::test]
async fn unreadable_attachment_without_prompt_appends_only_error() {
    let mock = Arc::new(MockGenerate::new(vec![]));
    let convo = conversation(&mock, keyed());
    let dir = tempfile::tempdir().unwrap();
    let not_image = dir.path().join("notes.txt");
    std::fs::write(&not_image, "hello").unwrap();

    let appended = convo.submit("", Some(Attachment::File(not_image))).await.unwrap();

    assert_eq!(appended.len(), 1);
    assert_eq!(appended[0].text(), Some(IMAGE_ENCODING_TEXT));
}

#[tokio::test]
async fn file_attachment_is_encoded_and_sent() {
    let mock = Arc::new(MockGenerate::new(vec![Ok(text_response("Um pixel."))]));
    let convo = conversation(&mock, keyed());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pixel.png");
    std::fs::write(&path, b"\x89PNG").unwrap();

    let appended = convo.submit("", Some(Attachment::File(path))).await.unwrap();

    assert_eq!(appended[0].image_url(), Some("data:image/png;base64,iVBORw=="));
    assert_eq!(mock.calls()[0].parts, vec![Part::image(InlineImage::new("image/png", "iVBORw=="))]);
}

// =========================================================================
// guided flow
// =========================================================================

#[tokio::test]
async fn guided_flow_appends_title_cover_and_body() {
    let mock = Arc::new(MockGenerate::new(vec![
        Ok(image_response("image/png", "AAAA")),
        Ok(text_response("# Curso de Marketing")),
    ]));
    let convo = conversation(&mock, keyed());
    let request = guided_request();

    let appended = convo.submit_guided(&request).await.unwrap();

    assert_eq!(appended.len(), 3);
    assert_eq!(appended[0].role(), Role::User);
    assert_eq!(appended[0].text(), Some("Criar Curso: Marketing Digital"));
    assert_eq!(appended[1].image_url(), Some("data:image/png;base64,AAAA"));
    assert_eq!(appended[2].text(), Some("# Curso de Marketing"));

    let calls = mock.calls();
    assert_eq!(calls[0].model, "image-model");
    assert_eq!(calls[0].parts, vec![Part::text(request.image_prompt.as_str())]);
    assert_eq!(calls[1].model, "text-model");
    assert_eq!(calls[1].parts, vec![Part::text(request.text_prompt.as_str())]);
    assert_eq!(convo.state(), SessionState::Idle);
}

#[tokio::test]
async fn guided_flow_continues_after_cover_failure() {
    let mock = Arc::new(MockGenerate::new(vec![
        Ok(text_response("sem imagem")),
        Ok(text_response("# Conteúdo")),
    ]));
    let convo = conversation(&mock, keyed());

    let appended = convo.submit_guided(&guided_request()).await.unwrap();

    assert_eq!(appended.len(), 3);
    assert_eq!(appended[1].role(), Role::Error);
    assert_eq!(appended[1].text(), Some(NO_IMAGE_TEXT));
    assert_eq!(appended[2].role(), Role::Model);
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn guided_flow_without_credential_is_rejected() {
    let mock = Arc::new(MockGenerate::new(vec![]));
    let convo = conversation(&mock, Arc::new(CredentialHolder::ephemeral()));

    assert_eq!(convo.submit_guided(&guided_request()).await, Err(SubmitRejected::MissingCredential));
    assert!(convo.is_empty());
}

#[tokio::test]
async fn guided_topic_with_keyword_still_routes_body_to_text_model() {
    let mock = Arc::new(MockGenerate::new(vec![]));
    let convo = conversation(&mock, keyed());
    let request = CreationForm { topic: "Gerenciamento de Projetos".into(), audience: "Gestores".into(), style: String::new() }
        .build(CreationKind::Ebook)
        .unwrap();

    convo.submit_guided(&request).await.unwrap();

    assert_eq!(mock.calls()[1].model, "text-model");
}

// =========================================================================
// observation
// =========================================================================

#[tokio::test]
async fn subscribers_see_each_append() {
    let mock = Arc::new(MockGenerate::new(vec![]));
    let convo = conversation(&mock, keyed());
    let mut rx = convo.subscribe();

    convo.submit("olá", None).await.unwrap();

    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), 2);
    assert_eq!(convo.messages_since(1).len(), 1);
    assert!(convo.messages_since(10).is_empty());
}

#[test]
fn greeting_seeds_the_log() {
    let mock = Arc::new(MockGenerate::new(vec![]));
    let convo = conversation(&mock, keyed()).with_greeting();
    let messages = convo.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role(), Role::Model);
    assert_eq!(messages[0].text(), Some(GREETING));
}

#[test]
fn rejection_codes() {
    assert_eq!(SubmitRejected::Busy.error_code(), "E_BUSY");
    assert!(SubmitRejected::Busy.retryable());
    assert!(!SubmitRejected::MissingCredential.retryable());
}
