use std::sync::Arc;

use super::*;
use crate::credential::{CredentialHolder, MemoryStore};
use crate::llm::test_helpers::{MockGenerate, image_response, text_response};
use crate::services::dispatch::Dispatcher;

// =========================================================================
// parse_command
// =========================================================================

#[test]
fn plain_text_is_a_prompt() {
    assert_eq!(parse_command("  explique fotossíntese ").unwrap(), Command::Say("explique fotossíntese".into()));
}

#[test]
fn blank_line_is_empty() {
    assert_eq!(parse_command("   ").unwrap(), Command::Empty);
}

#[test]
fn image_command_takes_quoted_path_and_prompt() {
    let cmd = parse_command(r#"/imagem "fotos/meu gato.png" o que é isto?"#).unwrap();
    assert_eq!(
        cmd,
        Command::Attach { path: PathBuf::from("fotos/meu gato.png"), prompt: "o que é isto?".into() }
    );
}

#[test]
fn image_command_without_prompt() {
    let cmd = parse_command("/image foto.jpg").unwrap();
    assert_eq!(cmd, Command::Attach { path: PathBuf::from("foto.jpg"), prompt: String::new() });
}

#[test]
fn image_prompt_is_kept_as_typed() {
    let cmd = parse_command("/imagem foto.png what's in this picture?").unwrap();
    assert_eq!(cmd, Command::Attach { path: PathBuf::from("foto.png"), prompt: "what's in this picture?".into() });

    let cmd = parse_command(r#"/imagem foto.png traduza "bom dia"   agora"#).unwrap();
    assert_eq!(
        cmd,
        Command::Attach { path: PathBuf::from("foto.png"), prompt: r#"traduza "bom dia"   agora"#.into() }
    );
}

#[test]
fn image_path_may_use_escapes_and_single_quotes() {
    let cmd = parse_command(r"/imagem meu\ gato.png o que é?").unwrap();
    assert_eq!(cmd, Command::Attach { path: PathBuf::from("meu gato.png"), prompt: "o que é?".into() });

    let cmd = parse_command("/imagem 'dia d.jpg' e isto?").unwrap();
    assert_eq!(cmd, Command::Attach { path: PathBuf::from("dia d.jpg"), prompt: "e isto?".into() });
}

#[test]
fn image_command_requires_path() {
    assert!(matches!(parse_command("/imagem"), Err(CommandError::MissingPath)));
    assert!(matches!(parse_command(r#"/imagem "" texto"#), Err(CommandError::MissingPath)));
}

#[test]
fn unbalanced_quote_is_malformed() {
    assert!(matches!(parse_command(r#"/imagem "sem fim.png"#), Err(CommandError::Malformed(_))));
}

#[test]
fn aliases_map_to_same_command() {
    for (line, expected) in [
        ("/curso", Command::Create(CreationKind::Course)),
        ("/course", Command::Create(CreationKind::Course)),
        ("/ebook", Command::Create(CreationKind::Ebook)),
        ("/chave", Command::ChangeKey),
        ("/KEY", Command::ChangeKey),
        ("/ajuda", Command::Help),
        ("/sair", Command::Quit),
        ("/exit", Command::Quit),
    ] {
        assert_eq!(parse_command(line).unwrap(), expected, "{line}");
    }
}

#[test]
fn unknown_command_is_reported() {
    let err = parse_command("/voar alto").unwrap_err();
    assert!(matches!(&err, CommandError::Unknown(name) if name == "/voar"));
    assert!(err.to_string().contains("/ajuda"));
}

// =========================================================================
// rendering
// =========================================================================

#[test]
fn prefixes_follow_role() {
    let photo = InlineImage::new("image/png", "AAAA");
    assert_eq!(format_message(&Message::user("oi", None).unwrap()), "Você: oi");
    assert_eq!(format_message(&Message::user("", Some(&photo)).unwrap()), "Você: [imagem anexada]");
    assert_eq!(format_message(&Message::model_text("olá")), "IA: olá");
    assert_eq!(format_message(&Message::error("falhou")), "Erro: falhou");
}

#[test]
fn save_image_writes_decoded_bytes_with_extension() {
    let dir = tempfile::tempdir().unwrap();
    let (path, index) = save_image("data:image/png;base64,iVBORw==", &dir.path().join("out"), 7).unwrap();
    assert_eq!(index, 7);
    assert_eq!(path.file_name().unwrap(), "imagem-007.png");
    assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG");
}

#[test]
fn save_image_never_overwrites_existing_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("imagem-001.png"), b"earlier session").unwrap();

    let (path, index) = save_image("data:image/png;base64,iVBORw==", dir.path(), 1).unwrap();

    assert_eq!(index, 2);
    assert_eq!(path.file_name().unwrap(), "imagem-002.png");
    assert_eq!(std::fs::read(dir.path().join("imagem-001.png")).unwrap(), b"earlier session");
}

#[test]
fn save_image_rejects_non_data_uri() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(save_image("https://x/y.png", dir.path(), 1), Err(SaveError::InvalidUri)));
    assert!(matches!(save_image("data:image/png;base64,!!!", dir.path(), 1), Err(SaveError::Decode(_))));
}

#[tokio::test]
async fn renderer_prints_only_new_messages_and_saves_images() {
    let mock = Arc::new(MockGenerate::new(vec![
        Ok(text_response("A fotossíntese é...")),
        Ok(image_response("image/png", "iVBORw==")),
    ]));
    let credentials = Arc::new(CredentialHolder::load(Box::new(MemoryStore::with_value("AIza-test"))).unwrap());
    let convo = Conversation::new(Dispatcher::new(mock, "image-model", "text-model"), credentials);
    let dir = tempfile::tempdir().unwrap();
    let mut renderer = Renderer::new(dir.path());

    convo.submit("explique fotossíntese", None).await.unwrap();
    let mut out = Vec::new();
    renderer.render_pending(&convo, &mut out).unwrap();
    let first = String::from_utf8(out).unwrap();
    assert_eq!(first, "Você: explique fotossíntese\nIA: A fotossíntese é...\n");
    assert_eq!(renderer.rendered(), 2);

    convo.submit("desenhe um gato", None).await.unwrap();
    let mut out = Vec::new();
    renderer.render_pending(&convo, &mut out).unwrap();
    let second = String::from_utf8(out).unwrap();
    assert!(second.starts_with("Você: desenhe um gato\nIA: Aqui está a imagem que você pediu:\n"));
    assert!(second.contains("imagem-001.png"));
    assert!(dir.path().join("imagem-001.png").exists());
}

#[tokio::test]
async fn renderer_skips_images_left_by_an_earlier_run() {
    let mock = Arc::new(MockGenerate::new(vec![
        Ok(image_response("image/png", "iVBORw==")),
        Ok(image_response("image/png", "iVBORw==")),
    ]));
    let credentials = Arc::new(CredentialHolder::load(Box::new(MemoryStore::with_value("AIza-test"))).unwrap());
    let convo = Conversation::new(Dispatcher::new(mock, "image-model", "text-model"), credentials);
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("imagem-001.png"), b"old").unwrap();
    let mut renderer = Renderer::new(dir.path());

    convo.submit("desenhe um gato", None).await.unwrap();
    convo.submit("desenhe um cão", None).await.unwrap();
    let mut out = Vec::new();
    renderer.render_pending(&convo, &mut out).unwrap();

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("imagem-002.png"));
    assert!(printed.contains("imagem-003.png"));
    assert_eq!(std::fs::read(dir.path().join("imagem-001.png")).unwrap(), b"old");
}
