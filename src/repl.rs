//! Command parsing and transcript rendering for the terminal front end.
//!
//! DESIGN
//! ======
//! Everything here is synchronous and writes to any `io::Write`, so the
//! binary only owns the stdin loop. Generated images cannot be shown in a
//! terminal; they are decoded from their data URI and written to a
//! directory, and the path is printed in their place.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::image;
use crate::message::{InlineImage, Message, Role};
use crate::services::conversation::Conversation;
use crate::services::creation::CreationKind;

pub const HELP_TEXT: &str = "Comandos:
  <texto>                     envia uma pergunta ou pedido
  /imagem <arquivo> [texto]   anexa uma imagem (alias /image)
  /curso                      cria um curso completo com capa (alias /course)
  /ebook                      cria um e-book com capa
  /chave                      troca a chave da API (alias /key)
  /ajuda                      mostra esta ajuda (alias /help)
  /sair                       encerra (alias /quit, /exit)";

pub const PENDING_TEXT: &str = "Criando conteúdo...";

// =============================================================================
// COMMANDS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank input.
    Empty,
    /// Plain prompt.
    Say(String),
    /// Prompt with a local image attached.
    Attach { path: PathBuf, prompt: String },
    Create(CreationKind),
    ChangeKey,
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("uso: /imagem <arquivo> [texto]")]
    MissingPath,
    #[error("comando desconhecido: {0} (digite /ajuda)")]
    Unknown(String),
    #[error("argumentos inválidos: {0}")]
    Malformed(#[from] shell_words::ParseError),
}

/// Parse one input line.
///
/// # Errors
///
/// Returns [`CommandError`] for unknown slash commands, a missing image path
/// or unbalanced quotes.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    let Some(body) = line.strip_prefix('/') else {
        return Ok(Command::Say(line.to_string()));
    };

    let (name, rest) = body
        .split_once(char::is_whitespace)
        .map_or((body, ""), |(name, rest)| (name, rest.trim()));
    match name.to_lowercase().as_str() {
        "imagem" | "image" => {
            let end = first_word_end(rest);
            let path = shell_words::split(&rest[..end])?
                .into_iter()
                .next()
                .filter(|p| !p.is_empty())
                .ok_or(CommandError::MissingPath)?;
            Ok(Command::Attach { path: PathBuf::from(path), prompt: rest[end..].trim().to_string() })
        }
        "curso" | "course" => Ok(Command::Create(CreationKind::Course)),
        "ebook" | "e-book" => Ok(Command::Create(CreationKind::Ebook)),
        "chave" | "key" => Ok(Command::ChangeKey),
        "ajuda" | "help" => Ok(Command::Help),
        "sair" | "quit" | "exit" => Ok(Command::Quit),
        _ => Err(CommandError::Unknown(format!("/{name}"))),
    }
}

/// Byte offset where the first shell word of `s` ends. Only the path is
/// shell-quoted; the prompt after it is sent as typed.
fn first_word_end(s: &str) -> usize {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some('\''), '\'') | (Some('"'), '"') => quote = None,
            (Some('\''), _) => {}
            (_, '\\') => escaped = true,
            (None, '"' | '\'') => quote = Some(c),
            (None, c) if c.is_whitespace() => return i,
            _ => {}
        }
    }
    s.len()
}

// =============================================================================
// RENDERING
// =============================================================================

fn prefix(role: Role) -> &'static str {
    match role {
        Role::User => "Você:",
        Role::Model => "IA:",
        Role::Error => "Erro:",
    }
}

/// One message as terminal text, without saving any image.
#[must_use]
pub fn format_message(message: &Message) -> String {
    let mut out = String::from(prefix(message.role()));
    if let Some(text) = message.text() {
        out.push(' ');
        out.push_str(text);
    }
    if message.role() == Role::User && message.image_url().is_some() {
        out.push_str(" [imagem anexada]");
    }
    out
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("image reference is not a base64 data URI")]
    InvalidUri,
    #[error("image payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Decode `data_uri` and write it to `dir` as `imagem-<index>.<ext>`,
/// starting at `index` and moving past names that already exist. Returns the
/// written path and the index it used.
///
/// # Errors
///
/// Returns [`SaveError`] for malformed URIs or payloads, or I/O failures.
pub fn save_image(data_uri: &str, dir: &Path, index: usize) -> Result<(PathBuf, usize), SaveError> {
    let inline = InlineImage::from_data_uri(data_uri).ok_or(SaveError::InvalidUri)?;
    let bytes = image::decode(&inline)?;
    let extension = image::extension_for(&inline.mime_type);
    std::fs::create_dir_all(dir).map_err(|source| SaveError::Io { path: dir.to_path_buf(), source })?;

    let mut index = index;
    loop {
        let path = dir.join(format!("imagem-{index:03}.{extension}"));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(&bytes)
                    .map_err(|source| SaveError::Io { path: path.clone(), source })?;
                return Ok((path, index));
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => index += 1,
            Err(source) => return Err(SaveError::Io { path, source }),
        }
    }
}

/// Tracks how much of the log has been printed.
pub struct Renderer {
    image_dir: PathBuf,
    rendered: usize,
    saved_images: usize,
}

impl Renderer {
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self { image_dir: image_dir.into(), rendered: 0, saved_images: 0 }
    }

    #[must_use]
    pub fn rendered(&self) -> usize {
        self.rendered
    }

    /// Print every message appended since the last call.
    ///
    /// # Errors
    ///
    /// Returns the writer's I/O error. Image save failures are printed, not
    /// returned.
    pub fn render_pending<W: Write>(&mut self, conversation: &Conversation, out: &mut W) -> io::Result<()> {
        let pending = conversation.messages_since(self.rendered);
        for message in &pending {
            writeln!(out, "{}", format_message(message))?;
            let Some(uri) = message.image_url().filter(|_| message.role() == Role::Model) else {
                continue;
            };
            match save_image(uri, &self.image_dir, self.saved_images + 1) {
                Ok((path, index)) => {
                    self.saved_images = index;
                    writeln!(out, "     imagem salva em {}", path.display())?;
                }
                Err(e) => {
                    warn!(error = %e, "repl: image save failed");
                    writeln!(out, "     (não foi possível salvar a imagem: {e})")?;
                }
            }
        }
        self.rendered += pending.len();
        out.flush()
    }
}

#[cfg(test)]
#[path = "repl_test.rs"]
mod tests;
