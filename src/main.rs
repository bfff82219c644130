use std::future::Future;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ia_universal::credential::{CredentialError, CredentialHolder, FileStore};
use ia_universal::llm::GeminiClient;
use ia_universal::llm::config::LlmConfig;
use ia_universal::llm::types::LlmError;
use ia_universal::message::Message;
use ia_universal::repl::{self, Command, Renderer};
use ia_universal::services::conversation::{Attachment, Conversation, SessionState, SubmitRejected};
use ia_universal::services::creation::{CreationForm, CreationKind, GuidedRequest};
use ia_universal::services::dispatch::Dispatcher;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] LlmError),
    #[error("credential storage error: {0}")]
    Credential(#[from] CredentialError),
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "ia-universal", about = "Chat com a IA Gemini: perguntas, imagens, cursos e e-books")]
struct Cli {
    /// JSON file holding the API key.
    #[arg(long, env = "IA_CREDENTIAL_FILE")]
    credential_file: Option<PathBuf>,

    /// Directory where generated images are written.
    #[arg(long, env = "IA_IMAGE_DIR", default_value = "ia-images")]
    image_dir: PathBuf,

    /// Pause between the cover and text stages of /curso and /ebook.
    #[arg(long, env = "IA_PACING_MS", default_value_t = 500)]
    pacing_ms: u64,

    #[arg(long)]
    no_greeting: bool,
}

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "ia-universal: fatal");
            eprintln!("erro: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = LlmConfig::from_env()?;
    let client = GeminiClient::from_config(&config)?;
    tracing::info!(
        image_model = %config.image_model,
        text_model = %config.text_model,
        "LLM client initialized"
    );

    let store = FileStore::new(cli.credential_file.unwrap_or_else(FileStore::default_path));
    let credentials = Arc::new(CredentialHolder::load(Box::new(store))?);

    let dispatcher = Dispatcher::from_config(Arc::new(client), &config);
    let mut conversation =
        Conversation::new(dispatcher, credentials.clone()).with_pacing(Duration::from_millis(cli.pacing_ms));
    if !cli.no_greeting {
        conversation = conversation.with_greeting();
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut renderer = Renderer::new(cli.image_dir);

    if !credentials.is_configured() && !ask_credential(&credentials, &mut input).await? {
        return Ok(());
    }
    renderer.render_pending(&conversation, &mut std::io::stdout())?;
    println!("Digite /ajuda para ver os comandos.");

    while let Some(line) = prompt_line(&mut input, "> ").await? {
        let command = match repl::parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        match command {
            Command::Empty => {}
            Command::Say(prompt) => {
                run_turn(&conversation, &mut renderer, conversation.submit(&prompt, None)).await?;
            }
            Command::Attach { path, prompt } => {
                let turn = conversation.submit(&prompt, Some(Attachment::File(path)));
                run_turn(&conversation, &mut renderer, turn).await?;
            }
            Command::Create(kind) => {
                if let Some(request) = ask_creation_form(kind, &mut input).await? {
                    run_turn(&conversation, &mut renderer, conversation.submit_guided(&request)).await?;
                }
            }
            Command::ChangeKey => {
                if !change_credential(&credentials, &mut input).await? {
                    break;
                }
            }
            Command::Help => println!("{}", repl::HELP_TEXT),
            Command::Quit => break,
        }
    }
    Ok(())
}

/// Drive one turn to completion, printing messages as they are appended.
async fn run_turn<F>(conversation: &Conversation, renderer: &mut Renderer, turn: F) -> Result<(), AppError>
where
    F: Future<Output = Result<Vec<Message>, SubmitRejected>>,
{
    let mut stdout = std::io::stdout();
    let mut appended = conversation.subscribe();
    appended.borrow_and_update();
    tokio::pin!(turn);

    let result = loop {
        tokio::select! {
            result = &mut turn => break result,
            Ok(()) = appended.changed() => {
                renderer.render_pending(conversation, &mut stdout)?;
                if conversation.state() == SessionState::AwaitingResponse {
                    println!("{}", repl::PENDING_TEXT);
                }
            }
        }
    };
    renderer.render_pending(conversation, &mut stdout)?;

    if let Err(rejected) = result {
        println!("{}", repl::format_message(&rejected.notice()));
        if rejected == SubmitRejected::MissingCredential {
            println!("Use /chave para informar uma nova chave.");
        }
    }
    Ok(())
}

async fn prompt_line(input: &mut Input, prompt: &str) -> Result<Option<String>, AppError> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    Ok(input.next_line().await?)
}

/// Ask until a non-blank key is saved. `false` when input ends first.
async fn ask_credential(credentials: &CredentialHolder, input: &mut Input) -> Result<bool, AppError> {
    println!("Informe sua chave da API do Google Gemini (https://aistudio.google.com/app/apikey).");
    loop {
        let Some(line) = prompt_line(input, "Chave: ").await? else {
            return Ok(false);
        };
        match credentials.save(&line) {
            Ok(_) => {
                println!("Chave salva.");
                return Ok(true);
            }
            Err(CredentialError::Empty) => println!("A chave não pode ficar em branco."),
            Err(e) => return Err(e.into()),
        }
    }
}

async fn change_credential(credentials: &CredentialHolder, input: &mut Input) -> Result<bool, AppError> {
    let Some(answer) = prompt_line(input, "Trocar a chave da API? (s/N) ").await? else {
        return Ok(false);
    };
    if !matches!(answer.trim().to_lowercase().as_str(), "s" | "sim" | "y" | "yes") {
        return Ok(true);
    }
    if let Err(e) = credentials.clear() {
        println!("Aviso: não foi possível apagar a chave salva ({e}).");
    }
    ask_credential(credentials, input).await
}

async fn ask_creation_form(kind: CreationKind, input: &mut Input) -> Result<Option<GuidedRequest>, AppError> {
    println!("Criar {} (tema em branco cancela).", kind.label());
    let Some(topic) = prompt_line(input, "Tema: ").await? else {
        return Ok(None);
    };
    if topic.trim().is_empty() {
        println!("Cancelado.");
        return Ok(None);
    }
    let Some(audience) = prompt_line(input, "Público-alvo: ").await? else {
        return Ok(None);
    };
    let Some(style) = prompt_line(input, "Estilo (opcional): ").await? else {
        return Ok(None);
    };

    match (CreationForm { topic, audience, style }).build(kind) {
        Ok(request) => Ok(Some(request)),
        Err(e) => {
            println!("{e}");
            Ok(None)
        }
    }
}
