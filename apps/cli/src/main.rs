mod command;
mod config;
mod render;

use std::{
    io::Write as _,
    ops::ControlFlow,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use client_core::{
    Confirmation, FilePreferenceStore, HttpGateway, SessionController, SessionError, UploadFile,
};
use command::{parse_command, Command, HELP};
use shared::{
    domain::{SchemaOptions, SummaryOptions},
    protocol::Document,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::{broadcast::error::RecvError, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

type SharedStdin = Arc<Mutex<Lines<BufReader<Stdin>>>>;

#[derive(Parser, Debug)]
#[command(name = "docbrains", about = "Client da terminale per l'analisi di documenti DocBrains")]
struct Args {
    /// Config file (defaults to ./docbrains.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Backend API base, e.g. http://localhost:8001/api.
    #[arg(long)]
    api_endpoint: Option<String>,
    #[arg(long)]
    download_dir: Option<PathBuf>,
    #[arg(long)]
    preferences: Option<PathBuf>,
    /// Skip the confirmation prompt before deletions.
    #[arg(long)]
    yes: bool,
}

/// Reads the answer from the same stdin the REPL uses.
struct StdinConfirm {
    stdin: SharedStdin,
    assume_yes: bool,
}

#[async_trait]
impl Confirmation for StdinConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("{prompt} [y/N] ");
        let _ = std::io::stdout().flush();
        let mut stdin = self.stdin.lock().await;
        match stdin.next_line().await {
            Ok(Some(answer)) => matches!(
                answer.trim().to_lowercase().as_str(),
                "y" | "yes" | "s" | "si" | "sì"
            ),
            _ => false,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(args.config.as_deref());
    if let Some(v) = args.api_endpoint {
        settings.api_endpoint = v;
    }
    if let Some(v) = args.download_dir {
        settings.download_dir = v;
    }
    if let Some(v) = args.preferences {
        settings.preferences_path = v;
    }
    let api_endpoint = config::normalize_api_endpoint(&settings.api_endpoint)?;
    info!(
        %api_endpoint,
        download_dir = %settings.download_dir.display(),
        preferences = %settings.preferences_path.display(),
        "starting docbrains client"
    );

    let gateway = HttpGateway::with_timeout(
        &api_endpoint,
        Duration::from_secs(settings.request_timeout_secs),
    )
    .context("failed to build backend client")?;
    let stdin: SharedStdin = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let controller = SessionController::new_with_dependencies(
        Arc::new(gateway),
        Arc::new(FilePreferenceStore::new(settings.preferences_path.clone())),
        Arc::new(StdinConfirm {
            stdin: stdin.clone(),
            assume_yes: args.yes,
        }),
        settings.download_dir.clone(),
    );

    let printer = spawn_event_printer(&controller);
    println!("DocBrains · backend {api_endpoint} · digita 'help' per i comandi");
    if controller.initialize().await.is_ok() {
        let snapshot = controller.snapshot().await;
        println!(
            "{}",
            render::render_documents(&snapshot.documents, snapshot.current_id())
        );
    }

    loop {
        print!("docbrains> ");
        let _ = std::io::stdout().flush();
        let line = {
            let mut stdin = stdin.lock().await;
            tokio::select! {
                line = stdin.next_line() => line.context("failed to read stdin")?,
                _ = tokio::signal::ctrl_c() => None,
            }
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match parse_command(&line) {
            Ok(Some(command)) => {
                if execute(&controller, command).await.is_break() {
                    break;
                }
            }
            Ok(None) => {}
            Err(err) => println!("{err}"),
        }
    }

    controller.shutdown();
    printer.abort();
    Ok(())
}

fn spawn_event_printer(controller: &SessionController) -> JoinHandle<()> {
    let mut events = controller.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = render::render_event(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "event printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn current_document(controller: &SessionController) -> Option<Document> {
    let current = controller.snapshot().await.current_document;
    if current.is_none() {
        println!("Nessun documento selezionato: usa 'open <id>'.");
    }
    current
}

fn report_busy(result: &Result<impl Sized, SessionError>) {
    if let Err(SessionError::Busy(kind)) = result {
        println!("{} già in corso.", render::operation_label(*kind));
    }
}

fn default_export_name(document: &Document, content: &str) -> String {
    let stem = Path::new(&document.filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("documento");
    format!("{stem}_{content}")
}

async fn execute(controller: &Arc<SessionController>, command: Command) -> ControlFlow<()> {
    match command {
        Command::List => {
            if controller.refresh_documents().await.is_ok() {
                let snapshot = controller.snapshot().await;
                println!(
                    "{}",
                    render::render_documents(&snapshot.documents, snapshot.current_id())
                );
            }
        }
        Command::Open(id) => {
            if controller.select_document(&id).await.is_ok() {
                if let Some(document) = controller.snapshot().await.current_document {
                    println!("{}", render::render_document(&document));
                }
            }
        }
        Command::Show => {
            let snapshot = controller.snapshot().await;
            println!("{}", render::render_status(&snapshot));
            if let Some(document) = &snapshot.current_document {
                println!("{}", render::render_document(document));
            }
            if snapshot.chat_open && !snapshot.transcript.is_empty() {
                println!("{}", render::render_transcript(&snapshot.transcript));
            }
        }
        Command::Upload(path) => match UploadFile::from_path(&path).await {
            Ok(file) => {
                let controller = Arc::clone(controller);
                tokio::spawn(async move {
                    let result = controller.upload(file).await;
                    report_busy(&result);
                });
            }
            Err(err) => println!("Impossibile leggere '{}': {err}", path.display()),
        },
        Command::Summary { length, accuracy } => {
            let Some(document) = current_document(controller).await else {
                return ControlFlow::Continue(());
            };
            let mut options: SummaryOptions = controller.snapshot().await.summary_options;
            if let Some(length) = length {
                options.length = length;
            }
            if let Some(accuracy) = accuracy {
                options.accuracy = accuracy;
            }
            let controller = Arc::clone(controller);
            tokio::spawn(async move {
                let result = controller.generate_summary(&document.id, options).await;
                report_busy(&result);
                if let Ok(response) = result {
                    println!("\n== Riassunto ({}) ==\n{}", response.summary_type, response.summary);
                }
            });
        }
        Command::Schema(schema_type) => {
            let Some(document) = current_document(controller).await else {
                return ControlFlow::Continue(());
            };
            let mut options: SchemaOptions = controller.snapshot().await.schema_options;
            if let Some(schema_type) = schema_type {
                options.schema_type = schema_type;
            }
            let controller = Arc::clone(controller);
            tokio::spawn(async move {
                let result = controller.generate_schema(&document.id, options).await;
                report_busy(&result);
                if let Ok(response) = result {
                    println!("\n== Schema ({}) ==\n{}", response.schema_type, response.schema);
                }
            });
        }
        Command::Export { content, name } => {
            let Some(document) = current_document(controller).await else {
                return ControlFlow::Continue(());
            };
            let name = name.unwrap_or_else(|| default_export_name(&document, content.as_str()));
            let _ = controller.export(&document.id, content, &name).await;
        }
        Command::Delete(id) => {
            if let Err(SessionError::Declined) = controller.delete_document(&id).await {
                println!("Eliminazione annullata.");
            }
        }
        Command::Chat(text) => {
            let result = controller.send_chat_message(&text).await;
            if !matches!(result, Err(SessionError::Cancelled)) {
                let transcript = controller.snapshot().await.transcript;
                if let Some(last) = transcript.last() {
                    println!("{}", render::render_transcript(std::slice::from_ref(last)));
                }
            }
        }
        Command::Panel => {
            if controller.toggle_chat_panel().await {
                println!("Chat aperta.");
                let transcript = controller.snapshot().await.transcript;
                if !transcript.is_empty() {
                    println!("{}", render::render_transcript(&transcript));
                }
            } else {
                println!("Chat chiusa.");
            }
        }
        Command::Theme => {
            controller.toggle_theme().await;
        }
        Command::Status => {
            if let Ok(banner) = controller.check_backend().await {
                println!("{banner}");
            } else {
                println!("Backend non raggiungibile.");
            }
            println!("{}", render::render_status(&controller.snapshot().await));
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}
