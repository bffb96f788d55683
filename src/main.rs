use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::anyhow;
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

mod config;
mod errors;
mod export;
mod handlers;
mod llm;
mod orchestrator;
mod state;
mod utils;

use config::CONFIG;
use handlers::commands::{execute, parse_command, SessionCommand};
use llm::{GeminiClient, GeminiSettings};
use state::AppState;
use utils::logging::init_logging;

#[derive(Debug, Default, PartialEq, Eq)]
struct AskArgs {
    text: String,
    file: Option<PathBuf>,
    export_dir: Option<PathBuf>,
}

fn usage() -> &'static str {
    "Usage:\n  ai-librarian                      interactive session\n  ai-librarian ask [--file <path>] [--export <dir>] <question...>"
}

fn parse_ask_args(args: &[String]) -> anyhow::Result<Option<AskArgs>> {
    match args.get(1).map(|value| value.as_str()) {
        None => return Ok(None),
        Some("ask") => {}
        Some("--help") | Some("-h") => return Err(anyhow!(usage())),
        Some(other) => return Err(anyhow!("Unknown command: {other}\n{}", usage())),
    }

    let mut parsed = AskArgs::default();
    let mut words: Vec<&str> = Vec::new();

    let mut index = 2;
    while index < args.len() {
        match args[index].as_str() {
            "--file" => {
                index += 1;
                let value = args
                    .get(index)
                    .ok_or_else(|| anyhow!("Missing value for --file"))?;
                parsed.file = Some(PathBuf::from(value));
            }
            "--export" => {
                index += 1;
                let value = args
                    .get(index)
                    .ok_or_else(|| anyhow!("Missing value for --export"))?;
                parsed.export_dir = Some(PathBuf::from(value));
            }
            "--help" | "-h" => return Err(anyhow!(usage())),
            word => words.push(word),
        }
        index += 1;
    }

    parsed.text = words.join(" ");
    Ok(Some(parsed))
}

async fn run_ask(state: &AppState, args: AskArgs) -> ExitCode {
    if let Some(path) = args.file.as_deref() {
        if let Err(error) = state.attach(path).await {
            eprintln!("Error: {}", error.message);
            return ExitCode::FAILURE;
        }
    }

    let outcome = tokio::select! {
        outcome = state.submit(&args.text) => outcome,
        _ = tokio::signal::ctrl_c() => {
            state.shutdown();
            eprintln!("Cancelled.");
            return ExitCode::FAILURE;
        }
    };

    println!("{}", outcome.rendered);
    for path in &outcome.exported {
        println!("Saved {}", path.display());
    }
    if outcome.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

async fn run_interactive(state: &AppState) -> anyhow::Result<()> {
    println!("Personal AI Librarian. Type /help for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        let is_submit = matches!(command, SessionCommand::Submit(_));

        let reply = tokio::select! {
            reply = execute(state, command) => reply,
            _ = tokio::signal::ctrl_c(), if is_submit => {
                state.shutdown();
                println!("Cancelled.");
                continue;
            }
        };

        match reply {
            Ok(reply) if reply.quit => break,
            Ok(reply) => {
                if !reply.output.is_empty() {
                    println!("{}", reply.output);
                }
            }
            Err(err) => {
                error!("Command failed: {err:#}");
                println!("Error: {err}");
            }
        }
    }

    state.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv().ok();
    let _guards = init_logging();

    let args: Vec<String> = std::env::args().collect();
    let ask = parse_ask_args(&args)?;

    for warning in CONFIG.startup_warnings() {
        warn!("{warning}");
    }

    let backend = Arc::new(GeminiClient::new(GeminiSettings::from_config(&CONFIG)));
    info!(
        "Starting AI Librarian (model={}, image_model={})",
        CONFIG.gemini_model, CONFIG.gemini_image_model
    );

    match ask {
        Some(mut ask) => {
            let export_dir = ask.export_dir.take().or_else(|| CONFIG.export_dir.clone());
            let state = AppState::new(backend, export_dir);
            Ok(run_ask(&state, ask).await)
        }
        None => {
            let state = AppState::new(backend, CONFIG.export_dir.clone());
            run_interactive(&state).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
