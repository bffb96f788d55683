use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::handlers::responses::render_attachment;
use crate::state::AppState;
use crate::utils::logging::{read_recent_log_lines, GENERAL_LOG, TIMING_LOG};

const DEFAULT_LOG_LINES: usize = 20;

pub const HELP_TEXT: &str = "Type a question and press Enter to ask the AI.\n\
/attach <path>   attach a file to the next questions\n\
/clear           remove the attachment\n\
/export [dir]    save results to <dir> (no dir turns exporting off)\n\
/status          show the current run and attachment\n\
/logs [n]        show the last n log lines\n\
/timing [n]      show the last n timing log lines\n\
/help            show this help\n\
/quit            exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Submit(String),
    Attach(PathBuf),
    Clear,
    Export(Option<PathBuf>),
    Status,
    Logs { file: &'static str, lines: usize },
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub output: String,
    pub quit: bool,
}

impl Reply {
    fn text(output: impl Into<String>) -> Self {
        Reply {
            output: output.into(),
            quit: false,
        }
    }
}

fn parse_line_count(arg: &str) -> Result<usize> {
    if arg.is_empty() {
        return Ok(DEFAULT_LOG_LINES);
    }
    arg.parse::<usize>()
        .map_err(|_| anyhow!("Invalid line count: {arg}"))
}

pub fn parse_command(line: &str) -> Result<SessionCommand> {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(SessionCommand::Submit(trimmed.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name.to_lowercase().as_str() {
        "attach" => {
            if arg.is_empty() {
                return Err(anyhow!("Usage: /attach <path>"));
            }
            Ok(SessionCommand::Attach(PathBuf::from(arg)))
        }
        "clear" => Ok(SessionCommand::Clear),
        "export" => Ok(SessionCommand::Export(
            (!arg.is_empty()).then(|| PathBuf::from(arg)),
        )),
        "status" => Ok(SessionCommand::Status),
        "logs" => Ok(SessionCommand::Logs {
            file: GENERAL_LOG,
            lines: parse_line_count(arg)?,
        }),
        "timing" => Ok(SessionCommand::Logs {
            file: TIMING_LOG,
            lines: parse_line_count(arg)?,
        }),
        "help" | "?" => Ok(SessionCommand::Help),
        "quit" | "exit" => Ok(SessionCommand::Quit),
        other => Err(anyhow!("Unknown command: /{other}. Type /help for commands.")),
    }
}

fn status_text(state: &AppState) -> String {
    let orchestrator = state.orchestrator();
    let snapshot = orchestrator.state();
    let attachment = state
        .attachment()
        .map(|file| render_attachment(&file))
        .unwrap_or_else(|| "No attachment".to_string());
    let export = state
        .export_dir()
        .map(|dir| format!("Exporting to {}", dir.display()))
        .unwrap_or_else(|| "Export off".to_string());
    let mut lines = vec![
        format!("Run {}: {:?}", orchestrator.run_id(), snapshot.phase),
        attachment,
        export,
    ];
    if let Some(error) = snapshot.error {
        lines.push(format!("Last error ({}): {}", error.category, error.message));
    }
    lines.join("\n")
}

fn logs_text(file: &str, lines: usize) -> Result<String> {
    match read_recent_log_lines(file, lines)? {
        Some(tail) if !tail.lines.is_empty() => Ok(format!(
            "{}\n{}",
            tail.path.display(),
            tail.lines.join("\n")
        )),
        _ => Ok(format!("No entries in {file}")),
    }
}

pub async fn execute(state: &AppState, command: SessionCommand) -> Result<Reply> {
    let reply = match command {
        SessionCommand::Submit(text) => Reply::text(state.submit(&text).await.rendered),
        SessionCommand::Attach(path) => match state.attach(&path).await {
            Ok(file) => Reply::text(render_attachment(&file)),
            Err(error) => Reply::text(format!("Error: {}", error.message)),
        },
        SessionCommand::Clear => match state.clear_attachment() {
            Some(file) => Reply::text(format!("Removed {}", file.name)),
            None => Reply::text("No attachment to remove"),
        },
        SessionCommand::Export(dir) => {
            let message = match &dir {
                Some(dir) => format!("Results will be exported to {}", dir.display()),
                None => "Export off".to_string(),
            };
            state.set_export_dir(dir);
            Reply::text(message)
        }
        SessionCommand::Status => Reply::text(status_text(state)),
        SessionCommand::Logs { file, lines } => Reply::text(logs_text(file, lines)?),
        SessionCommand::Help => Reply::text(HELP_TEXT),
        SessionCommand::Quit => Reply {
            output: String::new(),
            quit: true,
        },
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_submissions() {
        assert_eq!(
            parse_command("  What is 2+2?  ").unwrap(),
            SessionCommand::Submit("What is 2+2?".to_string())
        );
    }

    #[test]
    fn parses_slash_commands() {
        assert_eq!(
            parse_command("/attach ./my notes.md").unwrap(),
            SessionCommand::Attach(PathBuf::from("./my notes.md"))
        );
        assert_eq!(parse_command("/CLEAR").unwrap(), SessionCommand::Clear);
        assert_eq!(parse_command("/export").unwrap(), SessionCommand::Export(None));
        assert_eq!(
            parse_command("/timing 5").unwrap(),
            SessionCommand::Logs {
                file: TIMING_LOG,
                lines: 5
            }
        );
        assert_eq!(
            parse_command("/logs").unwrap(),
            SessionCommand::Logs {
                file: GENERAL_LOG,
                lines: DEFAULT_LOG_LINES
            }
        );
        assert_eq!(parse_command("/exit").unwrap(), SessionCommand::Quit);
    }

    #[test]
    fn rejects_bad_commands() {
        assert!(parse_command("/attach").is_err());
        assert!(parse_command("/logs many").is_err());
        assert!(parse_command("/dance").is_err());
    }
}
