//! Parsing of REPL input lines.

use std::path::PathBuf;

use shared::domain::{AccuracyLevel, DocumentId, ExportContent, SchemaType, SummaryLength};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Open(DocumentId),
    Show,
    Upload(PathBuf),
    Summary {
        length: Option<SummaryLength>,
        accuracy: Option<AccuracyLevel>,
    },
    Schema(Option<SchemaType>),
    Export {
        content: ExportContent,
        name: Option<String>,
    },
    Delete(DocumentId),
    Chat(String),
    Panel,
    Theme,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("comando sconosciuto '{0}' (digita 'help')")]
    Unknown(String),
    #[error("'{command}' richiede {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("valore non valido per '{command}': {value}")]
    InvalidArgument { command: &'static str, value: String },
}

pub const HELP: &str = "\
Comandi:
  list                                   elenca i documenti
  open <id>                              apre un documento
  show                                   mostra il documento corrente
  upload <percorso>                      carica un PDF o un'immagine
  summary [breve|medio|dettagliato] [standard|alta]
                                         genera il riassunto
  schema [brainstorming|cascata]         genera lo schema
  export <full|summary|schema> [nome]    esporta in PDF
  delete <id>                            elimina un documento
  chat <messaggio>                       domanda all'assistente
  panel                                  apre/chiude la chat
  theme                                  cambia tema chiaro/scuro
  status                                 verifica il backend
  help                                   questo elenco
  quit                                   esce";

/// `Ok(None)` for a blank line.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "list" | "ls" => Command::List,
        "open" => Command::Open(required_id("open", rest)?),
        "show" => Command::Show,
        "upload" => {
            if rest.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "upload",
                    argument: "un percorso",
                });
            }
            Command::Upload(PathBuf::from(rest))
        }
        "summary" => parse_summary(rest)?,
        "schema" => Command::Schema(optional_token("schema", rest)?),
        "export" => parse_export(rest)?,
        "delete" | "rm" => Command::Delete(required_id("delete", rest)?),
        "chat" => {
            if rest.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "chat",
                    argument: "un messaggio",
                });
            }
            Command::Chat(rest.to_string())
        }
        "panel" => Command::Panel,
        "theme" => Command::Theme,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn required_id(command: &'static str, rest: &str) -> Result<DocumentId, CommandError> {
    match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
        [id] => Ok(DocumentId::new(*id)),
        [] => Err(CommandError::MissingArgument {
            command,
            argument: "un id documento",
        }),
        _ => Err(CommandError::InvalidArgument {
            command,
            value: rest.to_string(),
        }),
    }
}

fn optional_token<T: std::str::FromStr>(
    command: &'static str,
    rest: &str,
) -> Result<Option<T>, CommandError> {
    if rest.is_empty() {
        return Ok(None);
    }
    rest.parse().map(Some).map_err(|_| CommandError::InvalidArgument {
        command,
        value: rest.to_string(),
    })
}

/// Length and accuracy may come in either order; each at most once.
fn parse_summary(rest: &str) -> Result<Command, CommandError> {
    let mut length = None;
    let mut accuracy = None;
    for token in rest.split_whitespace() {
        if let (Ok(parsed), None) = (token.parse::<SummaryLength>(), length) {
            length = Some(parsed);
        } else if let (Ok(parsed), None) = (token.parse::<AccuracyLevel>(), accuracy) {
            accuracy = Some(parsed);
        } else {
            return Err(CommandError::InvalidArgument {
                command: "summary",
                value: token.to_string(),
            });
        }
    }
    Ok(Command::Summary { length, accuracy })
}

fn parse_export(rest: &str) -> Result<Command, CommandError> {
    let (content, name) = match rest.split_once(char::is_whitespace) {
        Some((content, name)) => (content, Some(name.trim().to_string())),
        None => (rest, None),
    };
    if content.is_empty() {
        return Err(CommandError::MissingArgument {
            command: "export",
            argument: "full, summary o schema",
        });
    }
    let content = content
        .parse::<ExportContent>()
        .map_err(|_| CommandError::InvalidArgument {
            command: "export",
            value: content.to_string(),
        })?;
    Ok(Command::Export {
        content,
        name: name.filter(|name| !name.is_empty()),
    })
}

#[cfg(test)]
#[path = "tests/command_tests.rs"]
mod tests;
