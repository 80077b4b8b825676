use std::fmt::Write as _;

use chrono::{DateTime, Local};
use client_core::{
    ChatEntry, EntryStatus, Notification, NotificationLevel, OperationKind, SessionEvent,
    SessionSnapshot,
};
use shared::{
    domain::{ChatRole, DocumentId, Theme},
    protocol::{Document, DocumentSummary},
};

const TEXT_EXCERPT_CHARS: usize = 500;

/// Same rounding as the web front-end: two decimals, trailing zeros dropped.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}

/// Backend timestamps are ISO-8601 with offset; shown in local time.
pub fn format_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed
            .with_timezone(&Local)
            .format("%d/%m/%Y %H:%M")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

pub fn render_documents(documents: &[DocumentSummary], current: Option<&DocumentId>) -> String {
    if documents.is_empty() {
        return "Nessun documento caricato.".to_string();
    }
    let mut out = String::new();
    for document in documents {
        let marker = if Some(&document.id) == current { '>' } else { ' ' };
        let flags = format!(
            "{}{}",
            if document.has_summary { "R" } else { "-" },
            if document.has_schema { "S" } else { "-" },
        );
        let _ = writeln!(
            out,
            "{marker} {id}  [{flags}]  {name}  ({size}, {created})",
            id = document.id,
            name = document.filename,
            size = format_size(document.file_size),
            created = format_timestamp(&document.created_at),
        );
    }
    out.trim_end().to_string()
}

pub fn render_document(document: &Document) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", document.filename, document.id);
    let _ = writeln!(
        out,
        "{} · {} · caricato il {}",
        document.content_type,
        format_size(document.file_size),
        format_timestamp(&document.created_at)
    );

    let _ = writeln!(out, "\n== Testo estratto ==");
    let text = document.extracted_text();
    if text.is_empty() {
        let _ = writeln!(out, "(nessun testo)");
    } else {
        let _ = writeln!(out, "{}", excerpt(text, TEXT_EXCERPT_CHARS));
    }

    if let Some(summary) = document.summary_text.as_deref().filter(|s| !s.is_empty()) {
        let label = document
            .summary_type
            .as_deref()
            .map(|length| format!(" ({length})"))
            .unwrap_or_default();
        let _ = writeln!(out, "\n== Riassunto{label} ==\n{summary}");
    }
    if let Some(schema) = document.mindmap_schema.as_deref().filter(|s| !s.is_empty()) {
        let label = document
            .schema_type
            .as_deref()
            .map(|schema_type| format!(" ({schema_type})"))
            .unwrap_or_default();
        let _ = writeln!(out, "\n== Schema{label} ==\n{schema}");
    }
    out.trim_end().to_string()
}

pub fn render_transcript(entries: &[ChatEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let who = match entry.role {
            ChatRole::User => "tu",
            ChatRole::Assistant => "assistente",
            ChatRole::Error => "errore",
        };
        let status = match entry.status {
            EntryStatus::Pending => " …",
            EntryStatus::Confirmed => "",
            EntryStatus::Failed => " (non inviato)",
        };
        let _ = writeln!(out, "[{who}]{status} {}", entry.text);
    }
    out.trim_end().to_string()
}

pub fn render_status(snapshot: &SessionSnapshot) -> String {
    let mut busy = Vec::new();
    if snapshot.uploading {
        busy.push(format!("caricamento {}%", snapshot.upload_percent));
    }
    if snapshot.generating_summary {
        busy.push("riassunto".to_string());
    }
    if snapshot.generating_schema {
        busy.push("schema".to_string());
    }
    let current = snapshot
        .current_document
        .as_ref()
        .map(|document| document.filename.as_str())
        .unwrap_or("nessuno");
    let mut line = format!(
        "documenti: {} · corrente: {current} · tema: {} · chat: {}",
        snapshot.documents.len(),
        theme_label(snapshot.theme),
        if snapshot.chat_open { "aperta" } else { "chiusa" },
    );
    if !busy.is_empty() {
        let _ = write!(line, " · in corso: {}", busy.join(", "));
    }
    line
}

fn theme_label(theme: Theme) -> &'static str {
    match theme {
        Theme::Light => "chiaro",
        Theme::Dark => "scuro",
    }
}

pub fn operation_label(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Upload => "Caricamento",
        OperationKind::SummaryGeneration => "Generazione riassunto",
        OperationKind::SchemaGeneration => "Generazione schema",
    }
}

fn render_notification(notification: &Notification) -> String {
    match notification.level {
        NotificationLevel::Success => format!("✔ {}", notification.message),
        NotificationLevel::Error => format!("✖ {}", notification.message),
    }
}

/// Line printed for a controller event, if the event is worth showing.
pub fn render_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Notification(notification) => Some(render_notification(notification)),
        SessionEvent::ThemeApplied(theme) => Some(format!("Tema {}", theme_label(*theme))),
        SessionEvent::UploadProgress { percent } => Some(format!("Caricamento: {percent}%")),
        SessionEvent::OperationStarted(kind) => {
            Some(format!("{} in corso…", operation_label(*kind)))
        }
        SessionEvent::DocumentsUpdated { .. }
        | SessionEvent::CurrentDocumentChanged(_)
        | SessionEvent::TranscriptUpdated { .. }
        | SessionEvent::OperationFinished(_) => None,
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
