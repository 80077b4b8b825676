use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use shared::{
    domain::{ChatRole, DocumentId, ExportContent, SchemaOptions, SummaryOptions, Theme},
    protocol::{
        ChatRequest, GenerateSchemaRequest, GenerateSchemaResponse, GenerateSummaryRequest,
        GenerateSummaryResponse, UploadResponse,
    },
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    cancel::{CancelSource, Cancelled},
    error::{GatewayError, SessionError},
    gateway::DocumentGateway,
    preferences::{MemoryPreferenceStore, PreferenceStore},
    state::{EntryStatus, InFlight, OperationKind, SessionSnapshot, SessionState},
    upload::{self, ProgressFn, UploadFile, UploadProgress},
    AutoConfirm, Confirmation, Notification, SessionEvent,
};

const MSG_LIST_FAILED: &str = "Errore nel recupero dei documenti";
const MSG_LOAD_FAILED: &str = "Errore nel caricamento del documento";
const MSG_UPLOAD_OK: &str = "Documento caricato e analizzato con successo";
const MSG_UPLOAD_FAILED: &str = "Errore durante il caricamento del file";
const MSG_SUMMARY_OK: &str = "Riassunto generato con successo";
const MSG_SUMMARY_FAILED: &str = "Errore nella generazione del riassunto";
const MSG_SCHEMA_OK: &str = "Schema generato con successo";
const MSG_SCHEMA_FAILED: &str = "Errore nella generazione dello schema";
const MSG_EXPORT_OK: &str = "PDF esportato con successo";
const MSG_EXPORT_FAILED: &str = "Errore nell'esportazione PDF";
const MSG_DELETE_OK: &str = "Documento eliminato con successo";
const MSG_DELETE_FAILED: &str = "Errore durante l'eliminazione del documento";

/// Transcript text shown in place of an assistant reply that never arrived.
pub const CHAT_FAILURE_REPLY: &str = "Mi dispiace, si è verificato un errore. Riprova più tardi.";

const EVENT_CAPACITY: usize = 256;

/// Owns every piece of client session state and mediates all backend calls.
///
/// Operations take `&self` so different kinds can be in flight together;
/// the state lock is never held across a request.
pub struct SessionController {
    gateway: Arc<dyn DocumentGateway>,
    preferences: Arc<dyn PreferenceStore>,
    confirmation: Arc<dyn Confirmation>,
    download_dir: PathBuf,
    inner: Mutex<SessionState>,
    in_flight: Arc<InFlight>,
    tickets: AtomicU64,
    shutdown: CancelSource,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(gateway: Arc<dyn DocumentGateway>) -> Arc<Self> {
        Self::new_with_dependencies(
            gateway,
            Arc::new(MemoryPreferenceStore::default()),
            Arc::new(AutoConfirm),
            PathBuf::from("."),
        )
    }

    pub fn new_with_dependencies(
        gateway: Arc<dyn DocumentGateway>,
        preferences: Arc<dyn PreferenceStore>,
        confirmation: Arc<dyn Confirmation>,
        download_dir: impl Into<PathBuf>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            gateway,
            preferences,
            confirmation,
            download_dir: download_dir.into(),
            inner: Mutex::new(SessionState::default()),
            in_flight: Arc::new(InFlight::default()),
            tickets: AtomicU64::new(0),
            shutdown: CancelSource::new(),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        SessionSnapshot {
            documents: inner.documents.clone(),
            current_document: inner.current_document.clone(),
            uploading: self.in_flight.is_active(OperationKind::Upload),
            upload_percent: self.in_flight.upload_percent(),
            generating_summary: self.in_flight.is_active(OperationKind::SummaryGeneration),
            generating_schema: self.in_flight.is_active(OperationKind::SchemaGeneration),
            summary_options: inner.summary_options,
            schema_options: inner.schema_options,
            transcript: inner.transcript.clone(),
            chat_open: inner.chat_open,
            theme: inner.theme,
        }
    }

    /// Loads the persisted theme and the document list.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        let loaded = self.with_preferences(|store| store.load_theme()).await;
        let theme = match loaded {
            Ok(theme) => theme.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "failed to load theme preference; falling back to light");
                Theme::default()
            }
        };
        self.inner.lock().await.theme = theme;
        self.emit(SessionEvent::ThemeApplied(theme));
        self.refresh_documents().await
    }

    pub async fn toggle_theme(&self) -> Theme {
        let theme = {
            let mut inner = self.inner.lock().await;
            inner.theme = inner.theme.toggled();
            inner.theme
        };
        if let Err(err) = self
            .with_preferences(move |store| store.save_theme(theme))
            .await
        {
            warn!(error = %err, %theme, "failed to persist theme preference");
        }
        self.emit(SessionEvent::ThemeApplied(theme));
        theme
    }

    pub async fn toggle_chat_panel(&self) -> bool {
        let mut inner = self.inner.lock().await;
        inner.chat_open = !inner.chat_open;
        inner.chat_open
    }

    pub async fn set_summary_options(&self, options: SummaryOptions) {
        self.inner.lock().await.summary_options = options;
    }

    pub async fn set_schema_options(&self, options: SchemaOptions) {
        self.inner.lock().await.schema_options = options;
    }

    /// Backend banner from the API root; used as a reachability probe.
    pub async fn check_backend(&self) -> Result<String, SessionError> {
        let status = self.call(self.gateway.health()).await?;
        Ok(status.message)
    }

    pub async fn refresh_documents(&self) -> Result<(), SessionError> {
        let result = self.reload_documents().await;
        if let Err(err) = &result {
            self.report_failure("list_documents", MSG_LIST_FAILED, err);
        }
        result
    }

    pub async fn upload(&self, file: UploadFile) -> Result<UploadResponse, SessionError> {
        if let Err(rejection) = upload::validate(&file) {
            info!(
                filename = %file.filename,
                size = file.size,
                mime_type = %file.mime_type,
                "upload rejected before sending"
            );
            self.notify(Notification::error(rejection.to_string()));
            return Err(rejection.into());
        }

        let _guard = self.in_flight.begin(OperationKind::Upload, &self.events)?;
        info!(filename = %file.filename, size = file.size, "uploading document");
        let created = match self
            .call(self.gateway.upload(file, self.progress_reporter()))
            .await
        {
            Ok(created) => created,
            Err(err) => {
                self.report_failure("upload", MSG_UPLOAD_FAILED, &err);
                return Err(err);
            }
        };
        info!(document_id = %created.id, text_length = created.text_length, "document uploaded");
        let message = created
            .message
            .clone()
            .unwrap_or_else(|| MSG_UPLOAD_OK.to_string());
        self.notify(Notification::success(message));

        // The document exists from here on; follow-up fetch failures are
        // reported on their own.
        let _ = self.refresh_documents().await;
        let _ = self.select_document(&created.id).await;
        Ok(created)
    }

    pub async fn generate_summary(
        &self,
        id: &DocumentId,
        options: SummaryOptions,
    ) -> Result<GenerateSummaryResponse, SessionError> {
        let _guard = self
            .in_flight
            .begin(OperationKind::SummaryGeneration, &self.events)?;
        self.inner.lock().await.summary_options = options;
        info!(
            document_id = %id,
            length = %options.length,
            accuracy = %options.accuracy,
            "generating summary"
        );

        let request = GenerateSummaryRequest {
            document_id: id.clone(),
            summary_type: options.length,
            accuracy_level: options.accuracy,
        };
        let response = match self.call(self.gateway.generate_summary(request)).await {
            Ok(response) => response,
            Err(err) => {
                self.report_failure("generate_summary", MSG_SUMMARY_FAILED, &err);
                return Err(err);
            }
        };
        self.notify(Notification::success(MSG_SUMMARY_OK));
        self.resync_after_change(id).await;
        Ok(response)
    }

    pub async fn generate_schema(
        &self,
        id: &DocumentId,
        options: SchemaOptions,
    ) -> Result<GenerateSchemaResponse, SessionError> {
        let _guard = self
            .in_flight
            .begin(OperationKind::SchemaGeneration, &self.events)?;
        self.inner.lock().await.schema_options = options;
        info!(document_id = %id, schema_type = %options.schema_type, "generating schema");

        let request = GenerateSchemaRequest {
            document_id: id.clone(),
            schema_type: options.schema_type,
        };
        let response = match self.call(self.gateway.generate_schema(request)).await {
            Ok(response) => response,
            Err(err) => {
                self.report_failure("generate_schema", MSG_SCHEMA_FAILED, &err);
                return Err(err);
            }
        };
        self.notify(Notification::success(MSG_SCHEMA_OK));
        self.resync_after_change(id).await;
        Ok(response)
    }

    /// Downloads the PDF rendering of `content` into the download directory as
    /// `{filename}.pdf` and returns the written path.
    pub async fn export(
        &self,
        id: &DocumentId,
        content: ExportContent,
        filename: &str,
    ) -> Result<PathBuf, SessionError> {
        let result = self.download_export(id, content, filename).await;
        match &result {
            Ok(path) => self.notify(Notification::success(format!(
                "{MSG_EXPORT_OK}: {}",
                path.display()
            ))),
            Err(err) => self.report_failure("export_pdf", MSG_EXPORT_FAILED, err),
        }
        result
    }

    pub async fn select_document(&self, id: &DocumentId) -> Result<(), SessionError> {
        let result = self.load_current(id).await;
        if let Err(err) = &result {
            self.report_failure("select_document", MSG_LOAD_FAILED, err);
        }
        result
    }

    /// Deletes after the user confirms. Declining yields
    /// [`SessionError::Declined`] without any request.
    pub async fn delete_document(&self, id: &DocumentId) -> Result<(), SessionError> {
        let label = {
            let inner = self.inner.lock().await;
            inner
                .documents
                .iter()
                .find(|document| &document.id == id)
                .map(|document| document.filename.clone())
        }
        .unwrap_or_else(|| id.to_string());

        let prompt = format!("Sei sicuro di voler eliminare \"{label}\"?");
        if !self.confirmation.confirm(&prompt).await {
            debug!(document_id = %id, "deletion declined");
            return Err(SessionError::Declined);
        }

        if let Err(err) = self.call(self.gateway.delete_document(id)).await {
            self.report_failure("delete_document", MSG_DELETE_FAILED, &err);
            return Err(err);
        }
        info!(document_id = %id, "document deleted");

        let selection_cleared = {
            let mut inner = self.inner.lock().await;
            inner.applied_tickets.remove(id);
            if inner.current_id() == Some(id) {
                inner.clear_selection();
                true
            } else {
                if inner.selection_intent.as_ref() == Some(id) {
                    inner.selection_intent = inner.current_id().cloned();
                }
                false
            }
        };
        if selection_cleared {
            self.emit(SessionEvent::CurrentDocumentChanged(None));
            self.emit(SessionEvent::TranscriptUpdated { len: 0 });
        }
        self.notify(Notification::success(MSG_DELETE_OK));
        let _ = self.refresh_documents().await;
        Ok(())
    }

    /// Appends the user's message at once, then the assistant reply or an
    /// error entry. The user entry is never removed.
    pub async fn send_chat_message(&self, text: &str) -> Result<(), SessionError> {
        let message = text.trim();
        if message.is_empty() {
            return Ok(());
        }

        let (entry_id, epoch, request, len) = {
            let mut inner = self.inner.lock().await;
            let entry_id = inner.push_entry(ChatRole::User, message.to_string(), EntryStatus::Pending);
            let request = ChatRequest {
                document_id: inner.current_id().cloned(),
                message: message.to_string(),
                context: inner
                    .current_document
                    .as_ref()
                    .and_then(|document| document.extracted_text.clone()),
            };
            (entry_id, inner.transcript_epoch, request, inner.transcript.len())
        };
        self.emit(SessionEvent::TranscriptUpdated { len });

        let result = self.call(self.gateway.chat(request)).await;
        if matches!(result, Err(SessionError::Cancelled)) {
            return Err(SessionError::Cancelled);
        }

        let len = {
            let mut inner = self.inner.lock().await;
            if inner.transcript_epoch != epoch {
                debug!(entry_id, "discarding chat reply for a cleared transcript");
                return result.map(|_| ());
            }
            match &result {
                Ok(reply) => {
                    inner.set_entry_status(entry_id, EntryStatus::Confirmed);
                    inner.push_entry(
                        ChatRole::Assistant,
                        reply.response.clone(),
                        EntryStatus::Confirmed,
                    );
                }
                Err(err) => {
                    warn!(error = %err, "chat request failed");
                    inner.set_entry_status(entry_id, EntryStatus::Failed);
                    inner.push_entry(
                        ChatRole::Error,
                        CHAT_FAILURE_REPLY.to_string(),
                        EntryStatus::Confirmed,
                    );
                }
            }
            inner.transcript.len()
        };
        self.emit(SessionEvent::TranscriptUpdated { len });
        result.map(|_| ())
    }

    /// Abandons every outstanding request. Calls made afterwards fail with
    /// [`SessionError::Cancelled`].
    pub fn shutdown(&self) {
        info!("session shutting down; cancelling outstanding requests");
        self.shutdown.cancel();
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, SessionError> {
        match self.shutdown.token().run(request).await {
            Ok(result) => Ok(result?),
            Err(Cancelled) => Err(SessionError::Cancelled),
        }
    }

    /// Runs a preference store call on the blocking pool, since the file
    /// store does plain filesystem I/O.
    async fn with_preferences<T: Send + 'static>(
        &self,
        op: impl FnOnce(&dyn PreferenceStore) -> anyhow::Result<T> + Send + 'static,
    ) -> anyhow::Result<T> {
        let preferences = Arc::clone(&self.preferences);
        tokio::task::spawn_blocking(move || op(preferences.as_ref())).await?
    }

    fn issue_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn notify(&self, notification: Notification) {
        self.emit(SessionEvent::Notification(notification));
    }

    fn report_failure(&self, operation: &str, fallback: &str, err: &SessionError) {
        if matches!(err, SessionError::Cancelled) {
            debug!(operation, "request abandoned by shutdown");
            return;
        }
        warn!(operation, error = %err, "operation failed");
        self.notify(Notification::error(err.user_message(fallback)));
    }

    fn progress_reporter(&self) -> ProgressFn {
        let in_flight = Arc::clone(&self.in_flight);
        let events = self.events.clone();
        Arc::new(move |progress: UploadProgress| {
            let percent = progress.percent();
            if in_flight.advance_upload(percent) {
                let _ = events.send(SessionEvent::UploadProgress { percent });
            }
        })
    }

    async fn reload_documents(&self) -> Result<(), SessionError> {
        let documents = self.call(self.gateway.list_documents()).await?;
        let count = documents.len();
        self.inner.lock().await.documents = documents;
        self.emit(SessionEvent::DocumentsUpdated { count });
        Ok(())
    }

    /// Brings the list and the current document up to date after a
    /// generation the backend already stored. Failures only notify.
    async fn resync_after_change(&self, id: &DocumentId) {
        let _ = self.refresh_documents().await;
        if let Err(err) = self.refresh_current(id).await {
            self.report_failure("refresh_document", MSG_LOAD_FAILED, &err);
        }
    }

    async fn download_export(
        &self,
        id: &DocumentId,
        content: ExportContent,
        filename: &str,
    ) -> Result<PathBuf, SessionError> {
        let bytes = self.call(self.gateway.export_pdf(id, content)).await?;
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let path = self
            .download_dir
            .join(format!("{}.pdf", download_file_stem(filename)));
        tokio::fs::write(&path, &bytes).await?;
        info!(document_id = %id, %content, path = %path.display(), bytes = bytes.len(), "pdf exported");
        Ok(path)
    }

    /// Fetches `id` and makes it current, clearing the transcript. A newer
    /// selection discards the response entirely; a newer copy of the same
    /// document is kept, but the transcript is still cleared.
    async fn load_current(&self, id: &DocumentId) -> Result<(), SessionError> {
        let ticket = self.issue_ticket();
        self.inner.lock().await.selection_intent = Some(id.clone());

        let document = match self.call(self.gateway.get_document(id)).await {
            Ok(document) => document,
            Err(err) => {
                let mut inner = self.inner.lock().await;
                if inner.selection_intent.as_ref() == Some(id) {
                    inner.selection_intent = inner.current_id().cloned();
                }
                return Err(err);
            }
        };

        {
            let mut inner = self.inner.lock().await;
            if inner.selection_intent.as_ref() != Some(id) {
                debug!(document_id = %id, ticket, "discarding superseded selection");
                return Ok(());
            }
            let fresh = inner.is_fresh(id, ticket);
            if fresh {
                inner.record_applied(id, ticket);
            }
            if fresh || inner.current_id() != Some(id) {
                inner.current_document = Some(document);
            } else {
                debug!(document_id = %id, ticket, "keeping newer copy of the selected document");
            }
            inner.clear_transcript();
        }
        self.emit(SessionEvent::CurrentDocumentChanged(Some(id.clone())));
        self.emit(SessionEvent::TranscriptUpdated { len: 0 });
        Ok(())
    }

    /// Re-fetches `id` after a mutation, but only while it is still current.
    async fn refresh_current(&self, id: &DocumentId) -> Result<(), SessionError> {
        let ticket = self.issue_ticket();
        let is_current = self.inner.lock().await.current_id() == Some(id);
        if !is_current {
            return Ok(());
        }

        let document = self.call(self.gateway.get_document(id)).await?;
        {
            let mut inner = self.inner.lock().await;
            let still_wanted = inner.current_id() == Some(id)
                && inner.selection_intent.as_ref() == Some(id)
                && inner.is_fresh(id, ticket);
            if !still_wanted {
                debug!(document_id = %id, ticket, "discarding stale document refresh");
                return Ok(());
            }
            inner.record_applied(id, ticket);
            inner.current_document = Some(document);
        }
        self.emit(SessionEvent::CurrentDocumentChanged(Some(id.clone())));
        Ok(())
    }
}

/// Turns a user-supplied name into a single path component.
fn download_file_stem(filename: &str) -> String {
    let cleaned: String = filename
        .trim()
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\' | ':') || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').trim();
    if cleaned.is_empty() {
        "documento".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
