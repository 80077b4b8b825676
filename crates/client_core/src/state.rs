//! Session state owned by the controller and the read-only views handed out
//! to renderers.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        Arc,
    },
};

use shared::{
    domain::{ChatRole, DocumentId, SchemaOptions, SummaryOptions, Theme},
    protocol::{Document, DocumentSummary},
};
use tokio::sync::broadcast;

use crate::{error::SessionError, SessionEvent};

/// Long-running operations that may be in flight at most once each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Upload,
    SummaryGeneration,
    SchemaGeneration,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Upload => "upload",
            Self::SummaryGeneration => "summary generation",
            Self::SchemaGeneration => "schema generation",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// User message shown before the assistant answered.
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub id: u64,
    pub role: ChatRole,
    pub text: String,
    pub status: EntryStatus,
}

/// Read-only copy of the session for rendering.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub documents: Vec<DocumentSummary>,
    pub current_document: Option<Document>,
    pub uploading: bool,
    pub upload_percent: u8,
    pub generating_summary: bool,
    pub generating_schema: bool,
    pub summary_options: SummaryOptions,
    pub schema_options: SchemaOptions,
    pub transcript: Vec<ChatEntry>,
    pub chat_open: bool,
    pub theme: Theme,
}

impl SessionSnapshot {
    pub fn is_processing(&self) -> bool {
        self.generating_summary || self.generating_schema
    }

    pub fn current_id(&self) -> Option<&DocumentId> {
        self.current_document.as_ref().map(|document| &document.id)
    }
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub documents: Vec<DocumentSummary>,
    pub current_document: Option<Document>,
    /// Latest document the user asked to see; responses for anything else
    /// are stale.
    pub selection_intent: Option<DocumentId>,
    pub applied_tickets: HashMap<DocumentId, u64>,
    pub summary_options: SummaryOptions,
    pub schema_options: SchemaOptions,
    pub transcript: Vec<ChatEntry>,
    /// Bumped whenever the transcript is cleared.
    pub transcript_epoch: u64,
    pub next_entry_id: u64,
    pub chat_open: bool,
    pub theme: Theme,
}

impl SessionState {
    pub fn current_id(&self) -> Option<&DocumentId> {
        self.current_document.as_ref().map(|document| &document.id)
    }

    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
        self.transcript_epoch += 1;
    }

    pub fn push_entry(&mut self, role: ChatRole, text: String, status: EntryStatus) -> u64 {
        let id = self.next_entry_id;
        self.next_entry_id += 1;
        self.transcript.push(ChatEntry {
            id,
            role,
            text,
            status,
        });
        id
    }

    pub fn set_entry_status(&mut self, id: u64, status: EntryStatus) {
        if let Some(entry) = self.transcript.iter_mut().find(|entry| entry.id == id) {
            entry.status = status;
        }
    }

    /// Whether a response tagged with `ticket` may still replace `id`.
    pub fn is_fresh(&self, id: &DocumentId, ticket: u64) -> bool {
        self.applied_tickets
            .get(id)
            .map_or(true, |applied| ticket > *applied)
    }

    pub fn record_applied(&mut self, id: &DocumentId, ticket: u64) {
        self.applied_tickets.insert(id.clone(), ticket);
    }

    pub fn clear_selection(&mut self) {
        self.current_document = None;
        self.selection_intent = None;
        self.clear_transcript();
    }
}

/// In-progress flags readable without the state lock, so transfer progress
/// can be recorded from inside the body stream.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    upload: AtomicBool,
    summary: AtomicBool,
    schema: AtomicBool,
    upload_percent: AtomicU8,
}

impl InFlight {
    fn flag(&self, kind: OperationKind) -> &AtomicBool {
        match kind {
            OperationKind::Upload => &self.upload,
            OperationKind::SummaryGeneration => &self.summary,
            OperationKind::SchemaGeneration => &self.schema,
        }
    }

    pub fn is_active(&self, kind: OperationKind) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }

    pub fn upload_percent(&self) -> u8 {
        self.upload_percent.load(Ordering::Acquire)
    }

    /// Records a new percentage, returning true when it moved forward.
    pub fn advance_upload(&self, percent: u8) -> bool {
        self.upload_percent.fetch_max(percent, Ordering::AcqRel) < percent
    }

    pub fn begin(
        self: &Arc<Self>,
        kind: OperationKind,
        events: &broadcast::Sender<SessionEvent>,
    ) -> Result<OperationGuard, SessionError> {
        self.flag(kind)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::Busy(kind))?;
        if kind == OperationKind::Upload {
            self.upload_percent.store(0, Ordering::Release);
        }
        let _ = events.send(SessionEvent::OperationStarted(kind));
        Ok(OperationGuard {
            in_flight: Arc::clone(self),
            kind,
            events: events.clone(),
        })
    }
}

/// Returns its operation to idle when dropped, whatever path the operation
/// exited through.
pub(crate) struct OperationGuard {
    in_flight: Arc<InFlight>,
    kind: OperationKind,
    events: broadcast::Sender<SessionEvent>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        if self.kind == OperationKind::Upload {
            self.in_flight.upload_percent.store(0, Ordering::Release);
        }
        self.in_flight
            .flag(self.kind)
            .store(false, Ordering::Release);
        let _ = self.events.send(SessionEvent::OperationFinished(self.kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_of_same_kind_is_busy_until_guard_drops() {
        let in_flight = Arc::new(InFlight::default());
        let (events, _rx) = broadcast::channel(16);

        let guard = in_flight
            .begin(OperationKind::SummaryGeneration, &events)
            .expect("first begin");
        assert!(matches!(
            in_flight.begin(OperationKind::SummaryGeneration, &events),
            Err(SessionError::Busy(OperationKind::SummaryGeneration))
        ));
        let other = in_flight
            .begin(OperationKind::SchemaGeneration, &events)
            .expect("different kinds overlap");

        drop(guard);
        drop(other);
        assert!(!in_flight.is_active(OperationKind::SummaryGeneration));
        assert!(!in_flight.is_active(OperationKind::SchemaGeneration));
        assert!(in_flight
            .begin(OperationKind::SummaryGeneration, &events)
            .is_ok());
    }

    #[test]
    fn upload_percent_only_moves_forward_and_resets_on_drop() {
        let in_flight = Arc::new(InFlight::default());
        let (events, _rx) = broadcast::channel(16);
        let guard = in_flight
            .begin(OperationKind::Upload, &events)
            .expect("begin");

        assert!(in_flight.advance_upload(40));
        assert!(!in_flight.advance_upload(20));
        assert_eq!(in_flight.upload_percent(), 40);

        drop(guard);
        assert_eq!(in_flight.upload_percent(), 0);
    }

    #[test]
    fn tickets_older_than_the_applied_one_are_stale() {
        let mut state = SessionState::default();
        let id = DocumentId::new("d1");
        assert!(state.is_fresh(&id, 1));
        state.record_applied(&id, 5);
        assert!(!state.is_fresh(&id, 4));
        assert!(!state.is_fresh(&id, 5));
        assert!(state.is_fresh(&id, 6));
    }

    #[test]
    fn clearing_the_transcript_bumps_the_epoch() {
        let mut state = SessionState::default();
        state.push_entry(ChatRole::User, "ciao".to_string(), EntryStatus::Pending);
        let epoch = state.transcript_epoch;
        state.clear_transcript();
        assert!(state.transcript.is_empty());
        assert_eq!(state.transcript_epoch, epoch + 1);
    }
}
