//! Client side of the document-analysis service: the backend gateway and the
//! session controller that owns all state a front-end renders.

use async_trait::async_trait;
use shared::domain::{DocumentId, Theme};

pub mod cancel;
pub mod error;
pub mod gateway;
pub mod preferences;
mod session;
pub mod state;
pub mod upload;

pub use error::{GatewayError, SessionError};
pub use gateway::{DocumentGateway, HttpGateway};
pub use preferences::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use session::SessionController;
pub use state::{ChatEntry, EntryStatus, OperationKind, SessionSnapshot};
pub use upload::{UploadFile, UploadProgress, UploadRejection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// Transient message for the user, the equivalent of a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Notification(Notification),
    ThemeApplied(Theme),
    DocumentsUpdated { count: usize },
    CurrentDocumentChanged(Option<DocumentId>),
    TranscriptUpdated { len: usize },
    UploadProgress { percent: u8 },
    OperationStarted(OperationKind),
    OperationFinished(OperationKind),
}

/// Interactive yes/no prompt required before destructive operations.
#[async_trait]
pub trait Confirmation: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

pub struct AutoConfirm;

#[async_trait]
impl Confirmation for AutoConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}
