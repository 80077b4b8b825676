use thiserror::Error;

use crate::{state::OperationKind, upload::UploadRejection};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("backend returned status {status}{}", detail_suffix(.detail))]
    Status { status: u16, detail: Option<String> },
    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid api endpoint: {0}")]
    Endpoint(String),
    #[error("failed to read upload source: {0}")]
    Io(#[from] std::io::Error),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|detail| format!(": {detail}"))
        .unwrap_or_default()
}

impl GatewayError {
    /// Human-readable detail supplied by the backend, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(#[from] UploadRejection),
    #[error("{0} already in progress")]
    Busy(OperationKind),
    #[error("operation declined by user")]
    Declined,
    #[error("request cancelled by session shutdown")]
    Cancelled,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Message shown to the user: server detail when present, otherwise the
    /// caller's fallback text.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Validation(rejection) => rejection.to_string(),
            Self::Gateway(err) => err.detail().unwrap_or(fallback).to_string(),
            _ => fallback.to_string(),
        }
    }
}
