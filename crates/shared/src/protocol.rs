use serde::{Deserialize, Serialize};

use crate::domain::{AccuracyLevel, ChatId, DocumentId, SchemaType, SummaryLength};

/// Entry of `GET /documents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub filename: String,
    pub content_type: String,
    pub file_size: u64,
    #[serde(default)]
    pub has_summary: bool,
    #[serde(default)]
    pub has_schema: bool,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_preview: Option<String>,
}

/// Full record of `GET /document/{id}`.
///
/// Timestamps stay as the ISO-8601 text the backend stores; the client only
/// displays them. `summary_type` and `schema_type` are whatever token the
/// record was generated with, so they are kept as text; use
/// [`Document::summary_length`] and [`Document::schema_kind`] for the known
/// options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub content_type: String,
    pub file_size: u64,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub summary_text: Option<String>,
    #[serde(default)]
    pub summary_type: Option<String>,
    #[serde(default)]
    pub mindmap_schema: Option<String>,
    #[serde(default)]
    pub schema_type: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Document {
    pub fn has_summary(&self) -> bool {
        self.summary_text
            .as_deref()
            .is_some_and(|text| !text.is_empty())
    }

    pub fn has_schema(&self) -> bool {
        self.mindmap_schema
            .as_deref()
            .is_some_and(|text| !text.is_empty())
    }

    pub fn extracted_text(&self) -> &str {
        self.extracted_text.as_deref().unwrap_or_default()
    }

    /// `None` when absent or not one of the lengths this client offers.
    pub fn summary_length(&self) -> Option<SummaryLength> {
        self.summary_type.as_deref()?.parse().ok()
    }

    pub fn schema_kind(&self) -> Option<SchemaType> {
        self.schema_type.as_deref()?.parse().ok()
    }
}

/// Response of `POST /upload`. `extracted_text` is a preview truncated by
/// the server; `text_length` is the length of the full text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: DocumentId,
    pub filename: String,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub text_length: u64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateSummaryRequest {
    pub document_id: DocumentId,
    pub summary_type: SummaryLength,
    pub accuracy_level: AccuracyLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateSummaryResponse {
    pub document_id: DocumentId,
    pub summary: String,
    pub summary_type: SummaryLength,
    pub accuracy_level: AccuracyLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateSchemaRequest {
    pub document_id: DocumentId,
    pub schema_type: SchemaType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateSchemaResponse {
    pub document_id: DocumentId,
    pub schema: String,
    pub schema_type: SchemaType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub response: String,
    #[serde(default)]
    pub chat_id: Option<ChatId>,
}

/// Generic `{message}` acknowledgement used by delete and the API root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_document_detail_with_missing_optionals() {
        let raw = r#"{
            "id": "d1",
            "filename": "notes.pdf",
            "content_type": "application/pdf",
            "file_size": 2048,
            "extracted_text": "hello",
            "summary_text": null,
            "created_at": "2025-01-01T10:00:00+00:00"
        }"#;
        let document: Document = serde_json::from_str(raw).expect("decode");
        assert_eq!(document.id, DocumentId::new("d1"));
        assert_eq!(document.extracted_text(), "hello");
        assert!(!document.has_summary());
        assert!(!document.has_schema());
        assert!(document.updated_at.is_none());
    }

    #[test]
    fn document_detail_keeps_unknown_generation_tokens() {
        let raw = r#"{
            "id": "d2",
            "filename": "verbale.pdf",
            "content_type": "application/pdf",
            "file_size": 10,
            "summary_text": "Sintesi",
            "summary_type": "lungo",
            "mindmap_schema": "A -> B",
            "schema_type": "cascata",
            "created_at": "2025-01-01T10:00:00+00:00"
        }"#;
        let document: Document = serde_json::from_str(raw).expect("decode");
        assert!(document.has_summary());
        assert_eq!(document.summary_type.as_deref(), Some("lungo"));
        assert_eq!(document.summary_length(), None);
        assert_eq!(document.schema_kind(), Some(SchemaType::Cascata));
    }

    #[test]
    fn chat_request_omits_absent_document() {
        let request = ChatRequest {
            document_id: None,
            message: "ciao".to_string(),
            context: None,
        };
        let encoded = serde_json::to_value(&request).expect("encode");
        assert_eq!(encoded, serde_json::json!({ "message": "ciao" }));
    }

    #[test]
    fn summary_request_uses_backend_field_names() {
        let request = GenerateSummaryRequest {
            document_id: DocumentId::new("d1"),
            summary_type: SummaryLength::Breve,
            accuracy_level: AccuracyLevel::Standard,
        };
        let encoded = serde_json::to_value(&request).expect("encode");
        assert_eq!(
            encoded,
            serde_json::json!({
                "document_id": "d1",
                "summary_type": "breve",
                "accuracy_level": "standard"
            })
        );
    }
}
