//! HTTP access to the document-analysis backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Body, Client, Response,
};
use shared::{
    domain::{DocumentId, ExportContent},
    error::ApiErrorBody,
    protocol::{
        ChatRequest, ChatResponse, Document, DocumentSummary, GenerateSchemaRequest,
        GenerateSchemaResponse, GenerateSummaryRequest, GenerateSummaryResponse, StatusMessage,
        UploadResponse,
    },
};
use tracing::debug;
use url::Url;

use crate::{
    error::GatewayError,
    upload::{progress_stream, ProgressFn, UploadFile},
};

/// Calls exposed by the backend. Every method maps to exactly one request.
#[async_trait]
pub trait DocumentGateway: Send + Sync {
    async fn health(&self) -> Result<StatusMessage, GatewayError>;
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, GatewayError>;
    async fn get_document(&self, id: &DocumentId) -> Result<Document, GatewayError>;
    async fn upload(
        &self,
        file: UploadFile,
        progress: ProgressFn,
    ) -> Result<UploadResponse, GatewayError>;
    async fn generate_summary(
        &self,
        request: GenerateSummaryRequest,
    ) -> Result<GenerateSummaryResponse, GatewayError>;
    async fn generate_schema(
        &self,
        request: GenerateSchemaRequest,
    ) -> Result<GenerateSchemaResponse, GatewayError>;
    async fn export_pdf(
        &self,
        id: &DocumentId,
        content: ExportContent,
    ) -> Result<Vec<u8>, GatewayError>;
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, GatewayError>;
    async fn delete_document(&self, id: &DocumentId) -> Result<StatusMessage, GatewayError>;
}

pub struct HttpGateway {
    http: Client,
    base: Url,
}

impl HttpGateway {
    /// `api_endpoint` is the backend base path, e.g. `http://localhost:8001/api`.
    pub fn new(api_endpoint: &str) -> Result<Self, GatewayError> {
        Self::with_client(api_endpoint, Client::new())
    }

    pub fn with_timeout(api_endpoint: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder().timeout(timeout).build()?;
        Self::with_client(api_endpoint, http)
    }

    pub fn with_client(api_endpoint: &str, http: Client) -> Result<Self, GatewayError> {
        let base = Url::parse(api_endpoint.trim())
            .map_err(|err| GatewayError::Endpoint(format!("{api_endpoint}: {err}")))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(GatewayError::Endpoint(format!(
                "{api_endpoint}: expected an http(s) base url"
            )));
        }
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    let detail = ApiErrorBody::parse(&body)
        .and_then(|body| body.detail_message().map(str::to_string));
    debug!(status = status.as_u16(), ?detail, "backend request failed");
    Err(GatewayError::Status {
        status: status.as_u16(),
        detail,
    })
}

#[async_trait]
impl DocumentGateway for HttpGateway {
    async fn health(&self) -> Result<StatusMessage, GatewayError> {
        let response = self.http.get(self.endpoint(&[""])).send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, GatewayError> {
        let response = self.http.get(self.endpoint(&["documents"])).send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Document, GatewayError> {
        let response = self
            .http
            .get(self.endpoint(&["document", id.as_str()]))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn upload(
        &self,
        file: UploadFile,
        progress: ProgressFn,
    ) -> Result<UploadResponse, GatewayError> {
        let bytes = file.read_all().await?;
        let length = bytes.len() as u64;
        let part = Part::stream_with_length(
            Body::wrap_stream(progress_stream(bytes, progress)),
            length,
        )
        .file_name(file.filename.clone())
        .mime_str(&file.mime_type)?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(self.endpoint(&["upload"]))
            .multipart(form)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn generate_summary(
        &self,
        request: GenerateSummaryRequest,
    ) -> Result<GenerateSummaryResponse, GatewayError> {
        let response = self
            .http
            .post(self.endpoint(&["generate-summary"]))
            .json(&request)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn generate_schema(
        &self,
        request: GenerateSchemaRequest,
    ) -> Result<GenerateSchemaResponse, GatewayError> {
        let response = self
            .http
            .post(self.endpoint(&["generate-schema"]))
            .json(&request)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn export_pdf(
        &self,
        id: &DocumentId,
        content: ExportContent,
    ) -> Result<Vec<u8>, GatewayError> {
        let response = self
            .http
            .get(self.endpoint(&["export-pdf", id.as_str()]))
            .query(&[("content_type", content.as_str())])
            .send()
            .await?;
        let bytes = check_status(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, GatewayError> {
        let response = self
            .http
            .post(self.endpoint(&["chat"]))
            .json(&request)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn delete_document(&self, id: &DocumentId) -> Result<StatusMessage, GatewayError> {
        let response = self
            .http
            .delete(self.endpoint(&["document", id.as_str()]))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
