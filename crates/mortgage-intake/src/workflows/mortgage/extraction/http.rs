use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::super::documents::UploadedDocument;
use super::service::{DocumentUnderstanding, FieldAnswer, ServiceError};
use crate::config::DocumentServiceConfig;

/// Document-understanding backend reached over HTTP.
///
/// Each call posts the document inline (base64) together with the question, mirroring a
/// "read this PDF and answer" tool. Timeouts are left to the extractor's retry policy.
#[derive(Debug, Clone)]
pub struct HttpDocumentService {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct DocumentPayload<'a> {
    document_type: &'a str,
    file_name: &'a str,
    mime_type: &'a str,
    content_base64: String,
}

#[derive(Serialize)]
struct LocateRequest<'a> {
    document: DocumentPayload<'a>,
    fields: &'a [String],
}

#[derive(Deserialize)]
struct LocateResponse {
    located: Vec<String>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    document: DocumentPayload<'a>,
    field: &'a str,
    question: String,
}

impl HttpDocumentService {
    pub fn new(config: &DocumentServiceConfig) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn payload<'a>(document: &'a UploadedDocument) -> DocumentPayload<'a> {
        DocumentPayload {
            document_type: document.document_type().key(),
            file_name: document.file_name(),
            mime_type: document.mime_type(),
            content_base64: STANDARD.encode(document.bytes()),
        }
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{path}", self.base_url);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|error| ServiceError::Unavailable(format!("{url}: {error}")))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ServiceError::Unavailable(format!("{url} returned {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Rejected(format!("{url} returned {status}: {body}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|error| ServiceError::Malformed(error.to_string()))
    }
}

impl DocumentUnderstanding for HttpDocumentService {
    async fn locate_fields(
        &self,
        document: &UploadedDocument,
        fields: &[String],
    ) -> Result<Vec<String>, ServiceError> {
        let request = LocateRequest {
            document: Self::payload(document),
            fields,
        };
        let response: LocateResponse = self.post("locate", &request).await?;
        Ok(response.located)
    }

    async fn query_field(
        &self,
        document: &UploadedDocument,
        field: &str,
    ) -> Result<FieldAnswer, ServiceError> {
        let request = QueryRequest {
            document: Self::payload(document),
            field,
            question: format!(
                "What is the applicant's {} according to this {}? Answer with the value only.",
                field.replace('_', " "),
                document.document_type().label().to_lowercase()
            ),
        };
        self.post("query", &request).await
    }
}
