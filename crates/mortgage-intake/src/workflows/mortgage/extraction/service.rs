use std::future::Future;

use serde::{Deserialize, Serialize};

use super::super::documents::UploadedDocument;

/// Raw answer for a single field query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAnswer {
    pub value: String,
    /// Reliability estimate in `0.0..=1.0`.
    pub confidence: f32,
}

impl FieldAnswer {
    pub fn new(value: impl Into<String>, confidence: f32) -> Self {
        Self {
            value: value.into(),
            confidence,
        }
    }
}

/// Errors surfaced by a document-understanding backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("document service unavailable: {0}")]
    Unavailable(String),
    #[error("document service returned malformed output: {0}")]
    Malformed(String),
    #[error("document service rejected the request: {0}")]
    Rejected(String),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_) | ServiceError::Malformed(_))
    }
}

/// Boundary to the external OCR and question-answering collaborator.
///
/// Implementations may be slow or unreliable; the extractor wraps every call in the configured
/// timeout and retry policy.
pub trait DocumentUnderstanding: Send + Sync {
    /// Return the subset of `fields` that can be located in `document`.
    fn locate_fields(
        &self,
        document: &UploadedDocument,
        fields: &[String],
    ) -> impl Future<Output = Result<Vec<String>, ServiceError>> + Send;

    /// Answer a single field query against `document`.
    fn query_field(
        &self,
        document: &UploadedDocument,
        field: &str,
    ) -> impl Future<Output = Result<FieldAnswer, ServiceError>> + Send;
}
