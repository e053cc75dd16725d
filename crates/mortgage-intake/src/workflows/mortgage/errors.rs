use serde::{Deserialize, Serialize};

use super::domain::{CreditDimension, DocumentType, PipelineStage};

/// Failure taxonomy captured on a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineError {
    #[error("required document missing: {document_type}")]
    MissingDocument { document_type: DocumentType },
    #[error("{document_type} is missing required fields: {}", .missing_fields.join(", "))]
    IncompleteDocument {
        document_type: DocumentType,
        missing_fields: Vec<String>,
    },
    #[error("document service timed out reading {document_type}{} after {attempts} attempt(s)", field_suffix(.field))]
    ExtractionTimeout {
        document_type: DocumentType,
        field: Option<String>,
        attempts: u32,
    },
    #[error("document service failed reading {document_type}{} after {attempts} attempt(s): {detail}", field_suffix(.field))]
    ExtractionServiceError {
        document_type: DocumentType,
        field: Option<String>,
        attempts: u32,
        detail: String,
    },
    #[error("unsupported format '{mime_type}' for {document_type}; upload a PDF, JPEG, or PNG")]
    UnsupportedFormat {
        document_type: DocumentType,
        mime_type: String,
    },
    #[error("{document_type} was uploaded more than once")]
    DuplicateDocument { document_type: DocumentType },
    #[error("extracted data cannot support assessment; nothing resolved for {}", join_dimensions(.dimensions))]
    IncompleteRecord { dimensions: Vec<CreditDimension> },
}

impl PipelineError {
    pub const fn kind(&self) -> &'static str {
        match self {
            PipelineError::MissingDocument { .. } => "missing_document",
            PipelineError::IncompleteDocument { .. } => "incomplete_document",
            PipelineError::ExtractionTimeout { .. } => "extraction_timeout",
            PipelineError::ExtractionServiceError { .. } => "extraction_service_error",
            PipelineError::UnsupportedFormat { .. } => "unsupported_format",
            PipelineError::DuplicateDocument { .. } => "duplicate_document",
            PipelineError::IncompleteRecord { .. } => "incomplete_record",
        }
    }

    /// Errors the applicant can fix by uploading different documents.
    pub const fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingDocument { .. }
                | PipelineError::IncompleteDocument { .. }
                | PipelineError::UnsupportedFormat { .. }
                | PipelineError::DuplicateDocument { .. }
        )
    }
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(name) => format!(" ({name})"),
        None => String::new(),
    }
}

fn join_dimensions(dimensions: &[CreditDimension]) -> String {
    dimensions
        .iter()
        .map(|dimension| dimension.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Structured failure reason recorded on a run instead of propagating past the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub stage: PipelineStage,
    pub errors: Vec<PipelineError>,
}

impl RunFailure {
    pub fn new(stage: PipelineStage, errors: Vec<PipelineError>) -> Self {
        Self { stage, errors }
    }

    pub fn summary(&self) -> String {
        if self.errors.is_empty() {
            return format!("failed during {}", self.stage.label());
        }

        let details = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        format!("failed during {}: {}", self.stage.label(), details)
    }

    pub fn is_user_correctable(&self) -> bool {
        !self.errors.is_empty() && self.errors.iter().all(PipelineError::is_user_correctable)
    }
}
