//! Mortgage application intake: validate the uploaded documents, extract applicant data through
//! a document-understanding service, and score the application with the Five C's of credit.

pub mod assessment;
pub mod config;
pub mod documents;
pub mod domain;
pub mod errors;
pub mod extraction;
pub mod pipeline;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use assessment::{
    Assessor, CreditFactorScore, Decision, DecisionThresholds, FactorWeights, RubricThresholds,
    ScoringConfig, UnderwritingDecision,
};
pub use config::{PipelineConfig, PipelineConfigError, PipelineConfigHandle, RequiredFieldSpec};
pub use documents::{DocumentStore, DocumentSummary, DocumentUpload, UploadedDocument};
pub use domain::{
    fields, CreditDimension, DocumentType, FieldValue, LoanRequest, PipelineStage, RunId,
};
pub use errors::{PipelineError, RunFailure};
pub use extraction::{
    ApplicantRecord, ApplicantRecordBuilder, CannedDocumentService, CannedServiceError,
    DocumentUnderstanding, ExtractedField, Extractor, FieldAnswer, HttpDocumentService,
    RetryPolicy, ServiceError, UnresolvedField,
};
pub use pipeline::{Pipeline, PipelineRun, Submission};
pub use report::{
    JsonReportRenderer, ReportArtifact, ReportError, ReportRenderer, ReportView,
    TextReportRenderer,
};
pub use repository::{RepositoryError, RunRepository, RunStatusView};
pub use router::intake_router;
pub use service::{IntakeServiceError, MortgageIntakeService};
pub use validation::{
    check_presence, validate, DetectionReport, DocumentCheck, ValidatedDocuments, ValidationResult,
    ValidationStatus,
};
