use chrono::{DateTime, Utc};
use serde::Serialize;

use super::assessment::Decision;
use super::documents::DocumentSummary;
use super::domain::{DocumentType, PipelineStage, RunId};
use super::errors::PipelineError;
use super::pipeline::PipelineRun;

/// Storage abstraction so the service module can be exercised in isolation.
pub trait RunRepository: Send + Sync {
    fn insert(&self, run: PipelineRun) -> Result<PipelineRun, RepositoryError>;
    fn fetch(&self, id: &RunId) -> Result<Option<PipelineRun>, RepositoryError>;
    /// Most recently submitted runs first.
    fn recent(&self, limit: usize) -> Result<Vec<PipelineRun>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("run already exists")]
    Conflict,
    #[error("run not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Applicant-facing view of a run's progress and outcome.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatusView {
    pub run_id: RunId,
    pub status: &'static str,
    pub stage: PipelineStage,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub documents: Vec<DocumentSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_documents: Vec<DocumentType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub incomplete_documents: Vec<DocumentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub discrepancies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<PipelineError>,
}
