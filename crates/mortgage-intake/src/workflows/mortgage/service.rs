use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use super::config::{PipelineConfig, PipelineConfigError, PipelineConfigHandle};
use super::domain::RunId;
use super::extraction::DocumentUnderstanding;
use super::pipeline::{Pipeline, PipelineRun, Submission};
use super::report::{ReportArtifact, ReportError, ReportRenderer, TextReportRenderer};
use super::repository::{RepositoryError, RunRepository};

/// Service composing the pipeline, run repository, and report renderer.
pub struct MortgageIntakeService<R, S> {
    pipeline: Pipeline<S>,
    repository: Arc<R>,
    renderer: Arc<dyn ReportRenderer>,
    config_path: Option<PathBuf>,
}

impl<R, S> MortgageIntakeService<R, S>
where
    R: RunRepository + 'static,
    S: DocumentUnderstanding + 'static,
{
    pub fn new(repository: Arc<R>, service: Arc<S>, config: PipelineConfigHandle) -> Self {
        Self {
            pipeline: Pipeline::new(service, config),
            repository,
            renderer: Arc::new(TextReportRenderer),
            config_path: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// File that [`reload_config`](Self::reload_config) re-reads.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Run the full pipeline and persist the run, successful or not.
    pub async fn submit(&self, submission: Submission) -> Result<PipelineRun, IntakeServiceError> {
        let run = self.pipeline.run(submission).await;
        Ok(self.repository.insert(run)?)
    }

    /// Completeness check only; the stored run never carries a decision.
    pub async fn check(&self, submission: Submission) -> Result<PipelineRun, IntakeServiceError> {
        let run = self.pipeline.validate_only(submission).await;
        Ok(self.repository.insert(run)?)
    }

    pub fn get(&self, run_id: &RunId) -> Result<PipelineRun, IntakeServiceError> {
        let run = self
            .repository
            .fetch(run_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(run)
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<PipelineRun>, IntakeServiceError> {
        Ok(self.repository.recent(limit)?)
    }

    pub fn report(&self, run_id: &RunId) -> Result<ReportArtifact, IntakeServiceError> {
        let run = self.get(run_id)?;
        Ok(self.renderer.render(&run)?)
    }

    pub fn config(&self) -> Arc<PipelineConfig> {
        self.pipeline.config().current()
    }

    pub fn replace_config(
        &self,
        config: PipelineConfig,
    ) -> Result<Arc<PipelineConfig>, IntakeServiceError> {
        Ok(self.pipeline.config().replace(config)?)
    }

    pub fn reload_config(&self) -> Result<Arc<PipelineConfig>, IntakeServiceError> {
        let path = self
            .config_path
            .as_ref()
            .ok_or(IntakeServiceError::ConfigPathUnset)?;
        let config = self.pipeline.config().reload_from_path(path)?;
        info!(path = %path.display(), "pipeline configuration reloaded");
        Ok(config)
    }
}

/// Error raised by the intake service.
#[derive(Debug, thiserror::Error)]
pub enum IntakeServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Config(#[from] PipelineConfigError),
    #[error("no pipeline config path is configured")]
    ConfigPathUnset,
}
