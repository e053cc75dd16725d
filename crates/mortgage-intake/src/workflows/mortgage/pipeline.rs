use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::assessment::{Assessor, UnderwritingDecision};
use super::config::{PipelineConfig, PipelineConfigHandle};
use super::documents::{DocumentStore, DocumentSummary, DocumentUpload};
use super::domain::{LoanRequest, PipelineStage, RunId};
use super::errors::RunFailure;
use super::extraction::{ApplicantRecord, DocumentUnderstanding, Extractor};
use super::repository::RunStatusView;
use super::validation::{check_presence, validate, ValidationResult};

/// One application: the declared loan terms and the uploaded documents.
#[derive(Debug, Clone)]
pub struct Submission {
    pub loan: LoanRequest,
    pub uploads: Vec<DocumentUpload>,
}

impl Submission {
    pub fn new(loan_amount: f64) -> Self {
        Self {
            loan: LoanRequest { loan_amount },
            uploads: Vec::new(),
        }
    }

    pub fn with_upload(mut self, upload: DocumentUpload) -> Self {
        self.uploads.push(upload);
        self
    }
}

/// Record of a single pass through the pipeline. Artifacts past the failing stage stay empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: RunId,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub stage: PipelineStage,
    pub loan: LoanRequest,
    pub documents: Vec<DocumentSummary>,
    pub validation: Option<ValidationResult>,
    pub applicant: Option<ApplicantRecord>,
    pub decision: Option<UnderwritingDecision>,
    pub failure: Option<RunFailure>,
}

impl PipelineRun {
    fn started(run_id: RunId, loan: LoanRequest) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            submitted_at: now,
            completed_at: now,
            stage: PipelineStage::Intake,
            loan,
            documents: Vec::new(),
            validation: None,
            applicant: None,
            decision: None,
            failure: None,
        }
    }

    fn fail(mut self, failure: RunFailure) -> Self {
        warn!(
            run_id = %self.run_id,
            stage = failure.stage.label(),
            errors = failure.errors.len(),
            reason = %failure.summary(),
            "pipeline run halted"
        );
        self.stage = failure.stage;
        self.failure = Some(failure);
        self.finish()
    }

    fn finish(mut self) -> Self {
        self.completed_at = Utc::now();
        self
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn status_label(&self) -> &'static str {
        match (&self.failure, &self.decision) {
            (Some(failure), _) if failure.is_user_correctable() => "action_required",
            (Some(_), _) => "failed",
            (None, Some(_)) => "decided",
            (None, None) => "validated",
        }
    }

    pub fn status_view(&self) -> RunStatusView {
        RunStatusView {
            run_id: self.run_id.clone(),
            status: self.status_label(),
            stage: self.stage,
            submitted_at: self.submitted_at,
            completed_at: self.completed_at,
            documents: self.documents.clone(),
            missing_documents: self
                .validation
                .as_ref()
                .map(ValidationResult::missing_documents)
                .unwrap_or_default(),
            incomplete_documents: self
                .validation
                .as_ref()
                .map(ValidationResult::incomplete_documents)
                .unwrap_or_default(),
            decision: self.decision.as_ref().map(|decision| decision.decision),
            overall_score: self.decision.as_ref().map(|decision| decision.overall_score),
            justification: self
                .decision
                .as_ref()
                .map(|decision| decision.justification.clone()),
            discrepancies: self
                .applicant
                .as_ref()
                .map(|record| record.notes().to_vec())
                .unwrap_or_default(),
            errors: self
                .failure
                .as_ref()
                .map(|failure| failure.errors.clone())
                .unwrap_or_default(),
        }
    }
}

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_run_id() -> RunId {
    let id = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RunId(format!("run-{id:06}"))
}

/// Validate → extract → assess, short-circuiting on the first failing stage.
pub struct Pipeline<S> {
    service: Arc<S>,
    config: PipelineConfigHandle,
}

impl<S> Pipeline<S>
where
    S: DocumentUnderstanding,
{
    pub fn new(service: Arc<S>, config: PipelineConfigHandle) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &PipelineConfigHandle {
        &self.config
    }

    /// Process a submission end to end. Failures are recorded on the returned run.
    pub async fn run(&self, submission: Submission) -> PipelineRun {
        self.execute(submission, true).await
    }

    /// Stop after the completeness check; no fields are extracted and no decision is made.
    pub async fn validate_only(&self, submission: Submission) -> PipelineRun {
        self.execute(submission, false).await
    }

    async fn execute(&self, submission: Submission, assess: bool) -> PipelineRun {
        let config = self.config.current();
        let mut run = PipelineRun::started(next_run_id(), submission.loan);
        info!(
            run_id = %run.run_id,
            uploads = submission.uploads.len(),
            loan_amount = submission.loan.loan_amount,
            validate_only = !assess,
            "pipeline run started"
        );

        let store = match intake(submission.uploads) {
            Ok(store) => store,
            Err(failure) => return run.fail(failure),
        };
        run.documents = store.summaries();
        run.stage = PipelineStage::Validation;

        if let Some(validation) = check_presence(&store, &config.required_fields) {
            info!(
                run_id = %run.run_id,
                missing = validation.missing_documents().len(),
                "required documents missing; skipping field detection"
            );
            let issues = validation.issues();
            run.validation = Some(validation);
            return run.fail(RunFailure::new(PipelineStage::Validation, issues));
        }

        let extractor = Extractor::new(self.service.as_ref(), config.as_ref());
        let detections = match extractor.detect(&store).await {
            Ok(detections) => detections,
            Err(failure) => return run.fail(failure),
        };

        let validation = validate(&store, &config.required_fields, &detections);
        info!(
            run_id = %run.run_id,
            passed = validation.passed(),
            missing = validation.missing_documents().len(),
            incomplete = validation.incomplete_documents().len(),
            "validation finished"
        );
        run.validation = Some(validation.clone());

        let Some(documents) = validation.validated(&store, &detections) else {
            return run.fail(RunFailure::new(PipelineStage::Validation, validation.issues()));
        };
        if !assess {
            return run.finish();
        }

        run.stage = PipelineStage::Extraction;
        let record = match extractor.extract(documents).await {
            Ok(record) => record,
            Err(failure) => return run.fail(failure),
        };

        run.stage = PipelineStage::Assessment;
        let decision = assess_record(&config, &record, &run.loan);
        info!(
            run_id = %run.run_id,
            decision = decision.decision.label(),
            overall_score = decision.overall_score,
            "assessment finished"
        );

        run.applicant = Some(record);
        run.decision = Some(decision);
        run.stage = PipelineStage::Completed;
        run.finish()
    }
}

fn intake(uploads: Vec<DocumentUpload>) -> Result<DocumentStore, RunFailure> {
    let mut store = DocumentStore::new();
    let mut errors = Vec::new();
    for upload in uploads {
        if let Err(error) = store.upload(upload) {
            errors.push(error);
        }
    }

    if errors.is_empty() {
        Ok(store)
    } else {
        Err(RunFailure::new(PipelineStage::Intake, errors))
    }
}

fn assess_record(
    config: &PipelineConfig,
    record: &ApplicantRecord,
    loan: &LoanRequest,
) -> UnderwritingDecision {
    Assessor::new(config.scoring.clone()).assess(record, loan)
}
