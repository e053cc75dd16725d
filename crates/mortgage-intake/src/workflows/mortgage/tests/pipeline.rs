use std::sync::Arc;
use std::time::Duration;

use super::common::*;

use crate::workflows::mortgage::domain::fields;
use crate::workflows::mortgage::{
    CannedDocumentService, CreditDimension, Decision, DocumentType, DocumentUpload, Pipeline,
    PipelineConfigHandle, PipelineError, PipelineStage, ServiceError,
};

fn pipeline(service: CannedDocumentService) -> Pipeline<CannedDocumentService> {
    Pipeline::new(Arc::new(service), PipelineConfigHandle::new(fast_config()))
}

#[tokio::test]
async fn missing_bank_statement_halts_before_extraction() {
    let service = Arc::new(strong_applicant_service());
    let pipeline = Pipeline::new(service.clone(), PipelineConfigHandle::new(fast_config()));
    let submission = submission_with(&[
        DocumentType::Identity,
        DocumentType::Payslip,
        DocumentType::PropertyAppraisal,
        DocumentType::CreditReport,
    ]);

    let run = pipeline.run(submission).await;

    assert!(!run.succeeded());
    assert_eq!(run.stage, PipelineStage::Validation);
    let validation = run.validation.as_ref().expect("validation recorded");
    assert!(!validation.passed());
    assert!(validation.missing_documents().contains(&DocumentType::BankStatement));
    assert!(run.applicant.is_none());
    assert!(run.decision.is_none());
    assert_eq!(
        run.failure.as_ref().map(|failure| failure.errors.clone()),
        Some(vec![PipelineError::MissingDocument {
            document_type: DocumentType::BankStatement
        }])
    );
    for document_type in DocumentType::ordered() {
        assert_eq!(service.query_attempts(document_type), 0);
    }
    assert_eq!(run.status_view().status, "action_required");
}

#[tokio::test]
async fn missing_document_is_reported_even_when_the_service_is_down() {
    let service = Arc::new(strong_applicant_service().failing_detection(
        DocumentType::Identity,
        ServiceError::Unavailable("ocr backend down".to_string()),
    ));
    let pipeline = Pipeline::new(service.clone(), PipelineConfigHandle::new(fast_config()));
    let submission = submission_with(&[
        DocumentType::Identity,
        DocumentType::Payslip,
        DocumentType::PropertyAppraisal,
        DocumentType::CreditReport,
    ]);

    let run = pipeline.run(submission).await;

    assert_eq!(run.stage, PipelineStage::Validation);
    let validation = run.validation.as_ref().expect("validation recorded");
    assert_eq!(validation.missing_documents(), vec![DocumentType::BankStatement]);
    assert!(validation.incomplete_documents().is_empty());
    assert_eq!(
        run.failure.as_ref().map(|failure| failure.errors.clone()),
        Some(vec![PipelineError::MissingDocument {
            document_type: DocumentType::BankStatement
        }])
    );
    assert_eq!(run.status_view().status, "action_required");
}

#[tokio::test]
async fn slow_service_times_out_during_extraction() {
    let service = strong_applicant_service().with_latency(Duration::from_millis(100));
    let mut config = fast_config();
    config.retry.timeout_ms = 20;
    let pipeline = Pipeline::new(Arc::new(service), PipelineConfigHandle::new(config));

    let run = pipeline.run(complete_submission()).await;

    assert_eq!(run.stage, PipelineStage::Extraction);
    assert!(run.validation.as_ref().map(|v| v.passed()).unwrap_or(false));
    assert!(run.applicant.is_none());
    assert!(run.decision.is_none());
    let failure = run.failure.as_ref().expect("failure recorded");
    assert!(failure.errors.iter().any(|error| matches!(
        error,
        PipelineError::ExtractionTimeout { attempts: 3, field: Some(_), .. }
    )));
    assert_eq!(run.status_view().status, "failed");
}

#[tokio::test]
async fn strong_applicant_is_approved_end_to_end() {
    let run = pipeline(strong_applicant_service())
        .run(complete_submission())
        .await;

    assert!(run.succeeded(), "unexpected failure: {:?}", run.failure);
    assert_eq!(run.stage, PipelineStage::Completed);
    assert_eq!(run.documents.len(), 5);
    assert!(run.completed_at >= run.submitted_at);

    let decision = run.decision.as_ref().expect("decision recorded");
    assert_eq!(decision.decision, Decision::Approved);
    assert_eq!(decision.factor_scores.len(), 5);
    assert!(decision.overall_score >= 70.0);
    assert_eq!(run.status_view().status, "decided");
}

#[tokio::test]
async fn persistent_payslip_failures_stop_before_assessment() {
    let service = Arc::new(strong_applicant_service().failing_queries(
        DocumentType::Payslip,
        ServiceError::Unavailable("ocr backend down".to_string()),
    ));
    let pipeline = Pipeline::new(service.clone(), PipelineConfigHandle::new(fast_config()));

    let run = pipeline.run(complete_submission()).await;

    assert_eq!(run.stage, PipelineStage::Extraction);
    assert!(run.validation.as_ref().map(|v| v.passed()).unwrap_or(false));
    assert!(run.applicant.is_none());
    assert!(run.decision.is_none());

    let failure = run.failure.as_ref().expect("failure recorded");
    match failure.errors.first() {
        Some(PipelineError::ExtractionServiceError {
            document_type,
            attempts,
            field,
            ..
        }) => {
            assert_eq!(*document_type, DocumentType::Payslip);
            assert_eq!(*attempts, 3);
            assert_eq!(field.as_deref(), Some(fields::EMPLOYMENT_YEARS));
        }
        other => panic!("expected extraction service error, got {other:?}"),
    }
    assert!(failure.errors.contains(&PipelineError::IncompleteRecord {
        dimensions: vec![CreditDimension::Conditions],
    }));
    // four payslip fields, three attempts each
    assert_eq!(service.query_attempts(DocumentType::Payslip), 12);
    assert_eq!(run.status_view().status, "failed");
}

#[tokio::test]
async fn conflicting_income_keeps_bank_statement_value() {
    let run = pipeline(conflicting_income_service())
        .run(complete_submission())
        .await;

    let record = run.applicant.as_ref().expect("applicant recorded");
    let income = record.get(fields::MONTHLY_INCOME).expect("income resolved");
    assert_eq!(income.value.as_f64(), Some(5_000.0));
    assert_eq!(income.source, DocumentType::BankStatement);
    assert!(record
        .notes()
        .iter()
        .any(|note| note.starts_with(fields::MONTHLY_INCOME)));
    assert!(!run.status_view().discrepancies.is_empty());
}

#[tokio::test]
async fn second_identity_upload_is_rejected_at_intake() {
    let submission = complete_submission().with_upload(DocumentUpload::new(
        DocumentType::Identity,
        "passport.docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        b"PK".to_vec(),
    ));

    let run = pipeline(strong_applicant_service()).run(submission).await;

    assert_eq!(run.stage, PipelineStage::Intake);
    assert!(run.validation.is_none());
    let errors = &run.failure.as_ref().expect("failure recorded").errors;
    assert!(matches!(
        errors.as_slice(),
        [PipelineError::DuplicateDocument {
            document_type: DocumentType::Identity
        }]
    ));
}

#[tokio::test]
async fn unsupported_format_is_reported_per_document() {
    let submission = submission_with(&[DocumentType::Identity, DocumentType::Payslip]).with_upload(
        DocumentUpload::new(DocumentType::CreditReport, "report.txt", "text/plain", b"750".to_vec()),
    );

    let run = pipeline(strong_applicant_service()).run(submission).await;

    assert_eq!(run.stage, PipelineStage::Intake);
    match run.failure.as_ref().map(|failure| failure.errors.as_slice()) {
        Some([PipelineError::UnsupportedFormat {
            document_type,
            mime_type,
        }]) => {
            assert_eq!(*document_type, DocumentType::CreditReport);
            assert_eq!(mime_type, "text/plain");
        }
        other => panic!("expected unsupported format, got {other:?}"),
    }
}

#[tokio::test]
async fn validate_only_stops_after_validation() {
    let service = Arc::new(strong_applicant_service());
    let pipeline = Pipeline::new(service.clone(), PipelineConfigHandle::new(fast_config()));

    let run = pipeline.validate_only(complete_submission()).await;

    assert!(run.succeeded());
    assert_eq!(run.stage, PipelineStage::Validation);
    assert!(run.validation.as_ref().map(|v| v.passed()).unwrap_or(false));
    assert!(run.applicant.is_none());
    assert!(run.decision.is_none());
    assert_eq!(service.query_attempts(DocumentType::Payslip), 0);
    assert_eq!(run.status_view().status, "validated");
}

#[tokio::test]
async fn swapped_configuration_applies_to_later_runs() {
    let handle = PipelineConfigHandle::new(fast_config());
    let pipeline = Pipeline::new(Arc::new(strong_applicant_service()), handle.clone());

    let before = pipeline.run(complete_submission()).await;

    let mut stricter = fast_config();
    stricter.scoring.thresholds.approve_threshold = 99.0;
    stricter.scoring.thresholds.reject_threshold = 50.0;
    handle.replace(stricter).expect("valid config");

    let after = pipeline.run(complete_submission()).await;

    assert_eq!(before.decision.map(|d| d.decision), Some(Decision::Approved));
    assert_eq!(after.decision.map(|d| d.decision), Some(Decision::ReferForReview));
    assert_ne!(before.run_id, after.run_id);
}
