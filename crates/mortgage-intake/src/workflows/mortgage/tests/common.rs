use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::workflows::mortgage::domain::fields;
use crate::workflows::mortgage::{
    ApplicantRecord, CannedDocumentService, DocumentStore, DocumentType, DocumentUpload,
    ExtractedField, FieldValue, MortgageIntakeService, PipelineConfig, PipelineConfigHandle,
    PipelineRun, RepositoryError, RetryPolicy, RunId, RunRepository, Submission,
};

pub(super) const LOAN_AMOUNT: f64 = 150_000.0;

pub(super) fn upload(document_type: DocumentType) -> DocumentUpload {
    DocumentUpload::new(
        document_type,
        format!("{}.pdf", document_type.key()),
        "application/pdf",
        b"%PDF-1.7 scanned".to_vec(),
    )
    .with_page_count(1)
}

pub(super) fn submission_with(types: &[DocumentType]) -> Submission {
    types
        .iter()
        .fold(Submission::new(LOAN_AMOUNT), |submission, document_type| {
            submission.with_upload(upload(*document_type))
        })
}

pub(super) fn complete_submission() -> Submission {
    submission_with(&DocumentType::ordered())
}

pub(super) fn complete_store() -> DocumentStore {
    DocumentStore::from_uploads(DocumentType::ordered().into_iter().map(upload))
        .expect("supported uploads")
}

/// Retry policy that keeps failure tests fast.
pub(super) fn fast_config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            timeout_ms: 200,
            initial_backoff_ms: 1,
            backoff_multiplier: 2.0,
            max_backoff_ms: 4,
        },
        ..PipelineConfig::default()
    }
}

/// Strong applicant: credit 720, income 5000, debt 1000, assets 40000, collateral twice the loan.
pub(super) fn strong_applicant_service() -> CannedDocumentService {
    CannedDocumentService::new()
        .with_answer(DocumentType::Identity, fields::FULL_NAME, "Dana Reyes", 0.95)
        .with_answer(DocumentType::Identity, fields::DATE_OF_BIRTH, "1988-03-14", 0.9)
        .with_answer(DocumentType::Identity, fields::ADDRESS, "12 Elm Street, Springfield", 0.9)
        .with_answer(DocumentType::Payslip, fields::FULL_NAME, "Dana Reyes", 0.9)
        .with_answer(DocumentType::Payslip, fields::MONTHLY_INCOME, "$5,000.00", 0.8)
        .with_answer(DocumentType::Payslip, fields::EMPLOYMENT_YEARS, "4 years", 0.85)
        .with_answer(DocumentType::Payslip, fields::EMPLOYER_NAME, "Acme Logistics", 0.9)
        .with_answer(DocumentType::BankStatement, fields::MONTHLY_INCOME, "5000", 0.9)
        .with_answer(DocumentType::BankStatement, fields::EXISTING_DEBT, "1,000", 0.85)
        .with_answer(DocumentType::BankStatement, fields::TOTAL_ASSETS, "40000", 0.9)
        .with_answer(DocumentType::PropertyAppraisal, fields::COLLATERAL_VALUE, "300000", 0.95)
        .with_answer(DocumentType::CreditReport, fields::CREDIT_SCORE, "720", 0.99)
}

/// Payslip and bank statement disagree on income; the bank statement is more confident.
pub(super) fn conflicting_income_service() -> CannedDocumentService {
    strong_applicant_service()
        .with_answer(DocumentType::Payslip, fields::MONTHLY_INCOME, "4800", 0.6)
        .with_answer(DocumentType::BankStatement, fields::MONTHLY_INCOME, "5000", 0.9)
}

pub(super) fn numeric(value: f64, source: DocumentType) -> ExtractedField {
    ExtractedField::new(FieldValue::Decimal(value), 0.9, source)
}

/// Applicant record built directly from numeric inputs, bypassing extraction.
pub(super) fn record_from(values: &[(&str, f64)]) -> ApplicantRecord {
    let mut builder = ApplicantRecord::builder();
    for (name, value) in values {
        builder.offer(*name, numeric(*value, DocumentType::BankStatement));
    }
    builder.build()
}

pub(super) fn strong_record() -> ApplicantRecord {
    record_from(&[
        (fields::CREDIT_SCORE, 720.0),
        (fields::MONTHLY_INCOME, 5_000.0),
        (fields::EXISTING_DEBT, 1_000.0),
        (fields::TOTAL_ASSETS, 40_000.0),
        (fields::COLLATERAL_VALUE, 300_000.0),
        (fields::EMPLOYMENT_YEARS, 4.0),
    ])
}

pub(super) fn build_service() -> (
    MortgageIntakeService<MemoryRepository, CannedDocumentService>,
    Arc<MemoryRepository>,
) {
    build_service_with(strong_applicant_service())
}

pub(super) fn build_service_with(
    documents: CannedDocumentService,
) -> (
    MortgageIntakeService<MemoryRepository, CannedDocumentService>,
    Arc<MemoryRepository>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let service = MortgageIntakeService::new(
        repository.clone(),
        Arc::new(documents),
        PipelineConfigHandle::new(fast_config()),
    );
    (service, repository)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) runs: Arc<Mutex<BTreeMap<RunId, PipelineRun>>>,
}

impl RunRepository for MemoryRepository {
    fn insert(&self, run: PipelineRun) -> Result<PipelineRun, RepositoryError> {
        let mut guard = self.runs.lock().expect("repository mutex poisoned");
        if guard.contains_key(&run.run_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(run.run_id.clone(), run.clone());
        Ok(run)
    }

    fn fetch(&self, id: &RunId) -> Result<Option<PipelineRun>, RepositoryError> {
        let guard = self.runs.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn recent(&self, limit: usize) -> Result<Vec<PipelineRun>, RepositoryError> {
        let guard = self.runs.lock().expect("repository mutex poisoned");
        let mut runs: Vec<_> = guard.values().cloned().collect();
        runs.sort_by(|left, right| right.submitted_at.cmp(&left.submitted_at));
        runs.truncate(limit);
        Ok(runs)
    }
}

pub(super) struct UnavailableRepository;

impl RunRepository for UnavailableRepository {
    fn insert(&self, _run: PipelineRun) -> Result<PipelineRun, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &RunId) -> Result<Option<PipelineRun>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn recent(&self, _limit: usize) -> Result<Vec<PipelineRun>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) const BOUNDARY: &str = "mortgage-intake-boundary";

/// Form part: `(name, Some((file_name, content_type)), body)`; text parts pass `None`.
pub(super) type Part<'a> = (&'a str, Option<(&'a str, &'a str)>, &'a [u8]);

pub(super) fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file {
            Some((file_name, content_type)) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub(super) fn multipart_request(uri: &str, parts: &[Part<'_>]) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::post(uri)
        .header(
            axum::http::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(axum::body::Body::from(multipart_body(parts)))
        .expect("request builds")
}

pub(super) fn complete_form_parts() -> Vec<Part<'static>> {
    vec![
        ("loan_amount", None, b"150000".as_slice()),
        ("identity", Some(("id.png", "image/png")), b"png bytes".as_slice()),
        ("payslip", Some(("payslip.pdf", "application/pdf")), b"%PDF payslip".as_slice()),
        ("bank_statement", Some(("statement.pdf", "application/pdf")), b"%PDF statement".as_slice()),
        ("property_appraisal", Some(("appraisal.pdf", "application/pdf")), b"%PDF appraisal".as_slice()),
        ("credit_report", Some(("credit.jpg", "image/jpeg")), b"jpeg bytes".as_slice()),
    ]
}

pub(super) async fn read_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("read body")
        .to_vec()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = read_body(response).await;
    serde_json::from_slice(&body).expect("json payload")
}
