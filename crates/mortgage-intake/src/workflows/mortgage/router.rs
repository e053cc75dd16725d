use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::config::PipelineConfig;
use super::documents::DocumentUpload;
use super::domain::{DocumentType, LoanRequest, PipelineStage, RunId};
use super::errors::PipelineError;
use super::extraction::DocumentUnderstanding;
use super::pipeline::{PipelineRun, Submission};
use super::report::ReportError;
use super::repository::{RepositoryError, RunRepository};
use super::service::{IntakeServiceError, MortgageIntakeService};

/// Upper bound on a multipart submission (all documents together).
pub const MAX_SUBMISSION_BYTES: usize = 25 * 1024 * 1024;

const LOAN_AMOUNT_PART: &str = "loan_amount";

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    limit: Option<usize>,
}

/// Router builder exposing HTTP endpoints for intake, status, reports, and configuration.
pub fn intake_router<R, S>(service: Arc<MortgageIntakeService<R, S>>) -> Router
where
    R: RunRepository + 'static,
    S: DocumentUnderstanding + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            get(list_handler::<R, S>).post(submit_handler::<R, S>),
        )
        .route("/api/v1/applications/check", post(check_handler::<R, S>))
        .route("/api/v1/applications/:run_id", get(status_handler::<R, S>))
        .route(
            "/api/v1/applications/:run_id/report",
            get(report_handler::<R, S>),
        )
        .route(
            "/api/v1/config",
            get(config_handler::<R, S>).put(replace_config_handler::<R, S>),
        )
        .route("/api/v1/config/reload", post(reload_config_handler::<R, S>))
        .layer(DefaultBodyLimit::max(MAX_SUBMISSION_BYTES))
        .with_state(service)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({
        "error": message.into(),
    });
    (status, axum::Json(payload)).into_response()
}

fn service_error_response(error: IntakeServiceError) -> Response {
    let status = match &error {
        IntakeServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        IntakeServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        IntakeServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        IntakeServiceError::Report(ReportError::Incomplete(_)) => StatusCode::CONFLICT,
        IntakeServiceError::Report(_) => StatusCode::INTERNAL_SERVER_ERROR,
        IntakeServiceError::Config(_) => StatusCode::UNPROCESSABLE_ENTITY,
        IntakeServiceError::ConfigPathUnset => StatusCode::CONFLICT,
    };
    error_response(status, error.to_string())
}

/// 201 for anything the pipeline got past intake with; intake rejections map to 415/422.
fn run_response(run: &PipelineRun) -> Response {
    let status = match &run.failure {
        Some(failure) if failure.stage == PipelineStage::Intake => {
            let unsupported = failure
                .errors
                .iter()
                .any(|error| matches!(error, PipelineError::UnsupportedFormat { .. }));
            if unsupported {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            } else {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        }
        _ => StatusCode::CREATED,
    };
    (status, axum::Json(run.status_view())).into_response()
}

/// Read the multipart form: one file part per document type plus a `loan_amount` text part.
pub(crate) async fn read_submission(mut multipart: Multipart) -> Result<Submission, Response> {
    let mut loan_amount = None;
    let mut uploads = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(error) => return Err(error_response(error.status(), error.body_text())),
        };

        let name = field.name().unwrap_or_default().to_string();
        if name == LOAN_AMOUNT_PART {
            let raw = field
                .text()
                .await
                .map_err(|error| error_response(error.status(), error.body_text()))?;
            let amount = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|amount| amount.is_finite() && *amount > 0.0)
                .ok_or_else(|| {
                    error_response(
                        StatusCode::BAD_REQUEST,
                        format!("loan_amount must be a positive number, got '{}'", raw.trim()),
                    )
                })?;
            loan_amount = Some(amount);
            continue;
        }

        let Some(document_type) = DocumentType::from_key(&name) else {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                format!("unknown form part '{name}'"),
            ));
        };
        let file_name = field.file_name().unwrap_or(name.as_str()).to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|error| error_response(error.status(), error.body_text()))?;

        uploads.push(DocumentUpload::new(
            document_type,
            file_name,
            mime_type,
            bytes.to_vec(),
        ));
    }

    let loan_amount = loan_amount
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "loan_amount is required"))?;

    Ok(Submission {
        loan: LoanRequest { loan_amount },
        uploads,
    })
}

pub(crate) async fn submit_handler<R, S>(
    State(service): State<Arc<MortgageIntakeService<R, S>>>,
    multipart: Multipart,
) -> Response
where
    R: RunRepository + 'static,
    S: DocumentUnderstanding + 'static,
{
    let submission = match read_submission(multipart).await {
        Ok(submission) => submission,
        Err(response) => return response,
    };

    match service.submit(submission).await {
        Ok(run) => run_response(&run),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn check_handler<R, S>(
    State(service): State<Arc<MortgageIntakeService<R, S>>>,
    multipart: Multipart,
) -> Response
where
    R: RunRepository + 'static,
    S: DocumentUnderstanding + 'static,
{
    let submission = match read_submission(multipart).await {
        Ok(submission) => submission,
        Err(response) => return response,
    };

    match service.check(submission).await {
        Ok(run) => run_response(&run),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn list_handler<R, S>(
    State(service): State<Arc<MortgageIntakeService<R, S>>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: RunRepository + 'static,
    S: DocumentUnderstanding + 'static,
{
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
    match service.recent(limit) {
        Ok(runs) => {
            let views: Vec<_> = runs.iter().map(PipelineRun::status_view).collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn status_handler<R, S>(
    State(service): State<Arc<MortgageIntakeService<R, S>>>,
    Path(run_id): Path<String>,
) -> Response
where
    R: RunRepository + 'static,
    S: DocumentUnderstanding + 'static,
{
    match service.get(&RunId(run_id)) {
        Ok(run) => (StatusCode::OK, axum::Json(run.status_view())).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn report_handler<R, S>(
    State(service): State<Arc<MortgageIntakeService<R, S>>>,
    Path(run_id): Path<String>,
) -> Response
where
    R: RunRepository + 'static,
    S: DocumentUnderstanding + 'static,
{
    match service.report(&RunId(run_id)) {
        Ok(artifact) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, artifact.content_type),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", artifact.file_name),
                ),
            ],
            artifact.bytes,
        )
            .into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn config_handler<R, S>(
    State(service): State<Arc<MortgageIntakeService<R, S>>>,
) -> Response
where
    R: RunRepository + 'static,
    S: DocumentUnderstanding + 'static,
{
    let config = service.config();
    (StatusCode::OK, axum::Json(config.as_ref().clone())).into_response()
}

pub(crate) async fn replace_config_handler<R, S>(
    State(service): State<Arc<MortgageIntakeService<R, S>>>,
    axum::Json(config): axum::Json<PipelineConfig>,
) -> Response
where
    R: RunRepository + 'static,
    S: DocumentUnderstanding + 'static,
{
    match service.replace_config(config) {
        Ok(config) => (StatusCode::OK, axum::Json(config.as_ref().clone())).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn reload_config_handler<R, S>(
    State(service): State<Arc<MortgageIntakeService<R, S>>>,
) -> Response
where
    R: RunRepository + 'static,
    S: DocumentUnderstanding + 'static,
{
    match service.reload_config() {
        Ok(config) => (StatusCode::OK, axum::Json(config.as_ref().clone())).into_response(),
        Err(error) => service_error_response(error),
    }
}
