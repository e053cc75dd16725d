use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use super::common::*;

use crate::workflows::mortgage::{intake_router, DocumentType};

fn router() -> axum::Router {
    let (service, _) = build_service();
    intake_router(Arc::new(service))
}

#[tokio::test]
async fn complete_submission_is_decided_and_reportable() {
    let router = router();

    let response = router
        .clone()
        .oneshot(multipart_request("/api/v1/applications", &complete_form_parts()))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["decision"], json!("approved"));
    assert_eq!(payload["stage"], json!("completed"));
    let run_id = payload["run_id"].as_str().expect("run id").to_string();

    let status = router
        .clone()
        .oneshot(
            Request::get(format!("/api/v1/applications/{run_id}"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(status.status(), StatusCode::OK);
    assert_eq!(read_json_body(status).await["run_id"], json!(run_id));

    let report = router
        .oneshot(
            Request::get(format!("/api/v1/applications/{run_id}/report"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(report.status(), StatusCode::OK);
    assert_eq!(
        report.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    let text = String::from_utf8(read_body(report).await).expect("utf-8 report");
    assert!(text.contains("DECISION: APPROVED"));
    assert!(text.contains(&run_id));
}

#[tokio::test]
async fn missing_document_is_recorded_and_has_no_report() {
    let router = router();
    let parts: Vec<_> = complete_form_parts()
        .into_iter()
        .filter(|(name, _, _)| *name != DocumentType::BankStatement.key())
        .collect();

    let response = router
        .clone()
        .oneshot(multipart_request("/api/v1/applications", &parts))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], json!("action_required"));
    assert_eq!(payload["missing_documents"], json!(["bank_statement"]));
    assert_eq!(payload["errors"][0]["kind"], json!("missing_document"));

    let run_id = payload["run_id"].as_str().expect("run id").to_string();
    let report = router
        .oneshot(
            Request::get(format!("/api/v1/applications/{run_id}/report"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(report.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unsupported_media_type_is_rejected() {
    let mut parts = complete_form_parts();
    parts[1] = ("identity", Some(("id.heic", "image/heic")), b"heic".as_slice());

    let response = router()
        .oneshot(multipart_request("/api/v1/applications", &parts))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let payload = read_json_body(response).await;
    assert_eq!(payload["errors"][0]["kind"], json!("unsupported_format"));
    assert_eq!(payload["stage"], json!("intake"));
}

#[tokio::test]
async fn loan_amount_is_required() {
    let parts: Vec<_> = complete_form_parts()
        .into_iter()
        .filter(|(name, _, _)| *name != "loan_amount")
        .collect();

    let response = router()
        .oneshot(multipart_request("/api/v1/applications", &parts))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], json!("loan_amount is required"));
}

#[tokio::test]
async fn unknown_form_parts_are_rejected() {
    let mut parts = complete_form_parts();
    parts.push(("utility_bill", Some(("bill.pdf", "application/pdf")), b"%PDF".as_slice()));

    let response = router()
        .oneshot(multipart_request("/api/v1/applications", &parts))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn check_route_validates_without_deciding() {
    let response = router()
        .oneshot(multipart_request("/api/v1/applications/check", &complete_form_parts()))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], json!("validated"));
    assert!(payload.get("decision").is_none());
}

#[tokio::test]
async fn unknown_run_is_not_found() {
    let response = router()
        .oneshot(
            Request::get("/api/v1/applications/run-999999")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn config_can_be_inspected_and_replaced() {
    let router = router();

    let current = router
        .clone()
        .oneshot(
            Request::get("/api/v1/config")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(current.status(), StatusCode::OK);
    let mut config = read_json_body(current).await;
    assert_eq!(config["scoring"]["thresholds"]["approve_threshold"], json!(70.0));

    config["scoring"]["thresholds"]["approve_threshold"] = json!(80.0);
    let replaced = router
        .clone()
        .oneshot(
            Request::put("/api/v1/config")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(config.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(replaced.status(), StatusCode::OK);
    assert_eq!(
        read_json_body(replaced).await["scoring"]["thresholds"]["approve_threshold"],
        json!(80.0)
    );

    config["scoring"]["weights"]["capacity"] = json!(0.9);
    let invalid = router
        .oneshot(
            Request::put("/api/v1/config")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(config.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn reload_without_config_path_conflicts() {
    let response = router()
        .oneshot(
            Request::post("/api/v1/config/reload")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn recent_runs_are_listed_with_a_limit() {
    let router = router();
    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(multipart_request("/api/v1/applications", &complete_form_parts()))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let all = router
        .clone()
        .oneshot(
            Request::get("/api/v1/applications")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(all.status(), StatusCode::OK);
    let payload = read_json_body(all).await;
    let runs = payload.as_array().expect("list of runs");
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|run| run["status"] == json!("decided")));

    let limited = router
        .oneshot(
            Request::get("/api/v1/applications?limit=1")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    let payload = read_json_body(limited).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));
}
