use crate::cli::ServeArgs;
use crate::infra::{load_pipeline_config, AppState, InMemoryRunRepository};
use crate::routes::with_intake_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use mortgage_intake::config::AppConfig;
use mortgage_intake::error::AppError;
use mortgage_intake::telemetry;
use mortgage_intake::workflows::mortgage::{
    CannedDocumentService, DocumentUnderstanding, HttpDocumentService, MortgageIntakeService,
    PipelineConfigHandle,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let pipeline_config = load_pipeline_config(config.pipeline_config_path.as_deref())?;
    let config_path = config.pipeline_config_path.clone();

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = match (&config.document_service, args.answers.take()) {
        (Some(remote), answers) => {
            if answers.is_some() {
                warn!("DOC_SERVICE_URL is set; ignoring --answers");
            }
            info!(url = %remote.url, "using remote document service");
            build_app(HttpDocumentService::new(remote), pipeline_config, config_path)
        }
        (None, Some(path)) => {
            let answers = CannedDocumentService::from_path(&path)?;
            info!(path = %path.display(), answers = answers.len(), "using canned document answers");
            build_app(answers, pipeline_config, config_path)
        }
        (None, None) => {
            warn!("no document service configured; uploads will report no located fields");
            build_app(CannedDocumentService::new(), pipeline_config, config_path)
        }
    }
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "mortgage intake service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_app<S>(
    documents: S,
    pipeline_config: PipelineConfigHandle,
    config_path: Option<PathBuf>,
) -> axum::Router
where
    S: DocumentUnderstanding + 'static,
{
    let repository = Arc::new(InMemoryRunRepository::default());
    let mut service = MortgageIntakeService::new(repository, Arc::new(documents), pipeline_config);
    if let Some(path) = config_path {
        service = service.with_config_path(path);
    }
    with_intake_routes(Arc::new(service))
}
