use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_service_routes;
use aid_assessment::calculator::AssessmentCalculator;
use aid_assessment::config::AppConfig;
use aid_assessment::error::AppError;
use aid_assessment::telemetry;
use aid_assessment::workflow::{
    AssessmentOrchestrator, AssessmentWorker, InMemoryAdapters, SystemClock,
};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub(crate) async fn run(args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    args.apply(&mut config.server);
    telemetry::init(&config.telemetry)?;

    let (metrics_layer, metrics_handle) = PrometheusMetricLayer::pair();
    let readiness = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: Arc::clone(&readiness),
        metrics: Arc::new(metrics_handle),
        default_program_year: config.assessment.default_program_year,
    };

    let adapters = InMemoryAdapters::default();
    let orchestrator = Arc::new(AssessmentOrchestrator::new(
        adapters.ports(Arc::new(SystemClock)),
        AssessmentCalculator::default(),
    ));
    let resumed = orchestrator.resume_all()?;
    if !resumed.is_empty() {
        info!(runs = resumed.len(), "resumed open assessment runs");
    }
    let worker = AssessmentWorker::start(orchestrator, config.assessment.queue_capacity);

    let app = with_service_routes(worker.client())
        .layer(Extension(state))
        .layer(metrics_layer);

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    readiness.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        program_year = %config.assessment.default_program_year,
        "student aid assessment service ready"
    );

    let served = axum::serve(listener, app).await;
    readiness.store(false, Ordering::Release);
    worker.shutdown().await;
    if let Err(err) = &served {
        warn!(error = %err, "http server stopped with an error");
    }
    served?;
    Ok(())
}
