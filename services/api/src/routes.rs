use crate::infra::{consolidated_input, AppState};
use aid_assessment::calculator::{self, CalculatedAssessmentOutput};
use aid_assessment::disbursement::{self, AwardAmount, DisbursementRecord, ScheduleRequest};
use aid_assessment::error::AppError;
use aid_assessment::workflow::{assessment_router, Clock, SystemClock, WorkerClient};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScheduleBody {
    pub(crate) start_date: NaiveDate,
    pub(crate) end_date: NaiveDate,
    pub(crate) weeks: u32,
    /// Defaults to the current date.
    #[serde(default)]
    pub(crate) today: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) awards: Vec<AwardAmount>,
}

/// Operational endpoints and the stateless calculator routes on top of the workflow router.
pub(crate) fn with_service_routes(client: WorkerClient) -> Router {
    assessment_router(client)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/assessments/calculate", post(calculate_endpoint))
        .route("/api/v1/disbursements/schedule", post(schedule_endpoint))
}

pub(crate) async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let (status, label) = if state.readiness.load(Ordering::Acquire) {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "initializing")
    };
    (status, Json(json!({ "status": label })))
}

/// Prometheus text exposition of the HTTP layer metrics.
pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let body = state.metrics.render();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

pub(crate) async fn calculate_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<CalculatedAssessmentOutput>, AppError> {
    let input = consolidated_input(payload, state.default_program_year)?;
    let output = calculator::calculate(&input);
    debug!(
        program_year = %output.program_year,
        total_award = %output.total_award(),
        "ad hoc calculation served"
    );
    Ok(Json(output))
}

pub(crate) async fn schedule_endpoint(
    Json(body): Json<ScheduleBody>,
) -> Json<Vec<DisbursementRecord>> {
    let request = ScheduleRequest {
        start_date: body.start_date,
        end_date: body.end_date,
        weeks: body.weeks,
        today: body.today.unwrap_or_else(|| SystemClock.today()),
        awards: body.awards,
    };
    Json(disbursement::schedule(&request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aid_assessment::calculator::{AssessmentCalculator, AwardCode, ProgramYear};
    use aid_assessment::workflow::{
        AssessmentOrchestrator, AssessmentWorker, FixedClock, InMemoryAdapters,
    };
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use rust_decimal::Decimal;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state(ready: bool) -> AppState {
        let recorder = PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
            default_program_year: ProgramYear::Y2023_2024,
        }
    }

    fn app(ready: bool) -> (Router, aid_assessment::workflow::WorkerHandle) {
        let adapters = InMemoryAdapters::default();
        let today = NaiveDate::from_ymd_opt(2023, 8, 15).expect("valid date");
        let orchestrator = AssessmentOrchestrator::new(
            adapters.ports(Arc::new(FixedClock(today))),
            AssessmentCalculator::default(),
        );
        let handle = AssessmentWorker::start(Arc::new(orchestrator), 4);
        let router = with_service_routes(handle.client()).layer(Extension(state(ready)));
        (router, handle)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn readiness_reflects_the_flag() {
        let (router, handle) = app(false);
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/ready")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("ready responds");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["status"], json!("initializing"));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn calculate_endpoint_fills_program_year_and_returns_awards() {
        let (router, handle) = app(true);
        let response = router
            .oneshot(post_json(
                "/api/v1/assessments/calculate",
                json!({
                    "offering": {
                        "startDate": "2023-09-05",
                        "endDate": "2023-12-22",
                        "weeks": 16,
                        "tuition": "3500",
                        "booksAndSupplies": "1500"
                    }
                }),
            ))
            .await
            .expect("calculate responds");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["programYear"], json!("2023-2024"));
        let output: CalculatedAssessmentOutput =
            serde_json::from_value(body).expect("output deserializes");
        assert!(output.award(AwardCode::Csgf).is_eligible());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn calculate_endpoint_rejects_incomplete_input() {
        let (router, handle) = app(true);
        let response = router
            .oneshot(post_json(
                "/api/v1/assessments/calculate",
                json!({ "programYear": "2023-2024" }),
            ))
            .await
            .expect("calculate responds");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn schedule_endpoint_splits_long_offerings() {
        let Json(records) = schedule_endpoint(Json(ScheduleBody {
            start_date: NaiveDate::from_ymd_opt(2023, 9, 5).expect("valid date"),
            end_date: NaiveDate::from_ymd_opt(2024, 4, 26).expect("valid date"),
            weeks: 34,
            today: Some(NaiveDate::from_ymd_opt(2023, 8, 1).expect("valid date")),
            awards: vec![AwardAmount {
                code: AwardCode::Csgf,
                amount: Decimal::from(4200),
                eligible: Some(true),
            }],
        }))
        .await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].amount_for(AwardCode::Csgf), Some(Decimal::from(2100)));
        assert_eq!(records[1].amount_for(AwardCode::Csgf), Some(Decimal::from(2100)));
    }
}
