use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    ApplicationEditStatus, ApplicationStatus, AssessmentId, AssessmentTrigger, CorrelatedMessage,
    ProcessEntry,
};
use super::orchestrator::{Delivery, WorkflowError};
use super::ports::GatewayError;
use super::worker::WorkerClient;

/// Body of a start request; the assessment id comes from the path.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub trigger: AssessmentTrigger,
    #[serde(default)]
    pub application_status: Option<ApplicationStatus>,
    #[serde(default)]
    pub application_edit_status: Option<ApplicationEditStatus>,
}

/// Router exposing run start, message delivery, resume, and status.
pub fn assessment_router(client: WorkerClient) -> Router {
    Router::new()
        .route("/api/v1/assessments/:assessment_id/start", post(start_handler))
        .route("/api/v1/assessments/:assessment_id/resume", post(resume_handler))
        .route("/api/v1/assessments/:assessment_id", get(status_handler))
        .route("/api/v1/messages", post(message_handler))
        .with_state(client)
}

pub(crate) async fn start_handler(
    State(client): State<WorkerClient>,
    Path(assessment_id): Path<u64>,
    Json(request): Json<StartRequest>,
) -> Response {
    let entry = ProcessEntry {
        assessment_id: AssessmentId(assessment_id),
        trigger: request.trigger,
        application_status: request.application_status,
        application_edit_status: request.application_edit_status,
    };
    match client.start(entry).await {
        Ok(report) => (StatusCode::ACCEPTED, Json(report)).into_response(),
        Err(err) => workflow_error_response(err),
    }
}

pub(crate) async fn resume_handler(
    State(client): State<WorkerClient>,
    Path(assessment_id): Path<u64>,
) -> Response {
    match client.resume(AssessmentId(assessment_id)).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => workflow_error_response(err),
    }
}

pub(crate) async fn status_handler(
    State(client): State<WorkerClient>,
    Path(assessment_id): Path<u64>,
) -> Response {
    match client.report(AssessmentId(assessment_id)).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => workflow_error_response(err),
    }
}

pub(crate) async fn message_handler(
    State(client): State<WorkerClient>,
    Json(message): Json<CorrelatedMessage>,
) -> Response {
    match client.deliver(message).await {
        Ok(delivery @ Delivery::Unmatched) => (StatusCode::NOT_FOUND, Json(delivery)).into_response(),
        Ok(delivery) => (StatusCode::OK, Json(delivery)).into_response(),
        Err(err) => workflow_error_response(err),
    }
}

pub(crate) fn workflow_error_response(err: WorkflowError) -> Response {
    let status = match &err {
        WorkflowError::NotFound(_) | WorkflowError::Gateway(GatewayError::NotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        WorkflowError::AlreadyStarted(_) | WorkflowError::Superseded { .. } => StatusCode::CONFLICT,
        WorkflowError::Gateway(GatewayError::Rejected(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::WorkerUnavailable | WorkflowError::Gateway(GatewayError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        WorkflowError::MissingState(..) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = match &err {
        WorkflowError::Superseded { milestones, .. } => json!({
            "error": err.to_string(),
            "milestones": milestones,
        }),
        _ => json!({ "error": err.to_string() }),
    };
    (status, Json(payload)).into_response()
}
