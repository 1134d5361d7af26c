use crate::config::ConfigError;
use crate::disbursement::ScheduleExportError;
use crate::telemetry::TelemetryError;
use crate::workflow::{GatewayError, WorkflowError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Top-level error for the service binary and the ad hoc HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid input: {0}")]
    Input(#[from] serde_json::Error),
    #[error("workflow error: {0}")]
    Workflow(#[from] WorkflowError),
    #[error("export error: {0}")]
    Export(#[from] ScheduleExportError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Input(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Workflow(WorkflowError::NotFound(_))
            | AppError::Workflow(WorkflowError::Gateway(GatewayError::NotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            AppError::Workflow(WorkflowError::AlreadyStarted(_))
            | AppError::Workflow(WorkflowError::Superseded { .. }) => StatusCode::CONFLICT,
            AppError::Workflow(WorkflowError::WorkerUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
