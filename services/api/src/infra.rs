use aid_assessment::calculator::{ConsolidatedAssessmentInput, ProgramYear};
use aid_assessment::error::AppError;
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) default_program_year: ProgramYear,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Parses a consolidated input, filling `programYear` when the payload omits it.
pub(crate) fn consolidated_input(
    mut payload: Value,
    default_program_year: ProgramYear,
) -> Result<ConsolidatedAssessmentInput, AppError> {
    if let Value::Object(fields) = &mut payload {
        fields
            .entry("programYear")
            .or_insert_with(|| Value::String(default_program_year.label().to_string()));
    }
    Ok(serde_json::from_value(payload)?)
}

pub(crate) fn read_input(
    path: &Path,
    default_program_year: ProgramYear,
) -> Result<ConsolidatedAssessmentInput, AppError> {
    let raw = std::fs::read_to_string(path)?;
    let payload: Value = serde_json::from_str(&raw)?;
    consolidated_input(payload, default_program_year)
}
