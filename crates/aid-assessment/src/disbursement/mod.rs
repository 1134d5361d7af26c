//! Disbursement scheduling.
//!
//! Turns the final award amounts into one or two dated payment records. Offerings of up
//! to [`SINGLE_DISBURSEMENT_MAX_WEEKS`] weeks pay out once; longer offerings split every
//! award into two equal halves, the second paid at the offering midpoint.

mod export;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calculator::{AwardCode, CalculatedAssessmentOutput};

pub use export::{DisbursementWriter, ScheduleExportError};

pub const SINGLE_DISBURSEMENT_MAX_WEEKS: u32 = 17;

/// One award as handed to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardAmount {
    pub code: AwardCode,
    pub amount: Decimal,
    #[serde(default)]
    pub eligible: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub weeks: u32,
    pub today: NaiveDate,
    #[serde(default)]
    pub awards: Vec<AwardAmount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisbursementValue {
    pub value_code: AwardCode,
    pub value_amount: Decimal,
    pub eligible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisbursementRecord {
    pub disbursement_date: NaiveDate,
    pub negotiated_expiry_date: NaiveDate,
    pub awards: Vec<DisbursementValue>,
}

impl DisbursementRecord {
    fn dated(date: NaiveDate, awards: Vec<DisbursementValue>) -> Self {
        Self {
            disbursement_date: date,
            negotiated_expiry_date: date,
            awards,
        }
    }

    pub fn amount_for(&self, code: AwardCode) -> Option<Decimal> {
        self.awards
            .iter()
            .find(|value| value.value_code == code)
            .map(|value| value.value_amount)
    }
}

/// Awards that apply to the offering, in calculator order. `eligible: None` is dropped.
pub fn awards_from_output(output: &CalculatedAssessmentOutput) -> Vec<AwardAmount> {
    output
        .awards
        .iter()
        .filter(|(_, result)| result.eligible.is_some())
        .map(|(code, result)| AwardAmount {
            code: *code,
            amount: result.amount,
            eligible: result.eligible,
        })
        .collect()
}

fn values(awards: &[AwardAmount], share: impl Fn(Decimal) -> Decimal) -> Vec<DisbursementValue> {
    awards
        .iter()
        .filter_map(|award| {
            award.eligible.map(|eligible| DisbursementValue {
                value_code: award.code,
                value_amount: share(award.amount),
                eligible,
            })
        })
        .collect()
}

/// Midpoint of the offering, counted in whole days from the start date.
pub fn offering_midpoint(start_date: NaiveDate, end_date: NaiveDate) -> NaiveDate {
    let span = (end_date - start_date).num_days().max(0);
    start_date + Duration::days(span / 2)
}

pub fn schedule(request: &ScheduleRequest) -> Vec<DisbursementRecord> {
    let first_date = request.start_date.max(request.today);

    if request.weeks <= SINGLE_DISBURSEMENT_MAX_WEEKS {
        return vec![DisbursementRecord::dated(
            first_date,
            values(&request.awards, |amount| amount),
        )];
    }

    let second_date = offering_midpoint(request.start_date, request.end_date);
    if second_date <= request.today {
        debug!(%second_date, today = %request.today, "midpoint already passed, single disbursement");
        return vec![DisbursementRecord::dated(
            first_date,
            values(&request.awards, |amount| amount),
        )];
    }

    let half = |amount: Decimal| amount / Decimal::TWO;
    vec![
        DisbursementRecord::dated(request.today, values(&request.awards, half)),
        DisbursementRecord::dated(second_date, values(&request.awards, half)),
    ]
}
