use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::awards::{AwardCode, AwardResult};
use super::contributions::ContributionBreakdown;
use super::costs::CostBreakdown;
use super::parameters::ProgramYear;

/// Calculator result for one assessment attempt.
///
/// Every award code appears in `awards`, with `eligible: None` only for awards that do
/// not apply to the offering's study intensity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatedAssessmentOutput {
    pub program_year: ProgramYear,
    pub family_size: u32,
    pub eligible_dependants: u32,
    pub total_family_income: Decimal,
    pub net_family_income: Decimal,
    pub interface_policy_applied: bool,
    pub costs: CostBreakdown,
    pub contributions: ContributionBreakdown,
    pub federal_assessed_need: Decimal,
    pub provincial_assessed_need: Decimal,
    pub awards: BTreeMap<AwardCode, AwardResult>,
}

impl CalculatedAssessmentOutput {
    pub fn award(&self, code: AwardCode) -> AwardResult {
        self.awards
            .get(&code)
            .copied()
            .unwrap_or_else(AwardResult::not_applicable)
    }

    /// Sum of every eligible award's final amount.
    pub fn total_award(&self) -> Decimal {
        self.awards
            .values()
            .filter(|result| result.is_eligible())
            .map(|result| result.amount)
            .sum()
    }
}
