//! Eligibility and award calculator.
//!
//! A pure function set: the consolidated input goes in, the calculated assessment comes
//! out. Nothing here reads the clock, performs I/O, or keeps state between calls, so the
//! same input always produces the same output.

pub mod awards;
pub mod contributions;
pub mod costs;
pub mod family;
pub mod income;
pub mod input;
mod money;
pub mod output;
pub mod parameters;
pub mod rules;

#[cfg(test)]
pub(crate) mod test_support;

use std::collections::BTreeMap;

use tracing::debug;

pub use awards::{AwardCode, AwardContext, AwardResult, AwardRule};
pub use contributions::ContributionBreakdown;
pub use costs::CostBreakdown;
pub use input::ConsolidatedAssessmentInput;
pub use output::CalculatedAssessmentOutput;
pub use parameters::{ProgramYear, ProgramYearParameters};
pub use rules::RuleBook;

use money::{non_negative, round_cents};

/// Stateless calculator applying the rule book to a consolidated input.
#[derive(Debug, Clone, Default)]
pub struct AssessmentCalculator {
    rules: RuleBook,
}

impl AssessmentCalculator {
    pub fn new(rules: RuleBook) -> Self {
        Self { rules }
    }

    pub fn calculate(&self, input: &ConsolidatedAssessmentInput) -> CalculatedAssessmentOutput {
        let parameters = input.program_year.parameters();
        let family = family::compose(input);
        let income = income::aggregate(input, &parameters);
        let costs = costs::assess(input, &parameters, &family);
        let contributions = contributions::assess(input, &parameters, &family, &income);

        let federal_need = non_negative(costs.total_federal - contributions.total_federal);
        let provincial_need = non_negative(costs.total_provincial - contributions.total_provincial);

        let mut awarded = BTreeMap::new();
        for code in AwardCode::evaluation_order() {
            let result = match self.rules.rule(input.program_year, code) {
                Some(rule) if code.applies_to(input.offering.intensity) => {
                    let context = AwardContext {
                        input,
                        parameters: &parameters,
                        family_size: family.family_size,
                        total_family_income: income.total,
                        csgd_dependants: family.csgd_dependants,
                        federal_need,
                        provincial_need,
                        awarded: &awarded,
                    };
                    rule(&context)
                }
                _ => AwardResult::not_applicable(),
            };
            awarded.insert(code, result);
        }

        debug!(
            program_year = %input.program_year,
            family_size = family.family_size,
            %federal_need,
            %provincial_need,
            "assessment calculated"
        );

        CalculatedAssessmentOutput {
            program_year: input.program_year,
            family_size: family.family_size,
            eligible_dependants: family.eligible_dependants,
            total_family_income: round_cents(income.total),
            net_family_income: round_cents(income.net),
            interface_policy_applied: costs::interface_policy_applies(input, &parameters),
            costs: costs.rounded(),
            contributions: contributions.rounded(),
            federal_assessed_need: round_cents(federal_need),
            provincial_assessed_need: round_cents(provincial_need),
            awards: awarded,
        }
    }
}

/// Convenience wrapper over the standard rule book.
pub fn calculate(input: &ConsolidatedAssessmentInput) -> CalculatedAssessmentOutput {
    AssessmentCalculator::default().calculate(input)
}
