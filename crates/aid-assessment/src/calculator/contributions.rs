use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::family::FamilyComposition;
use super::income::FamilyIncome;
use super::input::ConsolidatedAssessmentInput;
use super::money::{clamp, non_negative, pro_rate, round_cents, round_dollars};
use super::parameters::{ProgramYearParameters, WeeklyContributionScale};

/// Contributions expected toward the study period.
///
/// `spousal_contribution` is `None` for students who are not married and
/// `parental_contribution` is `None` for independent students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionBreakdown {
    pub federal_student_contribution: Decimal,
    pub provincial_student_contribution: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spousal_contribution: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parental_contribution: Option<Decimal>,
    pub targeted_resources: Decimal,
    pub total_federal: Decimal,
    pub total_provincial: Decimal,
}

impl ContributionBreakdown {
    pub(crate) fn rounded(&self) -> Self {
        Self {
            federal_student_contribution: round_cents(self.federal_student_contribution),
            provincial_student_contribution: round_cents(self.provincial_student_contribution),
            spousal_contribution: self.spousal_contribution.map(round_cents),
            parental_contribution: self.parental_contribution.map(round_cents),
            targeted_resources: round_cents(self.targeted_resources),
            total_federal: round_cents(self.total_federal),
            total_provincial: round_cents(self.total_provincial),
        }
    }
}

/// Weekly fixed contribution from the sloped family-size table, times study weeks.
/// `income` is the student's own income; the threshold comparison rounds it to dollars.
fn fixed_contribution(
    scale: &WeeklyContributionScale,
    threshold: Decimal,
    income: Decimal,
    weeks: u32,
) -> Decimal {
    let excess = non_negative(round_dollars(income) - threshold);
    let weekly = clamp(
        scale.minimum_weekly + scale.slope * excess,
        scale.minimum_weekly,
        scale.maximum_weekly,
    );
    weekly * Decimal::from(weeks)
}

fn spousal_contribution(
    input: &ConsolidatedAssessmentInput,
    parameters: &ProgramYearParameters,
    income: &FamilyIncome,
) -> Option<Decimal> {
    let partner_income = income.partner?;
    let exempt = input
        .partner
        .as_ref()
        .map(|partner| partner.exemptions.is_exempt() || partner.full_time_student)
        .unwrap_or(false);
    if exempt {
        return Some(Decimal::ZERO);
    }
    let annual = non_negative(partner_income - parameters.spousal_exemption) * parameters.spousal_rate;
    Some(pro_rate(annual, input.offering.weeks, 52))
}

/// Graduated rate on the non-exempt parents' net income above the parental MSOL.
fn parental_contribution(
    input: &ConsolidatedAssessmentInput,
    parameters: &ProgramYearParameters,
    family: &FamilyComposition,
    income: &FamilyIncome,
) -> Option<Decimal> {
    if !input.student.is_dependant() {
        return None;
    }
    let pool: Decimal = income
        .parents
        .iter()
        .filter(|parent| !parent.exempt)
        .map(|parent| parent.net)
        .sum();
    let discretionary = non_negative(pool - parameters.parental_msol.lookup(family.family_size));
    let first_band = discretionary.min(parameters.parental_first_band) * parameters.parental_first_rate;
    let upper_band =
        non_negative(discretionary - parameters.parental_first_band) * parameters.parental_upper_rate;
    Some(pro_rate(first_band + upper_band, input.offering.weeks, 52))
}

pub fn assess(
    input: &ConsolidatedAssessmentInput,
    parameters: &ProgramYearParameters,
    family: &FamilyComposition,
    income: &FamilyIncome,
) -> ContributionBreakdown {
    let student = &input.student;
    let weeks = input.offering.weeks;
    let threshold = parameters.contribution_thresholds.lookup(family.family_size);

    let (federal_student_contribution, provincial_student_contribution) =
        if student.exemptions.is_exempt() {
            (Decimal::ZERO, Decimal::ZERO)
        } else {
            (
                fixed_contribution(
                    &parameters.federal_student_contribution,
                    threshold,
                    income.student,
                    weeks,
                ),
                fixed_contribution(
                    &parameters.provincial_student_contribution,
                    threshold,
                    income.student,
                    weeks,
                ),
            )
        };

    let spousal = spousal_contribution(input, parameters, income);
    let parental = parental_contribution(input, parameters, family, income);
    let targeted_resources = student.scholarships + student.other_targeted_resources;
    let shared = spousal.unwrap_or(Decimal::ZERO)
        + parental.unwrap_or(Decimal::ZERO)
        + targeted_resources;

    ContributionBreakdown {
        federal_student_contribution,
        provincial_student_contribution,
        spousal_contribution: spousal,
        parental_contribution: parental,
        targeted_resources,
        total_federal: federal_student_contribution + shared,
        total_provincial: provincial_student_contribution + shared,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::family::compose;
    use crate::calculator::income::aggregate;
    use crate::calculator::input::{
        DependencyStatus, ExemptionFlags, ParentFacts, PartnerFacts, RelationshipStatus,
    };
    use crate::calculator::parameters::ProgramYear;
    use crate::calculator::test_support::independent_input;
    use rust_decimal_macros::dec;

    fn contributions_for(input: &ConsolidatedAssessmentInput) -> ContributionBreakdown {
        let parameters = ProgramYear::Y2023_2024.parameters();
        let family = compose(input);
        let income = aggregate(input, &parameters);
        assess(input, &parameters, &family, &income)
    }

    #[test]
    fn zero_income_pays_minimum_weekly_contribution() {
        let contributions = contributions_for(&independent_input());
        assert_eq!(contributions.federal_student_contribution, dec!(480));
        assert_eq!(contributions.provincial_student_contribution, dec!(400));
        assert_eq!(contributions.spousal_contribution, None);
        assert_eq!(contributions.parental_contribution, None);
        assert_eq!(contributions.total_federal, dec!(480));
    }

    #[test]
    fn contribution_slopes_up_to_weekly_maximum() {
        let mut input = independent_input();
        input.student.taxable_income = dec!(47000);
        // 10,000 over the single-person threshold: 30 + 15 weekly federal, 25 + 12.5 provincial
        let contributions = contributions_for(&input);
        assert_eq!(contributions.federal_student_contribution, dec!(720));
        assert_eq!(contributions.provincial_student_contribution, dec!(600));

        input.student.taxable_income = dec!(200000);
        let contributions = contributions_for(&input);
        assert_eq!(contributions.federal_student_contribution, dec!(960));
        assert_eq!(contributions.provincial_student_contribution, dec!(800));
    }

    #[test]
    fn student_contribution_ignores_parent_and_partner_income() {
        let mut input = independent_input();
        input.student.dependency_status = DependencyStatus::Dependant;
        input.parents = vec![
            ParentFacts {
                able_to_report: true,
                total_income: dec!(80000),
                ..Default::default()
            },
            ParentFacts {
                able_to_report: true,
                total_income: dec!(70000),
                ..Default::default()
            },
        ];
        let contributions = contributions_for(&input);
        assert_eq!(contributions.federal_student_contribution, dec!(480));
        assert_eq!(contributions.provincial_student_contribution, dec!(400));
        assert!(contributions.parental_contribution.is_some_and(|amount| amount > Decimal::ZERO));

        let mut input = independent_input();
        input.student.relationship_status = RelationshipStatus::Married;
        input.partner = Some(PartnerFacts {
            income: dec!(90000),
            ..Default::default()
        });
        let contributions = contributions_for(&input);
        assert_eq!(contributions.federal_student_contribution, dec!(480));
        assert!(contributions.spousal_contribution.is_some_and(|amount| amount > Decimal::ZERO));
    }

    #[test]
    fn threshold_comparison_uses_rounded_income() {
        let mut input = independent_input();
        input.student.taxable_income = dec!(37000.40);
        assert_eq!(
            contributions_for(&input).federal_student_contribution,
            dec!(480)
        );
    }

    #[test]
    fn exempt_student_keeps_spousal_contribution() {
        let mut input = independent_input();
        input.offering.weeks = 26;
        input.student.relationship_status = RelationshipStatus::Married;
        input.student.exemptions = ExemptionFlags {
            former_youth_in_care: true,
            ..Default::default()
        };
        input.partner = Some(PartnerFacts {
            income: dec!(30000),
            ..Default::default()
        });

        let contributions = contributions_for(&input);
        assert_eq!(contributions.federal_student_contribution, Decimal::ZERO);
        assert_eq!(contributions.provincial_student_contribution, Decimal::ZERO);
        assert_eq!(contributions.spousal_contribution, Some(dec!(1250)));
        assert_eq!(contributions.total_federal, dec!(1250));
        assert_eq!(contributions.total_provincial, dec!(1250));
    }

    #[test]
    fn exempt_partner_contributes_nothing() {
        let mut input = independent_input();
        input.student.relationship_status = RelationshipStatus::Married;
        input.partner = Some(PartnerFacts {
            income: dec!(80000),
            full_time_student: true,
            ..Default::default()
        });
        assert_eq!(
            contributions_for(&input).spousal_contribution,
            Some(Decimal::ZERO)
        );
    }

    #[test]
    fn parental_contribution_excludes_exempt_parent_only() {
        let mut input = independent_input();
        input.offering.weeks = 52;
        input.student.dependency_status = DependencyStatus::Dependant;
        input.parents = vec![
            ParentFacts {
                able_to_report: true,
                total_income: dec!(80000),
                ..Default::default()
            },
            ParentFacts {
                able_to_report: true,
                total_income: dec!(70000),
                exemptions: ExemptionFlags {
                    indigenous: true,
                    ..Default::default()
                },
                ..Default::default()
            },
        ];

        // family size 3 → parental MSOL 37,000; discretionary 43,000
        // 20,000 × 0.25 + 23,000 × 0.5 = 16,500
        let contributions = contributions_for(&input);
        assert_eq!(contributions.parental_contribution, Some(dec!(16500)));
    }

    #[test]
    fn targeted_resources_offset_both_streams() {
        let mut input = independent_input();
        input.student.scholarships = dec!(1000);
        input.student.other_targeted_resources = dec!(250);
        let contributions = contributions_for(&input);
        assert_eq!(contributions.targeted_resources, dec!(1250));
        assert_eq!(contributions.total_federal, dec!(1730));
        assert_eq!(contributions.total_provincial, dec!(1650));
    }
}
