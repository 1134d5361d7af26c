use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::family::FamilyComposition;
use super::input::{ConsolidatedAssessmentInput, DeliveryMode};
use super::money::{pro_rate, round_cents};
use super::parameters::ProgramYearParameters;

/// Study-period costs per category, plus the federal and provincial totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    /// Tuition plus mandatory fees.
    pub tuition: Decimal,
    pub books_and_supplies: Decimal,
    /// Books and supplies limited to the federal cap.
    pub federal_books_and_supplies: Decimal,
    /// Weekly living allowance (MSOL) times study weeks.
    pub living_allowance: Decimal,
    pub childcare: Decimal,
    pub transportation: Decimal,
    pub return_transportation: Decimal,
    pub alimony: Decimal,
    pub exceptional_expenses: Decimal,
    pub total_federal: Decimal,
    pub total_provincial: Decimal,
}

impl CostBreakdown {
    pub(crate) fn rounded(&self) -> Self {
        Self {
            tuition: round_cents(self.tuition),
            books_and_supplies: round_cents(self.books_and_supplies),
            federal_books_and_supplies: round_cents(self.federal_books_and_supplies),
            living_allowance: round_cents(self.living_allowance),
            childcare: round_cents(self.childcare),
            transportation: round_cents(self.transportation),
            return_transportation: round_cents(self.return_transportation),
            alimony: round_cents(self.alimony),
            exceptional_expenses: round_cents(self.exceptional_expenses),
            total_federal: round_cents(self.total_federal),
            total_provincial: round_cents(self.total_provincial),
        }
    }
}

/// Income-assistance interface policy: crossing the declared-amount threshold swaps the
/// living allowance for the reduced interface rate and drops childcare.
pub fn interface_policy_applies(
    input: &ConsolidatedAssessmentInput,
    parameters: &ProgramYearParameters,
) -> bool {
    input.student.income_assistance_amount >= parameters.interface_policy_threshold
}

pub fn assess(
    input: &ConsolidatedAssessmentInput,
    parameters: &ProgramYearParameters,
    family: &FamilyComposition,
) -> CostBreakdown {
    let offering = &input.offering;
    let student = &input.student;
    let weeks = Decimal::from(offering.weeks);
    let interface_policy = interface_policy_applies(input, parameters);
    let commutes = offering.delivery != DeliveryMode::Online;

    let tuition = offering.tuition + offering.mandatory_fees;
    let books_and_supplies = offering.books_and_supplies;
    let federal_books_and_supplies = books_and_supplies.min(parameters.federal_books_cap);

    let living_allowance = if interface_policy {
        parameters.interface_policy_weekly * weeks
    } else if student.is_dependant() && student.living_with_parents {
        parameters.living_at_home_weekly * weeks
    } else if student.is_dependant() {
        parameters.msol_weekly.lookup(1) * weeks
    } else {
        parameters.msol_weekly.lookup(family.family_size) * weeks
    };

    let childcare = if interface_policy {
        Decimal::ZERO
    } else {
        let declared = input.overridden(|o| o.childcare_costs, student.childcare_costs);
        let limit = parameters.childcare_weekly_per_child
            * Decimal::from(family.childcare_dependants)
            * weeks;
        declared.min(limit)
    };

    let (transportation, return_transportation) = if commutes {
        let declared = input.overridden(|o| o.transportation_costs, student.transportation_costs);
        (
            declared.min(parameters.transportation_weekly_cap * weeks),
            student
                .return_transportation_costs
                .min(parameters.return_transportation_cap),
        )
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    let alimony = pro_rate(student.alimony_payments, offering.weeks, 52);
    let exceptional_expenses = input
        .overridden(|o| o.exceptional_expenses, offering.exceptional_expenses)
        .min(parameters.exceptional_expense_cap);

    let shared = tuition + living_allowance + childcare + transportation + return_transportation
        + alimony;

    CostBreakdown {
        tuition,
        books_and_supplies,
        federal_books_and_supplies,
        living_allowance,
        childcare,
        transportation,
        return_transportation,
        alimony,
        exceptional_expenses,
        total_federal: shared + federal_books_and_supplies,
        total_provincial: shared + books_and_supplies + exceptional_expenses,
    }
}
