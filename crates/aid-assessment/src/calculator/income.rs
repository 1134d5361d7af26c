use rust_decimal::Decimal;

use super::input::{ConsolidatedAssessmentInput, IncomeDeductions};
use super::money::non_negative;
use super::parameters::ProgramYearParameters;

/// Incomes per reporting party, with appeal and change-request overrides applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyIncome {
    pub student: Decimal,
    /// `None` for students who are not married.
    pub partner: Option<Decimal>,
    /// One entry per reporting parent, in parent order.
    pub parents: Vec<ReportedParentIncome>,
    pub total: Decimal,
    pub deductions: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportedParentIncome {
    pub total: Decimal,
    pub net: Decimal,
    pub exempt: bool,
}

/// `min(CPP, cap) + min(EI, cap) + tax`.
pub fn capped_deductions(deductions: &IncomeDeductions, parameters: &ProgramYearParameters) -> Decimal {
    deductions.cpp_deduction.min(parameters.cpp_cap)
        + deductions.ei_deduction.min(parameters.ei_cap)
        + deductions.income_tax
}

pub fn aggregate(
    input: &ConsolidatedAssessmentInput,
    parameters: &ProgramYearParameters,
) -> FamilyIncome {
    let student_facts = &input.student;
    let student = input.overridden(|o| o.student_taxable_income, student_facts.taxable_income);
    let mut deductions = capped_deductions(&student_facts.deductions, parameters);

    let partner = if student_facts.is_married() {
        let base = input
            .partner
            .as_ref()
            .map(|partner| partner.income)
            .unwrap_or(Decimal::ZERO);
        if let Some(partner) = &input.partner {
            deductions += capped_deductions(&partner.deductions, parameters);
        }
        Some(input.overridden(|o| o.partner_income, base))
    } else {
        None
    };

    let mut parents = Vec::new();
    for parent in input.reporting_parents() {
        let parent_deductions = capped_deductions(&parent.deductions, parameters);
        deductions += parent_deductions;
        parents.push(ReportedParentIncome {
            total: parent.total_income,
            net: non_negative(parent.total_income - parent_deductions),
            exempt: parent.exemptions.is_exempt(),
        });
    }

    let total = student
        + partner.unwrap_or(Decimal::ZERO)
        + parents.iter().map(|parent| parent.total).sum::<Decimal>();

    FamilyIncome {
        student,
        partner,
        parents,
        total,
        deductions,
        net: non_negative(total - deductions),
    }
}
