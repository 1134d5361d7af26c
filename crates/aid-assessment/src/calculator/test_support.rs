use chrono::NaiveDate;
use rust_decimal_macros::dec;

use super::input::{
    ConsolidatedAssessmentInput, InstitutionFacts, OfferingFacts, ProgramFacts, StudentFacts,
};
use super::parameters::ProgramYear;

pub(crate) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar date")
}

/// Single independent full-time student with no income on a 16-week onsite offering.
pub(crate) fn independent_input() -> ConsolidatedAssessmentInput {
    ConsolidatedAssessmentInput {
        program_year: ProgramYear::Y2023_2024,
        student: StudentFacts::default(),
        offering: OfferingFacts {
            start_date: date(2023, 9, 5),
            end_date: date(2023, 12, 22),
            weeks: 16,
            delivery: Default::default(),
            intensity: Default::default(),
            tuition: dec!(3500),
            books_and_supplies: dec!(1500),
            mandatory_fees: dec!(0),
            exceptional_expenses: dec!(0),
        },
        institution: InstitutionFacts::default(),
        program: ProgramFacts::default(),
        partner: None,
        parents: Vec::new(),
        step_parent_waiver: false,
        program_year_totals: Default::default(),
        change_request: None,
        appeals: None,
    }
}
