use chrono::{Datelike, NaiveDate};

use super::input::{ConsolidatedAssessmentInput, Dependant};

const CHILD_AGE_LIMIT: i32 = 19;
const POST_SECONDARY_AGE_LIMIT: i32 = 22;
const CHILDCARE_AGE_LIMIT: i32 = 12;

/// Family composition derived from the consolidated input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyComposition {
    pub family_size: u32,
    /// Dependants counted toward family size.
    pub eligible_dependants: u32,
    /// Student's dependants under the childcare age limit at offering start.
    pub childcare_dependants: u32,
    /// Student's dependants qualifying for the dependants grant.
    pub csgd_dependants: u32,
    pub reporting_parents: u32,
}

/// Whole years completed on `on`. Negative when born after `on`.
pub fn age_on(birth_date: NaiveDate, on: NaiveDate) -> i32 {
    let mut age = on.year() - birth_date.year();
    if (on.month(), on.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}

/// A dependant born after the study end date never counts, whatever else was declared.
fn exists_during_study(dependant: &Dependant, study_end: NaiveDate) -> bool {
    dependant.birth_date <= study_end
}

pub fn is_eligible_dependant(dependant: &Dependant, study_start: NaiveDate, study_end: NaiveDate) -> bool {
    if !exists_during_study(dependant, study_end) {
        return false;
    }
    let age = age_on(dependant.birth_date, study_start);
    age < CHILD_AGE_LIMIT
        || (age <= POST_SECONDARY_AGE_LIMIT && dependant.attending_post_secondary)
        || dependant.declared_on_taxes
}

fn is_childcare_dependant(dependant: &Dependant, study_start: NaiveDate, study_end: NaiveDate) -> bool {
    exists_during_study(dependant, study_end)
        && age_on(dependant.birth_date, study_start) < CHILDCARE_AGE_LIMIT
}

fn is_csgd_dependant(dependant: &Dependant, study_start: NaiveDate, study_end: NaiveDate) -> bool {
    is_childcare_dependant(dependant, study_start, study_end)
        || (exists_during_study(dependant, study_end) && dependant.declared_on_taxes)
}

pub fn compose(input: &ConsolidatedAssessmentInput) -> FamilyComposition {
    let start = input.offering.start_date;
    let end = input.offering.end_date;
    let student = &input.student;

    if student.is_dependant() {
        let parents = input.reporting_parents();
        let reporting_parents = parents.len() as u32;
        let eligible_dependants = parents
            .iter()
            .map(|parent| parent.dependants)
            .max()
            .unwrap_or(0);
        return FamilyComposition {
            family_size: 1 + reporting_parents + eligible_dependants,
            eligible_dependants,
            childcare_dependants: 0,
            csgd_dependants: 0,
            reporting_parents,
        };
    }

    let count = |predicate: fn(&Dependant, NaiveDate, NaiveDate) -> bool| {
        student
            .dependants
            .iter()
            .filter(|dependant| predicate(dependant, start, end))
            .count() as u32
    };
    let eligible_dependants = count(is_eligible_dependant);
    let partner = u32::from(student.is_married());

    FamilyComposition {
        family_size: 1 + eligible_dependants + partner,
        eligible_dependants,
        childcare_dependants: count(is_childcare_dependant),
        csgd_dependants: count(is_csgd_dependant),
        reporting_parents: 0,
    }
}
