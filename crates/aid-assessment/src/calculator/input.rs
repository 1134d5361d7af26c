//! The consolidated, per-attempt snapshot the calculator consumes.
//!
//! Every optional field deserializes to a documented default so that absent data never
//! propagates as "null" into the formulas: amounts default to `0`, flags to `false`,
//! lists to empty, and program-year totals to `0` for every award code.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::awards::AwardCode;
use super::parameters::ProgramYear;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedAssessmentInput {
    pub program_year: ProgramYear,
    #[serde(default)]
    pub student: StudentFacts,
    pub offering: OfferingFacts,
    #[serde(default)]
    pub institution: InstitutionFacts,
    #[serde(default)]
    pub program: ProgramFacts,
    #[serde(default)]
    pub partner: Option<PartnerFacts>,
    /// Parent 1 first, parent 2 second.
    #[serde(default)]
    pub parents: Vec<ParentFacts>,
    #[serde(default)]
    pub step_parent_waiver: bool,
    #[serde(default)]
    pub program_year_totals: ProgramYearTotals,
    #[serde(default)]
    pub change_request: Option<AssessmentOverrides>,
    #[serde(default)]
    pub appeals: Option<AssessmentOverrides>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStatus {
    #[default]
    Single,
    Married,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyStatus {
    Dependant,
    #[default]
    Independent,
}

/// Flags that exempt a party from its fixed contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExemptionFlags {
    pub indigenous: bool,
    pub former_youth_in_care: bool,
    pub receives_disability_assistance: bool,
    pub receives_income_assistance: bool,
    pub receives_employment_insurance: bool,
}

impl ExemptionFlags {
    pub fn is_exempt(&self) -> bool {
        self.indigenous
            || self.former_youth_in_care
            || self.receives_disability_assistance
            || self.receives_income_assistance
            || self.receives_employment_insurance
    }
}

/// Payroll and tax deductions reported alongside an income.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncomeDeductions {
    pub cpp_deduction: Decimal,
    pub ei_deduction: Decimal,
    pub income_tax: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependant {
    pub birth_date: NaiveDate,
    #[serde(default)]
    pub attending_post_secondary: bool,
    #[serde(default)]
    pub declared_on_taxes: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentFacts {
    pub relationship_status: RelationshipStatus,
    pub dependency_status: DependencyStatus,
    pub pd_status: bool,
    pub ppd_status: bool,
    pub taxable_income: Decimal,
    #[serde(flatten)]
    pub deductions: IncomeDeductions,
    #[serde(flatten)]
    pub exemptions: ExemptionFlags,
    pub income_assistance_amount: Decimal,
    pub living_with_parents: bool,
    pub childcare_costs: Decimal,
    pub transportation_costs: Decimal,
    pub return_transportation_costs: Decimal,
    /// Annual alimony or child support paid.
    pub alimony_payments: Decimal,
    pub scholarships: Decimal,
    pub other_targeted_resources: Decimal,
    pub dependants: Vec<Dependant>,
}

impl StudentFacts {
    pub fn has_permanent_disability(&self) -> bool {
        self.pd_status || self.ppd_status
    }

    pub fn is_married(&self) -> bool {
        self.relationship_status == RelationshipStatus::Married
    }

    pub fn is_dependant(&self) -> bool {
        self.dependency_status == DependencyStatus::Dependant
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    #[default]
    Onsite,
    Online,
    Blended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferingIntensity {
    #[default]
    FullTime,
    PartTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferingFacts {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub weeks: u32,
    #[serde(default)]
    pub delivery: DeliveryMode,
    #[serde(default)]
    pub intensity: OfferingIntensity,
    #[serde(default)]
    pub tuition: Decimal,
    #[serde(default)]
    pub books_and_supplies: Decimal,
    #[serde(default)]
    pub mandatory_fees: Decimal,
    #[serde(default)]
    pub exceptional_expenses: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstitutionType {
    #[default]
    BcPublic,
    BcPrivate,
    OutOfProvince,
    International,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstitutionFacts {
    pub institution_type: InstitutionType,
    pub province: String,
}

impl Default for InstitutionFacts {
    fn default() -> Self {
        Self {
            institution_type: InstitutionType::BcPublic,
            province: "BC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    Certificate,
    #[default]
    Diploma,
    UndergraduateDegree,
    GraduateCertificate,
    Masters,
    Doctorate,
}

impl CredentialType {
    pub const fn is_undergraduate(self) -> bool {
        matches!(
            self,
            Self::Certificate | Self::Diploma | Self::UndergraduateDegree
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramLength {
    LessThanOneYear,
    #[default]
    OneToTwoYears,
    TwoToThreeYears,
    ThreeToFourYears,
    FourYearsOrMore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgramFacts {
    pub credential: CredentialType,
    pub length: ProgramLength,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartnerFacts {
    pub income: Decimal,
    #[serde(flatten)]
    pub deductions: IncomeDeductions,
    #[serde(flatten)]
    pub exemptions: ExemptionFlags,
    pub full_time_student: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParentFacts {
    /// False when the parent has no valid SIN or cannot otherwise report.
    pub able_to_report: bool,
    pub total_income: Decimal,
    #[serde(flatten)]
    pub deductions: IncomeDeductions,
    #[serde(flatten)]
    pub exemptions: ExemptionFlags,
    /// Dependants declared by this parent, the student excluded.
    pub dependants: u32,
}

/// Amounts already paid this program year, by award code.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramYearTotals(pub BTreeMap<AwardCode, Decimal>);

impl ProgramYearTotals {
    pub fn paid(&self, code: AwardCode) -> Decimal {
        self.0.get(&code).copied().unwrap_or(Decimal::ZERO)
    }
}

/// Field-by-field replacements supplied by a student appeal or a change request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssessmentOverrides {
    pub student_taxable_income: Option<Decimal>,
    pub partner_income: Option<Decimal>,
    pub childcare_costs: Option<Decimal>,
    pub transportation_costs: Option<Decimal>,
    pub exceptional_expenses: Option<Decimal>,
}

impl ConsolidatedAssessmentInput {
    /// Appeal value first, then change request, then the student-reported base value.
    pub(crate) fn overridden(
        &self,
        field: impl Fn(&AssessmentOverrides) -> Option<Decimal>,
        base: Decimal,
    ) -> Decimal {
        self.appeals
            .as_ref()
            .and_then(&field)
            .or_else(|| self.change_request.as_ref().and_then(&field))
            .unwrap_or(base)
    }

    pub fn reporting_parents(&self) -> Vec<&ParentFacts> {
        if !self.student.is_dependant() {
            return Vec::new();
        }
        let limit = if self.step_parent_waiver { 1 } else { 2 };
        self.parents
            .iter()
            .take(limit)
            .filter(|parent| parent.able_to_report)
            .collect()
    }
}
