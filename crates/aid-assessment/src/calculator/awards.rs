use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::input::{ConsolidatedAssessmentInput, InstitutionType, OfferingIntensity, ProgramLength};
use super::money::{
    clamp, non_negative, pro_rate, remaining_under_cap, round_dollars, round_rate,
};
use super::parameters::{ProgramYearParameters, SlopedGrantParameters};

/// Federal and provincial grant and loan programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AwardCode {
    /// Canada Student Loan, full-time.
    Cslf,
    /// Canada Student Loan, part-time.
    Cslp,
    /// Canada Student Grant, full-time.
    Csgf,
    /// Canada Student Grant, part-time.
    Cspt,
    /// Canada Student Grant for students with dependants.
    Csgd,
    /// Canada Student Grant for students with permanent disabilities.
    Csgp,
    /// BC Student Loan.
    Bcsl,
    /// BC Access Grant.
    Bcag,
    /// BC Grant for students with permanent disabilities.
    Bgpd,
    /// Supplemental bursary for students with disabilities.
    Sbsd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingStream {
    Federal,
    Provincial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardKind {
    Grant,
    Loan,
}

impl AwardCode {
    /// Grants are evaluated before loans so loans see the remaining need.
    pub const fn evaluation_order() -> [Self; 10] {
        [
            Self::Csgf,
            Self::Cspt,
            Self::Csgd,
            Self::Csgp,
            Self::Bcag,
            Self::Bgpd,
            Self::Sbsd,
            Self::Cslf,
            Self::Cslp,
            Self::Bcsl,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Cslf => "CSLF",
            Self::Cslp => "CSLP",
            Self::Csgf => "CSGF",
            Self::Cspt => "CSPT",
            Self::Csgd => "CSGD",
            Self::Csgp => "CSGP",
            Self::Bcsl => "BCSL",
            Self::Bcag => "BCAG",
            Self::Bgpd => "BGPD",
            Self::Sbsd => "SBSD",
        }
    }

    pub const fn stream(self) -> FundingStream {
        match self {
            Self::Cslf | Self::Cslp | Self::Csgf | Self::Cspt | Self::Csgd | Self::Csgp => {
                FundingStream::Federal
            }
            Self::Bcsl | Self::Bcag | Self::Bgpd | Self::Sbsd => FundingStream::Provincial,
        }
    }

    pub const fn kind(self) -> AwardKind {
        match self {
            Self::Cslf | Self::Cslp | Self::Bcsl => AwardKind::Loan,
            _ => AwardKind::Grant,
        }
    }

    pub const fn applies_to(self, intensity: OfferingIntensity) -> bool {
        match self {
            Self::Cslf | Self::Csgf | Self::Bcsl | Self::Bgpd => {
                matches!(intensity, OfferingIntensity::FullTime)
            }
            Self::Cslp | Self::Cspt => matches!(intensity, OfferingIntensity::PartTime),
            Self::Csgd | Self::Csgp | Self::Bcag | Self::Sbsd => true,
        }
    }
}

impl fmt::Display for AwardCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Eligibility flag and final net amount for one award.
///
/// `eligible` is `None` when the award does not apply to the offering at all (for
/// example a part-time grant on a full-time offering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardResult {
    pub eligible: Option<bool>,
    pub amount: Decimal,
}

impl AwardResult {
    pub const fn not_applicable() -> Self {
        Self {
            eligible: None,
            amount: Decimal::ZERO,
        }
    }

    pub const fn ineligible() -> Self {
        Self {
            eligible: Some(false),
            amount: Decimal::ZERO,
        }
    }

    pub const fn eligible(amount: Decimal) -> Self {
        Self {
            eligible: Some(true),
            amount,
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.eligible == Some(true)
    }
}

/// Everything an award rule may read. Built by the calculator once the family, income,
/// cost and contribution steps have run.
pub struct AwardContext<'a> {
    pub input: &'a ConsolidatedAssessmentInput,
    pub parameters: &'a ProgramYearParameters,
    pub family_size: u32,
    pub total_family_income: Decimal,
    pub csgd_dependants: u32,
    pub federal_need: Decimal,
    pub provincial_need: Decimal,
    pub awarded: &'a BTreeMap<AwardCode, AwardResult>,
}

impl AwardContext<'_> {
    fn weeks(&self) -> u32 {
        self.input.offering.weeks
    }

    fn paid(&self, code: AwardCode) -> Decimal {
        self.input.program_year_totals.paid(code)
    }

    fn institution(&self) -> InstitutionType {
        self.input.institution.institution_type
    }

    /// Income used for threshold comparisons, rounded to whole dollars.
    fn threshold_income(&self) -> Decimal {
        round_dollars(self.total_family_income)
    }

    fn granted(&self, stream: FundingStream) -> Decimal {
        self.awarded
            .iter()
            .filter(|(code, _)| code.stream() == stream && code.kind() == AwardKind::Grant)
            .map(|(_, result)| result.amount)
            .sum()
    }
}

/// Pure rule producing one award's result.
pub type AwardRule = fn(&AwardContext<'_>) -> AwardResult;

/// `clamp(cap − slope × max(0, income − income_cap), 0, cap)`.
pub fn sloped_amount(cap: Decimal, slope: Decimal, income_cap: Decimal, income: Decimal) -> Decimal {
    let excess = non_negative(income - income_cap);
    clamp(cap - slope * excess, Decimal::ZERO, cap)
}

fn sloped_annual(grant: &SlopedGrantParameters, family_size: u32, income: Decimal) -> Decimal {
    sloped_amount(
        grant.annual_cap,
        grant.slope,
        grant.thresholds.lookup(family_size),
        income,
    )
}

/// Rounds to dollars, then limits to what the program-year cap still allows.
fn finalize(amount: Decimal, program_year_cap: Decimal, already_paid: Decimal) -> AwardResult {
    let remaining = remaining_under_cap(program_year_cap, already_paid);
    AwardResult::eligible(non_negative(round_dollars(amount).min(remaining)))
}

fn federal_institution_allowed(institution: InstitutionType) -> bool {
    !matches!(institution, InstitutionType::International)
}

/// CSGF: sloped annual grant spread over the basis weeks; the weekly rate is rounded to
/// four decimals before it is multiplied by the study weeks.
pub fn csgf(ctx: &AwardContext<'_>) -> AwardResult {
    if !federal_institution_allowed(ctx.institution()) || ctx.federal_need <= Decimal::ZERO {
        return AwardResult::ineligible();
    }
    let grant = &ctx.parameters.csgf;
    let annual = sloped_annual(grant, ctx.family_size, ctx.threshold_income());
    let weekly = round_rate(annual / Decimal::from(grant.basis_weeks));
    let amount = (weekly * Decimal::from(ctx.weeks())).min(annual);
    finalize(amount, grant.annual_cap, ctx.paid(AwardCode::Csgf))
}

/// CSPT: sloped annual grant, not pro-rated.
pub fn cspt(ctx: &AwardContext<'_>) -> AwardResult {
    if !federal_institution_allowed(ctx.institution()) || ctx.federal_need <= Decimal::ZERO {
        return AwardResult::ineligible();
    }
    let grant = &ctx.parameters.cspt;
    let amount = sloped_annual(grant, ctx.family_size, ctx.threshold_income());
    finalize(amount, grant.annual_cap, ctx.paid(AwardCode::Cspt))
}

/// CSGD: sloped per-dependant grant pro-rated by study weeks without intermediate rounding.
pub fn csgd(ctx: &AwardContext<'_>) -> AwardResult {
    if ctx.csgd_dependants == 0 || ctx.federal_need <= Decimal::ZERO {
        return AwardResult::ineligible();
    }
    let grant = &ctx.parameters.csgd_per_dependant;
    let dependants = Decimal::from(ctx.csgd_dependants);
    let annual = sloped_annual(grant, ctx.family_size, ctx.threshold_income()) * dependants;
    let amount = pro_rate(annual, ctx.weeks(), grant.basis_weeks).min(annual);
    finalize(amount, grant.annual_cap * dependants, ctx.paid(AwardCode::Csgd))
}

/// CSGD as a flat weekly amount per dependant, with no income slope.
pub fn csgd_flat(ctx: &AwardContext<'_>) -> AwardResult {
    if ctx.csgd_dependants == 0 || ctx.federal_need <= Decimal::ZERO {
        return AwardResult::ineligible();
    }
    let dependants = Decimal::from(ctx.csgd_dependants);
    let cap = ctx.parameters.csgd_per_dependant.annual_cap * dependants;
    let amount = (ctx.parameters.csgd_weekly_per_dependant
        * dependants
        * Decimal::from(ctx.weeks()))
    .min(cap);
    finalize(amount, cap, ctx.paid(AwardCode::Csgd))
}

pub fn csgp(ctx: &AwardContext<'_>) -> AwardResult {
    if !ctx.input.student.has_permanent_disability() || ctx.federal_need <= Decimal::ZERO {
        return AwardResult::ineligible();
    }
    let amount = ctx.parameters.csgp_amount;
    finalize(amount, amount, ctx.paid(AwardCode::Csgp))
}

/// BCAG: BC public institutions, undergraduate credentials of at least one year.
pub fn bcag(ctx: &AwardContext<'_>) -> AwardResult {
    let program = ctx.input.program;
    let allowed = ctx.institution() == InstitutionType::BcPublic
        && program.credential.is_undergraduate()
        && program.length >= ProgramLength::OneToTwoYears;
    if !allowed || ctx.provincial_need <= Decimal::ZERO {
        return AwardResult::ineligible();
    }
    let grant = &ctx.parameters.bcag;
    let annual = sloped_annual(grant, ctx.family_size, ctx.threshold_income());
    let amount = pro_rate(annual, ctx.weeks(), grant.basis_weeks).min(annual);
    finalize(amount, grant.annual_cap, ctx.paid(AwardCode::Bcag))
}

pub fn bgpd(ctx: &AwardContext<'_>) -> AwardResult {
    let allowed = matches!(
        ctx.institution(),
        InstitutionType::BcPublic | InstitutionType::BcPrivate
    );
    if !allowed
        || !ctx.input.student.has_permanent_disability()
        || ctx.provincial_need <= Decimal::ZERO
    {
        return AwardResult::ineligible();
    }
    let amount = ctx.parameters.bgpd_amount;
    finalize(amount, amount, ctx.paid(AwardCode::Bgpd))
}

pub fn sbsd(ctx: &AwardContext<'_>) -> AwardResult {
    if !ctx.input.student.has_permanent_disability() || ctx.provincial_need <= Decimal::ZERO {
        return AwardResult::ineligible();
    }
    let amount = ctx.parameters.sbsd_amount;
    finalize(amount, amount, ctx.paid(AwardCode::Sbsd))
}

/// CSLF: federal need left after federal grants, limited per study week.
pub fn cslf(ctx: &AwardContext<'_>) -> AwardResult {
    if !federal_institution_allowed(ctx.institution()) || ctx.federal_need <= Decimal::ZERO {
        return AwardResult::ineligible();
    }
    let parameters = ctx.parameters;
    let unmet = non_negative(ctx.federal_need - ctx.granted(FundingStream::Federal));
    let limit = parameters.cslf_weekly_limit * Decimal::from(ctx.weeks());
    finalize(
        unmet.min(limit),
        parameters.cslf_program_year_cap,
        ctx.paid(AwardCode::Cslf),
    )
}

pub fn cslp(ctx: &AwardContext<'_>) -> AwardResult {
    if !federal_institution_allowed(ctx.institution()) || ctx.federal_need <= Decimal::ZERO {
        return AwardResult::ineligible();
    }
    let unmet = non_negative(ctx.federal_need - ctx.granted(FundingStream::Federal));
    finalize(
        unmet,
        ctx.parameters.cslp_program_year_cap,
        ctx.paid(AwardCode::Cslp),
    )
}

/// BCSL: provincial need left after provincial grants, limited per study week.
pub fn bcsl(ctx: &AwardContext<'_>) -> AwardResult {
    if ctx.institution() == InstitutionType::International || ctx.provincial_need <= Decimal::ZERO
    {
        return AwardResult::ineligible();
    }
    let parameters = ctx.parameters;
    let unmet = non_negative(ctx.provincial_need - ctx.granted(FundingStream::Provincial));
    let limit = parameters.bcsl_weekly_limit * Decimal::from(ctx.weeks());
    finalize(
        unmet.min(limit),
        parameters.bcsl_program_year_cap,
        ctx.paid(AwardCode::Bcsl),
    )
}
