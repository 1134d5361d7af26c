use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Annual funding cycle. Rule parameters and award rules are versioned by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProgramYear {
    #[serde(rename = "2023-2024")]
    Y2023_2024,
    #[serde(rename = "2024-2025")]
    Y2024_2025,
}

impl ProgramYear {
    pub const fn supported() -> [Self; 2] {
        [Self::Y2023_2024, Self::Y2024_2025]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Y2023_2024 => "2023-2024",
            Self::Y2024_2025 => "2024-2025",
        }
    }

    pub fn parameters(self) -> ProgramYearParameters {
        match self {
            Self::Y2023_2024 => parameters_2023_2024(),
            Self::Y2024_2025 => parameters_2024_2025(),
        }
    }
}

impl fmt::Display for ProgramYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported program year '{0}'")]
pub struct UnknownProgramYear(pub String);

impl FromStr for ProgramYear {
    type Err = UnknownProgramYear;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::supported()
            .into_iter()
            .find(|year| year.label() == value.trim())
            .ok_or_else(|| UnknownProgramYear(value.to_string()))
    }
}

/// Amounts indexed by family size, growing linearly past the last listed size.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilySizeTable {
    values: Vec<Decimal>,
    per_additional_member: Decimal,
}

impl FamilySizeTable {
    pub fn new(values: Vec<Decimal>, per_additional_member: Decimal) -> Self {
        Self {
            values,
            per_additional_member,
        }
    }

    pub fn lookup(&self, family_size: u32) -> Decimal {
        let size = family_size.max(1) as usize;
        match self.values.get(size - 1) {
            Some(value) => *value,
            None => {
                let last = self.values.last().copied().unwrap_or(Decimal::ZERO);
                let extra = Decimal::from((size - self.values.len()) as u64);
                last + self.per_additional_member * extra
            }
        }
    }
}

/// Weekly sloped contribution: `clamp(min + slope × excess, min, max)` per study week.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyContributionScale {
    pub minimum_weekly: Decimal,
    pub maximum_weekly: Decimal,
    pub slope: Decimal,
}

/// Sloped grant parameters: `cap − slope × max(0, income − threshold(family size))`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlopedGrantParameters {
    pub annual_cap: Decimal,
    pub slope: Decimal,
    pub thresholds: FamilySizeTable,
    /// Weeks the annual cap is spread over when pro-rated.
    pub basis_weeks: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramYearParameters {
    pub program_year: ProgramYear,

    pub msol_weekly: FamilySizeTable,
    pub living_at_home_weekly: Decimal,
    pub interface_policy_threshold: Decimal,
    pub interface_policy_weekly: Decimal,

    pub federal_books_cap: Decimal,
    pub childcare_weekly_per_child: Decimal,
    pub transportation_weekly_cap: Decimal,
    pub return_transportation_cap: Decimal,
    pub exceptional_expense_cap: Decimal,

    pub cpp_cap: Decimal,
    pub ei_cap: Decimal,

    pub contribution_thresholds: FamilySizeTable,
    pub federal_student_contribution: WeeklyContributionScale,
    pub provincial_student_contribution: WeeklyContributionScale,
    pub spousal_exemption: Decimal,
    pub spousal_rate: Decimal,
    pub parental_msol: FamilySizeTable,
    pub parental_first_band: Decimal,
    pub parental_first_rate: Decimal,
    pub parental_upper_rate: Decimal,

    pub csgf: SlopedGrantParameters,
    pub cspt: SlopedGrantParameters,
    pub csgd_per_dependant: SlopedGrantParameters,
    pub csgd_weekly_per_dependant: Decimal,
    pub bcag: SlopedGrantParameters,
    pub csgp_amount: Decimal,
    pub bgpd_amount: Decimal,
    pub sbsd_amount: Decimal,

    pub cslf_weekly_limit: Decimal,
    pub cslf_program_year_cap: Decimal,
    pub cslp_program_year_cap: Decimal,
    pub bcsl_weekly_limit: Decimal,
    pub bcsl_program_year_cap: Decimal,
}

fn federal_grant_thresholds() -> FamilySizeTable {
    FamilySizeTable::new(
        vec![
            dec!(37000),
            dec!(52000),
            dec!(64000),
            dec!(73000),
            dec!(81000),
            dec!(88000),
            dec!(95000),
        ],
        dec!(6500),
    )
}

fn parameters_2023_2024() -> ProgramYearParameters {
    ProgramYearParameters {
        program_year: ProgramYear::Y2023_2024,
        msol_weekly: FamilySizeTable::new(
            vec![dec!(563), dec!(1006), dec!(1202), dec!(1398)],
            dec!(170),
        ),
        living_at_home_weekly: dec!(297),
        interface_policy_threshold: dec!(3000),
        interface_policy_weekly: dec!(183),
        federal_books_cap: dec!(3000),
        childcare_weekly_per_child: dec!(104),
        transportation_weekly_cap: dec!(53),
        return_transportation_cap: dec!(600),
        exceptional_expense_cap: dec!(3000),
        cpp_cap: dec!(3754.45),
        ei_cap: dec!(1002.45),
        contribution_thresholds: federal_grant_thresholds(),
        federal_student_contribution: WeeklyContributionScale {
            minimum_weekly: dec!(30),
            maximum_weekly: dec!(60),
            slope: dec!(0.0015),
        },
        provincial_student_contribution: WeeklyContributionScale {
            minimum_weekly: dec!(25),
            maximum_weekly: dec!(50),
            slope: dec!(0.00125),
        },
        spousal_exemption: dec!(20000),
        spousal_rate: dec!(0.25),
        parental_msol: FamilySizeTable::new(
            vec![dec!(24000), dec!(30000), dec!(37000), dec!(44000)],
            dec!(7000),
        ),
        parental_first_band: dec!(20000),
        parental_first_rate: dec!(0.25),
        parental_upper_rate: dec!(0.5),
        csgf: SlopedGrantParameters {
            annual_cap: dec!(4200),
            slope: dec!(0.08),
            thresholds: federal_grant_thresholds(),
            basis_weeks: 34,
        },
        cspt: SlopedGrantParameters {
            annual_cap: dec!(3600),
            slope: dec!(0.05),
            thresholds: federal_grant_thresholds(),
            basis_weeks: 52,
        },
        csgd_per_dependant: SlopedGrantParameters {
            annual_cap: dec!(1600),
            slope: dec!(0.04),
            thresholds: federal_grant_thresholds(),
            basis_weeks: 34,
        },
        csgd_weekly_per_dependant: dec!(47),
        bcag: SlopedGrantParameters {
            annual_cap: dec!(4000),
            slope: dec!(0.1),
            thresholds: FamilySizeTable::new(
                vec![
                    dec!(32000),
                    dec!(45000),
                    dec!(55000),
                    dec!(63000),
                    dec!(70000),
                    dec!(76000),
                    dec!(82000),
                ],
                dec!(5500),
            ),
            basis_weeks: 34,
        },
        csgp_amount: dec!(2800),
        bgpd_amount: dec!(2000),
        sbsd_amount: dec!(800),
        cslf_weekly_limit: dec!(300),
        cslf_program_year_cap: dec!(15600),
        cslp_program_year_cap: dec!(10000),
        bcsl_weekly_limit: dec!(110),
        bcsl_program_year_cap: dec!(5720),
    }
}

fn parameters_2024_2025() -> ProgramYearParameters {
    let mut parameters = parameters_2023_2024();
    parameters.program_year = ProgramYear::Y2024_2025;
    parameters.msol_weekly = FamilySizeTable::new(
        vec![dec!(581), dec!(1038), dec!(1240), dec!(1442)],
        dec!(176),
    );
    parameters.living_at_home_weekly = dec!(306);
    parameters.cpp_cap = dec!(3867.50);
    parameters.ei_cap = dec!(1049.12);
    parameters.csgd_weekly_per_dependant = dec!(49);
    parameters.bcag.annual_cap = dec!(4200);
    parameters
}
