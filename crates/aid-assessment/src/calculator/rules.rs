use std::collections::BTreeMap;
use std::fmt;

use super::awards::{self, AwardCode, AwardRule};
use super::parameters::ProgramYear;

/// Award rules indexed by `(program year, award code)`.
///
/// A new program year registers its own functions, so a year can swap one program's
/// formula without touching the others.
#[derive(Clone)]
pub struct RuleBook {
    rules: BTreeMap<(ProgramYear, AwardCode), AwardRule>,
}

impl RuleBook {
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    pub fn standard() -> Self {
        let mut book = Self::empty();
        for year in ProgramYear::supported() {
            book.register(year, AwardCode::Csgf, awards::csgf);
            book.register(year, AwardCode::Cspt, awards::cspt);
            book.register(year, AwardCode::Csgp, awards::csgp);
            book.register(year, AwardCode::Bcag, awards::bcag);
            book.register(year, AwardCode::Bgpd, awards::bgpd);
            book.register(year, AwardCode::Sbsd, awards::sbsd);
            book.register(year, AwardCode::Cslf, awards::cslf);
            book.register(year, AwardCode::Cslp, awards::cslp);
            book.register(year, AwardCode::Bcsl, awards::bcsl);
        }
        book.register(ProgramYear::Y2023_2024, AwardCode::Csgd, awards::csgd);
        book.register(ProgramYear::Y2024_2025, AwardCode::Csgd, awards::csgd_flat);
        book
    }

    pub fn register(&mut self, year: ProgramYear, code: AwardCode, rule: AwardRule) {
        self.rules.insert((year, code), rule);
    }

    pub fn rule(&self, year: ProgramYear, code: AwardCode) -> Option<AwardRule> {
        self.rules.get(&(year, code)).copied()
    }
}

impl fmt::Debug for RuleBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rules.keys()).finish()
    }
}

impl Default for RuleBook {
    fn default() -> Self {
        Self::standard()
    }
}
