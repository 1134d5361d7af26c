use rust_decimal::{Decimal, RoundingStrategy};

pub(crate) fn round_dollars(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

pub(crate) fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Weekly rates keep four decimals.
pub(crate) fn round_rate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

pub(crate) fn clamp(value: Decimal, low: Decimal, high: Decimal) -> Decimal {
    value.max(low).min(high)
}

pub(crate) fn non_negative(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}

/// `amount × weeks / basis_weeks`, without rounding.
pub(crate) fn pro_rate(amount: Decimal, weeks: u32, basis_weeks: u32) -> Decimal {
    if basis_weeks == 0 {
        return Decimal::ZERO;
    }
    amount * Decimal::from(weeks) / Decimal::from(basis_weeks)
}

/// What is still payable under a program-year cap once earlier payments are netted out.
pub(crate) fn remaining_under_cap(cap: Decimal, already_paid: Decimal) -> Decimal {
    non_negative(cap - already_paid)
}
