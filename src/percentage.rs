//! Conversions between absolute values and percentages of a total.
//!
//! Every function here is pure so two-way bound form fields can share the
//! arithmetic without keeping state of their own.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Percentage that `value` represents of `total`.
///
/// Returns zero when `total` is zero.
pub fn to_percentage(value: Decimal, total: Decimal) -> Decimal {
    saturating_ratio(value, total).saturating_mul(dec!(100))
}

/// `value / total`, zero when `total` is zero and clamped to the
/// representable range when the quotient overflows.
pub fn saturating_ratio(value: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }
    value.checked_div(total).unwrap_or_else(|| {
        if value.is_sign_negative() == total.is_sign_negative() {
            Decimal::MAX
        } else {
            Decimal::MIN
        }
    })
}

/// Absolute value that `percent` represents of `total`.
pub fn to_value(percent: Decimal, total: Decimal) -> Decimal {
    total.saturating_mul(percent) / dec!(100)
}

pub fn sum_percentages(percentages: &[Decimal]) -> Decimal {
    percentages.iter().copied().sum()
}

/// What is left of `target` after the percentages already in use, floored at zero.
pub fn remaining(used: &[Decimal], target: Decimal) -> Decimal {
    (target - sum_percentages(used)).max(Decimal::ZERO)
}

/// [`remaining`] against the usual 100% target.
pub fn remaining_of_whole(used: &[Decimal]) -> Decimal {
    remaining(used, dec!(100))
}
