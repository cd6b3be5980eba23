//! Illustrative bank financing of the keys amount.
//!
//! At delivery the buyer usually finances the keys balance. This module
//! gives a flat-rate estimate under the two amortization systems used in
//! Brazil:
//! - **SAC (Sistema de Amortização Constante)**: fixed amortization,
//!   decreasing payments.
//! - **Price (Sistema Francês de Amortização)**: fixed payments.
//!
//! It is an estimate only: no fees, insurance or rate tiers are modeled.

use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::schedule::Schedule;

/// Loan terms for financing the keys amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinancingTerms {
    /// The annual interest rate as a percentage (e.g., 10.5 for 10.5%).
    pub interest_per_year: Decimal,
    pub total_months: u32,
}

/// Represents the payment details for a single month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthPayment {
    /// The remaining balance of the loan after the payment.
    pub new_balance: Decimal,
    /// The portion of the payment that goes towards reducing the principal.
    pub current_amortization: Decimal,
    /// The portion of the payment that covers interest.
    pub current_interest: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTableResult {
    pub fixed_payment: Decimal,
    pub total_paid: Decimal,
    pub amortization_curve: Vec<MonthPayment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SacTableResult {
    pub fixed_amortization: Decimal,
    /// The amount of the first payment, which is the highest.
    pub first_payment: Decimal,
    /// The amount of the last payment, which is the lowest.
    pub last_payment: Decimal,
    pub total_paid: Decimal,
    pub amortization_curve: Vec<MonthPayment>,
}

/// Both tables for the same financed amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeysFinancingEstimate {
    pub financed_amount: Decimal,
    pub monthly_interest_rate: Decimal,
    pub price_table: PriceTableResult,
    pub sac_table: SacTableResult,
}

/// Normalizes an annual interest rate percentage to a monthly decimal rate.
///
/// 12% per year becomes roughly 0.9489% per month, not 1%.
pub fn normalize_annual_interest_rate(input: Decimal) -> Decimal {
    let base = Decimal::ONE + input / dec!(100);
    let exponent = Decimal::ONE / dec!(12);

    base.powd(exponent) - Decimal::ONE
}

/// Estimates financing `amount` under both tables.
///
/// # Errors
///
/// Returns an error if `total_months` is zero.
pub fn estimate_financing(
    amount: Decimal,
    terms: FinancingTerms,
) -> anyhow::Result<KeysFinancingEstimate> {
    let monthly_interest_rate = normalize_annual_interest_rate(terms.interest_per_year);

    Ok(KeysFinancingEstimate {
        financed_amount: amount,
        monthly_interest_rate,
        price_table: calculate_price_table(amount, monthly_interest_rate, terms.total_months)?,
        sac_table: calculate_sac_table(amount, monthly_interest_rate, terms.total_months)?,
    })
}

/// Estimates financing the keys amount of a finished schedule.
///
/// # Errors
///
/// Returns an error if the schedule has no positive keys amount or
/// `total_months` is zero.
pub fn estimate_keys_financing(
    schedule: &Schedule,
    terms: FinancingTerms,
) -> anyhow::Result<KeysFinancingEstimate> {
    let keys_amount = schedule.keys_amount();
    if keys_amount <= Decimal::ZERO {
        return Err(anyhow::anyhow!("Schedule has no keys balance to finance."));
    }
    estimate_financing(keys_amount, terms)
}

/// Calculates the financing trajectory using the Price table (fixed payments).
///
/// The Price table formula is: PMT = P * [i(1 + i)^n] / [(1 + i)^n – 1]
///
/// # Errors
///
/// Returns an error if `total_months` is zero.
pub fn calculate_price_table(
    total_amount: Decimal,
    monthly_interest_rate: Decimal,
    total_months: u32,
) -> anyhow::Result<PriceTableResult> {
    if total_months == 0 {
        return Err(anyhow::anyhow!("Total months cannot be zero."));
    }

    let fixed_payment = if monthly_interest_rate.is_zero() {
        total_amount / Decimal::from(total_months)
    } else {
        let i_plus_1_pow_n = (Decimal::ONE + monthly_interest_rate).powu(total_months.into());
        total_amount * (monthly_interest_rate * i_plus_1_pow_n) / (i_plus_1_pow_n - Decimal::ONE)
    };

    let mut current_balance = total_amount;
    let mut total_paid = Decimal::ZERO;
    let mut amortization_curve = Vec::with_capacity(total_months as usize);

    for _ in 0..total_months {
        let interest_payment = current_balance * monthly_interest_rate;
        let amortization = fixed_payment - interest_payment;
        current_balance -= amortization;
        total_paid += fixed_payment;
        amortization_curve.push(MonthPayment {
            new_balance: current_balance.max(Decimal::ZERO),
            current_amortization: amortization,
            current_interest: interest_payment,
        });
    }

    Ok(PriceTableResult {
        fixed_payment: fixed_payment.round_dp(2),
        total_paid: total_paid.round_dp(2),
        amortization_curve,
    })
}

/// Calculates the financing trajectory using SAC (constant amortization).
///
/// # Errors
///
/// Returns an error if `total_months` is zero.
pub fn calculate_sac_table(
    total_amount: Decimal,
    monthly_interest_rate: Decimal,
    total_months: u32,
) -> anyhow::Result<SacTableResult> {
    if total_months == 0 {
        return Err(anyhow::anyhow!("Total months cannot be zero."));
    }

    let fixed_amortization = total_amount / Decimal::from(total_months);
    let mut current_balance = total_amount;
    let mut payments = Vec::with_capacity(total_months as usize);
    let mut amortization_curve = Vec::with_capacity(total_months as usize);

    for _ in 0..total_months {
        let interest_payment = current_balance * monthly_interest_rate;
        payments.push(fixed_amortization + interest_payment);

        current_balance -= fixed_amortization;
        amortization_curve.push(MonthPayment {
            new_balance: current_balance.max(Decimal::ZERO),
            current_amortization: fixed_amortization,
            current_interest: interest_payment,
        });
    }

    let total_paid: Decimal = payments.iter().copied().sum();

    Ok(SacTableResult {
        fixed_amortization: fixed_amortization.round_dp(2),
        first_payment: payments.first().copied().unwrap_or_default().round_dp(2),
        last_payment: payments.last().copied().unwrap_or_default().round_dp(2),
        total_paid: total_paid.round_dp(2),
        amortization_curve,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use crate::index::IndexRateProvider;
    use crate::schedule::generate_schedule;

    #[test]
    fn test_estimate_financing_happy_path() {
        let terms = FinancingTerms {
            interest_per_year: dec!(12),
            total_months: 12,
        };

        let result = estimate_financing(dec!(12000), terms).unwrap();

        assert_eq!(result.sac_table.fixed_amortization, dec!(1000.00));
        assert_eq!(result.sac_table.first_payment, dec!(1113.87));
        assert_eq!(result.sac_table.last_payment, dec!(1009.49));
        assert_eq!(result.sac_table.total_paid, dec!(12740.13));

        assert_eq!(result.price_table.fixed_payment, dec!(1062.74));
        assert_eq!(result.price_table.total_paid, dec!(12752.94));
    }

    #[test]
    fn test_normalize_annual_interest_rate() {
        // (1.12)^(1/12) - 1 = 0.009488...
        let monthly_rate = normalize_annual_interest_rate(dec!(12));
        assert!(monthly_rate > dec!(0.0094) && monthly_rate < dec!(0.0095));
    }

    #[test]
    fn test_zero_rate_splits_evenly() {
        let result = calculate_price_table(dec!(1200), dec!(0), 12).unwrap();
        assert_eq!(result.fixed_payment, dec!(100));
        assert_eq!(result.total_paid, dec!(1200));
    }

    #[test]
    fn test_zero_months_error() {
        let terms = FinancingTerms {
            interest_per_year: dec!(10),
            total_months: 0,
        };
        assert!(estimate_financing(dec!(100000), terms).is_err());
    }

    #[test]
    fn test_keys_financing_uses_schedule_keys_amount() {
        let schedule = generate_schedule(&sample_config(), &IndexRateProvider::offline());
        let terms = FinancingTerms {
            interest_per_year: dec!(10.5),
            total_months: 360,
        };

        let estimate = estimate_keys_financing(&schedule, terms).unwrap();

        assert_eq!(estimate.financed_amount, schedule.keys_amount());
        assert_eq!(estimate.sac_table.amortization_curve.len(), 360);
        assert!(estimate.sac_table.first_payment > estimate.price_table.fixed_payment);
    }

    #[test]
    fn test_keys_financing_without_keys_balance_is_an_error() {
        let terms = FinancingTerms {
            interest_per_year: dec!(10.5),
            total_months: 360,
        };
        assert!(estimate_keys_financing(&Schedule::default(), terms).is_err());
    }
}
