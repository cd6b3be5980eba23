//! Rental income and post-sale cost adjustments.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::percentage::{to_percentage, to_value};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RentalEstimate {
    pub monthly: Decimal,
    /// Twelve months of rent as a percentage of property value.
    pub annual_return_percent: Decimal,
}

/// Rent at `rate_percent` of `property_value` per month.
pub fn rental_estimate(property_value: Decimal, rate_percent: Decimal) -> RentalEstimate {
    let monthly = to_value(rate_percent, property_value);
    let annual_return_percent = to_percentage(monthly.saturating_mul(dec!(12)), property_value);

    RentalEstimate {
        monthly,
        annual_return_percent,
    }
}

/// Brokerage commission charged on the sale value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CommissionOption {
    pub include: bool,
    /// Fraction of the sale value (0.06 for 6%).
    pub rate: Decimal,
}

/// Tax charged on positive gross profit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxOption {
    pub include: bool,
    /// Fraction of the gross profit (0.15 for 15%).
    pub rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetProceeds {
    pub commission: Decimal,
    pub tax: Decimal,
    pub net_profit: Decimal,
}

/// Profit left after optional commission and tax. Losses are never taxed.
pub fn net_proceeds(
    sale_value: Decimal,
    gross_profit: Decimal,
    commission: CommissionOption,
    tax: TaxOption,
) -> NetProceeds {
    let commission = if commission.include {
        sale_value.saturating_mul(commission.rate)
    } else {
        Decimal::ZERO
    };
    let tax = if tax.include {
        gross_profit.max(Decimal::ZERO).saturating_mul(tax.rate)
    } else {
        Decimal::ZERO
    };

    NetProceeds {
        commission,
        tax,
        net_profit: gross_profit.saturating_sub(commission).saturating_sub(tax),
    }
}
