//! Purchase configuration and its advisory validation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::percentage::{sum_percentages, to_percentage};
use crate::rate::RateMode;
use crate::reinforcement::{ReinforcementPlan, date_for_month};

/// Input parameters for one off-plan purchase simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurchaseConfig {
    /// Sale price of the unit at the valuation date.
    pub property_value: Decimal,
    /// Amount paid at signing (entrada).
    pub down_payment_value: Decimal,
    /// Base value of each monthly installment before correction.
    pub installments_value: Decimal,
    pub installments_count: u32,
    /// Base value of each reinforcement (reforço) before correction.
    pub reinforcement_value: Decimal,
    /// Months between reinforcements; zero disables them.
    pub reinforcement_frequency: u32,
    /// Trailing installments that never carry a reinforcement.
    pub final_months_without_reinforcement: u32,
    /// Keys amount as quoted by the seller. Informational only: the
    /// schedule derives the real keys amount from the remaining balance.
    pub keys_value: Decimal,
    pub correction_mode: RateMode,
    pub appreciation_mode: RateMode,
    /// Monthly rent as a percentage of property value.
    pub rental_rate_percent: Decimal,
    pub valuation_date: Option<NaiveDate>,
    /// Month of the first installment.
    pub start_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    /// Explicit reinforcement dates overriding the frequency rule.
    pub custom_reinforcement_dates: Option<Vec<NaiveDate>>,
}

/// Percentage of the property value carried by each payment group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaymentShares {
    pub down_payment: Decimal,
    pub installments: Decimal,
    pub reinforcements: Decimal,
    pub keys: Decimal,
}

impl PaymentShares {
    pub fn total(&self) -> Decimal {
        sum_percentages(&[self.down_payment, self.installments, self.reinforcements, self.keys])
    }
}

/// Outcome of [`PurchaseConfig::validate`]. Advisory: generation never consults it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigReport {
    pub shares: PaymentShares,
    pub total_percent: Decimal,
    /// True when the shares add up to 100.00%.
    pub is_balanced: bool,
    pub missing_dates: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigReport {
    pub fn is_ready(&self) -> bool {
        self.is_balanced && self.missing_dates.is_empty()
    }
}

impl PurchaseConfig {
    /// True when every date the schedule is anchored on is present.
    pub fn has_dates(&self) -> bool {
        self.valuation_date.is_some() && self.start_date.is_some() && self.delivery_date.is_some()
    }

    /// Reinforcement months for this configuration, or `None` without a start date.
    pub fn reinforcement_plan(&self) -> Option<ReinforcementPlan> {
        let start = self.start_date?;
        Some(ReinforcementPlan::resolve(
            start,
            self.installments_count,
            self.reinforcement_frequency,
            self.final_months_without_reinforcement,
            self.custom_reinforcement_dates.as_deref(),
        ))
    }

    /// Base (uncorrected) total of all reinforcements.
    pub fn reinforcements_total(&self) -> Decimal {
        let count = self.reinforcement_plan().map(|plan| plan.count()).unwrap_or(0);
        self.reinforcement_value * Decimal::from(count)
    }

    pub fn installments_total(&self) -> Decimal {
        self.installments_value * Decimal::from(self.installments_count)
    }

    pub fn shares(&self) -> PaymentShares {
        let total = self.property_value;
        PaymentShares {
            down_payment: to_percentage(self.down_payment_value, total),
            installments: to_percentage(self.installments_total(), total),
            reinforcements: to_percentage(self.reinforcements_total(), total),
            keys: to_percentage(self.keys_value, total),
        }
    }

    pub fn validate(&self) -> ConfigReport {
        let shares = self.shares();
        let total_percent = shares.total();
        let is_balanced = total_percent.round_dp(2) == dec!(100);

        let missing_dates = [
            ("valuation_date", self.valuation_date),
            ("start_date", self.start_date),
            ("delivery_date", self.delivery_date),
        ]
        .into_iter()
        .filter(|(_, date)| date.is_none())
        .map(|(name, _)| name.to_string())
        .collect();

        let mut warnings = Vec::new();
        if !is_balanced {
            warnings.push(format!(
                "Payment shares add up to {}% instead of 100%",
                total_percent.round_dp(2)
            ));
        }
        if self.installments_count == 0 {
            warnings.push(
                "Installment count is zero; only the down payment and keys will be scheduled"
                    .to_string(),
            );
        }
        if let (Some(valuation), Some(start)) = (self.valuation_date, self.start_date) {
            if start < valuation {
                warnings.push("First installment precedes the valuation date".to_string());
            }
        }
        if let (Some(start), Some(delivery)) = (self.start_date, self.delivery_date) {
            let last_installment = date_for_month(start, self.installments_count.max(1));
            if last_installment.is_some_and(|last| delivery < last) {
                warnings.push("Delivery precedes the last installment".to_string());
            }
        }

        ConfigReport {
            shares,
            total_percent,
            is_balanced,
            missing_dates,
            warnings,
        }
    }
}
