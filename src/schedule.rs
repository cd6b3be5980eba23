//! Month-by-month payment, balance and property-value series.
//!
//! The generator walks installments `1..=N`. Each month it corrects the
//! outstanding balance by that month's correction rate, charges the base
//! installment (plus reinforcement, when due) scaled by the cumulative
//! correction factor, and projects the property value through the
//! correction and appreciation factors. The last installment is never
//! charged: whatever corrected balance is left becomes the keys amount,
//! paid on the delivery date.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PurchaseConfig;
use crate::index::IndexRateProvider;
use crate::rate::CompoundingFactor;
use crate::reinforcement::{ReinforcementPlan, date_for_month};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentKind {
    #[serde(rename = "entrada")]
    DownPayment,
    #[serde(rename = "parcela")]
    Installment,
    /// An installment month that also carries a reinforcement.
    #[serde(rename = "reforco")]
    Reinforcement,
    #[serde(rename = "chaves")]
    Keys,
}

impl PaymentKind {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentKind::DownPayment => "entrada",
            PaymentKind::Installment => "parcela",
            PaymentKind::Reinforcement => "reforço",
            PaymentKind::Keys => "chaves",
        }
    }
}

/// One row of the schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub date: NaiveDate,
    pub kind: PaymentKind,
    /// Total paid in this period, reinforcement included.
    pub amount: Decimal,
    /// Portion of `amount` that is reinforcement.
    pub reinforcement_amount: Decimal,
    /// Outstanding balance after this period.
    pub balance: Decimal,
    /// Running total paid. Non-decreasing unless installments overpay the
    /// balance, in which case the negative keys amount refunds the excess.
    pub cumulative_paid: Decimal,
    pub property_value: Decimal,
    /// Relative month; 0 is the down payment.
    pub month: u32,
}

/// Ordered schedule rows. Never mutated once generated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    entries: Vec<PaymentEntry>,
}

/// Aggregates over a finished schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub down_payment: Decimal,
    pub installments_total: Decimal,
    pub reinforcements_total: Decimal,
    pub keys_amount: Decimal,
    pub total_paid: Decimal,
    pub initial_property_value: Decimal,
    pub final_property_value: Decimal,
}

impl Schedule {
    pub fn new(entries: Vec<PaymentEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PaymentEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_for_month(&self, month: u32) -> Option<&PaymentEntry> {
        self.entries.iter().find(|entry| entry.month == month)
    }

    /// Rows eligible as resale months: everything after the down payment.
    pub fn resale_entries(&self) -> impl Iterator<Item = &PaymentEntry> {
        self.entries.iter().filter(|entry| entry.month > 0)
    }

    pub fn keys_entry(&self) -> Option<&PaymentEntry> {
        self.entries.iter().rev().find(|entry| entry.kind == PaymentKind::Keys)
    }

    pub fn keys_amount(&self) -> Decimal {
        self.keys_entry().map(|entry| entry.amount).unwrap_or_default()
    }

    pub fn last_month(&self) -> u32 {
        self.entries.last().map(|entry| entry.month).unwrap_or_default()
    }

    pub fn summary(&self) -> ScheduleSummary {
        let sum_of = |kinds: &[PaymentKind], pick: fn(&PaymentEntry) -> Decimal| -> Decimal {
            self.entries
                .iter()
                .filter(|entry| kinds.contains(&entry.kind))
                .map(pick)
                .fold(Decimal::ZERO, Decimal::saturating_add)
        };

        ScheduleSummary {
            down_payment: sum_of(&[PaymentKind::DownPayment], |e| e.amount),
            installments_total: sum_of(
                &[PaymentKind::Installment, PaymentKind::Reinforcement],
                |e| e.amount.saturating_sub(e.reinforcement_amount),
            ),
            reinforcements_total: sum_of(&[PaymentKind::Reinforcement], |e| e.reinforcement_amount),
            keys_amount: self.keys_amount(),
            total_paid: self.entries.last().map(|e| e.cumulative_paid).unwrap_or_default(),
            initial_property_value: self
                .entries
                .first()
                .map(|e| e.property_value)
                .unwrap_or_default(),
            final_property_value: self
                .entries
                .last()
                .map(|e| e.property_value)
                .unwrap_or_default(),
        }
    }
}

/// Builds schedules against a shared [`IndexRateProvider`].
///
/// Performs no I/O: resolve [`IndexRateProvider::ensure_loaded`] first when
/// an index family backed by the remote source is selected.
pub struct ScheduleGenerator<'a> {
    provider: &'a IndexRateProvider,
}

impl<'a> ScheduleGenerator<'a> {
    pub fn new(provider: &'a IndexRateProvider) -> Self {
        Self { provider }
    }

    /// Generates the schedule for `config`.
    ///
    /// Returns an empty schedule when any of the valuation, start or
    /// delivery dates is missing, and a down-payment-only schedule when the
    /// installment count is zero.
    pub fn generate(&self, config: &PurchaseConfig) -> Schedule {
        let (Some(valuation), Some(start), Some(delivery)) =
            (config.valuation_date, config.start_date, config.delivery_date)
        else {
            debug!("schedule skipped, configuration is missing a date");
            return Schedule::default();
        };

        let count = config.installments_count;
        let cycle_offset = valuation.month0();
        let plan = ReinforcementPlan::resolve(
            start,
            count,
            config.reinforcement_frequency,
            config.final_months_without_reinforcement,
            config.custom_reinforcement_dates.as_deref(),
        );

        let mut correction = CompoundingFactor::new();
        let mut appreciation = CompoundingFactor::new();
        let mut balance = config.property_value - config.down_payment_value;
        let mut cumulative_paid = config.down_payment_value;
        let mut entries = Vec::with_capacity(count as usize + 2);

        entries.push(PaymentEntry {
            date: valuation,
            kind: PaymentKind::DownPayment,
            amount: config.down_payment_value,
            reinforcement_amount: Decimal::ZERO,
            balance,
            cumulative_paid,
            property_value: config.property_value,
            month: 0,
        });

        if count == 0 {
            debug!("schedule has no installments, returning down payment only");
            return Schedule::new(entries);
        }

        let mut keys_amount = Decimal::ZERO;
        let mut date = start;

        for month in 1..=count {
            let correction_rate =
                self.provider.monthly_rate(&config.correction_mode, month, cycle_offset);
            let appreciation_rate =
                self.provider.monthly_rate(&config.appreciation_mode, month, cycle_offset);

            let corrected_balance = balance.saturating_mul(Decimal::ONE + correction_rate);
            let correction_factor = correction.advance(correction_rate);
            let appreciation_factor = appreciation.advance(appreciation_rate);
            let property_value =
                projected_value(config.property_value, correction_factor, appreciation_factor);

            date = date_for_month(start, month).unwrap_or(date);

            if month == count {
                keys_amount = corrected_balance;
                balance = corrected_balance;

                // a single installment is the keys payment itself
                if count > 1 {
                    entries.push(PaymentEntry {
                        date,
                        kind: PaymentKind::Installment,
                        amount: Decimal::ZERO,
                        reinforcement_amount: Decimal::ZERO,
                        balance,
                        cumulative_paid,
                        property_value,
                        month,
                    });
                }
                continue;
            }

            let installment = config.installments_value.saturating_mul(correction_factor);
            let reinforcement = if plan.applies_to(month) {
                config.reinforcement_value.saturating_mul(correction_factor)
            } else {
                Decimal::ZERO
            };
            let paid = installment.saturating_add(reinforcement);

            balance = corrected_balance.saturating_sub(paid);
            cumulative_paid = cumulative_paid.saturating_add(paid);

            entries.push(PaymentEntry {
                date,
                kind: if reinforcement.is_zero() {
                    PaymentKind::Installment
                } else {
                    PaymentKind::Reinforcement
                },
                amount: paid,
                reinforcement_amount: reinforcement,
                balance,
                cumulative_paid,
                property_value,
                month,
            });
        }

        let keys_month = count + 1;
        let correction_factor = correction.advance(
            self.provider.monthly_rate(&config.correction_mode, keys_month, cycle_offset),
        );
        let appreciation_factor = appreciation.advance(
            self.provider.monthly_rate(&config.appreciation_mode, keys_month, cycle_offset),
        );
        cumulative_paid = cumulative_paid.saturating_add(keys_amount);

        entries.push(PaymentEntry {
            date: delivery,
            kind: PaymentKind::Keys,
            amount: keys_amount,
            reinforcement_amount: Decimal::ZERO,
            balance: Decimal::ZERO,
            cumulative_paid,
            property_value: projected_value(
                config.property_value,
                correction_factor,
                appreciation_factor,
            ),
            month: keys_month,
        });

        debug!(
            rows = entries.len(),
            keys_amount = %keys_amount.round_dp(2),
            total_paid = %cumulative_paid.round_dp(2),
            "schedule generated"
        );

        Schedule::new(entries)
    }
}

/// Property value compounded by both factors, clamped when it overflows.
fn projected_value(base: Decimal, correction: Decimal, appreciation: Decimal) -> Decimal {
    base.saturating_mul(correction).saturating_mul(appreciation)
}

/// Convenience wrapper around [`ScheduleGenerator::generate`].
pub fn generate_schedule(config: &PurchaseConfig, provider: &IndexRateProvider) -> Schedule {
    ScheduleGenerator::new(provider).generate(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{date, sample_config};
    use crate::rate::{IndexFamily, RateMode};
    use rstest::rstest;
    use rust_decimal::MathematicalOps;
    use rust_decimal_macros::dec;

    const EPSILON: Decimal = dec!(0.01);

    fn flat_config() -> PurchaseConfig {
        PurchaseConfig {
            property_value: dec!(500_000),
            down_payment_value: dec!(50_000),
            installments_value: dec!(37_500),
            installments_count: 12,
            correction_mode: RateMode::Manual(dec!(0)),
            appreciation_mode: RateMode::Manual(dec!(0)),
            valuation_date: Some(date(2025, 1, 5)),
            start_date: Some(date(2025, 2, 5)),
            delivery_date: Some(date(2026, 2, 20)),
            ..PurchaseConfig::default()
        }
    }

    fn generate(config: &PurchaseConfig) -> Schedule {
        generate_schedule(config, &IndexRateProvider::offline())
    }

    #[test]
    fn test_flat_schedule_keeps_property_value_and_ends_at_zero() {
        let schedule = generate(&flat_config());

        assert_eq!(schedule.len(), 14);
        assert!(schedule.entries().iter().all(|e| e.property_value == dec!(500_000)));

        let keys = schedule.keys_entry().unwrap();
        assert_eq!(keys.balance, dec!(0));
        assert_eq!(keys.amount, dec!(37_500));
        assert_eq!(keys.month, 13);
        assert_eq!(keys.cumulative_paid, dec!(500_000));

        let last_installment = schedule.entry_for_month(12).unwrap();
        assert_eq!(last_installment.amount, dec!(0));
        assert_eq!(last_installment.balance, dec!(37_500));
    }

    #[test]
    fn test_one_percent_correction_compounds_unpaid_balance() {
        let config = PurchaseConfig {
            installments_value: dec!(0),
            correction_mode: RateMode::Manual(dec!(1)),
            ..flat_config()
        };

        let schedule = generate(&config);
        let expected = dec!(450_000) * dec!(1.01).powu(12);

        assert!((schedule.keys_amount() - expected).abs() < EPSILON);
        assert!((schedule.keys_amount() - dec!(507_071.26)).abs() < EPSILON);
    }

    #[rstest]
    #[case(RateMode::Manual(dec!(0.5)), RateMode::Manual(dec!(0.8)))]
    #[case(RateMode::Index(IndexFamily::Incc), RateMode::Index(IndexFamily::Igpm))]
    #[case(RateMode::Index(IndexFamily::Ipca), RateMode::Manual(dec!(-0.3)))]
    #[case(RateMode::Manual(dec!(-0.4)), RateMode::Index(IndexFamily::Cub))]
    fn test_schedule_shape_holds_for_any_rate_mode(
        #[case] correction: RateMode,
        #[case] appreciation: RateMode,
    ) {
        let config = PurchaseConfig {
            correction_mode: correction,
            appreciation_mode: appreciation,
            ..sample_config()
        };

        let schedule = generate(&config);
        let entries = schedule.entries();

        assert_eq!(entries.len(), config.installments_count as usize + 2);
        assert!(entries.last().unwrap().balance.abs() < EPSILON);
        for pair in entries.windows(2) {
            assert!(pair[1].cumulative_paid >= pair[0].cumulative_paid);
            assert!(pair[1].date >= pair[0].date);
            assert_eq!(pair[1].month, pair[0].month + 1);
        }
    }

    #[test]
    fn test_reinforcement_uses_installment_factor() {
        let config = sample_config();
        let schedule = generate(&config);

        let sixth = schedule.entry_for_month(6).unwrap();
        let factor = dec!(1.005).powu(6);

        assert_eq!(sixth.kind, PaymentKind::Reinforcement);
        assert_eq!(sixth.reinforcement_amount, dec!(15_000) * factor);
        assert_eq!(sixth.amount, dec!(30_000) * factor);
        assert_eq!(schedule.entry_for_month(5).unwrap().reinforcement_amount, dec!(0));
    }

    #[test]
    fn test_property_value_compounds_correction_and_appreciation() {
        let config = sample_config();
        let schedule = generate(&config);

        let month = schedule.entry_for_month(10).unwrap();
        let expected = dec!(600_000) * dec!(1.005).powu(10) * dec!(1.008).powu(10);
        assert!((month.property_value - expected).abs() < EPSILON);

        let keys = schedule.keys_entry().unwrap();
        let expected_keys = dec!(600_000) * dec!(1.005).powu(25) * dec!(1.008).powu(25);
        assert!((keys.property_value - expected_keys).abs() < EPSILON);
    }

    #[test]
    fn test_keys_amount_ignores_configured_keys_value() {
        let mut config = flat_config();
        config.keys_value = dec!(1);
        assert_eq!(generate(&config).keys_amount(), dec!(37_500));
    }

    #[test]
    fn test_overpayment_leaves_negative_balance() {
        let config = PurchaseConfig {
            installments_value: dec!(300_000),
            ..flat_config()
        };
        let schedule = generate(&config);

        assert_eq!(schedule.entry_for_month(2).unwrap().balance, dec!(-150_000));
        assert_eq!(schedule.keys_amount(), dec!(-2_850_000));

        // the refund at the keys row brings the total back to the property value
        let last_installment = schedule.entry_for_month(12).unwrap();
        let keys = schedule.keys_entry().unwrap();
        assert_eq!(last_installment.cumulative_paid, dec!(3_350_000));
        assert_eq!(keys.cumulative_paid, dec!(500_000));
    }

    #[test]
    fn test_single_installment_collapses_into_keys() {
        let config = PurchaseConfig {
            installments_count: 1,
            installments_value: dec!(450_000),
            ..flat_config()
        };
        let schedule = generate(&config);

        let kinds: Vec<_> = schedule.entries().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![PaymentKind::DownPayment, PaymentKind::Keys]);
        assert_eq!(schedule.keys_amount(), dec!(450_000));
        assert_eq!(schedule.keys_entry().unwrap().month, 2);
    }

    #[test]
    fn test_zero_installments_yield_down_payment_only() {
        let config = PurchaseConfig {
            installments_count: 0,
            ..flat_config()
        };
        let schedule = generate(&config);
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.entries()[0].kind, PaymentKind::DownPayment);
    }

    #[rstest]
    #[case::valuation(PurchaseConfig { valuation_date: None, ..flat_config() })]
    #[case::start(PurchaseConfig { start_date: None, ..flat_config() })]
    #[case::delivery(PurchaseConfig { delivery_date: None, ..flat_config() })]
    fn test_missing_date_yields_empty_schedule(#[case] config: PurchaseConfig) {
        assert!(generate(&config).is_empty());
    }

    #[test]
    fn test_custom_reinforcement_dates_drive_schedule() {
        let mut config = sample_config();
        config.custom_reinforcement_dates = Some(vec![date(2025, 4, 1), date(2025, 9, 30)]);

        let schedule = generate(&config);
        let months: Vec<u32> = schedule
            .entries()
            .iter()
            .filter(|e| e.kind == PaymentKind::Reinforcement)
            .map(|e| e.month)
            .collect();

        assert_eq!(months, vec![3, 8]);
    }

    #[test]
    fn test_summary_adds_up_to_total_paid() {
        let schedule = generate(&sample_config());
        let summary = schedule.summary();

        let parts = summary.down_payment
            + summary.installments_total
            + summary.reinforcements_total
            + summary.keys_amount;
        assert!((parts - summary.total_paid).abs() < EPSILON);
        assert_eq!(summary.initial_property_value, dec!(600_000));
    }

    #[test]
    fn test_runaway_correction_saturates_instead_of_overflowing() {
        let config = PurchaseConfig {
            installments_count: 720,
            correction_mode: RateMode::Manual(dec!(10)),
            delivery_date: Some(date(2085, 3, 1)),
            ..sample_config()
        };

        let schedule = generate(&config);

        assert_eq!(schedule.len(), 722);
        assert!(
            schedule
                .entries()
                .windows(2)
                .all(|pair| pair[1].property_value >= pair[0].property_value)
        );
        assert_eq!(schedule.keys_entry().unwrap().property_value, Decimal::MAX);
        assert_eq!(schedule.summary().final_property_value, Decimal::MAX);
    }
}
