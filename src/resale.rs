//! Resale timing search over a finished schedule.
//!
//! Every month after the down payment is a candidate sale. A sale at month
//! `m` returns the projected property value, minus what was paid through
//! `m` and the balance still owed to the developer.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::percentage::{saturating_ratio, to_percentage};
use crate::schedule::{PaymentEntry, Schedule};

/// Result of a hypothetical sale at one month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResaleOutcome {
    pub month: u32,
    /// Cumulative amount paid through `month`.
    pub investment_value: Decimal,
    pub property_value: Decimal,
    pub remaining_balance: Decimal,
    pub profit: Decimal,
    /// `profit / investment_value * 100`, zero when nothing was invested.
    pub profit_percentage: Decimal,
}

impl ResaleOutcome {
    pub fn from_entry(entry: &PaymentEntry) -> Self {
        let investment_value = entry.cumulative_paid;
        let profit = entry
            .property_value
            .saturating_sub(investment_value)
            .saturating_sub(entry.balance);
        let profit_percentage = to_percentage(profit, investment_value);

        Self {
            month: entry.month,
            investment_value,
            property_value: entry.property_value,
            remaining_balance: entry.balance,
            profit,
            profit_percentage,
        }
    }

    /// Profit per unit invested, divided by the months held.
    ///
    /// Ranks early modest gains above late large ones; zero at month zero
    /// or without investment.
    pub fn time_discounted_roi(&self) -> Decimal {
        if self.investment_value.is_zero() || self.month == 0 {
            return Decimal::ZERO;
        }
        saturating_ratio(self.profit, self.investment_value) / Decimal::from(self.month)
    }
}

/// Outcome of a sale at `month`, if the schedule has that month.
pub fn resale_outcome(schedule: &Schedule, month: u32) -> Option<ResaleOutcome> {
    schedule.entry_for_month(month).map(ResaleOutcome::from_entry)
}

/// Outcomes for every candidate resale month, in order.
pub fn resale_outcomes(schedule: &Schedule) -> Vec<ResaleOutcome> {
    schedule.resale_entries().map(ResaleOutcome::from_entry).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Rapid,
    Balanced,
    Maximum,
    MaxProfit,
    MaxRoi,
    EarliestQualifying,
}

impl StrategyKind {
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::Rapid => "rapid",
            StrategyKind::Balanced => "balanced",
            StrategyKind::Maximum => "maximum",
            StrategyKind::MaxProfit => "max-profit",
            StrategyKind::MaxRoi => "max-roi",
            StrategyKind::EarliestQualifying => "earliest-qualifying",
        }
    }
}

/// A recommended resale month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub kind: StrategyKind,
    pub month: u32,
    pub profit: Decimal,
    pub profit_percentage: Decimal,
    pub investment_value: Decimal,
    pub property_value: Decimal,
    pub remaining_balance: Decimal,
    /// Weighted mix of profit and ROI, each normalized by its best value
    /// across the schedule.
    pub composite_score: Decimal,
}

impl StrategyResult {
    pub fn label(&self) -> &'static str {
        self.kind.label()
    }
}

/// Bucket and weighting parameters for one risk profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileRule {
    /// First eligible month, as a fraction of the last schedule month.
    pub horizon_start: Decimal,
    /// Last eligible month, as a fraction of the last schedule month.
    pub horizon_end: Decimal,
    /// Profit percentage a month must reach to qualify.
    pub min_profit_percentage: Decimal,
    pub profit_weight: Decimal,
    pub roi_weight: Decimal,
}

impl ProfileRule {
    /// Inclusive month window for a schedule ending at `last_month`.
    fn window(&self, last_month: u32) -> (u32, u32) {
        let last = Decimal::from(last_month);
        let to_month = |fraction: Decimal| {
            (last * fraction)
                .ceil()
                .to_u32()
                .unwrap_or(0)
                .clamp(1, last_month.max(1))
        };
        (to_month(self.horizon_start), to_month(self.horizon_end))
    }
}

/// Tunable policy behind [`ResaleOptimizer::risk_profiles`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    pub rapid: ProfileRule,
    pub balanced: ProfileRule,
    pub maximum: ProfileRule,
    /// Weights used to score the single-criterion picks.
    pub default_profit_weight: Decimal,
    pub default_roi_weight: Decimal,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            rapid: ProfileRule {
                horizon_start: dec!(0),
                horizon_end: dec!(0.4),
                min_profit_percentage: dec!(10),
                profit_weight: dec!(0.3),
                roi_weight: dec!(0.7),
            },
            balanced: ProfileRule {
                horizon_start: dec!(0.3),
                horizon_end: dec!(0.75),
                min_profit_percentage: dec!(0),
                profit_weight: dec!(0.5),
                roi_weight: dec!(0.5),
            },
            maximum: ProfileRule {
                horizon_start: dec!(0),
                horizon_end: dec!(1),
                min_profit_percentage: dec!(0),
                profit_weight: dec!(0.8),
                roi_weight: dec!(0.2),
            },
            default_profit_weight: dec!(0.5),
            default_roi_weight: dec!(0.5),
        }
    }
}

/// The three risk-profile recommendations. Any of them may be absent
/// when no month fits the profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskProfiles {
    pub rapid: Option<StrategyResult>,
    pub balanced: Option<StrategyResult>,
    pub maximum: Option<StrategyResult>,
}

impl RiskProfiles {
    pub fn iter(&self) -> impl Iterator<Item = &StrategyResult> {
        [&self.rapid, &self.balanced, &self.maximum]
            .into_iter()
            .filter_map(Option::as_ref)
    }
}

/// Best positive profit and profit percentage across a schedule.
struct Normalizer {
    max_profit: Decimal,
    max_percentage: Decimal,
}

impl Normalizer {
    fn new(outcomes: &[ResaleOutcome]) -> Self {
        let max_of = |pick: fn(&ResaleOutcome) -> Decimal| {
            outcomes.iter().map(pick).fold(Decimal::ZERO, Decimal::max)
        };
        Self {
            max_profit: max_of(|o| o.profit),
            max_percentage: max_of(|o| o.profit_percentage),
        }
    }

    fn score(
        &self,
        outcome: &ResaleOutcome,
        profit_weight: Decimal,
        roi_weight: Decimal,
    ) -> Decimal {
        let profit_part =
            profit_weight.saturating_mul(saturating_ratio(outcome.profit, self.max_profit));
        let roi_part = roi_weight
            .saturating_mul(saturating_ratio(outcome.profit_percentage, self.max_percentage));
        profit_part.saturating_add(roi_part)
    }
}

/// Searches schedules for resale months.
#[derive(Debug, Clone, Default)]
pub struct ResaleOptimizer {
    policy: RiskPolicy,
}

impl ResaleOptimizer {
    pub fn new(policy: RiskPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    fn result(
        &self,
        kind: StrategyKind,
        outcome: &ResaleOutcome,
        normalizer: &Normalizer,
        weights: (Decimal, Decimal),
    ) -> StrategyResult {
        StrategyResult {
            kind,
            month: outcome.month,
            profit: outcome.profit,
            profit_percentage: outcome.profit_percentage,
            investment_value: outcome.investment_value,
            property_value: outcome.property_value,
            remaining_balance: outcome.remaining_balance,
            composite_score: normalizer.score(outcome, weights.0, weights.1),
        }
    }

    fn default_weights(&self) -> (Decimal, Decimal) {
        (self.policy.default_profit_weight, self.policy.default_roi_weight)
    }

    /// Month with the highest absolute profit; the earliest wins ties.
    pub fn best_by_profit(&self, schedule: &Schedule) -> Option<StrategyResult> {
        let outcomes = resale_outcomes(schedule);
        let best = best_by(&outcomes, |o| o.profit)?;
        let normalizer = Normalizer::new(&outcomes);
        Some(self.result(StrategyKind::MaxProfit, best, &normalizer, self.default_weights()))
    }

    /// Month with the highest [`ResaleOutcome::time_discounted_roi`]; the earliest wins ties.
    pub fn best_by_roi(&self, schedule: &Schedule) -> Option<StrategyResult> {
        let outcomes = resale_outcomes(schedule);
        let best = best_by(&outcomes, ResaleOutcome::time_discounted_roi)?;
        let normalizer = Normalizer::new(&outcomes);
        Some(self.result(StrategyKind::MaxRoi, best, &normalizer, self.default_weights()))
    }

    /// First month up to `within_months` with a positive profit of at least
    /// `threshold_percent`.
    pub fn earliest_qualifying(
        &self,
        schedule: &Schedule,
        threshold_percent: Decimal,
        within_months: u32,
    ) -> Option<StrategyResult> {
        let outcomes = resale_outcomes(schedule);
        let hit = outcomes.iter().find(|o| {
            o.month <= within_months
                && o.profit > Decimal::ZERO
                && o.profit_percentage >= threshold_percent
        })?;
        let normalizer = Normalizer::new(&outcomes);
        Some(self.result(
            StrategyKind::EarliestQualifying,
            hit,
            &normalizer,
            self.default_weights(),
        ))
    }

    /// Rapid, balanced and maximum recommendations.
    ///
    /// * rapid: earliest month in its window reaching its profit bar, or
    ///   else the best-scoring profitable month in that window;
    /// * balanced: best-scoring profitable month in its window;
    /// * maximum: highest absolute profit anywhere.
    pub fn risk_profiles(&self, schedule: &Schedule) -> RiskProfiles {
        let outcomes = resale_outcomes(schedule);
        if outcomes.is_empty() {
            return RiskProfiles::default();
        }

        let last_month = schedule.last_month();
        let normalizer = Normalizer::new(&outcomes);
        let in_window = |rule: &ProfileRule| {
            let (from, to) = rule.window(last_month);
            outcomes
                .iter()
                .filter(move |o| o.month >= from && o.month <= to && o.profit > Decimal::ZERO)
        };
        let best_scored = |rule: &ProfileRule| {
            let candidates: Vec<ResaleOutcome> = in_window(rule)
                .filter(|o| o.profit_percentage >= rule.min_profit_percentage)
                .copied()
                .collect();
            best_by(&candidates, |o| {
                normalizer.score(o, rule.profit_weight, rule.roi_weight)
            })
            .copied()
        };

        let rapid_rule = &self.policy.rapid;
        let rapid = in_window(rapid_rule)
            .find(|o| o.profit_percentage >= rapid_rule.min_profit_percentage)
            .copied()
            .or_else(|| {
                let relaxed = ProfileRule { min_profit_percentage: Decimal::MIN, ..*rapid_rule };
                best_scored(&relaxed)
            });

        let balanced = best_scored(&self.policy.balanced);

        let maximum = best_by(&outcomes, |o| o.profit).copied();

        let weights = |rule: &ProfileRule| (rule.profit_weight, rule.roi_weight);
        RiskProfiles {
            rapid: rapid.map(|o| {
                self.result(StrategyKind::Rapid, &o, &normalizer, weights(rapid_rule))
            }),
            balanced: balanced.map(|o| {
                self.result(StrategyKind::Balanced, &o, &normalizer, weights(&self.policy.balanced))
            }),
            maximum: maximum.map(|o| {
                self.result(StrategyKind::Maximum, &o, &normalizer, weights(&self.policy.maximum))
            }),
        }
    }
}

/// First outcome with the strictly greatest key.
fn best_by<F>(outcomes: &[ResaleOutcome], key: F) -> Option<&ResaleOutcome>
where
    F: Fn(&ResaleOutcome) -> Decimal,
{
    let mut iter = outcomes.iter();
    let first = iter.next()?;
    let mut best = (first, key(first));
    for outcome in iter {
        let value = key(outcome);
        if value > best.1 {
            best = (outcome, value);
        }
    }
    Some(best.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PurchaseConfig;
    use crate::config::tests::{date, sample_config};
    use crate::index::IndexRateProvider;
    use crate::rate::RateMode;
    use crate::schedule::generate_schedule;

    fn schedule_for(config: &PurchaseConfig) -> Schedule {
        generate_schedule(config, &IndexRateProvider::offline())
    }

    /// Fully paid upfront, no correction, 1% monthly appreciation.
    fn appreciating_schedule() -> Schedule {
        schedule_for(&PurchaseConfig {
            property_value: dec!(300_000),
            down_payment_value: dec!(300_000),
            installments_count: 12,
            correction_mode: RateMode::Manual(dec!(0)),
            appreciation_mode: RateMode::Manual(dec!(1)),
            valuation_date: Some(date(2025, 1, 1)),
            start_date: Some(date(2025, 2, 1)),
            delivery_date: Some(date(2026, 3, 1)),
            ..PurchaseConfig::default()
        })
    }

    #[test]
    fn test_outcome_matches_schedule_entry() {
        let schedule = schedule_for(&sample_config());
        let entry = schedule.entry_for_month(7).unwrap();
        let outcome = resale_outcome(&schedule, 7).unwrap();

        assert_eq!(outcome.investment_value, entry.cumulative_paid);
        assert_eq!(outcome.profit, entry.property_value - entry.cumulative_paid - entry.balance);
        assert!(resale_outcome(&schedule, 99).is_none());
    }

    #[test]
    fn test_appreciating_schedule_peaks_at_last_month() {
        let schedule = appreciating_schedule();
        let optimizer = ResaleOptimizer::default();

        let by_profit = optimizer.best_by_profit(&schedule).unwrap();
        let by_roi = optimizer.best_by_roi(&schedule).unwrap();

        assert_eq!(by_profit.month, 13);
        assert_eq!(by_roi.month, 13);
        assert_eq!(by_profit.kind, StrategyKind::MaxProfit);
        assert_eq!(by_roi.label(), "max-roi");
    }

    #[test]
    fn test_earliest_qualifying_precedes_best_profit() {
        let schedule = appreciating_schedule();
        let optimizer = ResaleOptimizer::default();

        let earliest = optimizer.earliest_qualifying(&schedule, dec!(2), 13).unwrap();
        let best = optimizer.best_by_profit(&schedule).unwrap();

        assert_eq!(earliest.month, 2);
        assert!(earliest.month < best.month);
        assert!(optimizer.earliest_qualifying(&schedule, dec!(50), 13).is_none());
        assert!(optimizer.earliest_qualifying(&schedule, dec!(2), 1).is_none());
    }

    #[test]
    fn test_roi_search_discounts_by_holding_time() {
        // paying in installments makes early months cheap, so the
        // time-discounted ratio favours an early sale over the profit peak
        let schedule = schedule_for(&sample_config());
        let optimizer = ResaleOptimizer::default();

        let by_roi = optimizer.best_by_roi(&schedule).unwrap();
        let by_profit = optimizer.best_by_profit(&schedule).unwrap();

        assert!(by_roi.month < by_profit.month);
        let outcomes = resale_outcomes(&schedule);
        let best_ratio = outcomes.iter().map(ResaleOutcome::time_discounted_roi).max().unwrap();
        let picked = resale_outcome(&schedule, by_roi.month).unwrap();
        assert_eq!(picked.time_discounted_roi(), best_ratio);
    }

    #[test]
    fn test_profit_ties_keep_first_month() {
        let schedule = schedule_for(&PurchaseConfig {
            appreciation_mode: RateMode::Manual(dec!(0)),
            ..appreciating_config_for_ties()
        });
        let best = ResaleOptimizer::default().best_by_profit(&schedule).unwrap();
        assert_eq!(best.month, 1);
    }

    fn appreciating_config_for_ties() -> PurchaseConfig {
        PurchaseConfig {
            property_value: dec!(100_000),
            down_payment_value: dec!(100_000),
            installments_count: 6,
            valuation_date: Some(date(2025, 1, 1)),
            start_date: Some(date(2025, 2, 1)),
            delivery_date: Some(date(2025, 8, 1)),
            ..PurchaseConfig::default()
        }
    }

    #[test]
    fn test_risk_profiles_spread_across_horizon() {
        let schedule = schedule_for(&sample_config());
        let optimizer = ResaleOptimizer::default();

        let profiles = optimizer.risk_profiles(&schedule);
        let rapid = profiles.rapid.unwrap();
        let balanced = profiles.balanced.unwrap();
        let maximum = profiles.maximum.unwrap();

        assert_eq!(rapid.month, 2);
        assert!((8..=19).contains(&balanced.month));
        assert_eq!(maximum.month, optimizer.best_by_profit(&schedule).unwrap().month);
        assert!(rapid.month < balanced.month && balanced.month < maximum.month);
        assert_eq!(profiles.iter().count(), 3);
        for result in profiles.iter() {
            assert!(result.composite_score > Decimal::ZERO);
            assert!(result.composite_score <= dec!(1));
        }
    }

    #[test]
    fn test_rapid_falls_back_to_best_score_when_bar_is_unreachable() {
        let schedule = schedule_for(&sample_config());
        let mut policy = RiskPolicy::default();
        policy.rapid.min_profit_percentage = dec!(1000);

        let profiles = ResaleOptimizer::new(policy).risk_profiles(&schedule);
        let rapid = profiles.rapid.unwrap();

        assert!(rapid.month <= 10);
        assert!(rapid.profit > Decimal::ZERO);
    }

    #[test]
    fn test_losing_schedule_has_no_balanced_pick() {
        let schedule = schedule_for(&PurchaseConfig {
            appreciation_mode: RateMode::Manual(dec!(-2)),
            ..sample_config()
        });
        let profiles = ResaleOptimizer::default().risk_profiles(&schedule);

        assert!(profiles.rapid.is_none());
        assert!(profiles.balanced.is_none());
        assert!(profiles.maximum.is_some());
    }

    #[test]
    fn test_empty_schedule_yields_nothing() {
        let schedule = Schedule::default();
        let optimizer = ResaleOptimizer::default();

        assert!(optimizer.best_by_profit(&schedule).is_none());
        assert!(optimizer.best_by_roi(&schedule).is_none());
        assert!(optimizer.earliest_qualifying(&schedule, dec!(0), 100).is_none());
        assert_eq!(optimizer.risk_profiles(&schedule), RiskProfiles::default());
    }
}
