//! Side-by-side comparison of several purchase candidates.
//!
//! Candidates are described by totals rather than a full configuration.
//! Installments and reinforcements are spread evenly over the installment
//! months and corrected like the full schedule; whatever balance remains
//! after the last installment is paid as keys one month later.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::index::IndexRateProvider;
use crate::percentage::{saturating_ratio, to_percentage};
use crate::rate::{CompoundingFactor, RateMode};
use crate::rental::rental_estimate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyCandidate {
    pub name: String,
    pub property_value: Decimal,
    pub down_payment: Decimal,
    pub installments_total: Decimal,
    pub reinforcements_total: Decimal,
    pub installments_count: u32,
    pub correction_mode: RateMode,
    pub appreciation_mode: RateMode,
    pub rental_rate_percent: Decimal,
    /// Months the unit is kept and rented after delivery.
    pub hold_months_after_delivery: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStrategy {
    /// Sell at the month with the best ROI per month held.
    SellAtRoiOptimalMonth,
    /// Sell at the month with the best total ROI.
    SellAtTotalRoiOptimalMonth,
    /// Pay the keys, keep the unit and collect rent before selling.
    HoldAndRent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStrategy {
    pub candidate: String,
    pub strategy: ComparisonStrategy,
    pub month: u32,
    pub invested: Decimal,
    pub property_value: Decimal,
    pub remaining_balance: Decimal,
    pub rental_income: Decimal,
    pub profit: Decimal,
    pub roi_percent: Decimal,
    /// 1-based position after ranking.
    pub rank: usize,
}

#[derive(Debug, Clone, Copy)]
struct ProjectionPoint {
    month: u32,
    invested: Decimal,
    balance: Decimal,
    property_value: Decimal,
}

impl ProjectionPoint {
    fn profit(&self) -> Decimal {
        self.property_value
            .saturating_sub(self.invested)
            .saturating_sub(self.balance)
    }

    fn roi(&self) -> Decimal {
        saturating_ratio(self.profit(), self.invested)
    }
}

struct Projection {
    points: Vec<ProjectionPoint>,
    correction: CompoundingFactor,
    appreciation: CompoundingFactor,
}

pub struct StrategyComparator<'a> {
    provider: &'a IndexRateProvider,
}

impl<'a> StrategyComparator<'a> {
    pub fn new(provider: &'a IndexRateProvider) -> Self {
        Self { provider }
    }

    fn project(&self, candidate: &PropertyCandidate) -> Projection {
        let count = candidate.installments_count;
        let per_month = if count == 0 {
            Decimal::ZERO
        } else {
            (candidate.installments_total + candidate.reinforcements_total) / Decimal::from(count)
        };

        let mut correction = CompoundingFactor::new();
        let mut appreciation = CompoundingFactor::new();
        let mut balance = candidate.property_value - candidate.down_payment;
        let mut invested = candidate.down_payment;
        let mut points = Vec::with_capacity(count as usize + 1);

        for month in 1..=count + 1 {
            let correction_rate = self.provider.monthly_rate(&candidate.correction_mode, month, 0);
            let appreciation_rate =
                self.provider.monthly_rate(&candidate.appreciation_mode, month, 0);
            let factor = correction.advance(correction_rate);
            appreciation.advance(appreciation_rate);

            balance = balance.saturating_mul(Decimal::ONE + correction_rate);
            let paid = if month > count {
                balance
            } else {
                per_month.saturating_mul(factor)
            };
            balance = balance.saturating_sub(paid);
            invested = invested.saturating_add(paid);

            points.push(ProjectionPoint {
                month,
                invested,
                balance,
                property_value: candidate
                    .property_value
                    .saturating_mul(factor)
                    .saturating_mul(appreciation.value()),
            });
        }

        Projection {
            points,
            correction,
            appreciation,
        }
    }

    fn sell_at(
        candidate: &PropertyCandidate,
        strategy: ComparisonStrategy,
        point: &ProjectionPoint,
    ) -> CandidateStrategy {
        CandidateStrategy {
            candidate: candidate.name.clone(),
            strategy,
            month: point.month,
            invested: point.invested,
            property_value: point.property_value,
            remaining_balance: point.balance,
            rental_income: Decimal::ZERO,
            profit: point.profit(),
            roi_percent: point.roi().saturating_mul(dec!(100)),
            rank: 0,
        }
    }

    fn hold_and_rent(
        &self,
        candidate: &PropertyCandidate,
        mut projection: Projection,
    ) -> Option<CandidateStrategy> {
        let delivery = *projection.points.last()?;
        let mut property_value = delivery.property_value;
        let mut rental_income = Decimal::ZERO;

        for offset in 1..=candidate.hold_months_after_delivery {
            let month = delivery.month + offset;
            let correction_rate = self.provider.monthly_rate(&candidate.correction_mode, month, 0);
            let appreciation_rate =
                self.provider.monthly_rate(&candidate.appreciation_mode, month, 0);
            property_value = candidate
                .property_value
                .saturating_mul(projection.correction.advance(correction_rate))
                .saturating_mul(projection.appreciation.advance(appreciation_rate));
            let rent = rental_estimate(property_value, candidate.rental_rate_percent).monthly;
            rental_income = rental_income.saturating_add(rent);
        }

        let profit = property_value
            .saturating_add(rental_income)
            .saturating_sub(delivery.invested);
        let roi_percent = to_percentage(profit, delivery.invested);

        Some(CandidateStrategy {
            candidate: candidate.name.clone(),
            strategy: ComparisonStrategy::HoldAndRent,
            month: delivery.month + candidate.hold_months_after_delivery,
            invested: delivery.invested,
            property_value,
            remaining_balance: Decimal::ZERO,
            rental_income,
            profit,
            roi_percent,
            rank: 0,
        })
    }

    /// Strategies for one candidate, unranked.
    pub fn strategies_for(&self, candidate: &PropertyCandidate) -> Vec<CandidateStrategy> {
        let projection = self.project(candidate);
        let mut strategies = Vec::with_capacity(3);

        let time_discounted = |p: &ProjectionPoint| p.roi() / Decimal::from(p.month);
        if let Some(point) = first_max_by(&projection.points, time_discounted) {
            strategies.push(Self::sell_at(
                candidate,
                ComparisonStrategy::SellAtRoiOptimalMonth,
                point,
            ));
        }
        if let Some(point) = first_max_by(&projection.points, ProjectionPoint::roi) {
            strategies.push(Self::sell_at(
                candidate,
                ComparisonStrategy::SellAtTotalRoiOptimalMonth,
                point,
            ));
        }
        if let Some(hold) = self.hold_and_rent(candidate, projection) {
            strategies.push(hold);
        }

        strategies
    }

    /// Every strategy of every candidate, best ROI first.
    pub fn compare(&self, candidates: &[PropertyCandidate]) -> Vec<CandidateStrategy> {
        let mut all: Vec<CandidateStrategy> = candidates
            .iter()
            .flat_map(|candidate| self.strategies_for(candidate))
            .collect();

        all.sort_by(|a, b| {
            b.roi_percent
                .cmp(&a.roi_percent)
                .then_with(|| b.profit.cmp(&a.profit))
        });
        for (position, strategy) in all.iter_mut().enumerate() {
            strategy.rank = position + 1;
        }

        debug!(candidates = candidates.len(), strategies = all.len(), "candidates compared");
        all
    }
}

/// First point with the strictly greatest key.
fn first_max_by<F>(points: &[ProjectionPoint], key: F) -> Option<&ProjectionPoint>
where
    F: Fn(&ProjectionPoint) -> Decimal,
{
    let mut iter = points.iter();
    let mut best = iter.next()?;
    let mut best_value = key(best);
    for point in iter {
        let value = key(point);
        if value > best_value {
            best = point;
            best_value = value;
        }
    }
    Some(best)
}
