//! A finished simulation as plain data, ready for storage or export.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigReport, PurchaseConfig};
use crate::index::IndexRateProvider;
use crate::rental::{
    CommissionOption, NetProceeds, RentalEstimate, TaxOption, net_proceeds, rental_estimate,
};
use crate::resale::{ResaleOptimizer, RiskProfiles, StrategyResult};
use crate::schedule::{Schedule, ScheduleGenerator, ScheduleSummary};

/// Sale costs applied to every recommendation in a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SaleCosts {
    pub commission: CommissionOption,
    pub tax: TaxOption,
}

/// Parameters of the early-exit search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualifyingTarget {
    pub threshold_percent: Decimal,
    pub within_months: u32,
}

/// A recommendation together with its post-sale figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub strategy: StrategyResult,
    pub proceeds: NetProceeds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRecord {
    pub created_at: DateTime<Utc>,
    pub config: PurchaseConfig,
    pub report: ConfigReport,
    pub schedule: Schedule,
    pub summary: ScheduleSummary,
    pub best_by_profit: Option<Recommendation>,
    pub best_by_roi: Option<Recommendation>,
    pub earliest_qualifying: Option<Recommendation>,
    pub risk_profiles: RiskProfiles,
    /// Rent on the property value at delivery.
    pub rental_at_delivery: RentalEstimate,
}

impl SimulationRecord {
    /// Runs the whole pipeline for `config`.
    pub fn run(
        config: PurchaseConfig,
        provider: &IndexRateProvider,
        optimizer: &ResaleOptimizer,
        costs: SaleCosts,
        target: Option<QualifyingTarget>,
    ) -> Self {
        let schedule = ScheduleGenerator::new(provider).generate(&config);
        let summary = schedule.summary();
        let recommend = |strategy: StrategyResult| Recommendation {
            strategy,
            proceeds: net_proceeds(
                strategy.property_value,
                strategy.profit,
                costs.commission,
                costs.tax,
            ),
        };

        let earliest_qualifying = target.and_then(|target| {
            optimizer.earliest_qualifying(&schedule, target.threshold_percent, target.within_months)
        });

        Self {
            created_at: Utc::now(),
            report: config.validate(),
            best_by_profit: optimizer.best_by_profit(&schedule).map(recommend),
            best_by_roi: optimizer.best_by_roi(&schedule).map(recommend),
            earliest_qualifying: earliest_qualifying.map(recommend),
            risk_profiles: optimizer.risk_profiles(&schedule),
            rental_at_delivery: rental_estimate(
                summary.final_property_value,
                config.rental_rate_percent,
            ),
            summary,
            schedule,
            config,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
