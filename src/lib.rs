//! `br_resale` is a Rust library for simulating off-plan real estate purchases in Brazil.
//!
//! It builds the month-by-month payment schedule of a purchase paid with a
//! down payment (entrada), monthly installments (parcelas), periodic
//! reinforcements (reforços) and a final keys payment (chaves), while:
//! - **Correction**: compounding the outstanding balance and every installment
//!   by a manual rate or an economic index (INCC, IPCA, IGP-M, CUB).
//! - **Appreciation**: projecting the property value through an independent
//!   compounding series.
//! - **Resale search**: finding the most profitable months to sell, including
//!   rapid, balanced and maximum risk profiles.
//!
//! ## Usage
//!
//! Add `br_resale` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! br_resale = "0.1.0"
//! rust_decimal = "1.39.0"
//! rust_decimal_macros = "1.39.0"
//! ```
//!
//! Then load the index rates once and generate schedules against them:
//!
//! ```rust,no_run
//! use br_resale::{IndexFamily, IndexRateProvider, PurchaseConfig, RateMode};
//! use br_resale::{ResaleOptimizer, ScheduleGenerator};
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = IndexRateProvider::offline();
//!     provider.ensure_loaded().await;
//!
//!     let config = PurchaseConfig {
//!         property_value: dec!(500_000),
//!         down_payment_value: dec!(50_000),
//!         installments_value: dec!(37_500),
//!         installments_count: 12,
//!         correction_mode: RateMode::Index(IndexFamily::Incc),
//!         appreciation_mode: RateMode::Manual(dec!(0.8)),
//!         valuation_date: NaiveDate::from_ymd_opt(2025, 1, 15),
//!         start_date: NaiveDate::from_ymd_opt(2025, 2, 10),
//!         delivery_date: NaiveDate::from_ymd_opt(2026, 3, 1),
//!         ..PurchaseConfig::default()
//!     };
//!
//!     let schedule = ScheduleGenerator::new(&provider).generate(&config);
//!     println!("Keys amount: {:.2}", schedule.keys_amount());
//!
//!     let optimizer = ResaleOptimizer::default();
//!     if let Some(best) = optimizer.best_by_profit(&schedule) {
//!         println!("Best month: {} (profit {:.2})", best.month, best.profit);
//!     }
//! }
//! ```

pub mod comparator;
pub mod config;
pub mod financing;
pub mod index;
pub mod percentage;
pub mod rate;
pub mod reinforcement;
pub mod rental;
pub mod resale;
pub mod schedule;
pub mod settings;
pub mod simulation;
pub mod source;

pub use comparator::{CandidateStrategy, ComparisonStrategy, PropertyCandidate, StrategyComparator};
pub use config::{ConfigReport, PaymentShares, PurchaseConfig};
pub use financing::{FinancingTerms, KeysFinancingEstimate, estimate_keys_financing};
pub use index::{IndexRateProvider, IndexRateTable, LoadState, TableOrigin};
pub use rate::{CompoundingFactor, IndexFamily, RateMode};
pub use reinforcement::ReinforcementPlan;
pub use rental::{
    CommissionOption, NetProceeds, RentalEstimate, TaxOption, net_proceeds, rental_estimate,
};
pub use resale::{
    ResaleOptimizer, ResaleOutcome, RiskPolicy, RiskProfiles, StrategyKind, StrategyResult,
    resale_outcome,
};
pub use schedule::{PaymentEntry, PaymentKind, Schedule, ScheduleGenerator, generate_schedule};
pub use settings::EngineSettings;
pub use simulation::{SaleCosts, SimulationRecord};
pub use source::{HttpIndexSource, IndexRow, IndexSource};
