//! Monthly index rates: historical tables and the provider that loads them.
//!
//! Tables hold one cycle of twelve monthly percentages per family and repeat
//! indefinitely. The provider starts `Unloaded`, moves to `Loading` on the
//! first [`IndexRateProvider::ensure_loaded`] call and settles on a table
//! sourced either remotely or from the built-in history. Once settled the
//! table is never replaced.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::rate::{IndexFamily, RateMode};
use crate::source::{IndexRow, IndexSource};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a loaded table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableOrigin {
    Remote,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded(TableOrigin),
}

/// One historical cycle of monthly percentages per index family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRateTable {
    pub origin: TableOrigin,
    /// Period labels of the cycle, in order.
    pub periods: Vec<String>,
    pub rates: BTreeMap<IndexFamily, Vec<Decimal>>,
}

impl IndexRateTable {
    /// Builds a table from source rows, ordering them by sequence.
    ///
    /// Every series stays aligned with `periods`: a row missing a value for
    /// a family counts as a 0% month for it. A family missing from every row
    /// ends up with an empty series.
    pub fn from_rows(mut rows: Vec<IndexRow>) -> Self {
        rows.sort_by_key(|row| row.sequence);

        let rates = IndexFamily::ALL
            .iter()
            .map(|&family| {
                let values: Vec<Option<Decimal>> =
                    rows.iter().map(|row| row.rate(family)).collect();
                let gaps = values.iter().filter(|value| value.is_none()).count();
                let series: Vec<Decimal> = if gaps == values.len() {
                    Vec::new()
                } else {
                    if gaps > 0 {
                        warn!(
                            family = %family,
                            gaps,
                            "index rows missing values, counting them as 0%"
                        );
                    }
                    values.into_iter().map(Option::unwrap_or_default).collect()
                };
                (family, series)
            })
            .collect();

        Self {
            origin: TableOrigin::Remote,
            periods: rows.into_iter().map(|row| row.period).collect(),
            rates,
        }
    }

    /// The built-in 2024 history used whenever the remote source is unavailable.
    pub fn fallback() -> Self {
        FALLBACK_TABLE.clone()
    }

    pub fn series(&self, family: IndexFamily) -> &[Decimal] {
        self.rates.get(&family).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Monthly percentage for `family` at the cyclic position
    /// `(cycle_offset + simulated_month) mod len`, or `None` for an empty series.
    pub fn percent_at(
        &self,
        family: IndexFamily,
        simulated_month: u32,
        cycle_offset: u32,
    ) -> Option<Decimal> {
        let series = self.series(family);
        if series.is_empty() {
            return None;
        }
        let position = (cycle_offset as usize + simulated_month as usize) % series.len();
        Some(series[position])
    }

    fn has_any_series(&self) -> bool {
        self.rates.values().any(|series| !series.is_empty())
    }
}

static FALLBACK_TABLE: LazyLock<IndexRateTable> = LazyLock::new(|| {
    const PERIODS: [&str; 12] = [
        "jan/2024", "fev/2024", "mar/2024", "abr/2024", "mai/2024", "jun/2024",
        "jul/2024", "ago/2024", "set/2024", "out/2024", "nov/2024", "dez/2024",
    ];

    let mut rates = BTreeMap::new();
    rates.insert(
        IndexFamily::Incc,
        vec![
            dec!(0.26), dec!(0.20), dec!(0.24), dec!(0.41), dec!(0.59), dec!(0.93),
            dec!(0.71), dec!(0.64), dec!(0.58), dec!(0.68), dec!(0.40), dec!(0.51),
        ],
    );
    rates.insert(
        IndexFamily::Ipca,
        vec![
            dec!(0.42), dec!(0.83), dec!(0.16), dec!(0.38), dec!(0.46), dec!(0.21),
            dec!(0.38), dec!(-0.02), dec!(0.44), dec!(0.56), dec!(0.39), dec!(0.52),
        ],
    );
    rates.insert(
        IndexFamily::Igpm,
        vec![
            dec!(0.07), dec!(-0.52), dec!(-0.47), dec!(0.31), dec!(0.89), dec!(0.81),
            dec!(0.61), dec!(0.29), dec!(0.62), dec!(1.52), dec!(1.30), dec!(0.94),
        ],
    );
    rates.insert(
        IndexFamily::Cub,
        vec![
            dec!(0.15), dec!(0.11), dec!(0.20), dec!(0.25), dec!(0.42), dec!(0.58),
            dec!(0.52), dec!(0.38), dec!(0.30), dec!(0.29), dec!(0.18), dec!(0.10),
        ],
    );

    IndexRateTable {
        origin: TableOrigin::Fallback,
        periods: PERIODS.iter().map(|p| p.to_string()).collect(),
        rates,
    }
});

/// Resolves monthly rates for manual or index-driven modes.
///
/// Construct one per process and share it by reference (or `Arc`). The
/// remote load happens at most once; concurrent callers of
/// [`ensure_loaded`](Self::ensure_loaded) await the same in-flight fetch.
pub struct IndexRateProvider {
    source: Option<Arc<dyn IndexSource>>,
    fetch_timeout: Duration,
    table: OnceCell<IndexRateTable>,
    loading: AtomicBool,
    fetches: AtomicUsize,
}

impl IndexRateProvider {
    pub fn new(source: Arc<dyn IndexSource>) -> Self {
        Self::with_timeout(Some(source), DEFAULT_FETCH_TIMEOUT)
    }

    /// A provider that never goes to the network and settles on the built-in history.
    pub fn offline() -> Self {
        Self::with_timeout(None, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(source: Option<Arc<dyn IndexSource>>, fetch_timeout: Duration) -> Self {
        Self {
            source,
            fetch_timeout,
            table: OnceCell::new(),
            loading: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> LoadState {
        match self.table.get() {
            Some(table) => LoadState::Loaded(table.origin),
            None if self.loading.load(Ordering::Acquire) => LoadState::Loading,
            None => LoadState::Unloaded,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.table.initialized()
    }

    /// Number of fetches issued against the remote source so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Acquire)
    }

    /// Loads the rate table once, falling back to the built-in history when
    /// the source is missing, fails, times out or returns no usable rows.
    pub async fn ensure_loaded(&self) -> &IndexRateTable {
        self.table
            .get_or_init(|| async {
                self.loading.store(true, Ordering::Release);
                let guard = LoadingGuard(&self.loading);
                let table = self.load().await;
                // the cell is filled right after this returns, so leave the flag set
                std::mem::forget(guard);
                info!(
                    origin = ?table.origin,
                    periods = table.periods.len(),
                    "index rate table loaded"
                );
                table
            })
            .await
    }

    async fn load(&self) -> IndexRateTable {
        let Some(source) = &self.source else {
            debug!("no index source configured, using built-in history");
            return IndexRateTable::fallback();
        };

        self.fetches.fetch_add(1, Ordering::AcqRel);
        debug!(
            source = source.name(),
            timeout_ms = self.fetch_timeout.as_millis() as u64,
            "fetching index rows"
        );

        match tokio::time::timeout(self.fetch_timeout, source.fetch_rows()).await {
            Ok(Ok(rows)) if rows.is_empty() => {
                warn!(
                    source = source.name(),
                    "index source returned no rows, using built-in history"
                );
                IndexRateTable::fallback()
            }
            Ok(Ok(rows)) => {
                let table = IndexRateTable::from_rows(rows);
                if table.has_any_series() {
                    table
                } else {
                    warn!(
                        source = source.name(),
                        "index rows carried no rates, using built-in history"
                    );
                    IndexRateTable::fallback()
                }
            }
            Ok(Err(error)) => {
                warn!(
                    source = source.name(),
                    error = %error,
                    "index source failed, using built-in history"
                );
                IndexRateTable::fallback()
            }
            Err(_) => {
                warn!(
                    source = source.name(),
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "index source timed out, using built-in history"
                );
                IndexRateTable::fallback()
            }
        }
    }

    /// The table lookups read from: the loaded one, or the built-in history
    /// while no load has completed.
    pub fn table(&self) -> &IndexRateTable {
        self.table.get().unwrap_or(&*FALLBACK_TABLE)
    }

    /// Monthly rate as a decimal fraction (0.005 for 0.5%).
    ///
    /// Manual modes return their own rate regardless of month. Index modes
    /// read the cyclic table position; an empty series yields zero.
    pub fn monthly_rate(
        &self,
        mode: &RateMode,
        simulated_month: u32,
        cycle_offset: u32,
    ) -> Decimal {
        match mode {
            RateMode::Manual(percent) => *percent / dec!(100),
            RateMode::Index(family) => {
                match self.table().percent_at(*family, simulated_month, cycle_offset) {
                    Some(percent) => percent / dec!(100),
                    None => {
                        debug!(family = %family, "no rates for index family, using zero");
                        Decimal::ZERO
                    }
                }
            }
        }
    }
}

/// Clears the loading flag when a load is abandoned before it completes.
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for IndexRateProvider {
    fn default() -> Self {
        Self::offline()
    }
}
