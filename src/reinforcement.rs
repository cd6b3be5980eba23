//! Which installment months carry a reinforcement payment.
//!
//! Months are relative to the first installment, which is month 1.

use std::collections::BTreeSet;

use chrono::{Datelike, Months, NaiveDate};

/// Upper bound on generated reinforcement months.
pub const MAX_REINFORCEMENTS: usize = 100;

/// Months `frequency, 2*frequency, ...` up to and including
/// `installments_count - final_months_without`.
///
/// Empty when `frequency` is zero; capped at [`MAX_REINFORCEMENTS`].
pub fn reinforcement_months(
    installments_count: u32,
    frequency: u32,
    final_months_without: u32,
) -> Vec<u32> {
    if frequency == 0 {
        return Vec::new();
    }

    let last_eligible = installments_count.saturating_sub(final_months_without);
    (1..)
        .map(|step: u32| step.saturating_mul(frequency))
        .take_while(|month| *month <= last_eligible)
        .take(MAX_REINFORCEMENTS)
        .collect()
}

/// Relative month of `date` given the first installment falls on `start`.
///
/// Day of month is ignored; a date in the start month is month 1 and
/// earlier months are zero or negative.
pub fn month_index(start: NaiveDate, date: NaiveDate) -> i32 {
    let years = date.year() - start.year();
    let months = date.month() as i32 - start.month() as i32;
    years * 12 + months + 1
}

/// Calendar date of relative month `month` (1 = `start`).
pub fn date_for_month(start: NaiveDate, month: u32) -> Option<NaiveDate> {
    start.checked_add_months(Months::new(month.saturating_sub(1)))
}

/// Reinforcement months derived from explicit calendar dates.
///
/// Dates falling outside `1..=installments_count` are dropped; duplicates
/// collapse into one month.
pub fn months_from_dates(
    start: NaiveDate,
    dates: &[NaiveDate],
    installments_count: u32,
) -> Vec<u32> {
    dates
        .iter()
        .map(|date| month_index(start, *date))
        .filter(|month| *month >= 1 && *month <= installments_count as i32)
        .map(|month| month as u32)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Calendar dates of the frequency rule, for resetting custom dates back
/// to the automatic layout.
pub fn automatic_reinforcement_dates(
    start: NaiveDate,
    installments_count: u32,
    frequency: u32,
    final_months_without: u32,
) -> Vec<NaiveDate> {
    reinforcement_months(installments_count, frequency, final_months_without)
        .into_iter()
        .filter_map(|month| date_for_month(start, month))
        .collect()
}

/// Resolved reinforcement months for one schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReinforcementPlan {
    months: BTreeSet<u32>,
}

impl ReinforcementPlan {
    /// Custom dates, when given, replace the frequency rule entirely.
    pub fn resolve(
        start: NaiveDate,
        installments_count: u32,
        frequency: u32,
        final_months_without: u32,
        custom_dates: Option<&[NaiveDate]>,
    ) -> Self {
        let months = match custom_dates {
            Some(dates) => months_from_dates(start, dates, installments_count),
            None => reinforcement_months(installments_count, frequency, final_months_without),
        };
        Self {
            months: months.into_iter().collect(),
        }
    }

    pub fn applies_to(&self, month: u32) -> bool {
        self.months.contains(&month)
    }

    pub fn count(&self) -> usize {
        self.months.len()
    }

    pub fn months(&self) -> impl Iterator<Item = u32> + '_ {
        self.months.iter().copied()
    }
}
