//! Records passed between the pipeline stages.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::analyzers::hab::HabLevel;
use crate::error::DomainError;
use crate::geo::{BinAddress, CellGeometry};

/// One satellite bin observation, tagged with the day it was requested for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinRecord {
    pub date: NaiveDate,
    pub bin_num: u64,
    pub row_start_num: u64,
    pub row_max_bins: u64,
    pub row_index: usize,
    pub total_rows: usize,
    pub ci_stumpf: f64,
    pub ci_cyano: f64,
    pub ci_noncyano: f64,
    pub mci_stumpf: f64,
}

impl BinRecord {
    pub fn address(&self) -> BinAddress {
        BinAddress {
            bin_num: self.bin_num,
            row_start_num: self.row_start_num,
            row_max_bins: self.row_max_bins,
            row_index: self.row_index,
            total_rows: self.total_rows,
        }
    }

    /// Cell geometry, derived on demand from the bin address.
    pub fn geometry(&self) -> Result<CellGeometry, DomainError> {
        self.address().geometry()
    }
}

/// A bin record with its HAB classification attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRecord {
    pub record: BinRecord,
    pub level: HabLevel,
}

/// Spatial mean of one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySample {
    pub date: NaiveDate,
    /// Mean of the finite `ci_cyano` values; `None` when the day had none.
    pub ci_cyano: Option<f64>,
    pub min_ci_cyano: Option<f64>,
    pub max_ci_cyano: Option<f64>,
    /// All bins tagged with this date.
    pub nobs: usize,
    /// Bins whose `ci_cyano` was finite.
    pub nvalid: usize,
    pub hab_high: usize,
    pub hab_high_med: usize,
}

impl DailySample {
    pub fn pct_hab_high(&self) -> f64 {
        pct(self.hab_high, self.nobs)
    }

    pub fn pct_hab_high_med(&self) -> f64 {
        pct(self.hab_high_med, self.nobs)
    }
}

pub(crate) fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// ISO week-year and week number. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeekKey {
    pub year: i32,
    pub week: u32,
}

impl WeekKey {
    pub fn of(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// Monday of this ISO week.
    pub fn monday(&self) -> Option<NaiveDate> {
        NaiveDate::from_isoywd_opt(self.year, self.week, chrono::Weekday::Mon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Observed,
    Imputed,
}

/// One week of the regularized series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySample {
    pub key: WeekKey,
    /// Earliest observed day of the week, or the ISO Monday when imputed.
    pub date: NaiveDate,
    pub ci_cyano: f64,
    /// Natural log of `ci_cyano`; set once the series is completed.
    pub log_y: Option<f64>,
    pub kind: SampleKind,
}

/// A row of the persisted weekly series. Column names and order are the
/// exchange format read by the forecaster and downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    pub date: NaiveDate,
    pub year: i32,
    pub week: u32,
    #[serde(rename = "CI_cyano")]
    pub ci_cyano: f64,
    pub log_y: f64,
}

impl From<&WeeklySample> for SeriesRow {
    fn from(s: &WeeklySample) -> Self {
        SeriesRow {
            date: s.date,
            year: s.key.year,
            week: s.key.week,
            ci_cyano: s.ci_cyano,
            log_y: s.log_y.unwrap_or_else(|| s.ci_cyano.ln()),
        }
    }
}
