use std::collections::BTreeMap;

use serde::Serialize;

use crate::analyzers::types::{ClassifiedRecord, pct};
use crate::analyzers::utility::{median, mean};
use crate::error::DomainError;

/// Per-location summary over every date of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationStats {
    pub bin_num: u64,
    pub clat: f64,
    pub clon: f64,
    pub nobs: usize,
    pub ci_cyano: Option<f64>,
    pub ci_cyano_median: Option<f64>,
    pub hab_high: usize,
    pub hab_high_med: usize,
    pub pct_hab_high: f64,
    pub pct_hab_high_med: f64,
}

impl LocationStats {
    /// Summarises records per bin, ordered by bin number.
    pub fn from_records(records: &[ClassifiedRecord]) -> Result<Vec<Self>, DomainError> {
        let mut by_bin: BTreeMap<u64, Vec<&ClassifiedRecord>> = BTreeMap::new();
        for r in records {
            by_bin.entry(r.record.bin_num).or_default().push(r);
        }

        by_bin
            .into_iter()
            .map(|(bin_num, rows)| {
                let cell = rows[0].record.geometry()?;
                let finite: Vec<f64> = rows
                    .iter()
                    .map(|r| r.record.ci_cyano)
                    .filter(|v| v.is_finite())
                    .collect();
                let hab_high = rows.iter().filter(|r| r.level.is_high()).count();
                let hab_high_med = rows.iter().filter(|r| r.level.is_high_or_medium()).count();

                Ok(LocationStats {
                    bin_num,
                    clat: cell.clat,
                    clon: cell.clon,
                    nobs: rows.len(),
                    ci_cyano: (!finite.is_empty()).then(|| mean(&finite)),
                    ci_cyano_median: median(&finite),
                    hab_high,
                    hab_high_med,
                    pct_hab_high: pct(hab_high, rows.len()),
                    pct_hab_high_med: pct(hab_high_med, rows.len()),
                })
            })
            .collect()
    }
}
