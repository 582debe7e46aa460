//! Under-detection floor substitution.
//!
//! Bins where the sensor saw no bloom are absent from the product or carry
//! no positive reading. Before aggregation every (location, date) pair of a
//! run is completed with a small positive floor so daily means are taken over
//! a fixed set of locations and stay log-transformable.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use tracing::info;

use crate::analyzers::types::BinRecord;

pub const DEFAULT_UNDER_DETECT: f64 = 0.00005;

/// Completes `records` over every location and date seen, substituting
/// `floor` for missing, non-finite, or non-positive `ci_cyano` readings.
///
/// Output is ordered by date, then bin number.
pub fn fill_under_detect(records: Vec<BinRecord>, floor: f64) -> Vec<BinRecord> {
    let mut templates: BTreeMap<u64, BinRecord> = BTreeMap::new();
    let mut dates: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut present: HashSet<(NaiveDate, u64)> = HashSet::new();

    for r in &records {
        templates.entry(r.bin_num).or_insert_with(|| r.clone());
        dates.insert(r.date);
        present.insert((r.date, r.bin_num));
    }

    let mut replaced = 0usize;
    let mut out: Vec<BinRecord> = records
        .into_iter()
        .map(|mut r| {
            if !(r.ci_cyano.is_finite() && r.ci_cyano > 0.0) {
                r.ci_cyano = floor;
                replaced += 1;
            }
            r
        })
        .collect();

    let mut synthesized = 0usize;
    for date in &dates {
        for (bin_num, template) in &templates {
            if present.contains(&(*date, *bin_num)) {
                continue;
            }
            out.push(BinRecord {
                date: *date,
                ci_stumpf: f64::NAN,
                ci_cyano: floor,
                ci_noncyano: f64::NAN,
                mci_stumpf: f64::NAN,
                ..template.clone()
            });
            synthesized += 1;
        }
    }

    out.sort_by_key(|r| (r.date, r.bin_num));
    info!(
        locations = templates.len(),
        dates = dates.len(),
        replaced,
        synthesized,
        floor,
        "Under-detection floor applied"
    );
    out
}
