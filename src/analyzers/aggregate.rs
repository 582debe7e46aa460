use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::analyzers::hab::HabThresholds;
use crate::analyzers::types::{
    BinRecord, ClassifiedRecord, DailySample, SampleKind, WeekKey, WeeklySample,
};
use crate::analyzers::utility::{finite_mean, mean};

/// Attaches a HAB level to every record.
pub fn classify(records: Vec<BinRecord>, thresholds: &HabThresholds) -> Vec<ClassifiedRecord> {
    records
        .into_iter()
        .map(|record| {
            let level = thresholds.classify(record.ci_cyano);
            ClassifiedRecord { record, level }
        })
        .collect()
}

/// Collapses bin records into one spatial-mean sample per date, in date order.
///
/// Non-finite `ci_cyano` values count towards `nobs` but not the mean.
pub fn aggregate_daily(records: &[ClassifiedRecord]) -> Vec<DailySample> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&ClassifiedRecord>> = BTreeMap::new();
    for r in records {
        by_date.entry(r.record.date).or_default().push(r);
    }

    by_date
        .into_iter()
        .map(|(date, day)| {
            let finite: Vec<f64> = day
                .iter()
                .map(|r| r.record.ci_cyano)
                .filter(|v| v.is_finite())
                .collect();
            let mean = finite_mean(finite.iter().copied()).map(|(m, _)| m);

            DailySample {
                date,
                ci_cyano: mean,
                min_ci_cyano: finite.iter().copied().reduce(f64::min),
                max_ci_cyano: finite.iter().copied().reduce(f64::max),
                nobs: day.len(),
                nvalid: finite.len(),
                hab_high: day.iter().filter(|r| r.level.is_high()).count(),
                hab_high_med: day.iter().filter(|r| r.level.is_high_or_medium()).count(),
            }
        })
        .collect()
}

/// Collapses daily samples into one observed sample per ISO week.
///
/// The weekly value is the mean of the daily means, and the sample is dated
/// at the earliest day of the week that had any bins, finite or not. Days
/// without a finite mean add nothing to the value; a week made only of such
/// days is not emitted.
pub fn aggregate_weekly(daily: &[DailySample]) -> Vec<WeeklySample> {
    let mut by_week: BTreeMap<WeekKey, (NaiveDate, Vec<f64>)> = BTreeMap::new();
    for d in daily {
        let entry = by_week
            .entry(WeekKey::of(d.date))
            .or_insert_with(|| (d.date, Vec::new()));
        entry.0 = entry.0.min(d.date);
        match d.ci_cyano {
            Some(value) => entry.1.push(value),
            None => debug!(date = %d.date, "Day without finite observations"),
        }
    }

    let mut weekly: Vec<WeeklySample> = by_week
        .into_iter()
        .filter(|(_, (_, values))| !values.is_empty())
        .map(|(key, (date, values))| WeeklySample {
            key,
            date,
            ci_cyano: mean(&values),
            log_y: None,
            kind: SampleKind::Observed,
        })
        .collect();
    weekly.sort_by_key(|w| w.date);
    weekly
}
