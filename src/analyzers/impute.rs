//! Weekly gap filling and log transform.
//!
//! Every (ISO year, week) inside the observed envelope gets exactly one
//! sample. Missing weeks take the climatological mean of their week number
//! across all observed years. Week numbers run 1..=52; ISO week 53 is
//! dropped from the series.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analyzers::types::{SampleKind, WeekKey, WeeklySample};
use crate::analyzers::utility::mean;
use crate::error::DomainError;

pub const WEEKS_PER_YEAR: u32 = 52;

/// How a missing week is matched to the climatology table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClimatologyJoin {
    /// Closest observed week number; ties go to the earlier week.
    #[default]
    Nearest,
    /// Same week number only; an unobserved week number is an error.
    Exact,
}

/// Mean `ci_cyano` per week number across all observed years.
#[derive(Debug, Clone, PartialEq)]
pub struct Climatology {
    by_week: BTreeMap<u32, f64>,
}

impl Climatology {
    pub fn from_observed(observed: &[WeeklySample]) -> Self {
        let mut values: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for s in observed {
            values.entry(s.key.week).or_default().push(s.ci_cyano);
        }
        Self {
            by_week: values.into_iter().map(|(w, v)| (w, mean(&v))).collect(),
        }
    }

    pub fn lookup(&self, week: u32, join: ClimatologyJoin) -> Result<f64, DomainError> {
        if let Some(v) = self.by_week.get(&week) {
            return Ok(*v);
        }
        if join == ClimatologyJoin::Exact {
            return Err(DomainError::MissingClimatology { week });
        }

        let below = self.by_week.range(..week).next_back();
        let above = self.by_week.range(week..).next();
        match (below, above) {
            (Some((bw, bv)), Some((aw, av))) => {
                if aw - week < week - bw {
                    Ok(*av)
                } else {
                    Ok(*bv)
                }
            }
            (Some((_, v)), None) | (None, Some((_, v))) => Ok(*v),
            (None, None) => Err(DomainError::MissingClimatology { week }),
        }
    }
}

/// Completes an observed weekly series.
#[derive(Debug, Clone, Copy, Default)]
pub struct GapImputer {
    join: ClimatologyJoin,
}

impl GapImputer {
    pub fn new(join: ClimatologyJoin) -> Self {
        Self { join }
    }

    /// Fills the missing weeks of `observed` and log-transforms the result.
    ///
    /// Years run from the ISO year of the earliest kept sample to that of the
    /// latest, including years with no observation at all. The first year
    /// only requires weeks from the first observed week onward, the last year
    /// only up to the last observed week, and every other year requires all
    /// 52 weeks. Output is sorted by date
    /// and every sample has `log_y` set.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NonPositive`] before producing anything if any
    /// observed value is not strictly positive, and
    /// [`DomainError::MissingClimatology`] when a gap has no usable
    /// climatology under the configured join.
    pub fn complete(&self, observed: &[WeeklySample]) -> Result<Vec<WeeklySample>, DomainError> {
        for s in observed {
            if !(s.ci_cyano > 0.0 && s.ci_cyano.is_finite()) {
                return Err(DomainError::NonPositive {
                    date: s.date,
                    value: s.ci_cyano,
                });
            }
        }

        let (kept, dropped): (Vec<&WeeklySample>, Vec<&WeeklySample>) = observed
            .iter()
            .partition(|s| (1..=WEEKS_PER_YEAR).contains(&s.key.week));
        if !dropped.is_empty() {
            warn!(dropped = dropped.len(), "Dropping ISO week 53 samples");
        }
        let kept: Vec<WeeklySample> = kept.into_iter().cloned().collect();

        let (Some(first), Some(last)) = (
            kept.iter().min_by_key(|s| s.date),
            kept.iter().max_by_key(|s| s.date),
        ) else {
            return Ok(Vec::new());
        };
        let week_first = first.key.week;
        let week_last = last.key.week;

        // Every ISO year in the span, observed or not.
        let years: Vec<i32> = (first.key.year..=last.key.year).collect();
        let present: BTreeSet<WeekKey> = kept.iter().map(|s| s.key).collect();
        let climatology = Climatology::from_observed(&kept);

        let mut imputed = Vec::new();
        for week in 1..=WEEKS_PER_YEAR {
            for &year in required_years(&years, week, week_first, week_last) {
                let key = WeekKey { year, week };
                if present.contains(&key) {
                    continue;
                }
                let date = key.monday().ok_or(DomainError::InvalidWeek { year, week })?;
                imputed.push(WeeklySample {
                    key,
                    date,
                    ci_cyano: climatology.lookup(week, self.join)?,
                    log_y: None,
                    kind: SampleKind::Imputed,
                });
            }
        }
        debug!(
            observed = kept.len(),
            imputed = imputed.len(),
            week_first,
            week_last,
            years = years.len(),
            "Weekly gaps filled"
        );

        let mut series: Vec<WeeklySample> = kept.into_iter().chain(imputed).collect();
        series.sort_by_key(|s| s.date);
        for s in &mut series {
            s.log_y = Some(s.ci_cyano.ln());
        }
        Ok(series)
    }
}

/// Years that must hold `week`. The first year is only required from its
/// first observed week on and the last year only up to its last observed
/// week; a week outside both envelopes excludes both.
fn required_years(years: &[i32], week: u32, week_first: u32, week_last: u32) -> &[i32] {
    let start = usize::from(week < week_first);
    let end = if week > week_last {
        years.len().saturating_sub(1)
    } else {
        years.len()
    };
    if start >= end { &[] } else { &years[start..end] }
}
