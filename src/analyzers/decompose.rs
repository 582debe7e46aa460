//! Classical additive decomposition of the weekly series:
//! `observed = trend + seasonal + residual`.
//!
//! The trend is a centered moving average over one period (a 2×m average
//! for an even period), undefined for the first and last `m / 2` weeks. The
//! seasonal component is the mean detrended value at each position of the
//! period, shifted to sum to zero.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzers::types::SeriesRow;
use crate::analyzers::utility::mean;
use crate::error::DomainError;

/// Which column of the series is decomposed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// `CI_cyano` as observed.
    #[default]
    Linear,
    /// `log_y`.
    Log,
}

/// One week of the decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecomposedPoint {
    pub date: NaiveDate,
    pub year: i32,
    pub week: u32,
    pub observed: f64,
    pub trend: Option<f64>,
    pub seasonal: f64,
    pub residual: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    pub period: usize,
    pub scale: Scale,
    /// Seasonal value at each position of the period, starting at the first
    /// week of the series.
    pub seasonal_profile: Vec<f64>,
    pub points: Vec<DecomposedPoint>,
}

/// Splits `series` into trend, seasonal and residual components.
///
/// # Errors
///
/// [`DomainError::InvalidPeriod`] for a period below 2, and
/// [`DomainError::ShortSeries`] unless the series holds at least two full
/// periods.
pub fn decompose(
    series: &[SeriesRow],
    period: usize,
    scale: Scale,
) -> Result<Decomposition, DomainError> {
    if period < 2 {
        return Err(DomainError::InvalidPeriod(period));
    }
    if series.len() < 2 * period {
        return Err(DomainError::ShortSeries {
            observations: series.len(),
            required: 2 * period,
        });
    }

    let values: Vec<f64> = series
        .iter()
        .map(|r| match scale {
            Scale::Linear => r.ci_cyano,
            Scale::Log => r.log_y,
        })
        .collect();

    let trend = centered_moving_average(&values, period);
    let profile = seasonal_profile(&values, &trend, period);

    let points = series
        .iter()
        .zip(&values)
        .zip(&trend)
        .enumerate()
        .map(|(t, ((row, &observed), &trend))| {
            let seasonal = profile[t % period];
            DecomposedPoint {
                date: row.date,
                year: row.year,
                week: row.week,
                observed,
                trend,
                seasonal,
                residual: trend.map(|tr| observed - tr - seasonal),
            }
        })
        .collect();

    debug!(weeks = series.len(), period, ?scale, "Series decomposed");
    Ok(Decomposition {
        period,
        scale,
        seasonal_profile: profile,
        points,
    })
}

/// Moving average centered on each point, `None` where the window would run
/// past either end. An even period averages two offset windows, which puts
/// half weight on the two end points.
fn centered_moving_average(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let half = period / 2;
    let mut trend = vec![None; values.len()];
    for t in half..values.len().saturating_sub(half) {
        let window = &values[t - half..=t + half];
        let sum: f64 = window.iter().sum();
        let sum = if period % 2 == 0 {
            sum - 0.5 * (window[0] + window[period])
        } else {
            sum
        };
        trend[t] = Some(sum / period as f64);
    }
    trend
}

fn seasonal_profile(values: &[f64], trend: &[Option<f64>], period: usize) -> Vec<f64> {
    let mut detrended = vec![Vec::new(); period];
    for (t, (value, trend)) in values.iter().zip(trend).enumerate() {
        if let Some(trend) = trend {
            detrended[t % period].push(value - trend);
        }
    }
    let raw: Vec<f64> = detrended.iter().map(|d| mean(d)).collect();
    let centre = mean(&raw);
    raw.into_iter().map(|v| v - centre).collect()
}
