use super::{Band, ForecastModel, ModelOutput};
use crate::analyzers::impute::WEEKS_PER_YEAR;
use crate::analyzers::types::SeriesRow;
use crate::analyzers::utility::{mean, stddev};
use crate::error::ForecastError;

/// Two-sided 95% normal quantile.
const Z_95: f64 = 1.96;

/// Repeats the value observed one season earlier.
///
/// Where no earlier season exists the series mean stands in. Intervals widen
/// with the number of whole seasons ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonalNaive {
    pub season_length: usize,
}

impl SeasonalNaive {
    pub fn new(season_length: usize) -> Self {
        Self {
            season_length: season_length.max(1),
        }
    }
}

impl Default for SeasonalNaive {
    fn default() -> Self {
        Self::new(WEEKS_PER_YEAR as usize)
    }
}

impl ForecastModel for SeasonalNaive {
    fn fit_forecast(
        &self,
        series: &[SeriesRow],
        horizon: usize,
    ) -> Result<ModelOutput, ForecastError> {
        let y: Vec<f64> = series.iter().map(|r| r.log_y).collect();
        if y.is_empty() {
            return Err(ForecastError::EmptySeries);
        }
        let m = self.season_length.max(1);
        let n = y.len();
        let level = mean(&y);

        let fitted_mean: Vec<f64> = (0..n)
            .map(|t| if t >= m { y[t - m] } else { level })
            .collect();
        let residuals: Vec<f64> = y.iter().zip(&fitted_mean).map(|(a, b)| a - b).collect();
        let sigma = stddev(&residuals, mean(&residuals));

        let fitted = fitted_mean
            .iter()
            .map(|&mean| Band {
                mean,
                lower: mean - Z_95 * sigma,
                upper: mean + Z_95 * sigma,
            })
            .collect();

        let forecast = (1..=horizon)
            .map(|k| {
                let mean = if n >= m { y[n - m + (k - 1) % m] } else { level };
                let seasons_ahead = ((k - 1) / m + 1) as f64;
                let half = Z_95 * sigma * seasons_ahead.sqrt();
                Band {
                    mean,
                    lower: mean - half,
                    upper: mean + half,
                }
            })
            .collect();

        Ok(ModelOutput {
            model_name: format!("SeasonalNaive(m={m})"),
            fitted,
            forecast,
        })
    }
}
