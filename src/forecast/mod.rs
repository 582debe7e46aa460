//! Forecast adapter.
//!
//! Hands the completed weekly series to a [`ForecastModel`], checks that its
//! output covers every observation and the requested horizon, and maps the
//! log-space bands back to concentration units with future dates attached.

pub mod command;
pub mod seasonal_naive;

pub use command::CommandModel;
pub use seasonal_naive::SeasonalNaive;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analyzers::types::SeriesRow;
use crate::error::ForecastError;

/// Mean and confidence interval of one step, in log space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

/// What a model returns for a series of `n` observations and a horizon `h`:
/// `n` fitted bands, `h` forecast bands, and a descriptive name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    pub model_name: String,
    pub fitted: Vec<Band>,
    pub forecast: Vec<Band>,
}

/// A seasonal forecasting collaborator working on `log_y`.
pub trait ForecastModel {
    fn fit_forecast(
        &self,
        series: &[SeriesRow],
        horizon: usize,
    ) -> Result<ModelOutput, ForecastError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedPoint {
    pub date: NaiveDate,
    pub ci_cyano: f64,
    pub log_y: f64,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub log_yhat: f64,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport {
    pub model_name: String,
    pub fitted: Vec<FittedPoint>,
    pub forecast: Vec<ForecastPoint>,
}

/// Fits `model` to a chronological `series` and forecasts `horizon` weeks.
///
/// Step `k` of the forecast is dated `7 * k` days after the last observation.
#[tracing::instrument(skip(model, series), fields(observations = series.len()))]
pub fn run_forecast<M: ForecastModel + ?Sized>(
    model: &M,
    series: &[SeriesRow],
    horizon: usize,
) -> Result<ForecastReport, ForecastError> {
    let Some(last) = series.last() else {
        return Err(ForecastError::EmptySeries);
    };

    let output = model.fit_forecast(series, horizon)?;
    if output.fitted.len() != series.len() {
        return Err(ForecastError::FittedLength {
            expected: series.len(),
            got: output.fitted.len(),
        });
    }
    if output.forecast.len() != horizon {
        return Err(ForecastError::HorizonLength {
            expected: horizon,
            got: output.forecast.len(),
        });
    }

    let fitted = series
        .iter()
        .zip(&output.fitted)
        .map(|(row, band)| FittedPoint {
            date: row.date,
            ci_cyano: row.ci_cyano,
            log_y: row.log_y,
            yhat: band.mean.exp(),
            yhat_lower: band.lower.exp(),
            yhat_upper: band.upper.exp(),
        })
        .collect();

    let forecast = output
        .forecast
        .iter()
        .enumerate()
        .map(|(i, band)| {
            let step = i + 1;
            let date = last
                .date
                .checked_add_days(Days::new(7 * step as u64))
                .ok_or(ForecastError::DateOverflow(step))?;
            Ok(ForecastPoint {
                date,
                log_yhat: band.mean,
                yhat: band.mean.exp(),
                yhat_lower: band.lower.exp(),
                yhat_upper: band.upper.exp(),
            })
        })
        .collect::<Result<Vec<_>, ForecastError>>()?;

    info!(model = %output.model_name, horizon, "Forecast complete");
    Ok(ForecastReport {
        model_name: output.model_name,
        fitted,
        forecast,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns whatever it was built with.
    struct Canned(ModelOutput);

    impl ForecastModel for Canned {
        fn fit_forecast(&self, _: &[SeriesRow], _: usize) -> Result<ModelOutput, ForecastError> {
            Ok(self.0.clone())
        }
    }

    fn band(mean: f64) -> Band {
        Band {
            mean,
            lower: mean - 1.0,
            upper: mean + 1.0,
        }
    }

    fn series() -> Vec<SeriesRow> {
        [(1, 1), (8, 2)]
            .into_iter()
            .map(|(day, week)| SeriesRow {
                date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                year: 2024,
                week,
                ci_cyano: 1.0,
                log_y: 0.0,
            })
            .collect()
    }

    #[test]
    fn test_values_are_exponentiated_and_dated() {
        let model = Canned(ModelOutput {
            model_name: "canned".to_string(),
            fitted: vec![band(0.0), band(1.0)],
            forecast: vec![band(2.0), band(0.5), band(-1.0)],
        });
        let report = run_forecast(&model, &series(), 3).unwrap();

        assert_eq!(report.model_name, "canned");
        assert_eq!(report.fitted[0].yhat, 1.0);
        assert!((report.fitted[1].yhat_upper - 2.0f64.exp()).abs() < 1e-12);

        let dates: Vec<String> = report.forecast.iter().map(|p| p.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-15", "2024-01-22", "2024-01-29"]);
        assert_eq!(report.forecast[0].log_yhat, 2.0);
        assert!((report.forecast[2].yhat_lower - (-2.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatches_are_rejected() {
        let short_fit = Canned(ModelOutput {
            model_name: "x".to_string(),
            fitted: vec![band(0.0)],
            forecast: vec![band(0.0)],
        });
        assert!(matches!(
            run_forecast(&short_fit, &series(), 1),
            Err(ForecastError::FittedLength { expected: 2, got: 1 })
        ));

        let short_horizon = Canned(ModelOutput {
            model_name: "x".to_string(),
            fitted: vec![band(0.0), band(0.0)],
            forecast: vec![band(0.0)],
        });
        assert!(matches!(
            run_forecast(&short_horizon, &series(), 4),
            Err(ForecastError::HorizonLength { expected: 4, got: 1 })
        ));
    }

    #[test]
    fn test_empty_series() {
        let model = SeasonalNaive::default();
        assert!(matches!(
            run_forecast(&model, &[], 4),
            Err(ForecastError::EmptySeries)
        ));
    }
}
