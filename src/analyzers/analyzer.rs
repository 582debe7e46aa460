use tracing::info;

use crate::analyzers::aggregate::{aggregate_daily, aggregate_weekly, classify};
use crate::analyzers::impute::GapImputer;
use crate::analyzers::types::{BinRecord, ClassifiedRecord, DailySample, WeeklySample};
use crate::analyzers::under_detect::fill_under_detect;
use crate::config::PipelineConfig;
use crate::error::DomainError;

/// Every intermediate product of [`prepare`].
#[derive(Debug, Default)]
pub struct Prepared {
    pub classified: Vec<ClassifiedRecord>,
    pub daily: Vec<DailySample>,
    /// Completed weekly series, chronological, with `log_y` set.
    pub weekly: Vec<WeeklySample>,
}

/// Runs the analysis stages over the records of a run: under-detection
/// floor, HAB classification, daily and weekly aggregation, gap imputation.
///
/// # Errors
///
/// Any [`DomainError`] from the imputer. Nothing is returned partially.
#[tracing::instrument(skip_all, fields(records = records.len()))]
pub fn prepare(records: Vec<BinRecord>, config: &PipelineConfig) -> Result<Prepared, DomainError> {
    let records = match config.under_detect_floor {
        Some(floor) => fill_under_detect(records, floor),
        None => records,
    };

    let classified = classify(records, &config.hab);
    let daily = aggregate_daily(&classified);
    let observed = aggregate_weekly(&daily);
    let weekly = GapImputer::new(config.climatology_join).complete(&observed)?;

    info!(
        days = daily.len(),
        observed_weeks = observed.len(),
        weeks = weekly.len(),
        "Weekly series prepared"
    );

    Ok(Prepared {
        classified,
        daily,
        weekly,
    })
}
