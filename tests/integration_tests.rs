use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use cyan_hab::analyzers::analyzer::prepare;
use cyan_hab::analyzers::types::{SampleKind, SeriesRow, WeekKey};
use cyan_hab::config::PipelineConfig;
use cyan_hab::error::{DecodeError, ForecastError, RetrievalError};
use cyan_hab::fetch::ProductSource;
use cyan_hab::forecast::{SeasonalNaive, run_forecast};
use cyan_hab::loader::DailyLoader;
use cyan_hab::output;
use cyan_hab::product::{BinTable, ProductDecoder, RawBin, RowIndexEntry};
use cyan_hab::stats::LocationStats;

/// Serves product bodies keyed by archive file name.
struct FakeArchive {
    files: HashMap<String, String>,
}

#[async_trait]
impl ProductSource for FakeArchive {
    async fn fetch(&self, url: &str) -> Result<Bytes, RetrievalError> {
        let name = url.rsplit('/').next().unwrap_or(url);
        self.files
            .get(name)
            .map(|body| Bytes::from(body.clone()))
            .ok_or_else(|| RetrievalError::NotFound(url.to_string()))
    }
}

/// Reads a single concentration from the staged file and reports it for two
/// bins, the second at twice the first. Anything unparseable is corrupt.
struct ValueDecoder;

impl ProductDecoder for ValueDecoder {
    fn decode(&self, path: &Path, _group: &str) -> Result<BinTable, DecodeError> {
        let content = std::fs::read_to_string(path)?;
        let value: f64 = content
            .trim()
            .parse()
            .map_err(|_| DecodeError::Malformed(format!("not a product: {content}")))?;
        Ok(BinTable {
            rows: vec![
                RowIndexEntry { start_num: 1, max: 4 },
                RowIndexEntry { start_num: 5, max: 4 },
            ],
            bins: vec![bin(2, value), bin(6, 2.0 * value)],
        })
    }
}

fn bin(bin_num: u64, ci_cyano: f64) -> RawBin {
    RawBin {
        bin_num,
        ci_stumpf: f64::NAN,
        ci_cyano,
        ci_noncyano: f64::NAN,
        mci_stumpf: f64::NAN,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn archive(days: &[(NaiveDate, &str)]) -> FakeArchive {
    let config = PipelineConfig::default();
    let files = days
        .iter()
        .map(|(d, body)| (config.product.filename(*d).unwrap(), body.to_string()))
        .collect();
    FakeArchive { files }
}

#[tokio::test]
async fn test_ten_days_with_one_corrupt_product() {
    let days: Vec<(NaiveDate, &str)> = (1..=10)
        .map(|d| (date(2024, 1, d), if d == 3 { "corrupt" } else { "0.01" }))
        .collect();
    let config = PipelineConfig::default();
    let loader = DailyLoader::new(archive(&days), ValueDecoder, config.clone());

    let run = loader
        .load_range(date(2024, 1, 1), date(2024, 1, 10))
        .await
        .unwrap();
    assert_eq!(run.report.requested, 10);
    assert_eq!(run.report.succeeded, 9);
    assert_eq!(run.report.skipped.len(), 1);
    assert_eq!(run.report.skipped[0].date, date(2024, 1, 3));
    assert_eq!(run.report.skipped[0].kind, "decode");
    assert_eq!(run.records.len(), 18);

    let prepared = prepare(run.records, &config).unwrap();
    assert_eq!(prepared.daily.len(), 9);
    assert!(prepared.daily.iter().all(|d| d.date != date(2024, 1, 3)));
    let daily_mean = prepared.daily[0].ci_cyano.unwrap();
    assert!((daily_mean - 0.015).abs() < 1e-12);
    assert_eq!(prepared.daily[0].hab_high, 1);
    assert_eq!(prepared.daily[0].hab_high_med, 2);

    // 2024-01-01 is a Monday: days 1..7 are ISO week 1, days 8..10 week 2.
    let keys: Vec<WeekKey> = prepared.weekly.iter().map(|w| w.key).collect();
    assert_eq!(
        keys,
        vec![
            WeekKey { year: 2024, week: 1 },
            WeekKey { year: 2024, week: 2 }
        ]
    );
    assert!(prepared.weekly.iter().all(|w| w.kind == SampleKind::Observed));
    assert_eq!(prepared.weekly[1].date, date(2024, 1, 8));
    let log_y = prepared.weekly[0].log_y.unwrap();
    assert!((log_y - 0.015f64.ln()).abs() < 1e-12);
}

#[tokio::test]
async fn test_series_spanning_two_iso_years_is_completed() {
    // Week 51 of 2023 and week 2 of 2024 observed; everything between is missing.
    let days = [(date(2023, 12, 18), "0.004"), (date(2024, 1, 8), "0.02")];
    let config = PipelineConfig::default();
    let loader = DailyLoader::new(archive(&days), ValueDecoder, config.clone());

    let run = loader
        .load_range(date(2023, 12, 18), date(2024, 1, 8))
        .await
        .unwrap();
    assert_eq!(run.report.requested, 22);
    assert_eq!(run.report.succeeded, 2);
    assert!(run.report.skipped.iter().all(|s| s.kind == "retrieval"));

    let prepared = prepare(run.records, &config).unwrap();
    let keys: Vec<(i32, u32)> = prepared
        .weekly
        .iter()
        .map(|w| (w.key.year, w.key.week))
        .collect();
    assert_eq!(keys, vec![(2023, 51), (2023, 52), (2024, 1), (2024, 2)]);

    let kinds: Vec<SampleKind> = prepared.weekly.iter().map(|w| w.kind).collect();
    assert_eq!(
        kinds,
        vec![
            SampleKind::Observed,
            SampleKind::Imputed,
            SampleKind::Imputed,
            SampleKind::Observed
        ]
    );

    // Gaps take the nearest observed week's climatology.
    assert!((prepared.weekly[1].ci_cyano - prepared.weekly[0].ci_cyano).abs() < 1e-12);
    assert!((prepared.weekly[2].ci_cyano - prepared.weekly[3].ci_cyano).abs() < 1e-12);
    assert_eq!(prepared.weekly[2].date, date(2024, 1, 1));
    assert!(prepared.weekly.iter().all(|w| w.log_y.is_some()));

    let stats = LocationStats::from_records(&prepared.classified).unwrap();
    assert_eq!(stats.len(), 2);
    assert!(stats.iter().all(|s| s.nobs == 2));
}

#[tokio::test]
async fn test_year_without_products_is_filled_from_climatology() {
    // 2022-W50 and 2024-W02 observed; nothing at all in 2023.
    let days = [(date(2022, 12, 12), "0.004"), (date(2024, 1, 8), "0.02")];
    let config = PipelineConfig::default();
    let loader = DailyLoader::new(archive(&days), ValueDecoder, config.clone());

    let run = loader
        .load_range(date(2022, 12, 12), date(2024, 1, 8))
        .await
        .unwrap();
    assert_eq!(run.report.requested, 393);
    assert_eq!(run.report.succeeded, 2);

    let prepared = prepare(run.records, &config).unwrap();
    assert_eq!(prepared.weekly.len(), 3 + 52 + 2);

    let year_2023: Vec<_> = prepared.weekly.iter().filter(|w| w.key.year == 2023).collect();
    assert_eq!(year_2023.len(), 52);
    assert!(year_2023.iter().all(|w| w.kind == SampleKind::Imputed));
    assert_eq!(year_2023[0].date, date(2023, 1, 2));
    // Week 26 is equally far from weeks 2 and 50 and takes week 2.
    assert!((year_2023[25].ci_cyano - 0.03).abs() < 1e-12);
    assert!((year_2023[26].ci_cyano - 0.006).abs() < 1e-12);
    assert!(prepared.weekly.windows(2).all(|w| w[0].date < w[1].date));
}

#[tokio::test]
async fn test_53_week_year_inside_the_span_is_completed() {
    // 2020 has an ISO week 53, and its only product falls in it.
    let days = [
        (date(2019, 12, 2), "0.01"),
        (date(2020, 12, 31), "0.05"),
        (date(2021, 2, 1), "0.02"),
    ];
    let config = PipelineConfig::default();
    let loader = DailyLoader::new(archive(&days), ValueDecoder, config.clone());

    let run = loader
        .load_range(date(2019, 12, 2), date(2021, 2, 1))
        .await
        .unwrap();
    assert_eq!(run.report.succeeded, 3);

    let prepared = prepare(run.records, &config).unwrap();
    assert_eq!(prepared.weekly.len(), 4 + 52 + 5);
    assert!(prepared.weekly.iter().all(|w| w.key.week <= 52));

    let weeks_2020: Vec<u32> = prepared
        .weekly
        .iter()
        .filter(|w| w.key.year == 2020)
        .map(|w| w.key.week)
        .collect();
    assert_eq!(weeks_2020, (1..=52).collect::<Vec<_>>());
    assert!(prepared.weekly.iter().all(|w| (w.ci_cyano - 0.075).abs() > 1e-9));
}

#[tokio::test]
async fn test_weekly_series_file_feeds_the_forecast() {
    let days: Vec<(NaiveDate, &str)> = (1..=14).map(|d| (date(2024, 1, d), "0.01")).collect();
    let config = PipelineConfig::default();
    let loader = DailyLoader::new(archive(&days), ValueDecoder, config.clone());
    let run = loader
        .load_range(date(2024, 1, 1), date(2024, 1, 14))
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let bins_path = dir.path().join("L3B_CYAN_DAILY.csv");
    output::write_records(&bins_path, &run.records).unwrap();
    let records = output::read_records(&bins_path).unwrap();
    assert_eq!(records.len(), 28);

    let prepared = prepare(records, &config).unwrap();
    let weekly_path = dir.path().join("L3B_CYAN_WEEKLY.csv");
    output::write_series(&weekly_path, &prepared.weekly).unwrap();

    let series: Vec<SeriesRow> = output::read_series(&weekly_path).unwrap();
    assert_eq!(series.len(), 2);

    let report = run_forecast(&SeasonalNaive::default(), &series, 3).unwrap();
    assert_eq!(report.model_name, "SeasonalNaive(m=52)");
    assert_eq!(report.fitted.len(), 2);
    let dates: Vec<NaiveDate> = report.forecast.iter().map(|p| p.date).collect();
    assert_eq!(
        dates,
        vec![date(2024, 1, 15), date(2024, 1, 22), date(2024, 1, 29)]
    );
    // Flat series: the forecast is the observed level.
    assert!(report.forecast.iter().all(|p| (p.yhat - 0.015).abs() < 1e-9));
}

#[tokio::test]
async fn test_run_with_no_products_completes_empty() {
    let config = PipelineConfig::default();
    let loader = DailyLoader::new(archive(&[]), ValueDecoder, config.clone());
    let run = loader
        .load_range(date(2024, 1, 1), date(2024, 1, 5))
        .await
        .unwrap();

    assert_eq!(run.report.succeeded, 0);
    assert_eq!(run.report.skipped.len(), 5);

    let prepared = prepare(run.records, &config).unwrap();
    assert!(prepared.weekly.is_empty());
    assert!(matches!(
        run_forecast(&SeasonalNaive::default(), &[], 4),
        Err(ForecastError::EmptySeries)
    ));
}
