//! Daily product loader.
//!
//! For each requested day: derive the archive URL, fetch the product, stage
//! it in a temporary file for the decoder, and turn its bins into
//! [`BinRecord`]s. Staging and decoding run on tokio's blocking pool. A day
//! that fails at any step is logged and skipped; the run carries on with the
//! next day.

use std::io::Write;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::analyzers::types::BinRecord;
use crate::config::PipelineConfig;
use crate::error::{ConfigurationError, DayError, DecodeError, RetrievalError};
use crate::fetch::ProductSource;
use crate::product::{BinTable, ProductDecoder};

/// A day that contributed no records, and why.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedDay {
    pub date: NaiveDate,
    pub kind: &'static str,
    pub message: String,
}

/// Aggregate outcome of a multi-day load.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub requested: usize,
    pub succeeded: usize,
    pub skipped: Vec<SkippedDay>,
    pub records: usize,
}

/// Records of every successful day plus the run report.
#[derive(Debug, Default)]
pub struct LoadedRun {
    pub records: Vec<BinRecord>,
    pub report: RunReport,
}

pub struct DailyLoader<S, D> {
    source: S,
    decoder: Arc<D>,
    config: PipelineConfig,
}

impl<S: ProductSource, D: ProductDecoder + 'static> DailyLoader<S, D> {
    pub fn new(source: S, decoder: D, config: PipelineConfig) -> Self {
        Self {
            source,
            decoder: Arc::new(decoder),
            config,
        }
    }

    /// Loads every day in `from..=to`.
    ///
    /// # Errors
    ///
    /// Only a reversed range fails the call; per-day failures are recorded in
    /// the report.
    pub async fn load_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<LoadedRun, ConfigurationError> {
        if from > to {
            return Err(ConfigurationError::ReversedRange { from, to });
        }

        let mut run = LoadedRun::default();
        let mut previous_url: Option<String> = None;

        for date in from.iter_days().take_while(|d| *d <= to) {
            // Composites span several days; fetch each one once.
            if let Ok(url) = self.config.product.url(&self.config.base_url, date) {
                if previous_url.as_deref() == Some(url.as_str()) {
                    debug!(%date, "Composite already loaded");
                    continue;
                }
                previous_url = Some(url);
            }

            run.report.requested += 1;
            match self.load_day(date).await {
                Ok(records) => {
                    info!(%date, records = records.len(), "Day complete");
                    run.report.succeeded += 1;
                    run.report.records += records.len();
                    run.records.extend(records);
                }
                Err(e) => {
                    warn!(%date, kind = e.kind(), error = %e, "No data for day");
                    run.report.skipped.push(SkippedDay {
                        date,
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            requested = run.report.requested,
            succeeded = run.report.succeeded,
            skipped = run.report.skipped.len(),
            records = run.report.records,
            "Extraction completed"
        );
        Ok(run)
    }

    /// Fetches, stages, and decodes the product for one day.
    #[tracing::instrument(skip(self))]
    pub async fn load_day(&self, date: NaiveDate) -> Result<Vec<BinRecord>, DayError> {
        let url = self.config.product.url(&self.config.base_url, date)?;
        info!(url, "Processing");

        let bytes = self.source.fetch(&url).await?;

        let decoder = Arc::clone(&self.decoder);
        let group = self.config.group.clone();
        let table = tokio::task::spawn_blocking(move || -> Result<BinTable, DayError> {
            let staged = stage(&bytes)?;
            // The staged file is removed when `staged` drops, on every path out.
            let table = decoder.decode(staged.path(), &group)?;
            staged.close().map_err(RetrievalError::Io)?;
            Ok(table)
        })
        .await
        .map_err(DecodeError::from)??;

        self.to_records(table, date)
    }

    fn to_records(&self, table: BinTable, date: NaiveDate) -> Result<Vec<BinRecord>, DayError> {
        let mut records = Vec::with_capacity(table.bins.len());
        let mut outside = 0usize;

        for bin in &table.bins {
            let address = table.locate(bin.bin_num)?;
            let cell = address.geometry()?;
            if let Some(region) = &self.config.region {
                if !region.contains(&cell) {
                    outside += 1;
                    continue;
                }
            }
            records.push(BinRecord {
                date,
                bin_num: address.bin_num,
                row_start_num: address.row_start_num,
                row_max_bins: address.row_max_bins,
                row_index: address.row_index,
                total_rows: address.total_rows,
                ci_stumpf: bin.ci_stumpf,
                ci_cyano: bin.ci_cyano,
                ci_noncyano: bin.ci_noncyano,
                mci_stumpf: bin.mci_stumpf,
            });
        }

        debug!(kept = records.len(), outside, "Bins decoded");
        Ok(records)
    }
}

fn stage(bytes: &[u8]) -> Result<NamedTempFile, RetrievalError> {
    let mut file = tempfile::Builder::new()
        .prefix("cyan_hab_")
        .suffix(".nc")
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::BoundingBox;
    use crate::product::{RawBin, RowIndexEntry};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::thread::ThreadId;

    struct FakeSource {
        missing: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProductSource for FakeSource {
        async fn fetch(&self, url: &str) -> Result<Bytes, RetrievalError> {
            self.calls.lock().unwrap().push(url.to_string());
            if self.missing.iter().any(|m| url.ends_with(m)) {
                return Err(RetrievalError::NotFound(url.to_string()));
            }
            Ok(Bytes::from(url.to_string()))
        }
    }

    /// Decodes a fixed table, failing for payloads containing `fail_on`.
    /// Remembers the staged paths so tests can check they were removed, and
    /// the threads it ran on.
    struct FakeDecoder {
        fail_on: Option<&'static str>,
        staged: Mutex<Vec<PathBuf>>,
        threads: Mutex<Vec<ThreadId>>,
    }

    impl ProductDecoder for FakeDecoder {
        fn decode(&self, path: &Path, _group: &str) -> Result<BinTable, DecodeError> {
            self.staged.lock().unwrap().push(path.to_path_buf());
            self.threads.lock().unwrap().push(std::thread::current().id());
            let content = std::fs::read_to_string(path)?;
            if let Some(marker) = self.fail_on {
                if content.contains(marker) {
                    return Err(DecodeError::Malformed("corrupt".to_string()));
                }
            }
            Ok(BinTable {
                rows: vec![
                    RowIndexEntry { start_num: 1, max: 4 },
                    RowIndexEntry { start_num: 5, max: 4 },
                ],
                bins: vec![raw(2, 0.01), raw(6, 0.02), raw(7, 0.03)],
            })
        }
    }

    fn raw(bin_num: u64, ci_cyano: f64) -> RawBin {
        RawBin {
            bin_num,
            ci_stumpf: f64::NAN,
            ci_cyano,
            ci_noncyano: f64::NAN,
            mci_stumpf: f64::NAN,
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn loader(
        missing: Vec<&'static str>,
        fail_on: Option<&'static str>,
        config: PipelineConfig,
    ) -> DailyLoader<FakeSource, FakeDecoder> {
        DailyLoader::new(
            FakeSource {
                missing,
                calls: Mutex::new(vec![]),
            },
            FakeDecoder {
                fail_on,
                staged: Mutex::new(vec![]),
                threads: Mutex::new(vec![]),
            },
            config,
        )
    }

    #[tokio::test]
    async fn test_load_day_decodes_and_tags_date() {
        let l = loader(vec![], None, PipelineConfig::default());
        let records = l.load_day(date(2)).await.unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.date == date(2)));
        assert_eq!(records[1].row_index, 1);
        assert_eq!(records[1].row_start_num, 5);
        assert_eq!(records[1].total_rows, 2);
    }

    #[tokio::test]
    async fn test_failed_days_are_skipped() {
        let l = loader(
            vec!["L2024002.L3b_DAY_CYAN.nc"],
            Some("L2024004"),
            PipelineConfig::default(),
        );
        let run = l.load_range(date(1), date(5)).await.unwrap();

        assert_eq!(run.report.requested, 5);
        assert_eq!(run.report.succeeded, 3);
        assert_eq!(run.report.skipped.len(), 2);
        assert_eq!(run.report.skipped[0].date, date(2));
        assert_eq!(run.report.skipped[0].kind, "retrieval");
        assert_eq!(run.report.skipped[1].kind, "decode");
        assert_eq!(run.records.len(), 9);
        assert!(run.records.iter().all(|r| r.date != date(2) && r.date != date(4)));
    }

    #[tokio::test]
    async fn test_staged_files_are_removed_on_success_and_failure() {
        let l = loader(vec![], Some("L2024002"), PipelineConfig::default());
        l.load_range(date(1), date(3)).await.unwrap();

        let staged = l.decoder.staged.lock().unwrap();
        assert_eq!(staged.len(), 3);
        assert!(staged.iter().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn test_region_filter_drops_outside_cells() {
        // Row 1 covers the northern hemisphere, bins 6 and 7 span lon -90..90.
        let config = PipelineConfig {
            region: Some(BoundingBox {
                lat_min: 0.0,
                lat_max: 90.0,
                lon_min: -90.0,
                lon_max: 90.0,
            }),
            ..Default::default()
        };
        let l = loader(vec![], None, config);
        let records = l.load_day(date(1)).await.unwrap();
        let bins: Vec<u64> = records.iter().map(|r| r.bin_num).collect();
        assert_eq!(bins, vec![6, 7]);
    }

    #[tokio::test]
    async fn test_decode_runs_off_the_runtime_thread() {
        let l = loader(vec![], None, PipelineConfig::default());
        l.load_day(date(1)).await.unwrap();

        let threads = l.decoder.threads.lock().unwrap();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[tokio::test]
    async fn test_reversed_range_is_rejected() {
        let l = loader(vec![], None, PipelineConfig::default());
        assert!(matches!(
            l.load_range(date(5), date(1)).await,
            Err(ConfigurationError::ReversedRange { .. })
        ));
    }

    #[tokio::test]
    async fn test_composite_is_fetched_once_per_window() {
        let config = PipelineConfig {
            product: crate::product::ProductSelector::from_names("OLCI", "7D", "CYAN").unwrap(),
            ..Default::default()
        };
        let l = loader(vec![], None, config);
        let run = l.load_range(date(1), date(10)).await.unwrap();

        assert_eq!(run.report.requested, 2);
        assert_eq!(l.source.calls.lock().unwrap().len(), 2);
    }
}
