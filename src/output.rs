//! Output formatting and persistence.
//!
//! CSV files for decoded bins, the weekly series and location summaries,
//! terminal printing of reports, and optional upload to S3.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use aws_sdk_s3::primitives::ByteStream;
use chrono::NaiveDate;
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analyzers::types::{BinRecord, SeriesRow, WeeklySample};
use crate::error::{DomainError, PipelineError};
use crate::forecast::ForecastReport;

/// Flat CSV row of a decoded bin with its cell geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinRow {
    pub date: NaiveDate,
    pub bin_num: u64,
    #[serde(rename = "CI_stumpf")]
    pub ci_stumpf: f64,
    #[serde(rename = "CI_cyano")]
    pub ci_cyano: f64,
    #[serde(rename = "CI_noncyano")]
    pub ci_noncyano: f64,
    #[serde(rename = "MCI_stumpf")]
    pub mci_stumpf: f64,
    pub clat: f64,
    pub clon: f64,
    pub north: f64,
    pub south: f64,
    pub west: f64,
    pub east: f64,
    pub row_start_num: u64,
    pub row_max_bins: u64,
    pub row_index: usize,
    pub total_rows: usize,
}

impl BinRow {
    pub fn from_record(r: &BinRecord) -> Result<Self, DomainError> {
        let cell = r.geometry()?;
        Ok(BinRow {
            date: r.date,
            bin_num: r.bin_num,
            ci_stumpf: r.ci_stumpf,
            ci_cyano: r.ci_cyano,
            ci_noncyano: r.ci_noncyano,
            mci_stumpf: r.mci_stumpf,
            clat: cell.clat,
            clon: cell.clon,
            north: cell.north,
            south: cell.south,
            west: cell.west,
            east: cell.east,
            row_start_num: r.row_start_num,
            row_max_bins: r.row_max_bins,
            row_index: r.row_index,
            total_rows: r.total_rows,
        })
    }
}

impl From<BinRow> for BinRecord {
    fn from(row: BinRow) -> Self {
        BinRecord {
            date: row.date,
            bin_num: row.bin_num,
            row_start_num: row.row_start_num,
            row_max_bins: row.row_max_bins,
            row_index: row.row_index,
            total_rows: row.total_rows,
            ci_stumpf: row.ci_stumpf,
            ci_cyano: row.ci_cyano,
            ci_noncyano: row.ci_noncyano,
            mci_stumpf: row.mci_stumpf,
        }
    }
}

/// Writes `rows` to a new CSV file at `path`, replacing any existing file.
///
/// Missing parent directories are created.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    debug!(path = %path.display(), rows = rows.len(), "Writing CSV");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PipelineError> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<Result<Vec<T>, _>>()?;
    debug!(path = %path.display(), rows = rows.len(), "Read CSV");
    Ok(rows)
}

/// Persists decoded bins with their geometry.
pub fn write_records(path: &Path, records: &[BinRecord]) -> Result<(), PipelineError> {
    let rows = records
        .iter()
        .map(BinRow::from_record)
        .collect::<Result<Vec<_>, _>>()?;
    write_csv(path, &rows)?;
    info!(path = %path.display(), records = rows.len(), "Bin table written");
    Ok(())
}

pub fn read_records(path: &Path) -> Result<Vec<BinRecord>, PipelineError> {
    let rows: Vec<BinRow> = read_csv(path)?;
    Ok(rows.into_iter().map(BinRecord::from).collect())
}

/// Persists the completed weekly series in the exchange format
/// `date, year, week, CI_cyano, log_y`.
pub fn write_series(path: &Path, weekly: &[WeeklySample]) -> Result<(), PipelineError> {
    let rows: Vec<SeriesRow> = weekly.iter().map(SeriesRow::from).collect();
    write_csv(path, &rows)?;
    info!(path = %path.display(), weeks = rows.len(), "Weekly series written");
    Ok(())
}

pub fn read_series(path: &Path) -> Result<Vec<SeriesRow>, PipelineError> {
    read_csv(path)
}

/// Prints a value as pretty JSON on stdout.
pub fn print_json(value: &impl Serialize) -> Result<(), PipelineError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints the forecast as a date / forecast / lower / upper table.
pub fn print_forecast(report: &ForecastReport) {
    println!("{}", report.model_name);
    println!(
        "{:<12} {:>12} {:>12} {:>12}",
        "date", "forecast", "lower", "upper"
    );
    for p in &report.forecast {
        println!(
            "{:<12} {:>12.6} {:>12.6} {:>12.6}",
            p.date.to_string(),
            p.yhat,
            p.yhat_lower,
            p.yhat_upper
        );
    }
}

pub fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// Object key for an uploaded file: its file name, with `.gz` when compressed.
pub fn upload_key(path: &Path, gzip: bool) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    if gzip { format!("{name}.gz") } else { name }
}

/// Uploads a local file to S3, optionally gzip-compressing it first.
/// Returns the object key.
#[tracing::instrument(skip(client, path), fields(path = %path.display()))]
pub async fn upload_file(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    path: &Path,
    gzip_body: bool,
) -> Result<String, PipelineError> {
    let contents = std::fs::read(path)?;
    let key = upload_key(path, gzip_body);
    let body = if gzip_body { gzip(&contents)? } else { contents };

    put_object(client, bucket, &key, body, None).await?;
    info!(bucket, key, "S3 upload complete");
    Ok(key)
}

/// Serializes a value to JSON and uploads it with `application/json` content type.
pub async fn write_json_to_s3(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    value: &impl Serialize,
) -> Result<(), PipelineError> {
    let body = serde_json::to_vec(value)?;
    put_object(client, bucket, key, body, Some("application/json")).await
}

async fn put_object(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    body: Vec<u8>,
    content_type: Option<&str>,
) -> Result<(), PipelineError> {
    let mut request = client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(body));
    if let Some(content_type) = content_type {
        request = request.content_type(content_type);
    }
    request.send().await.map_err(|e| PipelineError::Upload {
        bucket: bucket.to_string(),
        key: key.to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::{SampleKind, WeekKey};
    use crate::stats::LocationStats;
    use std::io::Read;

    fn record(bin_num: u64, ci_cyano: f64) -> BinRecord {
        BinRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            bin_num,
            row_start_num: 1,
            row_max_bins: 4,
            row_index: 0,
            total_rows: 2,
            ci_stumpf: 0.25,
            ci_cyano,
            ci_noncyano: f64::NAN,
            mci_stumpf: -0.5,
        }
    }

    #[test]
    fn test_bin_table_has_geometry_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bins.csv");
        write_records(&path, &[record(1, 0.01), record(2, 0.02)]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let header = content.lines().next().unwrap();
        assert!(header.starts_with("date,bin_num,CI_stumpf,CI_cyano,CI_noncyano,MCI_stumpf,clat,clon"));

        let back = read_records(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[1].bin_num, 2);
        assert_eq!(back[1].ci_cyano, 0.02);
        assert!(back[0].ci_noncyano.is_nan());
    }

    #[test]
    fn test_series_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weekly.csv");
        let weekly = vec![WeeklySample {
            key: WeekKey { year: 2024, week: 2 },
            date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            ci_cyano: 1.0,
            log_y: Some(0.0),
            kind: SampleKind::Imputed,
        }];
        write_series(&path, &weekly).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("date,year,week,CI_cyano,log_y"));
        assert_eq!(lines.next(), Some("2024-01-08,2024,2,1.0,0.0"));

        let rows = read_series(&path).unwrap();
        assert_eq!(rows[0].week, 2);
        assert_eq!(rows[0].log_y, 0.0);
    }

    #[test]
    fn test_location_stats_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.csv");
        let stats = vec![LocationStats {
            bin_num: 7,
            clat: 45.0,
            clon: 0.0,
            nobs: 3,
            ci_cyano: None,
            ci_cyano_median: None,
            hab_high: 0,
            hab_high_med: 0,
            pct_hab_high: 0.0,
            pct_hab_high_med: 0.0,
        }];
        write_csv(&path, &stats).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().nth(1).unwrap().starts_with("7,45.0,0.0,3,,,"));
    }

    #[test]
    fn test_gzip_and_upload_key() {
        let compressed = gzip(b"date,year\n").unwrap();
        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut text = String::new();
        decoder.read_to_string(&mut text).unwrap();
        assert_eq!(text, "date,year\n");

        let path = Path::new("data/weekly.csv");
        assert_eq!(upload_key(path, true), "weekly.csv.gz");
        assert_eq!(upload_key(path, false), "weekly.csv");
    }
}
