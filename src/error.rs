//! Error taxonomy for the ingestion and weekly-series pipeline.
//!
//! Per-day retrieval and decode failures are recovered by the loader; every
//! other kind propagates to the caller.

use thiserror::Error;

/// Unsupported product selection or invalid configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("unknown instrument family: {0}")]
    UnknownInstrument(String),

    #[error("unsupported temporal resolution: {0}")]
    UnsupportedResolution(String),

    #[error("invalid date {0}, expected yyyymmdd")]
    InvalidDate(i64),

    #[error("date range is reversed: {from} > {to}")]
    ReversedRange {
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure to obtain the raw bytes of one product.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("invalid resource url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request for {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("no product available at {0}")]
    NotFound(String),

    #[error("failed to stage product locally: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed or absent product content.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to run decoder: {0}")]
    Command(String),

    #[error("missing {0} in product")]
    Missing(String),

    #[error("malformed product content: {0}")]
    Malformed(String),

    #[error("bin {bin_num} does not belong to any row")]
    OrphanBin { bin_num: u64 },

    #[error("netcdf error: {0}")]
    Netcdf(String),

    #[error("decoder task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("failed to read product: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "native")]
impl From<netcdf::Error> for DecodeError {
    fn from(e: netcdf::Error) -> Self {
        DecodeError::Netcdf(e.to_string())
    }
}

/// A value outside the domain of the operation it reached.
#[derive(Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("row {row_index} has zero bins")]
    EmptyRow { row_index: usize },

    #[error("row index {row_index} outside grid of {total_rows} rows")]
    RowOutOfRange { row_index: usize, total_rows: usize },

    #[error("bin {bin_num} outside row starting at {row_start_num} with {row_max_bins} bins")]
    BinOutOfRow {
        bin_num: u64,
        row_start_num: u64,
        row_max_bins: u64,
    },

    #[error("CI_cyano {value} on {date} is not strictly positive and cannot be log-transformed")]
    NonPositive { date: chrono::NaiveDate, value: f64 },

    #[error("no observed climatology for week {week}")]
    MissingClimatology { week: u32 },

    #[error("ISO week {week} does not exist in {year}")]
    InvalidWeek { year: i32, week: u32 },

    #[error("seasonal period must be at least 2, got {0}")]
    InvalidPeriod(usize),

    #[error("series has {observations} weeks, decomposition needs at least {required}")]
    ShortSeries { observations: usize, required: usize },
}

/// Output from a forecasting collaborator that breaks the adapter contract.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("cannot forecast an empty series")]
    EmptySeries,

    #[error("model returned {got} fitted values for {expected} observations")]
    FittedLength { expected: usize, got: usize },

    #[error("model returned {got} forecast steps, {expected} requested")]
    HorizonLength { expected: usize, got: usize },

    #[error("forecast date overflow at step {0}")]
    DateOverflow(usize),

    #[error("model process failed: {0}")]
    Process(String),

    #[error("malformed model output: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("model io failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Umbrella error for pipeline entry points.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("upload to s3://{bucket}/{key} failed: {message}")]
    Upload {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single day inside the loader. Never escapes a batch.
#[derive(Debug, Error)]
pub enum DayError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl DayError {
    /// Short label used in logs and the run report.
    pub fn kind(&self) -> &'static str {
        match self {
            DayError::Configuration(_) => "configuration",
            DayError::Retrieval(_) => "retrieval",
            DayError::Decode(_) => "decode",
            DayError::Domain(_) => "domain",
        }
    }
}
