//! CLI entry point for the cyanobacteria bloom pipeline.
//!
//! Provides subcommands for extracting daily bin tables from the ocean-color
//! archive, reducing them to a gap-filled weekly series, forecasting or
//! decomposing that series, and extracting through forecasting in one run.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use cyan_hab::analyzers::analyzer::{Prepared, prepare};
use cyan_hab::analyzers::decompose::{Scale, decompose};
use cyan_hab::analyzers::types::{BinRecord, SeriesRow};
use cyan_hab::config::PipelineConfig;
use cyan_hab::fetch::auth::{ApiKey, UrlParam};
use cyan_hab::fetch::{BasicClient, DirectorySource, HttpSource, ProductSource};
use cyan_hab::forecast::{CommandModel, ForecastModel, ForecastReport, SeasonalNaive, run_forecast};
use cyan_hab::loader::{DailyLoader, LoadedRun};
use cyan_hab::output;
use cyan_hab::parser::parse_yyyymmdd;
#[cfg(feature = "native")]
use cyan_hab::product::NetcdfDecoder;
use cyan_hab::product::{NcdumpDecoder, ProductDecoder, ProductSelector};
use cyan_hab::stats::LocationStats;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const DEFAULT_BINS: &str = "data/L3B_CYAN_DAILY.csv";
const DEFAULT_WEEKLY: &str = "data/L3B_CYAN_WEEKLY.csv";
const DEFAULT_DECOMPOSITION: &str = "data/L3B_CYAN_DECOMPOSITION.csv";

#[derive(Parser)]
#[command(name = "cyan_hab")]
#[command(about = "Weekly cyanobacteria bloom series from ocean-color L3 binned products", long_about = None)]
struct Cli {
    /// JSON pipeline config; built-in defaults otherwise
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and decode daily products into a bin table CSV
    Extract {
        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        source: SourceArgs,

        /// CSV file for the decoded bins
        #[arg(short, long, default_value = DEFAULT_BINS)]
        output: PathBuf,

        #[command(flatten)]
        upload: UploadArgs,
    },
    /// Reduce a bin table CSV to a gap-filled weekly series
    Prepare {
        /// Bin table written by `extract`
        #[arg(short, long, default_value = DEFAULT_BINS)]
        input: PathBuf,

        /// Weekly series CSV (date, year, week, CI_cyano, log_y)
        #[arg(short, long, default_value = DEFAULT_WEEKLY)]
        output: PathBuf,

        /// Optional per-location summary CSV
        #[arg(long)]
        locations: Option<PathBuf>,

        /// Print the daily samples as JSON
        #[arg(long, default_value_t = false)]
        daily_json: bool,

        #[command(flatten)]
        upload: UploadArgs,
    },
    /// Forecast a weekly series CSV
    Forecast {
        /// Weekly series written by `prepare`
        #[arg(short, long, default_value = DEFAULT_WEEKLY)]
        input: PathBuf,

        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        upload: UploadArgs,
    },
    /// Split a weekly series CSV into trend, seasonal and residual parts
    Decompose {
        /// Weekly series written by `prepare`
        #[arg(short, long, default_value = DEFAULT_WEEKLY)]
        input: PathBuf,

        /// CSV file for the components
        #[arg(short, long, default_value = DEFAULT_DECOMPOSITION)]
        output: PathBuf,

        /// Decompose log_y instead of CI_cyano
        #[arg(long, default_value_t = false)]
        log: bool,

        /// Also print the decomposition as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        #[command(flatten)]
        upload: UploadArgs,
    },
    /// Extract, prepare, and forecast in one go
    Run {
        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        source: SourceArgs,

        /// CSV file for the decoded bins
        #[arg(short, long, default_value = DEFAULT_BINS)]
        output: PathBuf,

        /// Weekly series CSV
        #[arg(long, default_value = DEFAULT_WEEKLY)]
        weekly_output: PathBuf,

        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        upload: UploadArgs,
    },
}

#[derive(Args)]
struct RangeArgs {
    /// First day to extract, as yyyymmdd
    #[arg(long, default_value_t = 20240101)]
    date_from: i64,

    /// Last day to extract (inclusive), as yyyymmdd
    #[arg(long, default_value_t = 20240110)]
    date_to: i64,
}

#[derive(Args)]
struct SourceArgs {
    /// Read products from this directory instead of the archive
    #[arg(long)]
    local_dir: Option<PathBuf>,

    /// Product reader
    #[arg(long, value_enum, default_value_t = DecoderKind::default())]
    decoder: DecoderKind,

    /// ncdump binary used by `--decoder ncdump`
    #[arg(long, default_value = "ncdump")]
    ncdump: String,

    /// Instrument family (MERIS or OLCI); overrides the config
    #[arg(long)]
    instrument: Option<String>,

    /// Temporal resolution (DAY or 7D); overrides the config
    #[arg(long)]
    resolution: Option<String>,

    /// Product suffix, e.g. CYAN; overrides the config
    #[arg(long)]
    suffix: Option<String>,
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum DecoderKind {
    /// netCDF-C library
    #[cfg_attr(feature = "native", default)]
    Netcdf,
    /// The `ncdump` tool, parsing its text output
    #[cfg_attr(not(feature = "native"), default)]
    Ncdump,
}

#[derive(Args)]
struct ModelArgs {
    /// Weeks to forecast; the config value otherwise
    #[arg(short = 'n', long)]
    weeks: Option<usize>,

    /// External model command speaking JSON on stdin/stdout.
    /// The seasonal-naive baseline is used when absent.
    #[arg(long)]
    model_cmd: Option<String>,

    /// Print the full forecast report as JSON instead of a table
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args)]
struct UploadArgs {
    /// Optional: S3 bucket name to upload outputs to (e.g., "my-bucket")
    #[arg(long)]
    s3_bucket: Option<String>,

    /// Optional: Gzip compress CSV files before uploading to S3
    #[arg(long, default_value_t = false)]
    gzip: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_tracing();
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Colored stderr plus a JSON daily-rolling log file.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/cyan_hab.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("cyan_hab.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(LevelFilter::INFO.into()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive(LevelFilter::DEBUG.into()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = match cli.config.as_deref() {
        Some(path) => {
            PipelineConfig::load(path).with_context(|| format!("loading config {path}"))?
        }
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Extract {
            range,
            source,
            output,
            upload,
        } => {
            source.apply(&mut config)?;
            let run = extract(&range, &source, &config).await?;
            output::write_records(&output, &run.records)
                .with_context(|| format!("writing {}", output.display()))?;
            print_outcome(&run, &output);
            upload_outputs(&upload, &[output.as_path()], None).await?;
        }
        Commands::Prepare {
            input,
            output,
            locations,
            daily_json,
            upload,
        } => {
            let records = output::read_records(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let prepared = prepare_series(records, &config, &output, locations.as_deref())?;
            if daily_json {
                output::print_json(&prepared.daily)?;
            }
            upload_outputs(&upload, &[output.as_path()], None).await?;
        }
        Commands::Forecast {
            input,
            model,
            upload,
        } => {
            let series = output::read_series(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let report = forecast(&series, &model, &config)?;
            upload_outputs(&upload, &[], Some(&report)).await?;
        }
        Commands::Decompose {
            input,
            output,
            log,
            json,
            upload,
        } => {
            let series = output::read_series(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let scale = if log { Scale::Log } else { Scale::Linear };
            let decomposition = decompose(&series, config.season_length, scale)?;
            output::write_csv(&output, &decomposition.points)
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "{} weeks decomposed with period {} into {}",
                decomposition.points.len(),
                decomposition.period,
                output.display()
            );
            if json {
                output::print_json(&decomposition)?;
            }
            upload_outputs(&upload, &[output.as_path()], None).await?;
        }
        Commands::Run {
            range,
            source,
            output,
            weekly_output,
            model,
            upload,
        } => {
            source.apply(&mut config)?;
            let run = extract(&range, &source, &config).await?;
            output::write_records(&output, &run.records)
                .with_context(|| format!("writing {}", output.display()))?;
            print_outcome(&run, &output);

            let prepared = prepare_series(run.records, &config, &weekly_output, None)?;
            let series: Vec<SeriesRow> = prepared.weekly.iter().map(SeriesRow::from).collect();
            let report = forecast(&series, &model, &config)?;

            upload_outputs(&upload, &[output.as_path(), weekly_output.as_path()], Some(&report)).await?;
        }
    }

    Ok(())
}

impl SourceArgs {
    /// Applies the product overrides given on the command line.
    fn apply(&self, config: &mut PipelineConfig) -> Result<()> {
        if self.instrument.is_none() && self.resolution.is_none() && self.suffix.is_none() {
            return Ok(());
        }
        let instrument = self
            .instrument
            .clone()
            .unwrap_or_else(|| config.product.instrument.to_string());
        let resolution = self
            .resolution
            .clone()
            .unwrap_or_else(|| config.product.resolution.to_string());
        let suffix = self
            .suffix
            .clone()
            .unwrap_or_else(|| config.product.suffix.clone());
        config.product = ProductSelector::from_names(&instrument, &resolution, &suffix)?;
        Ok(())
    }

    /// A local mirror when `--local-dir` is given, the archive otherwise.
    ///
    /// `OCEANDATA_APPKEY` is sent as the `appkey` query parameter and
    /// `EARTHDATA_TOKEN` as a bearer token, each only when set.
    fn product_source(&self) -> Result<Box<dyn ProductSource>> {
        if let Some(dir) = &self.local_dir {
            info!(dir = %dir.display(), "Reading products from local directory");
            return Ok(Box::new(DirectorySource::new(dir.clone())));
        }

        let client = BasicClient::with_timeouts(Duration::from_secs(30), Duration::from_secs(600))
            .context("building HTTP client")?;
        let appkey = std::env::var("OCEANDATA_APPKEY").ok().filter(|k| !k.is_empty());
        let token = std::env::var("EARTHDATA_TOKEN").ok().filter(|t| !t.is_empty());
        if appkey.is_none() && token.is_none() {
            warn!("Neither OCEANDATA_APPKEY nor EARTHDATA_TOKEN is set; downloads may be refused");
        }

        let source: Box<dyn ProductSource> = match (appkey, token) {
            (Some(key), Some(token)) => Box::new(HttpSource::new(ApiKey::bearer(
                UrlParam::appkey(client, key),
                &token,
            )?)),
            (Some(key), None) => Box::new(HttpSource::new(UrlParam::appkey(client, key))),
            (None, Some(token)) => Box::new(HttpSource::new(ApiKey::bearer(client, &token)?)),
            (None, None) => Box::new(HttpSource::new(client)),
        };
        Ok(source)
    }

    fn product_decoder(&self) -> Result<Box<dyn ProductDecoder>> {
        match self.decoder {
            #[cfg(feature = "native")]
            DecoderKind::Netcdf => Ok(Box::new(NetcdfDecoder::new())),
            #[cfg(not(feature = "native"))]
            DecoderKind::Netcdf => anyhow::bail!("built without the native netCDF reader; use --decoder ncdump"),
            DecoderKind::Ncdump => Ok(Box::new(NcdumpDecoder::with_program(self.ncdump.clone()))),
        }
    }
}

#[tracing::instrument(skip_all, fields(from = range.date_from, to = range.date_to))]
async fn extract(range: &RangeArgs, source: &SourceArgs, config: &PipelineConfig) -> Result<LoadedRun> {
    let from = parse_yyyymmdd(range.date_from)?;
    let to = parse_yyyymmdd(range.date_to)?;

    let loader = DailyLoader::new(source.product_source()?, source.product_decoder()?, config.clone());
    Ok(loader.load_range(from, to).await?)
}

fn print_outcome(run: &LoadedRun, output: &Path) {
    println!(
        "{} of {} days extracted, {} skipped; {} bins written to {}",
        run.report.succeeded,
        run.report.requested,
        run.report.skipped.len(),
        run.report.records,
        output.display()
    );
}

fn prepare_series(
    records: Vec<BinRecord>,
    config: &PipelineConfig,
    weekly_output: &Path,
    locations: Option<&Path>,
) -> Result<Prepared> {
    let prepared = prepare(records, config)?;
    output::write_series(weekly_output, &prepared.weekly)
        .with_context(|| format!("writing {}", weekly_output.display()))?;

    if let Some(path) = locations {
        let stats = LocationStats::from_records(&prepared.classified)?;
        output::write_csv(path, &stats).with_context(|| format!("writing {}", path.display()))?;
    }

    println!(
        "{} days reduced to {} weeks in {}",
        prepared.daily.len(),
        prepared.weekly.len(),
        weekly_output.display()
    );
    Ok(prepared)
}

fn forecast(series: &[SeriesRow], args: &ModelArgs, config: &PipelineConfig) -> Result<ForecastReport> {
    let horizon = args.weeks.unwrap_or(config.forecast_weeks);
    let model: Box<dyn ForecastModel> = match args.model_cmd.as_deref() {
        Some(command_line) => {
            Box::new(CommandModel::parse(command_line).context("--model-cmd is empty")?)
        }
        None => Box::new(SeasonalNaive::new(config.season_length)),
    };

    let report = run_forecast(model.as_ref(), series, horizon)?;
    if args.json {
        output::print_json(&report)?;
    } else {
        output::print_forecast(&report);
    }
    Ok(report)
}

/// Uploads the given files and forecast report when a bucket is configured.
async fn upload_outputs(
    args: &UploadArgs,
    files: &[&Path],
    report: Option<&ForecastReport>,
) -> Result<()> {
    let Some(bucket) = args.s3_bucket.as_deref() else {
        return Ok(());
    };
    info!(bucket, gzip = args.gzip, "S3 upload enabled");

    let aws = aws_config::load_from_env().await;
    let s3 = aws_sdk_s3::Client::new(&aws);

    for path in files {
        output::upload_file(&s3, bucket, path, args.gzip).await?;
    }
    if let Some(report) = report {
        output::write_json_to_s3(&s3, bucket, "forecast.json", report).await?;
    }
    Ok(())
}
