//! CLI entry point for the CP GTFS feed builder.
//!
//! Fetches the Comboios de Portugal schedule for an inclusive date range and
//! writes it as a GTFS static feed into the given directory.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Parser};
use cp_gtfs::feed::{FeedWriter, Table};
use cp_gtfs::output::{CsvSink, remove_empty_tables};
use cp_gtfs::pipeline::FeedBuilder;
use cp_gtfs::provider::CpClient;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "build-cp-gtfs")]
#[command(about = "Generates a GTFS feed from the Comboios de Portugal schedule API", long_about = None)]
#[command(version, disable_version_flag = true)]
struct Cli {
    /// Feed start date: YYYY-MM-DD (in Europe/Lisbon timezone)
    #[arg(value_name = "START_DATE")]
    start: String,

    /// Feed end date: YYYY-MM-DD (included, in Europe/Lisbon timezone)
    #[arg(value_name = "END_DATE")]
    end: String,

    /// Directory where the generated GTFS will be placed
    #[arg(value_name = "GTFS_DIRECTORY")]
    directory: PathBuf,

    /// Maximum number of concurrent provider requests
    #[arg(short, long, default_value_t = 16)]
    concurrency: usize,

    /// Show the version number
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,
}

fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/build_cp_gtfs.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("build_cp_gtfs.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    file_guard
}

fn parse_date(raw: &str, name: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid `{name}` parameter, must look like this: `YYYY-MM-DD`"))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_logging();

    let cli = Cli::parse();

    let start = parse_date(&cli.start, "start-date")?;
    let end = parse_date(&cli.end, "end-date")?;

    std::fs::create_dir_all(&cli.directory)
        .with_context(|| format!("failed to create {}", cli.directory.display()))?;

    let mut writer = FeedWriter::new();
    for table in Table::ALL {
        let sink = CsvSink::create(&cli.directory, table)?;
        writer.open(table, Box::new(sink))?;
    }

    let client = CpClient::from_env()?;
    let builder = FeedBuilder::new(client).concurrency(cli.concurrency);

    let summary = builder.build(start, end, &mut writer).await?;

    let files_written = remove_empty_tables(&cli.directory)?;

    info!(
        stations = summary.stations,
        lines = summary.lines,
        trips = summary.trips_total,
        trips_skipped = summary.trips_skipped,
        rows = summary.rows_written,
        files = files_written,
        "feed generated"
    );
    println!("{files_written} files written");

    Ok(())
}
