use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::ProgressBar;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::{info, Level};

use yelpdb::config::EXAMPLE_CONFIG;
use yelpdb::ingest::{IngestProgressCallback, LoadStats};
use yelpdb::output::{format_table, DEFAULT_MAX_WIDTH};
use yelpdb::*;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(after_long_help = EXAMPLE_CONFIG)]
struct Cli {
    /// YAML configuration file naming the database file and the raw data folder
    config: PathBuf,

    /// Skip the photos file even when it is present
    #[clap(long)]
    no_photos: bool,

    /// Drop and recreate all tables before loading
    #[clap(long, conflicts_with = "query")]
    reset: bool,

    /// Run a SQL statement against the configured database instead of loading
    #[clap(short, long)]
    query: Option<String>,

    /// Output format for query results: table, markdown, json, json-pretty, json-line, psv
    #[clap(short, long, default_value = "table")]
    format: OutputFormat,

    /// Maximum cell width in table output
    #[clap(long, default_value_t = DEFAULT_MAX_WIDTH)]
    max_width: usize,

    /// Show load progress and informational messages
    #[clap(short, long)]
    verbose: bool,

    /// Print debug information
    #[clap(long)]
    debug: bool,
}

#[derive(Tabled)]
struct LoadSummary {
    source: String,
    table: String,
    records: u64,
    #[tabled(rename = "derived rows")]
    derived_rows: u64,
    seconds: String,
    file: String,
}

impl From<&LoadStats> for LoadSummary {
    fn from(stats: &LoadStats) -> Self {
        LoadSummary {
            source: stats.source.to_string(),
            table: stats.table.clone(),
            records: stats.records,
            derived_rows: stats.derived_rows,
            seconds: format!("{:.1}", stats.duration_secs),
            file: stats.path.display().to_string(),
        }
    }
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = YelpDbConfig::load(&cli.config)
        .with_context(|| format!("cannot load configuration {}", cli.config.display()))?;
    if cli.no_photos {
        config.include_photos = false;
    }
    info!("Configuration:\n{}", config.summary());

    let db = YelpDatabase::from_config(&config)?;

    if let Some(sql) = &cli.query {
        let table = db.query_table(sql)?;
        println!("{}", format_table(&table, cli.format, cli.max_width)?);
        return Ok(());
    }

    if cli.reset {
        db.reset()?;
    }

    let spinner = cli.verbose.then(|| {
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });
    let callback = spinner.clone().map(progress_callback);

    let result = db.ingest_with_progress(
        &config.raw_data_folder_path,
        config.ingest_options(),
        callback,
    );
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let report = result?;

    let rows: Vec<LoadSummary> = report.loaded.iter().map(LoadSummary::from).collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    if !report.skipped.is_empty() {
        let skipped: Vec<String> = report.skipped.iter().map(|k| k.to_string()).collect();
        println!("Skipped: {}", skipped.join(", "));
    }
    println!(
        "Loaded {} records into {}",
        report.total_records(),
        config.database_file_path.display()
    );
    Ok(())
}

fn progress_callback(pb: ProgressBar) -> IngestProgressCallback {
    Arc::new(move |progress: IngestProgress| match progress {
        IngestProgress::Started { source, file_path } => {
            pb.set_message(format!("Loading {} from {}", source, file_path));
        }
        IngestProgress::Update {
            source,
            records_processed,
            rate,
            ..
        } => {
            let rate = rate.map(|r| format!(" ({:.0}/s)", r)).unwrap_or_default();
            pb.set_message(format!("Loading {}: {} records{}", source, records_processed, rate));
        }
        IngestProgress::Completed {
            source,
            total_records,
            duration_secs,
            ..
        } => {
            pb.println(format!(
                "Loaded {} {} records in {:.1}s",
                total_records, source, duration_secs
            ));
        }
        IngestProgress::Skipped { source, reason } => {
            pb.println(format!("Skipped {}: {}", source, reason));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_conflicts_with_query() {
        let parsed = Cli::try_parse_from(["yelpdb", "--reset", "-q", "SELECT 1", "yelpdb.yaml"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_options() {
        let cli = Cli::try_parse_from(["yelpdb", "--reset", "--no-photos", "yelpdb.yaml"]).unwrap();
        assert!(cli.reset);
        assert!(cli.no_photos);
        assert!(cli.query.is_none());
        assert_eq!(cli.config, PathBuf::from("yelpdb.yaml"));

        let cli = Cli::try_parse_from(["yelpdb", "-q", "SELECT 1", "-f", "json", "yelpdb.yaml"])
            .unwrap();
        assert_eq!(cli.query.as_deref(), Some("SELECT 1"));
        assert!(!cli.reset);
    }
}
