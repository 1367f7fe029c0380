//! rfidreport - warehouse RFID receiving and storage reports
//!
//! A CLI tool that reads the movement and receiving CSV exports of the
//! RFID tracking process, reconciles them, and writes the codes and
//! quantities, grouped pallets and storage reports.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, unreadable input, write failure, etc.)

mod analysis;
mod cli;
mod config;
mod loader;
mod models;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat, Page};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use models::{
    CodesPage, Dataset, GroupedPage, Period, Report, ReportMetadata, StorageOutcome, StoragePage,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so the file can turn on verbose output
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("rfidreport v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    log_config_source(&source);

    match run_report(args, config) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Report failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .rfidreport.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE_NAME);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set input paths, delimiter, output and report page.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Spinner shown while loading and processing; hidden in quiet mode.
fn spinner(args: &Args, message: &str) -> ProgressBar {
    if args.quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Run the complete report workflow. Returns exit code.
fn run_report(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    config.validate()?;

    let period = args.period().map_err(anyhow::Error::msg)?;
    let to_stdout = config.general.output == "-";

    // Step 1: Load both exports
    let pb = spinner(&args, "Carregando dados...");
    let dataset = match loader::load_dataset(
        &config.input.movement,
        &config.input.receiving,
        &loader::LoadOptions::from(&config.input),
    ) {
        Ok(dataset) => dataset,
        Err(e) => {
            pb.finish_and_clear();
            error!("Failed to load data: {}", e);
            print_troubleshooting(&config, &e);
            return Ok(1);
        }
    };
    pb.finish_and_clear();

    match (&dataset.rfid_column_movement, &dataset.rfid_column_receiving) {
        (Some(movement), Some(receiving)) => info!(
            "RFID columns found. Movement: '{}', Receiving: '{}'",
            movement, receiving
        ),
        _ => warn!(
            "RFID columns not found. Storage analysis will join on coordinates (x) and ground_position_alias"
        ),
    }

    // Step 2: Build the reports
    let pb = spinner(&args, "Processando relatórios...");
    let mut report = build_report(&dataset, &config, &args, &period);
    pb.finish_and_clear();

    report.metadata.duration_seconds = start_time.elapsed().as_secs_f64();

    // Step 3: Render and save
    let output = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    if to_stdout {
        print!("{}", output);
        return Ok(0);
    }

    std::fs::write(&config.general.output, &output)
        .with_context(|| format!("Failed to write report to {}", config.general.output))?;

    // Print summary
    let summary = &report.summary;
    println!("\n📊 Summary:");
    if dataset.has_rfid() {
        println!("   RFID join: yes");
    } else {
        println!("   RFID join: no (coordinate join)");
    }
    println!("   Products: {}", summary.products);
    println!("   Pallets: {}", summary.pallets);
    println!(
        "   Units: {}",
        report::format_units(summary.units)
    );
    println!("   Mean per pallet: {:.2}", summary.mean_per_pallet);
    if let Some(message) = report
        .storage
        .as_ref()
        .and_then(|page| page.outcome.message())
    {
        println!("   ⚠️  Storage: {}", message.1);
    }
    println!(
        "\n✅ Report saved to: {}",
        config.general.output
    );

    Ok(0)
}

/// Compute every page selected by the configuration.
fn build_report(dataset: &Dataset, config: &Config, args: &Args, period: &Period) -> Report {
    let page = config.report.page;
    let receiving = &dataset.receiving;

    let codes = page.includes(Page::Codes).then(|| {
        let pallet_stats = analysis::pallet_stats_by_sku(receiving);
        CodesPage {
            quantities: analysis::codes_and_quantities(receiving),
            top_products: analysis::top_products_by_mean(&pallet_stats, config.report.top_products),
            outliers: analysis::outliers_by_variation(&pallet_stats, config.report.top_products),
            pallet_stats,
        }
    });

    let grouped = page.includes(Page::Grouped).then(|| {
        let full = analysis::grouped_pallets(receiving, dataset.rfid_column_receiving.as_deref());
        GroupedPage {
            activity: analysis::activity_by_hour(&full),
            table: analysis::filter_grouped(&full, &args.hour, &args.location),
        }
    });

    let storage = page.includes(Page::Storage).then(|| {
        let outcome = analysis::storage_report(
            receiving,
            &dataset.movement,
            dataset.rfid_column_receiving.as_deref(),
            dataset.rfid_column_movement.as_deref(),
            period,
        );
        match outcome {
            StorageOutcome::Report(mut storage) => {
                storage.table = analysis::filter_storage(&storage.table, &args.bucket, args.totals_only);
                StoragePage {
                    distribution: analysis::storage_distribution(&storage.table),
                    outcome: StorageOutcome::Report(storage),
                }
            }
            other => StoragePage {
                outcome: other,
                distribution: Vec::new(),
            },
        }
    });

    let metadata = ReportMetadata {
        movement_path: config.input.movement.display().to_string(),
        receiving_path: config.input.receiving.display().to_string(),
        generated_at: Utc::now(),
        encoding: dataset.encoding,
        movement_rows: dataset.movement.len(),
        receiving_rows: receiving.len(),
        rfid_column_movement: dataset.rfid_column_movement.clone(),
        rfid_column_receiving: dataset.rfid_column_receiving.clone(),
        filters: args.filter_descriptions(),
        duration_seconds: 0.0,
    };

    Report {
        metadata,
        summary: analysis::summary_metrics(receiving),
        codes,
        grouped,
        storage,
    }
}

/// Explain a load failure and how to fix it.
fn print_troubleshooting(config: &Config, e: &loader::LoadError) {
    eprintln!("\n❌ Could not load the data: {}", e);
    eprintln!("\nTroubleshooting:");
    eprintln!(
        "   1. Check that the movement export exists: {}",
        config.input.movement.display()
    );
    eprintln!(
        "   2. Check that the receiving export exists: {}",
        config.input.receiving.display()
    );
    eprintln!(
        "   3. Check the CSV field separator (expected '{}')",
        config.input.delimiter
    );
    eprintln!("   4. Pass other paths with --movement/--receiving or in {}", CONFIG_FILE_NAME);
}

/// Where the active configuration came from.
enum ConfigSource {
    File(PathBuf),
    Defaults,
    /// The default config file exists but could not be used.
    DefaultsAfterError(anyhow::Error),
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is initialised; the outcome is logged afterwards
/// by [`log_config_source`].
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::File(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::File(PathBuf::from(CONFIG_FILE_NAME)))),
        Ok(None) => Ok((Config::default(), ConfigSource::Defaults)),
        Err(e) => Ok((Config::default(), ConfigSource::DefaultsAfterError(e))),
    }
}

fn log_config_source(source: &ConfigSource) {
    match source {
        ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
        ConfigSource::Defaults => debug!("No config file found, using defaults"),
        ConfigSource::DefaultsAfterError(e) => warn!("Failed to load config: {:#}", e),
    }
}
