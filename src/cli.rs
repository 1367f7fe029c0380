//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::loader::parse_timestamp;
use crate::models::Period;
use chrono::NaiveTime;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// rfidreport - warehouse RFID receiving and storage reports
///
/// Reads the `;`-delimited movement and receiving exports, reconciles
/// them, and writes the codes/quantities, grouped pallets and storage
/// reports as Markdown or JSON.
///
/// Examples:
///   rfidreport
///   rfidreport --movement movement.csv --receiving receiving.csv -o report.json --format json
///   rfidreport --page storage --from "2024-03-01 08:00" --to "2024-03-01 12:00"
///   rfidreport --page grouped --hour 08:05 --hour 08:20
///   rfidreport --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Movement export (CSV)
    ///
    /// Defaults to "Arquivos/Teste Movement.csv" or the config file value.
    #[arg(short, long, value_name = "FILE", env = "RFIDREPORT_MOVEMENT")]
    pub movement: Option<PathBuf>,

    /// Receiving export (CSV)
    ///
    /// Defaults to "Arquivos/Teste recebimento.csv" or the config file value.
    #[arg(short, long, value_name = "FILE", env = "RFIDREPORT_RECEIVING")]
    pub receiving: Option<PathBuf>,

    /// Output file path for the report ("-" for stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .rfidreport.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Report page to produce (all, codes, grouped, storage)
    #[arg(long, value_name = "PAGE")]
    pub page: Option<Page>,

    /// Only count receiving rows at or after this timestamp (storage report)
    #[arg(long, value_name = "TIMESTAMP")]
    pub from: Option<String>,

    /// Only count receiving rows at or before this timestamp (storage report)
    #[arg(long, value_name = "TIMESTAMP")]
    pub to: Option<String>,

    /// Show only these HH:MM rows in the grouped pallets report (repeatable)
    #[arg(long, value_name = "HH:MM")]
    pub hour: Vec<String>,

    /// Show only these x,y,z locations in the grouped pallets report (repeatable)
    #[arg(long, value_name = "X,Y,Z")]
    pub location: Vec<String>,

    /// Show only these HH:MM buckets in the storage report (repeatable)
    #[arg(long, value_name = "HH:MM")]
    pub bucket: Vec<String>,

    /// Show only the TOTAL row of the storage report
    #[arg(long)]
    pub totals_only: bool,

    /// Number of products in the top-products list (5-20)
    #[arg(long, value_name = "COUNT")]
    pub top: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .rfidreport.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Which report pages to produce.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    /// Every page (default)
    #[default]
    All,
    /// Codes and quantities, pallet statistics
    Codes,
    /// Pallets grouped over the day
    Grouped,
    /// Storage reconciliation
    Storage,
}

impl Page {
    pub fn includes(&self, page: Page) -> bool {
        *self == Page::All || *self == page
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        let period = self.period()?;
        if let (Some(from), Some(to)) = (period.from, period.to) {
            if from > to {
                return Err("--from must not be later than --to".to_string());
            }
        }

        if let Some(top) = self.top {
            let (min, max) = crate::analysis::TOP_PRODUCTS_RANGE;
            if !(min..=max).contains(&top) {
                return Err(format!("--top must be between {} and {}", min, max));
            }
        }

        // Buckets are zero-padded, so "8:05" would never match a row.
        for hour in self.hour.iter().chain(&self.bucket) {
            let padded = NaiveTime::parse_from_str(hour, "%H:%M")
                .map(|t| t.format("%H:%M").to_string());
            match padded {
                Ok(ref padded) if padded == hour => {}
                Ok(padded) => {
                    return Err(format!("Invalid time '{}', use '{}' (HH:MM)", hour, padded));
                }
                Err(_) => return Err(format!("Invalid time '{}', expected HH:MM", hour)),
            }
        }

        Ok(())
    }

    /// Timestamp window from --from/--to.
    pub fn period(&self) -> Result<Period, String> {
        let parse = |value: &Option<String>, flag: &str| match value {
            None => Ok(None),
            Some(text) => parse_timestamp(text)
                .map(Some)
                .ok_or_else(|| format!("Invalid {} timestamp: '{}'", flag, text)),
        };
        Ok(Period::new(parse(&self.from, "--from")?, parse(&self.to, "--to")?))
    }

    /// Human-readable descriptions of the view filters in effect.
    pub fn filter_descriptions(&self) -> Vec<String> {
        let mut filters = Vec::new();
        if !self.hour.is_empty() {
            filters.push(format!("Horários: {}", self.hour.join(", ")));
        }
        if !self.location.is_empty() {
            filters.push(format!("Locais: {}", self.location.join(" | ")));
        }
        if !self.bucket.is_empty() {
            filters.push(format!("Faixas de horário: {}", self.bucket.join(", ")));
        }
        if self.totals_only {
            filters.push("Apenas linha de totais".to_string());
        }
        filters
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the config file's `verbose` key; `--quiet` wins
    /// over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            movement: None,
            receiving: None,
            output: None,
            config: None,
            format: None,
            page: None,
            from: None,
            to: None,
            hour: Vec::new(),
            location: Vec::new(),
            bucket: Vec::new(),
            totals_only: false,
            top: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_repeatable_filters() {
        let args = Args::parse_from([
            "rfidreport",
            "--hour",
            "08:05",
            "--hour",
            "09:00",
            "--location",
            "101,1,1",
            "--page",
            "grouped",
        ]);
        assert_eq!(args.hour, vec!["08:05", "09:00"]);
        assert_eq!(args.location, vec!["101,1,1"]);
        assert_eq!(args.page, Some(Page::Grouped));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_period() {
        let mut args = make_args();
        args.from = Some("2024-03-01 10:00".to_string());
        args.to = Some("2024-03-01 08:00".to_string());
        assert!(args.validate().is_err());

        args.to = Some("not a date".to_string());
        assert!(args.validate().is_err());

        args.to = Some("2024-03-01 12:00:00".to_string());
        assert!(args.validate().is_ok());
        assert!(args.period().unwrap().is_active());
    }

    #[test]
    fn test_validation_top_and_hours() {
        let mut args = make_args();
        args.top = Some(3);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.bucket = vec!["8h".to_string()];
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_requires_zero_padded_hours() {
        let args = Args::parse_from(["rfidreport", "--hour", "8:05"]);
        let err = args.validate().unwrap_err();
        assert!(err.contains("'08:05'"));

        let args = Args::parse_from(["rfidreport", "--bucket", "08:05", "--hour", "23:59"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_page_includes() {
        assert!(Page::All.includes(Page::Storage));
        assert!(Page::Codes.includes(Page::Codes));
        assert!(!Page::Codes.includes(Page::Grouped));
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
