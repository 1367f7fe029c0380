//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.rfidreport.toml` files.

use crate::cli::{OutputFormat, Page};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".rfidreport.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input file settings.
    #[serde(default)]
    pub input: InputConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Report output path; `-` writes to stdout.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            format: OutputFormat::default(),
        }
    }
}

fn default_output() -> String {
    "relatorio_rfid.md".to_string()
}

/// Input file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Movement export path.
    #[serde(default = "default_movement")]
    pub movement: PathBuf,

    /// Receiving export path.
    #[serde(default = "default_receiving")]
    pub receiving: PathBuf,

    /// Field delimiter (a single ASCII character).
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            movement: default_movement(),
            receiving: default_receiving(),
            delimiter: default_delimiter(),
        }
    }
}

impl InputConfig {
    /// Delimiter as a byte. Validated by [`Config::validate`].
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b';')
    }
}

fn default_movement() -> PathBuf {
    PathBuf::from("Arquivos/Teste Movement.csv")
}

fn default_receiving() -> PathBuf {
    PathBuf::from("Arquivos/Teste recebimento.csv")
}

fn default_delimiter() -> String {
    ";".to_string()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Which pages to include.
    #[serde(default)]
    pub page: Page,

    /// How many products the "top products" list shows (5-20).
    #[serde(default = "default_top_products")]
    pub top_products: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            page: Page::default(),
            top_products: default_top_products(),
        }
    }
}

fn default_top_products() -> usize {
    crate::analysis::DEFAULT_TOP_PRODUCTS
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Check values serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        if self.input.delimiter.len() != 1 || !self.input.delimiter.is_ascii() {
            bail!(
                "Delimiter must be a single ASCII character, got {:?}",
                self.input.delimiter
            );
        }
        let (min, max) = crate::analysis::TOP_PRODUCTS_RANGE;
        if !(min..=max).contains(&self.report.top_products) {
            bail!("top_products must be between {} and {}", min, max);
        }
        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref movement) = args.movement {
            self.input.movement = movement.clone();
        }
        if let Some(ref receiving) = args.receiving {
            self.input.receiving = receiving.clone();
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if let Some(page) = args.page {
            self.report.page = page;
        }
        if let Some(top) = args.top {
            self.report.top_products = top;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.input.movement, PathBuf::from("Arquivos/Teste Movement.csv"));
        assert_eq!(config.input.delimiter_byte(), b';');
        assert_eq!(config.report.top_products, 10);
        assert_eq!(config.report.page, Page::All);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "armazenado.json"
verbose = true
format = "json"

[input]
movement = "data/movement.csv"
delimiter = ","

[report]
page = "storage"
top_products = 15
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "armazenado.json");
        assert!(config.general.verbose);
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(config.input.movement, PathBuf::from("data/movement.csv"));
        assert_eq!(config.input.receiving, PathBuf::from("Arquivos/Teste recebimento.csv"));
        assert_eq!(config.input.delimiter_byte(), b',');
        assert_eq!(config.report.page, Page::Storage);
        assert_eq!(config.report.top_products, 15);
    }

    #[test]
    fn test_config_verbose_sets_log_level() {
        let mut config: Config = toml::from_str("[general]\nverbose = true\n").unwrap();
        let args = crate::cli::Args::parse_from(["rfidreport"]);
        config.merge_with_args(&args);
        assert_eq!(args.log_level(config.general.verbose), tracing::Level::DEBUG);

        let quiet = crate::cli::Args::parse_from(["rfidreport", "--quiet"]);
        assert_eq!(quiet.log_level(config.general.verbose), tracing::Level::ERROR);
        assert_eq!(args.log_level(Config::default().general.verbose), tracing::Level::INFO);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.input.delimiter = ";;".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.report.top_products = 50;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_with_args() {
        let args = crate::cli::Args::parse_from([
            "rfidreport",
            "--receiving",
            "in/receiving.csv",
            "--format",
            "json",
            "--top",
            "7",
        ]);
        let mut config = Config::default();
        config.merge_with_args(&args);

        assert_eq!(config.input.receiving, PathBuf::from("in/receiving.csv"));
        assert_eq!(config.input.movement, PathBuf::from("Arquivos/Teste Movement.csv"));
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(config.report.top_products, 7);
        assert_eq!(config.general.output, "relatorio_rfid.md");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[input]"));
        assert!(toml_str.contains("[report]"));
    }
}
