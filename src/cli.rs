//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// ModelMapper - multi-agent logical data model suggestions
///
/// Reads a catalog of data sources, maps it onto banking and insurance
/// industry frameworks with a local LLM, and suggests the entities and
/// relationships of a logical data model. Markdown/JSON reports.
///
/// Examples:
///   modelmapper --data catalog.json
///   modelmapper --data catalog.json --model llama3.2:latest --min-confidence 0.6
///   modelmapper --data catalog.json --format json --strict
///   modelmapper --data catalog.json --dry-run
///   modelmapper --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON catalog document to analyze
    ///
    /// Holds the `datapedia`, `conceptual_model` and `schema` sources.
    #[arg(long, value_name = "FILE", required_unless_present = "init_config")]
    pub data: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .modelmapper.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ollama model to use for every stage
    ///
    /// Can also be set via MODELMAPPER_MODEL env var or .modelmapper.toml config.
    #[arg(short, long, env = "MODELMAPPER_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL", value_name = "URL")]
    pub ollama_url: Option<String>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Per-call model timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Hide suggestions below this confidence in the report (0.0 - 1.0)
    #[arg(long, value_name = "SCORE")]
    pub min_confidence: Option<f64>,

    /// Follow each reported relation with its inverse
    #[arg(long)]
    pub include_inverse: bool,

    /// Merge aggregated catalog entities into the entity suggestions
    #[arg(long)]
    pub merge_catalog: bool,

    /// Exit with code 2 when the suggestion batch fails validation
    #[arg(long)]
    pub strict: bool,

    /// Dry run: aggregate the catalog without calling the LLM
    ///
    /// Prints entity and relationship counts and exits.
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .modelmapper.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
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

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if let Some(min_confidence) = self.min_confidence {
            if !(0.0..=1.0).contains(&min_confidence) {
                return Err("Minimum confidence must be between 0.0 and 1.0".to_string());
            }
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match self.data {
            None => return Err("A data file is required (--data <FILE>)".to_string()),
            Some(ref path) if !path.is_file() => {
                return Err(format!("Data file does not exist: {}", path.display()));
            }
            Some(_) => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn make_args(data: &NamedTempFile) -> Args {
        Args {
            data: Some(data.path().to_path_buf()),
            config: None,
            model: None,
            ollama_url: None,
            output: None,
            format: OutputFormat::Markdown,
            temperature: None,
            timeout: None,
            min_confidence: None,
            include_inverse: false,
            merge_catalog: false,
            strict: false,
            dry_run: false,
            init_config: false,
            verbose: false,
            quiet: false,
        }
    }

    #[test]
    fn test_validation_accepts_defaults() {
        let data = NamedTempFile::new().unwrap();
        assert!(make_args(&data).validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let data = NamedTempFile::new().unwrap();
        let mut args = make_args(&data);
        args.ollama_url = Some("localhost:11434".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_ranges() {
        let data = NamedTempFile::new().unwrap();

        let mut args = make_args(&data);
        args.temperature = Some(1.5);
        assert!(args.validate().is_err());

        let mut args = make_args(&data);
        args.min_confidence = Some(-0.1);
        assert!(args.validate().is_err());

        let mut args = make_args(&data);
        args.timeout = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let data = NamedTempFile::new().unwrap();
        let mut args = make_args(&data);
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_data_file() {
        let data = NamedTempFile::new().unwrap();
        let mut args = make_args(&data);
        args.data = Some(PathBuf::from("/nonexistent/catalog.json"));
        assert!(args
            .validate()
            .unwrap_err()
            .contains("/nonexistent/catalog.json"));
    }

    #[test]
    fn test_init_config_skips_validation() {
        let data = NamedTempFile::new().unwrap();
        let mut args = make_args(&data);
        args.data = None;
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "modelmapper",
            "--data",
            "catalog.json",
            "--format",
            "json",
            "--min-confidence",
            "0.5",
            "--include-inverse",
            "--strict",
        ])
        .unwrap();

        assert_eq!(args.data, Some(PathBuf::from("catalog.json")));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.min_confidence, Some(0.5));
        assert!(args.include_inverse);
        assert!(args.strict);
        assert!(!args.merge_catalog);
    }
}
