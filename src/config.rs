//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.modelmapper.toml` files.

use crate::agent::{OllamaConfig, PipelineOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".modelmapper.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Pipeline behaviour.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "modelmapper_report.md".to_string()
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name used by every stage.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_timeout() -> u64 {
    300
}

/// Pipeline behaviour switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ask the model for a narrative analysis of the raw sources.
    #[serde(default = "default_true")]
    pub source_narrative: bool,

    /// Merge aggregated catalog entities into the entity suggestions.
    #[serde(default)]
    pub merge_catalog_entities: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_narrative: true,
            merge_catalog_entities: false,
        }
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Suggestions below this confidence are left out of the report.
    #[serde(default)]
    pub min_confidence: f64,

    /// Follow each relation with its inverse.
    #[serde(default)]
    pub include_inverse: bool,

    /// Include framework sections and the source narrative.
    #[serde(default = "default_true")]
    pub include_source_analyses: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
            include_inverse: false,
            include_source_analyses: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.modelmapper.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were explicitly given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(min_confidence) = args.min_confidence {
            self.report.min_confidence = min_confidence;
        }

        // Flags always override
        if args.include_inverse {
            self.report.include_inverse = true;
        }
        if args.merge_catalog {
            self.pipeline.merge_catalog_entities = true;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check values that the file or the command line may have set.
    pub fn validate(&self) -> Result<(), String> {
        let url = &self.model.ollama_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!(
                "model.ollama_url must start with 'http://' or 'https://' (got '{}')",
                url
            ));
        }

        if !(0.0..=1.0).contains(&self.model.temperature) {
            return Err("model.temperature must be between 0.0 and 1.0".to_string());
        }

        if self.model.timeout_seconds == 0 {
            return Err("model.timeout_seconds must be at least 1".to_string());
        }

        if !(0.0..=1.0).contains(&self.report.min_confidence) {
            return Err("report.min_confidence must be between 0.0 and 1.0".to_string());
        }

        Ok(())
    }

    /// Log level after merging: `--quiet` wins, then `verbose` from either
    /// the file or `--verbose`.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Settings for the Ollama client.
    pub fn ollama(&self) -> OllamaConfig {
        OllamaConfig {
            ollama_url: self.model.ollama_url.clone(),
            model_name: self.model.name.clone(),
            temperature: self.model.temperature,
            timeout_seconds: self.model.timeout_seconds,
        }
    }

    /// Options for the orchestrator.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            source_narrative: self.pipeline.source_narrative,
            merge_catalog_entities: self.pipeline.merge_catalog_entities,
            call_timeout: Duration::from_secs(self.model.timeout_seconds),
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
    use crate::cli::{Args, OutputFormat};
    use std::path::PathBuf;

    fn bare_args() -> Args {
        Args {
            data: Some(PathBuf::from("catalog.json")),
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
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "llama3.2:latest");
        assert_eq!(config.model.temperature, 0.3);
        assert_eq!(config.model.timeout_seconds, 300);
        assert_eq!(config.general.output, "modelmapper_report.md");
        assert!(config.pipeline.source_narrative);
        assert!(!config.pipeline.merge_catalog_entities);
        assert!(config.report.include_source_analyses);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"
verbose = true

[model]
name = "qwen2.5:14b"
temperature = 0.2

[pipeline]
source_narrative = false

[report]
min_confidence = 0.6
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert!(config.general.verbose);
        assert_eq!(config.model.name, "qwen2.5:14b");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.model.timeout_seconds, 300);
        assert!(!config.pipeline.source_narrative);
        assert_eq!(config.report.min_confidence, 0.6);
        assert!(!config.report.include_inverse);
    }

    #[test]
    fn test_merge_only_overrides_given_args() {
        let mut config: Config = toml::from_str("[model]\nname = \"from-file\"\ntemperature = 0.5").unwrap();
        config.merge_with_args(&bare_args());
        assert_eq!(config.model.name, "from-file");
        assert_eq!(config.model.temperature, 0.5);

        let mut args = bare_args();
        args.model = Some("from-cli".to_string());
        args.timeout = Some(42);
        args.merge_catalog = true;
        config.merge_with_args(&args);

        assert_eq!(config.model.name, "from-cli");
        assert_eq!(config.model.temperature, 0.5);
        assert!(config.pipeline.merge_catalog_entities);
        assert_eq!(config.pipeline_options().call_timeout, Duration::from_secs(42));
        assert_eq!(config.ollama().timeout_seconds, 42);
    }

    #[test]
    fn test_validate_rejects_zero_timeout_from_file() {
        let mut config: Config = toml::from_str("[model]\ntimeout_seconds = 0").unwrap();
        config.merge_with_args(&bare_args());
        assert!(config.validate().unwrap_err().contains("timeout_seconds"));

        let mut args = bare_args();
        args.timeout = Some(30);
        config.merge_with_args(&args);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_ranges() {
        assert!(Config::default().validate().is_ok());

        let config: Config = toml::from_str("[report]\nmin_confidence = 1.5").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[model]\nollama_url = \"localhost\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_uses_file_verbose() {
        let mut config: Config = toml::from_str("[general]\nverbose = true").unwrap();
        assert_eq!(config.log_level(false), tracing::Level::DEBUG);
        assert_eq!(config.log_level(true), tracing::Level::ERROR);

        config.general.verbose = false;
        assert_eq!(config.log_level(false), tracing::Level::INFO);

        let mut args = bare_args();
        args.verbose = true;
        config.merge_with_args(&args);
        assert_eq!(config.log_level(false), tracing::Level::DEBUG);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(dir.path().join(CONFIG_FILE), "[report]\ninclude_inverse = true\n").unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert!(config.report.include_inverse);

        std::fs::write(dir.path().join(CONFIG_FILE), "[report\n").unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[pipeline]"));
        assert!(toml_str.contains("[report]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.name, "llama3.2:latest");
    }
}
