//! ModelMapper - multi-agent logical data model suggestions
//!
//! A CLI tool that aggregates a catalog of data sources, maps it onto
//! banking and insurance industry frameworks with Ollama, and suggests
//! the entities and relationships of a logical data model.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, data source, model call, etc.)
//!   2 - Suggestion batch failed validation and --strict was set

mod agent;
mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod sources;

use agent::{LanguageModel, OllamaClient, Orchestrator, Stage};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Report, ReportMetadata};
use report::RenderOptions;
use sources::{DataSource, JsonFileSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
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

    // Config comes before logging: `[general] verbose` picks the level.
    let (mut config, config_origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    init_logging(config.log_level(args.quiet));

    info!("ModelMapper v{}", env!("CARGO_PKG_VERSION"));
    match config_origin {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }
    debug!("Arguments: {:?}", args);

    match run_pipeline(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .modelmapper.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the model, pipeline and report.");
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
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete pipeline. Returns exit code (0 or 2).
async fn run_pipeline(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let data_path = args
        .data
        .clone()
        .context("A data file is required (--data <FILE>)")?;
    let source: Arc<dyn DataSource> = Arc::new(JsonFileSource::new(data_path.clone()));

    if args.dry_run {
        return handle_dry_run(&*source, &data_path).await;
    }

    println!("🤖 Initializing pipeline...");
    println!("   Data: {}", data_path.display());
    println!("   Model: {}", config.model.name);
    println!("   Ollama: {}", config.model.ollama_url);
    println!("   Timeout per call: {}s", config.model.timeout_seconds);

    let client = OllamaClient::new(config.ollama()).context("Failed to build model client")?;
    let model: Arc<dyn LanguageModel> = Arc::new(client);
    let model_name = model.model_name().to_string();

    let spinner = (!args.quiet).then(stage_spinner);

    let mut orchestrator = Orchestrator::new(source, model, config.pipeline_options());
    if let Some(ref pb) = spinner {
        let pb = pb.clone();
        orchestrator = orchestrator.with_observer(Arc::new(move |stage: Stage| {
            pb.set_message(format!("Stage {}", stage));
        }));
    }

    println!("\n🔬 Running analysis stages...");
    let result = orchestrator.run().await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let bundle = result?;

    for violation in &bundle.validation.violations {
        warn!("Validation: {}", violation);
    }

    println!("\n📝 Generating report...");

    let report = Report {
        metadata: ReportMetadata {
            data_file: data_path.display().to_string(),
            generated_at: Utc::now(),
            model_used: model_name,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        bundle,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => {
            report::generate_markdown_report(&report, &RenderOptions::from(&config.report))
        }
    };

    let output_path = PathBuf::from(&config.general.output);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    let bundle = &report.bundle;
    println!("\n📊 Run Summary:");
    println!("   Entity suggestions: {}", bundle.entity_suggestions.len());
    println!("   Relation suggestions: {}", bundle.relation_suggestions.len());
    println!(
        "   Validation: {}",
        if bundle.validation.valid {
            "passed".to_string()
        } else {
            format!("{} violations", bundle.validation.violations.len())
        }
    );
    println!("   Duration: {:.1}s", report.metadata.duration_seconds);
    println!("\n✅ Done! Report saved to: {}", output_path.display());

    if args.strict && !bundle.validation.valid {
        eprintln!("\n⛔ Suggestion batch failed validation. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Spinner that shows the current pipeline stage.
fn stage_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("Stage {}", Stage::Init));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Handle --dry-run: aggregate the catalog, print counts, exit.
async fn handle_dry_run(source: &dyn DataSource, data_path: &Path) -> Result<i32> {
    println!("\n🔍 Dry run: aggregating {} (no LLM call)...\n", data_path.display());

    let data = source
        .get_data()
        .await
        .with_context(|| format!("Failed to load {}", data_path.display()))?;
    let catalog = analysis::aggregate(data);

    println!("   Entities: {}", catalog.entities.len());
    for (kind, count) in analysis::source_distribution(&catalog) {
        println!("     📄 {}: {}", kind, count);
    }
    println!("   Relationships: {}", catalog.relationships.len());

    println!("\n✅ Dry run complete. No LLM calls were made.");
    Ok(0)
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go to stderr. Returns the
/// path the config was read from, if any.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, Some(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, Some(PathBuf::from(CONFIG_FILE)))),
        Ok(None) => Ok((Config::default(), None)),
        Err(e) => {
            eprintln!("⚠️  Failed to load config: {:#}", e);
            Ok((Config::default(), None))
        }
    }
}
