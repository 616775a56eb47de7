//! CLI entry point for the dataset utility analyzer.

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use dataset_utility::{
    AnalysisConfig, AnalysisDepth, AnalysisReport, Pipeline, ReportWriter, ScoringCatalog,
    Sensitivity, UtilityReport, ValidationRules,
};
use dotenv::dotenv;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDepth {
    /// Completeness, duplicates and type consistency only
    Basic,
    /// Adds outliers, class balance and correlation
    Standard,
    /// Adds baseline ML, feature importance and separability
    Complete,
}

impl From<CliDepth> for AnalysisDepth {
    fn from(cli: CliDepth) -> Self {
        match cli {
            CliDepth::Basic => AnalysisDepth::Basic,
            CliDepth::Standard => AnalysisDepth::Standard,
            CliDepth::Complete => AnalysisDepth::Complete,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliSensitivity {
    /// z-score 3.5, IQR multiplier 2.0
    Low,
    /// z-score 3.0, IQR multiplier 1.5
    Medium,
    /// z-score 2.5, IQR multiplier 1.0
    High,
}

impl From<CliSensitivity> for Sensitivity {
    fn from(cli: CliSensitivity) -> Self {
        match cli {
            CliSensitivity::Low => Sensitivity::Low,
            CliSensitivity::Medium => Sensitivity::Medium,
            CliSensitivity::High => Sensitivity::High,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Dataset quality scoring and persona synthesis",
    long_about = "Scores a CSV dataset's integrity, tags the use-case personas it fits and \
                  synthesizes an overall utility score.\n\n\
                  EXAMPLES:\n  \
                  # Full analysis with target auto-detection\n  \
                  dataset-utility -i data.csv\n\n  \
                  # Explicit target, statistical analyzers only\n  \
                  dataset-utility -i data.csv --target label --depth standard\n\n  \
                  # Validation rules and a JSON report file\n  \
                  dataset-utility -i data.csv --rules rules.json --emit-report -o reports/\n\n  \
                  # Machine-readable output\n  \
                  dataset-utility -i data.csv --json | jq .synthesis.overall_utility_score"
)]
struct Args {
    /// Path to the CSV file to analyze
    #[arg(short, long)]
    input: String,

    /// Target column for supervised analyzers
    ///
    /// If not specified, the target is auto-detected from common names or
    /// the last column
    #[arg(short, long)]
    target: Option<String>,

    /// Which analyzers run
    #[arg(long, value_enum, default_value = "complete")]
    depth: CliDepth,

    /// Outlier detection sensitivity
    #[arg(long, value_enum, default_value = "medium")]
    sensitivity: CliSensitivity,

    /// Absolute correlation considered high (0.0 - 1.0]
    #[arg(long, default_value = "0.8")]
    correlation_threshold: f64,

    /// JSON file with declarative validation rules
    #[arg(long)]
    rules: Option<PathBuf>,

    /// JSON file with a custom persona and lens catalog
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Run analyzers one at a time instead of on the thread pool
    #[arg(long)]
    sequential: bool,

    /// Output JSON to stdout instead of a human-readable summary
    ///
    /// Disables all logs so stdout contains only the report.
    #[arg(long)]
    json: bool,

    /// Write the JSON report to the output directory
    ///
    /// Saved as <input_name>_utility_<timestamp>.json
    #[arg(short = 'r', long)]
    emit_report: bool,

    /// Output directory for --emit-report
    #[arg(short, long, default_value = "./outputs")]
    output: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the final result)
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber.
///
/// Logging stays off with `--json` so stdout carries only the report.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);
    dotenv().ok();

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    let config = build_config(&args)?;
    let pipeline = build_pipeline(&args, config)?;

    info!("Loading dataset from: {}", args.input);
    let data = load_csv_with_fallbacks(&args.input)?;
    info!("Dataset loaded: {:?}", data.shape());

    info!("{}", "=".repeat(80));
    info!("Starting dataset utility analysis...");
    info!("{}", "=".repeat(80));

    match pipeline.analyze_frame(data) {
        Ok(report) => handle_output(report, &args),
        Err(e) => {
            error!("Analysis failed: {}", e);
            Err(anyhow!("Analysis failed: {}", e))
        }
    }
}

fn build_config(args: &Args) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .analysis_depth(args.depth.into())
        .outlier_sensitivity(args.sensitivity.into())
        .correlation_threshold(args.correlation_threshold)
        .parallel(!args.sequential);

    if let Some(ref target) = args.target {
        builder = builder.target_column(target);
    }

    if let Some(ref path) = args.rules {
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Could not read rules file {}: {}", path.display(), e))?;
        builder = builder.validation_rules(ValidationRules::from_json(&json)?);
        info!("Loaded validation rules from {}", path.display());
    }

    Ok(builder.build()?)
}

fn build_pipeline(args: &Args, config: AnalysisConfig) -> Result<Pipeline> {
    let mut builder = Pipeline::builder().config(config);

    if let Some(ref path) = args.catalog {
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Could not read catalog file {}: {}", path.display(), e))?;
        builder = builder.catalog(Arc::new(ScoringCatalog::from_json(&json)?));
        info!("Using scoring catalog from {}", path.display());
    }

    if !args.quiet {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }

    Ok(builder.build()?)
}

/// Output behavior:
/// - Default: human-readable summary on stdout
/// - `--json`: JSON on stdout only
/// - `--emit-report`: JSON report file, plus the summary
fn handle_output(analysis: AnalysisReport, args: &Args) -> Result<()> {
    let report = UtilityReport::new(&args.input, analysis);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if args.emit_report {
        let writer = ReportWriter::new(PathBuf::from(&args.output));
        let path = writer.write(&report, &extract_file_stem(&args.input))?;
        info!("Report written to: {}", path.display());
    }

    print_human_readable_summary(&report);

    if report.analysis.success {
        Ok(())
    } else {
        Err(anyhow!("Analysis aborted: {}", report.analysis.errors.join("; ")))
    }
}

fn extract_file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string()
}

/// Print the report for a terminal.
///
/// Uses `println!` rather than tracing: this is the command's output and
/// must show regardless of log level.
fn print_human_readable_summary(report: &UtilityReport) {
    let analysis = &report.analysis;
    let synthesis = &analysis.synthesis;
    let overview = &analysis.dataset_overview;

    println!();
    println!("{}", "=".repeat(80));
    println!("DATASET UTILITY REPORT");
    println!("{}", "=".repeat(80));
    println!();
    println!(
        "Input: {} ({} rows x {} columns)",
        report.input_file, overview.rows, overview.columns
    );
    if let Some(ref target) = analysis.target_column {
        println!("Target Column: {}", target);
    }
    println!("Depth: {}", analysis.analysis_depth.as_str());
    println!("Duration: {}ms", analysis.duration_ms);
    println!();

    println!(
        "Overall Utility: {:.1}/100  Grade {} ({})",
        synthesis.overall_utility_score, synthesis.grade.grade, synthesis.grade.description
    );
    println!("Data Integrity:  {:.1}/100", synthesis.data_integrity_score);
    if !synthesis.synthesis_formula.is_empty() {
        println!("Formula:         {}", synthesis.synthesis_formula);
    }
    println!();

    println!("ANALYZERS");
    println!("{}", "-".repeat(40));
    for result in analysis.raw_analyzer_outputs.values() {
        match result.score() {
            Some(score) => println!("  {:<26} {:>6.1}", result.analyzer.display_name(), score),
            None => println!(
                "  {:<26} {:>6}  {}",
                result.analyzer.display_name(),
                "-",
                result.error.as_deref().unwrap_or("")
            ),
        }
    }
    println!();

    let tags = analysis.persona_tags();
    if !tags.is_empty() {
        println!("PERSONAS");
        println!("{}", "-".repeat(40));
        for tag in tags {
            println!("  {:<26} {:>5.0}%", tag.persona.to_string(), tag.confidence * 100.0);
        }
        println!();
    }

    if let Some(ref scoring) = analysis.contextual_scoring {
        println!("CONTEXTUAL SCORES");
        println!("{}", "-".repeat(40));
        for score in &scoring.scores {
            println!("  {:<26} {:>6.1}", score.lens.display_name(), score.score);
        }
        println!();
    }

    println!("SUMMARY");
    println!("{}", "-".repeat(40));
    println!("  {}", synthesis.executive_summary);
    println!();

    if !synthesis.recommendations.is_empty() {
        println!("Recommendations:");
        for rec in &synthesis.recommendations {
            println!("  - {}", rec);
        }
        println!();
    }

    if !synthesis.next_steps.is_empty() {
        println!("Next Steps:");
        for step in &synthesis.next_steps {
            println!("  - {}", step);
        }
        println!();
    }

    if let Some(ref validation) = analysis.validation {
        println!(
            "Validation: {}/{} rule categories passed ({})",
            validation.rules_passed,
            validation.rules_executed,
            if validation.overall_valid { "valid" } else { "invalid" }
        );
        for err in &validation.errors {
            println!("  x {}", err);
        }
        println!();
    }

    if !analysis.errors.is_empty() {
        println!("Errors:");
        for err in &analysis.errors {
            println!("  x {}", err);
        }
        println!();
    }

    if !analysis.warnings.is_empty() {
        println!("Warnings:");
        for warning in &analysis.warnings {
            println!("  ! {}", warning);
        }
        println!();
    }

    println!("Use --json for machine-readable output");
    println!("Use --emit-report to save the JSON report");
    println!("{}", "=".repeat(80));
}

/// Load a CSV, retrying with looser parsing when the first attempt fails.
fn load_csv_with_fallbacks(path: &str) -> Result<DataFrame> {
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Standard loading failed: {}", e),
    }

    // Full-file schema inference handles columns whose type changes late.
    match CsvReadOptions::default()
        .with_infer_schema_length(None)
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Full schema inference failed: {}", e),
    }

    let content = std::fs::read_to_string(path)?;
    let cleaned = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .into_reader_with_file_handle(std::io::Cursor::new(cleaned))
        .finish()
        .map_err(|e| anyhow!("Could not parse {} as CSV: {}", path, e))
}
