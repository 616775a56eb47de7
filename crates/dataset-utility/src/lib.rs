//! Dataset Utility Library
//!
//! Scores how useful a tabular dataset is, and for what, built with Rust and
//! Polars.
//!
//! # Overview
//!
//! One analysis runs in five stages:
//!
//! - **Foundational analyzers**: completeness, duplicates, type consistency,
//!   outliers, class balance, correlation, baseline ML, feature importance and
//!   class separability, each producing a 0-100 score and typed metrics
//! - **Characteristics**: analyzer metrics flattened into one named record
//! - **Persona tagging**: weighted predicate rules tag the dataset with use-case
//!   personas such as `#AnomalyDetection` or `#ImbalancedLearning`
//! - **Contextual scoring**: each relevant persona lens rescores the dataset
//! - **Synthesis**: `0.7 x integrity + 0.3 x best lens score`, graded, with an
//!   executive summary, recommendations and readiness flags
//!
//! Optional declarative [`ValidationRules`] run alongside the analysis.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use dataset_utility::{AnalysisConfig, AnalysisDepth, Pipeline};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .try_into_reader_with_file_path(Some("data.csv".into()))?
//!     .finish()?;
//!
//! let config = AnalysisConfig::builder()
//!     .analysis_depth(AnalysisDepth::Complete)
//!     .target_column("label")
//!     .build()?;
//!
//! let report = Pipeline::builder().config(config).build()?.analyze_frame(df)?;
//!
//! println!("Utility: {:.1}/100", report.overall_utility_score());
//! for tag in report.persona_tags() {
//!     println!("{} ({:.0}%)", tag.persona, tag.confidence * 100.0);
//! }
//! ```
//!
//! # Custom catalogs
//!
//! Persona rules and scoring lenses are data. Load a [`ScoringCatalog`] from
//! JSON, validate it once and share it across pipelines:
//!
//! ```rust,ignore
//! let catalog = Arc::new(ScoringCatalog::from_json(&std::fs::read_to_string("catalog.json")?)?);
//! let pipeline = Pipeline::builder().catalog(catalog).build()?;
//! ```
//!
//! # Progress Reporting
//!
//! ```rust,ignore
//! use dataset_utility::{CancellationToken, Pipeline, UtilityError};
//!
//! let token = CancellationToken::new();
//! let pipeline = Pipeline::builder()
//!     .cancellation_token(token.clone())
//!     .on_progress(|update| println!("[{:?}] {}", update.stage, update.message))
//!     .build()?;
//!
//! match pipeline.analyze_frame(df) {
//!     Ok(report) => println!("{}", report.synthesis.executive_summary),
//!     Err(UtilityError::Cancelled) => println!("Cancelled"),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```

pub mod analyzers;
pub mod catalog;
pub mod characteristics;
pub mod config;
pub mod dataset;
pub mod error;
pub mod ml;
pub mod personas;
pub mod pipeline;
pub mod reporting;
pub mod scoring;
pub mod synthesis;
pub mod types;
pub mod utils;
pub mod validation;

pub use analyzers::{AnalysisContext, Analyzer, AnalyzerBank, AnalyzerMetrics, AnalyzerOutput};
pub use catalog::ScoringCatalog;
pub use characteristics::{Characteristic, CharacteristicValue, Characteristics};
pub use config::{
    AnalysisConfig, AnalysisConfigBuilder, AnalysisDepth, ConfigValidationError, ExpectedType,
    Sensitivity,
};
pub use dataset::{ColumnInfo, ColumnKind, Dataset, DatasetOverview};
pub use error::{Result as UtilityResult, ResultExt, UtilityError};
pub use personas::{Persona, PersonaAnalysis, PersonaEngine, PersonaRule, PersonaTag, Predicate};
pub use pipeline::{
    AnalysisStage, AnalyzerExecutor, CancellationToken, ClosureProgressReporter, Pipeline,
    PipelineBuilder, ProgressReporter, ProgressUpdate,
};
pub use reporting::{ReportWriter, UtilityReport};
pub use scoring::{
    ContextualScore, ContextualScorer, ContextualScoring, LensKind, PerformanceTier, ScoringLens,
};
pub use synthesis::{Readiness, SynthesisResult, UtilityGrade, synthesize};
pub use types::{AnalysisReport, AnalyzerKind, AnalyzerResult, REPORT_SCHEMA_VERSION};
pub use validation::{RowPredicate, ValidationReport, ValidationRules};

use polars::prelude::DataFrame;

/// Analyze a frame with the standard catalog.
///
/// Shorthand for building a [`Pipeline`] with only a target and a depth.
pub fn analyze(
    frame: DataFrame,
    target_column: Option<&str>,
    depth: AnalysisDepth,
) -> error::Result<AnalysisReport> {
    let mut builder = AnalysisConfig::builder().analysis_depth(depth);
    if let Some(target) = target_column {
        builder = builder.target_column(target);
    }
    let config = builder
        .build()
        .map_err(|e| UtilityError::InvalidConfig(e.to_string()))?;
    let pipeline = Pipeline::builder()
        .config(config)
        .build()
        .map_err(|e| UtilityError::InvalidConfig(e.to_string()))?;
    pipeline.analyze_frame(frame)
}
