//! The analysis pipeline and its builder.
//!
//! One [`Pipeline`] is an immutable bundle of configuration, scoring catalog
//! and analyzer bank; [`Pipeline::analyze`] can be called any number of
//! times, from any thread, on different datasets.

use crate::analyzers::{AnalysisContext, AnalyzerBank};
use crate::catalog::ScoringCatalog;
use crate::characteristics::Characteristics;
use crate::config::{AnalysisConfig, ConfigValidationError};
use crate::dataset::{Dataset, DatasetOverview};
use crate::error::{Result, UtilityError};
use crate::personas::{PersonaAnalysis, PersonaEngine};
use crate::pipeline::executor::AnalyzerExecutor;
use crate::pipeline::progress::{
    AnalysisStage, CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
use crate::scoring::{ContextualScorer, ContextualScoring};
use crate::synthesis::{SynthesisResult, synthesize};
use crate::types::{AnalysisReport, AnalyzerResult, REPORT_SCHEMA_VERSION};
use crate::validation::ValidationReport;
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// The dataset utility pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use dataset_utility::{AnalysisConfig, AnalysisDepth, Pipeline};
///
/// let report = Pipeline::builder()
///     .config(AnalysisConfig::builder().analysis_depth(AnalysisDepth::Standard).build()?)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .analyze_frame(df)?;
///
/// println!("Utility: {:.1}", report.overall_utility_score());
/// ```
pub struct Pipeline {
    config: AnalysisConfig,
    catalog: Arc<ScoringCatalog>,
    bank: AnalyzerBank,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ScoringCatalog {
        &self.catalog
    }

    /// Wrap a frame and analyze it.
    pub fn analyze_frame(&self, frame: DataFrame) -> Result<AnalysisReport> {
        let dataset = Dataset::new(frame)?;
        self.analyze(&dataset)
    }

    /// Run every stage against `dataset`.
    ///
    /// An aborted analysis (too many analyzer failures) is still `Ok`: the
    /// report has `success = false`, zero scores and the reason in `errors`.
    ///
    /// # Errors
    ///
    /// - `UtilityError::Cancelled` when the cancellation token fires.
    /// - `UtilityError::ColumnNotFound` when the configured target is absent.
    pub fn analyze(&self, dataset: &Dataset) -> Result<AnalysisReport> {
        match self.analyze_internal(dataset) {
            Ok(report) => {
                let message = if report.success {
                    format!(
                        "Analysis complete: utility {:.1}/100",
                        report.overall_utility_score()
                    )
                } else {
                    "Analysis aborted".to_string()
                };
                self.report_progress(ProgressUpdate::complete(message));
                Ok(report)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("Analysis error: {}", e);
                Err(e)
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(UtilityError::Cancelled);
        }
        Ok(())
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn stage(&self, stage: AnalysisStage, message: impl Into<String>) -> Result<()> {
        self.check_cancelled()?;
        self.report_progress(ProgressUpdate::new(stage, 0.0, message));
        Ok(())
    }

    fn analyze_internal(&self, dataset: &Dataset) -> Result<AnalysisReport> {
        let start_time = Instant::now();

        info!(
            "Starting {} analysis of {} rows x {} columns",
            self.config.analysis_depth.as_str(),
            dataset.height(),
            dataset.width()
        );
        self.stage(AnalysisStage::Initializing, "Resolving target column...")?;
        let target = dataset.identify_target(self.config.target_column.as_deref())?;
        match &target {
            Some(t) => info!("Target column: {}", t),
            None => info!("No target column identified; supervised analyzers will be skipped"),
        }

        self.stage(AnalysisStage::Profiling, "Profiling dataset...")?;
        let overview = dataset.overview();
        debug!(
            "Overview: {} numeric columns, {} of {} cells missing",
            overview.numeric_columns, overview.missing_cells, overview.total_cells
        );

        self.stage(
            AnalysisStage::Analyzing,
            format!("Running {} analyzers...", self.bank.len()),
        )?;
        let ctx = AnalysisContext::new(dataset, target.as_deref(), &self.config);
        let results = AnalyzerExecutor::new(&self.bank, &self.cancellation_token)
            .parallel(self.config.parallel)
            .progress(self.progress_reporter.as_deref())
            .run(&ctx)?;

        let mut draft = ReportDraft::new(&results);

        if let Some(abort) = abort_reason(&results) {
            warn!("{}", abort);
            draft.errors.push(abort.to_string());
            let validation = self.validate(dataset)?;
            return Ok(draft.finish(
                self,
                target,
                overview,
                start_time,
                AnalysisOutcome::Aborted(SynthesisResult::failed(&abort.to_string())),
                validation,
            ));
        }

        self.stage(AnalysisStage::Characterizing, "Extracting dataset characteristics...")?;
        let characteristics = Characteristics::extract(&results, &overview);

        self.stage(AnalysisStage::PersonaTagging, "Tagging personas...")?;
        let personas = PersonaEngine::new(&self.catalog.personas).tag(&characteristics);
        info!(
            "Primary persona: {} ({:.0}% confidence)",
            personas.primary_persona,
            personas.primary_confidence() * 100.0
        );

        self.stage(AnalysisStage::ContextualScoring, "Scoring relevant lenses...")?;
        let scoring = ContextualScorer::new(&self.catalog).score(&characteristics, &personas);

        self.stage(AnalysisStage::Synthesis, "Synthesizing utility score...")?;
        let synthesis = synthesize(&results, &personas, &scoring);
        info!(
            "Overall utility {:.1} (integrity {:.1}, grade {})",
            synthesis.overall_utility_score, synthesis.data_integrity_score, synthesis.grade.grade
        );

        let validation = self.validate(dataset)?;

        Ok(draft.finish(
            self,
            target,
            overview,
            start_time,
            AnalysisOutcome::Completed {
                characteristics,
                personas,
                scoring,
                synthesis,
            },
            validation,
        ))
    }

    fn validate(&self, dataset: &Dataset) -> Result<Option<ValidationReport>> {
        let Some(rules) = &self.config.validation_rules else {
            return Ok(None);
        };
        self.stage(AnalysisStage::Validation, "Evaluating validation rules...")?;
        let report = rules.execute(dataset);
        info!(
            "Validation: {}/{} rule categories passed",
            report.rules_passed, report.rules_executed
        );
        Ok(Some(report))
    }
}

/// Abort when more than half of the applicable analyzers failed, or when
/// none could run at all.
///
/// Not-applicable results (no numeric columns, no target, too many rows) are
/// excluded from the ratio.
fn abort_reason(results: &[AnalyzerResult]) -> Option<UtilityError> {
    let applicable = results.iter().filter(|r| r.applicable).count();
    let failed_applicable = results.iter().filter(|r| r.applicable && !r.success).count();
    if applicable > 0 && failed_applicable * 2 <= applicable {
        return None;
    }
    Some(UtilityError::PipelineAborted {
        failed: results.iter().filter(|r| !r.success).count(),
        total: results.len(),
    })
}

enum AnalysisOutcome {
    Completed {
        characteristics: Characteristics,
        personas: PersonaAnalysis,
        scoring: ContextualScoring,
        synthesis: SynthesisResult,
    },
    Aborted(SynthesisResult),
}

/// Analyzer outputs plus the errors and warnings they imply.
struct ReportDraft {
    raw: BTreeMap<String, AnalyzerResult>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ReportDraft {
    fn new(results: &[AnalyzerResult]) -> Self {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for result in results.iter().filter(|r| !r.success) {
            let reason = result.error.as_deref().unwrap_or("unknown reason");
            let name = result.analyzer.display_name();
            if result.applicable {
                errors.push(format!("{} failed: {}", name, reason));
            } else {
                warnings.push(format!("{} not applicable: {}", name, reason));
            }
        }
        Self {
            raw: results
                .iter()
                .map(|r| (r.analyzer.as_str().to_string(), r.clone()))
                .collect(),
            errors,
            warnings,
        }
    }

    fn finish(
        self,
        pipeline: &Pipeline,
        target: Option<String>,
        overview: DatasetOverview,
        start_time: Instant,
        outcome: AnalysisOutcome,
        validation: Option<ValidationReport>,
    ) -> AnalysisReport {
        let (success, characteristics, personas, scoring, synthesis) = match outcome {
            AnalysisOutcome::Completed {
                characteristics,
                personas,
                scoring,
                synthesis,
            } => (true, Some(characteristics), Some(personas), Some(scoring), synthesis),
            AnalysisOutcome::Aborted(synthesis) => (false, None, None, None, synthesis),
        };

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!("Analysis finished in {} ms", duration_ms);

        AnalysisReport {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            success,
            analysis_depth: pipeline.config.analysis_depth,
            target_column: target,
            dataset_overview: overview,
            duration_ms,
            raw_analyzer_outputs: self.raw,
            characteristics,
            persona_analysis: personas,
            contextual_scoring: scoring,
            synthesis,
            validation,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

/// Builder for creating a [`Pipeline`] with custom configuration.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<AnalysisConfig>,
    catalog: Option<Arc<ScoringCatalog>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

impl PipelineBuilder {
    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom persona and lens catalog instead of the standard one.
    ///
    /// The catalog is validated again by [`build`](Self::build).
    pub fn catalog(mut self, catalog: Arc<ScoringCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// The callback may be invoked from rayon worker threads while analyzers
    /// run.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a token for cancelling running analyses from another thread.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let catalog = match self.catalog {
            Some(catalog) => {
                catalog.validate()?;
                catalog
            }
            None => ScoringCatalog::shared(),
        };

        let bank = AnalyzerBank::for_depth(config.analysis_depth);
        debug!("Pipeline built with analyzers {:?}", bank.kinds());

        Ok(Pipeline {
            config,
            catalog,
            bank,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisDepth;
    use crate::types::AnalyzerKind;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn frame() -> DataFrame {
        df![
            "x" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            "y" => [2.0, 1.0, 4.0, 3.0, 6.0, 5.0, 8.0, 7.0],
            "city" => ["a", "b", "c", "d", "a", "b", "c", "d"],
        ]
        .unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let pipeline = Pipeline::builder().build().unwrap();
        assert_eq!(pipeline.config().analysis_depth, AnalysisDepth::Complete);
        assert_eq!(pipeline.bank.len(), AnalyzerKind::ALL.len());
        assert!(!pipeline.cancellation_token.is_cancelled());
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = AnalysisConfig::default();
        config.correlation_threshold = 1.5;
        assert!(Pipeline::builder().config(config).build().is_err());
    }

    #[test]
    fn test_builder_rejects_invalid_catalog() {
        let mut catalog = ScoringCatalog::standard();
        catalog.lenses.clear();
        let result = Pipeline::builder().catalog(Arc::new(catalog)).build();
        assert!(matches!(result, Err(ConfigValidationError::EmptyCatalog(_))));
    }

    #[test]
    fn test_abort_reason() {
        let ok = AnalyzerResult::from_output(
            AnalyzerKind::Completeness,
            crate::analyzers::AnalyzerOutput::new(
                90.0,
                crate::analyzers::AnalyzerMetrics::Duplicates(Default::default()),
            ),
        );
        let failed = AnalyzerResult::failed(AnalyzerKind::Duplicates, "boom");
        let skipped = AnalyzerResult::not_applicable(AnalyzerKind::Outliers, "no numeric columns");

        assert!(abort_reason(&[ok.clone(), failed.clone(), skipped.clone()]).is_none());
        assert!(abort_reason(&[ok, failed.clone(), failed.clone()]).is_some());
        match abort_reason(&[skipped]) {
            Some(UtilityError::PipelineAborted { failed, total }) => {
                assert_eq!((failed, total), (1, 1))
            }
            other => panic!("expected abort, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_explicit_target_is_an_error() {
        let config = AnalysisConfig::builder().target_column("nope").build().unwrap();
        let pipeline = Pipeline::builder().config(config).build().unwrap();
        let err = pipeline.analyze_frame(frame()).unwrap_err();
        assert!(matches!(err, UtilityError::ColumnNotFound(c) if c == "nope"));
    }

    #[test]
    fn test_cancelled_pipeline_reports_cancelled_stage() {
        let token = CancellationToken::new();
        token.cancel();
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = stages.clone();
        let pipeline = Pipeline::builder()
            .cancellation_token(token)
            .on_progress(move |u| sink.lock().unwrap().push(u.stage))
            .build()
            .unwrap();

        let err = pipeline.analyze_frame(frame()).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(*stages.lock().unwrap(), vec![AnalysisStage::Cancelled]);
    }

    #[test]
    fn test_basic_analysis_runs_every_stage() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = stages.clone();
        let config = AnalysisConfig::builder()
            .analysis_depth(AnalysisDepth::Basic)
            .build()
            .unwrap();
        let pipeline = Pipeline::builder()
            .config(config)
            .on_progress(move |u| sink.lock().unwrap().push(u.stage))
            .build()
            .unwrap();

        let report = pipeline.analyze_frame(frame()).unwrap();
        assert!(report.success);
        assert_eq!(report.raw_analyzer_outputs.len(), 3);
        assert_eq!(report.schema_version, REPORT_SCHEMA_VERSION);

        let stages = stages.lock().unwrap();
        assert_eq!(stages.first(), Some(&AnalysisStage::Initializing));
        assert_eq!(stages.last(), Some(&AnalysisStage::Complete));
        assert!(stages.contains(&AnalysisStage::PersonaTagging));
        assert!(!stages.contains(&AnalysisStage::Validation));
    }
}
