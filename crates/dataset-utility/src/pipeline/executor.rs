//! Analyzer execution.
//!
//! Runs every analyzer of a bank against one dataset, either on the rayon
//! pool or sequentially, and turns each outcome into an [`AnalyzerResult`].
//! Analyzer errors and panics never escape: only cancellation does.

use crate::analyzers::{AnalysisContext, Analyzer, AnalyzerBank};
use crate::error::{Result, UtilityError};
use crate::pipeline::progress::{AnalysisStage, CancellationToken, ProgressReporter, ProgressUpdate};
use crate::types::AnalyzerResult;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Executes an [`AnalyzerBank`] against one request's context.
pub struct AnalyzerExecutor<'a> {
    bank: &'a AnalyzerBank,
    parallel: bool,
    cancellation_token: &'a CancellationToken,
    progress: Option<&'a dyn ProgressReporter>,
}

impl<'a> AnalyzerExecutor<'a> {
    pub fn new(bank: &'a AnalyzerBank, cancellation_token: &'a CancellationToken) -> Self {
        Self {
            bank,
            parallel: true,
            cancellation_token,
            progress: None,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn progress(mut self, reporter: Option<&'a dyn ProgressReporter>) -> Self {
        self.progress = reporter;
        self
    }

    /// One result per analyzer, in bank order.
    ///
    /// # Errors
    ///
    /// Returns `UtilityError::Cancelled` if the token is set before the last
    /// analyzer starts; every partial result is dropped.
    pub fn run(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<AnalyzerResult>> {
        let analyzers: Vec<&dyn Analyzer> = self.bank.iter().collect();
        let total = analyzers.len();
        let finished = AtomicUsize::new(0);

        let run_one = |analyzer: &dyn Analyzer| -> Result<AnalyzerResult> {
            if self.cancellation_token.is_cancelled() {
                return Err(UtilityError::Cancelled);
            }
            let result = execute(analyzer, ctx);
            let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(reporter) = self.progress {
                reporter.report(ProgressUpdate::with_items(
                    AnalysisStage::Analyzing,
                    format!("Analyzer: {}", analyzer.kind()),
                    done,
                    total,
                    format!("{} finished", analyzer.kind().display_name()),
                ));
            }
            Ok(result)
        };

        let results = if self.parallel {
            analyzers
                .par_iter()
                .map(|a| run_one(*a))
                .collect::<Result<Vec<_>>>()?
        } else {
            analyzers
                .iter()
                .map(|a| run_one(*a))
                .collect::<Result<Vec<_>>>()?
        };

        // A cancel that lands while the last analyzers run still discards them.
        if self.cancellation_token.is_cancelled() {
            return Err(UtilityError::Cancelled);
        }
        Ok(results)
    }
}

/// Run one analyzer, applying the target and large-dataset skips.
fn execute(analyzer: &dyn Analyzer, ctx: &AnalysisContext<'_>) -> AnalyzerResult {
    let kind = analyzer.kind();
    let rows = ctx.dataset.height();
    let limit = ctx.config.large_dataset_rows;

    if kind.requires_target() && ctx.target.is_none() {
        debug!("{} not applicable: no target column", kind);
        return AnalyzerResult::not_applicable(kind, "No target column identified");
    }

    if kind.is_expensive() && rows > limit {
        warn!(
            "Skipping {}: {} rows exceeds the {} row limit",
            kind, rows, limit
        );
        return AnalyzerResult::not_applicable(
            kind,
            format!(
                "Skipped: dataset has {} rows, above the {} row limit for model-based analysis",
                rows, limit
            ),
        );
    }

    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| analyzer.run(ctx))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!("{} panicked: {}", kind, message);
            return AnalyzerResult::failed(kind, format!("Analyzer panicked: {}", message));
        }
    };

    match outcome {
        Ok(output) => {
            debug!("{} scored {:.1}", kind, output.score);
            AnalyzerResult::from_output(kind, output)
        }
        Err(e @ UtilityError::InsufficientData(_)) => {
            debug!("{} not applicable: {}", kind, e.reason());
            AnalyzerResult::from_error(kind, &e)
        }
        Err(e) => {
            warn!("{} failed: {}", kind, e);
            AnalyzerResult::from_error(kind, &e)
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, AnalysisDepth};
    use crate::dataset::Dataset;
    use crate::pipeline::progress::ClosureProgressReporter;
    use crate::analyzers::AnalyzerOutput;
    use crate::types::AnalyzerKind;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    fn dataset() -> Dataset {
        let df = df![
            "a" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            "b" => [2.0, 4.1, 5.9, 8.2, 9.9, 12.1],
            "label" => ["x", "y", "x", "y", "x", "y"],
        ]
        .unwrap();
        Dataset::new(df).unwrap()
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let ds = dataset();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&ds, Some("label"), &config);
        let bank = AnalyzerBank::for_depth(AnalysisDepth::Standard);
        let token = CancellationToken::new();

        let parallel = AnalyzerExecutor::new(&bank, &token).run(&ctx).unwrap();
        let sequential = AnalyzerExecutor::new(&bank, &token)
            .parallel(false)
            .run(&ctx)
            .unwrap();

        let kinds: Vec<AnalyzerKind> = parallel.iter().map(|r| r.analyzer).collect();
        assert_eq!(kinds, bank.kinds());
        let scores = |rs: &[AnalyzerResult]| rs.iter().map(|r| r.score()).collect::<Vec<_>>();
        assert_eq!(scores(&parallel), scores(&sequential));
    }

    #[test]
    fn test_expensive_analyzers_skipped_above_row_limit() {
        let ds = dataset();
        let config = AnalysisConfig::builder().large_dataset_rows(3).build().unwrap();
        let ctx = AnalysisContext::new(&ds, Some("label"), &config);
        let bank = AnalyzerBank::for_depth(AnalysisDepth::Complete);
        let token = CancellationToken::new();

        let results = AnalyzerExecutor::new(&bank, &token).run(&ctx).unwrap();
        for result in results.iter().filter(|r| r.analyzer.is_expensive()) {
            assert!(!result.success);
            assert!(!result.applicable);
            assert!(result.error.as_deref().unwrap_or("").starts_with("Skipped"));
        }
    }

    #[test]
    fn test_cancelled_before_start() {
        let ds = dataset();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&ds, None, &config);
        let bank = AnalyzerBank::for_depth(AnalysisDepth::Basic);
        let token = CancellationToken::new();
        token.cancel();

        let result = AnalyzerExecutor::new(&bank, &token).run(&ctx);
        assert!(matches!(result, Err(UtilityError::Cancelled)));
    }

    #[test]
    fn test_reports_one_update_per_analyzer() {
        let ds = dataset();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&ds, None, &config);
        let bank = AnalyzerBank::for_depth(AnalysisDepth::Basic);
        let token = CancellationToken::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ClosureProgressReporter::new(move |u: ProgressUpdate| {
            sink.lock().unwrap().push(u.items_processed);
        });

        AnalyzerExecutor::new(&bank, &token)
            .parallel(false)
            .progress(Some(&reporter))
            .run(&ctx)
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_supervised_analyzers_need_a_target() {
        let ds = dataset();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&ds, None, &config);
        let bank = AnalyzerBank::for_depth(AnalysisDepth::Complete);
        let token = CancellationToken::new();

        let results = AnalyzerExecutor::new(&bank, &token).run(&ctx).unwrap();
        for result in &results {
            if result.analyzer.requires_target() {
                assert!(!result.applicable, "{} should need a target", result.analyzer);
                assert_eq!(result.error.as_deref(), Some("No target column identified"));
            } else {
                assert!(result.applicable, "{} should run without a target", result.analyzer);
            }
        }
    }

    struct PanickingAnalyzer;

    impl Analyzer for PanickingAnalyzer {
        fn kind(&self) -> AnalyzerKind {
            AnalyzerKind::Correlation
        }

        fn run(&self, _ctx: &AnalysisContext<'_>) -> Result<AnalyzerOutput> {
            panic!("matrix index out of range");
        }
    }

    #[test]
    fn test_panicking_analyzer_becomes_failed_result() {
        let ds = dataset();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&ds, None, &config);

        let result = execute(&PanickingAnalyzer, &ctx);
        assert!(!result.success);
        assert!(result.applicable);
        assert_eq!(result.analyzer, AnalyzerKind::Correlation);
        assert_eq!(
            result.error.as_deref(),
            Some("Analyzer panicked: matrix index out of range")
        );
    }

    #[test]
    fn test_extreme_magnitudes_do_not_abort_execution() {
        let mut values: Vec<f64> = (0..30).map(|i| i as f64).collect();
        values.extend([-1e308, 1e308]);
        let ds = Dataset::new(df!["x" => values].unwrap()).unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&ds, None, &config);
        let bank = AnalyzerBank::for_depth(AnalysisDepth::Standard);
        let token = CancellationToken::new();

        let results = AnalyzerExecutor::new(&bank, &token).run(&ctx).unwrap();
        let outliers = results
            .iter()
            .find(|r| r.analyzer == AnalyzerKind::Outliers)
            .unwrap();
        assert!(outliers.success, "outliers: {:?}", outliers.error);
        assert_eq!(results.len(), bank.len());
    }
}
