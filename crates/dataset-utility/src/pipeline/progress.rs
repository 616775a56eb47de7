//! Progress reporting and cancellation support for the analysis pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use dataset_utility::{Pipeline, CancellationToken};
//!
//! let token = CancellationToken::new();
//! let token_clone = token.clone();
//!
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     token_clone.cancel();
//! });
//!
//! let report = Pipeline::builder()
//!     .cancellation_token(token)
//!     .on_progress(|update| {
//!         println!("[{:?}] {}", update.stage, update.message);
//!     })
//!     .build()?
//!     .analyze(&dataset);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stages of one analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    /// Validating the request and resolving the target column
    Initializing,
    /// Summarizing the dataset shape
    Profiling,
    /// Running the foundational analyzers
    Analyzing,
    /// Flattening analyzer metrics into characteristics
    Characterizing,
    /// Evaluating persona rules
    PersonaTagging,
    /// Scoring the relevant lenses
    ContextualScoring,
    /// Blending integrity and contextual scores
    Synthesis,
    /// Evaluating declarative validation rules
    Validation,
    Complete,
    Cancelled,
    Failed,
}

impl AnalysisStage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Profiling => "Profiling Dataset",
            Self::Analyzing => "Running Analyzers",
            Self::Characterizing => "Extracting Characteristics",
            Self::PersonaTagging => "Tagging Personas",
            Self::ContextualScoring => "Scoring Lenses",
            Self::Synthesis => "Synthesizing Utility Score",
            Self::Validation => "Validating Rules",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Share of the whole request spent in this stage (0.0 - 1.0).
    ///
    /// Weights of the non-terminal stages sum to 1.0. Analyzers dominate.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.02,
            Self::Profiling => 0.03,
            Self::Analyzing => 0.80,
            Self::Characterizing => 0.02,
            Self::PersonaTagging => 0.03,
            Self::ContextualScoring => 0.03,
            Self::Synthesis => 0.02,
            Self::Validation => 0.05,
            Self::Complete | Self::Cancelled | Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Initializing => 0.0,
            Self::Profiling => 0.02,
            Self::Analyzing => 0.05,
            Self::Characterizing => 0.85,
            Self::PersonaTagging => 0.87,
            Self::ContextualScoring => 0.90,
            Self::Synthesis => 0.93,
            Self::Validation => 0.95,
            Self::Complete => 1.0,
            Self::Cancelled | Self::Failed => 0.0,
        }
    }
}

/// One progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: AnalysisStage,

    /// Finer-grained position, e.g. "Analyzer: outliers".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within the current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: AnalysisStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let stage_progress = stage_progress.clamp(0.0, 1.0);
        Self {
            stage,
            sub_stage: None,
            progress: overall(stage, stage_progress),
            stage_progress,
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Update for the `current`-th of `total` items in a stage.
    pub fn with_items(
        stage: AnalysisStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            sub_stage: Some(sub_stage.into()),
            items_processed: Some(current),
            items_total: Some(total),
            ..Self::new(stage, stage_progress, message)
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(AnalysisStage::Complete, 1.0, message)
    }

    pub fn cancelled() -> Self {
        Self {
            progress: 0.0,
            stage_progress: 0.0,
            ..Self::new(AnalysisStage::Cancelled, 0.0, "Analysis cancelled by caller")
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(AnalysisStage::Failed, 0.0, message)
    }
}

fn overall(stage: AnalysisStage, stage_progress: f32) -> f32 {
    (stage.base_progress() + stage.weight() * stage_progress).clamp(0.0, 1.0)
}

/// Receives progress updates from the pipeline.
///
/// Implementations must be `Send + Sync`: analyzers run on the rayon pool and
/// report from worker threads.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Shared flag for cancelling a running analysis from any thread.
///
/// The pipeline checks the token between stages and before each analyzer,
/// and returns [`UtilityError::Cancelled`](crate::error::UtilityError::Cancelled)
/// once it is set. Partial analyzer results are discarded.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can drive another request.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    const WORK_STAGES: [AnalysisStage; 8] = [
        AnalysisStage::Initializing,
        AnalysisStage::Profiling,
        AnalysisStage::Analyzing,
        AnalysisStage::Characterizing,
        AnalysisStage::PersonaTagging,
        AnalysisStage::ContextualScoring,
        AnalysisStage::Synthesis,
        AnalysisStage::Validation,
    ];

    #[test]
    fn test_cancellation_token_clone_shares_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());

        clone.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_stage_weights_sum_to_one() {
        let total: f32 = WORK_STAGES.iter().map(|s| s.weight()).sum();
        assert!((total - 1.0).abs() < 0.01, "weights sum to {}", total);
    }

    #[test]
    fn test_base_progress_is_cumulative() {
        for pair in WORK_STAGES.windows(2) {
            let expected = pair[0].base_progress() + pair[0].weight();
            assert!(
                (pair[1].base_progress() - expected).abs() < 1e-4,
                "{:?} should start at {}",
                pair[1],
                expected
            );
        }
    }

    #[test]
    fn test_progress_update_with_items() {
        let update = ProgressUpdate::with_items(
            AnalysisStage::Analyzing,
            "Analyzer: outliers",
            3,
            6,
            "Outlier Detection finished",
        );
        assert_eq!(update.stage_progress, 0.5);
        assert_eq!(update.items_processed, Some(3));
        assert!((update.progress - 0.45).abs() < 1e-4);
    }

    #[test]
    fn test_terminal_updates() {
        assert_eq!(ProgressUpdate::complete("done").progress, 1.0);
        let cancelled = ProgressUpdate::cancelled();
        assert_eq!(cancelled.stage, AnalysisStage::Cancelled);
        assert_eq!(cancelled.progress, 0.0);
    }

    #[test]
    fn test_closure_reporter_across_threads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let reporter = Arc::new(ClosureProgressReporter::new(move |_update| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let worker = reporter.clone();
        std::thread::spawn(move || {
            worker.report(ProgressUpdate::new(AnalysisStage::Analyzing, 0.5, "worker"));
        })
        .join()
        .expect("thread should not panic");
        reporter.report(ProgressUpdate::complete("done"));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stage_json_values() {
        let json = serde_json::to_string(&AnalysisStage::PersonaTagging).unwrap();
        assert_eq!(json, "\"persona_tagging\"");
        let update = ProgressUpdate::new(AnalysisStage::ContextualScoring, 1.0, "scored");
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"stage\":\"contextual_scoring\""));
        assert!(!json.contains("sub_stage"));
    }
}
