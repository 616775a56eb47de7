//! Analysis pipeline: orchestration, analyzer execution and progress.

mod builder;
mod executor;
mod progress;

pub use builder::{Pipeline, PipelineBuilder};
pub use executor::AnalyzerExecutor;
pub use progress::{
    AnalysisStage, CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
