//! Report output.
//!
//! Wraps an [`AnalysisReport`](crate::types::AnalysisReport) with run
//! metadata for JSON output (`--json`) and file output (`--emit-report`).
//!
//! # Example
//!
//! ```rust,ignore
//! use dataset_utility::reporting::{ReportWriter, UtilityReport};
//!
//! let report = UtilityReport::new("data/train.csv", analysis);
//! println!("{}", serde_json::to_string_pretty(&report)?);
//!
//! let writer = ReportWriter::new(PathBuf::from("output"));
//! writer.write(&report, "train")?;
//! ```

mod writer;

pub use writer::{ReportWriter, UtilityReport};
