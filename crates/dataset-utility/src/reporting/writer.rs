use crate::types::AnalysisReport;
use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// An analysis report plus where and when it was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilityReport {
    pub generated_at: String,
    pub input_file: String,
    #[serde(flatten)]
    pub analysis: AnalysisReport,
}

impl UtilityReport {
    pub fn new(input_file: impl Into<String>, analysis: AnalysisReport) -> Self {
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input_file: input_file.into(),
            analysis,
        }
    }
}

/// Writes reports as pretty JSON under one directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self::new(PathBuf::from("output"))
    }
}

impl ReportWriter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `<base>_utility_<YYYYmmdd_HHMMSS>.json`, creating the directory.
    pub fn write(&self, report: &UtilityReport, base_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory {}", self.output_dir.display())
        })?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self
            .output_dir
            .join(format!("{}_utility_{}.json", base_name, stamp));

        let mut file = File::create(&path)
            .with_context(|| format!("Failed to create report file {}", path.display()))?;
        file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;

        info!("Report saved: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use polars::prelude::*;

    fn analysis() -> AnalysisReport {
        let df = df![
            "a" => [1.0, 2.0, 3.0, 4.0],
            "b" => ["w", "x", "y", "z"],
        ]
        .unwrap();
        let config = crate::config::AnalysisConfig::builder()
            .analysis_depth(crate::config::AnalysisDepth::Basic)
            .build()
            .unwrap();
        Pipeline::builder()
            .config(config)
            .build()
            .unwrap()
            .analyze_frame(df)
            .unwrap()
    }

    #[test]
    fn test_report_flattens_analysis() {
        let report = UtilityReport::new("data.csv", analysis());
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["input_file"], "data.csv");
        assert!(json["synthesis"]["overall_utility_score"].is_number());
        assert_eq!(json["schema_version"], crate::types::REPORT_SCHEMA_VERSION);
    }

    #[test]
    fn test_write_creates_timestamped_file() {
        let dir = std::env::temp_dir().join(format!("utility-report-{}", std::process::id()));
        let writer = ReportWriter::new(dir.clone());
        let path = writer
            .write(&UtilityReport::new("data.csv", analysis()), "data")
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("data_utility_"));
        assert!(name.ends_with(".json"));
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"input_file\": \"data.csv\""));

        fs::remove_dir_all(dir).ok();
    }
}
