//! Templated executive summary, recommendations and next steps.

use super::grade::{Readiness, ReadinessState};
use super::{ConfidenceTier, MaxPotential};
use crate::types::AnalyzerResult;

pub const MAX_RECOMMENDATIONS: usize = 8;
pub const MAX_NEXT_STEPS: usize = 6;

/// Critical issues surfaced in recommendations, at most.
const MAX_CRITICAL: usize = 3;

pub(super) fn executive_summary(
    overall: f64,
    integrity: f64,
    potential: &MaxPotential,
    results: &[AnalyzerResult],
) -> String {
    let band = if overall >= 85.0 {
        "Excellent"
    } else if overall >= 70.0 {
        "Good"
    } else if overall >= 55.0 {
        "Fair"
    } else if overall >= 35.0 {
        "Poor"
    } else {
        "Unacceptable"
    };
    let mut parts = vec![format!("Overall Utility: {} ({:.1}/100).", band, overall)];

    parts.push(
        if integrity >= 90.0 {
            "Data integrity is excellent with minimal quality issues."
        } else if integrity >= 75.0 {
            "Data integrity is good with some minor quality concerns."
        } else if integrity >= 60.0 {
            "Data integrity is fair - moderate quality issues present."
        } else if integrity >= 40.0 {
            "Data integrity is poor - significant quality issues detected."
        } else {
            "Data integrity is critical - major quality problems require immediate attention."
        }
        .to_string(),
    );

    let flagged: Vec<&str> = results
        .iter()
        .filter(|r| r.success && !r.critical_issues.is_empty())
        .map(|r| r.analyzer.display_name())
        .collect();
    if !flagged.is_empty() {
        parts.push(format!("Critical issues flagged by: {}.", flagged.join(", ")));
    }

    parts.push(format!("{}.", potential.primary_persona.description()));

    parts.push(
        match potential.confidence {
            ConfidenceTier::High => "Confidence in this assessment is high due to clear quality patterns.",
            ConfidenceTier::Medium => {
                "Confidence in this assessment is moderate - multiple use cases may be viable."
            }
            ConfidenceTier::Low => {
                "Confidence in this assessment is low - quality patterns are mixed or unclear."
            }
        }
        .to_string(),
    );
    parts.join(" ")
}

/// Most severe first: analyzer critical issues, the integrity priority, the
/// overall band, then persona and publication advice.
pub(super) fn recommendations(
    overall: f64,
    integrity: f64,
    potential: &MaxPotential,
    results: &[AnalyzerResult],
) -> Vec<String> {
    let mut recs: Vec<String> = results
        .iter()
        .filter(|r| r.success)
        .flat_map(|r| {
            r.critical_issues
                .iter()
                .map(move |issue| format!("Critical ({}): {}", r.analyzer.display_name(), issue))
        })
        .take(MAX_CRITICAL)
        .collect();

    let band: [&str; 2] = if overall >= 80.0 {
        [
            "Dataset ready for immediate use in production environments",
            "Consider this dataset for high-impact research or business applications",
        ]
    } else if overall >= 65.0 {
        [
            "Dataset suitable for most applications with minor preprocessing",
            "Address identified quality issues to unlock full potential",
        ]
    } else if overall >= 45.0 {
        [
            "Dataset requires significant preprocessing before use",
            "Focus on data cleaning and quality improvement initiatives",
        ]
    } else {
        [
            "Dataset not recommended for production use in current state",
            "Consider data collection improvements or alternative datasets",
        ]
    };
    if integrity < 70.0 {
        recs.push(
            "Priority: Address data integrity issues (completeness, consistency, duplicates)"
                .to_string(),
        );
    }
    recs.extend(band.iter().map(|s| s.to_string()));

    if let Some(advice) = potential.primary_persona.recommendation() {
        recs.push(advice.to_string());
    }
    if overall >= 70.0 && integrity >= 75.0 {
        recs.push("Consider documenting and publishing this dataset for research community".to_string());
    }
    recs.truncate(MAX_RECOMMENDATIONS);
    recs
}

pub(super) fn next_steps(readiness: &Readiness) -> Vec<String> {
    let steps: [&str; 3] = match readiness.primary_state {
        ReadinessState::ImmediateUse => [
            "Deploy dataset in production environment",
            "Monitor model performance and data drift",
            "Document usage patterns and lessons learned",
        ],
        ReadinessState::ProductionReady => [
            "Conduct final validation testing",
            "Prepare deployment documentation",
            "Set up monitoring and alerting systems",
        ],
        ReadinessState::ResearchReady => [
            "Begin exploratory data analysis",
            "Design experimental methodology",
            "Address remaining quality issues in parallel",
        ],
        ReadinessState::PreprocessingRequired => [
            "Implement data cleaning pipeline",
            "Address missing values and duplicates",
            "Validate preprocessing results",
        ],
        ReadinessState::MajorImprovementsNeeded => [
            "Reassess data collection methodology",
            "Implement comprehensive quality improvement program",
            "Consider alternative data sources",
        ],
    };
    let mut out: Vec<String> = steps.iter().map(|s| s.to_string()).collect();
    if readiness.publication_ready {
        out.push("Prepare dataset for publication with proper documentation".to_string());
    }
    out.truncate(MAX_NEXT_STEPS);
    out
}
