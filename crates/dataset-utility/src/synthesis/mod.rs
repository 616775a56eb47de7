//! Utility score synthesis.
//!
//! Blends the data integrity score (completeness, type consistency and
//! duplicates) with the best contextual lens score into the overall utility
//! score, then grades it and renders the executive summary.
//!
//! ```text
//! integrity = 0.5 * completeness + 0.3 * consistency + 0.2 * duplicates
//! overall   = 0.7 * integrity + 0.3 * max(contextual scores)
//! ```

mod grade;
mod narrative;

pub use grade::{
    PublicationCriterion, PublicationReadiness, PublicationStatus, Readiness, ReadinessState,
    UtilityGrade,
};
pub use narrative::{MAX_NEXT_STEPS, MAX_RECOMMENDATIONS};

use crate::personas::{Persona, PersonaAnalysis};
use crate::scoring::{ContextualScoring, LensKind};
use crate::types::{AnalyzerKind, AnalyzerResult};
use crate::utils::{clamp_score, round_to};
use serde::{Deserialize, Serialize};

const COMPLETENESS_WEIGHT: f64 = 0.5;
const CONSISTENCY_WEIGHT: f64 = 0.3;
const DUPLICATE_WEIGHT: f64 = 0.2;

const INTEGRITY_SHARE: f64 = 0.7;
const CONTEXT_SHARE: f64 = 0.3;

/// Highest contextual score used when no lens was evaluated.
const NEUTRAL_CONTEXT_SCORE: f64 = 50.0;

/// How clearly the best lens stands out from the runner-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    /// `None` when only one score was computed.
    pub fn from_gap(gap: Option<f64>) -> Self {
        match gap {
            None => Self::Medium,
            Some(g) if g > 20.0 => Self::High,
            Some(g) if g > 10.0 => Self::Medium,
            Some(_) => Self::Low,
        }
    }
}

/// Integrity components; `None` when the analyzer did not succeed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityBreakdown {
    pub completeness: Option<f64>,
    pub consistency: Option<f64>,
    pub duplicates: Option<f64>,
}

impl IntegrityBreakdown {
    pub fn from_results(results: &[AnalyzerResult]) -> Self {
        let score = |kind: AnalyzerKind| {
            results
                .iter()
                .find(|r| r.analyzer == kind)
                .and_then(AnalyzerResult::score)
        };
        Self {
            completeness: score(AnalyzerKind::Completeness),
            consistency: score(AnalyzerKind::TypeConsistency),
            duplicates: score(AnalyzerKind::Duplicates),
        }
    }

    /// Weighted blend, assuming clean data where a component is missing.
    pub fn integrity_score(&self) -> f64 {
        let blended = COMPLETENESS_WEIGHT * self.completeness.unwrap_or(100.0)
            + CONSISTENCY_WEIGHT * self.consistency.unwrap_or(100.0)
            + DUPLICATE_WEIGHT * self.duplicates.unwrap_or(100.0);
        clamp_score(blended)
    }
}

/// The best contextual score and what it says about the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxPotential {
    pub lens: Option<LensKind>,
    pub highest_score: f64,
    pub primary_persona: Persona,
    pub confidence: ConfidenceTier,
    pub score_gap: f64,
}

impl MaxPotential {
    pub fn identify(scoring: &ContextualScoring, personas: &PersonaAnalysis) -> Self {
        let Some(best) = scoring.best() else {
            return Self {
                lens: None,
                highest_score: NEUTRAL_CONTEXT_SCORE,
                primary_persona: personas.primary_persona,
                confidence: ConfidenceTier::Low,
                score_gap: 0.0,
            };
        };

        let mut sorted: Vec<f64> = scoring.scores.iter().map(|s| s.score).collect();
        sorted.sort_by(|a, b| b.total_cmp(a));
        let gap = sorted.get(1).map(|second| round_to(best.score - second, 1));

        Self {
            lens: Some(best.lens),
            highest_score: best.score,
            primary_persona: best.lens.persona(),
            confidence: ConfidenceTier::from_gap(gap),
            score_gap: gap.unwrap_or(0.0),
        }
    }
}

/// The terminal artifact of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub success: bool,
    pub overall_utility_score: f64,
    pub data_integrity_score: f64,
    /// `None` when the analysis aborted.
    pub primary_persona: Option<Persona>,
    pub grade: UtilityGrade,
    pub readiness: Readiness,
    pub publication_readiness: PublicationReadiness,
    pub integrity_breakdown: IntegrityBreakdown,
    pub max_potential: Option<MaxPotential>,
    pub executive_summary: String,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
    pub synthesis_formula: String,
}

impl SynthesisResult {
    /// Zero-score result for an aborted analysis.
    pub fn failed(reason: &str) -> Self {
        Self {
            success: false,
            overall_utility_score: 0.0,
            data_integrity_score: 0.0,
            primary_persona: None,
            grade: UtilityGrade::from_score(0.0),
            readiness: Readiness::assess(0.0, 0.0),
            publication_readiness: PublicationReadiness::assess(0.0, 0.0),
            integrity_breakdown: IntegrityBreakdown::default(),
            max_potential: None,
            executive_summary: format!(
                "Analysis failed - unable to determine dataset utility. {}",
                reason
            ),
            recommendations: vec![
                "Resolve the analyzer failures listed in the report errors and re-run the analysis"
                    .to_string(),
            ],
            next_steps: vec!["Inspect the dataset for structural problems".to_string()],
            synthesis_formula: String::new(),
        }
    }
}

/// Blend analyzer, persona and lens outputs into the final result.
pub fn synthesize(
    results: &[AnalyzerResult],
    personas: &PersonaAnalysis,
    scoring: &ContextualScoring,
) -> SynthesisResult {
    let breakdown = IntegrityBreakdown::from_results(results);
    let integrity = round_to(breakdown.integrity_score(), 1);
    let potential = MaxPotential::identify(scoring, personas);
    let overall = round_to(
        clamp_score(INTEGRITY_SHARE * integrity + CONTEXT_SHARE * potential.highest_score),
        1,
    );

    let readiness = Readiness::assess(integrity, overall);

    SynthesisResult {
        success: true,
        overall_utility_score: overall,
        data_integrity_score: integrity,
        primary_persona: Some(potential.primary_persona),
        grade: UtilityGrade::from_score(overall),
        publication_readiness: PublicationReadiness::assess(integrity, overall),
        integrity_breakdown: breakdown,
        executive_summary: narrative::executive_summary(overall, integrity, &potential, results),
        recommendations: narrative::recommendations(overall, integrity, &potential, results),
        next_steps: narrative::next_steps(&readiness),
        synthesis_formula: format!(
            "{} x {:.1} + {} x {:.1} = {:.1}",
            INTEGRITY_SHARE, integrity, CONTEXT_SHARE, potential.highest_score, overall
        ),
        readiness,
        max_potential: Some(potential),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::{AnalyzerMetrics, AnalyzerOutput, DuplicateMetrics};
    use crate::scoring::ContextualScore;
    use pretty_assertions::assert_eq;

    fn scored(kind: AnalyzerKind, score: f64) -> AnalyzerResult {
        AnalyzerResult::from_output(
            kind,
            AnalyzerOutput::new(score, AnalyzerMetrics::Duplicates(DuplicateMetrics::default())),
        )
    }

    fn scoring(scores: &[(LensKind, f64)]) -> ContextualScoring {
        ContextualScoring {
            relevant_lenses: scores.iter().map(|(k, _)| *k).collect(),
            scores: scores
                .iter()
                .map(|(lens, score)| ContextualScore {
                    lens: *lens,
                    score: *score,
                    explanation: String::new(),
                })
                .collect(),
            comparative_analysis: None,
            summary: String::new(),
        }
    }

    fn personas() -> PersonaAnalysis {
        PersonaAnalysis {
            tags: Vec::new(),
            primary_persona: Persona::GeneralPurposeML,
            summary: String::new(),
        }
    }

    #[test]
    fn test_integrity_defaults_missing_components_to_clean() {
        let results = vec![scored(AnalyzerKind::Completeness, 80.0)];
        let breakdown = IntegrityBreakdown::from_results(&results);
        assert_eq!(breakdown.completeness, Some(80.0));
        assert_eq!(breakdown.consistency, None);
        assert_eq!(breakdown.integrity_score(), 90.0);
    }

    #[test]
    fn test_failed_components_default_to_clean() {
        let results = vec![
            AnalyzerResult::failed(AnalyzerKind::Completeness, "boom"),
            scored(AnalyzerKind::Duplicates, 15.0),
        ];
        let integrity = IntegrityBreakdown::from_results(&results).integrity_score();
        assert!((integrity - 83.0).abs() < 1e-9);
    }

    #[test]
    fn test_overall_formula_and_confidence() {
        let results = vec![
            scored(AnalyzerKind::Completeness, 100.0),
            scored(AnalyzerKind::TypeConsistency, 100.0),
            scored(AnalyzerKind::Duplicates, 100.0),
        ];
        let contextual = scoring(&[(LensKind::GeneralPurpose, 62.0), (LensKind::AnomalyResearch, 100.0)]);
        let result = synthesize(&results, &personas(), &contextual);
        assert_eq!(result.data_integrity_score, 100.0);
        assert_eq!(result.overall_utility_score, 100.0);
        assert_eq!(result.primary_persona, Some(Persona::AnomalyDetection));
        let potential = result.max_potential.unwrap();
        assert_eq!(potential.confidence, ConfidenceTier::High);
        assert_eq!(potential.score_gap, 38.0);
        assert_eq!(result.grade.grade, "A+");
        assert_eq!(result.readiness.primary_state, ReadinessState::ImmediateUse);
        assert!(result.executive_summary.starts_with("Overall Utility: Excellent (100.0/100)."));
        assert!(result.recommendations.len() <= MAX_RECOMMENDATIONS);
        assert!(result.next_steps.len() <= MAX_NEXT_STEPS);
    }

    #[test]
    fn test_single_lens_has_medium_confidence() {
        let contextual = scoring(&[(LensKind::GeneralPurpose, 70.0)]);
        let result = synthesize(&[], &personas(), &contextual);
        // 0.7 * 100 + 0.3 * 70
        assert_eq!(result.overall_utility_score, 91.0);
        assert_eq!(result.max_potential.unwrap().confidence, ConfidenceTier::Medium);
    }

    #[test]
    fn test_critical_issues_lead_recommendations() {
        let mut duplicates = scored(AnalyzerKind::Duplicates, 10.0);
        duplicates.critical_issues = vec!["30.0% of rows are duplicates".to_string()];
        let contextual = scoring(&[(LensKind::GeneralPurpose, 50.0)]);
        let result = synthesize(&[duplicates], &personas(), &contextual);
        assert_eq!(
            result.recommendations[0],
            "Critical (Duplicate Records): 30.0% of rows are duplicates"
        );
        assert!(result.executive_summary.contains("Critical issues flagged by: Duplicate Records."));
    }

    #[test]
    fn test_failed_result_shape() {
        let failed = SynthesisResult::failed("7 of 9 analyzers failed");
        assert!(!failed.success);
        assert_eq!(failed.overall_utility_score, 0.0);
        assert_eq!(failed.grade.grade, "F");
        assert!(failed.executive_summary.contains("7 of 9 analyzers failed"));
        assert_eq!(failed.primary_persona, None);
    }
}
