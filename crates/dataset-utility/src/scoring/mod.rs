//! Contextual scoring.
//!
//! Each tagged persona points at one or more [`ScoringLens`]es; the
//! general-purpose lens is always evaluated. Lens scores are pure functions
//! of the characteristics record, so the scorer holds no state beyond a
//! borrowed catalog.

mod lens;

pub use lens::{
    Adjustment, BASELINE_SCORE, Condition, ContextualScore, LensKind, LensMetric, ScoringLens,
    WeightedMetric,
};

use crate::catalog::ScoringCatalog;
use crate::characteristics::Characteristics;
use crate::personas::PersonaAnalysis;
use crate::utils::round_to;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Quality band of the best contextual score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceTier {
    Excellent,
    Good,
    Fair,
    Poor,
    Unacceptable,
}

impl PerformanceTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Self::Excellent
        } else if score >= 70.0 {
            Self::Good
        } else if score >= 55.0 {
            Self::Fair
        } else if score >= 35.0 {
            Self::Poor
        } else {
            Self::Unacceptable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedScore {
    pub lens: LensKind,
    pub score: f64,
}

/// How the evaluated lenses compare with one another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparativeAnalysis {
    /// Highest first; ties keep evaluation order.
    pub ranking: Vec<RankedScore>,
    pub score_spread: f64,
    pub average_score: f64,
    pub performance_tier: PerformanceTier,
    pub insights: Vec<String>,
}

/// Every lens score computed for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextualScoring {
    pub relevant_lenses: Vec<LensKind>,
    pub scores: Vec<ContextualScore>,
    pub comparative_analysis: Option<ComparativeAnalysis>,
    pub summary: String,
}

impl ContextualScoring {
    /// The highest score; the earliest lens wins ties.
    pub fn best(&self) -> Option<&ContextualScore> {
        self.scores
            .iter()
            .reduce(|best, s| if s.score > best.score { s } else { best })
    }

    pub fn get(&self, lens: LensKind) -> Option<&ContextualScore> {
        self.scores.iter().find(|s| s.lens == lens)
    }
}

/// Scores characteristics through the lenses the tagged personas select.
#[derive(Debug, Clone, Copy)]
pub struct ContextualScorer<'a> {
    catalog: &'a ScoringCatalog,
}

impl<'a> ContextualScorer<'a> {
    pub fn new(catalog: &'a ScoringCatalog) -> Self {
        Self { catalog }
    }

    /// Lenses linked to the tagged personas, plus the general-purpose lens,
    /// in catalog order.
    pub fn relevant_lenses(&self, personas: &PersonaAnalysis) -> Vec<LensKind> {
        let mut wanted = vec![LensKind::GeneralPurpose];
        for persona in personas.personas() {
            if let Some(rule) = self.catalog.persona_rule(persona) {
                wanted.extend(rule.lenses.iter().copied());
            }
        }
        self.catalog
            .lenses
            .iter()
            .map(|l| l.kind)
            .filter(|kind| wanted.contains(kind))
            .collect()
    }

    pub fn score(&self, characteristics: &Characteristics, personas: &PersonaAnalysis) -> ContextualScoring {
        let relevant = self.relevant_lenses(personas);
        let scores: Vec<ContextualScore> = self
            .catalog
            .lenses
            .iter()
            .filter(|lens| relevant.contains(&lens.kind))
            .map(|lens| {
                let score = lens.score(characteristics);
                debug!("Lens {}: {:.1}", lens.kind, score.score);
                score
            })
            .collect();

        let comparative_analysis = comparative_analysis(&scores);
        let mut scoring = ContextualScoring {
            relevant_lenses: relevant,
            scores,
            comparative_analysis,
            summary: String::new(),
        };
        scoring.summary = summarize(&scoring);
        scoring
    }
}

fn comparative_analysis(scores: &[ContextualScore]) -> Option<ComparativeAnalysis> {
    let mut ranking: Vec<RankedScore> = scores
        .iter()
        .map(|s| RankedScore {
            lens: s.lens,
            score: s.score,
        })
        .collect();
    ranking.sort_by(|a, b| b.score.total_cmp(&a.score));

    let best = ranking.first()?.score;
    let worst = ranking.last()?.score;
    let spread = round_to(best - worst, 1);
    let average = round_to(
        ranking.iter().map(|r| r.score).sum::<f64>() / ranking.len() as f64,
        1,
    );

    let quality = if best >= 80.0 {
        "Excellent dataset quality across evaluated contexts"
    } else if best >= 65.0 {
        "Good dataset quality with strong potential for specific use cases"
    } else if best >= 45.0 {
        "Moderate quality - may require preprocessing for optimal results"
    } else {
        "Low quality - significant issues need addressing before use"
    };
    let consistency = if spread > 30.0 {
        "Highly context-dependent quality - some use cases much better than others"
    } else if spread > 15.0 {
        "Moderately context-dependent - performance varies by use case"
    } else {
        "Consistent quality across different contexts"
    };

    Some(ComparativeAnalysis {
        ranking,
        score_spread: spread,
        average_score: average,
        performance_tier: PerformanceTier::from_score(best),
        insights: vec![quality.to_string(), consistency.to_string()],
    })
}

fn summarize(scoring: &ContextualScoring) -> String {
    let Some(best) = scoring.best() else {
        return "No contextual scores calculated.".to_string();
    };
    let mut summary = format!(
        "Best use case: {} ({:.1}/100). ",
        best.lens.display_name(),
        best.score
    );
    summary.push_str(if best.score >= 80.0 {
        "Excellent quality for this specific application. "
    } else if best.score >= 65.0 {
        "Good quality with strong potential. "
    } else if best.score >= 45.0 {
        "Moderate quality - some preprocessing recommended. "
    } else {
        "Poor quality - significant improvements needed. "
    });

    let others: Vec<f64> = scoring
        .scores
        .iter()
        .filter(|s| s.lens != best.lens)
        .map(|s| s.score)
        .collect();
    if !others.is_empty() {
        let gap = best.score - others.iter().sum::<f64>() / others.len() as f64;
        summary.push_str(if gap > 15.0 {
            "Significantly better for this specific use case than general applications."
        } else if gap > 5.0 {
            "Notably better for this specific use case."
        } else {
            "Similar quality across different applications."
        });
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personas::{Persona, PersonaEngine};
    use pretty_assertions::assert_eq;

    fn analysis_for(c: &Characteristics, catalog: &ScoringCatalog) -> PersonaAnalysis {
        PersonaEngine::new(&catalog.personas).tag(c)
    }

    fn severe_imbalance() -> Characteristics {
        Characteristics {
            missing_percentage: Some(0.0),
            data_completeness: Some(100.0),
            duplicate_percentage: Some(0.0),
            duplicate_score: Some(100.0),
            type_consistency_score: Some(100.0),
            type_consistency_issues: Some(0),
            outlier_percentage: Some(0.5),
            class_balance_score: Some(20.8),
            class_balance_level: Some("severely_imbalanced".into()),
            class_imbalance_ratio: Some(199.0),
            minority_class_percentage: Some(0.5),
            feature_count: 6,
            sample_count: 1000,
            ..Default::default()
        }
    }

    #[test]
    fn test_general_lens_always_relevant() {
        let catalog = ScoringCatalog::standard();
        let analysis = analysis_for(&Characteristics::default(), &catalog);
        let lenses = ContextualScorer::new(&catalog).relevant_lenses(&analysis);
        // default persona maps to general purpose and predictive modeling
        assert_eq!(lenses, vec![LensKind::GeneralPurpose, LensKind::PredictiveModeling]);
    }

    #[test]
    fn test_anomaly_lens_beats_general_under_severe_imbalance() {
        let catalog = ScoringCatalog::standard();
        let c = severe_imbalance();
        let analysis = analysis_for(&c, &catalog);
        assert!(analysis.personas().any(|p| p == Persona::AnomalyDetection));

        let scoring = ContextualScorer::new(&catalog).score(&c, &analysis);
        let anomaly = scoring.get(LensKind::AnomalyResearch).unwrap();
        let general = scoring.get(LensKind::GeneralPurpose).unwrap();
        assert_eq!(anomaly.score, 100.0);
        assert!(general.explanation.contains("Penalty (severe_imbalance): -10.0"));
        assert!(anomaly.score > general.score);
        assert_eq!(scoring.best().map(|s| s.lens), Some(LensKind::AnomalyResearch));
        assert!(scoring.summary.starts_with("Best use case: Anomaly Research (100.0/100)."));
    }

    #[test]
    fn test_comparative_analysis() {
        let scores = vec![
            ContextualScore {
                lens: LensKind::GeneralPurpose,
                score: 62.0,
                explanation: String::new(),
            },
            ContextualScore {
                lens: LensKind::AnomalyResearch,
                score: 100.0,
                explanation: String::new(),
            },
        ];
        let analysis = comparative_analysis(&scores).unwrap();
        assert_eq!(
            analysis.ranking,
            vec![
                RankedScore {
                    lens: LensKind::AnomalyResearch,
                    score: 100.0
                },
                RankedScore {
                    lens: LensKind::GeneralPurpose,
                    score: 62.0
                },
            ]
        );
        assert_eq!(analysis.score_spread, 38.0);
        assert_eq!(analysis.average_score, 81.0);
        assert_eq!(analysis.performance_tier, PerformanceTier::Excellent);
        assert_eq!(analysis.insights.len(), 2);
        assert!(comparative_analysis(&[]).is_none());
    }

    #[test]
    fn test_performance_tiers() {
        assert_eq!(PerformanceTier::from_score(85.0), PerformanceTier::Excellent);
        assert_eq!(PerformanceTier::from_score(70.0), PerformanceTier::Good);
        assert_eq!(PerformanceTier::from_score(54.9), PerformanceTier::Poor);
        assert_eq!(PerformanceTier::from_score(10.0), PerformanceTier::Unacceptable);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn characteristics() -> impl Strategy<Value = Characteristics> {
            (
                proptest::option::of(0.0f64..100.0),
                proptest::option::of(0.0f64..100.0),
                proptest::option::of(1.0f64..1000.0),
                proptest::option::of(0.0f64..50.0),
                proptest::option::of(0.0f64..60.0),
                proptest::option::of(0.0f64..100.0),
                proptest::option::of(0.0f64..100.0),
                any::<bool>(),
                0usize..200,
                0usize..200_000,
            )
                .prop_map(
                    |(completeness, consistency, ratio, minority, outliers, ml, sep, demo, features, rows)| {
                        Characteristics {
                            data_completeness: completeness,
                            missing_percentage: completeness.map(|c| 100.0 - c),
                            type_consistency_score: consistency,
                            class_imbalance_ratio: ratio,
                            minority_class_percentage: minority,
                            outlier_percentage: outliers,
                            ml_usability_score: ml,
                            data_separability_score: sep,
                            has_demographic_features: demo,
                            feature_count: features,
                            sample_count: rows,
                            ..Default::default()
                        }
                    },
                )
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn lens_scores_stay_in_bounds(c in characteristics()) {
                let catalog = ScoringCatalog::standard();
                for lens in &catalog.lenses {
                    let s = lens.score(&c);
                    prop_assert!((0.0..=100.0).contains(&s.score), "{} scored {}", lens.kind, s.score);
                }
            }

            /// Adjustments accumulate unclamped; the clamp happens once at the end.
            #[test]
            fn clamp_applies_after_all_adjustments(c in characteristics()) {
                let catalog = ScoringCatalog::standard();
                for lens in &catalog.lenses {
                    let (raw, _) = lens.raw_score(&c);
                    let expected = round_to(raw.clamp(0.0, 100.0), 1);
                    prop_assert_eq!(lens.score(&c).score, expected);
                }
            }

            #[test]
            fn scoring_is_deterministic(c in characteristics()) {
                let catalog = ScoringCatalog::standard();
                let analysis = PersonaEngine::new(&catalog.personas).tag(&c);
                let scorer = ContextualScorer::new(&catalog);
                prop_assert_eq!(scorer.score(&c, &analysis), scorer.score(&c, &analysis));
            }
        }
    }
}
