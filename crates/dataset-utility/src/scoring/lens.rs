//! Scoring lens definitions and evaluation.

use crate::characteristics::{Characteristic, CharacteristicValue, Characteristics, ValueKind};
use crate::config::ConfigValidationError;
use crate::personas::Persona;
use crate::utils::round_to;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every lens score starts here before contributions and adjustments.
pub const BASELINE_SCORE: f64 = 60.0;

/// Explanations list at most this many terms.
const EXPLANATION_TERMS: usize = 5;

/// A use-case-specific scoring profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LensKind {
    GeneralPurpose,
    AnomalyResearch,
    FairnessAudit,
    PredictiveModeling,
    RobustnessTesting,
    ResearchBenchmark,
}

impl LensKind {
    pub const ALL: [LensKind; 6] = [
        Self::GeneralPurpose,
        Self::AnomalyResearch,
        Self::FairnessAudit,
        Self::PredictiveModeling,
        Self::RobustnessTesting,
        Self::ResearchBenchmark,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneralPurpose => "general_purpose",
            Self::AnomalyResearch => "anomaly_research",
            Self::FairnessAudit => "fairness_audit",
            Self::PredictiveModeling => "predictive_modeling",
            Self::RobustnessTesting => "robustness_testing",
            Self::ResearchBenchmark => "research_benchmark",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::GeneralPurpose => "General Purpose",
            Self::AnomalyResearch => "Anomaly Research",
            Self::FairnessAudit => "Fairness Audit",
            Self::PredictiveModeling => "Predictive Modeling",
            Self::RobustnessTesting => "Robustness Testing",
            Self::ResearchBenchmark => "Research Benchmark",
        }
    }

    /// The persona a winning score under this lens points to.
    pub fn persona(&self) -> Persona {
        match self {
            Self::GeneralPurpose => Persona::GeneralPurposeML,
            Self::AnomalyResearch => Persona::AnomalyDetection,
            Self::FairnessAudit => Persona::FairnessAudit,
            Self::PredictiveModeling => Persona::PredictiveModeling,
            Self::RobustnessTesting => Persona::ModelRobustnessTesting,
            Self::ResearchBenchmark => Persona::DataQualityBenchmark,
        }
    }
}

impl fmt::Display for LensKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalised [0, 100] input to a lens, derived from characteristics.
///
/// Most metrics fall back to a neutral default when their source analyzer
/// did not run. `completeness`, `consistency`, `overall_completeness` and
/// `separability` have no default and are skipped when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LensMetric {
    Completeness,
    Consistency,
    Balance,
    Cleanliness,
    MlReadiness,
    ImbalancePresence,
    MinorityCompleteness,
    OverallCompleteness,
    Separability,
    DemographicPresence,
    BiasDetectability,
    SampleDiversity,
    FeatureRichness,
    MlPerformance,
    FeatureImportance,
    NoisePresence,
    OutlierPresence,
    MissingPatterns,
    TypeInconsistencies,
    Documentation,
    SizeAdequacy,
    FeatureDiversity,
    Reproducibility,
}

impl LensMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completeness => "completeness",
            Self::Consistency => "consistency",
            Self::Balance => "balance",
            Self::Cleanliness => "cleanliness",
            Self::MlReadiness => "ml_readiness",
            Self::ImbalancePresence => "imbalance_presence",
            Self::MinorityCompleteness => "minority_completeness",
            Self::OverallCompleteness => "overall_completeness",
            Self::Separability => "separability",
            Self::DemographicPresence => "demographic_presence",
            Self::BiasDetectability => "bias_detectability",
            Self::SampleDiversity => "sample_diversity",
            Self::FeatureRichness => "feature_richness",
            Self::MlPerformance => "ml_performance",
            Self::FeatureImportance => "feature_importance",
            Self::NoisePresence => "noise_presence",
            Self::OutlierPresence => "outlier_presence",
            Self::MissingPatterns => "missing_patterns",
            Self::TypeInconsistencies => "type_inconsistencies",
            Self::Documentation => "documentation",
            Self::SizeAdequacy => "size_adequacy",
            Self::FeatureDiversity => "feature_diversity",
            Self::Reproducibility => "reproducibility",
        }
    }

    /// The metric value for `c`, or `None` when it cannot be derived.
    pub fn value(&self, c: &Characteristics) -> Option<f64> {
        let num = |ch: Characteristic, default: f64| c.number(ch).unwrap_or(default);
        let ratio = || num(Characteristic::ClassImbalanceRatio, 1.0);
        let consistency = || num(Characteristic::TypeConsistencyScore, 100.0);

        let value = match self {
            Self::Completeness | Self::OverallCompleteness => {
                return c.number(Characteristic::DataCompleteness);
            }
            Self::Consistency => return c.number(Characteristic::TypeConsistencyScore),
            Self::Separability => return c.number(Characteristic::DataSeparabilityScore),
            Self::Balance => num(Characteristic::ClassBalanceScore, 100.0),
            Self::Cleanliness => {
                num(Characteristic::DataCompleteness, 100.0) * 0.4
                    + consistency() * 0.3
                    + num(Characteristic::DuplicateScore, 100.0) * 0.3
            }
            Self::MlReadiness => {
                num(Characteristic::MlUsabilityScore, 0.0) * 0.5
                    + num(Characteristic::DataSeparabilityScore, 50.0) * 0.3
                    + num(Characteristic::InformationScore, 50.0) * 0.2
            }
            Self::ImbalancePresence => f64::min(100.0, (ratio() - 1.0) * 10.0),
            Self::MinorityCompleteness => {
                f64::max(0.0, 100.0 - num(Characteristic::MinorityClassPercentage, 50.0) * 2.0)
            }
            Self::DemographicPresence => {
                if c.has_demographic_features {
                    100.0
                } else {
                    0.0
                }
            }
            Self::BiasDetectability => f64::min(100.0, (ratio() - 1.0) * 15.0),
            Self::SampleDiversity => f64::min(100.0, c.feature_count as f64 * 5.0),
            Self::FeatureRichness => {
                f64::min(100.0, num(Characteristic::UsefulFeatures, 0.0) * 10.0)
            }
            Self::MlPerformance => num(Characteristic::MlUsabilityScore, 0.0),
            Self::FeatureImportance => num(Characteristic::InformationScore, 50.0),
            Self::NoisePresence => {
                f64::min(100.0, num(Characteristic::OutlierPercentage, 0.0) * 5.0)
            }
            Self::OutlierPresence => {
                f64::min(100.0, num(Characteristic::OutlierPercentage, 0.0) * 3.0)
            }
            Self::MissingPatterns => {
                f64::min(100.0, num(Characteristic::MissingPercentage, 0.0) * 4.0)
            }
            Self::TypeInconsistencies => {
                f64::min(100.0, num(Characteristic::TypeConsistencyIssues, 0.0) * 15.0)
            }
            Self::Documentation | Self::Reproducibility => consistency(),
            Self::SizeAdequacy => (c.sample_count as f64 / 1000.0 * 10.0).clamp(0.0, 100.0),
            Self::FeatureDiversity => f64::min(100.0, c.feature_count as f64 * 3.0),
        };
        Some(value)
    }
}

impl fmt::Display for LensMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedMetric {
    pub metric: LensMetric,
    pub weight: f64,
}

/// When a penalty or bonus fires. An absent characteristic never fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum Condition {
    Above {
        characteristic: Characteristic,
        threshold: f64,
    },
    Below {
        characteristic: Characteristic,
        threshold: f64,
    },
    Equals {
        characteristic: Characteristic,
        value: CharacteristicValue,
    },
}

impl Condition {
    pub fn characteristic(&self) -> Characteristic {
        match self {
            Self::Above { characteristic, .. }
            | Self::Below { characteristic, .. }
            | Self::Equals { characteristic, .. } => *characteristic,
        }
    }

    pub fn holds(&self, c: &Characteristics) -> bool {
        match self {
            Self::Above {
                characteristic,
                threshold,
            } => c.number(*characteristic).is_some_and(|v| v > *threshold),
            Self::Below {
                characteristic,
                threshold,
            } => c.number(*characteristic).is_some_and(|v| v < *threshold),
            Self::Equals {
                characteristic,
                value,
            } => c.get(*characteristic).as_ref() == Some(value),
        }
    }
}

/// A fixed-magnitude penalty or bonus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub name: String,
    #[serde(flatten)]
    pub condition: Condition,
    pub amount: f64,
}

impl Adjustment {
    pub fn above(name: &str, characteristic: Characteristic, threshold: f64, amount: f64) -> Self {
        Self {
            name: name.to_string(),
            condition: Condition::Above {
                characteristic,
                threshold,
            },
            amount,
        }
    }

    pub fn below(name: &str, characteristic: Characteristic, threshold: f64, amount: f64) -> Self {
        Self {
            name: name.to_string(),
            condition: Condition::Below {
                characteristic,
                threshold,
            },
            amount,
        }
    }

    pub fn equals(
        name: &str,
        characteristic: Characteristic,
        value: CharacteristicValue,
        amount: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            condition: Condition::Equals {
                characteristic,
                value,
            },
            amount,
        }
    }
}

/// A lens: weighted metrics around the baseline plus penalties and bonuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringLens {
    pub kind: LensKind,
    pub weights: Vec<WeightedMetric>,
    #[serde(default)]
    pub penalties: Vec<Adjustment>,
    #[serde(default)]
    pub bonuses: Vec<Adjustment>,
}

/// One lens score for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextualScore {
    pub lens: LensKind,
    /// In [0, 100], rounded to one decimal.
    pub score: f64,
    pub explanation: String,
}

impl ScoringLens {
    pub fn new(kind: LensKind) -> Self {
        Self {
            kind,
            weights: Vec::new(),
            penalties: Vec::new(),
            bonuses: Vec::new(),
        }
    }

    pub fn weight(mut self, metric: LensMetric, weight: f64) -> Self {
        self.weights.push(WeightedMetric { metric, weight });
        self
    }

    pub fn penalty(mut self, adjustment: Adjustment) -> Self {
        self.penalties.push(adjustment);
        self
    }

    pub fn bonus(mut self, adjustment: Adjustment) -> Self {
        self.bonuses.push(adjustment);
        self
    }

    /// Unclamped sum of the baseline, contributions and adjustments, with the
    /// explanation terms in evaluation order.
    pub fn raw_score(&self, c: &Characteristics) -> (f64, Vec<String>) {
        let mut score = BASELINE_SCORE;
        let mut terms = Vec::new();

        for WeightedMetric { metric, weight } in &self.weights {
            let Some(value) = metric.value(c) else {
                continue;
            };
            let contribution = (value - 50.0) / 50.0 * weight * 20.0;
            score += contribution;
            terms.push(format!("{}: {:.1} (contrib: {:+.1})", metric, value, contribution));
        }
        for penalty in &self.penalties {
            if penalty.condition.holds(c) {
                score -= penalty.amount;
                terms.push(format!("Penalty ({}): -{:.1}", penalty.name, penalty.amount));
            }
        }
        for bonus in &self.bonuses {
            if bonus.condition.holds(c) {
                score += bonus.amount;
                terms.push(format!("Bonus ({}): +{:.1}", bonus.name, bonus.amount));
            }
        }
        (score, terms)
    }

    /// Score `c` through this lens. Penalties and bonuses accumulate on the
    /// unclamped sum; the result is clamped once, at the end.
    pub fn score(&self, c: &Characteristics) -> ContextualScore {
        let (raw, terms) = self.raw_score(c);
        let score = round_to(raw.clamp(0.0, 100.0), 1);
        let shown: Vec<&str> = terms.iter().take(EXPLANATION_TERMS).map(String::as_str).collect();
        ContextualScore {
            lens: self.kind,
            score,
            explanation: format!("Score {:.1}/100. {}", score, shown.join("; ")),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let malformed = |reason: String| ConfigValidationError::MalformedLens {
            lens: self.kind.to_string(),
            reason,
        };
        if self.weights.is_empty() {
            return Err(malformed("lens has no weighted metrics".into()));
        }
        for w in &self.weights {
            if !(w.weight.is_finite() && w.weight > 0.0) {
                return Err(malformed(format!(
                    "weight for '{}' must be positive, got {}",
                    w.metric, w.weight
                )));
            }
        }
        for adjustment in self.penalties.iter().chain(&self.bonuses) {
            if !(adjustment.amount.is_finite() && adjustment.amount >= 0.0) {
                return Err(malformed(format!(
                    "adjustment '{}' must have a non-negative amount, got {}",
                    adjustment.name, adjustment.amount
                )));
            }
            let kind = adjustment.condition.characteristic().kind();
            let ok = match &adjustment.condition {
                Condition::Above { threshold, .. } | Condition::Below { threshold, .. } => {
                    threshold.is_finite() && kind == ValueKind::Number
                }
                Condition::Equals { value, .. } => matches!(
                    (kind, value),
                    (ValueKind::Number, CharacteristicValue::Number(_))
                        | (ValueKind::Text, CharacteristicValue::Text(_))
                        | (ValueKind::Flag, CharacteristicValue::Flag(_))
                ),
            };
            if !ok {
                return Err(malformed(format!(
                    "adjustment '{}' has a bound that does not fit '{}'",
                    adjustment.name,
                    adjustment.condition.characteristic()
                )));
            }
        }
        Ok(())
    }
}
