//! Persona tagging.
//!
//! A persona is a use-case hypothesis ("good for anomaly detection", "good
//! for fairness audits") inferred from [`Characteristics`] by weighted
//! predicate rules. Tagging is a pure function of the characteristics
//! record and the rule table: multi-label, sorted by confidence, with a
//! default general-purpose tag when no rule clears its threshold.

mod rules;

pub use rules::{Comparator, PersonaRule, Predicate, RuleEvaluation};

use crate::characteristics::Characteristics;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Confidence assigned to the synthesized default tag.
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

const DEFAULT_REASON: &str = "No specific use case patterns detected - suitable for general ML tasks";

/// A research or production use case a dataset may suit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Persona {
    #[serde(rename = "#AnomalyDetection")]
    AnomalyDetection,
    #[serde(rename = "#FraudResearch")]
    FraudResearch,
    #[serde(rename = "#FairnessAudit")]
    FairnessAudit,
    #[serde(rename = "#GeneralPurposeML")]
    GeneralPurposeML,
    #[serde(rename = "#PredictiveModeling")]
    PredictiveModeling,
    #[serde(rename = "#ImbalancedLearning")]
    ImbalancedLearning,
    #[serde(rename = "#ModelRobustnessTesting")]
    ModelRobustnessTesting,
    #[serde(rename = "#AdversarialTraining")]
    AdversarialTraining,
    #[serde(rename = "#SociologicalAnalysis")]
    SociologicalAnalysis,
    #[serde(rename = "#DataQualityBenchmark")]
    DataQualityBenchmark,
}

impl Persona {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::AnomalyDetection => "#AnomalyDetection",
            Self::FraudResearch => "#FraudResearch",
            Self::FairnessAudit => "#FairnessAudit",
            Self::GeneralPurposeML => "#GeneralPurposeML",
            Self::PredictiveModeling => "#PredictiveModeling",
            Self::ImbalancedLearning => "#ImbalancedLearning",
            Self::ModelRobustnessTesting => "#ModelRobustnessTesting",
            Self::AdversarialTraining => "#AdversarialTraining",
            Self::SociologicalAnalysis => "#SociologicalAnalysis",
            Self::DataQualityBenchmark => "#DataQualityBenchmark",
        }
    }

    /// One-line advice appended to the persona summary.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::AnomalyDetection => "Excellent for detecting rare events and outliers",
            Self::FraudResearch => "Ideal for fraud detection and financial security research",
            Self::FairnessAudit => "Valuable for bias detection and algorithmic fairness studies",
            Self::GeneralPurposeML => "Well-balanced dataset suitable for standard ML tasks",
            Self::PredictiveModeling => "Strong predictive signals for forecasting applications",
            Self::ImbalancedLearning => "Perfect for testing imbalanced learning techniques",
            Self::ModelRobustnessTesting => "Useful for testing model resilience to noisy data",
            Self::AdversarialTraining => "Challenging dataset for adversarial ML research",
            Self::SociologicalAnalysis => "Rich in demographic patterns for social science research",
            Self::DataQualityBenchmark => "Contains quality issues useful for data cleaning research",
        }
    }

    /// Sentence used in the executive summary.
    pub fn description(&self) -> &'static str {
        match self {
            Self::AnomalyDetection => {
                "This dataset is a premier candidate for anomaly detection research"
            }
            Self::FraudResearch => {
                "This dataset is excellent for fraud detection and financial security research"
            }
            Self::FairnessAudit => {
                "This dataset is valuable for bias detection and algorithmic fairness studies"
            }
            Self::GeneralPurposeML => {
                "This dataset is well-suited for standard machine learning applications"
            }
            Self::PredictiveModeling => {
                "This dataset shows strong potential for forecasting and predictive analytics"
            }
            Self::ImbalancedLearning => {
                "This dataset is ideal for testing imbalanced learning techniques"
            }
            Self::ModelRobustnessTesting => {
                "This dataset is useful for testing model resilience and robustness"
            }
            Self::AdversarialTraining => {
                "This dataset presents challenges suitable for adversarial ML research"
            }
            Self::SociologicalAnalysis => {
                "This dataset contains rich patterns for social science research"
            }
            Self::DataQualityBenchmark => {
                "This dataset serves as a useful benchmark for data quality research"
            }
        }
    }

    /// Persona-specific synthesis recommendation, when there is one.
    pub fn recommendation(&self) -> Option<&'static str> {
        match self {
            Self::AnomalyDetection => Some("Leverage class imbalance for anomaly detection algorithms"),
            Self::FairnessAudit => Some("Implement bias detection workflows and fairness metrics"),
            Self::GeneralPurposeML => {
                Some("Apply standard ML preprocessing and feature engineering techniques")
            }
            Self::PredictiveModeling => {
                Some("Focus on feature selection and model validation strategies")
            }
            Self::ModelRobustnessTesting => {
                Some("Use data quality issues as robustness testing opportunities")
            }
            _ => None,
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A persona the dataset was tagged with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaTag {
    pub persona: Persona,
    /// In [0, 1], rounded to three decimals.
    pub confidence: f64,
    pub matched_reasons: Vec<String>,
}

/// Output of persona tagging for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaAnalysis {
    /// Sorted by confidence, highest first. Never empty.
    pub tags: Vec<PersonaTag>,
    pub primary_persona: Persona,
    pub summary: String,
}

impl PersonaAnalysis {
    pub fn personas(&self) -> impl Iterator<Item = Persona> + '_ {
        self.tags.iter().map(|t| t.persona)
    }

    pub fn primary_confidence(&self) -> f64 {
        self.tags.first().map(|t| t.confidence).unwrap_or(0.0)
    }
}

/// Evaluates a rule table against characteristics.
#[derive(Debug, Clone, Copy)]
pub struct PersonaEngine<'a> {
    rules: &'a [PersonaRule],
}

impl<'a> PersonaEngine<'a> {
    pub fn new(rules: &'a [PersonaRule]) -> Self {
        Self { rules }
    }

    pub fn tag(&self, characteristics: &Characteristics) -> PersonaAnalysis {
        let mut tags: Vec<PersonaTag> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let eval = rule.evaluate(characteristics);
                debug!(
                    "Persona {}: confidence {:.3} (threshold {})",
                    rule.persona, eval.confidence, rule.threshold
                );
                (eval.evaluable && eval.confidence >= rule.threshold).then(|| PersonaTag {
                    persona: rule.persona,
                    confidence: eval.confidence,
                    matched_reasons: eval.matched_reasons,
                })
            })
            .collect();

        // Stable: equal confidences keep rule-table order
        tags.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        if tags.is_empty() {
            tags.push(PersonaTag {
                persona: Persona::GeneralPurposeML,
                confidence: DEFAULT_CONFIDENCE,
                matched_reasons: vec![DEFAULT_REASON.to_string()],
            });
        }

        let primary = &tags[0];
        let summary = summarize(primary, &tags);
        PersonaAnalysis {
            primary_persona: primary.persona,
            summary,
            tags,
        }
    }
}

fn summarize(primary: &PersonaTag, tags: &[PersonaTag]) -> String {
    let mut summary = format!(
        "Primary persona: {} (confidence: {:.2}). ",
        primary.persona, primary.confidence
    );
    if tags.len() > 1 {
        let others: Vec<&str> = tags[1..].iter().map(|t| t.persona.tag()).collect();
        summary.push_str(&format!("Also suitable for: {}. ", others.join(", ")));
    }
    summary.push_str(primary.persona.advice());
    summary
}
