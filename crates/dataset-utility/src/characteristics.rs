//! Flattened dataset characteristics.
//!
//! [`Characteristics`] is derived purely from successful analyzer results
//! plus the dataset overview. Persona rules and scoring lenses read it by
//! [`Characteristic`] name; a characteristic whose source analyzer did not
//! succeed is absent rather than defaulted.

use crate::analyzers::AnalyzerMetrics;
use crate::dataset::DatasetOverview;
use crate::types::AnalyzerResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column name fragments that suggest demographic attributes.
pub const DEMOGRAPHIC_KEYWORDS: [&str; 9] = [
    "age",
    "gender",
    "race",
    "ethnicity",
    "income",
    "education",
    "location",
    "zip",
    "postal",
];

/// The value type a characteristic carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Text,
    Flag,
}

/// A named characteristic that rules and lenses can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Characteristic {
    MissingPercentage,
    DataCompleteness,
    DuplicatePercentage,
    DuplicateScore,
    TypeConsistencyScore,
    TypeConsistencyIssues,
    OutlierPercentage,
    OutlierScore,
    ClassBalanceScore,
    ClassBalanceLevel,
    ClassImbalanceRatio,
    MinorityClassPercentage,
    CorrelationScore,
    FeatureCorrelationIssues,
    MulticollinearityRisk,
    MlUsabilityScore,
    InformationScore,
    FeatureImportanceDistribution,
    TopFeatureContribution,
    UsefulFeatures,
    DataSeparabilityScore,
    FeatureCount,
    SampleCount,
    HasDemographicFeatures,
}

impl Characteristic {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::ClassBalanceLevel
            | Self::MulticollinearityRisk
            | Self::FeatureImportanceDistribution => ValueKind::Text,
            Self::HasDemographicFeatures => ValueKind::Flag,
            _ => ValueKind::Number,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingPercentage => "missing_percentage",
            Self::DataCompleteness => "data_completeness",
            Self::DuplicatePercentage => "duplicate_percentage",
            Self::DuplicateScore => "duplicate_score",
            Self::TypeConsistencyScore => "type_consistency_score",
            Self::TypeConsistencyIssues => "type_consistency_issues",
            Self::OutlierPercentage => "outlier_percentage",
            Self::OutlierScore => "outlier_score",
            Self::ClassBalanceScore => "class_balance_score",
            Self::ClassBalanceLevel => "class_balance_level",
            Self::ClassImbalanceRatio => "class_imbalance_ratio",
            Self::MinorityClassPercentage => "minority_class_percentage",
            Self::CorrelationScore => "correlation_score",
            Self::FeatureCorrelationIssues => "feature_correlation_issues",
            Self::MulticollinearityRisk => "multicollinearity_risk",
            Self::MlUsabilityScore => "ml_usability_score",
            Self::InformationScore => "information_score",
            Self::FeatureImportanceDistribution => "feature_importance_distribution",
            Self::TopFeatureContribution => "top_feature_contribution",
            Self::UsefulFeatures => "useful_features",
            Self::DataSeparabilityScore => "data_separability_score",
            Self::FeatureCount => "feature_count",
            Self::SampleCount => "sample_count",
            Self::HasDemographicFeatures => "has_demographic_features",
        }
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A characteristic value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl CharacteristicValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(v) => write!(f, "{}", v),
            Self::Number(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Flattened summary of one analysis, one per request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Characteristics {
    pub missing_percentage: Option<f64>,
    pub data_completeness: Option<f64>,
    pub duplicate_percentage: Option<f64>,
    pub duplicate_score: Option<f64>,
    pub type_consistency_score: Option<f64>,
    pub type_consistency_issues: Option<usize>,
    pub outlier_percentage: Option<f64>,
    pub outlier_score: Option<f64>,
    pub class_balance_score: Option<f64>,
    pub class_balance_level: Option<String>,
    pub class_imbalance_ratio: Option<f64>,
    pub minority_class_percentage: Option<f64>,
    pub correlation_score: Option<f64>,
    pub feature_correlation_issues: Option<usize>,
    pub multicollinearity_risk: Option<String>,
    pub ml_usability_score: Option<f64>,
    pub information_score: Option<f64>,
    pub feature_importance_distribution: Option<String>,
    pub top_feature_contribution: Option<f64>,
    pub useful_features: Option<usize>,
    pub data_separability_score: Option<f64>,
    pub feature_count: usize,
    pub sample_count: usize,
    pub has_demographic_features: bool,
}

impl Characteristics {
    /// Derive characteristics from analyzer results and the dataset overview.
    ///
    /// Failed and not-applicable results contribute nothing.
    pub fn extract<'a>(
        results: impl IntoIterator<Item = &'a AnalyzerResult>,
        overview: &DatasetOverview,
    ) -> Self {
        let mut c = Self {
            feature_count: overview.columns,
            sample_count: overview.rows,
            has_demographic_features: overview
                .column_names
                .iter()
                .any(|name| has_demographic_keyword(name)),
            ..Default::default()
        };

        for result in results {
            let (Some(score), Some(metrics)) = (result.score(), result.metrics.as_ref()) else {
                continue;
            };
            match metrics {
                AnalyzerMetrics::Completeness(m) => {
                    c.missing_percentage = Some(m.missing_percentage);
                    c.data_completeness = Some(score);
                }
                AnalyzerMetrics::Duplicates(m) => {
                    c.duplicate_percentage = Some(m.duplicate_percentage);
                    c.duplicate_score = Some(score);
                }
                AnalyzerMetrics::TypeConsistency(m) => {
                    c.type_consistency_score = Some(score);
                    c.type_consistency_issues = Some(m.total_issues());
                }
                AnalyzerMetrics::Outliers(m) => {
                    c.outlier_percentage = Some(m.outlier_percentage);
                    c.outlier_score = Some(score);
                }
                AnalyzerMetrics::ClassBalance(m) => {
                    c.class_balance_score = Some(score);
                    c.class_balance_level = Some(m.balance_level.as_str().to_string());
                    c.class_imbalance_ratio = m.imbalance_ratio;
                    c.minority_class_percentage = m.minority_class_percentage;
                }
                AnalyzerMetrics::Correlation(m) => {
                    c.correlation_score = Some(score);
                    c.feature_correlation_issues = Some(m.issue_count());
                    c.multicollinearity_risk = Some(risk_name(m.multicollinearity_risk).to_string());
                }
                AnalyzerMetrics::BaselineMl(_) => {
                    c.ml_usability_score = Some(score);
                }
                AnalyzerMetrics::FeatureImportance(m) => {
                    c.information_score = Some(score);
                    c.feature_importance_distribution =
                        Some(m.distribution.concentration.as_str().to_string());
                    c.top_feature_contribution = Some(m.distribution.top_1_contribution);
                    c.useful_features = Some(m.distribution.features_above_5pct);
                }
                AnalyzerMetrics::Separability(_) => {
                    c.data_separability_score = Some(score);
                }
            }
        }
        c
    }

    /// Look up a characteristic by name; `None` when absent.
    pub fn get(&self, characteristic: Characteristic) -> Option<CharacteristicValue> {
        use CharacteristicValue::{Flag, Number, Text};
        let count = |v: Option<usize>| v.map(|n| Number(n as f64));
        match characteristic {
            Characteristic::MissingPercentage => self.missing_percentage.map(Number),
            Characteristic::DataCompleteness => self.data_completeness.map(Number),
            Characteristic::DuplicatePercentage => self.duplicate_percentage.map(Number),
            Characteristic::DuplicateScore => self.duplicate_score.map(Number),
            Characteristic::TypeConsistencyScore => self.type_consistency_score.map(Number),
            Characteristic::TypeConsistencyIssues => count(self.type_consistency_issues),
            Characteristic::OutlierPercentage => self.outlier_percentage.map(Number),
            Characteristic::OutlierScore => self.outlier_score.map(Number),
            Characteristic::ClassBalanceScore => self.class_balance_score.map(Number),
            Characteristic::ClassBalanceLevel => self.class_balance_level.clone().map(Text),
            Characteristic::ClassImbalanceRatio => self.class_imbalance_ratio.map(Number),
            Characteristic::MinorityClassPercentage => self.minority_class_percentage.map(Number),
            Characteristic::CorrelationScore => self.correlation_score.map(Number),
            Characteristic::FeatureCorrelationIssues => count(self.feature_correlation_issues),
            Characteristic::MulticollinearityRisk => self.multicollinearity_risk.clone().map(Text),
            Characteristic::MlUsabilityScore => self.ml_usability_score.map(Number),
            Characteristic::InformationScore => self.information_score.map(Number),
            Characteristic::FeatureImportanceDistribution => {
                self.feature_importance_distribution.clone().map(Text)
            }
            Characteristic::TopFeatureContribution => self.top_feature_contribution.map(Number),
            Characteristic::UsefulFeatures => count(self.useful_features),
            Characteristic::DataSeparabilityScore => self.data_separability_score.map(Number),
            Characteristic::FeatureCount => Some(Number(self.feature_count as f64)),
            Characteristic::SampleCount => Some(Number(self.sample_count as f64)),
            Characteristic::HasDemographicFeatures => Some(Flag(self.has_demographic_features)),
        }
    }

    /// Numeric lookup; `None` when absent or not numeric.
    pub fn number(&self, characteristic: Characteristic) -> Option<f64> {
        self.get(characteristic).and_then(|v| v.as_number())
    }
}

fn has_demographic_keyword(column: &str) -> bool {
    let lower = column.to_lowercase();
    DEMOGRAPHIC_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn risk_name(risk: crate::analyzers::MulticollinearityRisk) -> &'static str {
    use crate::analyzers::MulticollinearityRisk;
    match risk {
        MulticollinearityRisk::Low => "low",
        MulticollinearityRisk::Medium => "medium",
        MulticollinearityRisk::High => "high",
    }
}
