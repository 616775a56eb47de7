use super::{feature_matrix, AnalysisContext, Analyzer, AnalyzerMetrics, AnalyzerOutput};
use crate::error::{Result, UtilityError};
use crate::ml::{encode_labels, RandomForest, TreeTask};
use crate::types::AnalyzerKind;
use crate::utils::round_to;
use serde::{Deserialize, Serialize};
use tracing::debug;

const N_TREES: usize = 50;
const MAX_DEPTH: usize = 8;
const MIN_ROWS: usize = 10;
const MAX_CLASSIFICATION_CLASSES: usize = 10;

/// Random-forest feature importance and information spread.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureImportanceAnalyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concentration {
    High,
    Medium,
    Low,
}

impl Concentration {
    pub fn from_top_share(top1: f64) -> Self {
        if top1 > 0.7 {
            Self::High
        } else if top1 > 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRank {
    pub feature: String,
    pub importance: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformationDistribution {
    pub top_1_contribution: f64,
    pub top_3_contribution: f64,
    pub top_5_contribution: f64,
    pub features_above_1pct: usize,
    pub features_above_5pct: usize,
    pub concentration: Concentration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportanceMetrics {
    pub target_column: String,
    pub task_type: String,
    pub rankings: Vec<FeatureRank>,
    pub max_importance: f64,
    pub mean_importance: f64,
    pub gini_coefficient: f64,
    pub distribution: InformationDistribution,
    pub information_score: f64,
}

/// Gini coefficient of a set of non-negative importances.
pub fn gini_coefficient(importances: &[f64]) -> f64 {
    let n = importances.len();
    let total: f64 = importances.iter().sum();
    if n == 0 || total <= 0.0 {
        return 0.0;
    }
    let mut sorted = importances.to_vec();
    sorted.sort_by(f64::total_cmp);
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, v)| (i + 1) as f64 * v)
        .sum();
    let n = n as f64;
    2.0 * weighted / (n * total) - (n + 1.0) / n
}

/// Cumulative shares and counts over importances.
pub fn information_distribution(importances: &[f64]) -> InformationDistribution {
    let total: f64 = importances.iter().sum();
    let mut sorted = importances.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let share = |k: usize| {
        if total <= 0.0 {
            0.0
        } else {
            sorted.iter().take(k).sum::<f64>() / total
        }
    };
    let top1 = share(1);
    InformationDistribution {
        top_1_contribution: round_to(top1, 3),
        top_3_contribution: round_to(share(3), 3),
        top_5_contribution: round_to(share(5), 3),
        features_above_1pct: importances.iter().filter(|v| **v > 0.01).count(),
        features_above_5pct: importances.iter().filter(|v| **v > 0.05).count(),
        concentration: Concentration::from_top_share(top1),
    }
}

/// Score rewarding spread-out information and penalising a weak signal.
pub fn information_score(dist: &InformationDistribution, max_importance: f64) -> f64 {
    let top1 = dist.top_1_contribution;
    let mut score: f64 = if top1 > 0.8 {
        30.0
    } else if top1 > 0.6 {
        50.0
    } else if top1 > 0.4 {
        70.0
    } else {
        85.0
    };

    if dist.features_above_5pct >= 5 {
        score += 10.0;
    } else if dist.features_above_5pct >= 3 {
        score += 5.0;
    }
    if dist.features_above_1pct >= 10 {
        score += 5.0;
    } else if dist.features_above_1pct >= 5 {
        score += 3.0;
    }
    if max_importance < 0.1 {
        score -= 20.0;
    } else if max_importance < 0.2 {
        score -= 10.0;
    }
    score.clamp(0.0, 100.0)
}

impl Analyzer for FeatureImportanceAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::FeatureImportance
    }

    fn run(&self, ctx: &AnalysisContext<'_>) -> Result<AnalyzerOutput> {
        let dataset = ctx.dataset;
        let target = ctx.require_target()?;
        let features = dataset.numeric_features(Some(target));
        if features.is_empty() {
            return Err(UtilityError::InsufficientData(
                "Feature importance needs at least one numeric feature".to_string(),
            ));
        }

        let labels = dataset.string_values(target)?;
        let rows: Vec<usize> = (0..dataset.height()).filter(|&r| labels[r].is_some()).collect();
        if rows.len() < MIN_ROWS {
            return Err(UtilityError::InsufficientData(format!(
                "Feature importance needs at least {} labelled rows",
                MIN_ROWS
            )));
        }
        let (names, x) = feature_matrix(dataset, &features, &rows)?;
        if names.is_empty() {
            return Err(UtilityError::InsufficientData(
                "Every numeric feature is empty".to_string(),
            ));
        }

        let present: Vec<String> = rows.iter().filter_map(|&r| labels[r].clone()).collect();
        let (encoded, classes) = encode_labels(&present);
        let (task_type, task, y) = if classes.len() <= MAX_CLASSIFICATION_CLASSES {
            let y: Vec<f64> = encoded.iter().map(|&c| c as f64).collect();
            (
                "classification",
                TreeTask::Classification {
                    n_classes: classes.len(),
                },
                y,
            )
        } else {
            let values = dataset.f64_values(target)?;
            let y: Vec<f64> = rows.iter().filter_map(|&r| values[r]).collect();
            if y.len() != rows.len() {
                return Err(UtilityError::InsufficientData(format!(
                    "Target column '{}' has too many classes and is not numeric",
                    target
                )));
            }
            ("regression", TreeTask::Regression, y)
        };

        let forest = RandomForest::fit(&x, &y, task, N_TREES, MAX_DEPTH, ctx.config.random_seed);
        let importances = forest.feature_importances();

        let mut rankings: Vec<FeatureRank> = names
            .iter()
            .zip(&importances)
            .map(|(name, imp)| FeatureRank {
                feature: name.clone(),
                importance: round_to(*imp, 4),
                rank: 0,
            })
            .collect();
        rankings.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        for (i, r) in rankings.iter_mut().enumerate() {
            r.rank = i + 1;
        }

        let max_importance = importances.iter().copied().fold(0.0, f64::max);
        let mean_importance = importances.iter().sum::<f64>() / importances.len() as f64;
        let distribution = information_distribution(&importances);
        let score = information_score(&distribution, max_importance);

        debug!(
            "Feature importance: top share {:.3} over {} features, score {:.1}",
            distribution.top_1_contribution,
            names.len(),
            score
        );

        let recommendations = recommendations(&rankings, &distribution, max_importance, score);
        let metrics = FeatureImportanceMetrics {
            target_column: target.to_string(),
            task_type: task_type.to_string(),
            rankings,
            max_importance: round_to(max_importance, 4),
            mean_importance: round_to(mean_importance, 4),
            gini_coefficient: round_to(gini_coefficient(&importances), 4),
            distribution,
            information_score: round_to(score, 1),
        };

        Ok(AnalyzerOutput::new(score, AnalyzerMetrics::FeatureImportance(metrics))
            .with_recommendations(recommendations))
    }
}

fn recommendations(
    rankings: &[FeatureRank],
    dist: &InformationDistribution,
    max_importance: f64,
    score: f64,
) -> Vec<String> {
    let mut recs = Vec::new();
    recs.push(
        if score >= 80.0 {
            "Excellent feature information distribution"
        } else if score >= 65.0 {
            "Good feature importance distribution"
        } else if score >= 45.0 {
            "Moderate feature importance distribution - consider feature selection"
        } else {
            "Poor feature importance distribution - review feature relevance"
        }
        .to_string(),
    );
    if dist.top_1_contribution > 0.7 {
        recs.push(format!(
            "Single feature dominates ({:.1}%) - check for data leakage",
            dist.top_1_contribution * 100.0
        ));
    }
    if dist.features_above_5pct < 3 {
        recs.push("Few highly important features - consider feature engineering".to_string());
    }
    if max_importance < 0.1 {
        recs.push("Low maximum importance suggests weak predictive signal".to_string());
    }
    let top: Vec<&str> = rankings.iter().take(3).map(|r| r.feature.as_str()).collect();
    recs.push(format!("Focus on top features: {}", top.join(", ")));
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::dataset::Dataset;
    use polars::prelude::*;

    #[test]
    fn test_gini_coefficient() {
        assert!(gini_coefficient(&[0.25, 0.25, 0.25, 0.25]).abs() < 1e-12);
        // One feature carries everything
        assert!((gini_coefficient(&[0.0, 0.0, 0.0, 1.0]) - 0.75).abs() < 1e-12);
        assert_eq!(gini_coefficient(&[]), 0.0);
    }

    #[test]
    fn test_information_distribution() {
        let dist = information_distribution(&[0.5, 0.3, 0.15, 0.05]);
        assert_eq!(dist.top_1_contribution, 0.5);
        assert_eq!(dist.top_3_contribution, 0.95);
        assert_eq!(dist.top_5_contribution, 1.0);
        assert_eq!(dist.features_above_5pct, 3);
        assert_eq!(dist.features_above_1pct, 4);
        assert_eq!(dist.concentration, Concentration::Medium);
    }

    #[test]
    fn test_information_score() {
        let dominant = information_distribution(&[0.9, 0.05, 0.05]);
        assert_eq!(information_score(&dominant, 0.9), 30.0);

        let spread = information_distribution(&[0.2, 0.2, 0.2, 0.2, 0.2]);
        // 85 base, +10 for five useful, +3 for five significant
        assert_eq!(information_score(&spread, 0.2), 98.0);

        let weak = information_distribution(&[0.05; 20]);
        assert_eq!(information_score(&weak, 0.05), 70.0);
    }

    #[test]
    fn test_signal_feature_ranks_first() {
        let signal: Vec<f64> = (0..80).map(|i| i as f64).collect();
        let noise: Vec<f64> = (0..80).map(|i| ((i * 7) % 5) as f64).collect();
        let label: Vec<i32> = (0..80).map(|i| i32::from(i >= 40)).collect();
        let df = df!["signal" => signal, "noise" => noise, "label" => label].unwrap();
        let ds = Dataset::new(df).unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&ds, Some("label"), &config);
        let out = FeatureImportanceAnalyzer.run(&ctx).unwrap();
        let AnalyzerMetrics::FeatureImportance(m) = out.metrics else {
            panic!("wrong metrics variant");
        };
        assert_eq!(m.rankings[0].feature, "signal");
        assert_eq!(m.rankings[0].rank, 1);
        assert_eq!(m.task_type, "classification");
    }
}
