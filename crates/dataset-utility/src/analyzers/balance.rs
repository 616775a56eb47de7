use super::{pct2, target_labels, AnalysisContext, Analyzer, AnalyzerMetrics, AnalyzerOutput};
use crate::error::{Result, UtilityError};
use crate::types::AnalyzerKind;
use crate::utils::round_to;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Targets with more distinct values than this are treated as regression.
pub const MAX_CLASSES: usize = 20;

/// Target class distribution analysis.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassBalanceAnalyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Binary,
    Multiclass,
    Regression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceLevel {
    Excellent,
    Good,
    Fair,
    Imbalanced,
    SeverelyImbalanced,
    NotApplicable,
}

impl BalanceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Imbalanced => "imbalanced",
            Self::SeverelyImbalanced => "severely_imbalanced",
            Self::NotApplicable => "not_applicable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassShare {
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassBalanceMetrics {
    pub target_column: String,
    pub task_type: TaskType,
    pub n_classes: usize,
    pub labelled_rows: usize,
    /// Classes sorted by count descending (empty for regression targets).
    pub classes: Vec<ClassShare>,
    pub majority_class: Option<String>,
    pub minority_class: Option<String>,
    pub minority_class_percentage: Option<f64>,
    pub imbalance_ratio: Option<f64>,
    pub gini_impurity: Option<f64>,
    /// Entropy divided by log2(classes), in [0, 1].
    pub normalized_entropy: Option<f64>,
    pub balance_level: BalanceLevel,
}

/// Level and score of a binary target from its minority share.
pub fn binary_balance(minority_pct: f64) -> (BalanceLevel, f64) {
    let m = minority_pct;
    if m >= 40.0 {
        (BalanceLevel::Excellent, 100.0)
    } else if m >= 30.0 {
        (BalanceLevel::Good, 90.0 - (40.0 - m) * 1.5)
    } else if m >= 20.0 {
        (BalanceLevel::Fair, 75.0 - (30.0 - m) * 2.0)
    } else if m >= 10.0 {
        (BalanceLevel::Imbalanced, 60.0 - (20.0 - m) * 2.5)
    } else {
        (
            BalanceLevel::SeverelyImbalanced,
            (35.0 - (10.0 - m) * 1.5).max(20.0),
        )
    }
}

/// Level and score of a multiclass target from its smallest class share.
pub fn multiclass_balance(minority_pct: f64) -> (BalanceLevel, f64) {
    let m = minority_pct;
    if m >= 15.0 {
        (BalanceLevel::Excellent, 95.0)
    } else if m >= 10.0 {
        (BalanceLevel::Good, 85.0 - (15.0 - m) * 2.0)
    } else if m >= 5.0 {
        (BalanceLevel::Fair, 70.0 - (10.0 - m) * 2.5)
    } else if m >= 2.0 {
        (BalanceLevel::Imbalanced, 55.0 - (5.0 - m) * 3.0)
    } else {
        (
            BalanceLevel::SeverelyImbalanced,
            (25.0 - (2.0 - m) * 5.0).max(15.0),
        )
    }
}

impl Analyzer for ClassBalanceAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::ClassBalance
    }

    fn run(&self, ctx: &AnalysisContext<'_>) -> Result<AnalyzerOutput> {
        let target = ctx.require_target()?;
        let labels = target_labels(ctx, target)?;
        if labels.is_empty() {
            return Err(UtilityError::InsufficientData(format!(
                "Target column '{}' has no values",
                target
            )));
        }

        // Insertion order keeps ties deterministic
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (_, label) in &labels {
            let entry = counts.entry(label.as_str()).or_insert(0);
            if *entry == 0 {
                order.push(label.clone());
            }
            *entry += 1;
        }
        let n_classes = order.len();
        let total = labels.len();

        if n_classes < 2 {
            return Err(UtilityError::InsufficientData(format!(
                "Target column '{}' has a single class",
                target
            )));
        }

        if n_classes > MAX_CLASSES {
            debug!("Class balance: '{}' looks continuous ({} values)", target, n_classes);
            let metrics = ClassBalanceMetrics {
                target_column: target.to_string(),
                task_type: TaskType::Regression,
                n_classes,
                labelled_rows: total,
                classes: Vec::new(),
                majority_class: None,
                minority_class: None,
                minority_class_percentage: None,
                imbalance_ratio: None,
                gini_impurity: None,
                normalized_entropy: None,
                balance_level: BalanceLevel::NotApplicable,
            };
            return Ok(AnalyzerOutput::new(85.0, AnalyzerMetrics::ClassBalance(metrics))
                .with_recommendations(vec![
                    "Continuous target - class balance does not apply; check the target distribution for skew".to_string(),
                ]));
        }

        let mut classes: Vec<ClassShare> = order
            .iter()
            .map(|label| {
                let count = counts[label.as_str()];
                ClassShare {
                    label: label.clone(),
                    count,
                    percentage: pct2(count, total),
                }
            })
            .collect();
        classes.sort_by(|a, b| b.count.cmp(&a.count));

        let majority = &classes[0];
        let minority = &classes[classes.len() - 1];
        let minority_pct = minority.count as f64 / total as f64 * 100.0;
        let ratio = majority.count as f64 / minority.count as f64;

        let probs: Vec<f64> = classes.iter().map(|c| c.count as f64 / total as f64).collect();
        let gini = 1.0 - probs.iter().map(|p| p * p).sum::<f64>();
        let entropy: f64 = -probs.iter().map(|p| p * p.log2()).sum::<f64>();
        let normalized_entropy = entropy / (n_classes as f64).log2();

        let (task_type, (level, score)) = if n_classes == 2 {
            (TaskType::Binary, binary_balance(minority_pct))
        } else {
            (TaskType::Multiclass, multiclass_balance(minority_pct))
        };

        debug!(
            "Class balance: {} classes, minority {:.2}%, ratio {:.2}, score {:.1}",
            n_classes, minority_pct, ratio, score
        );

        let metrics = ClassBalanceMetrics {
            target_column: target.to_string(),
            task_type,
            n_classes,
            labelled_rows: total,
            majority_class: Some(majority.label.clone()),
            minority_class: Some(minority.label.clone()),
            minority_class_percentage: Some(round_to(minority_pct, 2)),
            imbalance_ratio: Some(round_to(ratio, 2)),
            gini_impurity: Some(round_to(gini, 4)),
            normalized_entropy: Some(round_to(normalized_entropy, 4)),
            balance_level: level,
            classes,
        };

        let recommendations = recommendations(level, ratio);
        let mut critical = Vec::new();
        if level == BalanceLevel::SeverelyImbalanced {
            critical.push(format!(
                "Severe class imbalance: minority class is {:.2}% of labelled rows (ratio {:.1}:1)",
                minority_pct, ratio
            ));
        }

        Ok(AnalyzerOutput::new(score, AnalyzerMetrics::ClassBalance(metrics))
            .with_recommendations(recommendations)
            .with_critical_issues(critical))
    }
}

fn recommendations(level: BalanceLevel, ratio: f64) -> Vec<String> {
    let mut recs = Vec::new();
    match level {
        BalanceLevel::Excellent | BalanceLevel::Good => {
            recs.push("Class distribution is well balanced for standard training".to_string());
        }
        BalanceLevel::Fair => {
            recs.push("Mild imbalance - use stratified splits and monitor per-class metrics".to_string());
        }
        BalanceLevel::Imbalanced => {
            recs.push("Consider class weights or resampling (SMOTE, undersampling)".to_string());
            recs.push("Evaluate with precision, recall and F1 rather than accuracy".to_string());
        }
        BalanceLevel::SeverelyImbalanced => {
            recs.push("Severe imbalance - treat as anomaly detection or use cost-sensitive learning".to_string());
            recs.push("Evaluate with precision-recall AUC; accuracy is misleading here".to_string());
        }
        BalanceLevel::NotApplicable => {}
    }
    if ratio > 10.0 {
        recs.push(format!(
            "Majority class outnumbers the minority {:.1} to 1; collect more minority samples if possible",
            ratio
        ));
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::dataset::Dataset;
    use polars::prelude::*;

    fn run(df: DataFrame, target: Option<&str>) -> Result<AnalyzerOutput> {
        let ds = Dataset::new(df).unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&ds, target, &config);
        ClassBalanceAnalyzer.run(&ctx)
    }

    fn metrics(out: &AnalyzerOutput) -> &ClassBalanceMetrics {
        match &out.metrics {
            AnalyzerMetrics::ClassBalance(m) => m,
            _ => panic!("wrong metrics variant"),
        }
    }

    #[test]
    fn test_binary_bands() {
        assert_eq!(binary_balance(50.0), (BalanceLevel::Excellent, 100.0));
        assert_eq!(binary_balance(30.0), (BalanceLevel::Good, 75.0));
        assert_eq!(binary_balance(20.0), (BalanceLevel::Fair, 55.0));
        assert_eq!(binary_balance(10.0), (BalanceLevel::Imbalanced, 35.0));
        assert_eq!(binary_balance(0.5).0, BalanceLevel::SeverelyImbalanced);
        assert_eq!(binary_balance(0.5).1, 20.75);
    }

    #[test]
    fn test_multiclass_bands() {
        assert_eq!(multiclass_balance(33.3), (BalanceLevel::Excellent, 95.0));
        assert_eq!(multiclass_balance(10.0), (BalanceLevel::Good, 75.0));
        assert_eq!(multiclass_balance(0.0), (BalanceLevel::SeverelyImbalanced, 15.0));
    }

    #[test]
    fn test_balanced_binary_target() {
        let df = df!["label" => [0, 1, 0, 1, 0, 1]].unwrap();
        let out = run(df, Some("label")).unwrap();
        let m = metrics(&out);
        assert_eq!(m.task_type, TaskType::Binary);
        assert_eq!(m.imbalance_ratio, Some(1.0));
        assert_eq!(m.gini_impurity, Some(0.5));
        assert_eq!(m.normalized_entropy, Some(1.0));
        assert_eq!(out.score, 100.0);
    }

    #[test]
    fn test_severe_imbalance_is_critical() {
        let labels: Vec<i32> = (0..200).map(|i| i32::from(i == 0)).collect();
        let df = df!["label" => labels].unwrap();
        let out = run(df, Some("label")).unwrap();
        let m = metrics(&out);
        assert_eq!(m.balance_level, BalanceLevel::SeverelyImbalanced);
        assert_eq!(m.minority_class.as_deref(), Some("1"));
        assert_eq!(m.imbalance_ratio, Some(199.0));
        assert_eq!(out.critical_issues.len(), 1);
    }

    #[test]
    fn test_continuous_target_is_regression() {
        let values: Vec<f64> = (0..50).map(|i| i as f64 * 0.5).collect();
        let df = df!["y" => values].unwrap();
        let out = run(df, Some("y")).unwrap();
        assert_eq!(metrics(&out).task_type, TaskType::Regression);
        assert_eq!(metrics(&out).balance_level, BalanceLevel::NotApplicable);
        assert_eq!(out.score, 85.0);
    }

    #[test]
    fn test_missing_target_is_insufficient() {
        let df = df!["x" => [1, 2]].unwrap();
        assert!(matches!(
            run(df, None),
            Err(UtilityError::InsufficientData(_))
        ));
    }
}
