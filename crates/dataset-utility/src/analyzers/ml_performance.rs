use super::{feature_matrix, AnalysisContext, Analyzer, AnalyzerMetrics, AnalyzerOutput};
use crate::error::{Result, UtilityError};
use crate::ml::{
    accuracy, encode_labels, r2_score, seeded_rng, take_rows, train_test_split, DecisionTree,
    LinearRegression, LogisticRegression, Matrix, TreeParams, TreeTask,
};
use crate::types::AnalyzerKind;
use crate::utils::{mean, round_to};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Targets with at most this many classes are treated as classification.
const MAX_CLASSIFICATION_CLASSES: usize = 10;
const MIN_ROWS: usize = 10;
const TEST_FRACTION: f64 = 0.2;

/// Baseline model performance as a proxy for predictive signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineMlAnalyzer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub model: String,
    /// Accuracy for classification, R² for regression.
    pub metric: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlPerformanceMetrics {
    pub target_column: String,
    /// "classification" or "regression".
    pub task_type: String,
    pub features_used: usize,
    pub samples_used: usize,
    pub train_samples: usize,
    pub test_samples: usize,
    pub models: Vec<ModelScore>,
    pub best_model: String,
    pub best_metric: f64,
    pub dummy_metric: f64,
    pub ml_usability_score: f64,
}

/// Classification score from the best accuracy and the dummy baseline.
pub fn classification_score(best: f64, dummy: f64) -> f64 {
    let base = if best >= 0.9 {
        95.0
    } else if best >= 0.8 {
        85.0
    } else if best >= 0.7 {
        75.0
    } else if best >= 0.6 {
        65.0
    } else {
        40.0
    };
    let lift = if best > dummy + 0.1 { 5.0 } else { 0.0 };
    f64::min(100.0, base + lift)
}

/// Regression score from the best R².
pub fn regression_score(best_r2: f64) -> f64 {
    if best_r2 >= 0.9 {
        95.0
    } else if best_r2 >= 0.8 {
        85.0
    } else if best_r2 >= 0.7 {
        75.0
    } else if best_r2 >= 0.5 {
        65.0
    } else if best_r2 >= 0.3 {
        50.0
    } else if best_r2 >= 0.1 {
        35.0
    } else {
        (20.0 + best_r2 * 50.0).max(0.0)
    }
}

struct Split {
    x_train: Matrix,
    x_test: Matrix,
    train: Vec<usize>,
    test: Vec<usize>,
}

fn split_and_scale(x: &Matrix, seed: u64) -> Split {
    let (train, test) = train_test_split(x.len(), TEST_FRACTION, seed);
    let mut x_train = take_rows(x, &train);
    let mut x_test = take_rows(x, &test);

    // Scale with training statistics only
    let p = x.first().map(Vec::len).unwrap_or(0);
    let n = x_train.len().max(1) as f64;
    for j in 0..p {
        let m = x_train.iter().map(|r| r[j]).sum::<f64>() / n;
        let sd = (x_train.iter().map(|r| (r[j] - m).powi(2)).sum::<f64>() / n).sqrt();
        for row in x_train.iter_mut().chain(x_test.iter_mut()) {
            row[j] = if sd > 0.0 { (row[j] - m) / sd } else { 0.0 };
        }
    }
    Split {
        x_train,
        x_test,
        train,
        test,
    }
}

impl Analyzer for BaselineMlAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::BaselineMl
    }

    fn run(&self, ctx: &AnalysisContext<'_>) -> Result<AnalyzerOutput> {
        let dataset = ctx.dataset;
        let target = ctx.require_target()?;
        let features = dataset.numeric_features(Some(target));
        if features.is_empty() {
            return Err(UtilityError::InsufficientData(
                "Baseline models need at least one numeric feature".to_string(),
            ));
        }

        let labels = dataset.string_values(target)?;
        let rows: Vec<usize> = (0..dataset.height()).filter(|&r| labels[r].is_some()).collect();
        if rows.len() < MIN_ROWS {
            return Err(UtilityError::InsufficientData(format!(
                "Baseline models need at least {} labelled rows, found {}",
                MIN_ROWS,
                rows.len()
            )));
        }

        let (names, x) = feature_matrix(dataset, &features, &rows)?;
        if names.is_empty() {
            return Err(UtilityError::InsufficientData(
                "Every numeric feature is empty".to_string(),
            ));
        }
        let split = split_and_scale(&x, ctx.config.random_seed);

        let present: Vec<String> = rows.iter().filter_map(|&r| labels[r].clone()).collect();
        let (encoded, classes) = encode_labels(&present);

        let (task_type, models) = if classes.len() <= MAX_CLASSIFICATION_CLASSES {
            if classes.len() < 2 {
                return Err(UtilityError::InsufficientData(format!(
                    "Target column '{}' has a single class",
                    target
                )));
            }
            ("classification", classify(&split, &encoded, classes.len(), ctx.config.random_seed))
        } else {
            let values = dataset.f64_values(target)?;
            let y: Vec<f64> = rows.iter().filter_map(|&r| values[r]).collect();
            if y.len() != rows.len() {
                return Err(UtilityError::InsufficientData(format!(
                    "Target column '{}' has too many classes and is not numeric",
                    target
                )));
            }
            ("regression", regress(&split, &y, ctx.config.random_seed))
        };

        let dummy_name = if task_type == "classification" {
            "dummy_classifier"
        } else {
            "dummy_regressor"
        };
        let dummy_metric = models
            .iter()
            .find(|m| m.model == dummy_name)
            .map(|m| m.metric)
            .unwrap_or(0.0);
        // Earlier models win ties
        let Some(best) = models
            .iter()
            .reduce(|best, m| if m.metric > best.metric { m } else { best })
        else {
            return Err(UtilityError::analyzer(
                AnalyzerKind::BaselineMl.as_str(),
                "No baseline model could be trained",
            ));
        };

        let score = if task_type == "classification" {
            classification_score(best.metric, dummy_metric)
        } else {
            regression_score(best.metric)
        };

        debug!(
            "Baseline ML ({}): best {} = {:.3}, score {:.1}",
            task_type, best.model, best.metric, score
        );

        let mut recommendations = recommendations(score);
        recommendations.push(format!(
            "Best baseline model: {} ({:.3})",
            best.model, best.metric
        ));
        if task_type == "classification" && dummy_metric > 0.7 {
            recommendations.push(
                "High dummy classifier accuracy suggests class imbalance".to_string(),
            );
        }

        let metrics = MlPerformanceMetrics {
            target_column: target.to_string(),
            task_type: task_type.to_string(),
            features_used: names.len(),
            samples_used: rows.len(),
            train_samples: split.train.len(),
            test_samples: split.test.len(),
            best_model: best.model.clone(),
            best_metric: best.metric,
            dummy_metric,
            ml_usability_score: round_to(score, 1),
            models,
        };

        Ok(AnalyzerOutput::new(score, AnalyzerMetrics::BaselineMl(metrics))
            .with_recommendations(recommendations))
    }
}

fn classify(split: &Split, y: &[usize], n_classes: usize, seed: u64) -> Vec<ModelScore> {
    let y_train: Vec<usize> = split.train.iter().map(|&i| y[i]).collect();
    let y_test: Vec<usize> = split.test.iter().map(|&i| y[i]).collect();
    let mut scores = Vec::new();

    match LogisticRegression::fit(&split.x_train, &y_train, n_classes) {
        Ok(model) => scores.push(ModelScore {
            model: "logistic_regression".to_string(),
            metric: round_to(accuracy(&y_test, &model.predict(&split.x_test)), 4),
        }),
        Err(e) => warn!("Logistic regression skipped: {}", e),
    }

    let local: Vec<usize> = (0..split.x_train.len()).collect();
    let y_local: Vec<f64> = y_train.iter().map(|&c| c as f64).collect();
    let tree = DecisionTree::fit(
        &split.x_train,
        &y_local,
        &local,
        TreeTask::Classification { n_classes },
        TreeParams::default(),
        &mut seeded_rng(seed),
    );
    scores.push(ModelScore {
        model: "decision_tree".to_string(),
        metric: round_to(accuracy(&y_test, &tree.predict_classes(&split.x_test)), 4),
    });

    // Most frequent training class, lowest index on ties
    let mut counts = vec![0usize; n_classes];
    for &c in &y_train {
        counts[c] += 1;
    }
    let mut majority = 0;
    for (class, &count) in counts.iter().enumerate() {
        if count > counts[majority] {
            majority = class;
        }
    }
    let dummy = vec![majority; y_test.len()];
    scores.push(ModelScore {
        model: "dummy_classifier".to_string(),
        metric: round_to(accuracy(&y_test, &dummy), 4),
    });
    scores
}

fn regress(split: &Split, y: &[f64], seed: u64) -> Vec<ModelScore> {
    let y_train: Vec<f64> = split.train.iter().map(|&i| y[i]).collect();
    let y_test: Vec<f64> = split.test.iter().map(|&i| y[i]).collect();
    let mut scores = Vec::new();

    match LinearRegression::fit(&split.x_train, &y_train) {
        Ok(model) => scores.push(ModelScore {
            model: "linear_regression".to_string(),
            metric: round_to(r2_score(&y_test, &model.predict(&split.x_test)), 4),
        }),
        Err(e) => warn!("Linear regression skipped: {}", e),
    }

    let local: Vec<usize> = (0..split.x_train.len()).collect();
    let tree = DecisionTree::fit(
        &split.x_train,
        &y_train,
        &local,
        TreeTask::Regression,
        TreeParams::default(),
        &mut seeded_rng(seed),
    );
    scores.push(ModelScore {
        model: "decision_tree".to_string(),
        metric: round_to(r2_score(&y_test, &tree.predict(&split.x_test)), 4),
    });

    let fill = mean(&y_train).unwrap_or(0.0);
    scores.push(ModelScore {
        model: "dummy_regressor".to_string(),
        metric: round_to(r2_score(&y_test, &vec![fill; y_test.len()]), 4),
    });
    scores
}

fn recommendations(score: f64) -> Vec<String> {
    let lines: [&str; 2] = if score >= 85.0 {
        [
            "Excellent ML performance - dataset is highly predictive",
            "Ready for advanced modeling techniques",
        ]
    } else if score >= 70.0 {
        [
            "Good ML performance - dataset shows strong predictive power",
            "Consider feature engineering for better results",
        ]
    } else if score >= 50.0 {
        [
            "Moderate ML performance - dataset has some predictive value",
            "Consider feature selection, data cleaning or more expressive models",
        ]
    } else {
        [
            "Poor ML performance - dataset shows limited predictive power",
            "Check data quality, feature relevance and problem formulation",
        ]
    };
    lines.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::dataset::Dataset;
    use polars::prelude::*;

    fn run(df: DataFrame, target: &str) -> Result<AnalyzerOutput> {
        let ds = Dataset::new(df).unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&ds, Some(target), &config);
        BaselineMlAnalyzer.run(&ctx)
    }

    fn metrics(out: &AnalyzerOutput) -> &MlPerformanceMetrics {
        match &out.metrics {
            AnalyzerMetrics::BaselineMl(m) => m,
            _ => panic!("wrong metrics variant"),
        }
    }

    #[test]
    fn test_score_tables() {
        assert_eq!(classification_score(0.95, 0.5), 100.0);
        assert_eq!(classification_score(0.82, 0.8), 85.0);
        assert_eq!(classification_score(0.5, 0.5), 40.0);
        assert_eq!(regression_score(0.95), 95.0);
        assert_eq!(regression_score(0.2), 35.0);
        assert_eq!(regression_score(0.0), 20.0);
        assert_eq!(regression_score(-1.0), 0.0);
    }

    #[test]
    fn test_separable_classification() {
        let x: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let noise: Vec<f64> = (0..100).map(|i| ((i * 37) % 17) as f64).collect();
        let label: Vec<i32> = (0..100).map(|i| i32::from(i >= 50)).collect();
        let df = df!["x" => x, "noise" => noise, "label" => label].unwrap();
        let out = run(df, "label").unwrap();
        let m = metrics(&out);
        assert_eq!(m.task_type, "classification");
        assert_eq!(m.features_used, 2);
        assert_eq!(m.train_samples + m.test_samples, 100);
        assert!(m.best_metric >= 0.9);
        assert!(out.score >= 95.0);
    }

    #[test]
    fn test_linear_regression_target() {
        let x: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..60).map(|i| 2.0 * i as f64 + 1.0).collect();
        let df = df!["x" => x, "y" => y].unwrap();
        let out = run(df, "y").unwrap();
        let m = metrics(&out);
        assert_eq!(m.task_type, "regression");
        assert_eq!(m.best_model, "linear_regression");
        assert_eq!(out.score, 95.0);
    }

    #[test]
    fn test_too_few_rows() {
        let df = df!["x" => [1.0, 2.0, 3.0], "label" => [0, 1, 0]].unwrap();
        assert!(matches!(
            run(df, "label"),
            Err(UtilityError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_no_numeric_features() {
        let df = df!["s" => ["a"; 12], "label" => [0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1]].unwrap();
        assert!(matches!(
            run(df, "label"),
            Err(UtilityError::InsufficientData(_))
        ));
    }
}
