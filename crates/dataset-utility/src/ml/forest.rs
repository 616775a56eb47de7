use super::tree::{DecisionTree, TreeParams, TreeTask};
use super::{seeded_rng, Matrix};
use crate::utils::{quantile_sorted, sorted_copy};
use rand::Rng;

/// Bagged decision trees, used for impurity-based feature importance.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn fit(
        x: &Matrix,
        y: &[f64],
        task: TreeTask,
        n_trees: usize,
        max_depth: usize,
        seed: u64,
    ) -> Self {
        let n = x.len();
        let n_features = x.first().map(Vec::len).unwrap_or(0);
        let max_features = ((n_features as f64).sqrt().floor() as usize).max(1);
        let params = TreeParams {
            max_depth,
            min_samples_split: 2,
            max_features: Some(max_features),
        };

        let mut rng = seeded_rng(seed);
        let trees = (0..n_trees)
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, y, &bootstrap, task, params, &mut rng)
            })
            .collect();

        Self { trees, n_features }
    }

    /// Mean impurity decrease per feature, normalized to sum to 1.
    ///
    /// All zeros when no tree found a useful split.
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            let raw = tree.raw_importances();
            let sum: f64 = raw.iter().sum();
            if sum <= 0.0 {
                continue;
            }
            for (total, value) in totals.iter_mut().zip(raw) {
                *total += value / sum;
            }
        }
        let grand: f64 = totals.iter().sum();
        if grand > 0.0 {
            for t in totals.iter_mut() {
                *t /= grand;
            }
        }
        totals
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + 0.577_215_664_9) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
enum IsoNode {
    External { size: usize },
    Internal { split: f64, left: usize, right: usize },
}

#[derive(Debug, Clone)]
struct IsoTree {
    nodes: Vec<IsoNode>,
}

impl IsoTree {
    fn build(sample: &[f64], height_limit: usize, rng: &mut impl Rng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(sample.to_vec(), 0, height_limit, rng);
        tree
    }

    fn grow(&mut self, values: Vec<f64>, depth: usize, limit: usize, rng: &mut impl Rng) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(IsoNode::External { size: values.len() });

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if depth >= limit || values.len() <= 1 || max - min <= f64::EPSILON {
            return idx;
        }

        // Halved bounds keep the span finite for values near f64::MAX.
        let t: f64 = rng.r#gen();
        let split = (min / 2.0 + t * (max / 2.0 - min / 2.0)) * 2.0;
        let (lo, hi): (Vec<f64>, Vec<f64>) = values.into_iter().partition(|v| *v < split);
        let left = self.grow(lo, depth + 1, limit, rng);
        let right = self.grow(hi, depth + 1, limit, rng);
        self.nodes[idx] = IsoNode::Internal { split, left, right };
        idx
    }

    fn path_length(&self, x: f64) -> f64 {
        let mut idx = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[idx] {
                IsoNode::External { size } => return depth + average_path_length(*size),
                IsoNode::Internal { split, left, right } => {
                    idx = if x < *split { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// One-dimensional isolation forest.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsoTree>,
    sample_size: usize,
}

impl IsolationForest {
    pub const DEFAULT_TREES: usize = 100;
    pub const DEFAULT_SAMPLE: usize = 256;

    pub fn fit(values: &[f64], n_trees: usize, max_samples: usize, seed: u64) -> Self {
        let sample_size = max_samples.min(values.len()).max(1);
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut rng = seeded_rng(seed);

        let trees = (0..n_trees)
            .map(|_| {
                let sample: Vec<f64> = rand::seq::index::sample(&mut rng, values.len(), sample_size)
                    .into_iter()
                    .map(|i| values[i])
                    .collect();
                IsoTree::build(&sample, height_limit, &mut rng)
            })
            .collect();

        Self { trees, sample_size }
    }

    /// Anomaly score in (0, 1]; higher is more anomalous.
    pub fn score(&self, x: f64) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let mean_path =
            self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        let c = average_path_length(self.sample_size);
        if c <= 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_path / c)
    }

    /// Indices of values whose score lies strictly above the
    /// `1 - contamination` quantile of all scores.
    pub fn outliers(&self, values: &[f64], contamination: f64) -> Vec<usize> {
        let scores: Vec<f64> = values.iter().map(|v| self.score(*v)).collect();
        let sorted = sorted_copy(&scores);
        let Some(cutoff) = quantile_sorted(&sorted, 1.0 - contamination) else {
            return Vec::new();
        };
        scores
            .iter()
            .enumerate()
            .filter(|(_, s)| **s > cutoff)
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forest_importances_sum_to_one() {
        let x: Matrix = (0..60)
            .map(|i| vec![i as f64, ((i * 7) % 11) as f64, 1.0])
            .collect();
        let y: Vec<f64> = (0..60).map(|i| if i < 30 { 0.0 } else { 1.0 }).collect();
        let forest = RandomForest::fit(&x, &y, TreeTask::Classification { n_classes: 2 }, 20, 6, 42);
        let imp = forest.feature_importances();
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(imp[0] > imp[1]);
        assert_eq!(imp[2], 0.0);
    }

    #[test]
    fn test_forest_is_deterministic() {
        let x: Matrix = (0..30).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<f64> = (0..30).map(|i| (i % 2) as f64).collect();
        let a = RandomForest::fit(&x, &y, TreeTask::Regression, 10, 4, 7).feature_importances();
        let b = RandomForest::fit(&x, &y, TreeTask::Regression, 10, 4, 7).feature_importances();
        assert_eq!(a, b);
    }

    #[test]
    fn test_isolation_forest_flags_extreme_value() {
        let mut values: Vec<f64> = (0..99).map(|i| (i % 10) as f64).collect();
        values.push(500.0);
        let forest = IsolationForest::fit(&values, 100, 256, 42);
        let flagged = forest.outliers(&values, 0.05);
        assert!(flagged.contains(&99));
        assert!(forest.score(500.0) > forest.score(5.0));
    }

    #[test]
    fn test_isolation_forest_handles_extreme_magnitudes() {
        let mut values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        values.extend([-1e308, 1e308]);
        let forest = IsolationForest::fit(&values, 50, 256, 42);
        let flagged = forest.outliers(&values, 0.1);
        assert!(flagged.iter().all(|i| *i < values.len()));
        assert!(forest.score(1e308).is_finite());
        assert!(forest.score(1e308) >= forest.score(5.0));
    }

    #[test]
    fn test_isolation_forest_constant_values() {
        let values = vec![3.0; 50];
        let forest = IsolationForest::fit(&values, 10, 256, 1);
        assert!(forest.outliers(&values, 0.05).is_empty());
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > 9.0);
    }
}
