//! Small, seeded machine-learning primitives used by the model-based
//! analyzers.
//!
//! Everything operates on dense row-major `Vec<Vec<f64>>` matrices. These
//! models exist to probe a dataset's signal, not to be trained for use.

pub mod decomposition;
pub mod forest;
pub mod linear;
pub mod metrics;
pub mod tree;

pub use decomposition::{lda_explained_ratio, symmetric_eigen, Pca};
pub use forest::{IsolationForest, RandomForest};
pub use linear::{LinearRegression, LogisticRegression};
pub use metrics::{accuracy, r2_score, silhouette_score};
pub use tree::{DecisionTree, TreeParams, TreeTask};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row-major dense matrix.
pub type Matrix = Vec<Vec<f64>>;

/// Deterministic RNG for a seed.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Standardize every column to zero mean and unit variance in place.
///
/// Constant columns are centred and left at zero.
pub fn standardize(matrix: &mut Matrix) {
    let Some(width) = matrix.first().map(Vec::len) else {
        return;
    };
    let n = matrix.len() as f64;
    for j in 0..width {
        let mean = matrix.iter().map(|row| row[j]).sum::<f64>() / n;
        let var = matrix.iter().map(|row| (row[j] - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        for row in matrix.iter_mut() {
            row[j] = if std > 1e-12 { (row[j] - mean) / std } else { 0.0 };
        }
    }
}

/// Shuffle `0..n` with `seed` and split off the last `test_fraction`.
///
/// Both sides are guaranteed at least one index when `n >= 2`.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut seeded_rng(seed));
    let test_len = if n < 2 {
        0
    } else {
        ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1)
    };
    let (train, test) = indices.split_at(n - test_len);
    (train.to_vec(), test.to_vec())
}

/// Select rows by index.
pub fn take_rows<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| items[i].clone()).collect()
}

/// Euclidean distance.
#[inline]
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Map arbitrary labels onto `0..k`, in order of first appearance.
pub fn encode_labels(labels: &[String]) -> (Vec<usize>, Vec<String>) {
    let mut classes: Vec<String> = Vec::new();
    let encoded = labels
        .iter()
        .map(|label| match classes.iter().position(|c| c == label) {
            Some(idx) => idx,
            None => {
                classes.push(label.clone());
                classes.len() - 1
            }
        })
        .collect();
    (encoded, classes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardize() {
        let mut m = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        standardize(&mut m);
        assert_eq!(m, vec![vec![-1.0, 0.0], vec![1.0, 0.0]]);
    }

    #[test]
    fn test_split_is_deterministic_and_disjoint() {
        let (train_a, test_a) = train_test_split(50, 0.2, 42);
        let (train_b, test_b) = train_test_split(50, 0.2, 42);
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(test_a.len(), 10);
        assert_eq!(train_a.len(), 40);
        assert!(test_a.iter().all(|i| !train_a.contains(i)));
    }

    #[test]
    fn test_split_keeps_both_sides_non_empty() {
        let (train, test) = train_test_split(2, 0.2, 1);
        assert_eq!(train.len(), 1);
        assert_eq!(test.len(), 1);
    }

    #[test]
    fn test_encode_labels() {
        let labels: Vec<String> = ["b", "a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let (encoded, classes) = encode_labels(&labels);
        assert_eq!(encoded, vec![0, 1, 0, 2]);
        assert_eq!(classes, vec!["b", "a", "c"]);
    }
}
