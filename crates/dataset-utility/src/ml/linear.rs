use super::Matrix;
use crate::error::{Result, UtilityError};

/// Ordinary least squares with a tiny ridge term for numerical stability.
#[derive(Debug, Clone)]
pub struct LinearRegression {
    intercept: f64,
    coefficients: Vec<f64>,
}

impl LinearRegression {
    const RIDGE: f64 = 1e-8;

    pub fn fit(x: &Matrix, y: &[f64]) -> Result<Self> {
        let n = x.len();
        if n == 0 || n != y.len() {
            return Err(UtilityError::InsufficientData(
                "Linear regression needs matching, non-empty inputs".to_string(),
            ));
        }
        let p = x[0].len() + 1;

        // Normal equations over [1, x]
        let mut xtx = vec![vec![0.0; p]; p];
        let mut xty = vec![0.0; p];
        for (row, &target) in x.iter().zip(y) {
            let augmented: Vec<f64> = std::iter::once(1.0).chain(row.iter().copied()).collect();
            for i in 0..p {
                xty[i] += augmented[i] * target;
                for j in 0..p {
                    xtx[i][j] += augmented[i] * augmented[j];
                }
            }
        }
        for (i, row) in xtx.iter_mut().enumerate().skip(1) {
            row[i] += Self::RIDGE * n as f64;
        }

        let beta = solve(xtx, xty)?;
        Ok(Self {
            intercept: beta[0],
            coefficients: beta[1..].to_vec(),
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .map(|(x, b)| x * b)
                .sum::<f64>()
    }

    pub fn predict(&self, x: &Matrix) -> Vec<f64> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(UtilityError::Internal(
                "Singular system in least squares fit".to_string(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

/// One-vs-rest logistic regression trained by batch gradient descent.
///
/// Expects standardized features.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    /// One weight vector per class; index 0 is the bias.
    weights: Vec<Vec<f64>>,
}

impl LogisticRegression {
    const LEARNING_RATE: f64 = 0.5;
    const ITERATIONS: usize = 200;
    const L2: f64 = 1e-4;

    pub fn fit(x: &Matrix, y: &[usize], n_classes: usize) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() || n_classes < 2 {
            return Err(UtilityError::InsufficientData(
                "Logistic regression needs at least two classes".to_string(),
            ));
        }
        let p = x[0].len();
        let n = x.len() as f64;
        // A binary problem only needs the positive-class model
        let models = if n_classes == 2 { 1 } else { n_classes };

        let weights = (0..models)
            .map(|class| {
                let positive = if n_classes == 2 { 1 } else { class };
                let mut w = vec![0.0; p + 1];
                for _ in 0..Self::ITERATIONS {
                    let mut grad = vec![0.0; p + 1];
                    for (row, &label) in x.iter().zip(y) {
                        let target = if label == positive { 1.0 } else { 0.0 };
                        let err = sigmoid(linear(&w, row)) - target;
                        grad[0] += err;
                        for j in 0..p {
                            grad[j + 1] += err * row[j];
                        }
                    }
                    for j in 0..=p {
                        let reg = if j == 0 { 0.0 } else { Self::L2 * w[j] };
                        w[j] -= Self::LEARNING_RATE * (grad[j] / n + reg);
                    }
                }
                w
            })
            .collect();

        Ok(Self { weights })
    }

    pub fn predict_row(&self, row: &[f64]) -> usize {
        if self.weights.len() == 1 {
            return usize::from(sigmoid(linear(&self.weights[0], row)) >= 0.5);
        }
        self.weights
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| linear(a, row).total_cmp(&linear(b, row)))
            .map(|(class, _)| class)
            .unwrap_or(0)
    }

    pub fn predict(&self, x: &Matrix) -> Vec<usize> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }
}

#[inline]
fn linear(w: &[f64], row: &[f64]) -> f64 {
    w[0] + row.iter().zip(&w[1..]).map(|(x, b)| x * b).sum::<f64>()
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::accuracy;

    #[test]
    fn test_linear_regression_recovers_line() {
        let x: Matrix = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..20).map(|i| 3.0 * i as f64 + 2.0).collect();
        let model = LinearRegression::fit(&x, &y).unwrap();
        assert!((model.predict_row(&[10.0]) - 32.0).abs() < 1e-4);
    }

    #[test]
    fn test_solve_singular() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(solve(a, vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_logistic_regression_separable() {
        let x: Matrix = (0..40).map(|i| vec![(i as f64 - 20.0) / 10.0]).collect();
        let y: Vec<usize> = (0..40).map(|i| usize::from(i >= 20)).collect();
        let model = LogisticRegression::fit(&x, &y, 2).unwrap();
        assert!(accuracy(&y, &model.predict(&x)) >= 0.95);
    }

    #[test]
    fn test_logistic_regression_multiclass() {
        let x: Matrix = (0..60).map(|i| vec![(i / 20) as f64 * 3.0 - 3.0]).collect();
        let y: Vec<usize> = (0..60).map(|i| i / 20).collect();
        let model = LogisticRegression::fit(&x, &y, 3).unwrap();
        assert!(accuracy(&y, &model.predict(&x)) >= 0.9);
    }
}
