use super::Matrix;

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns eigenvalues in descending order with the matching eigenvectors
/// as columns of the second element (`vectors[row][k]`).
pub fn symmetric_eigen(matrix: &Matrix) -> (Vec<f64>, Matrix) {
    let n = matrix.len();
    let mut a = matrix.clone();
    let mut v: Matrix = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for _sweep in 0..100 {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[i][j] * a[i][j])
            .sum();
        if off < 1e-20 {
            break;
        }
        for p in 0..n {
            for q in p + 1..n {
                if a[p][q].abs() < 1e-300 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let t = if theta == 0.0 { 1.0 } else { t };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[k][p];
                    let akq = a[k][q];
                    a[k][p] = c * akp - s * akq;
                    a[k][q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[p][k];
                    let aqk = a[q][k];
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in v.iter_mut() {
                    let vkp = row[p];
                    let vkq = row[q];
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[j][j].total_cmp(&a[i][i]));
    let values = order.iter().map(|&i| a[i][i]).collect();
    let vectors = (0..n)
        .map(|row| order.iter().map(|&k| v[row][k]).collect())
        .collect();
    (values, vectors)
}

/// Covariance (population) of the columns of `x`.
fn covariance(x: &Matrix) -> Matrix {
    let n = x.len() as f64;
    let p = x.first().map(Vec::len).unwrap_or(0);
    let means: Vec<f64> = (0..p)
        .map(|j| x.iter().map(|r| r[j]).sum::<f64>() / n)
        .collect();
    let mut cov = vec![vec![0.0; p]; p];
    for row in x {
        for i in 0..p {
            let di = row[i] - means[i];
            for j in i..p {
                cov[i][j] += di * (row[j] - means[j]);
            }
        }
    }
    for i in 0..p {
        for j in i..p {
            cov[i][j] /= n;
            cov[j][i] = cov[i][j];
        }
    }
    cov
}

/// Principal component analysis on an already standardized matrix.
#[derive(Debug, Clone)]
pub struct Pca {
    /// Explained variance ratio of every component, descending.
    pub explained_ratio: Vec<f64>,
    components: Matrix,
    means: Vec<f64>,
    n_components: usize,
}

impl Pca {
    pub fn fit(x: &Matrix, n_components: usize) -> Self {
        let p = x.first().map(Vec::len).unwrap_or(0);
        let n = x.len().max(1) as f64;
        let means: Vec<f64> = (0..p)
            .map(|j| x.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        let (values, vectors) = symmetric_eigen(&covariance(x));
        let values: Vec<f64> = values.into_iter().map(|v| v.max(0.0)).collect();
        let total: f64 = values.iter().sum();
        let explained_ratio = values
            .iter()
            .map(|v| if total > 0.0 { v / total } else { 0.0 })
            .collect();
        Self {
            explained_ratio,
            components: vectors,
            means,
            n_components: n_components.min(p),
        }
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Variance captured by the kept components.
    pub fn cumulative_variance(&self) -> f64 {
        self.explained_ratio[..self.n_components].iter().sum()
    }

    /// Smallest number of components reaching `share` of the variance.
    pub fn components_for(&self, share: f64) -> usize {
        let mut acc = 0.0;
        for (i, r) in self.explained_ratio.iter().enumerate() {
            acc += r;
            if acc >= share - 1e-12 {
                return i + 1;
            }
        }
        self.explained_ratio.len()
    }

    pub fn transform(&self, x: &Matrix) -> Matrix {
        x.iter()
            .map(|row| {
                (0..self.n_components)
                    .map(|k| {
                        row.iter()
                            .enumerate()
                            .map(|(j, v)| (v - self.means[j]) * self.components[j][k])
                            .sum()
                    })
                    .collect()
            })
            .collect()
    }
}

/// Share of between-class discriminant power captured by the first
/// `min(classes - 1, features)` linear discriminants.
///
/// Solves the generalized problem `Sb v = λ Sw v` through a Cholesky
/// factor of the (slightly regularized) within-class scatter.
pub fn lda_explained_ratio(x: &Matrix, labels: &[usize], n_classes: usize) -> Option<f64> {
    let p = x.first().map(Vec::len)?;
    let k = n_classes.saturating_sub(1).min(p);
    if k == 0 {
        return None;
    }

    let n = x.len() as f64;
    let overall: Vec<f64> = (0..p).map(|j| x.iter().map(|r| r[j]).sum::<f64>() / n).collect();
    let mut class_means = vec![vec![0.0; p]; n_classes];
    let mut counts = vec![0.0; n_classes];
    for (row, &c) in x.iter().zip(labels) {
        counts[c] += 1.0;
        for j in 0..p {
            class_means[c][j] += row[j];
        }
    }
    for (mean, &count) in class_means.iter_mut().zip(&counts) {
        if count > 0.0 {
            mean.iter_mut().for_each(|m| *m /= count);
        }
    }

    let mut sw = vec![vec![0.0; p]; p];
    for (row, &c) in x.iter().zip(labels) {
        for i in 0..p {
            let di = row[i] - class_means[c][i];
            for j in 0..p {
                sw[i][j] += di * (row[j] - class_means[c][j]);
            }
        }
    }
    let mut sb = vec![vec![0.0; p]; p];
    for (mean, &count) in class_means.iter().zip(&counts) {
        for i in 0..p {
            let di = mean[i] - overall[i];
            for j in 0..p {
                sb[i][j] += count * di * (mean[j] - overall[j]);
            }
        }
    }

    let trace: f64 = (0..p).map(|i| sw[i][i]).sum::<f64>() / p as f64;
    let ridge = (trace * 1e-6).max(1e-9);
    for (i, row) in sw.iter_mut().enumerate() {
        row[i] += ridge;
    }

    let l = cholesky(&sw)?;
    let l_inv = lower_inverse(&l);
    // M = L^-1 Sb L^-T
    let tmp = matmul(&l_inv, &sb);
    let m = matmul(&tmp, &transpose(&l_inv));
    let (values, _) = symmetric_eigen(&m);
    let values: Vec<f64> = values.into_iter().map(|v| v.max(0.0)).collect();
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return Some(0.0);
    }
    Some(values[..k].iter().sum::<f64>() / total)
}

fn cholesky(a: &Matrix) -> Option<Matrix> {
    let n = a.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let s: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let d = a[i][i] - s;
                if d <= 0.0 {
                    return None;
                }
                l[i][j] = d.sqrt();
            } else {
                l[i][j] = (a[i][j] - s) / l[j][j];
            }
        }
    }
    Some(l)
}

fn lower_inverse(l: &Matrix) -> Matrix {
    let n = l.len();
    let mut inv = vec![vec![0.0; n]; n];
    for i in 0..n {
        inv[i][i] = 1.0 / l[i][i];
        for j in 0..i {
            let s: f64 = (j..i).map(|k| l[i][k] * inv[k][j]).sum();
            inv[i][j] = -s / l[i][i];
        }
    }
    inv
}

fn transpose(a: &Matrix) -> Matrix {
    let rows = a.len();
    let cols = a.first().map(Vec::len).unwrap_or(0);
    (0..cols).map(|j| (0..rows).map(|i| a[i][j]).collect()).collect()
}

fn matmul(a: &Matrix, b: &Matrix) -> Matrix {
    let inner = b.len();
    let cols = b.first().map(Vec::len).unwrap_or(0);
    a.iter()
        .map(|row| {
            (0..cols)
                .map(|j| (0..inner).map(|k| row[k] * b[k][j]).sum())
                .collect()
        })
        .collect()
}
