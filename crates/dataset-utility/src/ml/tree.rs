use super::Matrix;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// What a tree predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeTask {
    Classification { n_classes: usize },
    Regression,
}

#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features considered per split; all when None.
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 5,
            min_samples_split: 2,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// CART decision tree (Gini for classification, variance for regression).
#[derive(Debug, Clone)]
pub struct DecisionTree {
    task: TreeTask,
    nodes: Vec<Node>,
    /// Weighted impurity decrease per feature (unnormalized).
    importances: Vec<f64>,
}

struct Builder<'a> {
    x: &'a Matrix,
    y: &'a [f64],
    task: TreeTask,
    params: TreeParams,
    n_total: f64,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Fit on the rows in `indices`. Classification labels are class
    /// indices stored as `f64`.
    pub fn fit(
        x: &Matrix,
        y: &[f64],
        indices: &[usize],
        task: TreeTask,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let width = x.first().map(Vec::len).unwrap_or(0);
        let mut builder = Builder {
            x,
            y,
            task,
            params,
            n_total: indices.len().max(1) as f64,
            nodes: Vec::new(),
            importances: vec![0.0; width],
        };
        let mut rows = indices.to_vec();
        builder.grow(&mut rows, 0, rng);
        Self {
            task,
            nodes: builder.nodes,
            importances: builder.importances,
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn predict(&self, x: &Matrix) -> Vec<f64> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }

    /// Class predictions for a classification tree.
    pub fn predict_classes(&self, x: &Matrix) -> Vec<usize> {
        self.predict(x).into_iter().map(|v| v as usize).collect()
    }

    pub fn raw_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn task(&self) -> TreeTask {
        self.task
    }
}

impl Builder<'_> {
    fn grow(&mut self, rows: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let impurity = self.impurity(rows);
        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.leaf_value(rows),
        });

        if depth >= self.params.max_depth
            || rows.len() < self.params.min_samples_split
            || impurity <= 1e-12
        {
            return node_idx;
        }

        let Some((feature, threshold, gain)) = self.best_split(rows, impurity, rng) else {
            return node_idx;
        };

        let split_at = partition(rows, |&r| self.x[r][feature] <= threshold);
        if split_at == 0 || split_at == rows.len() {
            return node_idx;
        }
        self.importances[feature] += gain * rows.len() as f64 / self.n_total;

        let (left_rows, right_rows) = rows.split_at_mut(split_at);
        let left = self.grow(left_rows, depth + 1, rng);
        let right = self.grow(right_rows, depth + 1, rng);
        self.nodes[node_idx] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_idx
    }

    /// Best (feature, threshold, impurity decrease) over the candidate features.
    fn best_split(
        &self,
        rows: &[usize],
        parent_impurity: f64,
        rng: &mut StdRng,
    ) -> Option<(usize, f64, f64)> {
        let width = self.importances.len();
        let mut features: Vec<usize> = (0..width).collect();
        if let Some(k) = self.params.max_features
            && k < width
        {
            features.shuffle(rng);
            features.truncate(k.max(1));
            features.sort_unstable();
        }

        let n = rows.len() as f64;
        let mut best: Option<(usize, f64, f64)> = None;
        for feature in features {
            let mut sorted: Vec<usize> = rows.to_vec();
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left = SplitStats::new(self.task);
            let mut right = SplitStats::new(self.task);
            for &r in &sorted {
                right.add(self.y[r]);
            }

            for i in 0..sorted.len() - 1 {
                let r = sorted[i];
                left.add(self.y[r]);
                right.remove(self.y[r]);
                let here = self.x[r][feature];
                let next = self.x[sorted[i + 1]][feature];
                if next <= here {
                    continue;
                }
                let weighted = (left.count * left.impurity() + right.count * right.impurity()) / n;
                let gain = parent_impurity - weighted;
                if gain > 1e-12 && best.is_none_or(|(_, _, g)| gain > g) {
                    best = Some((feature, (here + next) / 2.0, gain));
                }
            }
        }
        best
    }

    fn impurity(&self, rows: &[usize]) -> f64 {
        let mut stats = SplitStats::new(self.task);
        for &r in rows {
            stats.add(self.y[r]);
        }
        stats.impurity()
    }

    fn leaf_value(&self, rows: &[usize]) -> f64 {
        match self.task {
            TreeTask::Regression => {
                rows.iter().map(|&r| self.y[r]).sum::<f64>() / rows.len().max(1) as f64
            }
            TreeTask::Classification { n_classes } => {
                let mut counts = vec![0usize; n_classes];
                for &r in rows {
                    counts[self.y[r] as usize] += 1;
                }
                // Lowest class index wins ties
                let mut best = 0;
                for (class, &count) in counts.iter().enumerate() {
                    if count > counts[best] {
                        best = class;
                    }
                }
                best as f64
            }
        }
    }
}

/// Running statistics for one side of a split.
struct SplitStats {
    count: f64,
    sum: f64,
    sum_sq: f64,
    class_counts: Vec<f64>,
}

impl SplitStats {
    fn new(task: TreeTask) -> Self {
        let classes = match task {
            TreeTask::Classification { n_classes } => n_classes,
            TreeTask::Regression => 0,
        };
        Self {
            count: 0.0,
            sum: 0.0,
            sum_sq: 0.0,
            class_counts: vec![0.0; classes],
        }
    }

    fn add(&mut self, y: f64) {
        self.count += 1.0;
        if self.class_counts.is_empty() {
            self.sum += y;
            self.sum_sq += y * y;
        } else {
            self.class_counts[y as usize] += 1.0;
        }
    }

    fn remove(&mut self, y: f64) {
        self.count -= 1.0;
        if self.class_counts.is_empty() {
            self.sum -= y;
            self.sum_sq -= y * y;
        } else {
            self.class_counts[y as usize] -= 1.0;
        }
    }

    fn impurity(&self) -> f64 {
        if self.count <= 0.0 {
            return 0.0;
        }
        if self.class_counts.is_empty() {
            let mean = self.sum / self.count;
            (self.sum_sq / self.count - mean * mean).max(0.0)
        } else {
            1.0 - self
                .class_counts
                .iter()
                .map(|c| (c / self.count).powi(2))
                .sum::<f64>()
        }
    }
}

/// Stable in-place partition; returns the number of rows satisfying `pred`.
fn partition(rows: &mut [usize], pred: impl Fn(&usize) -> bool) -> usize {
    let (yes, no): (Vec<usize>, Vec<usize>) = rows.iter().partition(|r| pred(r));
    let split = yes.len();
    for (slot, value) in rows.iter_mut().zip(yes.into_iter().chain(no)) {
        *slot = value;
    }
    split
}
