use super::{feature_matrix, AnalysisContext, Analyzer, AnalyzerMetrics, AnalyzerOutput};
use crate::error::{Result, UtilityError};
use crate::ml::{
    encode_labels, euclidean, lda_explained_ratio, seeded_rng, silhouette_score, standardize,
    take_rows, Matrix, Pca,
};
use crate::types::AnalyzerKind;
use crate::utils::round_to;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};
use tracing::debug;

const MAX_CLASSES: usize = 20;
const MIN_ROWS: usize = 20;
const PCA_COMPONENTS: usize = 2;
/// Silhouette is quadratic in rows; larger inputs are subsampled.
const SILHOUETTE_SAMPLE: usize = 2000;

/// Class separability in a reduced feature space.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeparabilityAnalyzer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparabilityMetrics {
    pub target_column: String,
    pub n_classes: usize,
    pub features_used: usize,
    pub samples_used: usize,
    pub pca_components: usize,
    pub explained_variance_ratio: Vec<f64>,
    pub cumulative_variance: f64,
    pub n_components_90: usize,
    pub n_components_95: usize,
    pub lda_separability: Option<f64>,
    pub silhouette_score: Option<f64>,
    pub silhouette_interpretation: Option<String>,
    pub mean_inter_class_distance: f64,
    pub min_inter_class_distance: f64,
    pub mean_intra_class_scatter: f64,
    pub separation_ratio: f64,
    pub separability_score: f64,
}

fn interpret_silhouette(s: f64) -> &'static str {
    if s > 0.7 {
        "excellent_separation"
    } else if s > 0.5 {
        "good_separation"
    } else if s > 0.3 {
        "fair_separation"
    } else if s > 0.1 {
        "weak_separation"
    } else {
        "poor_separation"
    }
}

/// Weighted sum of the four separability signals, clamped to [0, 100].
pub fn separability_score(
    cumulative_variance: f64,
    silhouette: Option<f64>,
    lda: Option<f64>,
    separation_ratio: f64,
) -> f64 {
    let mut score = 50.0 + cumulative_variance * 30.0;
    if let Some(s) = silhouette
        && s > 0.0
    {
        score += f64::min(25.0, s * 35.0);
    }
    if let Some(l) = lda {
        score += l * 20.0;
    }
    if separation_ratio > 1.0 {
        score += f64::min(15.0, separation_ratio.ln() * 5.0);
    }
    score.clamp(0.0, 100.0)
}

struct ClassSeparation {
    mean_inter: f64,
    min_inter: f64,
    mean_intra: f64,
    ratio: f64,
}

/// Centroid distances between classes versus scatter within them.
fn class_separation(points: &Matrix, labels: &[usize], n_classes: usize) -> ClassSeparation {
    let dim = points.first().map(Vec::len).unwrap_or(0);
    let mut centroids = vec![vec![0.0; dim]; n_classes];
    let mut counts = vec![0usize; n_classes];
    for (p, &c) in points.iter().zip(labels) {
        counts[c] += 1;
        for (acc, v) in centroids[c].iter_mut().zip(p) {
            *acc += v;
        }
    }
    for (centroid, &count) in centroids.iter_mut().zip(&counts) {
        if count > 0 {
            centroid.iter_mut().for_each(|v| *v /= count as f64);
        }
    }

    let mut inter = Vec::new();
    for i in 0..n_classes {
        for j in 0..n_classes {
            if i != j && counts[i] > 0 && counts[j] > 0 {
                let d = euclidean(&centroids[i], &centroids[j]);
                if d > 0.0 {
                    inter.push(d);
                }
            }
        }
    }

    let mut scatter_sum = vec![0.0; n_classes];
    for (p, &c) in points.iter().zip(labels) {
        scatter_sum[c] += euclidean(p, &centroids[c]);
    }
    let intra: Vec<f64> = (0..n_classes)
        .filter(|&c| counts[c] > 1)
        .map(|c| scatter_sum[c] / counts[c] as f64)
        .collect();

    let mean_inter = if inter.is_empty() {
        0.0
    } else {
        inter.iter().sum::<f64>() / inter.len() as f64
    };
    let mean_intra = if intra.is_empty() {
        0.0
    } else {
        intra.iter().sum::<f64>() / intra.len() as f64
    };
    ClassSeparation {
        mean_inter,
        min_inter: if inter.is_empty() {
            0.0
        } else {
            inter.iter().copied().fold(f64::INFINITY, f64::min)
        },
        mean_intra,
        ratio: mean_inter / (mean_intra + 1e-10),
    }
}

impl Analyzer for SeparabilityAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Separability
    }

    fn run(&self, ctx: &AnalysisContext<'_>) -> Result<AnalyzerOutput> {
        let dataset = ctx.dataset;
        let target = ctx.require_target()?;
        let features = dataset.numeric_features(Some(target));
        if features.len() < 2 {
            return Err(UtilityError::InsufficientData(
                "Separability needs at least two numeric features".to_string(),
            ));
        }

        let labels = dataset.string_values(target)?;
        let rows: Vec<usize> = (0..dataset.height()).filter(|&r| labels[r].is_some()).collect();
        if rows.len() < MIN_ROWS {
            return Err(UtilityError::InsufficientData(format!(
                "Separability needs at least {} labelled rows, found {}",
                MIN_ROWS,
                rows.len()
            )));
        }
        let present: Vec<String> = rows.iter().filter_map(|&r| labels[r].clone()).collect();
        let (y, classes) = encode_labels(&present);
        if classes.len() > MAX_CLASSES {
            return Err(UtilityError::InsufficientData(format!(
                "Separability applies to classification targets (at most {} classes)",
                MAX_CLASSES
            )));
        }
        if classes.len() < 2 {
            return Err(UtilityError::InsufficientData(format!(
                "Target column '{}' has a single class",
                target
            )));
        }

        let (names, mut x) = feature_matrix(dataset, &features, &rows)?;
        if names.len() < 2 {
            return Err(UtilityError::InsufficientData(
                "Separability needs at least two non-empty numeric features".to_string(),
            ));
        }
        standardize(&mut x);

        let k = PCA_COMPONENTS.min(names.len()).min(rows.len() - 1);
        let pca = Pca::fit(&x, k);
        let projected = pca.transform(&x);
        let cumulative = pca.cumulative_variance();

        let lda = lda_explained_ratio(&x, &y, classes.len());

        let silhouette = if projected.len() > SILHOUETTE_SAMPLE {
            let mut rng = seeded_rng(ctx.config.random_seed);
            let mut picked: Vec<usize> =
                sample(&mut rng, projected.len(), SILHOUETTE_SAMPLE).into_vec();
            picked.sort_unstable();
            silhouette_score(&take_rows(&projected, &picked), &take_rows(&y, &picked))
        } else {
            silhouette_score(&projected, &y)
        };

        let separation = class_separation(&projected, &y, classes.len());
        let score = separability_score(cumulative, silhouette, lda, separation.ratio);

        debug!(
            "Separability: variance {:.3}, silhouette {:?}, lda {:?}, ratio {:.3}, score {:.1}",
            cumulative, silhouette, lda, separation.ratio, score
        );

        let metrics = SeparabilityMetrics {
            target_column: target.to_string(),
            n_classes: classes.len(),
            features_used: names.len(),
            samples_used: rows.len(),
            pca_components: k,
            explained_variance_ratio: pca.explained_ratio[..k]
                .iter()
                .map(|v| round_to(*v, 4))
                .collect(),
            cumulative_variance: round_to(cumulative, 4),
            n_components_90: pca.components_for(0.9),
            n_components_95: pca.components_for(0.95),
            lda_separability: lda.map(|v| round_to(v, 4)),
            silhouette_score: silhouette.map(|v| round_to(v, 4)),
            silhouette_interpretation: silhouette.map(|v| interpret_silhouette(v).to_string()),
            mean_inter_class_distance: round_to(separation.mean_inter, 4),
            min_inter_class_distance: round_to(separation.min_inter, 4),
            mean_intra_class_scatter: round_to(separation.mean_intra, 4),
            separation_ratio: round_to(separation.ratio, 4),
            separability_score: round_to(score, 1),
        };

        Ok(AnalyzerOutput::new(score, AnalyzerMetrics::Separability(metrics))
            .with_recommendations(recommendations(score, silhouette)))
    }
}

fn recommendations(score: f64, silhouette: Option<f64>) -> Vec<String> {
    let lines: [&str; 2] = if score >= 85.0 {
        [
            "Excellent class separability - ideal for classification",
            "Classes are well separated in reduced dimensions",
        ]
    } else if score >= 70.0 {
        [
            "Good class separability with some dimensionality reduction",
            "Consider linear classifiers or SVM",
        ]
    } else if score >= 50.0 {
        [
            "Moderate separability - may need non-linear models",
            "Consider feature engineering or kernel methods",
        ]
    } else {
        [
            "Poor separability - classes overlap heavily",
            "Consider collecting more discriminative features",
        ]
    };
    let mut recs: Vec<String> = lines.iter().map(|s| s.to_string()).collect();
    if let Some(s) = silhouette
        && s < 0.1
    {
        recs.push("Low silhouette score - classes overlap in the principal components".to_string());
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::dataset::Dataset;
    use polars::prelude::*;

    fn run(df: DataFrame) -> Result<AnalyzerOutput> {
        let ds = Dataset::new(df).unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&ds, Some("label"), &config);
        SeparabilityAnalyzer.run(&ctx)
    }

    #[test]
    fn test_score_formula() {
        assert_eq!(separability_score(0.0, None, None, 0.5), 50.0);
        assert_eq!(separability_score(1.0, Some(1.0), Some(1.0), 100.0), 100.0);
        let partial = separability_score(0.5, Some(0.2), None, 1.0);
        assert!((partial - 72.0).abs() < 1e-9);
    }

    #[test]
    fn test_class_separation_ratio() {
        let points = vec![vec![0.0], vec![2.0], vec![10.0], vec![12.0]];
        let sep = class_separation(&points, &[0, 0, 1, 1], 2);
        assert_eq!(sep.mean_inter, 10.0);
        assert_eq!(sep.mean_intra, 1.0);
        assert!((sep.ratio - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_well_separated_classes_score_high() {
        let a: Vec<f64> = (0..40).map(|i| if i < 20 { 0.0 } else { 10.0 } + (i % 5) as f64 * 0.1).collect();
        let b: Vec<f64> = (0..40).map(|i| if i < 20 { 1.0 } else { -9.0 } + (i % 3) as f64 * 0.1).collect();
        let label: Vec<i32> = (0..40).map(|i| i32::from(i >= 20)).collect();
        let df = df!["a" => a, "b" => b, "label" => label].unwrap();
        let out = run(df).unwrap();
        let AnalyzerMetrics::Separability(m) = &out.metrics else {
            panic!("wrong metrics variant");
        };
        assert_eq!(m.n_classes, 2);
        assert_eq!(m.pca_components, 2);
        assert!(m.silhouette_score.unwrap() > 0.8);
        assert!(out.score >= 90.0);
    }

    #[test]
    fn test_many_classes_is_insufficient() {
        let x: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let z: Vec<f64> = (0..30).map(|i| (i * 3 % 7) as f64).collect();
        let label: Vec<i32> = (0..30).collect();
        let df = df!["x" => x, "z" => z, "label" => label].unwrap();
        assert!(matches!(run(df), Err(UtilityError::InsufficientData(_))));
    }
}
