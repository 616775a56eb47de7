use super::{pct2, AnalysisContext, Analyzer, AnalyzerMetrics, AnalyzerOutput};
use crate::dataset::Dataset;
use crate::error::{Result, ResultExt};
use crate::types::AnalyzerKind;
use crate::utils::{percentage, round_to, series_to_strings};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Duplicate-row detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateAnalyzer;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubsetDuplicates {
    pub columns_checked: Vec<String>,
    pub duplicate_count: usize,
    pub duplicate_percentage: f64,
    pub unique_combinations: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateMetrics {
    pub total_rows: usize,
    pub unique_rows: usize,
    /// Rows that repeat an earlier row.
    pub duplicate_rows: usize,
    pub duplicate_percentage: f64,
    pub duplicate_groups: usize,
    pub largest_group_size: usize,
    pub average_group_size: f64,
    /// Number of groups keyed by group size.
    pub groups_by_size: BTreeMap<usize, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subset: Option<SubsetDuplicates>,
}

/// Piecewise duplicate score for a duplicate-row percentage.
pub fn duplicate_score(duplicate_pct: f64) -> f64 {
    let d = duplicate_pct.max(0.0);
    if d == 0.0 {
        100.0
    } else if d <= 1.0 {
        95.0 - d * 2.0
    } else if d <= 5.0 {
        90.0 - d * 3.0
    } else if d <= 20.0 {
        75.0 - (d - 5.0) * 4.0
    } else {
        (15.0 - (d - 20.0) * 0.5).max(10.0)
    }
}

fn unique_height(frame: &DataFrame) -> Result<usize> {
    let unique = frame
        .unique::<&str, &str>(None, UniqueKeepStrategy::First, None)
        .context("Computing distinct rows")?;
    Ok(unique.height())
}

/// Size of every group of identical rows with more than one member.
fn duplicate_group_sizes(dataset: &Dataset) -> Result<Vec<usize>> {
    let rows = dataset.height();
    let mut keys = vec![String::new(); rows];
    for column in dataset.frame().get_columns() {
        let values = series_to_strings(column.as_materialized_series())
            .context("Rendering rows for grouping")?;
        for (key, value) in keys.iter_mut().zip(values) {
            match value {
                Some(v) => key.push_str(&v),
                None => key.push('\u{0}'),
            }
            key.push('\u{1f}');
        }
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }
    let mut sizes: Vec<usize> = counts.into_values().filter(|&n| n > 1).collect();
    sizes.sort_unstable();
    Ok(sizes)
}

impl Analyzer for DuplicateAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Duplicates
    }

    fn run(&self, ctx: &AnalysisContext<'_>) -> Result<AnalyzerOutput> {
        let dataset = ctx.dataset;
        let frame = dataset.frame();
        let total_rows = dataset.height();

        let unique_rows = unique_height(frame)?;
        let duplicate_rows = total_rows - unique_rows;
        let duplicate_pct = percentage(duplicate_rows, total_rows);

        let sizes = duplicate_group_sizes(dataset)?;
        let mut groups_by_size = BTreeMap::new();
        for size in &sizes {
            *groups_by_size.entry(*size).or_default() += 1;
        }

        let subset = match &ctx.config.duplicate_subset {
            Some(columns) => {
                let valid: Vec<&str> = columns
                    .iter()
                    .map(String::as_str)
                    .filter(|c| dataset.has_column(c))
                    .collect();
                if valid.is_empty() {
                    None
                } else {
                    let projected = frame.select(valid.iter().copied()).context("Selecting duplicate subset")?;
                    let unique_combinations = unique_height(&projected)?;
                    let count = total_rows - unique_combinations;
                    Some(SubsetDuplicates {
                        columns_checked: valid.iter().map(|c| c.to_string()).collect(),
                        duplicate_count: count,
                        duplicate_percentage: pct2(count, total_rows),
                        unique_combinations,
                    })
                }
            }
            None => None,
        };

        let metrics = DuplicateMetrics {
            total_rows,
            unique_rows,
            duplicate_rows,
            duplicate_percentage: round_to(duplicate_pct, 2),
            duplicate_groups: sizes.len(),
            largest_group_size: sizes.last().copied().unwrap_or(0),
            average_group_size: if sizes.is_empty() {
                0.0
            } else {
                round_to(sizes.iter().sum::<usize>() as f64 / sizes.len() as f64, 1)
            },
            groups_by_size,
            subset,
        };

        let score = duplicate_score(duplicate_pct);
        debug!(
            "Duplicates: {} of {} rows ({:.2}%), score {:.1}",
            duplicate_rows, total_rows, duplicate_pct, score
        );

        let recommendations = recommendations(&metrics, duplicate_pct);
        let mut critical = Vec::new();
        if duplicate_pct > 20.0 {
            critical.push(format!(
                "High duplication: {:.1}% of rows repeat an earlier row",
                duplicate_pct
            ));
        }

        Ok(AnalyzerOutput::new(score, AnalyzerMetrics::Duplicates(metrics))
            .with_recommendations(recommendations)
            .with_critical_issues(critical))
    }
}

fn recommendations(metrics: &DuplicateMetrics, duplicate_pct: f64) -> Vec<String> {
    let mut recs: Vec<String> = Vec::new();
    let lines: &[&str] = if duplicate_pct == 0.0 {
        &["Excellent - no duplicate records found"]
    } else if duplicate_pct <= 1.0 {
        &[
            "Very good data quality with minimal duplication",
            "Review duplicates to ensure they are not legitimate repeated events",
        ]
    } else if duplicate_pct <= 5.0 {
        &[
            "Low duplication detected - investigate the data collection process",
            "Automated deduplication with manual review is usually sufficient",
        ]
    } else if duplicate_pct <= 20.0 {
        &[
            "Moderate duplication suggests data collection issues",
            "Add unique constraints and review ETL processes",
        ]
    } else {
        &[
            "High duplication indicates serious data quality problems",
            "Review data sources and add a deduplication step before use",
        ]
    };
    recs.extend(lines.iter().map(|s| s.to_string()));

    if metrics.duplicate_rows > 0 {
        recs.push(format!(
            "{} duplicate rows can be removed",
            metrics.duplicate_rows
        ));
    }
    if let Some(subset) = &metrics.subset
        && subset.duplicate_percentage > metrics.duplicate_percentage
    {
        recs.push(
            "Partial duplicates detected - may indicate related records or data entry errors"
                .to_string(),
        );
    }
    recs
}
