//! Immutable dataset wrapper used by every analyzer.
//!
//! [`Dataset`] owns a Polars `DataFrame` for the duration of one analysis
//! request and caches the per-column facts the analyzers keep asking for
//! (semantic kind, null count, distinct count).

use crate::error::{Result, ResultExt, UtilityError};
use crate::utils::{
    is_numeric_dtype, is_temporal_dtype, is_text_dtype, series_to_f64, series_to_strings,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Column names that are treated as the supervised target when present.
pub const TARGET_NAME_HINTS: [&str; 10] = [
    "target",
    "label",
    "class",
    "y",
    "outcome",
    "result",
    "prediction",
    "response",
    "dependent",
    "output",
];

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Boolean,
    Temporal,
    Other,
}

impl ColumnKind {
    /// Classify a Polars dtype.
    pub fn from_dtype(dtype: &DataType) -> Self {
        if is_numeric_dtype(dtype) {
            Self::Numeric
        } else if matches!(dtype, DataType::Boolean) {
            Self::Boolean
        } else if is_temporal_dtype(dtype) {
            Self::Temporal
        } else if is_text_dtype(dtype) {
            Self::Categorical
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Boolean => "boolean",
            Self::Temporal => "temporal",
            Self::Other => "other",
        }
    }
}

/// Cached facts about a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub kind: ColumnKind,
    pub null_count: usize,
    /// Distinct non-null values.
    pub unique_count: usize,
}

/// Shape and type summary of the analysed dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetOverview {
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub column_kinds: BTreeMap<String, ColumnKind>,
    pub numeric_columns: usize,
    pub total_cells: usize,
    pub missing_cells: usize,
    pub estimated_size_mb: f64,
}

/// An immutable, analysed view over a `DataFrame`.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    columns: Vec<ColumnInfo>,
}

impl Dataset {
    /// Wrap a frame, rejecting datasets without rows or columns.
    pub fn new(frame: DataFrame) -> Result<Self> {
        if frame.height() == 0 || frame.width() == 0 {
            return Err(UtilityError::EmptyDataset);
        }

        let mut columns = Vec::with_capacity(frame.width());
        for column in frame.get_columns() {
            let series = column.as_materialized_series();
            let unique_count = series
                .drop_nulls()
                .n_unique()
                .context(format!("Counting distinct values of '{}'", series.name()))?;
            columns.push(ColumnInfo {
                name: series.name().to_string(),
                dtype: series.dtype().to_string(),
                kind: ColumnKind::from_dtype(series.dtype()),
                null_count: series.null_count(),
                unique_count,
            });
        }

        debug!(
            "Dataset wrapped: {} rows x {} columns",
            frame.height(),
            frame.width()
        );

        Ok(Self { frame, columns })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column_info(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_info(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Names of numeric columns, in frame order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Numeric)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Numeric columns other than `exclude` (used to build feature sets).
    pub fn numeric_features(&self, exclude: Option<&str>) -> Vec<&str> {
        self.numeric_columns()
            .into_iter()
            .filter(|name| Some(*name) != exclude)
            .collect()
    }

    /// Borrow a column as a Series.
    pub fn series(&self, name: &str) -> Result<&Series> {
        self.frame
            .column(name)
            .map(|c| c.as_materialized_series())
            .map_err(|_| UtilityError::ColumnNotFound(name.to_string()))
    }

    /// Column values as `f64`, nulls preserved.
    pub fn f64_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let series = self.series(name)?;
        series_to_f64(series).context(format!("Reading '{}' as f64", name))
    }

    /// Column values rendered as strings, nulls preserved.
    pub fn string_values(&self, name: &str) -> Result<Vec<Option<String>>> {
        let series = self.series(name)?;
        series_to_strings(series).context(format!("Reading '{}' as text", name))
    }

    pub fn total_cells(&self) -> usize {
        self.height() * self.width()
    }

    pub fn missing_cells(&self) -> usize {
        self.columns.iter().map(|c| c.null_count).sum()
    }

    pub fn overview(&self) -> DatasetOverview {
        DatasetOverview {
            rows: self.height(),
            columns: self.width(),
            column_names: self.columns.iter().map(|c| c.name.clone()).collect(),
            column_kinds: self
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.kind))
                .collect(),
            numeric_columns: self.numeric_columns().len(),
            total_cells: self.total_cells(),
            missing_cells: self.missing_cells(),
            estimated_size_mb: self.frame.estimated_size() as f64 / (1024.0 * 1024.0),
        }
    }

    /// Resolve the supervised target column.
    ///
    /// An explicit name must exist. Otherwise the first column whose name is a
    /// well-known target name wins, then the last column when it is numeric or
    /// has few distinct values (at most `min(20, rows / 10)`).
    pub fn identify_target(&self, explicit: Option<&str>) -> Result<Option<String>> {
        if let Some(name) = explicit {
            if !self.has_column(name) {
                return Err(UtilityError::ColumnNotFound(name.to_string()));
            }
            return Ok(Some(name.to_string()));
        }

        if let Some(hit) = self.columns.iter().find(|c| {
            let lower = c.name.to_ascii_lowercase();
            TARGET_NAME_HINTS.contains(&lower.as_str())
        }) {
            return Ok(Some(hit.name.clone()));
        }

        let Some(last) = self.columns.last() else {
            return Ok(None);
        };
        let max_classes = 20.min(self.height() / 10);
        if last.kind == ColumnKind::Numeric || last.unique_count <= max_classes {
            return Ok(Some(last.name.clone()));
        }

        Ok(None)
    }
}
