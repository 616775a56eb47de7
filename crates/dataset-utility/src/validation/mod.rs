//! Declarative validation rules.
//!
//! Rules are grouped into categories (completeness, data types, value
//! ranges, uniqueness, patterns, custom). Each configured category is one
//! executed rule; the report's score is the share of categories that pass.
//! Missing columns and unusable patterns produce warnings, never failures.

mod predicate;

pub use predicate::{CompareOp, Literal, PredicateError, RowPredicate};

use crate::config::{ConfigValidationError, ExpectedType};
use crate::dataset::Dataset;
use crate::utils::{percentage, round_to};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletenessRule {
    pub max_missing_percentage: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRule {
    pub name: String,
    pub predicate: RowPredicate,
}

/// User-supplied validation rules, usually loaded from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    pub completeness: Option<CompletenessRule>,
    pub expected_types: BTreeMap<String, ExpectedType>,
    pub value_ranges: BTreeMap<String, ValueRange>,
    pub unique_columns: Vec<String>,
    /// Column to regex; a value passes when the pattern matches at its start.
    pub patterns: BTreeMap<String, String>,
    pub custom_rules: Vec<CustomRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Completeness,
    DataTypes,
    ValueRanges,
    Uniqueness,
    Patterns,
    CustomLogic,
}

impl RuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completeness => "completeness",
            Self::DataTypes => "data_types",
            Self::ValueRanges => "value_ranges",
            Self::Uniqueness => "uniqueness",
            Self::Patterns => "patterns",
            Self::CustomLogic => "custom_logic",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub passed: bool,
    pub checks: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl RuleResult {
    fn finish(mut self) -> Self {
        self.passed = self.errors.is_empty();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub overall_valid: bool,
    /// Passed over executed categories, in [0, 1].
    pub validation_score: f64,
    pub rules_executed: usize,
    pub rules_passed: usize,
    pub rule_results: BTreeMap<RuleCategory, RuleResult>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationRules {
    pub fn from_json(json: &str) -> Result<Self, ConfigValidationError> {
        let rules: Self = serde_json::from_str(json)?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn is_empty(&self) -> bool {
        self.completeness.is_none()
            && self.expected_types.is_empty()
            && self.value_ranges.is_empty()
            && self.unique_columns.is_empty()
            && self.patterns.is_empty()
            && self.custom_rules.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let malformed = |rule: &str, reason: String| ConfigValidationError::MalformedValidationRule {
            rule: rule.to_string(),
            reason,
        };

        if let Some(c) = &self.completeness
            && !(0.0..=100.0).contains(&c.max_missing_percentage)
        {
            return Err(malformed(
                "completeness",
                format!("max_missing_percentage must lie in [0, 100], got {}", c.max_missing_percentage),
            ));
        }

        for (column, range) in &self.value_ranges {
            let finite = range.min.is_none_or(f64::is_finite) && range.max.is_none_or(f64::is_finite);
            if !finite {
                return Err(malformed(column, "range bounds must be finite".into()));
            }
            if let (Some(min), Some(max)) = (range.min, range.max)
                && min > max
            {
                return Err(malformed(column, format!("min {} exceeds max {}", min, max)));
            }
        }

        let mut names = HashSet::new();
        for rule in &self.custom_rules {
            if rule.name.trim().is_empty() {
                return Err(malformed("custom_rules", "rule name is empty".into()));
            }
            if !names.insert(rule.name.as_str()) {
                return Err(ConfigValidationError::DuplicateEntry(rule.name.clone()));
            }
            rule.predicate.check().map_err(|reason| malformed(&rule.name, reason))?;
        }
        Ok(())
    }

    /// Run every configured category against `dataset`.
    pub fn execute(&self, dataset: &Dataset) -> ValidationReport {
        let mut rule_results = BTreeMap::new();
        if let Some(rule) = &self.completeness {
            rule_results.insert(RuleCategory::Completeness, check_completeness(dataset, rule));
        }
        if !self.expected_types.is_empty() {
            rule_results.insert(RuleCategory::DataTypes, check_types(dataset, &self.expected_types));
        }
        if !self.value_ranges.is_empty() {
            rule_results.insert(RuleCategory::ValueRanges, check_ranges(dataset, &self.value_ranges));
        }
        if !self.unique_columns.is_empty() {
            rule_results.insert(RuleCategory::Uniqueness, check_uniqueness(dataset, &self.unique_columns));
        }
        if !self.patterns.is_empty() {
            rule_results.insert(RuleCategory::Patterns, check_patterns(dataset, &self.patterns));
        }
        if !self.custom_rules.is_empty() {
            rule_results.insert(RuleCategory::CustomLogic, check_custom(dataset, &self.custom_rules));
        }

        let rules_executed = rule_results.len();
        let rules_passed = rule_results.values().filter(|r| r.passed).count();
        let errors: Vec<String> = rule_results.values().flat_map(|r| r.errors.clone()).collect();
        let warnings: Vec<String> = rule_results.values().flat_map(|r| r.warnings.clone()).collect();
        let validation_score = if rules_executed > 0 {
            round_to(rules_passed as f64 / rules_executed as f64, 3)
        } else {
            0.0
        };

        debug!(
            "Validation: {}/{} rule categories passed",
            rules_passed, rules_executed
        );

        ValidationReport {
            overall_valid: errors.is_empty(),
            validation_score,
            rules_executed,
            rules_passed,
            rule_results,
            errors,
            warnings,
        }
    }
}

// =============================================================================
// Category checks
// =============================================================================

fn check_completeness(dataset: &Dataset, rule: &CompletenessRule) -> RuleResult {
    let threshold = rule.max_missing_percentage;
    let mut result = RuleResult::default();
    for info in dataset.columns() {
        result.checks += 1;
        let pct = percentage(info.null_count, dataset.height());
        if pct > threshold {
            result.errors.push(format!(
                "Column '{}' has {:.1}% missing values (threshold: {}%)",
                info.name, pct, threshold
            ));
        } else if pct > threshold * 0.5 {
            result.warnings.push(format!(
                "Column '{}' has {:.1}% missing values (approaching threshold)",
                info.name, pct
            ));
        }
    }
    result.finish()
}

fn check_types(dataset: &Dataset, expected: &BTreeMap<String, ExpectedType>) -> RuleResult {
    let mut result = RuleResult::default();
    for (column, expected_type) in expected {
        let Ok(series) = dataset.series(column) else {
            result
                .warnings
                .push(format!("Expected column '{}' not found in dataset", column));
            continue;
        };
        result.checks += 1;
        if !expected_type.matches(series.dtype()) {
            result.errors.push(format!(
                "Column '{}' has type '{}', expected '{}'",
                column,
                series.dtype(),
                expected_type.as_str()
            ));
        }
    }
    result.finish()
}

fn check_ranges(dataset: &Dataset, ranges: &BTreeMap<String, ValueRange>) -> RuleResult {
    let mut result = RuleResult::default();
    for (column, range) in ranges {
        let Some(info) = dataset.column_info(column) else {
            result
                .warnings
                .push(format!("Range check column '{}' not found in dataset", column));
            continue;
        };
        if info.kind != crate::dataset::ColumnKind::Numeric {
            result
                .warnings
                .push(format!("Column '{}' is not numeric, skipping range check", column));
            continue;
        }
        let values: Vec<f64> = match dataset.f64_values(column) {
            Ok(v) => v.into_iter().flatten().collect(),
            Err(e) => {
                result.warnings.push(format!("Range check on '{}' failed: {}", column, e));
                continue;
            }
        };
        result.checks += 1;
        let (Some(col_min), Some(col_max)) = (
            values.iter().copied().reduce(f64::min),
            values.iter().copied().reduce(f64::max),
        ) else {
            continue;
        };
        if let Some(min) = range.min
            && col_min < min
        {
            result.errors.push(format!(
                "Column '{}' minimum value {} below expected {}",
                column, col_min, min
            ));
        }
        if let Some(max) = range.max
            && col_max > max
        {
            result.errors.push(format!(
                "Column '{}' maximum value {} above expected {}",
                column, col_max, max
            ));
        }
    }
    result.finish()
}

fn check_uniqueness(dataset: &Dataset, columns: &[String]) -> RuleResult {
    let mut result = RuleResult::default();
    for column in columns {
        let values = match dataset.string_values(column) {
            Ok(v) => v,
            Err(_) => {
                result
                    .warnings
                    .push(format!("Uniqueness check column '{}' not found in dataset", column));
                continue;
            }
        };
        result.checks += 1;
        let mut seen = HashSet::new();
        let duplicates = values.iter().flatten().filter(|v| !seen.insert(*v)).count();
        if duplicates > 0 {
            result
                .errors
                .push(format!("Column '{}' has {} duplicate values", column, duplicates));
        }
    }
    result.finish()
}

fn check_patterns(dataset: &Dataset, patterns: &BTreeMap<String, String>) -> RuleResult {
    let mut result = RuleResult::default();
    for (column, pattern) in patterns {
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => {
                result
                    .warnings
                    .push(format!("Pattern check failed for column '{}': {}", column, e));
                continue;
            }
        };
        let Ok(values) = dataset.string_values(column) else {
            result
                .warnings
                .push(format!("Pattern check column '{}' not found in dataset", column));
            continue;
        };
        result.checks += 1;
        let non_matching = values
            .iter()
            .flatten()
            .filter(|v| !re.find(v).is_some_and(|m| m.start() == 0))
            .count();
        if non_matching > 0 {
            result.errors.push(format!(
                "Column '{}' has {} values not matching pattern '{}'",
                column, non_matching, pattern
            ));
        }
    }
    result.finish()
}

fn check_custom(dataset: &Dataset, rules: &[CustomRule]) -> RuleResult {
    let mut result = RuleResult::default();
    for rule in rules {
        match rule.predicate.evaluate(dataset) {
            Ok(mask) => {
                result.checks += 1;
                let violations = mask.iter().filter(|ok| !**ok).count();
                if violations > 0 {
                    result.errors.push(format!(
                        "Custom rule '{}' failed: {} violations",
                        rule.name, violations
                    ));
                }
            }
            Err(e) => result
                .warnings
                .push(format!("Custom rule '{}' execution failed: {}", rule.name, e)),
        }
    }
    result.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    fn dataset() -> Dataset {
        let df = df![
            "id" => [1i64, 2, 3, 3],
            "age" => [Some(25i64), Some(130), None, Some(40)],
            "email" => ["a@x.org", "b@x.org", "nope", "c@x.org"],
        ]
        .unwrap();
        Dataset::new(df).unwrap()
    }

    #[test]
    fn test_execute_all_categories() {
        let rules = ValidationRules::from_json(
            r#"{
                "completeness": {"max_missing_percentage": 10},
                "expected_types": {"id": "integer", "email": "numeric", "ghost": "string"},
                "value_ranges": {"age": {"min": 0, "max": 120}},
                "unique_columns": ["id"],
                "patterns": {"email": "[a-z]+@", "id": "("},
                "custom_rules": [{"name": "adult",
                    "predicate": {"compare": {"column": "age", "op": "ge", "value": 18}}}]
            }"#,
        )
        .unwrap();
        let report = rules.execute(&dataset());

        assert_eq!(report.rules_executed, 6);
        assert_eq!(report.rules_passed, 0);
        assert_eq!(report.validation_score, 0.0);
        assert!(!report.overall_valid);

        let types = &report.rule_results[&RuleCategory::DataTypes];
        assert_eq!(types.errors.len(), 1);
        assert_eq!(
            types.warnings,
            vec!["Expected column 'ghost' not found in dataset".to_string()]
        );
        let ranges = &report.rule_results[&RuleCategory::ValueRanges];
        assert_eq!(
            ranges.errors,
            vec!["Column 'age' maximum value 130 above expected 120".to_string()]
        );
        assert_eq!(
            report.rule_results[&RuleCategory::Uniqueness].errors,
            vec!["Column 'id' has 1 duplicate values".to_string()]
        );
        let patterns = &report.rule_results[&RuleCategory::Patterns];
        assert_eq!(patterns.errors.len(), 1);
        assert_eq!(patterns.warnings.len(), 1);
        assert_eq!(
            report.rule_results[&RuleCategory::CustomLogic].errors,
            vec!["Custom rule 'adult' failed: 1 violations".to_string()]
        );
    }

    #[test]
    fn test_passing_rules_score_one() {
        let rules = ValidationRules {
            unique_columns: vec!["email".into()],
            ..Default::default()
        };
        let report = rules.execute(&dataset());
        assert!(report.overall_valid);
        assert_eq!(report.validation_score, 1.0);
    }

    #[test]
    fn test_validate_rejects_bad_rules() {
        let inverted = ValidationRules {
            value_ranges: BTreeMap::from([(
                "age".to_string(),
                ValueRange {
                    min: Some(10.0),
                    max: Some(1.0),
                },
            )]),
            ..Default::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ConfigValidationError::MalformedValidationRule { .. })
        ));

        let dup = CustomRule {
            name: "x".into(),
            predicate: RowPredicate::NotNull { column: "id".into() },
        };
        let twice = ValidationRules {
            custom_rules: vec![dup.clone(), dup],
            ..Default::default()
        };
        assert!(matches!(
            twice.validate(),
            Err(ConfigValidationError::DuplicateEntry(_))
        ));
        assert!(ValidationRules::default().is_empty());
    }
}
