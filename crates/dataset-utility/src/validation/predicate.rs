//! Typed row predicates for custom validation rules.
//!
//! Predicates are data, not code: a small tree of comparisons and boolean
//! combinators over named columns, evaluated column-wise into a row mask.

use crate::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn apply<T: PartialOrd + ?Sized>(&self, left: &T, right: &T) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Gt => left > right,
            Self::Ge => left >= right,
        }
    }

    pub fn is_ordering(&self) -> bool {
        !matches!(self, Self::Eq | Self::Ne)
    }
}

/// A constant in a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Number(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// A boolean expression over the cells of one row.
///
/// ```json
/// {"all": [
///     {"not_null": {"column": "age"}},
///     {"compare": {"column": "age", "op": "ge", "value": 0}}
/// ]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPredicate {
    /// False on null cells.
    Compare {
        column: String,
        op: CompareOp,
        value: Literal,
    },
    IsNull {
        column: String,
    },
    NotNull {
        column: String,
    },
    /// False on null cells.
    InSet {
        column: String,
        values: Vec<Literal>,
    },
    All(Vec<RowPredicate>),
    Any(Vec<RowPredicate>),
    Not(Box<RowPredicate>),
}

/// Why a predicate could not be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateError {
    MissingColumn(String),
    Read(String),
}

impl fmt::Display for PredicateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn(c) => write!(f, "column '{}' not found in dataset", c),
            Self::Read(reason) => f.write_str(reason),
        }
    }
}

impl RowPredicate {
    /// Structural problems that make the predicate meaningless.
    pub fn check(&self) -> Result<(), String> {
        match self {
            Self::Compare { op, value, .. } => match value {
                Literal::Bool(_) if op.is_ordering() => {
                    Err("boolean values only support eq and ne".to_string())
                }
                Literal::Number(v) if !v.is_finite() => {
                    Err(format!("comparison value must be finite, got {}", v))
                }
                _ => Ok(()),
            },
            Self::InSet { values, .. } if values.is_empty() => {
                Err("in_set needs at least one value".to_string())
            }
            Self::All(children) | Self::Any(children) => {
                children.iter().try_for_each(RowPredicate::check)
            }
            Self::Not(inner) => inner.check(),
            _ => Ok(()),
        }
    }

    /// One flag per row: whether the predicate holds.
    pub fn evaluate(&self, dataset: &Dataset) -> Result<Vec<bool>, PredicateError> {
        let rows = dataset.height();
        match self {
            Self::Compare { column, op, value } => {
                require(dataset, column)?;
                match value {
                    Literal::Number(bound) => Ok(numbers(dataset, column)?
                        .into_iter()
                        .map(|v| v.is_some_and(|x| op.apply(&x, bound)))
                        .collect()),
                    Literal::Text(bound) => Ok(texts(dataset, column)?
                        .into_iter()
                        .map(|v| v.is_some_and(|x| op.apply(x.as_str(), bound.as_str())))
                        .collect()),
                    Literal::Bool(bound) => Ok(texts(dataset, column)?
                        .into_iter()
                        .map(|v| {
                            v.and_then(|x| parse_bool(&x))
                                .is_some_and(|x| op.apply(&x, bound))
                        })
                        .collect()),
                }
            }
            Self::IsNull { column } => {
                require(dataset, column)?;
                Ok(texts(dataset, column)?.iter().map(Option::is_none).collect())
            }
            Self::NotNull { column } => {
                require(dataset, column)?;
                Ok(texts(dataset, column)?.iter().map(Option::is_some).collect())
            }
            Self::InSet { column, values } => {
                require(dataset, column)?;
                let numeric: Vec<f64> = values
                    .iter()
                    .filter_map(|v| match v {
                        Literal::Number(n) => Some(*n),
                        _ => None,
                    })
                    .collect();
                let text: Vec<String> = values
                    .iter()
                    .filter(|v| !matches!(v, Literal::Number(_)))
                    .map(|v| v.to_string())
                    .collect();
                let nums = numbers(dataset, column)?;
                let strs = texts(dataset, column)?;
                Ok(nums
                    .iter()
                    .zip(&strs)
                    .map(|(n, s)| {
                        n.is_some_and(|x| numeric.contains(&x))
                            || s.as_ref().is_some_and(|x| text.contains(x))
                    })
                    .collect())
            }
            Self::All(children) => {
                let mut mask = vec![true; rows];
                for child in children {
                    for (m, v) in mask.iter_mut().zip(child.evaluate(dataset)?) {
                        *m &= v;
                    }
                }
                Ok(mask)
            }
            Self::Any(children) => {
                let mut mask = vec![false; rows];
                for child in children {
                    for (m, v) in mask.iter_mut().zip(child.evaluate(dataset)?) {
                        *m |= v;
                    }
                }
                Ok(mask)
            }
            Self::Not(inner) => Ok(inner.evaluate(dataset)?.into_iter().map(|v| !v).collect()),
        }
    }
}

fn require(dataset: &Dataset, column: &str) -> Result<(), PredicateError> {
    if dataset.has_column(column) {
        Ok(())
    } else {
        Err(PredicateError::MissingColumn(column.to_string()))
    }
}

fn numbers(dataset: &Dataset, column: &str) -> Result<Vec<Option<f64>>, PredicateError> {
    dataset
        .f64_values(column)
        .map_err(|e| PredicateError::Read(e.to_string()))
}

fn texts(dataset: &Dataset, column: &str) -> Result<Vec<Option<String>>, PredicateError> {
    dataset
        .string_values(column)
        .map_err(|e| PredicateError::Read(e.to_string()))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{NamedFrom, df};
    use pretty_assertions::assert_eq;

    fn dataset() -> Dataset {
        let df = df![
            "age" => [Some(25i64), Some(-3), None, Some(70)],
            "city" => [Some("paris"), Some("rome"), Some("oslo"), None],
            "active" => [true, false, true, true],
        ]
        .unwrap();
        Dataset::new(df).unwrap()
    }

    fn compare(column: &str, op: CompareOp, value: Literal) -> RowPredicate {
        RowPredicate::Compare {
            column: column.to_string(),
            op,
            value,
        }
    }

    #[test]
    fn test_numeric_compare_is_false_on_null() {
        let p = compare("age", CompareOp::Ge, Literal::Number(0.0));
        assert_eq!(p.evaluate(&dataset()).unwrap(), vec![true, false, false, true]);
    }

    #[test]
    fn test_combinators() {
        let p = RowPredicate::Any(vec![
            RowPredicate::IsNull {
                column: "age".into(),
            },
            RowPredicate::All(vec![
                compare("age", CompareOp::Ge, Literal::Number(0.0)),
                compare("age", CompareOp::Lt, Literal::Number(65.0)),
            ]),
        ]);
        assert_eq!(p.evaluate(&dataset()).unwrap(), vec![true, false, true, false]);

        let negated = RowPredicate::Not(Box::new(p));
        assert_eq!(
            negated.evaluate(&dataset()).unwrap(),
            vec![false, true, false, true]
        );
    }

    #[test]
    fn test_in_set_and_bool_compare() {
        let p = RowPredicate::InSet {
            column: "city".into(),
            values: vec![Literal::Text("paris".into()), Literal::Text("oslo".into())],
        };
        assert_eq!(p.evaluate(&dataset()).unwrap(), vec![true, false, true, false]);

        let active = compare("active", CompareOp::Eq, Literal::Bool(true));
        assert_eq!(active.evaluate(&dataset()).unwrap(), vec![true, false, true, true]);
    }

    #[test]
    fn test_missing_column() {
        let p = RowPredicate::NotNull {
            column: "nope".into(),
        };
        assert_eq!(
            p.evaluate(&dataset()),
            Err(PredicateError::MissingColumn("nope".into()))
        );
    }

    #[test]
    fn test_json_shape_and_check() {
        let p: RowPredicate = serde_json::from_str(
            r#"{"all": [{"not_null": {"column": "age"}},
                        {"compare": {"column": "age", "op": "ge", "value": 0}}]}"#,
        )
        .unwrap();
        assert!(p.check().is_ok());
        assert_eq!(p.evaluate(&dataset()).unwrap(), vec![true, false, false, true]);

        let bad = compare("active", CompareOp::Lt, Literal::Bool(true));
        assert!(bad.check().is_err());
    }
}
