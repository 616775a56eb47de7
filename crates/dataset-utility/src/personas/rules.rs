//! Weighted predicate rules.

use super::Persona;
use crate::characteristics::{Characteristic, CharacteristicValue, ValueKind};
use crate::config::ConfigValidationError;
use crate::scoring::LensKind;
use serde::{Deserialize, Serialize};

/// How a characteristic is compared against a rule bound.
///
/// Serialized inline in its predicate, e.g. `{"characteristic": "...",
/// "min": 10, "weight": 0.4}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// Satisfied when the value is at least the bound.
    Min(f64),
    /// Satisfied when the value is at most the bound.
    Max(f64),
    /// Satisfied on equality.
    Value(CharacteristicValue),
    /// Satisfied when the value is one of the listed values.
    Values(Vec<CharacteristicValue>),
}

/// One weighted condition of a persona rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub characteristic: Characteristic,
    #[serde(flatten)]
    pub comparator: Comparator,
    pub weight: f64,
}

impl Predicate {
    pub fn min(characteristic: Characteristic, bound: f64, weight: f64) -> Self {
        Self {
            characteristic,
            comparator: Comparator::Min(bound),
            weight,
        }
    }

    pub fn max(characteristic: Characteristic, bound: f64, weight: f64) -> Self {
        Self {
            characteristic,
            comparator: Comparator::Max(bound),
            weight,
        }
    }

    pub fn value(characteristic: Characteristic, value: CharacteristicValue, weight: f64) -> Self {
        Self {
            characteristic,
            comparator: Comparator::Value(value),
            weight,
        }
    }

    pub fn one_of(characteristic: Characteristic, values: &[&str], weight: f64) -> Self {
        Self {
            characteristic,
            comparator: Comparator::Values(
                values
                    .iter()
                    .map(|v| CharacteristicValue::Text(v.to_string()))
                    .collect(),
            ),
            weight,
        }
    }

    /// The reason text when `value` satisfies the predicate, else `None`.
    pub fn matches(&self, value: &CharacteristicValue) -> Option<String> {
        let name = self.characteristic.as_str();
        match &self.comparator {
            Comparator::Min(min) => {
                let v = value.as_number()?;
                (v >= *min).then(|| format!("{} ({}) meets minimum threshold ({})", name, v, min))
            }
            Comparator::Max(max) => {
                let v = value.as_number()?;
                (v <= *max).then(|| format!("{} ({}) is below maximum threshold ({})", name, v, max))
            }
            Comparator::Value(expected) => (value == expected)
                .then(|| format!("{} matches expected value ({})", name, expected)),
            Comparator::Values(options) => options.contains(value).then(|| {
                let listed: Vec<String> = options.iter().map(|o| o.to_string()).collect();
                format!("{} ({}) is in expected values ([{}])", name, value, listed.join(", "))
            }),
        }
    }

    fn validate(&self, persona: Persona) -> Result<(), ConfigValidationError> {
        let malformed = |reason: String| ConfigValidationError::MalformedPredicate {
            persona: persona.to_string(),
            characteristic: self.characteristic.to_string(),
            reason,
        };

        if !(self.weight.is_finite() && self.weight > 0.0) {
            return Err(malformed(format!("weight must be positive, got {}", self.weight)));
        }

        let kind = self.characteristic.kind();
        match &self.comparator {
            Comparator::Min(bound) | Comparator::Max(bound) => {
                if !bound.is_finite() {
                    return Err(malformed(format!("bound must be finite, got {}", bound)));
                }
                if kind != ValueKind::Number {
                    return Err(malformed("min/max apply to numeric characteristics only".into()));
                }
            }
            Comparator::Value(value) => check_literal(kind, value).map_err(malformed)?,
            Comparator::Values(values) => {
                if values.is_empty() {
                    return Err(malformed("values list is empty".into()));
                }
                for value in values {
                    check_literal(kind, value).map_err(malformed)?;
                }
            }
        }
        Ok(())
    }
}

fn check_literal(kind: ValueKind, value: &CharacteristicValue) -> Result<(), String> {
    let ok = match (kind, value) {
        (ValueKind::Number, CharacteristicValue::Number(v)) => v.is_finite(),
        (ValueKind::Text, CharacteristicValue::Text(_)) => true,
        (ValueKind::Flag, CharacteristicValue::Flag(_)) => true,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("literal {} does not fit a {:?} characteristic", value, kind))
    }
}

/// A persona hypothesis: weighted predicates, a confidence threshold and
/// the scoring lenses that matter when the persona is tagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaRule {
    pub persona: Persona,
    pub predicates: Vec<Predicate>,
    pub threshold: f64,
    #[serde(default)]
    pub lenses: Vec<LensKind>,
}

/// Confidence and reasons for one rule against one characteristics record.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEvaluation {
    pub confidence: f64,
    pub matched_reasons: Vec<String>,
    /// False when none of the rule's characteristics are present.
    pub evaluable: bool,
}

impl PersonaRule {
    pub fn new(persona: Persona, threshold: f64) -> Self {
        Self {
            persona,
            predicates: Vec::new(),
            threshold,
            lenses: Vec::new(),
        }
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn with_lenses(mut self, lenses: &[LensKind]) -> Self {
        self.lenses = lenses.to_vec();
        self
    }

    /// Matched weight over the weight of predicates whose characteristic is
    /// present. Absent characteristics neither help nor hurt.
    pub fn evaluate(&self, characteristics: &crate::characteristics::Characteristics) -> RuleEvaluation {
        let mut present_weight = 0.0;
        let mut matched_weight = 0.0;
        let mut matched_reasons = Vec::new();

        for predicate in &self.predicates {
            let Some(value) = characteristics.get(predicate.characteristic) else {
                continue;
            };
            present_weight += predicate.weight;
            if let Some(reason) = predicate.matches(&value) {
                matched_weight += predicate.weight;
                matched_reasons.push(reason);
            }
        }

        let confidence = if present_weight > 0.0 {
            crate::utils::round_to(matched_weight / present_weight, 3)
        } else {
            0.0
        };
        RuleEvaluation {
            confidence,
            matched_reasons,
            evaluable: present_weight > 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let malformed = |reason: String| ConfigValidationError::MalformedPersonaRule {
            persona: self.persona.to_string(),
            reason,
        };
        if self.predicates.is_empty() {
            return Err(malformed("rule has no predicates".into()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(malformed(format!(
                "threshold must lie in [0, 1], got {}",
                self.threshold
            )));
        }
        for predicate in &self.predicates {
            predicate.validate(self.persona)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characteristics::Characteristics;
    use pretty_assertions::assert_eq;

    fn fraud_rule() -> PersonaRule {
        PersonaRule::new(Persona::FraudResearch, 0.7)
            .with(Predicate::min(Characteristic::ClassImbalanceRatio, 20.0, 0.5))
            .with(Predicate::max(Characteristic::MinorityClassPercentage, 2.0, 0.3))
            .with(Predicate::min(Characteristic::DataCompleteness, 85.0, 0.2))
    }

    #[test]
    fn test_confidence_over_present_predicates() {
        let c = Characteristics {
            class_imbalance_ratio: Some(30.0),
            minority_class_percentage: Some(5.0),
            ..Default::default()
        };
        // completeness absent: 0.5 matched of 0.8 present
        let eval = fraud_rule().evaluate(&c);
        assert_eq!(eval.confidence, 0.625);
        assert_eq!(
            eval.matched_reasons,
            vec!["class_imbalance_ratio (30) meets minimum threshold (20)".to_string()]
        );
        assert!(eval.evaluable);
    }

    #[test]
    fn test_no_present_characteristics() {
        let eval = fraud_rule().evaluate(&Characteristics::default());
        assert_eq!(eval.confidence, 0.0);
        assert!(!eval.evaluable);
    }

    #[test]
    fn test_values_comparator_reason() {
        let p = Predicate::one_of(
            Characteristic::ClassBalanceLevel,
            &["imbalanced", "severely_imbalanced"],
            0.3,
        );
        let reason = p.matches(&CharacteristicValue::Text("imbalanced".into()));
        assert_eq!(
            reason.as_deref(),
            Some(
                "class_balance_level (imbalanced) is in expected values ([imbalanced, severely_imbalanced])"
            )
        );
        assert_eq!(p.matches(&CharacteristicValue::Text("good".into())), None);
    }

    #[test]
    fn test_predicate_json_shape() {
        let p: Predicate = serde_json::from_str(
            r#"{"characteristic": "outlier_percentage", "max": 5, "weight": 0.2}"#,
        )
        .unwrap();
        assert_eq!(p, Predicate::max(Characteristic::OutlierPercentage, 5.0, 0.2));

        let flag: Predicate = serde_json::from_str(
            r#"{"characteristic": "has_demographic_features", "value": true, "weight": 0.4}"#,
        )
        .unwrap();
        assert_eq!(flag.comparator, Comparator::Value(CharacteristicValue::Flag(true)));
    }

    #[test]
    fn test_validation_rejects_malformed_rules() {
        let bad_weight = PersonaRule::new(Persona::AnomalyDetection, 0.6)
            .with(Predicate::min(Characteristic::OutlierPercentage, 3.0, 0.0));
        assert!(matches!(
            bad_weight.validate(),
            Err(ConfigValidationError::MalformedPredicate { .. })
        ));

        let bad_kind = PersonaRule::new(Persona::AnomalyDetection, 0.6)
            .with(Predicate::min(Characteristic::ClassBalanceLevel, 3.0, 0.5));
        assert!(bad_kind.validate().is_err());

        let bad_threshold = fraud_rule();
        let bad_threshold = PersonaRule {
            threshold: 1.5,
            ..bad_threshold
        };
        assert!(matches!(
            bad_threshold.validate(),
            Err(ConfigValidationError::MalformedPersonaRule { .. })
        ));

        let bound = PersonaRule::new(Persona::AnomalyDetection, 0.6)
            .with(Predicate::max(Characteristic::OutlierPercentage, f64::NAN, 0.5));
        assert!(bound.validate().is_err());

        assert!(fraud_rule().validate().is_ok());
    }
}
