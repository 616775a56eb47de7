//! The persona rule and scoring lens tables.
//!
//! A [`ScoringCatalog`] is built once, validated at construction and then
//! shared read-only (typically behind an `Arc`) by every request. Custom
//! catalogs can be loaded from JSON with the same shape the standard one
//! serializes to.

use crate::characteristics::{Characteristic as C, CharacteristicValue};
use crate::config::ConfigValidationError;
use crate::personas::{Persona, PersonaRule, Predicate};
use crate::scoring::{Adjustment, LensKind, LensMetric as M, ScoringLens};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

static STANDARD: Lazy<Arc<ScoringCatalog>> = Lazy::new(|| Arc::new(ScoringCatalog::standard()));

const IMBALANCED_LEVELS: [&str; 2] = ["imbalanced", "severely_imbalanced"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringCatalog {
    pub personas: Vec<PersonaRule>,
    pub lenses: Vec<ScoringLens>,
}

impl Default for ScoringCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl ScoringCatalog {
    /// The process-wide standard catalog.
    pub fn shared() -> Arc<ScoringCatalog> {
        Arc::clone(&STANDARD)
    }

    /// Build the standard persona rules and lenses.
    pub fn standard() -> Self {
        Self {
            personas: standard_personas(),
            lenses: standard_lenses(),
        }
    }

    /// Parse and validate a catalog from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigValidationError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn persona_rule(&self, persona: Persona) -> Option<&PersonaRule> {
        self.personas.iter().find(|r| r.persona == persona)
    }

    pub fn lens(&self, kind: LensKind) -> Option<&ScoringLens> {
        self.lenses.iter().find(|l| l.kind == kind)
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.personas.is_empty() {
            return Err(ConfigValidationError::EmptyCatalog("persona rules"));
        }
        if self.lenses.is_empty() {
            return Err(ConfigValidationError::EmptyCatalog("scoring lenses"));
        }

        let mut seen = HashSet::new();
        for rule in &self.personas {
            if !seen.insert(rule.persona.tag()) {
                return Err(ConfigValidationError::DuplicateEntry(rule.persona.to_string()));
            }
            rule.validate()?;
        }

        let mut kinds = HashSet::new();
        for lens in &self.lenses {
            if !kinds.insert(lens.kind) {
                return Err(ConfigValidationError::DuplicateEntry(lens.kind.to_string()));
            }
            lens.validate()?;
        }
        if !kinds.contains(&LensKind::GeneralPurpose) {
            return Err(ConfigValidationError::EmptyCatalog("general_purpose lens"));
        }

        for rule in &self.personas {
            if let Some(missing) = rule.lenses.iter().find(|k| !kinds.contains(k)) {
                return Err(ConfigValidationError::MalformedPersonaRule {
                    persona: rule.persona.to_string(),
                    reason: format!("references undefined lens '{}'", missing),
                });
            }
        }
        Ok(())
    }
}

fn standard_personas() -> Vec<PersonaRule> {
    use LensKind::*;
    vec![
        PersonaRule::new(Persona::AnomalyDetection, 0.6)
            .with(Predicate::min(C::ClassImbalanceRatio, 10.0, 0.4))
            .with(Predicate::max(C::MinorityClassPercentage, 5.0, 0.3))
            .with(Predicate::min(C::OutlierPercentage, 3.0, 0.2))
            .with(Predicate::min(C::DataCompleteness, 80.0, 0.1))
            .with_lenses(&[AnomalyResearch, GeneralPurpose]),
        PersonaRule::new(Persona::FraudResearch, 0.7)
            .with(Predicate::min(C::ClassImbalanceRatio, 20.0, 0.5))
            .with(Predicate::max(C::MinorityClassPercentage, 2.0, 0.3))
            .with(Predicate::min(C::DataCompleteness, 85.0, 0.2))
            .with_lenses(&[AnomalyResearch, GeneralPurpose]),
        PersonaRule::new(Persona::FairnessAudit, 0.5)
            .with(Predicate::value(C::HasDemographicFeatures, CharacteristicValue::Flag(true), 0.4))
            .with(Predicate::one_of(C::ClassBalanceLevel, &IMBALANCED_LEVELS, 0.3))
            .with(Predicate::min(C::DataCompleteness, 70.0, 0.2))
            .with(Predicate::min(C::FeatureCorrelationIssues, 1.0, 0.1))
            .with_lenses(&[FairnessAudit, ResearchBenchmark]),
        PersonaRule::new(Persona::GeneralPurposeML, 0.7)
            .with(Predicate::min(C::DataCompleteness, 90.0, 0.3))
            .with(Predicate::one_of(C::ClassBalanceLevel, &["excellent", "good", "fair"], 0.3))
            .with(Predicate::max(C::DuplicatePercentage, 2.0, 0.2))
            .with(Predicate::max(C::OutlierPercentage, 5.0, 0.2))
            .with_lenses(&[GeneralPurpose, PredictiveModeling]),
        PersonaRule::new(Persona::PredictiveModeling, 0.65)
            .with(Predicate::min(C::MlUsabilityScore, 70.0, 0.4))
            .with(Predicate::one_of(C::FeatureImportanceDistribution, &["medium", "low"], 0.3))
            .with(Predicate::min(C::DataSeparabilityScore, 60.0, 0.2))
            .with(Predicate::min(C::DataCompleteness, 85.0, 0.1))
            .with_lenses(&[PredictiveModeling, GeneralPurpose]),
        PersonaRule::new(Persona::ImbalancedLearning, 0.6)
            .with(Predicate::min(C::ClassImbalanceRatio, 5.0, 0.4))
            .with(Predicate::max(C::MinorityClassPercentage, 10.0, 0.3))
            .with(Predicate::min(C::DataCompleteness, 75.0, 0.2))
            .with(Predicate::min(C::MlUsabilityScore, 50.0, 0.1))
            .with_lenses(&[AnomalyResearch, GeneralPurpose]),
        PersonaRule::new(Persona::ModelRobustnessTesting, 0.5)
            .with(Predicate::min(C::OutlierPercentage, 10.0, 0.4))
            .with(Predicate::min(C::MissingPercentage, 5.0, 0.3))
            .with(Predicate::min(C::TypeConsistencyIssues, 2.0, 0.2))
            .with(Predicate::min(C::DuplicatePercentage, 1.0, 0.1))
            .with_lenses(&[RobustnessTesting, GeneralPurpose]),
        PersonaRule::new(Persona::AdversarialTraining, 0.6)
            .with(Predicate::min(C::OutlierPercentage, 15.0, 0.5))
            .with(Predicate::min(C::FeatureCorrelationIssues, 3.0, 0.3))
            .with(Predicate::max(C::DataSeparabilityScore, 40.0, 0.2))
            .with_lenses(&[RobustnessTesting, ResearchBenchmark]),
        PersonaRule::new(Persona::SociologicalAnalysis, 0.4)
            .with(Predicate::value(C::HasDemographicFeatures, CharacteristicValue::Flag(true), 0.5))
            .with(Predicate::one_of(C::ClassBalanceLevel, &IMBALANCED_LEVELS, 0.2))
            .with(Predicate::min(C::DataCompleteness, 60.0, 0.2))
            .with(Predicate::min(C::FeatureCount, 10.0, 0.1))
            .with_lenses(&[FairnessAudit, ResearchBenchmark]),
        PersonaRule::new(Persona::DataQualityBenchmark, 0.5)
            .with(Predicate::min(C::MissingPercentage, 20.0, 0.4))
            .with(Predicate::min(C::DuplicatePercentage, 5.0, 0.3))
            .with(Predicate::min(C::TypeConsistencyIssues, 5.0, 0.2))
            .with(Predicate::min(C::OutlierPercentage, 8.0, 0.1))
            .with_lenses(&[ResearchBenchmark, RobustnessTesting]),
    ]
}

fn standard_lenses() -> Vec<ScoringLens> {
    vec![
        ScoringLens::new(LensKind::GeneralPurpose)
            .weight(M::Completeness, 0.30)
            .weight(M::Consistency, 0.25)
            .weight(M::Balance, 0.15)
            .weight(M::Cleanliness, 0.15)
            .weight(M::MlReadiness, 0.15)
            .penalty(Adjustment::above("high_missing", C::MissingPercentage, 20.0, 15.0))
            .penalty(Adjustment::above("severe_imbalance", C::ClassImbalanceRatio, 50.0, 10.0))
            .penalty(Adjustment::above("many_duplicates", C::DuplicatePercentage, 10.0, 8.0)),
        ScoringLens::new(LensKind::AnomalyResearch)
            .weight(M::ImbalancePresence, 0.35)
            .weight(M::MinorityCompleteness, 0.25)
            .weight(M::OverallCompleteness, 0.15)
            .weight(M::Separability, 0.15)
            .weight(M::Cleanliness, 0.10)
            .bonus(Adjustment::above("high_imbalance", C::ClassImbalanceRatio, 10.0, 25.0))
            .bonus(Adjustment::above("extreme_imbalance", C::ClassImbalanceRatio, 50.0, 40.0)),
        ScoringLens::new(LensKind::FairnessAudit)
            .weight(M::DemographicPresence, 0.30)
            .weight(M::BiasDetectability, 0.25)
            .weight(M::Completeness, 0.20)
            .weight(M::SampleDiversity, 0.15)
            .weight(M::FeatureRichness, 0.10)
            .bonus(Adjustment::equals(
                "has_demographics",
                C::HasDemographicFeatures,
                CharacteristicValue::Flag(true),
                30.0,
            ))
            .bonus(Adjustment::above("imbalance_present", C::ClassImbalanceRatio, 2.0, 20.0)),
        ScoringLens::new(LensKind::PredictiveModeling)
            .weight(M::MlPerformance, 0.30)
            .weight(M::FeatureImportance, 0.25)
            .weight(M::Separability, 0.20)
            .weight(M::Completeness, 0.15)
            .weight(M::Consistency, 0.10)
            .penalty(Adjustment::below("weak_signals", C::MlUsabilityScore, 50.0, 25.0))
            .penalty(Adjustment::below("poor_separability", C::DataSeparabilityScore, 40.0, 20.0)),
        ScoringLens::new(LensKind::RobustnessTesting)
            .weight(M::NoisePresence, 0.30)
            .weight(M::OutlierPresence, 0.25)
            .weight(M::MissingPatterns, 0.20)
            .weight(M::TypeInconsistencies, 0.15)
            .weight(M::Completeness, 0.10)
            .bonus(Adjustment::above("high_outliers", C::OutlierPercentage, 10.0, 20.0))
            .bonus(Adjustment::above("missing_data", C::MissingPercentage, 5.0, 15.0))
            .bonus(Adjustment::above("type_issues", C::TypeConsistencyIssues, 2.0, 10.0)),
        ScoringLens::new(LensKind::ResearchBenchmark)
            .weight(M::Completeness, 0.20)
            .weight(M::Documentation, 0.20)
            .weight(M::Balance, 0.15)
            .weight(M::SizeAdequacy, 0.15)
            .weight(M::FeatureDiversity, 0.15)
            .weight(M::Reproducibility, 0.15)
            .bonus(Adjustment::above("large_sample", C::SampleCount, 10_000.0, 15.0))
            .bonus(Adjustment::equals(
                "balanced_classes",
                C::ClassBalanceLevel,
                CharacteristicValue::Text("excellent".into()),
                20.0,
            )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_standard_catalog_is_valid() {
        let catalog = ScoringCatalog::standard();
        catalog.validate().unwrap();
        assert_eq!(catalog.personas.len(), 10);
        assert_eq!(catalog.lenses.len(), 6);
        for kind in LensKind::ALL {
            assert!(catalog.lens(kind).is_some(), "missing lens {}", kind);
        }
    }

    #[test]
    fn test_json_round_trip() {
        let catalog = ScoringCatalog::standard();
        let json = serde_json::to_string(&catalog).unwrap();
        let parsed = ScoringCatalog::from_json(&json).unwrap();
        assert_eq!(parsed, catalog);
    }

    #[test]
    fn test_duplicate_persona_rejected() {
        let mut catalog = ScoringCatalog::standard();
        catalog.personas.push(catalog.personas[0].clone());
        assert!(matches!(
            catalog.validate(),
            Err(ConfigValidationError::DuplicateEntry(name)) if name == "#AnomalyDetection"
        ));
    }

    #[test]
    fn test_general_lens_required() {
        let mut catalog = ScoringCatalog::standard();
        catalog.lenses.retain(|l| l.kind != LensKind::GeneralPurpose);
        assert!(matches!(
            catalog.validate(),
            Err(ConfigValidationError::EmptyCatalog(_))
        ));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            ScoringCatalog::from_json("{\"personas\": 3}"),
            Err(ConfigValidationError::Parse(_))
        ));
        let negative = r##"{
            "personas": [{"persona": "#FraudResearch", "threshold": 0.7,
                "predicates": [{"characteristic": "class_imbalance_ratio", "min": 20, "weight": -1}]}],
            "lenses": [{"kind": "general_purpose",
                "weights": [{"metric": "completeness", "weight": 1.0}]}]
        }"##;
        assert!(matches!(
            ScoringCatalog::from_json(negative),
            Err(ConfigValidationError::MalformedPredicate { .. })
        ));
    }

    #[test]
    fn test_shared_catalog_is_reused() {
        let a = ScoringCatalog::shared();
        let b = ScoringCatalog::shared();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
