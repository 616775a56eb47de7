//! Letter grades, readiness gates and publication assessment.

use serde::{Deserialize, Serialize};

/// Letter grade with its label and display colour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilityGrade {
    pub grade: String,
    pub description: String,
    pub color: String,
}

/// (cutoff, grade, description, colour), highest first.
const GRADE_TABLE: [(f64, &str, &str, &str); 10] = [
    (90.0, "A+", "Exceptional", "green"),
    (85.0, "A", "Excellent", "green"),
    (80.0, "A-", "Very Good", "green"),
    (75.0, "B+", "Good", "blue"),
    (70.0, "B", "Above Average", "blue"),
    (65.0, "B-", "Satisfactory", "blue"),
    (60.0, "C+", "Fair", "yellow"),
    (55.0, "C", "Acceptable", "yellow"),
    (50.0, "C-", "Below Average", "yellow"),
    (40.0, "D", "Poor", "orange"),
];

impl UtilityGrade {
    pub fn from_score(score: f64) -> Self {
        let (grade, description, color) = GRADE_TABLE
            .iter()
            .find(|(cutoff, ..)| score >= *cutoff)
            .map(|(_, g, d, c)| (*g, *d, *c))
            .unwrap_or(("F", "Unacceptable", "red"));
        Self {
            grade: grade.to_string(),
            description: description.to_string(),
            color: color.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    ImmediateUse,
    ProductionReady,
    ResearchReady,
    PreprocessingRequired,
    MajorImprovementsNeeded,
}

impl ReadinessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImmediateUse => "immediate_use",
            Self::ProductionReady => "production_ready",
            Self::ResearchReady => "research_ready",
            Self::PreprocessingRequired => "preprocessing_required",
            Self::MajorImprovementsNeeded => "major_improvements_needed",
        }
    }
}

/// Boolean readiness gates plus the highest-priority state that holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub research_ready: bool,
    pub production_ready: bool,
    pub publication_ready: bool,
    pub immediate_use: bool,
    pub preprocessing_required: bool,
    pub major_improvements_needed: bool,
    pub primary_state: ReadinessState,
}

impl Readiness {
    pub fn assess(integrity: f64, overall: f64) -> Self {
        let research_ready = overall >= 60.0;
        let production_ready = overall >= 75.0 && integrity >= 80.0;
        let publication_ready = overall >= 70.0 && integrity >= 75.0;
        let immediate_use = overall >= 80.0;
        let preprocessing_required = overall < 70.0;

        let primary_state = if immediate_use {
            ReadinessState::ImmediateUse
        } else if production_ready {
            ReadinessState::ProductionReady
        } else if research_ready {
            ReadinessState::ResearchReady
        } else if preprocessing_required {
            ReadinessState::PreprocessingRequired
        } else {
            ReadinessState::MajorImprovementsNeeded
        };

        Self {
            research_ready,
            production_ready,
            publication_ready,
            immediate_use,
            preprocessing_required,
            major_improvements_needed: overall < 50.0,
            primary_state,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationStatus {
    Ready,
    NearlyReady,
    NeedsWork,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationCriterion {
    pub name: String,
    pub met: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationReadiness {
    pub publication_score: f64,
    pub status: PublicationStatus,
    pub recommendation: String,
    pub criteria: Vec<PublicationCriterion>,
    pub missing_criteria: Vec<String>,
}

impl PublicationReadiness {
    /// Five criteria; ethical review cannot be inferred from data and is
    /// assumed met.
    pub fn assess(integrity: f64, overall: f64) -> Self {
        let checks = [
            ("sufficient_quality", overall >= 70.0),
            ("data_integrity", integrity >= 75.0),
            ("clear_use_case", overall >= 60.0),
            ("documentation_ready", integrity >= 80.0),
            ("ethical_considerations", true),
        ];
        let met = checks.iter().filter(|(_, ok)| *ok).count();
        let score = met as f64 / checks.len() as f64 * 100.0;

        let (status, recommendation) = if score >= 80.0 {
            (PublicationStatus::Ready, "Recommended for publication")
        } else if score >= 60.0 {
            (
                PublicationStatus::NearlyReady,
                "Consider publication with minor improvements",
            )
        } else {
            (
                PublicationStatus::NeedsWork,
                "Not recommended for publication in current state",
            )
        };

        Self {
            publication_score: crate::utils::round_to(score, 1),
            status,
            recommendation: recommendation.to_string(),
            criteria: checks
                .iter()
                .map(|(name, met)| PublicationCriterion {
                    name: name.to_string(),
                    met: *met,
                })
                .collect(),
            missing_criteria: checks
                .iter()
                .filter(|(_, ok)| !ok)
                .map(|(name, _)| name.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_grade_cutoffs() {
        let grades: Vec<String> = [95.0, 85.0, 80.0, 79.9, 70.0, 65.0, 60.0, 55.0, 50.0, 40.0, 39.9]
            .iter()
            .map(|s| UtilityGrade::from_score(*s).grade)
            .collect();
        assert_eq!(
            grades,
            vec!["A+", "A", "A-", "B+", "B", "B-", "C+", "C", "C-", "D", "F"]
        );
        assert_eq!(UtilityGrade::from_score(0.0).color, "red");
    }

    #[test]
    fn test_readiness_priority() {
        assert_eq!(
            Readiness::assess(100.0, 85.0).primary_state,
            ReadinessState::ImmediateUse
        );
        let production = Readiness::assess(85.0, 76.0);
        assert_eq!(production.primary_state, ReadinessState::ProductionReady);
        assert!(production.publication_ready);
        assert_eq!(
            Readiness::assess(70.0, 76.0).primary_state,
            ReadinessState::ResearchReady
        );
        assert_eq!(
            Readiness::assess(40.0, 45.0).primary_state,
            ReadinessState::PreprocessingRequired
        );
        assert!(Readiness::assess(40.0, 45.0).major_improvements_needed);
    }

    #[test]
    fn test_publication_assessment() {
        let ready = PublicationReadiness::assess(90.0, 80.0);
        assert_eq!(ready.publication_score, 100.0);
        assert_eq!(ready.status, PublicationStatus::Ready);
        assert!(ready.missing_criteria.is_empty());

        let weak = PublicationReadiness::assess(50.0, 50.0);
        assert_eq!(weak.publication_score, 20.0);
        assert_eq!(weak.status, PublicationStatus::NeedsWork);
        assert_eq!(weak.missing_criteria.len(), 4);
    }
}
