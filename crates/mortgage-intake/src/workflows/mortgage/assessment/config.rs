use serde::{Deserialize, Serialize};

use super::super::domain::CreditDimension;

/// Weighting, decision thresholds, and rubric cut-offs for the Five C's.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: FactorWeights,
    pub thresholds: DecisionThresholds,
    pub rubric: RubricThresholds,
}

/// Relative weight of each dimension in the overall score; must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorWeights {
    pub character: f64,
    pub capacity: f64,
    pub capital: f64,
    pub collateral: f64,
    pub conditions: f64,
}

impl FactorWeights {
    pub fn weight(&self, dimension: CreditDimension) -> f64 {
        match dimension {
            CreditDimension::Character => self.character,
            CreditDimension::Capacity => self.capacity,
            CreditDimension::Capital => self.capital,
            CreditDimension::Collateral => self.collateral,
            CreditDimension::Conditions => self.conditions,
        }
    }

    pub fn sum(&self) -> f64 {
        CreditDimension::ordered()
            .into_iter()
            .map(|dimension| self.weight(dimension))
            .sum()
    }
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            character: 0.20,
            capacity: 0.30,
            capital: 0.15,
            collateral: 0.25,
            conditions: 0.10,
        }
    }
}

/// Overall-score cut-offs; anything strictly between them is referred for review.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionThresholds {
    pub approve_threshold: f64,
    pub reject_threshold: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            approve_threshold: 70.0,
            reject_threshold: 40.0,
        }
    }
}

/// Per-dimension scoring cut-offs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RubricThresholds {
    /// Credit score at or below which Character scores 0.
    pub credit_score_floor: f64,
    /// Credit score at or above which Character scores 100.
    pub credit_score_target: f64,
    pub ideal_dti: f64,
    pub max_dti: f64,
    /// Assets-to-loan ratio at or above which Capital scores 100.
    pub target_reserve_ratio: f64,
    pub ideal_ltv: f64,
    pub max_ltv: f64,
    pub stable_employment_years: f64,
}

impl Default for RubricThresholds {
    fn default() -> Self {
        Self {
            credit_score_floor: 580.0,
            credit_score_target: 740.0,
            ideal_dti: 0.28,
            max_dti: 0.50,
            target_reserve_ratio: 0.20,
            ideal_ltv: 0.60,
            max_ltv: 0.95,
            stable_employment_years: 2.0,
        }
    }
}
