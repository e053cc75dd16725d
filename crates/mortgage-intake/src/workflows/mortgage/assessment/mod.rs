mod config;
mod policy;
mod rules;

pub use config::{DecisionThresholds, FactorWeights, RubricThresholds, ScoringConfig};
pub use policy::Decision;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::{CreditDimension, LoanRequest};
use super::extraction::ApplicantRecord;
use policy::{compose_justification, decide};

/// Stateless Five C's evaluator. Total over any record: missing inputs score 0.
pub struct Assessor {
    config: ScoringConfig,
}

impl Assessor {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn assess(&self, record: &ApplicantRecord, loan: &LoanRequest) -> UnderwritingDecision {
        let (factor_scores, ratios) = rules::score_factors(record, loan, &self.config.rubric);

        let weights = &self.config.weights;
        let total_weight = weights.sum();
        let weighted: f64 = factor_scores
            .iter()
            .map(|factor| weights.weight(factor.dimension) * factor.score)
            .sum();
        let overall_score = if total_weight > 0.0 {
            (weighted / total_weight).clamp(0.0, 100.0)
        } else {
            0.0
        };

        let decision = decide(overall_score, &self.config.thresholds);
        let justification =
            compose_justification(decision, overall_score, &self.config.thresholds, &factor_scores);

        UnderwritingDecision {
            overall_score,
            decision,
            factor_scores,
            justification,
            dti_ratio: ratios.dti,
            ltv_ratio: ratios.ltv,
        }
    }
}

/// Score for one of the five dimensions, with the fields that fed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditFactorScore {
    pub dimension: CreditDimension,
    pub score: f64,
    pub rationale: String,
    pub contributing_fields: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingDecision {
    pub overall_score: f64,
    pub decision: Decision,
    /// Always five entries, Character through Conditions.
    pub factor_scores: Vec<CreditFactorScore>,
    pub justification: String,
    pub dti_ratio: Option<f64>,
    pub ltv_ratio: Option<f64>,
}

impl UnderwritingDecision {
    pub fn factor(&self, dimension: CreditDimension) -> Option<&CreditFactorScore> {
        self.factor_scores
            .iter()
            .find(|factor| factor.dimension == dimension)
    }
}
