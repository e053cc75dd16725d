use serde::{Deserialize, Serialize};

use super::config::DecisionThresholds;
use super::CreditFactorScore;

/// Underwriting outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
    ReferForReview,
}

impl Decision {
    pub const fn label(self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Rejected => "rejected",
            Decision::ReferForReview => "referred for manual review",
        }
    }
}

pub(crate) fn decide(overall_score: f64, thresholds: &DecisionThresholds) -> Decision {
    if overall_score >= thresholds.approve_threshold {
        Decision::Approved
    } else if overall_score <= thresholds.reject_threshold {
        Decision::Rejected
    } else {
        Decision::ReferForReview
    }
}

pub(crate) fn compose_justification(
    decision: Decision,
    overall_score: f64,
    thresholds: &DecisionThresholds,
    factors: &[CreditFactorScore],
) -> String {
    let headline = match decision {
        Decision::Approved => format!(
            "Approved with overall score {overall_score:.1} (approval threshold {:.1}).",
            thresholds.approve_threshold
        ),
        Decision::Rejected => format!(
            "Rejected with overall score {overall_score:.1} (rejection threshold {:.1}).",
            thresholds.reject_threshold
        ),
        Decision::ReferForReview => format!(
            "Referred for review with overall score {overall_score:.1}, between rejection threshold {:.1} and approval threshold {:.1}.",
            thresholds.reject_threshold, thresholds.approve_threshold
        ),
    };

    let details = factors
        .iter()
        .map(|factor| {
            format!(
                "{} ({:.1}): {}",
                factor.dimension.label(),
                factor.score,
                factor.rationale
            )
        })
        .collect::<Vec<_>>()
        .join("; ");

    format!("{headline} {details}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_inclusive() {
        let thresholds = DecisionThresholds::default();
        assert_eq!(decide(70.0, &thresholds), Decision::Approved);
        assert_eq!(decide(69.9, &thresholds), Decision::ReferForReview);
        assert_eq!(decide(40.1, &thresholds), Decision::ReferForReview);
        assert_eq!(decide(40.0, &thresholds), Decision::Rejected);
    }
}
