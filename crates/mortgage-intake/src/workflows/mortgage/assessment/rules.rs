use std::collections::BTreeSet;

use super::super::domain::{fields, CreditDimension, LoanRequest};
use super::super::extraction::ApplicantRecord;
use super::config::RubricThresholds;
use super::CreditFactorScore;

/// Ratios surfaced on the decision alongside the factor scores.
pub(crate) struct KeyRatios {
    pub dti: Option<f64>,
    pub ltv: Option<f64>,
}

/// 0 at or below `floor`, 100 at or above `target`, linear between.
pub(crate) fn ascending(value: f64, floor: f64, target: f64) -> f64 {
    if value <= floor {
        0.0
    } else if value >= target {
        100.0
    } else {
        100.0 * (value - floor) / (target - floor)
    }
}

/// 100 at or below `ideal`, 0 at or above `max`, linear between.
pub(crate) fn descending(value: f64, ideal: f64, max: f64) -> f64 {
    if value <= ideal {
        100.0
    } else if value >= max {
        0.0
    } else {
        100.0 * (max - value) / (max - ideal)
    }
}

pub(crate) fn score_factors(
    record: &ApplicantRecord,
    loan: &LoanRequest,
    rubric: &RubricThresholds,
) -> (Vec<CreditFactorScore>, KeyRatios) {
    let (capacity, dti) = capacity(record, rubric);
    let (collateral, ltv) = collateral(record, loan, rubric);

    let factors = vec![
        character(record, rubric),
        capacity,
        capital(record, loan, rubric),
        collateral,
        conditions(record, rubric),
    ];

    (factors, KeyRatios { dti, ltv })
}

fn factor(
    dimension: CreditDimension,
    score: f64,
    rationale: String,
    contributing: &[&str],
) -> CreditFactorScore {
    CreditFactorScore {
        dimension,
        score: score.clamp(0.0, 100.0),
        rationale,
        contributing_fields: contributing.iter().map(|name| name.to_string()).collect::<BTreeSet<_>>(),
    }
}

fn character(record: &ApplicantRecord, rubric: &RubricThresholds) -> CreditFactorScore {
    match record.number(fields::CREDIT_SCORE) {
        Some(credit_score) => factor(
            CreditDimension::Character,
            ascending(credit_score, rubric.credit_score_floor, rubric.credit_score_target),
            format!(
                "credit score {credit_score:.0} against floor {:.0} and target {:.0}",
                rubric.credit_score_floor, rubric.credit_score_target
            ),
            &[fields::CREDIT_SCORE],
        ),
        None => factor(
            CreditDimension::Character,
            0.0,
            "credit score unavailable".to_string(),
            &[],
        ),
    }
}

fn capacity(record: &ApplicantRecord, rubric: &RubricThresholds) -> (CreditFactorScore, Option<f64>) {
    let income = record.number(fields::MONTHLY_INCOME);
    let debt = record.number(fields::EXISTING_DEBT);

    match (income, debt) {
        (Some(_), Some(debt)) if debt < 0.0 => (
            factor(
                CreditDimension::Capacity,
                0.0,
                format!("monthly debt {debt:.2} is negative; debt-to-income cannot be computed"),
                &[fields::EXISTING_DEBT],
            ),
            None,
        ),
        (Some(income), Some(debt)) if income > 0.0 => {
            let dti = debt / income;
            let score = factor(
                CreditDimension::Capacity,
                descending(dti, rubric.ideal_dti, rubric.max_dti),
                format!(
                    "debt-to-income {:.1}% (monthly debt {debt:.2} on income {income:.2}; ideal {:.0}%, limit {:.0}%)",
                    dti * 100.0,
                    rubric.ideal_dti * 100.0,
                    rubric.max_dti * 100.0
                ),
                &[fields::MONTHLY_INCOME, fields::EXISTING_DEBT],
            );
            (score, Some(dti))
        }
        (Some(income), Some(_)) => (
            factor(
                CreditDimension::Capacity,
                0.0,
                format!("monthly income {income:.2} is not positive; debt-to-income cannot be computed"),
                &[fields::MONTHLY_INCOME],
            ),
            None,
        ),
        (Some(_), None) => (
            factor(
                CreditDimension::Capacity,
                0.0,
                "existing debt unavailable; debt-to-income cannot be computed".to_string(),
                &[fields::MONTHLY_INCOME],
            ),
            None,
        ),
        (None, Some(_)) => (
            factor(
                CreditDimension::Capacity,
                0.0,
                "monthly income unavailable; debt-to-income cannot be computed".to_string(),
                &[fields::EXISTING_DEBT],
            ),
            None,
        ),
        (None, None) => (
            factor(
                CreditDimension::Capacity,
                0.0,
                "income and debt unavailable".to_string(),
                &[],
            ),
            None,
        ),
    }
}

fn capital(record: &ApplicantRecord, loan: &LoanRequest, rubric: &RubricThresholds) -> CreditFactorScore {
    match record.number(fields::TOTAL_ASSETS) {
        Some(assets) if loan.loan_amount > 0.0 => {
            let reserves = assets / loan.loan_amount;
            factor(
                CreditDimension::Capital,
                ascending(reserves, 0.0, rubric.target_reserve_ratio),
                format!(
                    "assets {assets:.2} cover {:.1}% of the loan (target {:.0}%)",
                    reserves * 100.0,
                    rubric.target_reserve_ratio * 100.0
                ),
                &[fields::TOTAL_ASSETS],
            )
        }
        Some(_) => factor(
            CreditDimension::Capital,
            0.0,
            "loan amount is not positive; reserves cannot be computed".to_string(),
            &[fields::TOTAL_ASSETS],
        ),
        None => factor(
            CreditDimension::Capital,
            0.0,
            "total assets unavailable".to_string(),
            &[],
        ),
    }
}

fn collateral(
    record: &ApplicantRecord,
    loan: &LoanRequest,
    rubric: &RubricThresholds,
) -> (CreditFactorScore, Option<f64>) {
    match record.number(fields::COLLATERAL_VALUE) {
        Some(value) if value > 0.0 && loan.loan_amount > 0.0 => {
            let ltv = loan.loan_amount / value;
            let score = factor(
                CreditDimension::Collateral,
                descending(ltv, rubric.ideal_ltv, rubric.max_ltv),
                format!(
                    "loan-to-value {:.1}% on appraised value {value:.2} (ideal {:.0}%, limit {:.0}%)",
                    ltv * 100.0,
                    rubric.ideal_ltv * 100.0,
                    rubric.max_ltv * 100.0
                ),
                &[fields::COLLATERAL_VALUE],
            );
            (score, Some(ltv))
        }
        Some(_) => (
            factor(
                CreditDimension::Collateral,
                0.0,
                "collateral value or loan amount is not positive; loan-to-value cannot be computed"
                    .to_string(),
                &[fields::COLLATERAL_VALUE],
            ),
            None,
        ),
        None => (
            factor(
                CreditDimension::Collateral,
                0.0,
                "collateral value unavailable".to_string(),
                &[],
            ),
            None,
        ),
    }
}

fn conditions(record: &ApplicantRecord, rubric: &RubricThresholds) -> CreditFactorScore {
    match record.number(fields::EMPLOYMENT_YEARS) {
        Some(years) => factor(
            CreditDimension::Conditions,
            ascending(years, 0.0, rubric.stable_employment_years),
            format!(
                "{years:.1} year(s) with current employer (stable at {:.1})",
                rubric.stable_employment_years
            ),
            &[fields::EMPLOYMENT_YEARS],
        ),
        None => factor(
            CreditDimension::Conditions,
            0.0,
            "employment tenure unavailable".to_string(),
            &[],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascending_is_clamped_and_linear() {
        assert_eq!(ascending(500.0, 580.0, 740.0), 0.0);
        assert_eq!(ascending(580.0, 580.0, 740.0), 0.0);
        assert_eq!(ascending(660.0, 580.0, 740.0), 50.0);
        assert_eq!(ascending(800.0, 580.0, 740.0), 100.0);
    }

    #[test]
    fn descending_is_clamped_and_linear() {
        assert_eq!(descending(0.20, 0.28, 0.50), 100.0);
        assert_eq!(descending(0.50, 0.28, 0.50), 0.0);
        assert!((descending(0.39, 0.28, 0.50) - 50.0).abs() < 1e-9);
        assert_eq!(descending(1.2, 0.28, 0.50), 0.0);
    }
}
