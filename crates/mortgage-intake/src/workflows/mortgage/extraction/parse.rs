use chrono::NaiveDate;

use super::super::domain::{field_kind, FieldKind, FieldValue};
use super::service::{FieldAnswer, ServiceError};

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d %B %Y", "%B %d, %Y"];

/// Interpret a raw answer according to the field's kind.
///
/// Anything the service returns that cannot be read as the expected kind is treated as malformed
/// service output, which the retry loop is allowed to try again.
pub(crate) fn parse_answer(field: &str, answer: &FieldAnswer) -> Result<(FieldValue, f32), ServiceError> {
    if !answer.confidence.is_finite() || !(0.0..=1.0).contains(&answer.confidence) {
        return Err(ServiceError::Malformed(format!(
            "confidence {} for {field} is outside 0.0..=1.0",
            answer.confidence
        )));
    }

    let raw = answer.value.trim();
    if raw.is_empty() {
        return Err(ServiceError::Malformed(format!("empty answer for {field}")));
    }

    let value = match field_kind(field) {
        FieldKind::Money => {
            let amount = parse_amount(field, raw)?;
            if amount < 0.0 {
                return Err(ServiceError::Malformed(format!("negative amount for {field}: {raw}")));
            }
            FieldValue::Decimal(amount)
        }
        FieldKind::Years => {
            let years = parse_amount(field, raw)?;
            if years < 0.0 {
                return Err(ServiceError::Malformed(format!("negative tenure for {field}: {raw}")));
            }
            FieldValue::Decimal(years)
        }
        FieldKind::Score => {
            let score = parse_amount(field, raw)?;
            if score.fract() != 0.0 || !(300.0..=900.0).contains(&score) {
                return Err(ServiceError::Malformed(format!("implausible score for {field}: {raw}")));
            }
            FieldValue::Integer(score as i64)
        }
        FieldKind::Date => FieldValue::Date(parse_date(field, raw)?),
        FieldKind::Text => FieldValue::Text(raw.to_string()),
    };

    Ok((value, answer.confidence))
}

/// Pull the first number out of strings like `"$5,000.00 per month"` or `"4 years"`.
fn parse_amount(field: &str, raw: &str) -> Result<f64, ServiceError> {
    let start = raw
        .find(|c: char| c.is_ascii_digit() || c == '-')
        .ok_or_else(|| ServiceError::Malformed(format!("no number in answer for {field}: {raw}")))?;

    let numeric: String = raw[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .filter(|c| *c != ',')
        .collect();

    numeric
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ServiceError::Malformed(format!("unreadable number for {field}: {raw}")))
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, ServiceError> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .ok_or_else(|| ServiceError::Malformed(format!("unreadable date for {field}: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(field: &str, value: &str) -> Result<FieldValue, ServiceError> {
        parse_answer(field, &FieldAnswer::new(value, 0.8)).map(|(value, _)| value)
    }

    #[test]
    fn money_strips_currency_and_separators() {
        assert_eq!(parse("monthly_income", "$5,000.50 per month"), Ok(FieldValue::Decimal(5000.5)));
        assert_eq!(parse("collateral_value", "300000"), Ok(FieldValue::Decimal(300000.0)));
    }

    #[test]
    fn negative_amounts_are_malformed() {
        assert!(matches!(parse("existing_debt", "-4000"), Err(ServiceError::Malformed(_))));
        assert!(matches!(parse("monthly_income", "-5,000.00"), Err(ServiceError::Malformed(_))));
        assert!(matches!(parse("employment_years", "-2 years"), Err(ServiceError::Malformed(_))));
        assert_eq!(parse("existing_debt", "0"), Ok(FieldValue::Decimal(0.0)));
    }

    #[test]
    fn credit_scores_are_integers_in_range() {
        assert_eq!(parse("credit_score", "720"), Ok(FieldValue::Integer(720)));
        assert!(matches!(parse("credit_score", "7200"), Err(ServiceError::Malformed(_))));
        assert!(matches!(parse("credit_score", "701.5"), Err(ServiceError::Malformed(_))));
    }

    #[test]
    fn dates_accept_common_layouts() {
        let expected = NaiveDate::from_ymd_opt(1988, 3, 14).expect("valid date");
        assert_eq!(parse("date_of_birth", "1988-03-14"), Ok(FieldValue::Date(expected)));
        assert_eq!(parse("date_of_birth", "14/03/1988"), Ok(FieldValue::Date(expected)));
        assert_eq!(parse("date_of_birth", "14 March 1988"), Ok(FieldValue::Date(expected)));
        assert!(parse("date_of_birth", "sometime in spring").is_err());
    }

    #[test]
    fn text_is_trimmed() {
        assert_eq!(parse("full_name", "  Dana Reyes "), Ok(FieldValue::Text("Dana Reyes".to_string())));
    }

    #[test]
    fn bad_confidence_and_empty_values_are_malformed() {
        assert!(parse_answer("full_name", &FieldAnswer::new("Dana", 1.5)).is_err());
        assert!(parse_answer("full_name", &FieldAnswer::new("Dana", f32::NAN)).is_err());
        assert!(matches!(parse("monthly_income", "   "), Err(ServiceError::Malformed(_))));
        assert!(matches!(parse("monthly_income", "unknown"), Err(ServiceError::Malformed(_))));
    }
}
