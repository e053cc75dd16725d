use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Closed set of document categories accepted at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Identity,
    Payslip,
    BankStatement,
    PropertyAppraisal,
    CreditReport,
}

impl DocumentType {
    pub const fn ordered() -> [DocumentType; 5] {
        [
            DocumentType::Identity,
            DocumentType::Payslip,
            DocumentType::BankStatement,
            DocumentType::PropertyAppraisal,
            DocumentType::CreditReport,
        ]
    }

    pub const fn key(self) -> &'static str {
        match self {
            DocumentType::Identity => "identity",
            DocumentType::Payslip => "payslip",
            DocumentType::BankStatement => "bank_statement",
            DocumentType::PropertyAppraisal => "property_appraisal",
            DocumentType::CreditReport => "credit_report",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            DocumentType::Identity => "Identity document",
            DocumentType::Payslip => "Payslip",
            DocumentType::BankStatement => "Bank statement",
            DocumentType::PropertyAppraisal => "Property appraisal",
            DocumentType::CreditReport => "Credit report",
        }
    }

    /// Tie-break rank for conflicting values of equal confidence; lower wins.
    pub const fn priority_rank(self) -> u8 {
        match self {
            DocumentType::Identity => 0,
            DocumentType::BankStatement => 1,
            DocumentType::Payslip => 2,
            DocumentType::PropertyAppraisal => 3,
            DocumentType::CreditReport => 4,
        }
    }

    /// Parse the snake_case key used by upload forms and CSV manifests.
    pub fn from_key(raw: &str) -> Option<Self> {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .replace(|c: char| c == '-' || c == ' ', "_");
        Self::ordered()
            .into_iter()
            .find(|document_type| document_type.key() == normalized)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Canonical applicant field names shared by the extractor and the scoring rubric.
pub mod fields {
    pub const FULL_NAME: &str = "full_name";
    pub const DATE_OF_BIRTH: &str = "date_of_birth";
    pub const ADDRESS: &str = "address";
    pub const MONTHLY_INCOME: &str = "monthly_income";
    pub const EMPLOYMENT_YEARS: &str = "employment_years";
    pub const EMPLOYER_NAME: &str = "employer_name";
    pub const EXISTING_DEBT: &str = "existing_debt";
    pub const TOTAL_ASSETS: &str = "total_assets";
    pub const COLLATERAL_VALUE: &str = "collateral_value";
    pub const CREDIT_SCORE: &str = "credit_score";
}

/// How the raw service answer for a field should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Money,
    Years,
    Score,
    Date,
    Text,
}

pub fn field_kind(name: &str) -> FieldKind {
    match name {
        fields::MONTHLY_INCOME
        | fields::EXISTING_DEBT
        | fields::TOTAL_ASSETS
        | fields::COLLATERAL_VALUE => FieldKind::Money,
        fields::EMPLOYMENT_YEARS => FieldKind::Years,
        fields::CREDIT_SCORE => FieldKind::Score,
        fields::DATE_OF_BIRTH => FieldKind::Date,
        _ => FieldKind::Text,
    }
}

/// Typed value extracted for a canonical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Decimal(f64),
    Integer(i64),
    Date(NaiveDate),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Decimal(value) => Some(*value),
            FieldValue::Integer(value) => Some(*value as f64),
            FieldValue::Date(_) | FieldValue::Text(_) => None,
        }
    }

    /// Equality used for discrepancy detection; numbers compare with a relative tolerance and
    /// text ignores case and surrounding whitespace.
    pub fn agrees_with(&self, other: &FieldValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(left), Some(right)) => {
                let scale = left.abs().max(right.abs()).max(1.0);
                (left - right).abs() <= scale * 1e-9
            }
            _ => match (self, other) {
                (FieldValue::Text(left), FieldValue::Text(right)) => {
                    left.trim().eq_ignore_ascii_case(right.trim())
                }
                _ => self == other,
            },
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Decimal(value) => write!(f, "{value:.2}"),
            FieldValue::Integer(value) => write!(f, "{value}"),
            FieldValue::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            FieldValue::Text(value) => f.write_str(value),
        }
    }
}

/// Loan terms declared on the application form rather than read from documents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub loan_amount: f64,
}

/// The five underwriting dimensions, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditDimension {
    Character,
    Capacity,
    Capital,
    Collateral,
    Conditions,
}

impl CreditDimension {
    pub const fn ordered() -> [CreditDimension; 5] {
        [
            CreditDimension::Character,
            CreditDimension::Capacity,
            CreditDimension::Capital,
            CreditDimension::Collateral,
            CreditDimension::Conditions,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            CreditDimension::Character => "Character",
            CreditDimension::Capacity => "Capacity",
            CreditDimension::Capital => "Capital",
            CreditDimension::Collateral => "Collateral",
            CreditDimension::Conditions => "Conditions",
        }
    }

    /// Applicant record fields read by the scoring rule for this dimension.
    pub const fn input_fields(self) -> &'static [&'static str] {
        match self {
            CreditDimension::Character => &[fields::CREDIT_SCORE],
            CreditDimension::Capacity => &[fields::MONTHLY_INCOME, fields::EXISTING_DEBT],
            CreditDimension::Capital => &[fields::TOTAL_ASSETS],
            CreditDimension::Collateral => &[fields::COLLATERAL_VALUE],
            CreditDimension::Conditions => &[fields::EMPLOYMENT_YEARS],
        }
    }
}

impl fmt::Display for CreditDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifier wrapper for pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Furthest stage a run reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Intake,
    Validation,
    Extraction,
    Assessment,
    Completed,
}

impl PipelineStage {
    pub const fn label(self) -> &'static str {
        match self {
            PipelineStage::Intake => "intake",
            PipelineStage::Validation => "validation",
            PipelineStage::Extraction => "extraction",
            PipelineStage::Assessment => "assessment",
            PipelineStage::Completed => "completed",
        }
    }
}
