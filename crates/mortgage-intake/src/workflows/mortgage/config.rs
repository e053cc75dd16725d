use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::assessment::ScoringConfig;
use super::domain::{fields, DocumentType};
use super::extraction::RetryPolicy;

/// Required documents and the fields each must expose to count as complete.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequiredFieldSpec(BTreeMap<DocumentType, BTreeSet<String>>);

impl RequiredFieldSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity, payslip, bank statement, property appraisal, and credit report with the fields
    /// the Five C's rubric reads.
    pub fn standard() -> Self {
        Self::new()
            .require(
                DocumentType::Identity,
                [fields::FULL_NAME, fields::DATE_OF_BIRTH, fields::ADDRESS],
            )
            .require(
                DocumentType::Payslip,
                [fields::MONTHLY_INCOME, fields::EMPLOYMENT_YEARS],
            )
            .require(
                DocumentType::BankStatement,
                [fields::EXISTING_DEBT, fields::TOTAL_ASSETS],
            )
            .require(DocumentType::PropertyAppraisal, [fields::COLLATERAL_VALUE])
            .require(DocumentType::CreditReport, [fields::CREDIT_SCORE])
    }

    pub fn require<I, S>(mut self, document_type: DocumentType, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .entry(document_type)
            .or_default()
            .extend(required.into_iter().map(Into::into));
        self
    }

    pub fn document_types(&self) -> impl Iterator<Item = DocumentType> + '_ {
        self.0.keys().copied()
    }

    pub fn fields_for(&self, document_type: DocumentType) -> Option<&BTreeSet<String>> {
        self.0.get(&document_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocumentType, &BTreeSet<String>)> {
        self.0.iter().map(|(document_type, fields)| (*document_type, fields))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything the pipeline reads from the configuration boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub required_fields: RequiredFieldSpec,
    /// Fields the extractor queries per document type, in addition to the required ones.
    pub extractable_fields: BTreeMap<DocumentType, BTreeSet<String>>,
    pub scoring: ScoringConfig,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            required_fields: RequiredFieldSpec::standard(),
            extractable_fields: standard_extractable_fields(),
            scoring: ScoringConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

fn standard_extractable_fields() -> BTreeMap<DocumentType, BTreeSet<String>> {
    let catalog: [(DocumentType, &[&str]); 5] = [
        (
            DocumentType::Identity,
            &[fields::FULL_NAME, fields::DATE_OF_BIRTH, fields::ADDRESS],
        ),
        (
            DocumentType::Payslip,
            &[
                fields::FULL_NAME,
                fields::MONTHLY_INCOME,
                fields::EMPLOYMENT_YEARS,
                fields::EMPLOYER_NAME,
            ],
        ),
        (
            DocumentType::BankStatement,
            &[
                fields::FULL_NAME,
                fields::ADDRESS,
                fields::MONTHLY_INCOME,
                fields::EXISTING_DEBT,
                fields::TOTAL_ASSETS,
            ],
        ),
        (DocumentType::PropertyAppraisal, &[fields::COLLATERAL_VALUE]),
        (DocumentType::CreditReport, &[fields::CREDIT_SCORE]),
    ];

    catalog
        .into_iter()
        .map(|(document_type, names)| {
            let names = names.iter().map(|name| name.to_string()).collect();
            (document_type, names)
        })
        .collect()
}

impl PipelineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, PipelineConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(PipelineConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PipelineConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Fields to query for a document: the configured catalog plus anything required of it.
    pub fn fields_to_extract(&self, document_type: DocumentType) -> BTreeSet<String> {
        let mut names = self
            .extractable_fields
            .get(&document_type)
            .cloned()
            .unwrap_or_default();
        if let Some(required) = self.required_fields.fields_for(document_type) {
            names.extend(required.iter().cloned());
        }
        names
    }

    pub fn validate(&self) -> Result<(), PipelineConfigError> {
        let weights = &self.scoring.weights;
        let all_weights = [
            weights.character,
            weights.capacity,
            weights.capital,
            weights.collateral,
            weights.conditions,
        ];
        let sum = weights.sum();
        if all_weights.iter().any(|weight| !weight.is_finite() || *weight < 0.0)
            || (sum - 1.0).abs() > 1e-6
        {
            return Err(PipelineConfigError::InvalidWeights { sum });
        }

        let thresholds = &self.scoring.thresholds;
        if !(0.0..=100.0).contains(&thresholds.reject_threshold)
            || !(0.0..=100.0).contains(&thresholds.approve_threshold)
            || thresholds.reject_threshold >= thresholds.approve_threshold
        {
            return Err(PipelineConfigError::InvalidThresholds {
                approve: thresholds.approve_threshold,
                reject: thresholds.reject_threshold,
            });
        }

        let rubric = &self.scoring.rubric;
        let ordered_bounds = [
            ("credit score", rubric.credit_score_floor, rubric.credit_score_target),
            ("debt-to-income", rubric.ideal_dti, rubric.max_dti),
            ("loan-to-value", rubric.ideal_ltv, rubric.max_ltv),
            ("reserve ratio", 0.0, rubric.target_reserve_ratio),
            ("employment years", 0.0, rubric.stable_employment_years),
        ];
        for (name, low, high) in ordered_bounds {
            if !low.is_finite() || !high.is_finite() || low < 0.0 || low >= high {
                return Err(PipelineConfigError::InvalidRubric(format!(
                    "{name} bounds must be finite, non-negative, and increasing ({low} .. {high})"
                )));
            }
        }

        if self.retry.max_attempts == 0 || self.retry.timeout_ms == 0 {
            return Err(PipelineConfigError::InvalidRetry(
                "max_attempts and timeout_ms must be positive".to_string(),
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(PipelineConfigError::InvalidRetry(
                "backoff_multiplier must be at least 1.0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Errors raised while loading or swapping pipeline configuration.
#[derive(Debug, thiserror::Error)]
pub enum PipelineConfigError {
    #[error("unable to read pipeline config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid pipeline config JSON: {0}")]
    Parse(serde_json::Error),
    #[error("scoring weights must be non-negative and sum to 1.0 (found {sum:.4})")]
    InvalidWeights { sum: f64 },
    #[error("decision thresholds must satisfy 0 <= reject < approve <= 100 (approve {approve}, reject {reject})")]
    InvalidThresholds { approve: f64, reject: f64 },
    #[error("invalid rubric: {0}")]
    InvalidRubric(String),
    #[error("invalid retry policy: {0}")]
    InvalidRetry(String),
}

/// Shared, hot-swappable configuration. Each run takes a snapshot when it starts, so a swap
/// never changes the rules mid-run.
#[derive(Debug, Clone)]
pub struct PipelineConfigHandle {
    current: Arc<RwLock<Arc<PipelineConfig>>>,
}

impl PipelineConfigHandle {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    pub fn current(&self) -> Arc<PipelineConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, config: PipelineConfig) -> Result<Arc<PipelineConfig>, PipelineConfigError> {
        config.validate()?;
        let config = Arc::new(config);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = config.clone();
        info!(
            required_documents = config.required_fields.document_types().count(),
            approve_threshold = config.scoring.thresholds.approve_threshold,
            reject_threshold = config.scoring.thresholds.reject_threshold,
            "pipeline configuration replaced"
        );
        Ok(config)
    }

    pub fn reload_from_path(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Arc<PipelineConfig>, PipelineConfigError> {
        let config = PipelineConfig::from_path(path)?;
        self.replace(config)
    }
}

impl Default for PipelineConfigHandle {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
