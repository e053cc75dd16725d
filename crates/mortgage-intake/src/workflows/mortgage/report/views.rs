use chrono::{DateTime, Utc};
use serde::Serialize;

use super::super::assessment::Decision;
use super::super::domain::{CreditDimension, DocumentType, RunId};
use super::super::pipeline::PipelineRun;
use super::ReportError;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentCheckEntry {
    pub document_type: DocumentType,
    pub document_label: &'static str,
    pub present: bool,
    pub missing_fields: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicantFieldEntry {
    pub field: String,
    pub value: String,
    pub confidence: f32,
    pub source: DocumentType,
    pub source_label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnresolvedFieldEntry {
    pub field: String,
    pub source_label: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FactorEntry {
    pub dimension: CreditDimension,
    pub dimension_label: &'static str,
    pub score: f64,
    pub rationale: String,
}

/// Flattened, presentation-ready projection of a decided run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    pub run_id: RunId,
    pub submitted_at: DateTime<Utc>,
    pub loan_amount: f64,
    pub decision: Decision,
    pub decision_label: &'static str,
    pub overall_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dti_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ltv_ratio: Option<f64>,
    pub justification: String,
    pub documents: Vec<DocumentCheckEntry>,
    pub applicant: Vec<ApplicantFieldEntry>,
    pub factors: Vec<FactorEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discrepancies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<UnresolvedFieldEntry>,
}

impl ReportView {
    /// Project a run; only runs that reached a decision can be reported on.
    pub fn from_run(run: &PipelineRun) -> Result<Self, ReportError> {
        let (Some(decision), Some(record)) = (&run.decision, &run.applicant) else {
            return Err(ReportError::Incomplete(run.run_id.clone()));
        };

        let documents = run
            .validation
            .as_ref()
            .map(|validation| {
                validation
                    .checks
                    .values()
                    .map(|check| DocumentCheckEntry {
                        document_type: check.document_type,
                        document_label: check.document_type.label(),
                        present: check.present,
                        missing_fields: check.missing_fields.iter().cloned().collect(),
                        notes: check.notes.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let applicant = record
            .fields()
            .iter()
            .map(|(field, extracted)| ApplicantFieldEntry {
                field: field.clone(),
                value: extracted.value.to_string(),
                confidence: extracted.confidence,
                source: extracted.source,
                source_label: extracted.source.label(),
            })
            .collect();

        let unresolved = record
            .unresolved()
            .iter()
            .map(|(field, unresolved)| UnresolvedFieldEntry {
                field: field.clone(),
                source_label: unresolved.source.label(),
                reason: unresolved.reason.clone(),
            })
            .collect();

        let factors = decision
            .factor_scores
            .iter()
            .map(|factor| FactorEntry {
                dimension: factor.dimension,
                dimension_label: factor.dimension.label(),
                score: factor.score,
                rationale: factor.rationale.clone(),
            })
            .collect();

        Ok(Self {
            run_id: run.run_id.clone(),
            submitted_at: run.submitted_at,
            loan_amount: run.loan.loan_amount,
            decision: decision.decision,
            decision_label: decision.decision.label(),
            overall_score: decision.overall_score,
            dti_ratio: decision.dti_ratio,
            ltv_ratio: decision.ltv_ratio,
            justification: decision.justification.clone(),
            documents,
            applicant,
            factors,
            discrepancies: record.notes().to_vec(),
            unresolved,
        })
    }
}
