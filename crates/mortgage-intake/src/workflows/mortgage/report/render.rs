use std::fmt::Write as _;

use super::super::domain::RunId;
use super::super::pipeline::PipelineRun;
use super::views::ReportView;

/// Rendered report ready to hand to a download endpoint or write to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("run {0} has no decision to report on")]
    Incomplete(RunId),
    #[error("failed to format report: {0}")]
    Format(#[from] std::fmt::Error),
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Turns a decided run into a document. PDF or templated renderers live outside this crate.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, run: &PipelineRun) -> Result<ReportArtifact, ReportError>;
}

/// Plain-text underwriting summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextReportRenderer;

impl ReportRenderer for TextReportRenderer {
    fn render(&self, run: &PipelineRun) -> Result<ReportArtifact, ReportError> {
        let view = ReportView::from_run(run)?;
        let mut out = String::new();

        writeln!(out, "MORTGAGE APPLICATION ASSESSMENT")?;
        writeln!(out, "Run: {}", view.run_id)?;
        writeln!(out, "Submitted: {}", view.submitted_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(out, "Requested loan: {:.2}", view.loan_amount)?;
        writeln!(out)?;

        writeln!(out, "DECISION: {}", view.decision_label.to_uppercase())?;
        writeln!(out, "Overall score: {:.1} / 100", view.overall_score)?;
        if let Some(dti) = view.dti_ratio {
            writeln!(out, "Debt-to-income: {:.1}%", dti * 100.0)?;
        }
        if let Some(ltv) = view.ltv_ratio {
            writeln!(out, "Loan-to-value: {:.1}%", ltv * 100.0)?;
        }
        writeln!(out)?;

        writeln!(out, "Five C's")?;
        for factor in &view.factors {
            writeln!(
                out,
                "  {:<11} {:>5.1}  {}",
                factor.dimension_label, factor.score, factor.rationale
            )?;
        }
        writeln!(out)?;

        writeln!(out, "Documents")?;
        for document in &view.documents {
            let status = if !document.present {
                "missing"
            } else if document.missing_fields.is_empty() {
                "complete"
            } else {
                "incomplete"
            };
            writeln!(out, "  {:<20} {status}", document.document_label)?;
        }
        writeln!(out)?;

        writeln!(out, "Applicant data")?;
        for field in &view.applicant {
            writeln!(
                out,
                "  {:<18} {:<28} {} ({:.2})",
                field.field, field.value, field.source_label, field.confidence
            )?;
        }

        if !view.discrepancies.is_empty() {
            writeln!(out)?;
            writeln!(out, "Discrepancies")?;
            for note in &view.discrepancies {
                writeln!(out, "  - {note}")?;
            }
        }

        if !view.unresolved.is_empty() {
            writeln!(out)?;
            writeln!(out, "Unresolved fields")?;
            for entry in &view.unresolved {
                writeln!(out, "  - {} ({}): {}", entry.field, entry.source_label, entry.reason)?;
            }
        }

        writeln!(out)?;
        writeln!(out, "Justification")?;
        writeln!(out, "{}", view.justification)?;

        Ok(ReportArtifact {
            file_name: format!("{}-assessment.txt", view.run_id),
            content_type: mime::TEXT_PLAIN_UTF_8.to_string(),
            bytes: out.into_bytes(),
        })
    }
}

/// Machine-readable report carrying the same view as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportRenderer;

impl ReportRenderer for JsonReportRenderer {
    fn render(&self, run: &PipelineRun) -> Result<ReportArtifact, ReportError> {
        let view = ReportView::from_run(run)?;
        Ok(ReportArtifact {
            file_name: format!("{}-assessment.json", view.run_id),
            content_type: mime::APPLICATION_JSON.to_string(),
            bytes: serde_json::to_vec_pretty(&view)?,
        })
    }
}
