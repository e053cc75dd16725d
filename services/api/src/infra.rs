use metrics_exporter_prometheus::PrometheusHandle;
use mortgage_intake::error::AppError;
use mortgage_intake::workflows::mortgage::{
    DocumentType, DocumentUpload, PipelineConfig, PipelineConfigHandle, PipelineRun,
    RepositoryError, RunId, RunRepository, Submission,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryRunRepository {
    runs: Arc<Mutex<HashMap<RunId, PipelineRun>>>,
}

impl RunRepository for InMemoryRunRepository {
    fn insert(&self, run: PipelineRun) -> Result<PipelineRun, RepositoryError> {
        let mut guard = self.runs.lock().expect("repository mutex poisoned");
        if guard.contains_key(&run.run_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(run.run_id.clone(), run.clone());
        Ok(run)
    }

    fn fetch(&self, id: &RunId) -> Result<Option<PipelineRun>, RepositoryError> {
        let guard = self.runs.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn recent(&self, limit: usize) -> Result<Vec<PipelineRun>, RepositoryError> {
        let guard = self.runs.lock().expect("repository mutex poisoned");
        let mut runs: Vec<_> = guard.values().cloned().collect();
        runs.sort_by(|left, right| {
            right
                .submitted_at
                .cmp(&left.submitted_at)
                .then_with(|| right.run_id.cmp(&left.run_id))
        });
        runs.truncate(limit);
        Ok(runs)
    }
}

/// Pipeline rules from `path` when given, built-in defaults otherwise. Both are validated.
pub(crate) fn load_pipeline_config(path: Option<&Path>) -> Result<PipelineConfigHandle, AppError> {
    let config = match path {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    };
    config.validate()?;
    Ok(PipelineConfigHandle::new(config))
}

pub(crate) fn parse_loan_amount(raw: &str) -> Result<f64, String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '_'))
        .collect();
    match cleaned.parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount > 0.0 => Ok(amount),
        Ok(_) => Err(format!("loan amount must be positive, got '{raw}'")),
        Err(err) => Err(format!("failed to parse '{raw}' as a loan amount ({err})")),
    }
}

#[derive(Debug, Deserialize)]
struct ManifestRow {
    document_type: String,
    path: PathBuf,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    mime_type: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}

/// Build a submission from a `document_type,path,mime_type` manifest.
///
/// Relative paths resolve against the manifest's directory; a blank MIME type is guessed from the
/// file extension.
pub(crate) fn load_manifest(manifest: &Path, loan_amount: f64) -> Result<Submission, AppError> {
    let base = manifest.parent().unwrap_or_else(|| Path::new("."));
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(manifest)
        .map_err(|err| AppError::Input(format!("{}: {err}", manifest.display())))?;

    let mut submission = Submission::new(loan_amount);
    for (index, row) in reader.deserialize::<ManifestRow>().enumerate() {
        let row = row.map_err(|err| AppError::Input(format!("{}: {err}", manifest.display())))?;
        let document_type = DocumentType::from_key(&row.document_type).ok_or_else(|| {
            AppError::Input(format!(
                "unknown document type '{}' on manifest row {}",
                row.document_type,
                index + 1
            ))
        })?;

        let path = if row.path.is_absolute() {
            row.path
        } else {
            base.join(row.path)
        };
        let mime_type = row.mime_type.unwrap_or_else(|| {
            mime_guess::from_path(&path)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| document_type.key().to_string());
        let bytes = fs::read(&path)?;

        submission =
            submission.with_upload(DocumentUpload::new(document_type, file_name, mime_type, bytes));
    }
    Ok(submission)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mortgage-intake-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("scratch dir");
        dir
    }

    #[test]
    fn loan_amounts_accept_currency_formatting() {
        assert_eq!(parse_loan_amount("$150,000"), Ok(150_000.0));
        assert!(parse_loan_amount("0").is_err());
        assert!(parse_loan_amount("lots").is_err());
    }

    #[test]
    fn manifest_guesses_missing_mime_types() {
        let dir = scratch_dir("manifest");
        fs::write(dir.join("id.png"), b"png").expect("write id");
        fs::write(dir.join("payslip.pdf"), b"%PDF").expect("write payslip");
        let manifest = dir.join("manifest.csv");
        fs::write(
            &manifest,
            "document_type,path,mime_type\nidentity,id.png,\npayslip,payslip.pdf,application/pdf\n",
        )
        .expect("write manifest");

        let submission = load_manifest(&manifest, 150_000.0).expect("manifest loads");
        fs::remove_dir_all(&dir).ok();

        assert_eq!(submission.loan.loan_amount, 150_000.0);
        assert_eq!(submission.uploads.len(), 2);
        assert_eq!(submission.uploads[0].document_type, DocumentType::Identity);
        assert_eq!(submission.uploads[0].mime_type, "image/png");
        assert_eq!(submission.uploads[1].file_name, "payslip.pdf");
    }

    #[test]
    fn manifest_rejects_unknown_document_types() {
        let dir = scratch_dir("manifest-unknown");
        let manifest = dir.join("manifest.csv");
        fs::write(&manifest, "document_type,path,mime_type\nutility_bill,bill.pdf,\n")
            .expect("write manifest");

        let result = load_manifest(&manifest, 150_000.0);
        fs::remove_dir_all(&dir).ok();

        match result {
            Err(AppError::Input(message)) => assert!(message.contains("utility_bill")),
            other => panic!("expected input error, got {:?}", other.map(|s| s.uploads.len())),
        }
    }

    #[test]
    fn default_pipeline_config_is_valid() {
        let handle = load_pipeline_config(None).expect("defaults validate");
        assert!(!handle.current().required_fields.is_empty());
    }
}
