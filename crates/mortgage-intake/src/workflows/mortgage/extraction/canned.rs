use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use super::super::documents::UploadedDocument;
use super::super::domain::DocumentType;
use super::service::{DocumentUnderstanding, FieldAnswer, ServiceError};

/// Scripted document service backed by a table of answers.
///
/// Used for offline assessments from CSV and as the test double for the pipeline. A field is
/// "located" on a document exactly when an answer exists for it.
#[derive(Debug, Default)]
pub struct CannedDocumentService {
    answers: BTreeMap<(DocumentType, String), FieldAnswer>,
    failing_queries: BTreeMap<DocumentType, ServiceError>,
    failing_detection: BTreeMap<DocumentType, ServiceError>,
    latency: Option<Duration>,
    query_attempts: Mutex<BTreeMap<DocumentType, u32>>,
}

#[derive(Debug, thiserror::Error)]
pub enum CannedServiceError {
    #[error("unable to read canned answers: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid canned answers CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("unknown document type '{value}' on row {row}")]
    UnknownDocumentType { row: usize, value: String },
}

#[derive(Debug, Deserialize)]
struct AnswerRow {
    document_type: String,
    field: String,
    value: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    confidence: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|raw| !raw.trim().is_empty()))
}

impl CannedDocumentService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CannedServiceError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Load `document_type,field,value,confidence` rows. A blank confidence means 1.0; a
    /// confidence that is not a number is kept as NaN so the extractor reports it as malformed.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CannedServiceError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut service = Self::new();

        for (index, row) in csv_reader.deserialize::<AnswerRow>().enumerate() {
            let row = row?;
            let document_type = DocumentType::from_key(&row.document_type).ok_or_else(|| {
                CannedServiceError::UnknownDocumentType {
                    row: index + 1,
                    value: row.document_type.clone(),
                }
            })?;
            let confidence = row
                .confidence
                .as_deref()
                .map(|raw| raw.parse::<f32>().unwrap_or(f32::NAN))
                .unwrap_or(1.0);
            service.insert_answer(document_type, row.field, FieldAnswer::new(row.value, confidence));
        }

        Ok(service)
    }

    pub fn with_answer(
        mut self,
        document_type: DocumentType,
        field: impl Into<String>,
        value: impl Into<String>,
        confidence: f32,
    ) -> Self {
        self.insert_answer(document_type, field.into(), FieldAnswer::new(value, confidence));
        self
    }

    /// Every field query against `document_type` fails with `error`.
    pub fn failing_queries(mut self, document_type: DocumentType, error: ServiceError) -> Self {
        self.failing_queries.insert(document_type, error);
        self
    }

    /// Field location on `document_type` fails with `error`.
    pub fn failing_detection(mut self, document_type: DocumentType, error: ServiceError) -> Self {
        self.failing_detection.insert(document_type, error);
        self
    }

    /// Delay every field query by `latency`. Field location stays immediate.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of field queries issued against `document_type`, including failed ones.
    pub fn query_attempts(&self, document_type: DocumentType) -> u32 {
        self.query_attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&document_type)
            .copied()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    fn insert_answer(&mut self, document_type: DocumentType, field: String, answer: FieldAnswer) {
        self.answers.insert((document_type, field), answer);
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl DocumentUnderstanding for CannedDocumentService {
    async fn locate_fields(
        &self,
        document: &UploadedDocument,
        fields: &[String],
    ) -> Result<Vec<String>, ServiceError> {
        let document_type = document.document_type();
        if let Some(error) = self.failing_detection.get(&document_type) {
            return Err(error.clone());
        }

        Ok(fields
            .iter()
            .filter(|field| self.answers.contains_key(&(document_type, field.to_string())))
            .cloned()
            .collect())
    }

    async fn query_field(
        &self,
        document: &UploadedDocument,
        field: &str,
    ) -> Result<FieldAnswer, ServiceError> {
        let document_type = document.document_type();
        *self
            .query_attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(document_type)
            .or_insert(0) += 1;

        self.pause().await;
        if let Some(error) = self.failing_queries.get(&document_type) {
            return Err(error.clone());
        }

        self.answers
            .get(&(document_type, field.to_string()))
            .cloned()
            .ok_or_else(|| {
                ServiceError::Rejected(format!("no answer for {field} on {}", document_type.key()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn loads_answers_from_csv() {
        let csv = "document_type,field,value,confidence\n\
                   payslip,monthly_income,\"$4,800\",0.6\n\
                   bank-statement,monthly_income,5000,\n";

        let service = CannedDocumentService::from_reader(Cursor::new(csv)).expect("csv parses");
        assert_eq!(service.len(), 2);
        assert_eq!(
            service
                .answers
                .get(&(DocumentType::BankStatement, "monthly_income".to_string()))
                .map(|answer| answer.confidence),
            Some(1.0)
        );
    }

    #[test]
    fn unknown_document_types_are_rejected() {
        let csv = "document_type,field,value,confidence\nutility_bill,address,1 Main St,0.9\n";
        match CannedDocumentService::from_reader(Cursor::new(csv)) {
            Err(CannedServiceError::UnknownDocumentType { row, value }) => {
                assert_eq!(row, 1);
                assert_eq!(value, "utility_bill");
            }
            other => panic!("expected unknown document type, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            CannedDocumentService::from_path("./does-not-exist.csv"),
            Err(CannedServiceError::Io(_))
        ));
    }
}
