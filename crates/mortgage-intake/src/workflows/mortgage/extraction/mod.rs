mod canned;
mod http;
mod parse;
mod retry;
mod service;

pub use canned::{CannedDocumentService, CannedServiceError};
pub use http::HttpDocumentService;
pub use retry::RetryPolicy;
pub use service::{DocumentUnderstanding, FieldAnswer, ServiceError};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::PipelineConfig;
use super::documents::DocumentStore;
use super::domain::{CreditDimension, DocumentType, FieldValue, PipelineStage};
use super::errors::{PipelineError, RunFailure};
use super::validation::{DetectionReport, ValidatedDocuments};
use parse::parse_answer;
use retry::call_with_retry;

/// A resolved field with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub value: FieldValue,
    pub confidence: f32,
    pub source: DocumentType,
}

impl ExtractedField {
    pub fn new(value: FieldValue, confidence: f32, source: DocumentType) -> Self {
        Self {
            value,
            confidence,
            source,
        }
    }

    /// Whether this candidate should replace `other` under the conflict policy.
    fn outranks(&self, other: &ExtractedField) -> bool {
        if self.confidence != other.confidence {
            return self.confidence > other.confidence;
        }
        self.source.priority_rank() < other.source.priority_rank()
    }
}

/// A field the service could not answer; never defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedField {
    pub source: DocumentType,
    pub reason: String,
}

/// Canonical applicant data reconciled across every uploaded document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApplicantRecord {
    fields: BTreeMap<String, ExtractedField>,
    notes: Vec<String>,
    unresolved: BTreeMap<String, UnresolvedField>,
}

impl ApplicantRecord {
    pub fn builder() -> ApplicantRecordBuilder {
        ApplicantRecordBuilder::default()
    }

    pub fn fields(&self) -> &BTreeMap<String, ExtractedField> {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&ExtractedField> {
        self.fields.get(name)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(|field| field.value.as_f64())
    }

    /// Discrepancies observed while reconciling sources.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn unresolved(&self) -> &BTreeMap<String, UnresolvedField> {
        &self.unresolved
    }

    /// Dimensions whose every input field is unresolved.
    pub fn missing_dimensions(&self) -> Vec<CreditDimension> {
        CreditDimension::ordered()
            .into_iter()
            .filter(|dimension| {
                dimension
                    .input_fields()
                    .iter()
                    .all(|field| self.number(field).is_none())
            })
            .collect()
    }
}

/// Accumulates candidate values and applies the conflict policy.
#[derive(Debug, Default)]
pub struct ApplicantRecordBuilder {
    fields: BTreeMap<String, ExtractedField>,
    notes: Vec<String>,
    unresolved: BTreeMap<String, UnresolvedField>,
}

impl ApplicantRecordBuilder {
    /// Offer a candidate. Higher confidence wins, ties go to the higher-priority document, and
    /// disagreeing values leave a note either way.
    pub fn offer(&mut self, name: impl Into<String>, candidate: ExtractedField) -> &mut Self {
        let name = name.into();
        let Some(existing) = self.fields.get(&name) else {
            self.fields.insert(name, candidate);
            return self;
        };

        let replace = candidate.outranks(existing);
        let (kept, dropped) = if replace {
            (&candidate, existing)
        } else {
            (existing, &candidate)
        };

        if !kept.value.agrees_with(&dropped.value) {
            let note = format!(
                "{name}: {} reported {} (confidence {:.2}) but {} reported {} (confidence {:.2}); kept the {} value",
                kept.source.label(),
                kept.value,
                kept.confidence,
                dropped.source.label().to_lowercase(),
                dropped.value,
                dropped.confidence,
                kept.source.label().to_lowercase(),
            );
            self.notes.push(note);
        }

        if replace {
            self.fields.insert(name, candidate);
        }
        self
    }

    pub fn with(mut self, name: impl Into<String>, candidate: ExtractedField) -> Self {
        self.offer(name, candidate);
        self
    }

    /// Record a failed lookup. The first failure per field is kept.
    pub fn unresolved(&mut self, name: impl Into<String>, field: UnresolvedField) -> &mut Self {
        self.unresolved.entry(name.into()).or_insert(field);
        self
    }

    pub fn note(&mut self, note: impl Into<String>) -> &mut Self {
        self.notes.push(note.into());
        self
    }

    pub fn build(self) -> ApplicantRecord {
        let Self {
            fields,
            notes,
            mut unresolved,
        } = self;
        unresolved.retain(|name, _| !fields.contains_key(name));
        ApplicantRecord {
            fields,
            notes,
            unresolved,
        }
    }
}

/// Drives the document-understanding service for detection and extraction.
pub struct Extractor<'a, S> {
    service: &'a S,
    config: &'a PipelineConfig,
}

impl<'a, S> Extractor<'a, S>
where
    S: DocumentUnderstanding,
{
    pub fn new(service: &'a S, config: &'a PipelineConfig) -> Self {
        Self { service, config }
    }

    /// Ask the service which configured fields each document exposes. A supplementary document
    /// the service cannot read is left out of the report rather than failing the run.
    pub async fn detect(&self, store: &DocumentStore) -> Result<DetectionReport, RunFailure> {
        let mut report = DetectionReport::new();

        for document in store.iter() {
            let document_type = document.document_type();
            let wanted: Vec<String> = self
                .config
                .fields_to_extract(document_type)
                .into_iter()
                .collect();
            if wanted.is_empty() {
                continue;
            }

            let outcome = call_with_retry(&self.config.retry, document_type, None, || {
                self.service.locate_fields(document, &wanted)
            })
            .await;
            let located = match outcome {
                Ok(located) => located,
                Err(error) if self.config.required_fields.fields_for(document_type).is_none() => {
                    warn!(
                        document_type = document_type.key(),
                        error = %error,
                        "skipping supplementary document"
                    );
                    continue;
                }
                Err(error) => return Err(RunFailure::new(PipelineStage::Validation, vec![error])),
            };

            debug!(
                document_type = document_type.key(),
                located = located.len(),
                requested = wanted.len(),
                "fields located"
            );
            report.record(
                document_type,
                located.into_iter().filter(|field| wanted.contains(field)),
            );
        }

        Ok(report)
    }

    /// Query every located field and reconcile the answers into one record.
    pub async fn extract(
        &self,
        documents: ValidatedDocuments<'_>,
    ) -> Result<ApplicantRecord, RunFailure> {
        let mut builder = ApplicantRecord::builder();
        let mut failures: BTreeMap<(DocumentType, String), PipelineError> = BTreeMap::new();

        for document in documents.iter() {
            let document_type = document.document_type();
            let Some(located) = documents.detections().located(document_type) else {
                continue;
            };

            for field in located {
                let name = field.as_str();
                let outcome = call_with_retry(&self.config.retry, document_type, Some(name), || async move {
                    let answer = self.service.query_field(document, name).await?;
                    parse_answer(name, &answer)
                })
                .await;

                match outcome {
                    Ok((value, confidence)) => {
                        builder.offer(name, ExtractedField::new(value, confidence, document_type));
                    }
                    Err(error) => {
                        builder.unresolved(
                            name,
                            UnresolvedField {
                                source: document_type,
                                reason: error.to_string(),
                            },
                        );
                        failures.insert((document_type, name.to_string()), error);
                    }
                }
            }
        }

        let record = builder.build();
        let mut errors = Vec::new();

        for (document_type, required) in self.config.required_fields.iter() {
            for field in required {
                if record.get(field).is_some() {
                    continue;
                }
                let error = failures
                    .remove(&(document_type, field.clone()))
                    .unwrap_or_else(|| PipelineError::IncompleteDocument {
                        document_type,
                        missing_fields: vec![field.clone()],
                    });
                if !errors.contains(&error) {
                    errors.push(error);
                }
            }
        }

        let missing_dimensions = record.missing_dimensions();
        if !missing_dimensions.is_empty() {
            errors.push(PipelineError::IncompleteRecord {
                dimensions: missing_dimensions,
            });
        }

        if !errors.is_empty() {
            return Err(RunFailure::new(PipelineStage::Extraction, errors));
        }

        info!(
            resolved = record.fields().len(),
            unresolved = record.unresolved().len(),
            discrepancies = record.notes().len(),
            "applicant record assembled"
        );
        Ok(record)
    }
}
