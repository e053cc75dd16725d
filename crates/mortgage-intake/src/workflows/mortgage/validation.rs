use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::config::RequiredFieldSpec;
use super::documents::{DocumentStore, UploadedDocument};
use super::domain::DocumentType;
use super::errors::PipelineError;

/// Fields the document service could locate, per uploaded document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionReport {
    located: BTreeMap<DocumentType, BTreeSet<String>>,
}

impl DetectionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<I, S>(&mut self, document_type: DocumentType, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.located
            .entry(document_type)
            .or_default()
            .extend(fields.into_iter().map(Into::into));
    }

    pub fn with<I, S>(mut self, document_type: DocumentType, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record(document_type, fields);
        self
    }

    pub fn located(&self, document_type: DocumentType) -> Option<&BTreeSet<String>> {
        self.located.get(&document_type)
    }

    pub fn is_located(&self, document_type: DocumentType, field: &str) -> bool {
        self.located
            .get(&document_type)
            .map(|fields| fields.contains(field))
            .unwrap_or(false)
    }
}

/// Per-document outcome of the completeness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCheck {
    pub document_type: DocumentType,
    pub required: bool,
    pub present: bool,
    pub missing_fields: BTreeSet<String>,
    pub notes: Vec<String>,
}

impl DocumentCheck {
    pub fn is_complete(&self) -> bool {
        self.present && self.missing_fields.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub checks: BTreeMap<DocumentType, DocumentCheck>,
    pub overall: ValidationStatus,
}

impl ValidationResult {
    pub fn passed(&self) -> bool {
        self.overall == ValidationStatus::Pass
    }

    pub fn missing_documents(&self) -> Vec<DocumentType> {
        self.checks
            .values()
            .filter(|check| check.required && !check.present)
            .map(|check| check.document_type)
            .collect()
    }

    pub fn incomplete_documents(&self) -> Vec<DocumentType> {
        self.checks
            .values()
            .filter(|check| check.present && !check.missing_fields.is_empty())
            .map(|check| check.document_type)
            .collect()
    }

    /// Issues in document order, suitable for a run failure.
    pub fn issues(&self) -> Vec<PipelineError> {
        self.checks
            .values()
            .filter_map(|check| {
                if check.required && !check.present {
                    Some(PipelineError::MissingDocument {
                        document_type: check.document_type,
                    })
                } else if !check.missing_fields.is_empty() {
                    Some(PipelineError::IncompleteDocument {
                        document_type: check.document_type,
                        missing_fields: check.missing_fields.iter().cloned().collect(),
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    /// Unlock extraction over `store`; `None` unless validation passed.
    pub fn validated<'a>(
        &self,
        store: &'a DocumentStore,
        detections: &'a DetectionReport,
    ) -> Option<ValidatedDocuments<'a>> {
        self.passed().then_some(ValidatedDocuments { store, detections })
    }
}

/// Documents that passed validation. Only obtainable through [`ValidationResult::validated`],
/// so extraction cannot run on an incomplete submission.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedDocuments<'a> {
    store: &'a DocumentStore,
    detections: &'a DetectionReport,
}

impl<'a> ValidatedDocuments<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &'a UploadedDocument> {
        self.store.iter()
    }

    pub fn detections(&self) -> &'a DetectionReport {
        self.detections
    }
}

/// Presence-only check that needs no document service. Returns a failing result when a required
/// document was never uploaded; fields on the documents that are present stay unchecked.
pub fn check_presence(store: &DocumentStore, spec: &RequiredFieldSpec) -> Option<ValidationResult> {
    if spec.document_types().all(|document_type| store.contains(document_type)) {
        return None;
    }

    let mut checks = BTreeMap::new();
    for document_type in spec.document_types() {
        let present = store.contains(document_type);
        let note = if present {
            "fields not checked until every required document is uploaded".to_string()
        } else {
            format!("{document_type} was not uploaded")
        };
        checks.insert(
            document_type,
            DocumentCheck {
                document_type,
                required: true,
                present,
                missing_fields: BTreeSet::new(),
                notes: vec![note],
            },
        );
    }

    Some(ValidationResult {
        checks,
        overall: ValidationStatus::Fail,
    })
}

/// Check the store against the required fields using previously detected fields.
pub fn validate(
    store: &DocumentStore,
    spec: &RequiredFieldSpec,
    detections: &DetectionReport,
) -> ValidationResult {
    let mut checks = BTreeMap::new();

    for (document_type, required_fields) in spec.iter() {
        let present = store.contains(document_type);
        let mut notes = Vec::new();
        let missing_fields: BTreeSet<String> = if present {
            required_fields
                .iter()
                .filter(|field| !detections.is_located(document_type, field))
                .cloned()
                .collect()
        } else {
            notes.push(format!("{document_type} was not uploaded"));
            BTreeSet::new()
        };

        if !missing_fields.is_empty() {
            notes.push(format!(
                "could not locate {} on the {}",
                missing_fields.iter().cloned().collect::<Vec<_>>().join(", "),
                document_type.label().to_lowercase()
            ));
        }

        checks.insert(
            document_type,
            DocumentCheck {
                document_type,
                required: true,
                present,
                missing_fields,
                notes,
            },
        );
    }

    for document in store.iter() {
        let document_type = document.document_type();
        checks.entry(document_type).or_insert_with(|| DocumentCheck {
            document_type,
            required: false,
            present: true,
            missing_fields: BTreeSet::new(),
            notes: vec!["not required; used as a supplementary source".to_string()],
        });
    }

    let overall = if checks
        .values()
        .all(|check| !check.required || check.is_complete())
    {
        ValidationStatus::Pass
    } else {
        ValidationStatus::Fail
    };

    ValidationResult { checks, overall }
}
