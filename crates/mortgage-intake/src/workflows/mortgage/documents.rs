use std::collections::BTreeMap;

use mime::Mime;
use serde::{Deserialize, Serialize};

use super::domain::DocumentType;
use super::errors::PipelineError;

/// MIME essences the document-understanding service can read.
pub const SUPPORTED_MIME_TYPES: [&str; 3] = ["application/pdf", "image/jpeg", "image/png"];

/// Raw upload as received from the intake boundary, before format checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub document_type: DocumentType,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub page_count: Option<u32>,
}

impl DocumentUpload {
    pub fn new(
        document_type: DocumentType,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            document_type,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
            page_count: None,
        }
    }

    pub fn with_page_count(mut self, page_count: u32) -> Self {
        self.page_count = Some(page_count);
        self
    }
}

/// Accepted document; immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    document_type: DocumentType,
    file_name: String,
    mime: Mime,
    bytes: Vec<u8>,
    page_count: Option<u32>,
}

impl UploadedDocument {
    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        self.mime.essence_str()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> Option<u32> {
        self.page_count
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            document_type: self.document_type,
            file_name: self.file_name.clone(),
            mime_type: self.mime_type().to_string(),
            size_bytes: self.bytes.len(),
            page_count: self.page_count,
        }
    }
}

impl TryFrom<DocumentUpload> for UploadedDocument {
    type Error = PipelineError;

    fn try_from(upload: DocumentUpload) -> Result<Self, Self::Error> {
        let unsupported = || PipelineError::UnsupportedFormat {
            document_type: upload.document_type,
            mime_type: upload.mime_type.trim().to_string(),
        };

        let mime: Mime = upload.mime_type.trim().parse().map_err(|_| unsupported())?;
        let supported = SUPPORTED_MIME_TYPES
            .iter()
            .any(|essence| essence.eq_ignore_ascii_case(mime.essence_str()));
        if !supported {
            return Err(unsupported());
        }

        Ok(Self {
            document_type: upload.document_type,
            file_name: upload.file_name,
            mime,
            bytes: upload.bytes,
            page_count: upload.page_count,
        })
    }
}

/// Metadata view of an uploaded document, safe to persist alongside a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_type: DocumentType,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: usize,
    pub page_count: Option<u32>,
}

/// Write-once collection of a submission's documents keyed by declared type.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: BTreeMap<DocumentType, UploadedDocument>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from raw uploads, stopping at the first rejected upload.
    pub fn from_uploads<I>(uploads: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = DocumentUpload>,
    {
        let mut store = Self::new();
        for upload in uploads {
            store.upload(upload)?;
        }
        Ok(store)
    }

    pub fn upload(&mut self, upload: DocumentUpload) -> Result<&UploadedDocument, PipelineError> {
        let document_type = upload.document_type;
        if self.documents.contains_key(&document_type) {
            return Err(PipelineError::DuplicateDocument { document_type });
        }

        let document = UploadedDocument::try_from(upload)?;
        Ok(self.documents.entry(document_type).or_insert(document))
    }

    pub fn get(&self, document_type: DocumentType) -> Option<&UploadedDocument> {
        self.documents.get(&document_type)
    }

    pub fn contains(&self, document_type: DocumentType) -> bool {
        self.documents.contains_key(&document_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UploadedDocument> {
        self.documents.values()
    }

    pub fn document_types(&self) -> Vec<DocumentType> {
        self.documents.keys().copied().collect()
    }

    pub fn summaries(&self) -> Vec<DocumentSummary> {
        self.documents.values().map(UploadedDocument::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
