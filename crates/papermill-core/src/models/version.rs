use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage_types::StorageBackend;

/// Declared type of an uploaded version. Drives converter selection:
/// office formats and CAD drawings are converted to PDF before
/// rasterization, videos are optimized in place, sheets ship pre-rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docs,
    Slides,
    Sheet,
    Video,
    Cad,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docs => "docs",
            DocumentKind::Slides => "slides",
            DocumentKind::Sheet => "sheet",
            DocumentKind::Video => "video",
            DocumentKind::Cad => "cad",
        }
    }
}

impl FromStr for DocumentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "docs" => Ok(DocumentKind::Docs),
            "slides" => Ok(DocumentKind::Slides),
            "sheet" => Ok(DocumentKind::Sheet),
            "video" => Ok(DocumentKind::Video),
            "cad" => Ok(DocumentKind::Cad),
            _ => Err(anyhow::anyhow!("Invalid document kind: {}", s)),
        }
    }
}

impl Display for DocumentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// One uploaded (or converted) revision of a document's content.
///
/// `file_key` points at the current canonical file; `original_file_key`
/// always points at the bytes the user uploaded. Converters rewrite
/// `file_key` and `kind`, the rasterizer fills in `num_pages`,
/// `has_pages`, `is_vertical`, and the primary flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub id: Uuid,
    pub document_id: Uuid,
    pub version_number: i32,
    pub kind: DocumentKind,
    pub file_key: String,
    pub original_file_key: String,
    pub storage_backend: StorageBackend,
    pub content_type: String,
    pub file_size: i64,
    pub num_pages: Option<i32>,
    pub has_pages: bool,
    pub is_primary: bool,
    pub is_vertical: bool,
    pub duration_secs: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentVersion {
    /// Whether this version needs a format conversion before it can be
    /// rasterized. PDFs go straight to the rasterizer; sheets ship
    /// pre-rendered and bypass the pipeline entirely.
    pub fn needs_conversion(&self) -> bool {
        matches!(
            self.kind,
            DocumentKind::Docs | DocumentKind::Slides | DocumentKind::Cad
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parse_round_trips() {
        for kind in [
            DocumentKind::Pdf,
            DocumentKind::Docs,
            DocumentKind::Slides,
            DocumentKind::Sheet,
            DocumentKind::Video,
            DocumentKind::Cad,
        ] {
            assert_eq!(kind.as_str().parse::<DocumentKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_rejected() {
        assert!("spreadsheet-v2".parse::<DocumentKind>().is_err());
        assert!("".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn conversion_required_only_for_office_and_cad() {
        let mut version = version_fixture(DocumentKind::Docs);
        assert!(version.needs_conversion());
        version.kind = DocumentKind::Slides;
        assert!(version.needs_conversion());
        version.kind = DocumentKind::Cad;
        assert!(version.needs_conversion());
        version.kind = DocumentKind::Pdf;
        assert!(!version.needs_conversion());
        version.kind = DocumentKind::Sheet;
        assert!(!version.needs_conversion());
        version.kind = DocumentKind::Video;
        assert!(!version.needs_conversion());
    }

    fn version_fixture(kind: DocumentKind) -> DocumentVersion {
        DocumentVersion {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            version_number: 1,
            kind,
            file_key: "team/doc/report.docx".to_string(),
            original_file_key: "team/doc/report.docx".to_string(),
            storage_backend: StorageBackend::Local,
            content_type: "application/octet-stream".to_string(),
            file_size: 1024,
            num_pages: None,
            has_pages: false,
            is_primary: false,
            is_vertical: false,
            duration_secs: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
