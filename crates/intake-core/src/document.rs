//! Document descriptors, processing outcomes, and chunks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse file-type tag assigned at discovery time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Pdf,
    Spreadsheet,
    Word,
    Presentation,
    Email,
    Text,
    Other(String),
}

impl FileKind {
    /// Infer a kind from a file extension (lowercased, no dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "pdf" => Self::Pdf,
            "xls" | "xlsx" | "xlsm" | "csv" => Self::Spreadsheet,
            "doc" | "docx" | "rtf" => Self::Word,
            "ppt" | "pptx" => Self::Presentation,
            "eml" | "msg" => Self::Email,
            "txt" | "md" => Self::Text,
            other => Self::Other(other.to_string()),
        }
    }

    /// Spreadsheet-like inputs get a shorter stage budget (dense numeric
    /// content makes some parse stages pathologically slow).
    pub fn is_spreadsheet_like(&self) -> bool {
        matches!(self, Self::Spreadsheet)
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Spreadsheet => write!(f, "spreadsheet"),
            Self::Word => write!(f, "word"),
            Self::Presentation => write!(f, "presentation"),
            Self::Email => write!(f, "email"),
            Self::Text => write!(f, "text"),
            Self::Other(tag) => write!(f, "{}", tag),
        }
    }
}

/// Business metadata carried through the pipeline unchanged for
/// downstream enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_value: Option<f64>,
    /// Anything else the discovery step attached; passed through untouched.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Identity and provenance for one input file.
///
/// Immutable once discovered; owned by the checkpoint ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    /// Relative path within the document store; doubles as document identity.
    pub path: String,
    pub display_name: String,
    pub file_kind: FileKind,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub business: BusinessMetadata,
}

/// Last observed processing outcome for one document.
///
/// Created at discovery with `processed = false`; overwritten by the
/// orchestrator after each attempt. Workers never touch the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub processed: bool,
    #[serde(default)]
    pub processing_time_secs: f64,
    #[serde(default)]
    pub chunks_created: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parser_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Coarse content classification for downstream filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Financial,
    Legal,
    Schedule,
    Contact,
    Technical,
    General,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Financial => write!(f, "financial"),
            Self::Legal => write!(f, "legal"),
            Self::Schedule => write!(f, "schedule"),
            Self::Contact => write!(f, "contact"),
            Self::Technical => write!(f, "technical"),
            Self::General => write!(f, "general"),
        }
    }
}

/// One retrieval-sized passage. Identity is `(source_path, chunk_index)`;
/// never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_path: String,
    pub section_name: String,
    pub chunk_index: usize,
    pub content_type: ContentType,
    /// Set when this chunk is one part of a table that had to be split.
    #[serde(default)]
    pub table_part: bool,
}
