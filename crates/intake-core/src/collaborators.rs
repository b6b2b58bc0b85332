//! Interfaces to the external collaborators each stage calls into.
//!
//! The pipeline only ever talks to these narrow traits; concrete parser,
//! embedding, and redaction backends live outside this crate. One full set
//! of clients is built per worker so expensive backend initialization is
//! amortized across documents, and a stuck backend in one worker cannot
//! affect another.

use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;

use crate::document::{Chunk, DocumentDescriptor};

/// What the format-normalize stage produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Pdf,
    Text,
}

/// Best-effort parse result. Parsers degrade rather than fail on
/// recoverable problems; a returned error means the document is
/// unrecoverable (for example, upstream quota exhausted).
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub text: String,
    /// Table blocks already rendered into the canonical `=== Name ===`
    /// pipe format and appended to `text`; kept separately for reporting.
    pub tables: Vec<String>,
    pub page_count: usize,
}

/// Outcome of the optional redaction stage.
#[derive(Debug, Clone, Default)]
pub struct RedactionOutcome {
    pub redacted_text: String,
    pub errors: Vec<String>,
    pub validation_failures: usize,
}

/// Dense + sparse vectors for a batch of chunk texts.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingBatch {
    pub dense: Vec<Vec<f32>>,
    pub sparse: Vec<Vec<(u32, f32)>>,
}

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Fetch the raw bytes for a document path.
    async fn download(&self, path: &str) -> anyhow::Result<Vec<u8>>;
}

#[async_trait]
pub trait Normalizer: Send + Sync {
    /// Whether this document can be normalized at all.
    fn can_process(&self, path: &str, display_name: &str) -> bool;

    /// Convert raw bytes into parseable content.
    async fn normalize(
        &self,
        path: &str,
        bytes: Vec<u8>,
        display_name: &str,
    ) -> anyhow::Result<(Vec<u8>, ContentKind)>;
}

#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(
        &self,
        content: Vec<u8>,
        descriptor: &DocumentDescriptor,
        kind: ContentKind,
    ) -> anyhow::Result<ParsedDocument>;
}

#[async_trait]
pub trait Redactor: Send + Sync {
    async fn redact(&self, text: &str, context: &DocumentDescriptor)
        -> anyhow::Result<RedactionOutcome>;
}

#[async_trait]
pub trait EmbedIndexer: Send + Sync {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<EmbeddingBatch>;

    async fn upsert(&self, chunks: &[Chunk], namespace: &str) -> anyhow::Result<()>;
}

/// Parser backend, selected once at worker initialization rather than per
/// document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserChoice {
    PlainText,
    StructuredOcr,
    CloudOcr,
}

impl ParserChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "plain-text",
            Self::StructuredOcr => "structured-ocr",
            Self::CloudOcr => "cloud-ocr",
        }
    }
}

impl std::fmt::Display for ParserChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ParserChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain-text" => Ok(Self::PlainText),
            "structured-ocr" => Ok(Self::StructuredOcr),
            "cloud-ocr" => Ok(Self::CloudOcr),
            other => Err(format!("unknown parser backend: {other}")),
        }
    }
}

/// One worker's full set of collaborator clients.
pub struct CollaboratorSet {
    pub downloader: Box<dyn Downloader>,
    pub normalizer: Box<dyn Normalizer>,
    pub parser: Box<dyn DocumentParser>,
    pub redactor: Option<Box<dyn Redactor>>,
    pub indexer: Box<dyn EmbedIndexer>,
}

/// Builds one [`CollaboratorSet`] per worker. Construction failure is
/// worker-fatal: the worker reports it and exits without taking work.
pub trait CollaboratorFactory: Send + Sync + 'static {
    fn build(&self, worker_id: usize) -> anyhow::Result<CollaboratorSet>;
}

/// Reads documents from a local directory tree.
pub struct LocalFileDownloader {
    root: PathBuf,
}

impl LocalFileDownloader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Downloader for LocalFileDownloader {
    async fn download(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        let full = self.root.join(path);
        tokio::fs::read(&full)
            .await
            .map_err(|e| anyhow::anyhow!("download failed for {}: {}", full.display(), e))
    }
}

/// Passes text-like content through unchanged and tags PDFs by extension.
pub struct PassthroughNormalizer;

#[async_trait]
impl Normalizer for PassthroughNormalizer {
    fn can_process(&self, path: &str, _display_name: &str) -> bool {
        !path.is_empty()
    }

    async fn normalize(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _display_name: &str,
    ) -> anyhow::Result<(Vec<u8>, ContentKind)> {
        let kind = if path.to_ascii_lowercase().ends_with(".pdf") {
            ContentKind::Pdf
        } else {
            ContentKind::Text
        };
        Ok((bytes, kind))
    }
}

/// Treats content as UTF-8 text. The `plain-text` backend; the OCR
/// backends are external services wired in by the embedding host.
pub struct PlainTextParser;

#[async_trait]
impl DocumentParser for PlainTextParser {
    async fn parse(
        &self,
        content: Vec<u8>,
        descriptor: &DocumentDescriptor,
        kind: ContentKind,
    ) -> anyhow::Result<ParsedDocument> {
        if kind == ContentKind::Pdf {
            anyhow::bail!(
                "unsupported content for plain-text parser: {} is a PDF",
                descriptor.path
            );
        }
        let text = String::from_utf8_lossy(&content).into_owned();
        let page_count = text.matches('\x0c').count() + 1;
        Ok(ParsedDocument {
            text,
            tables: Vec::new(),
            page_count,
        })
    }
}
