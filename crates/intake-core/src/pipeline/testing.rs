//! Mock collaborators for pipeline tests.
//!
//! Behavior is driven by the document path so a single factory covers
//! every scenario: `fail-parse*` fails the parse stage, `hang-parse*`
//! never returns from it, `slow-parse*` takes 200ms, `empty*` parses to
//! no text, `missing*` fails the download.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::collaborators::{
    CollaboratorFactory, CollaboratorSet, ContentKind, DocumentParser, Downloader, EmbedIndexer,
    EmbeddingBatch, ParsedDocument, PassthroughNormalizer, RedactionOutcome, Redactor,
};
use crate::document::{Chunk, DocumentDescriptor, FileKind};

/// Descriptor helper for tests.
pub fn doc(path: &str) -> DocumentDescriptor {
    let ext = path.rsplit('.').next().unwrap_or("");
    DocumentDescriptor {
        path: path.to_string(),
        display_name: path.to_string(),
        file_kind: FileKind::from_extension(ext),
        size_bytes: 1024,
        modified_at: Utc::now(),
        business: Default::default(),
    }
}

#[derive(Default)]
pub struct MockFactory {
    /// Fail construction for every worker.
    pub fail_build: bool,
    /// Fail construction only for these worker ids.
    pub fail_build_for: Vec<usize>,
    /// Everything successfully upserted, across all workers.
    pub upserted: Arc<Mutex<Vec<Chunk>>>,
}

impl CollaboratorFactory for MockFactory {
    fn build(&self, worker_id: usize) -> anyhow::Result<CollaboratorSet> {
        if self.fail_build || self.fail_build_for.contains(&worker_id) {
            anyhow::bail!("mock backend construction failed for worker {worker_id}");
        }
        Ok(CollaboratorSet {
            downloader: Box::new(MockDownloader),
            normalizer: Box::new(PassthroughNormalizer),
            parser: Box::new(MockParser),
            redactor: Some(Box::new(MockRedactor)),
            indexer: Box::new(MockIndexer {
                upserted: self.upserted.clone(),
            }),
        })
    }
}

struct MockDownloader;

#[async_trait]
impl Downloader for MockDownloader {
    async fn download(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        if path.contains("missing") {
            anyhow::bail!("download failed: {path} not found");
        }
        Ok(path.as_bytes().to_vec())
    }
}

struct MockParser;

#[async_trait]
impl DocumentParser for MockParser {
    async fn parse(
        &self,
        _content: Vec<u8>,
        descriptor: &DocumentDescriptor,
        _kind: ContentKind,
    ) -> anyhow::Result<ParsedDocument> {
        if descriptor.path.contains("hang-parse") {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if descriptor.path.contains("slow-parse") {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        if descriptor.path.contains("fail-parse") {
            anyhow::bail!("mock parse backend rejected {}", descriptor.path);
        }
        let text = if descriptor.path.contains("empty") {
            String::new()
        } else {
            format!(
                "Document {} opens with a perfectly ordinary first sentence. \
                 The second sentence keeps the narrative going along nicely. \
                 A third sentence closes out the mock document body here.",
                descriptor.display_name
            )
        };
        Ok(ParsedDocument {
            text,
            tables: Vec::new(),
            page_count: 1,
        })
    }
}

struct MockRedactor;

#[async_trait]
impl Redactor for MockRedactor {
    async fn redact(
        &self,
        text: &str,
        _context: &DocumentDescriptor,
    ) -> anyhow::Result<RedactionOutcome> {
        Ok(RedactionOutcome {
            redacted_text: text.replace("ordinary", "[REDACTED]"),
            errors: Vec::new(),
            validation_failures: 0,
        })
    }
}

struct MockIndexer {
    upserted: Arc<Mutex<Vec<Chunk>>>,
}

#[async_trait]
impl EmbedIndexer for MockIndexer {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<EmbeddingBatch> {
        Ok(EmbeddingBatch {
            dense: texts.iter().map(|_| vec![0.0; 4]).collect(),
            sparse: texts.iter().map(|_| Vec::new()).collect(),
        })
    }

    async fn upsert(&self, chunks: &[Chunk], _namespace: &str) -> anyhow::Result<()> {
        self.upserted.lock().unwrap().extend(chunks.iter().cloned());
        Ok(())
    }
}
