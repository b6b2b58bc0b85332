//! Bundled local backend: reads documents from a directory tree, embeds
//! with a deterministic feature-hash model, and writes chunk records to
//! per-worker JSONL files.
//!
//! Production deployments swap in remote parser and vector-store clients;
//! this backend keeps the pipeline fully runnable offline.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use intake_core::collaborators::{
    CollaboratorFactory, CollaboratorSet, EmbedIndexer, EmbeddingBatch, LocalFileDownloader,
    ParserChoice, PassthroughNormalizer, PlainTextParser,
};
use intake_core::Chunk;

const EMBEDDING_DIM: usize = 256;

pub struct LocalBackendFactory {
    root: PathBuf,
    out_dir: PathBuf,
    parser: ParserChoice,
}

impl LocalBackendFactory {
    pub fn new(root: PathBuf, out_dir: PathBuf, parser: ParserChoice) -> Self {
        Self {
            root,
            out_dir,
            parser,
        }
    }
}

impl CollaboratorFactory for LocalBackendFactory {
    fn build(&self, worker_id: usize) -> anyhow::Result<CollaboratorSet> {
        // OCR backends are remote services; the local backend only parses
        // text-like content.
        if self.parser != ParserChoice::PlainText {
            anyhow::bail!(
                "parser backend {} is not available in the local backend",
                self.parser
            );
        }
        Ok(CollaboratorSet {
            downloader: Box::new(LocalFileDownloader::new(self.root.clone())),
            normalizer: Box::new(PassthroughNormalizer),
            parser: Box::new(PlainTextParser),
            redactor: None,
            indexer: Box::new(JsonlIndexer {
                out_dir: self.out_dir.clone(),
                worker_id,
            }),
        })
    }
}

/// Writes upserted chunks to `{out_dir}/{namespace}.worker{N}.jsonl`.
/// One file per worker, so concurrent appends never interleave.
struct JsonlIndexer {
    out_dir: PathBuf,
    worker_id: usize,
}

#[async_trait]
impl EmbedIndexer for JsonlIndexer {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<EmbeddingBatch> {
        Ok(EmbeddingBatch {
            dense: texts.iter().map(|t| hash_embed(t)).collect(),
            sparse: texts.iter().map(|_| Vec::new()).collect(),
        })
    }

    async fn upsert(&self, chunks: &[Chunk], namespace: &str) -> anyhow::Result<()> {
        let path = self
            .out_dir
            .join(format!("{}.worker{}.jsonl", namespace, self.worker_id));
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let mut buf = Vec::new();
        for chunk in chunks {
            serde_json::to_writer(&mut buf, chunk)?;
            buf.push(b'\n');
        }
        file.write_all(&buf).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Normalized bag-of-words embedding over hashed tokens. Deterministic,
/// no model download; good enough for local similarity smoke tests.
fn hash_embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];
    for token in text.split_whitespace() {
        let token = token.to_lowercase();
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        vector[(hasher.finish() as usize) % EMBEDDING_DIM] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::document::ContentType;

    #[test]
    fn hash_embed_is_deterministic_and_normalized() {
        let a = hash_embed("net price per unit");
        let b = hash_embed("net price per unit");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_ne!(a, hash_embed("completely different words here"));
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let v = hash_embed("");
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn upsert_appends_one_line_per_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = JsonlIndexer {
            out_dir: dir.path().to_path_buf(),
            worker_id: 3,
        };
        let chunk = Chunk {
            text: "Payment due in thirty days.".to_string(),
            source_path: "deals/msa.txt".to_string(),
            section_name: "payment terms".to_string(),
            chunk_index: 0,
            content_type: ContentType::Financial,
            table_part: false,
        };

        indexer.upsert(&[chunk.clone()], "deals").await.unwrap();
        indexer.upsert(&[chunk], "deals").await.unwrap();

        let written =
            std::fs::read_to_string(dir.path().join("deals.worker3.jsonl")).unwrap();
        assert_eq!(written.lines().count(), 2);
        let parsed: Chunk = serde_json::from_str(written.lines().next().unwrap()).unwrap();
        assert_eq!(parsed.section_name, "payment terms");
    }

    #[test]
    fn non_local_parser_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let factory = LocalBackendFactory::new(
            dir.path().to_path_buf(),
            dir.path().to_path_buf(),
            ParserChoice::CloudOcr,
        );
        assert!(factory.build(0).is_err());
    }
}
