//! Business-aware chunker.
//!
//! Not a similarity-based semantic splitter: a structure-aware,
//! size-bounded one. Documents are split into business sections, sections
//! into alternating text and table segments, text into sentences packed up
//! to the size budget with trailing overlap, and tables are kept whole or
//! split into header-repeating parts. Deterministic for identical input,
//! and it never fails a document outright: a flat word-count splitter
//! backs the structural path.

mod sections;
mod sentences;
mod tables;

pub use sections::{split_sections, Section};
pub use tables::{split_segments, split_table, Segment, TableBlock};

use crate::config::ChunkerConfig;
use crate::document::{Chunk, ContentType};

/// Keyword sets for coarse content tagging, checked in priority order.
const FINANCIAL_KEYWORDS: &[&str] = &[
    "price", "pricing", "cost", "fee", "invoice", "payment", "budget", "revenue", "$", "usd",
    "total",
];
const LEGAL_KEYWORDS: &[&str] = &[
    "agreement",
    "liability",
    "indemnif",
    "warranty",
    "confidential",
    "termination",
    "governing law",
    "jurisdiction",
];
const SCHEDULE_KEYWORDS: &[&str] = &[
    "schedule", "deadline", "milestone", "delivery date", "timeline", "due date",
];
const CONTACT_KEYWORDS: &[&str] = &["email", "phone", "contact", "address", "attn", "@"];
const TECHNICAL_KEYWORDS: &[&str] = &[
    "specification",
    "api",
    "architecture",
    "throughput",
    "latency",
    "protocol",
    "hardware",
    "software",
];

/// Tag a chunk with a coarse content type by keyword presence.
pub fn classify_content(text: &str) -> ContentType {
    let lower = text.to_ascii_lowercase();
    let hit = |keywords: &[&str]| keywords.iter().any(|kw| lower.contains(kw));
    if hit(FINANCIAL_KEYWORDS) {
        ContentType::Financial
    } else if hit(LEGAL_KEYWORDS) {
        ContentType::Legal
    } else if hit(SCHEDULE_KEYWORDS) {
        ContentType::Schedule
    } else if hit(CONTACT_KEYWORDS) {
        ContentType::Contact
    } else if hit(TECHNICAL_KEYWORDS) {
        ContentType::Technical
    } else {
        ContentType::General
    }
}

/// Structure-aware, size-bounded chunker for business documents.
#[derive(Debug, Clone)]
pub struct BusinessChunker {
    config: ChunkerConfig,
}

impl BusinessChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Chunk a document's extracted text. Never fails: structural errors
    /// or empty output for non-trivial input fall back to a flat
    /// word-count splitter.
    pub fn chunk(&self, text: &str, source_path: &str) -> Vec<Chunk> {
        let word_count = text.split_whitespace().count();
        let chunks = self.chunk_structural(text, source_path);

        if chunks.is_empty() && word_count >= self.config.min_sentence_words {
            tracing::warn!(
                path = source_path,
                words = word_count,
                "Structural chunking produced nothing, using flat splitter"
            );
            return self.chunk_flat(text, source_path);
        }
        chunks
    }

    fn chunk_structural(&self, text: &str, source_path: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut index = 0;

        for section in split_sections(text) {
            for segment in split_segments(&section.body) {
                match segment {
                    Segment::Text(body) => {
                        let sentences =
                            sentences::split_sentences(&body, self.config.min_sentence_words);
                        for packed in sentences::pack_sentences(sentences, &self.config) {
                            chunks.push(self.make_chunk(
                                packed,
                                source_path,
                                &section.name,
                                &mut index,
                                false,
                            ));
                        }
                    }
                    Segment::Table(block) => {
                        if block.word_count() <= self.config.excel_sheet_max_size {
                            // Tables that fit are never split mid-row.
                            chunks.push(self.make_chunk(
                                block.raw.clone(),
                                source_path,
                                &section.name,
                                &mut index,
                                false,
                            ));
                        } else {
                            for part in split_table(&block, self.config.excel_sheet_max_size) {
                                chunks.push(self.make_chunk(
                                    part,
                                    source_path,
                                    &section.name,
                                    &mut index,
                                    true,
                                ));
                            }
                        }
                    }
                }
            }
        }
        chunks
    }

    fn make_chunk(
        &self,
        text: String,
        source_path: &str,
        section_name: &str,
        index: &mut usize,
        table_part: bool,
    ) -> Chunk {
        let chunk = Chunk {
            content_type: classify_content(&text),
            text,
            source_path: source_path.to_string(),
            section_name: section_name.to_string(),
            chunk_index: *index,
            table_part,
        };
        *index += 1;
        chunk
    }

    /// Fallback: flat word-count splitting with proportional overlap.
    fn chunk_flat(&self, text: &str, source_path: &str) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        // Approximate words-per-chunk from the character budget, with the
        // same proportion of overlap the structural path uses.
        let avg_word_len = (text.len() / words.len()).max(1);
        let words_per_chunk = (self.config.max_chunk_size / (avg_word_len + 1)).max(1);
        let overlap_words = (words_per_chunk * self.config.effective_overlap()
            / self.config.max_chunk_size.max(1))
        .min(words_per_chunk / 2);

        let mut chunks = Vec::new();
        let mut index = 0;
        let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            let body = words[start..end].join(" ");
            chunks.push(self.make_chunk(body, source_path, "main", &mut index, false));
            if end == words.len() {
                break;
            }
            start = end - overlap_words.min(end - start - 1).min(end - 1);
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(max: usize) -> BusinessChunker {
        BusinessChunker::new(ChunkerConfig {
            max_chunk_size: max,
            overlap_size: 75,
            ..Default::default()
        })
    }

    fn ten_sentence_doc() -> String {
        (0..10)
            .map(|i| format!("This is plain sentence number {} of the document.", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn clean_small_document_is_one_main_chunk() {
        let text = ten_sentence_doc();
        let chunks = chunker(2000).chunk(&text, "docs/clean.txt");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section_name, "main");
        assert_eq!(chunks[0].chunk_index, 0);
        for i in 0..10 {
            assert!(chunks[0].text.contains(&format!("number {}", i)));
        }
    }

    #[test]
    fn chunk_bound_holds() {
        let text = ten_sentence_doc().repeat(5);
        let chunker = chunker(300);
        let chunks = chunker.chunk(&text, "docs/long.txt");
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.len() <= 300 + 75, "len {}", chunk.text.len());
        }
    }

    #[test]
    fn small_table_is_preserved_whole() {
        let table = "=== Rates ===\nRole | Rate\n--------\nEngineer | $150\nAnalyst | $95";
        let text = format!("Context sentence introducing the rates below.\n{}\n", table);
        let chunks = chunker(500).chunk(&text, "docs/rates.txt");
        let table_chunk = chunks
            .iter()
            .find(|c| c.text.starts_with("=== Rates ==="))
            .expect("table chunk");
        assert_eq!(table_chunk.text, table);
        assert!(!table_chunk.table_part);
    }

    #[test]
    fn oversized_table_scenario() {
        // Header `Item | Price`, 500 rows of 10 words each, threshold 2000.
        let mut text = String::from("=== Inventory ===\nItem | Price\n---------\n");
        let mut expected_rows = Vec::new();
        for i in 0..500 {
            let row = format!("Item {} alpha beta gamma delta epsilon zeta | ${}.00", i, i);
            assert_eq!(row.split_whitespace().count(), 10);
            text.push_str(&row);
            text.push('\n');
            expected_rows.push(row);
        }

        let chunks = BusinessChunker::new(ChunkerConfig {
            excel_sheet_max_size: 2000,
            ..ChunkerConfig::pipeline_default()
        })
        .chunk(&text, "docs/inventory.txt");

        assert!(chunks.len() > 1);
        let total = chunks.len();
        let mut reassembled = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(chunk.table_part);
            let mut lines = chunk.text.lines();
            assert_eq!(
                lines.next().unwrap(),
                format!("=== Inventory (part {}/{}) ===", i + 1, total)
            );
            assert_eq!(lines.next().unwrap(), "Item | Price");
            assert_eq!(lines.next().unwrap(), "---------");
            reassembled.extend(lines.map(String::from));
        }
        assert_eq!(reassembled, expected_rows);
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = format!("{}\nPricing\n{}", ten_sentence_doc(), ten_sentence_doc());
        let chunker = chunker(300);
        let a = chunker.chunk(&text, "docs/a.txt");
        let b = chunker.chunk(&text, "docs/a.txt");
        assert_eq!(a, b);
    }

    #[test]
    fn content_tagging() {
        assert_eq!(
            classify_content("The invoice total is $4,000 due on receipt"),
            ContentType::Financial
        );
        assert_eq!(
            classify_content("This agreement is subject to the governing law of Delaware"),
            ContentType::Legal
        );
        assert_eq!(
            classify_content("Milestone two lands in the third week"),
            ContentType::Schedule
        );
        assert_eq!(
            classify_content("Reach the team at ops@example.com"),
            ContentType::Contact
        );
        assert_eq!(
            classify_content("The protocol negotiates throughput limits"),
            ContentType::Technical
        );
        assert_eq!(
            classify_content("Nothing in particular here"),
            ContentType::General
        );
    }

    #[test]
    fn fallback_kicks_in_for_unstructured_noise() {
        // All "sentences" are under the minimum word count, so the
        // structural path drops everything; the flat splitter must not.
        let text = "ok. no. yes. hm. go. eh. aa. bb. cc. dd. ee. ff.";
        let chunks = chunker(100).chunk(text, "docs/noise.txt");
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].section_name, "main");
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(chunker(500).chunk("", "docs/empty.txt").is_empty());
        assert!(chunker(500).chunk("hi", "docs/tiny.txt").is_empty());
    }
}
