//! Sentence splitting and greedy chunk packing for text segments.

use crate::config::ChunkerConfig;

/// Abbreviations that must not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "inc", "corp", "ltd", "llc", "co", "no", "fig", "dr", "mr", "mrs", "ms", "st", "vs", "etc",
    "e.g", "i.e", "jr", "sr", "dept", "approx",
];

/// Words that often open a new idea; used as a natural-break signal.
const TRANSITION_WORDS: &[&str] = &[
    "however",
    "therefore",
    "additionally",
    "furthermore",
    "moreover",
    "finally",
    "meanwhile",
    "consequently",
    "nevertheless",
];

/// Natural-break close fires only once a chunk already holds this much.
const NATURAL_BREAK_MIN_CHARS: usize = 200;
const NATURAL_BREAK_MIN_SENTENCES: usize = 2;

fn is_abbreviation(token: &str) -> bool {
    let token = token.trim_end_matches('.').to_ascii_lowercase();
    ABBREVIATIONS.contains(&token.as_str())
}

/// `1.` / `2)` / `a.` style list markers; the trailing dot is not a
/// sentence boundary.
fn is_list_marker(token: &str) -> bool {
    let body = token.trim_end_matches(['.', ')']);
    if body.is_empty() || body.len() > 3 {
        return false;
    }
    body.chars().all(|c| c.is_ascii_digit())
        || (body.len() == 1 && body.chars().all(|c| c.is_ascii_alphabetic()))
}

fn starts_new_idea(sentence: &str) -> bool {
    let trimmed = sentence.trim_start();
    if trimmed.starts_with(['-', '*', '•']) {
        return true;
    }
    let first = trimmed
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    if is_list_marker(&first) {
        return true;
    }
    let word = first.trim_end_matches([',', ':', ';']);
    TRANSITION_WORDS.contains(&word)
}

/// Split text into sentences on punctuation boundaries, with a deny-list of
/// abbreviations and list markers to avoid false breaks. Sentences shorter
/// than `min_words` are dropped as noise.
pub fn split_sentences(text: &str, min_words: usize) -> Vec<String> {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut sentences = Vec::new();
    let mut current = String::new();

    let mut chars = flat.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            // Boundary only when followed by whitespace (or end of input)
            // and the preceding token is not protected.
            let at_end = chars.peek().is_none();
            let followed_by_space = chars.peek().is_some_and(|n| n.is_whitespace());
            if at_end || followed_by_space {
                let last_token = current
                    .split_whitespace()
                    .next_back()
                    .unwrap_or("")
                    .to_string();
                if c == '.' && (is_abbreviation(&last_token) || is_list_marker(&last_token)) {
                    continue;
                }
                let sentence = current.trim().to_string();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                current.clear();
                // Skip the boundary whitespace.
                while chars.peek().is_some_and(|n| n.is_whitespace()) {
                    chars.next();
                }
            }
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
        .into_iter()
        .filter(|s| s.split_whitespace().count() >= min_words)
        .collect()
}

/// Hard-split any sentence longer than the chunk budget, first at word
/// boundaries, then inside tokens that alone exceed the budget (URLs,
/// encoded blobs), so packing can always respect the size bound.
fn bound_sentence(sentence: String, max_len: usize) -> Vec<String> {
    if sentence.len() <= max_len {
        return vec![sentence];
    }
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for word in sentence.split_whitespace() {
        if word.len() > max_len {
            if !piece.is_empty() {
                pieces.push(std::mem::take(&mut piece));
            }
            piece = split_long_token(word, max_len, &mut pieces);
            continue;
        }
        if !piece.is_empty() && piece.len() + 1 + word.len() > max_len {
            pieces.push(std::mem::take(&mut piece));
        }
        if !piece.is_empty() {
            piece.push(' ');
        }
        piece.push_str(word);
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Split one whitespace-free token at char boundaries. Full pieces go to
/// `pieces`; the trailing partial piece is returned so packing continues
/// filling it with the following words.
fn split_long_token(token: &str, max_len: usize, pieces: &mut Vec<String>) -> String {
    let mut piece = String::new();
    for c in token.chars() {
        if !piece.is_empty() && piece.len() + c.len_utf8() > max_len {
            pieces.push(std::mem::take(&mut piece));
        }
        piece.push(c);
    }
    piece
}

/// Trailing overlap seeded into the next chunk: whole trailing sentences
/// up to the overlap budget, or a word-bounded tail of the last sentence
/// when it alone exceeds the budget.
fn trailing_overlap(sentences: &[String], budget: usize) -> String {
    let mut overlap: Vec<&str> = Vec::new();
    let mut used = 0;
    for sentence in sentences.iter().rev() {
        let cost = sentence.len() + if overlap.is_empty() { 0 } else { 1 };
        if used + cost > budget {
            break;
        }
        overlap.push(sentence);
        used += cost;
    }
    if overlap.is_empty() {
        if let Some(last) = sentences.last() {
            let mut tail = String::new();
            for word in last.split_whitespace().rev() {
                let cost = word.len() + if tail.is_empty() { 0 } else { 1 };
                if tail.len() + cost > budget {
                    break;
                }
                if tail.is_empty() {
                    tail = word.to_string();
                } else {
                    tail = format!("{} {}", word, tail);
                }
            }
            return tail;
        }
        return String::new();
    }
    overlap.reverse();
    overlap.join(" ")
}

/// Greedily pack sentences into chunks up to `max_chunk_size` characters.
///
/// When the limit would be exceeded the chunk is closed and the next one is
/// seeded with a trailing-sentence overlap for retrieval continuity. A
/// secondary early close fires on natural breaks once a chunk holds over
/// 200 characters and more than 2 sentences.
pub fn pack_sentences(sentences: Vec<String>, config: &ChunkerConfig) -> Vec<String> {
    let overlap_budget = config.effective_overlap();
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_sentences: Vec<String> = Vec::new();

    let close =
        |current: &mut String, current_sentences: &mut Vec<String>, chunks: &mut Vec<String>| {
            if current.trim().is_empty() {
                return;
            }
            chunks.push(std::mem::take(current));
            // Budget minus the joining space keeps every chunk within
            // max_chunk_size + overlap_size even in the worst case.
            let seed = trailing_overlap(current_sentences, overlap_budget.saturating_sub(1));
            current_sentences.clear();
            if !seed.is_empty() {
                *current = seed;
            }
        };

    for sentence in sentences
        .into_iter()
        .flat_map(|s| bound_sentence(s, config.max_chunk_size))
    {
        // A chunk holding only the overlap seed absorbs the next sentence
        // even past the budget; closing it would emit a chunk that is a
        // pure duplicate of the previous chunk's tail. The bound still
        // holds: seed + space + sentence <= overlap + max_chunk_size.
        let seed_only = !current.is_empty() && current_sentences.is_empty();
        let natural_break = starts_new_idea(&sentence)
            && current.len() > NATURAL_BREAK_MIN_CHARS
            && current_sentences.len() > NATURAL_BREAK_MIN_SENTENCES;
        let would_overflow = !seed_only
            && !current.is_empty()
            && current.len() + 1 + sentence.len() > config.max_chunk_size;

        if natural_break || would_overflow {
            close(&mut current, &mut current_sentences, &mut chunks);
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
        current_sentences.push(sentence);
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}
