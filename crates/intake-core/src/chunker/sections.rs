//! Coarse business-section detection.
//!
//! Sections are found by scanning lines for headings that match a fixed
//! business vocabulary. Each section is chunked independently so chunk
//! boundaries never silently merge unrelated sections.

/// Fixed heading vocabulary. A heading names the section it opens.
const SECTION_VOCABULARY: &[&str] = &[
    "pricing",
    "price",
    "fees",
    "payment",
    "terms",
    "conditions",
    "deliverables",
    "scope",
    "signatures",
    "signature",
    "parties",
    "warranty",
    "warranties",
    "confidentiality",
    "termination",
    "schedule",
    "milestones",
    "appendix",
    "exhibit",
];

/// One coarse section of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    pub body: String,
}

/// Heading heuristic: a short standalone line (no table syntax, no
/// sentence-ending period) containing a vocabulary keyword.
fn heading_keyword(line: &str) -> Option<&'static str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.len() > 60 {
        return None;
    }
    if trimmed.contains('|') || trimmed.starts_with("===") {
        return None;
    }
    if trimmed.ends_with('.') {
        return None;
    }
    if trimmed.split_whitespace().count() > 8 {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    SECTION_VOCABULARY
        .iter()
        .find(|kw| {
            lower
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|word| word == **kw)
        })
        .copied()
}

/// Split a document into business sections. Content before the first
/// recognized heading (or the whole document, when nothing matches) lands
/// in a section named `main`.
pub fn split_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current_name = "main".to_string();
    let mut current_body = String::new();
    // Heading lines stay in their section's body (their text carries
    // meaning, e.g. "Pricing and Fees"), so emptiness is tracked
    // separately from the body buffer.
    let mut has_content = false;

    for line in text.lines() {
        if let Some(keyword) = heading_keyword(line) {
            if has_content {
                sections.push(Section {
                    name: current_name.clone(),
                    body: std::mem::take(&mut current_body),
                });
            } else {
                current_body.clear();
            }
            current_name = keyword.to_string();
            current_body.push_str(line.trim());
            current_body.push('\n');
            has_content = false;
            continue;
        }
        if !line.trim().is_empty() {
            has_content = true;
        }
        current_body.push_str(line);
        current_body.push('\n');
    }

    if has_content {
        sections.push(Section {
            name: current_name,
            body: current_body,
        });
    }

    if sections.is_empty() {
        sections.push(Section {
            name: "main".to_string(),
            body: text.to_string(),
        });
    }

    sections
}
