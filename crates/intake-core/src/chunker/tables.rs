//! Table detection and size-bounded table splitting.
//!
//! Two layouts are recognized: the canonical `=== Name ===` block (header
//! row, dash separator, pipe-delimited data rows) and markdown pipe
//! tables. Tables at or below the word threshold are preserved whole;
//! oversized tables are split into row ranges with the header and
//! separator repeated verbatim at the top of every part so each part stays
//! independently interpretable.

/// Sections longer than this are treated as plain text to bound
/// worst-case detection cost.
pub const MAX_DETECT_LINES: usize = 20_000;

/// Alternating content of one section.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Table(TableBlock),
}

/// One detected table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    /// From the `=== Name ===` header; markdown tables are unnamed.
    pub name: Option<String>,
    pub header: String,
    pub separator: String,
    /// Logical data rows, after continuation-row merging.
    pub rows: Vec<String>,
    /// The original block text, verbatim, for whole-table preservation.
    pub raw: String,
}

impl TableBlock {
    pub fn word_count(&self) -> usize {
        self.raw.split_whitespace().count()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Table")
    }
}

fn canonical_name(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix("===")?.strip_suffix("===")?;
    let name = inner.trim();
    if name.is_empty() || name.chars().all(|c| c == '=') {
        None
    } else {
        Some(name)
    }
}

fn is_separator(line: &str, require_pipe: bool) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || !trimmed.contains('-') {
        return false;
    }
    if require_pipe && !trimmed.contains('|') {
        return false;
    }
    trimmed.chars().all(|c| matches!(c, '-' | '|' | ':' | ' ' | '+'))
}

fn is_data_row(line: &str) -> bool {
    line.contains('|') && !line.trim().is_empty()
}

fn populated_cells(row: &str) -> Vec<&str> {
    row.split('|')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .collect()
}

/// Collect data rows starting at `start`, merging continuation rows.
///
/// A row with a single populated cell is treated as a continuation of the
/// previous row's description unless it contains "total" — a best-effort
/// heuristic that keeps legitimate summary rows intact.
fn collect_rows(lines: &[&str], start: usize) -> (Vec<String>, usize) {
    let mut rows: Vec<String> = Vec::new();
    let mut end = start;
    while end < lines.len() && is_data_row(lines[end]) {
        let line = lines[end];
        let cells = populated_cells(line);
        let is_continuation = cells.len() == 1
            && !cells[0].to_ascii_lowercase().contains("total")
            && !rows.is_empty();
        if is_continuation {
            let prev = rows.last_mut().unwrap();
            prev.push(' ');
            prev.push_str(cells[0]);
        } else {
            rows.push(line.to_string());
        }
        end += 1;
    }
    (rows, end)
}

/// Try to read a table starting at line `i`. Returns the block and the
/// index one past its last line.
fn detect_table(lines: &[&str], i: usize) -> Option<(TableBlock, usize)> {
    // Canonical: === Name === / header / separator / rows
    if let Some(name) = canonical_name(lines[i]) {
        if i + 2 < lines.len()
            && lines[i + 1].contains('|')
            && is_separator(lines[i + 2], false)
            && i + 3 < lines.len()
            && is_data_row(lines[i + 3])
        {
            let (rows, end) = collect_rows(lines, i + 3);
            return Some((
                TableBlock {
                    name: Some(name.to_string()),
                    header: lines[i + 1].to_string(),
                    separator: lines[i + 2].to_string(),
                    rows,
                    raw: lines[i..end].join("\n"),
                },
                end,
            ));
        }
    }

    // Markdown: header | row / |---|---| separator / rows
    if lines[i].contains('|')
        && i + 1 < lines.len()
        && is_separator(lines[i + 1], true)
        && i + 2 < lines.len()
        && is_data_row(lines[i + 2])
    {
        let (rows, end) = collect_rows(lines, i + 2);
        return Some((
            TableBlock {
                name: None,
                header: lines[i].to_string(),
                separator: lines[i + 1].to_string(),
                rows,
                raw: lines[i..end].join("\n"),
            },
            end,
        ));
    }

    None
}

/// Split a section body into alternating text and table segments.
/// Non-matching content defaults to text.
pub fn split_segments(body: &str) -> Vec<Segment> {
    let lines: Vec<&str> = body.lines().collect();
    if lines.len() > MAX_DETECT_LINES {
        return vec![Segment::Text(body.to_string())];
    }

    let mut segments = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < lines.len() {
        if let Some((block, end)) = detect_table(&lines, i) {
            if !text.trim().is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            } else {
                text.clear();
            }
            segments.push(Segment::Table(block));
            i = end;
        } else {
            text.push_str(lines[i]);
            text.push('\n');
            i += 1;
        }
    }
    if !text.trim().is_empty() {
        segments.push(Segment::Text(text));
    }
    segments
}

/// Split an oversized table into row-range parts.
///
/// Every part begins with `=== Name (part i/N) ===`, the header row, and
/// the separator, followed by a disjoint slice of the data rows in
/// original order.
pub fn split_table(block: &TableBlock, max_words: usize) -> Vec<String> {
    let frame_words = block.header.split_whitespace().count()
        + block.separator.split_whitespace().count();
    let row_budget = max_words.saturating_sub(frame_words).max(1);

    // First pass: partition rows by word budget.
    let mut ranges: Vec<Vec<&String>> = Vec::new();
    let mut current: Vec<&String> = Vec::new();
    let mut current_words = 0;
    for row in &block.rows {
        let words = row.split_whitespace().count();
        if !current.is_empty() && current_words + words > row_budget {
            ranges.push(std::mem::take(&mut current));
            current_words = 0;
        }
        current.push(row);
        current_words += words;
    }
    if !current.is_empty() {
        ranges.push(current);
    }

    let total = ranges.len().max(1);
    ranges
        .iter()
        .enumerate()
        .map(|(idx, rows)| {
            let mut part = format!(
                "=== {} (part {}/{}) ===\n{}\n{}",
                block.display_name(),
                idx + 1,
                total,
                block.header,
                block.separator
            );
            for row in rows {
                part.push('\n');
                part.push_str(row);
            }
            part
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical_table(rows: usize) -> String {
        let mut text = String::from("=== Price List ===\nItem | Price\n---------\n");
        for i in 0..rows {
            text.push_str(&format!("Widget {} | ${}.00\n", i, i));
        }
        text
    }

    #[test]
    fn detects_canonical_table_between_text() {
        let body = format!(
            "Lead-in paragraph before the numbers.\n{}Trailing remarks after.\n",
            canonical_table(3)
        );
        let segments = split_segments(&body);
        assert_eq!(segments.len(), 3);
        assert!(matches!(segments[0], Segment::Text(_)));
        let Segment::Table(block) = &segments[1] else {
            panic!("expected table segment");
        };
        assert_eq!(block.name.as_deref(), Some("Price List"));
        assert_eq!(block.rows.len(), 3);
        assert!(matches!(segments[2], Segment::Text(_)));
    }

    #[test]
    fn detects_markdown_table() {
        let body = "Intro line.\n\
                    | Item | Price |\n\
                    | --- | --- |\n\
                    | Widget | $5 |\n\
                    | Gadget | $7 |\n";
        let segments = split_segments(body);
        let Segment::Table(block) = &segments[1] else {
            panic!("expected table segment");
        };
        assert!(block.name.is_none());
        assert_eq!(block.rows.len(), 2);
    }

    #[test]
    fn non_table_pipes_stay_text() {
        // Pipe row without a separator underneath is not a table.
        let body = "alpha | beta\nplain prose follows here\n";
        let segments = split_segments(body);
        assert_eq!(segments.len(), 1);
        assert!(matches!(segments[0], Segment::Text(_)));
    }

    #[test]
    fn raw_preserves_original_block() {
        let body = canonical_table(2);
        let segments = split_segments(&body);
        let Segment::Table(block) = &segments[0] else {
            panic!("expected table segment");
        };
        assert_eq!(block.raw, body.trim_end());
    }

    #[test]
    fn continuation_row_merges_into_previous() {
        let body = "=== Items ===\n\
                    Item | Description | Price\n\
                    -----------------\n\
                    Widget | Base unit | $5\n\
                    | continued description text |\n\
                    Gadget | Other unit | $7\n";
        let segments = split_segments(body);
        let Segment::Table(block) = &segments[0] else {
            panic!("expected table segment");
        };
        assert_eq!(block.rows.len(), 2);
        assert!(block.rows[0].contains("continued description text"));
    }

    #[test]
    fn total_row_is_not_merged() {
        let body = "=== Items ===\n\
                    Item | Price\n\
                    ---------\n\
                    Widget | $5\n\
                    | Total: $5 |\n";
        let segments = split_segments(body);
        let Segment::Table(block) = &segments[0] else {
            panic!("expected table segment");
        };
        assert_eq!(block.rows.len(), 2);
        assert!(block.rows[1].contains("Total"));
    }

    #[test]
    fn oversized_table_parts_repeat_header() {
        let rows: Vec<String> = (0..500)
            .map(|i| format!("Item {} with some padding words here now | ${}", i, i))
            .collect();
        let block = TableBlock {
            name: Some("Inventory".to_string()),
            header: "Item | Price".to_string(),
            separator: "---------".to_string(),
            raw: rows.join("\n"),
            rows,
        };
        let parts = split_table(&block, 2000);
        assert!(parts.len() > 1);

        let total = parts.len();
        let mut reassembled = Vec::new();
        for (i, part) in parts.iter().enumerate() {
            let mut lines = part.lines();
            assert_eq!(
                lines.next().unwrap(),
                format!("=== Inventory (part {}/{}) ===", i + 1, total)
            );
            assert_eq!(lines.next().unwrap(), "Item | Price");
            assert_eq!(lines.next().unwrap(), "---------");
            reassembled.extend(lines.map(String::from));
        }
        assert_eq!(reassembled, block.rows);
    }

    #[test]
    fn giant_section_skips_detection() {
        let mut body = canonical_table(2);
        for _ in 0..MAX_DETECT_LINES {
            body.push_str("filler line\n");
        }
        let segments = split_segments(&body);
        assert_eq!(segments.len(), 1);
        assert!(matches!(segments[0], Segment::Text(_)));
    }
}
