//! Paragraph-boundary text chunker with overlap.
//!
//! Splits extracted document text into pieces that respect a `max_tokens`
//! limit, then tags each piece with the conventional chunk metadata.
//!
//! # Algorithm
//!
//! 1. Convert `max_tokens` and `overlap_tokens` to chars (4 chars/token).
//! 2. Split text on `\n\n` paragraph boundaries.
//! 3. Accumulate paragraphs until the next one would exceed `max_chars`,
//!    then flush.
//! 4. Hard-split a single oversized paragraph at the nearest newline or
//!    space before the limit.
//! 5. Prefix every chunk after the first with the last `overlap_chars` of
//!    its predecessor, starting on a word boundary.

use crate::models::{keys, DocumentChunk, SourceDocument};

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split a document into metadata-tagged chunks.
pub fn chunk_document(
    doc: &SourceDocument,
    max_tokens: usize,
    overlap_tokens: usize,
) -> Vec<DocumentChunk> {
    let pieces = chunk_text(&doc.text, max_tokens, overlap_tokens);
    let total = pieces.len();

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            let mut chunk = DocumentChunk::new(content)
                .with_meta(keys::SOURCE, doc.source.as_str())
                .with_meta(keys::FILE_NAME, doc.file_name.as_str())
                .with_meta(keys::TYPE, doc.doc_type.as_str())
                .with_meta(keys::CHUNK_INDEX, i)
                .with_meta(keys::TOTAL_CHUNKS, total);
            if let Some(year) = doc.year {
                chunk = chunk.with_meta(keys::YEAR, year);
            }
            if let Some(company) = &doc.company {
                chunk = chunk.with_meta(keys::COMPANY, company.as_str());
            }
            if let Some(document_type) = &doc.document_type {
                chunk = chunk.with_meta(keys::DOCUMENT_TYPE, document_type.as_str());
            }
            chunk
        })
        .collect()
}

/// Split text into chunks on paragraph boundaries.
///
/// Whitespace-only text yields no chunks. Without overlap every chunk is at
/// most `max_tokens × 4` bytes; with overlap the carried prefix adds up to
/// `overlap_tokens × 4` more.
pub fn chunk_text(text: &str, max_tokens: usize, overlap_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN).max(1);
    let overlap_chars = overlap_tokens.saturating_mul(CHARS_PER_TOKEN);

    let base = split_paragraphs(text, max_chars);
    if overlap_chars == 0 || base.len() < 2 {
        return base;
    }

    let mut out = Vec::with_capacity(base.len());
    for (i, piece) in base.iter().enumerate() {
        if i == 0 {
            out.push(piece.clone());
            continue;
        }
        let tail = overlap_tail(&base[i - 1], overlap_chars);
        if tail.is_empty() {
            out.push(piece.clone());
        } else {
            out.push(format!("{} {}", tail, piece));
        }
    }
    out
}

fn split_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_buf = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current_buf.is_empty() {
            chunks.push(std::mem::take(&mut current_buf));
        }

        if trimmed.len() > max_chars {
            hard_split(trimmed, max_chars, &mut chunks);
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    if !current_buf.is_empty() {
        chunks.push(current_buf);
    }

    chunks
}

/// Split an oversized paragraph at newline/space boundaries.
fn hard_split(paragraph: &str, max_chars: usize, chunks: &mut Vec<String>) {
    let mut remaining = paragraph;
    while !remaining.is_empty() {
        let limit = snap_to_char_boundary(remaining, remaining.len().min(max_chars));
        let split_at = if limit < remaining.len() {
            remaining[..limit]
                .rfind('\n')
                .or_else(|| remaining[..limit].rfind(' '))
                .map(|pos| pos + 1)
                .unwrap_or(limit)
        } else {
            limit
        };
        // Always make progress, even when one char is wider than the limit.
        let split_at = if split_at == 0 {
            remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len())
        } else {
            split_at
        };

        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        remaining = &remaining[split_at..];
    }
}

/// Last `max_chars` bytes of `text`, trimmed forward to a word start.
fn overlap_tail(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        return text;
    }
    let mut start = text.len() - max_chars;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    let tail = &text[start..];
    let at_word_start =
        text[..start].ends_with(char::is_whitespace) || tail.starts_with(char::is_whitespace);
    if at_word_start {
        return tail.trim_start();
    }
    match tail.find(char::is_whitespace) {
        Some(pos) => tail[pos..].trim_start(),
        None => "",
    }
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// First standalone four-digit year in a file name, e.g. `2021ltr.pdf` → 2021.
pub fn infer_year(file_name: &str) -> Option<i64> {
    let bytes = file_name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i - start == 4 {
            let year: i64 = file_name[start..i].parse().ok()?;
            if (1950..=2100).contains(&year) {
                return Some(year);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> SourceDocument {
        SourceDocument {
            source: "letters/2021ltr.pdf".to_string(),
            file_name: "2021ltr.pdf".to_string(),
            doc_type: "pdf".to_string(),
            text: text.to_string(),
            year: Some(2021),
            company: Some("Berkshire Hathaway".to_string()),
            document_type: Some("shareholder_letter".to_string()),
        }
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 700, 0);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_blank_text_has_no_chunks() {
        assert!(chunk_text("", 700, 50).is_empty());
        assert!(chunk_text(" \n\n \n", 700, 50).is_empty());
    }

    #[test]
    fn test_paragraphs_exceeding_limit_split() {
        let text = "This is paragraph one.\n\nThis is paragraph two.\n\nThis is paragraph three.";
        let chunks = chunk_text(text, 6, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1], "This is paragraph two.");
    }

    #[test]
    fn test_hard_split_respects_limit_and_utf8() {
        let text = "┌──────────────────┐ │ Hello world      │ └──────────────────┘";
        let chunks = chunk_text(text, 3, 0);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.len() <= 12, "chunk too long: {:?}", c);
        }
    }

    #[test]
    fn test_overlap_carries_previous_tail() {
        let text = "alpha beta gamma delta\n\nepsilon zeta eta theta";
        let chunks = chunk_text(text, 6, 3);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "alpha beta gamma delta");
        assert!(chunks[1].starts_with("gamma delta "), "got {:?}", chunks[1]);
        assert!(chunks[1].ends_with("epsilon zeta eta theta"));
    }

    #[test]
    fn test_overlap_tail_starts_on_word() {
        assert_eq!(overlap_tail("one two three", 7), "three");
        assert_eq!(overlap_tail("one two three", 100), "one two three");
        assert_eq!(overlap_tail("abcdefghij", 4), "");
    }

    #[test]
    fn test_chunk_document_metadata() {
        let text = (0..20)
            .map(|i| format!("Paragraph number {} about insurance float.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_document(&doc(&text), 30, 5);
        let total = chunks.len();
        assert!(total > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index(), Some(i as i64));
            assert_eq!(c.metadata[keys::TOTAL_CHUNKS], total);
            assert_eq!(c.year(), Some(2021));
            assert_eq!(c.metadata[keys::COMPANY], "Berkshire Hathaway");
            assert_eq!(c.metadata[keys::DOCUMENT_TYPE], "shareholder_letter");
            assert_eq!(c.metadata[keys::TYPE], "pdf");
            assert_eq!(c.file_name(), Some("2021ltr.pdf"));
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        assert_eq!(chunk_text(text, 2, 1), chunk_text(text, 2, 1));
    }

    #[test]
    fn test_huge_token_limits_do_not_overflow() {
        let text = "Alpha\n\nBeta";
        assert_eq!(chunk_text(text, usize::MAX, usize::MAX / 2), vec!["Alpha\n\nBeta"]);

        let pieces = chunk_text(text, 1, usize::MAX);
        assert!(pieces.len() >= 2);
        assert!(pieces.iter().all(|p| p.ends_with(|c: char| c.is_alphabetic())));
    }

    #[test]
    fn test_infer_year() {
        assert_eq!(infer_year("2021ltr.pdf"), Some(2021));
        assert_eq!(infer_year("letter-1987.pdf"), Some(1987));
        assert_eq!(infer_year("berkshire_ltr_12345.pdf"), None);
        assert_eq!(infer_year("notes.txt"), None);
        assert_eq!(infer_year("v2_1999_final.pdf"), Some(1999));
    }
}
