//! Prompt context assembly.
//!
//! Turns retrieved chunks into a single block of text an LLM can cite,
//! each chunk labeled with its file name and year.

use crate::models::DocumentChunk;

/// Returned when retrieval produced nothing.
pub const NO_CONTEXT: &str = "No relevant context found.";

/// Join chunks into labeled blocks separated by blank lines.
///
/// ```text
/// [Source 1: 2021ltr.pdf (2021)]
/// <content>
///
/// [Source 2: 2019ltr.pdf (2019)]
/// <content>
/// ```
pub fn format_context(chunks: &[DocumentChunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT.to_string();
    }

    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("{}\n{}", source_label(i + 1, chunk), chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn source_label(n: usize, chunk: &DocumentChunk) -> String {
    let name = chunk
        .file_name()
        .or_else(|| chunk.source())
        .unwrap_or("unknown");
    match chunk.year() {
        Some(year) => format!("[Source {}: {} ({})]", n, name, year),
        None => format!("[Source {}: {}]", n, name),
    }
}
