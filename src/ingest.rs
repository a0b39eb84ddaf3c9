//! Corpus ingestion: scan → extract → chunk → embed → persist.
//!
//! Walks `[corpus].root`, keeps files matching the include globs, extracts
//! their text, chunks it, and replaces the index with the result through
//! [`VectorStore::rebuild`], so repeated runs do not duplicate the corpus.
//! [`ingest_file`] appends a single file instead. Files that fail
//! extraction or contain no text are skipped with a warning.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::chunk::{chunk_document, infer_year};
use crate::config::{ChunkingConfig, CorpusConfig};
use crate::extract::{content_type_for, doc_type_for, extract_text};
use crate::models::{DocumentChunk, SourceDocument};
use crate::store::VectorStore;

/// A corpus file selected for ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusFile {
    pub path: PathBuf,
    /// Path relative to the corpus root, `/`-separated.
    pub relative: String,
}

/// Counts reported after an ingest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub files_seen: usize,
    pub files_skipped: usize,
    pub chunks: usize,
    pub total_records: usize,
}

/// List corpus files in deterministic (relative path) order.
pub fn scan_corpus(corpus: &CorpusConfig) -> Result<Vec<CorpusFile>> {
    let root = &corpus.root;
    if !root.exists() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let include_set = build_globset(&corpus.include_globs)?;
    let mut excludes = vec!["**/.git/**".to_string()];
    excludes.extend(corpus.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(corpus.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        if exclude_set.is_match(&relative) || !include_set.is_match(&relative) {
            continue;
        }

        files.push(CorpusFile {
            path: path.to_path_buf(),
            relative,
        });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

/// Read and extract one file into a [`SourceDocument`].
///
/// Returns `Ok(None)` for files that should be skipped (unsupported type,
/// extraction failure, no text).
pub fn load_document(file: &CorpusFile, corpus: &CorpusConfig) -> Result<Option<SourceDocument>> {
    let Some(content_type) = content_type_for(&file.path) else {
        tracing::warn!(file = %file.relative, "unsupported file type, skipping");
        return Ok(None);
    };

    let bytes = std::fs::read(&file.path)
        .with_context(|| format!("Failed to read {}", file.path.display()))?;

    let text = match extract_text(&bytes, content_type) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(file = %file.relative, error = %e, "extraction failed, skipping");
            return Ok(None);
        }
    };
    if text.trim().is_empty() {
        tracing::warn!(file = %file.relative, "no text extracted, skipping");
        return Ok(None);
    }

    let file_name = file
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.relative.clone());

    Ok(Some(SourceDocument {
        source: file.relative.clone(),
        year: infer_year(&file_name),
        file_name,
        doc_type: doc_type_for(content_type).to_string(),
        text,
        company: corpus.company.clone(),
        document_type: corpus.document_type.clone(),
    }))
}

/// Extract and chunk every corpus file without embedding anything.
pub fn prepare_chunks(
    corpus: &CorpusConfig,
    chunking: &ChunkingConfig,
) -> Result<(Vec<DocumentChunk>, IngestReport)> {
    let files = scan_corpus(corpus)?;
    let mut report = IngestReport {
        files_seen: files.len(),
        ..Default::default()
    };

    let mut chunks = Vec::new();
    for file in &files {
        match load_document(file, corpus)? {
            Some(doc) => {
                let doc_chunks =
                    chunk_document(&doc, chunking.max_tokens, chunking.overlap_tokens);
                tracing::debug!(file = %file.relative, chunks = doc_chunks.len(), "chunked");
                chunks.extend(doc_chunks);
            }
            None => report.files_skipped += 1,
        }
    }
    report.chunks = chunks.len();
    Ok((chunks, report))
}

/// Rebuild `store` from the whole corpus, replacing what it held.
pub async fn ingest_corpus(
    store: &mut VectorStore,
    corpus: &CorpusConfig,
    chunking: &ChunkingConfig,
) -> Result<IngestReport> {
    let (chunks, mut report) = prepare_chunks(corpus, chunking)?;
    store.rebuild(chunks).await?;
    report.total_records = store.len();
    Ok(report)
}

/// Append a single file to `store`, outside the configured corpus walk.
pub async fn ingest_file(
    store: &mut VectorStore,
    path: &Path,
    corpus: &CorpusConfig,
    chunking: &ChunkingConfig,
) -> Result<IngestReport> {
    let file = CorpusFile {
        path: path.to_path_buf(),
        relative: path.to_string_lossy().replace('\\', "/"),
    };
    let mut report = IngestReport {
        files_seen: 1,
        ..Default::default()
    };
    match load_document(&file, corpus)? {
        Some(doc) => {
            let chunks = chunk_document(&doc, chunking.max_tokens, chunking.overlap_tokens);
            report.chunks = chunks.len();
            store.add_documents(chunks).await?;
        }
        None => report.files_skipped = 1,
    }
    report.total_records = store.len();
    Ok(report)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
