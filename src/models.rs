//! Core data models used throughout the pipeline.
//!
//! A [`DocumentChunk`] is the unit of retrieval: a span of text plus an open
//! metadata map. A [`VectorRecord`] binds a chunk to its embedding and is
//! what the [`VectorIndex`](crate::index::VectorIndex) stores and what the
//! snapshot file contains.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open metadata map attached to every chunk.
pub type Metadata = Map<String, Value>;

/// Conventional metadata keys written by the chunker.
pub mod keys {
    pub const SOURCE: &str = "source";
    pub const FILE_NAME: &str = "fileName";
    pub const TYPE: &str = "type";
    pub const CHUNK_INDEX: &str = "chunkIndex";
    pub const TOTAL_CHUNKS: &str = "totalChunks";
    pub const YEAR: &str = "year";
    pub const COMPANY: &str = "company";
    pub const DOCUMENT_TYPE: &str = "documentType";
}

/// A bounded span of a source document's text with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl DocumentChunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Builder-style metadata insertion.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn chunk_index(&self) -> Option<i64> {
        self.metadata.get(keys::CHUNK_INDEX).and_then(Value::as_i64)
    }

    pub fn year(&self) -> Option<i64> {
        self.metadata.get(keys::YEAR).and_then(Value::as_i64)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.metadata.get(keys::FILE_NAME).and_then(Value::as_str)
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(keys::SOURCE).and_then(Value::as_str)
    }
}

/// Text extracted from one corpus file, ready to be chunked.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// Path of the file relative to the corpus root.
    pub source: String,
    pub file_name: String,
    /// `"pdf"` or `"text"`.
    pub doc_type: String,
    pub text: String,
    pub year: Option<i64>,
    pub company: Option<String>,
    pub document_type: Option<String>,
}

/// A chunk bound to its embedding vector.
///
/// Serialized flat (`content`, `metadata`, `embedding`) so the snapshot
/// file is an array of plain objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    #[serde(flatten)]
    pub chunk: DocumentChunk,
    pub embedding: Vec<f32>,
}

impl VectorRecord {
    pub fn new(chunk: DocumentChunk, embedding: Vec<f32>) -> Self {
        Self { chunk, embedding }
    }
}

/// A chunk returned from a similarity search together with its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    #[serde(flatten)]
    pub chunk: DocumentChunk,
    /// Cosine similarity to the query in `[-1.0, 1.0]`.
    pub score: f64,
}

/// Exact-match metadata filter.
///
/// A record passes when, for every `(key, value)` pair, its metadata holds
/// `key` with a value strictly equal to `value`. Numbers compare by JSON
/// representation, so `2020` and `2020.0` are different values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataFilter(Metadata);

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality constraint.
    pub fn equals(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Filter on the conventional `year` key.
    pub fn year(year: i64) -> Self {
        Self::new().equals(keys::YEAR, year)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.0
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }
}

impl From<Metadata> for MetadataFilter {
    fn from(map: Metadata) -> Self {
        Self(map)
    }
}
