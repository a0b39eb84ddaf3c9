//! In-memory vector index.
//!
//! An append-only `Vec` of [`VectorRecord`]s searched by brute-force cosine
//! similarity. Insertion order is kept and used as the tie-break when two
//! records score the same, so results are reproducible.
//!
//! # Query Algorithm
//!
//! 1. Embed the query text (one `embed_one` call).
//! 2. Drop records whose metadata fails the [`MetadataFilter`].
//! 3. Score survivors with [`cosine_similarity`].
//! 4. Stable sort by score, descending.
//! 5. Truncate to `k`.
//!
//! All records are expected to share one embedding dimensionality; the
//! [`VectorStore`](crate::store::VectorStore) rejects mismatched inserts.

use anyhow::{bail, Result};

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::models::{DocumentChunk, MetadataFilter, ScoredChunk, VectorRecord};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    records: Vec<VectorRecord>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<VectorRecord>) -> Self {
        Self { records }
    }

    /// Append records, preserving their relative order.
    pub fn insert(&mut self, records: impl IntoIterator<Item = VectorRecord>) {
        self.records.extend(records);
    }

    /// Embed `query_text` and return the `k` most similar chunks.
    ///
    /// Fails if the embedding provider fails or returns a vector whose
    /// length differs from the indexed ones. Empty index, no filter match,
    /// and `k == 0` all yield an empty list.
    pub async fn query(
        &self,
        provider: &dyn EmbeddingProvider,
        query_text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<DocumentChunk>> {
        let query_vec = provider.embed_one(query_text).await?;
        if let Some(dims) = self.dims() {
            if query_vec.len() != dims {
                bail!(
                    "query embedding has {} dims, index holds {}-dim vectors",
                    query_vec.len(),
                    dims
                );
            }
        }
        Ok(self
            .search(&query_vec, k, filter)
            .into_iter()
            .map(|scored| scored.chunk)
            .collect())
    }

    /// Rank records against a precomputed query vector.
    pub fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<ScoredChunk> {
        if k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &VectorRecord)> = self
            .records
            .iter()
            .filter(|r| filter.map_or(true, |f| f.matches(&r.chunk.metadata)))
            .map(|r| (cosine_similarity(query_vec, &r.embedding), r))
            .collect();

        // `sort_by` is stable: equal scores keep insertion order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(score, r)| ScoredChunk {
                chunk: r.chunk.clone(),
                score,
            })
            .collect()
    }

    /// Discard every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dimensionality of the indexed vectors, or `None` when empty.
    pub fn dims(&self) -> Option<usize> {
        self.records.first().map(|r| r.embedding.len())
    }

    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }
}
