//! The caller-facing vector store.
//!
//! [`VectorStore`] owns a [`VectorIndex`], an [`EmbeddingProvider`], and the
//! path of the snapshot file. It is constructed explicitly and passed to
//! whatever needs it (CLI command, HTTP state, tests); there is no global
//! instance.
//!
//! # Ingestion contract
//!
//! [`add_documents`](VectorStore::add_documents) embeds chunks in
//! sequential batches of `batch_size`. Each successful batch is appended
//! to the in-memory index right away. The snapshot is written once, after
//! the last batch: a failure part-way leaves earlier batches queryable in
//! memory but the file on disk untouched.
//!
//! [`rebuild`](VectorStore::rebuild) is the all-or-nothing variant used for
//! full-corpus ingestion: it replaces the index, or leaves it unchanged.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::{Result, StoreError};
use crate::index::VectorIndex;
use crate::models::{keys, DocumentChunk, MetadataFilter, ScoredChunk, VectorRecord};
use crate::persist;

/// Default number of chunks returned by a query.
pub const DEFAULT_TOP_K: usize = 5;

/// Default number of texts per embedding request.
pub const DEFAULT_BATCH_SIZE: usize = 50;

pub struct VectorStore {
    index: VectorIndex,
    provider: Arc<dyn EmbeddingProvider>,
    snapshot_path: PathBuf,
    batch_size: usize,
}

/// Summary of what the store holds.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub records: usize,
    pub dims: Option<usize>,
    pub sources: usize,
    /// Record counts per `year` metadata value; records without one are not counted.
    pub by_year: BTreeMap<i64, usize>,
}

impl VectorStore {
    /// Open a store backed by `snapshot_path`.
    ///
    /// A valid snapshot pre-populates the index; a missing or unreadable one
    /// leaves it empty.
    pub async fn open(
        provider: Arc<dyn EmbeddingProvider>,
        snapshot_path: impl Into<PathBuf>,
        batch_size: usize,
    ) -> Self {
        let snapshot_path = snapshot_path.into();
        let index = persist::load(&snapshot_path).await.unwrap_or_default();
        Self {
            index,
            provider,
            snapshot_path,
            batch_size: batch_size.max(1),
        }
    }

    /// Open a store using the `[store]` and `[embedding]` sections of `config`.
    pub async fn from_config(provider: Arc<dyn EmbeddingProvider>, config: &Config) -> Self {
        Self::open(provider, &config.store.path, config.embedding.batch_size).await
    }

    /// Open a store with the provider named by `[embedding].provider`.
    pub async fn open_configured(config: &Config) -> anyhow::Result<Self> {
        let provider = create_provider(&config.embedding)?;
        Ok(Self::from_config(provider, config).await)
    }

    /// Embed and index `chunks`, then persist the whole index.
    ///
    /// Chunks without a `chunkIndex` get their position in `chunks`.
    pub async fn add_documents(&mut self, mut chunks: Vec<DocumentChunk>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        for (position, chunk) in chunks.iter_mut().enumerate() {
            chunk
                .metadata
                .entry(keys::CHUNK_INDEX)
                .or_insert_with(|| Value::from(position));
        }

        let total_batches = chunks.len().div_ceil(self.batch_size);
        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self
                .provider
                .embed_many(&texts)
                .await
                .map_err(StoreError::Provider)?;

            if vectors.len() != batch.len() {
                return Err(StoreError::Provider(anyhow::anyhow!(
                    "provider returned {} embeddings for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            self.check_dims(&vectors)?;

            self.index.insert(
                batch
                    .iter()
                    .cloned()
                    .zip(vectors)
                    .map(|(chunk, embedding)| VectorRecord::new(chunk, embedding)),
            );
            tracing::debug!(
                batch = batch_no + 1,
                of = total_batches,
                size = batch.len(),
                "embedded batch"
            );
        }

        persist::save(&self.index, &self.snapshot_path).await?;
        tracing::info!(
            added = chunks.len(),
            total = self.index.len(),
            "documents added"
        );
        Ok(())
    }

    /// Replace the whole index with `chunks`.
    ///
    /// On failure the previous in-memory index is restored and the snapshot
    /// on disk is left as it was.
    pub async fn rebuild(&mut self, chunks: Vec<DocumentChunk>) -> Result<()> {
        if chunks.is_empty() {
            return self.clear_index().await;
        }
        let previous = std::mem::take(&mut self.index);
        if let Err(e) = self.add_documents(chunks).await {
            self.index = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Return the `top_k` chunks most similar to `text`.
    pub async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<DocumentChunk>> {
        Ok(self
            .search(text, top_k, filter)
            .await?
            .into_iter()
            .map(|scored| scored.chunk)
            .collect())
    }

    /// [`query`](Self::query) restricted to chunks whose `year` equals `year`.
    pub async fn query_by_year(
        &self,
        text: &str,
        year: i64,
        top_k: usize,
    ) -> Result<Vec<DocumentChunk>> {
        self.query(text, top_k, Some(&MetadataFilter::year(year)))
            .await
    }

    /// Like [`query`](Self::query) but keeps the similarity scores.
    ///
    /// A query vector whose length differs from the indexed vectors is a
    /// [`StoreError::DimensionMismatch`].
    pub async fn search(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        let query_vec = self
            .provider
            .embed_one(text)
            .await
            .map_err(StoreError::Provider)?;
        if let Some(expected) = self.index.dims() {
            if query_vec.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: query_vec.len(),
                });
            }
        }
        Ok(self.index.search(&query_vec, top_k, filter))
    }

    /// Empty the index and delete the snapshot file.
    pub async fn clear_index(&mut self) -> Result<()> {
        self.index.clear();
        persist::remove(&self.snapshot_path).await?;
        tracing::info!(path = %self.snapshot_path.display(), "index cleared");
        Ok(())
    }

    pub fn stats(&self) -> StoreStats {
        let mut by_year = BTreeMap::new();
        let mut sources = BTreeSet::new();
        for record in self.index.records() {
            if let Some(year) = record.chunk.year() {
                *by_year.entry(year).or_insert(0) += 1;
            }
            if let Some(source) = record.chunk.source() {
                sources.insert(source);
            }
        }
        StoreStats {
            records: self.index.len(),
            dims: self.index.dims(),
            sources: sources.len(),
            by_year,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn check_dims(&self, vectors: &[Vec<f32>]) -> Result<()> {
        let expected = match self.index.dims() {
            Some(d) => d,
            None => match vectors.first() {
                Some(v) => v.len(),
                None => return Ok(()),
            },
        };
        match vectors.iter().find(|v| v.len() != expected) {
            Some(v) => Err(StoreError::DimensionMismatch {
                expected,
                actual: v.len(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Embeds text as `[len, vowels, 1.0]` and records every batch size.
    #[derive(Default)]
    struct CountingProvider {
        calls: std::sync::Mutex<Vec<usize>>,
        fail_on_call: Option<usize>,
        seen: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed_many(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            let call = self.seen.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_call == Some(call) {
                bail!("rate limited");
            }
            self.calls.lock().unwrap().push(texts.len());
            Ok(texts
                .iter()
                .map(|t| {
                    let vowels = t.chars().filter(|c| "aeiou".contains(*c)).count();
                    vec![t.len() as f32, vowels as f32, 1.0]
                })
                .collect())
        }
    }

    /// Always returns 5-dim vectors.
    struct Wide;

    #[async_trait]
    impl EmbeddingProvider for Wide {
        fn model_name(&self) -> &str {
            "wide"
        }
        fn dims(&self) -> usize {
            5
        }
        async fn embed_many(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0; 5]).collect())
        }
    }

    fn chunks(n: usize) -> Vec<DocumentChunk> {
        (0..n)
            .map(|i| DocumentChunk::new(format!("chunk number {}", i)))
            .collect()
    }

    #[tokio::test]
    async fn test_batches_are_fixed_size() {
        let tmp = TempDir::new().unwrap();
        let provider = Arc::new(CountingProvider::default());
        let mut store = VectorStore::open(provider.clone(), tmp.path().join("s.json"), 50).await;

        store.add_documents(chunks(120)).await.unwrap();

        assert_eq!(*provider.calls.lock().unwrap(), vec![50, 50, 20]);
        assert_eq!(store.len(), 120);
    }

    #[tokio::test]
    async fn test_default_chunk_index_follows_input_order() {
        let tmp = TempDir::new().unwrap();
        let provider = Arc::new(CountingProvider::default());
        let mut store = VectorStore::open(provider, tmp.path().join("s.json"), 50).await;

        store.add_documents(chunks(3)).await.unwrap();

        let indices: Vec<Option<i64>> = store
            .index()
            .records()
            .iter()
            .map(|r| r.chunk.chunk_index())
            .collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn test_explicit_chunk_index_is_kept() {
        let tmp = TempDir::new().unwrap();
        let provider = Arc::new(CountingProvider::default());
        let mut store = VectorStore::open(provider, tmp.path().join("s.json"), 50).await;

        let input = vec![
            DocumentChunk::new("a").with_meta(keys::CHUNK_INDEX, 7),
            DocumentChunk::new("b"),
        ];
        store.add_documents(input).await.unwrap();

        let records = store.index().records();
        assert_eq!(records[0].chunk.chunk_index(), Some(7));
        assert_eq!(records[1].chunk.chunk_index(), Some(1));
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_memory_but_not_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("s.json");
        let provider = Arc::new(CountingProvider {
            fail_on_call: Some(1),
            ..Default::default()
        });
        let mut store = VectorStore::open(provider, &path, 2).await;

        let err = store.add_documents(chunks(5)).await.unwrap_err();

        assert!(matches!(err, StoreError::Provider(_)));
        assert_eq!(store.len(), 2);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_query_by_year_filters() {
        let tmp = TempDir::new().unwrap();
        let provider = Arc::new(CountingProvider::default());
        let mut store = VectorStore::open(provider, tmp.path().join("s.json"), 50).await;

        store
            .add_documents(vec![
                DocumentChunk::new("float").with_meta(keys::YEAR, 2020),
                DocumentChunk::new("float").with_meta(keys::YEAR, 2021),
            ])
            .await
            .unwrap();

        let hits = store.query_by_year("float", 2020, DEFAULT_TOP_K).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].year(), Some(2020));
    }

    #[tokio::test]
    async fn test_clear_index_removes_snapshot() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("s.json");
        let provider = Arc::new(CountingProvider::default());
        let mut store = VectorStore::open(provider, &path, 50).await;

        store.add_documents(chunks(4)).await.unwrap();
        assert!(path.exists());

        store.clear_index().await.unwrap();
        assert!(store.is_empty());
        assert!(!path.exists());
        assert!(store.query("chunk", 5, None).await.unwrap().is_empty());

        store.clear_index().await.unwrap();
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("s.json");
        let mut store = VectorStore::open(Arc::new(CountingProvider::default()), &path, 50).await;
        store.add_documents(chunks(1)).await.unwrap();

        let mut wide = VectorStore::open(Arc::new(Wide), &path, 50).await;
        assert_eq!(wide.len(), 1);
        let err = wide.add_documents(chunks(1)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 3,
                actual: 5
            }
        ));
    }

    #[tokio::test]
    async fn test_query_with_other_dims_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("s.json");
        let mut store = VectorStore::open(Arc::new(CountingProvider::default()), &path, 50).await;
        store.add_documents(chunks(2)).await.unwrap();

        let reopened = VectorStore::open(Arc::new(Wide), &path, 50).await;
        let err = reopened.search("zzz", 5, None).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 3,
                actual: 5
            }
        ));
        assert!(reopened.query("zzz", 5, None).await.is_err());
    }

    #[tokio::test]
    async fn test_unwritable_snapshot_keeps_records_in_memory() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        let path = blocker.join("s.json");
        let mut store = VectorStore::open(Arc::new(CountingProvider::default()), &path, 2).await;

        let err = store.add_documents(chunks(3)).await.unwrap_err();

        assert!(matches!(err, StoreError::PersistenceWrite { .. }));
        assert_eq!(store.len(), 3);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_rebuild_replaces_index() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("s.json");
        let mut store = VectorStore::open(Arc::new(CountingProvider::default()), &path, 50).await;

        store.rebuild(chunks(4)).await.unwrap();
        store.rebuild(chunks(4)).await.unwrap();
        assert_eq!(store.len(), 4);

        let reopened = VectorStore::open(Arc::new(CountingProvider::default()), &path, 50).await;
        assert_eq!(reopened.len(), 4);
    }

    #[tokio::test]
    async fn test_failed_rebuild_restores_previous_index() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("s.json");
        let provider = Arc::new(CountingProvider {
            fail_on_call: Some(2),
            ..Default::default()
        });
        let mut store = VectorStore::open(provider, &path, 2).await;
        store.add_documents(chunks(1)).await.unwrap();

        // Call 1 succeeds, call 2 fails.
        assert!(store.rebuild(chunks(4)).await.is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.index().records()[0].chunk.content, "chunk number 0");

        let reopened = VectorStore::open(Arc::new(CountingProvider::default()), &path, 50).await;
        assert_eq!(reopened.len(), 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let tmp = TempDir::new().unwrap();
        let provider = Arc::new(CountingProvider::default());
        let mut store = VectorStore::open(provider, tmp.path().join("s.json"), 50).await;
        store
            .add_documents(vec![
                DocumentChunk::new("a")
                    .with_meta(keys::YEAR, 2020)
                    .with_meta(keys::SOURCE, "letters/2020ltr.pdf"),
                DocumentChunk::new("b")
                    .with_meta(keys::YEAR, 2020)
                    .with_meta(keys::SOURCE, "letters/2020ltr.pdf"),
                DocumentChunk::new("c").with_meta(keys::SOURCE, "notes.txt"),
            ])
            .await
            .unwrap();

        let stats = store.stats();
        assert_eq!(stats.records, 3);
        assert_eq!(stats.dims, Some(3));
        assert_eq!(stats.sources, 2);
        assert_eq!(stats.by_year.get(&2020), Some(&2));
    }
}
