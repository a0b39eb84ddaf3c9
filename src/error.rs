//! Error types for the vector store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by [`VectorStore`](crate::store::VectorStore).
///
/// A snapshot that exists but cannot be read is not an error here: the
/// store logs it and starts empty.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The embedding provider failed or returned a malformed batch.
    #[error("embedding provider error: {0:#}")]
    Provider(anyhow::Error),

    /// The snapshot could not be written.
    #[error("failed to write snapshot {}: {source}", path.display())]
    PersistenceWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An embedding's length differs from the vectors already indexed.
    #[error("embedding dimension mismatch: index holds {expected}-dim vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
