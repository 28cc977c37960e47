pub mod sqlite;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur during vector store operations.
#[derive(Debug)]
pub enum VectorStoreError {
    /// A general storage failure (I/O, SQL, etc.).
    StorageError(String),
    /// Vector dimensionality does not match the collection's.
    DimensionMismatch { expected: usize, got: usize },
}

impl fmt::Display for VectorStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageError(msg) => write!(f, "storage error: {msg}"),
            Self::DimensionMismatch { expected, got } => {
                write!(f, "dimension mismatch: expected {expected}, got {got}")
            }
        }
    }
}

impl std::error::Error for VectorStoreError {}

/// A vector entry persisted in a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
}

/// A nearest-neighbor match with its cosine distance (lower is closer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub distance: f32,
    pub metadata: serde_json::Value,
}

/// Summary information about a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub collection: String,
    pub model_name: String,
    pub dimensions: usize,
    pub entry_count: usize,
}

/// Trait abstracting vector storage and nearest-neighbor search.
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite an entry keyed by its id.
    fn upsert(&self, entry: IndexedEntry) -> Result<(), VectorStoreError>;

    /// Return the `k` nearest entries by ascending cosine distance.
    fn search(&self, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>, VectorStoreError>;

    /// Fetch a single entry by id.
    fn get(&self, id: &str) -> Result<Option<IndexedEntry>, VectorStoreError>;

    /// Number of entries in the collection.
    fn count(&self) -> Result<usize, VectorStoreError>;

    fn stats(&self) -> Result<StoreStats, VectorStoreError>;

    /// Delete every entry in the collection.
    fn clear(&self) -> Result<(), VectorStoreError>;
}
