use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use super::{IndexedEntry, QueryMatch, StoreStats, VectorStore, VectorStoreError};

/// SQLite-backed vector store.
///
/// Each collection lives in its own database file under the store
/// directory, with embeddings stored as little-endian f32 blobs. Search
/// is a brute-force cosine-distance scan computed in Rust.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    collection: String,
    model_name: String,
    dimensions: usize,
}

impl SqliteVectorStore {
    /// Open (or create) the collection for writing.
    ///
    /// Existing rows must match `model_name` and `dimensions`; a mismatch
    /// is fatal since there is no migration path — clear the store
    /// directory to rebuild.
    pub fn open(
        dir: &Path,
        collection: &str,
        model_name: &str,
        dimensions: usize,
    ) -> Result<Self, VectorStoreError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            VectorStoreError::StorageError(format!(
                "failed to create store directory '{}': {e}",
                dir.display()
            ))
        })?;
        let conn = Connection::open(collection_path(dir, collection)).map_err(|e| {
            VectorStoreError::StorageError(format!("failed to open database: {e}"))
        })?;
        let store = Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
            model_name: model_name.to_string(),
            dimensions,
        };
        store.migrate()?;
        store.check_existing_rows()?;
        Ok(store)
    }

    /// Open an existing collection for reading, adopting the model name
    /// and dimensionality recorded in its rows.
    ///
    /// Fails when the collection does not exist or holds no entries, as
    /// the query dimensionality cannot be determined.
    pub fn open_existing(dir: &Path, collection: &str) -> Result<Self, VectorStoreError> {
        let path = collection_path(dir, collection);
        if !path.exists() {
            return Err(VectorStoreError::StorageError(format!(
                "collection '{collection}' not found at '{}'",
                path.display()
            )));
        }
        let conn = Connection::open(&path).map_err(|e| {
            VectorStoreError::StorageError(format!("failed to open database: {e}"))
        })?;

        let first: Option<(String, i64)> = conn
            .query_row(
                "SELECT model_name, dimensions FROM vectors LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| {
                VectorStoreError::StorageError(format!("failed to inspect collection: {e}"))
            })?;

        let Some((model_name, dimensions)) = first else {
            return Err(VectorStoreError::StorageError(format!(
                "collection '{collection}' is empty; cannot determine its dimensionality"
            )));
        };

        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
            model_name,
            dimensions: dimensions as usize,
        })
    }

    /// Open an in-memory collection (for testing).
    pub fn open_in_memory(
        collection: &str,
        model_name: &str,
        dimensions: usize,
    ) -> Result<Self, VectorStoreError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            VectorStoreError::StorageError(format!("failed to open in-memory db: {e}"))
        })?;
        let store = Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
            model_name: model_name.to_string(),
            dimensions,
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), VectorStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS vectors (
                id TEXT PRIMARY KEY,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL,
                model_name TEXT NOT NULL,
                dimensions INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| VectorStoreError::StorageError(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Reject opening for write when existing rows disagree with the
    /// requested model or dimensionality.
    fn check_existing_rows(&self) -> Result<(), VectorStoreError> {
        let conn = self.conn.lock().unwrap();
        let first: Option<(String, i64)> = conn
            .query_row(
                "SELECT model_name, dimensions FROM vectors LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| {
                VectorStoreError::StorageError(format!("failed to inspect collection: {e}"))
            })?;

        if let Some((stored_model, stored_dims)) = first {
            if stored_dims as usize != self.dimensions {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: self.dimensions,
                    got: stored_dims as usize,
                });
            }
            if stored_model != self.model_name {
                return Err(VectorStoreError::StorageError(format!(
                    "collection '{}' was built with model '{stored_model}' but '{}' was requested; clear the store directory to rebuild",
                    self.collection, self.model_name
                )));
            }
        }
        Ok(())
    }
}

fn collection_path(dir: &Path, collection: &str) -> PathBuf {
    dir.join(format!("{collection}.db"))
}

/// Encode a `Vec<f32>` as a little-endian byte blob.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &v in embedding {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a little-endian byte blob back into `Vec<f32>`.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine distance between two vectors (1 - cosine similarity).
/// A zero-norm operand yields the neutral distance 1.0.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

impl VectorStore for SqliteVectorStore {
    fn upsert(&self, entry: IndexedEntry) -> Result<(), VectorStoreError> {
        if entry.vector.len() != self.dimensions {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimensions,
                got: entry.vector.len(),
            });
        }

        let conn = self.conn.lock().unwrap();
        let blob = embedding_to_bytes(&entry.vector);
        let metadata_json = serde_json::to_string(&entry.metadata).map_err(|e| {
            VectorStoreError::StorageError(format!("failed to serialize metadata: {e}"))
        })?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT OR REPLACE INTO vectors (id, embedding, metadata, model_name, dimensions, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.id,
                blob,
                metadata_json,
                self.model_name,
                self.dimensions as i64,
                now,
            ],
        )
        .map_err(|e| VectorStoreError::StorageError(format!("failed to upsert entry: {e}")))?;

        Ok(())
    }

    fn search(&self, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>, VectorStoreError> {
        if vector.len() != self.dimensions {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimensions,
                got: vector.len(),
            });
        }

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, embedding, metadata FROM vectors")
            .map_err(|e| {
                VectorStoreError::StorageError(format!("failed to prepare search: {e}"))
            })?;

        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                let metadata_json: String = row.get(2)?;
                Ok((id, blob, metadata_json))
            })
            .map_err(|e| VectorStoreError::StorageError(format!("search query failed: {e}")))?;

        let mut scored: Vec<QueryMatch> = Vec::new();
        for row in rows {
            let (id, blob, metadata_json) = row
                .map_err(|e| VectorStoreError::StorageError(format!("failed to read row: {e}")))?;
            let stored = bytes_to_embedding(&blob);
            let distance = cosine_distance(vector, &stored);
            let metadata: serde_json::Value = serde_json::from_str(&metadata_json)
                .map_err(|e| {
                    VectorStoreError::StorageError(format!("invalid metadata JSON: {e}"))
                })?;
            scored.push(QueryMatch {
                id,
                distance,
                metadata,
            });
        }

        // Sort by ascending distance.
        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }

    fn get(&self, id: &str) -> Result<Option<IndexedEntry>, VectorStoreError> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(Vec<u8>, String)> = conn
            .query_row(
                "SELECT embedding, metadata FROM vectors WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| VectorStoreError::StorageError(format!("failed to get entry: {e}")))?;

        let Some((blob, metadata_json)) = row else {
            return Ok(None);
        };
        let metadata: serde_json::Value = serde_json::from_str(&metadata_json)
            .map_err(|e| VectorStoreError::StorageError(format!("invalid metadata JSON: {e}")))?;

        Ok(Some(IndexedEntry {
            id: id.to_string(),
            vector: bytes_to_embedding(&blob),
            metadata,
        }))
    }

    fn count(&self) -> Result<usize, VectorStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM vectors", [], |row| row.get(0))
            .map_err(|e| VectorStoreError::StorageError(format!("failed to count entries: {e}")))
    }

    fn stats(&self) -> Result<StoreStats, VectorStoreError> {
        Ok(StoreStats {
            collection: self.collection.clone(),
            model_name: self.model_name.clone(),
            dimensions: self.dimensions,
            entry_count: self.count()?,
        })
    }

    fn clear(&self) -> Result<(), VectorStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM vectors", [])
            .map_err(|e| VectorStoreError::StorageError(format!("failed to clear store: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> SqliteVectorStore {
        SqliteVectorStore::open_in_memory("products", "test-model", 3).unwrap()
    }

    fn make_entry(id: &str, vector: Vec<f32>) -> IndexedEntry {
        IndexedEntry {
            id: id.to_string(),
            vector,
            metadata: serde_json::json!({ "title": id }),
        }
    }

    fn temp_store_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("trove-store-{name}-{}", std::process::id()))
    }

    #[test]
    fn upsert_and_search_returns_same_entry() {
        let store = test_store();
        store.upsert(make_entry("e1", vec![1.0, 0.0, 0.0])).unwrap();

        let results = store.search(&[1.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "e1");
        assert!(
            results[0].distance < 1e-3,
            "identical vectors should be at distance ~0, got {}",
            results[0].distance
        );
    }

    #[test]
    fn search_orders_by_ascending_distance() {
        let store = test_store();
        store.upsert(make_entry("exact", vec![1.0, 0.0, 0.0])).unwrap();
        store.upsert(make_entry("close", vec![0.9, 0.1, 0.0])).unwrap();
        store.upsert(make_entry("medium", vec![0.5, 0.5, 0.0])).unwrap();
        store.upsert(make_entry("far", vec![0.0, 0.0, 1.0])).unwrap();
        store.upsert(make_entry("opposite", vec![-1.0, 0.0, 0.0])).unwrap();

        let results = store.search(&[1.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].id, "exact");
        assert_eq!(results[1].id, "close");
        assert_eq!(results[2].id, "medium");
        for pair in results.windows(2) {
            assert!(
                pair[0].distance <= pair[1].distance,
                "results should be ordered by ascending distance"
            );
        }
    }

    #[test]
    fn search_caps_results_at_k() {
        let store = test_store();
        for i in 0..5 {
            let mut v = vec![0.0; 3];
            v[i % 3] = 1.0;
            store.upsert(make_entry(&format!("e{i}"), v)).unwrap();
        }

        let results = store.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn reupserting_an_id_overwrites_without_duplicating() {
        let store = test_store();
        store.upsert(make_entry("p1", vec![1.0, 0.0, 0.0])).unwrap();
        store.upsert(make_entry("p1", vec![0.0, 1.0, 0.0])).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let entry = store.get("p1").unwrap().unwrap();
        assert_eq!(entry.vector, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn wrong_dimension_returns_error() {
        let store = test_store();
        let err = store.upsert(make_entry("bad", vec![1.0, 0.0])).unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 3,
                got: 2
            }
        ));
    }

    #[test]
    fn metadata_survives_the_round_trip() {
        let store = test_store();
        let entry = IndexedEntry {
            id: "m1".to_string(),
            vector: vec![1.0, 0.0, 0.0],
            metadata: serde_json::json!({
                "title": "Blue Sharara",
                "price": 4999.0,
                "sizes": "[\"S\",\"M\"]"
            }),
        };
        store.upsert(entry).unwrap();

        let results = store.search(&[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(results[0].metadata["title"], "Blue Sharara");
        assert_eq!(results[0].metadata["price"], 4999.0);
    }

    #[test]
    fn search_empty_store_returns_empty() {
        let store = test_store();
        assert!(store.search(&[1.0, 0.0, 0.0], 10).unwrap().is_empty());
    }

    #[test]
    fn clear_empties_the_collection() {
        let store = test_store();
        store.upsert(make_entry("c1", vec![1.0, 0.0, 0.0])).unwrap();
        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn stats_reports_collection_info() {
        let store = test_store();
        store.upsert(make_entry("s1", vec![1.0, 0.0, 0.0])).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.collection, "products");
        assert_eq!(stats.model_name, "test-model");
        assert_eq!(stats.dimensions, 3);
        assert_eq!(stats.entry_count, 1);
    }

    // ── Persistence across reopen ───────────────────────────────────────

    #[test]
    fn entries_survive_store_reopen() {
        let dir = temp_store_dir("reopen");
        let _ = std::fs::remove_dir_all(&dir);

        {
            let store = SqliteVectorStore::open(&dir, "products", "test-model", 3).unwrap();
            store.upsert(make_entry("e1", vec![1.0, 0.0, 0.0])).unwrap();
        }

        let store = SqliteVectorStore::open(&dir, "products", "test-model", 3).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        let entry = store.get("e1").unwrap().unwrap();
        assert_eq!(entry.vector, vec![1.0, 0.0, 0.0]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn open_rejects_dimension_mismatch() {
        let dir = temp_store_dir("mismatch");
        let _ = std::fs::remove_dir_all(&dir);

        {
            let store = SqliteVectorStore::open(&dir, "products", "test-model", 3).unwrap();
            store.upsert(make_entry("e1", vec![1.0, 0.0, 0.0])).unwrap();
        }

        let err = SqliteVectorStore::open(&dir, "products", "test-model", 5).unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 5,
                got: 3
            }
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn open_rejects_model_mismatch() {
        let dir = temp_store_dir("model-mismatch");
        let _ = std::fs::remove_dir_all(&dir);

        {
            let store = SqliteVectorStore::open(&dir, "products", "model-a", 3).unwrap();
            store.upsert(make_entry("e1", vec![1.0, 0.0, 0.0])).unwrap();
        }

        let err = SqliteVectorStore::open(&dir, "products", "model-b", 3).unwrap_err();
        match err {
            VectorStoreError::StorageError(msg) => {
                assert!(msg.contains("model-a"), "{msg}");
                assert!(msg.contains("model-b"), "{msg}");
            }
            other => panic!("expected StorageError, got {other:?}"),
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn open_existing_adopts_stored_dimensions() {
        let dir = temp_store_dir("existing");
        let _ = std::fs::remove_dir_all(&dir);

        {
            let store = SqliteVectorStore::open(&dir, "products", "test-model", 3).unwrap();
            store.upsert(make_entry("e1", vec![1.0, 0.0, 0.0])).unwrap();
        }

        let store = SqliteVectorStore::open_existing(&dir, "products").unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.dimensions, 3);
        assert_eq!(stats.model_name, "test-model");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn open_existing_fails_on_missing_collection() {
        let dir = temp_store_dir("missing");
        let _ = std::fs::remove_dir_all(&dir);

        let err = SqliteVectorStore::open_existing(&dir, "products").unwrap_err();
        match err {
            VectorStoreError::StorageError(msg) => {
                assert!(msg.contains("not found"), "{msg}")
            }
            other => panic!("expected StorageError, got {other:?}"),
        }
    }

    #[test]
    fn open_existing_fails_on_empty_collection() {
        let dir = temp_store_dir("empty");
        let _ = std::fs::remove_dir_all(&dir);

        {
            let _store = SqliteVectorStore::open(&dir, "products", "test-model", 3).unwrap();
        }

        let err = SqliteVectorStore::open_existing(&dir, "products").unwrap_err();
        match err {
            VectorStoreError::StorageError(msg) => {
                assert!(msg.contains("empty"), "{msg}")
            }
            other => panic!("expected StorageError, got {other:?}"),
        }

        std::fs::remove_dir_all(&dir).ok();
    }
}
