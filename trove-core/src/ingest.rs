use crate::sanitize::sanitize_metadata;
use crate::store::{IndexedEntry, VectorStore, VectorStoreError};
use crate::types::EmbeddingRecord;

/// Counters reported after an indexing pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestSummary {
    pub ingested: usize,
    pub skipped: usize,
}

/// Vector dimensionality inferred from the first record; the store
/// collection must be sized with it before ingestion.
pub fn infer_dimensions(records: &[EmbeddingRecord]) -> Option<usize> {
    records.first().map(|r| r.vector.len()).filter(|&d| d > 0)
}

/// Upsert embedding records into the store, sanitizing metadata first.
///
/// Records with an empty id or mismatched vector are logged and skipped;
/// store failures abort the stage.
pub fn ingest_records(
    records: &[EmbeddingRecord],
    store: &dyn VectorStore,
) -> Result<IngestSummary, VectorStoreError> {
    let Some(dimensions) = infer_dimensions(records) else {
        return Err(VectorStoreError::StorageError(
            "no embedding records with a non-empty vector to ingest".to_string(),
        ));
    };

    let mut summary = IngestSummary::default();
    for record in records {
        if record.id.is_empty() || record.vector.len() != dimensions {
            eprintln!(
                "skipping record '{}': missing id or vector dimension != {dimensions}",
                record.id
            );
            summary.skipped += 1;
            continue;
        }
        store.upsert(IndexedEntry {
            id: record.id.clone(),
            vector: record.vector.clone(),
            metadata: sanitize_metadata(&record.metadata),
        })?;
        summary.ingested += 1;
    }
    Ok(summary)
}
