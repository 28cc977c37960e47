use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A product scraped from the site, as written to `products_metadata.json`.
///
/// Immutable once collected; the embedder and indexer only read it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    /// URL slug, unique across the crawl.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub price: Option<f64>,
    /// Image caption carried by the sitemap entry.
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    /// Flat attribute name to label map from the product API.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Composed full-text description fed to the text encoder.
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Local path of the downloaded image, when the download succeeded.
    #[serde(default)]
    pub image_path: Option<String>,
    pub source_url: String,
}

impl ProductRecord {
    /// Metadata snapshot stored alongside the fused vector.
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "title": self.title,
            "price": self.price,
            "caption": self.caption,
            "tags": self.tags,
            "sizes": self.sizes,
            "description": self.description,
            "image_url": self.image_url,
            "image_path": self.image_path,
            "source_url": self.source_url,
        })
    }
}

/// An `{id, vector, metadata}` triple, as written to
/// `products_metadata_with_embeddings.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
}

pub fn load_products(path: &Path) -> Result<Vec<ProductRecord>, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read '{}': {e}", path.display()))?;
    serde_json::from_str(&contents)
        .map_err(|e| format!("invalid product metadata in '{}': {e}", path.display()))
}

pub fn save_products(path: &Path, records: &[ProductRecord]) -> Result<(), String> {
    write_json(path, records)
}

pub fn load_embeddings(path: &Path) -> Result<Vec<EmbeddingRecord>, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read '{}': {e}", path.display()))?;
    serde_json::from_str(&contents)
        .map_err(|e| format!("invalid embedding records in '{}': {e}", path.display()))
}

pub fn save_embeddings(path: &Path, records: &[EmbeddingRecord]) -> Result<(), String> {
    write_json(path, records)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create '{}': {e}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("failed to serialize records: {e}"))?;
    std::fs::write(path, json).map_err(|e| format!("failed to write '{}': {e}", path.display()))
}
