use std::path::Path;

use crate::config::MissingImagePolicy;
use crate::embedding::{Embedder, ImageEmbedder};
use crate::fusion;
use crate::types::{EmbeddingRecord, ProductRecord};

/// Counters reported after an embedding pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EmbedSummary {
    pub embedded: usize,
    pub skipped_text: usize,
    pub skipped_image: usize,
    pub skipped_norm: usize,
    pub zero_filled: usize,
}

/// Map product records to fused embedding records.
///
/// A purely sequential mapping stage: per-record failures are logged and
/// handled according to `policy`; the batch never aborts.
pub fn embed_products(
    products: &[ProductRecord],
    text_embedder: &dyn Embedder,
    image_embedder: &dyn ImageEmbedder,
    policy: MissingImagePolicy,
) -> (Vec<EmbeddingRecord>, EmbedSummary) {
    let mut records = Vec::with_capacity(products.len());
    let mut summary = EmbedSummary::default();

    for (i, product) in products.iter().enumerate() {
        if i > 0 && i % 100 == 0 {
            println!("embedded {i}/{} products...", products.len());
        }

        let text_vector = match text_embedder.embed(&[&product.description]) {
            Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
            Ok(_) => {
                eprintln!("skipping {}: text encoder returned no vector", product.id);
                summary.skipped_text += 1;
                continue;
            }
            Err(e) => {
                eprintln!("skipping {}: text embedding failed: {e}", product.id);
                summary.skipped_text += 1;
                continue;
            }
        };

        let image_vector = match embed_image(product, image_embedder) {
            Ok(vector) => vector,
            Err(reason) => match policy {
                MissingImagePolicy::Skip => {
                    eprintln!("skipping {}: {reason}", product.id);
                    summary.skipped_image += 1;
                    continue;
                }
                MissingImagePolicy::Zero => {
                    summary.zero_filled += 1;
                    vec![0.0; image_embedder.dimensions()]
                }
            },
        };

        let Some(vector) = fusion::fuse(&text_vector, &image_vector) else {
            eprintln!("skipping {}: fused vector has zero norm", product.id);
            summary.skipped_norm += 1;
            continue;
        };

        records.push(EmbeddingRecord {
            id: product.id.clone(),
            vector,
            metadata: product.metadata(),
        });
    }

    summary.embedded = records.len();
    (records, summary)
}

/// Embed a product's local image, or explain why it cannot be embedded.
fn embed_image(
    product: &ProductRecord,
    image_embedder: &dyn ImageEmbedder,
) -> Result<Vec<f32>, String> {
    let Some(ref path) = product.image_path else {
        return Err("no local image".to_string());
    };
    let path = Path::new(path);
    if !path.exists() {
        return Err(format!("image file '{}' is missing", path.display()));
    }
    let mut vectors = image_embedder
        .embed_images(&[path])
        .map_err(|e| format!("image embedding failed: {e}"))?;
    if vectors.is_empty() {
        return Err("image encoder returned no vector".to_string());
    }
    Ok(vectors.remove(0))
}
