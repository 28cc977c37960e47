use crate::embedding::Embedder;
use crate::fusion;
use crate::store::{QueryMatch, VectorStore};

/// Build a fused query vector by repeating the text embedding end-to-end
/// until it matches the stored dimensionality, then normalizing.
pub fn build_query_vector(
    embedder: &dyn Embedder,
    target_dimensions: usize,
    query_text: &str,
) -> Result<Vec<f32>, String> {
    let vectors = embedder
        .embed(&[query_text])
        .map_err(|e| format!("query embedding failed: {e}"))?;
    let text_vector = vectors
        .into_iter()
        .next()
        .ok_or_else(|| "text encoder returned no vector".to_string())?;
    if text_vector.is_empty() {
        return Err("text encoder returned an empty vector".to_string());
    }

    let mut fused = fusion::tile(&text_vector, target_dimensions);
    if !fusion::normalize(&mut fused) {
        return Err("query vector has zero norm".to_string());
    }
    Ok(fused)
}

/// Embed a free-text query and return the `top_k` nearest entries by
/// ascending cosine distance. Nothing is cached; every call re-embeds.
pub fn run_query(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    dimensions: usize,
    query_text: &str,
    top_k: usize,
) -> Result<Vec<QueryMatch>, String> {
    if query_text.trim().is_empty() {
        return Err("query must not be empty".to_string());
    }
    let vector = build_query_vector(embedder, dimensions, query_text)?;
    store
        .search(&vector, top_k)
        .map_err(|e| format!("search failed: {e}"))
}
