//! Deterministic embedding mocks for tests. No model downloads involved.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embedding::{EmbedError, Embedder, ImageEmbedder};

/// Text embedder returning deterministic vectors.
///
/// Each call yields the next unit basis vector, cycling through the
/// configured dimensionality — unless a fixed vector is pinned, in which
/// case every call returns it.
pub struct MockEmbedder {
    dimensions: usize,
    counter: AtomicUsize,
    pinned: Option<Vec<f32>>,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            counter: AtomicUsize::new(0),
            pinned: None,
        }
    }

    /// Always return `vector`, regardless of input.
    pub fn pinned(vector: Vec<f32>) -> Self {
        Self {
            dimensions: vector.len(),
            counter: AtomicUsize::new(0),
            pinned: Some(vector),
        }
    }

    fn next_vector(&self) -> Vec<f32> {
        if let Some(ref pinned) = self.pinned {
            return pinned.clone();
        }
        let position = self.counter.fetch_add(1, Ordering::Relaxed) % self.dimensions;
        let mut vector = vec![0.0; self.dimensions];
        vector[position] = 1.0;
        vector
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|_| self.next_vector()).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "mock-text"
    }
}

/// Image embedder companion to [`MockEmbedder`].
pub struct MockImageEmbedder {
    dimensions: usize,
    counter: AtomicUsize,
    failing: bool,
}

impl MockImageEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            counter: AtomicUsize::new(0),
            failing: false,
        }
    }

    /// A mock whose every embed call fails, for exercising skip paths.
    pub fn failing(dimensions: usize) -> Self {
        Self {
            dimensions,
            counter: AtomicUsize::new(0),
            failing: true,
        }
    }
}

impl ImageEmbedder for MockImageEmbedder {
    fn embed_images(&self, paths: &[&Path]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if self.failing {
            return Err(EmbedError::EncodingFailed("mock image failure".to_string()));
        }
        Ok(paths
            .iter()
            .map(|_| {
                let position = self.counter.fetch_add(1, Ordering::Relaxed) % self.dimensions;
                let mut vector = vec![0.0; self.dimensions];
                vector[position] = 1.0;
                vector
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "mock-image"
    }
}
