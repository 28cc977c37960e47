use std::path::Path;
use std::sync::Mutex;

use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};

use super::{EmbedError, Embedder, ImageEmbedder};

const TEXT_MODEL: EmbeddingModel = EmbeddingModel::ClipVitB32;
const IMAGE_MODEL: ImageEmbeddingModel = ImageEmbeddingModel::ClipVitB32;

pub const TEXT_DIMENSIONS: usize = 512;
pub const IMAGE_DIMENSIONS: usize = 512;

const TEXT_MODEL_NAME: &str = "clip-ViT-B-32-text";
const IMAGE_MODEL_NAME: &str = "clip-ViT-B-32-vision";

/// Label recorded for collections holding concatenated text+image vectors.
pub const FUSED_MODEL_NAME: &str = "clip-ViT-B-32-fused";

/// CLIP text encoder running locally via fastembed's ONNX runtime.
pub struct ClipTextEmbedder {
    model: Mutex<TextEmbedding>,
}

impl ClipTextEmbedder {
    pub fn new() -> Result<Self, EmbedError> {
        let options = InitOptions::new(TEXT_MODEL).with_show_download_progress(true);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))?;
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl Embedder for ClipTextEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut model = self.model.lock().unwrap();
        model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbedError::EncodingFailed(e.to_string()))
    }

    fn dimensions(&self) -> usize {
        TEXT_DIMENSIONS
    }

    fn model_name(&self) -> &str {
        TEXT_MODEL_NAME
    }
}

/// CLIP vision encoder; embeds image files by path.
pub struct ClipImageEmbedder {
    model: Mutex<ImageEmbedding>,
}

impl ClipImageEmbedder {
    pub fn new() -> Result<Self, EmbedError> {
        let options = ImageInitOptions::new(IMAGE_MODEL).with_show_download_progress(true);
        let model = ImageEmbedding::try_new(options)
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))?;
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl ImageEmbedder for ClipImageEmbedder {
    fn embed_images(&self, paths: &[&Path]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut model = self.model.lock().unwrap();
        model
            .embed(paths.to_vec(), None)
            .map_err(|e| EmbedError::EncodingFailed(e.to_string()))
    }

    fn dimensions(&self) -> usize {
        IMAGE_DIMENSIONS
    }

    fn model_name(&self) -> &str {
        IMAGE_MODEL_NAME
    }
}
