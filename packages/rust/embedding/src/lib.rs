//! Sentence embeddings behind the [`TextEncoder`] seam.
//!
//! The production encoder is fastembed's all-MiniLM-L6-v2 (384-dim, cosine
//! space). Swapping models invalidates previously stored chunks and requires
//! a full re-index.

pub mod stub;

use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

use mwkb_shared::{KbError, Result};

/// Fixed dimension of stored vectors for the lifetime of the index.
pub const EMBEDDING_DIM: usize = 384;

/// Character cap applied to inputs before encoding.
pub const EMBED_CHAR_CAP: usize = 512;

/// A deterministic text → vector encoder, safe to share across callers.
pub trait TextEncoder: Send + Sync {
    /// Encode one text into an L2-comparable vector.
    fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimension of produced vectors.
    fn dimension(&self) -> usize;
}

// ---------------------------------------------------------------------------
// MiniLmEncoder
// ---------------------------------------------------------------------------

/// fastembed-backed MiniLM encoder.
///
/// The ONNX session wants exclusive access while encoding, so it sits
/// behind a mutex; encoding is stateless per call.
pub struct MiniLmEncoder {
    model: Mutex<TextEmbedding>,
}

impl MiniLmEncoder {
    /// Load the model, downloading it into the local cache on first use.
    pub fn new() -> Result<Self> {
        let options =
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| KbError::Embedding(format!("failed to load MiniLM model: {e}")))?;

        info!(dim = EMBEDDING_DIM, "embedding model loaded");

        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl TextEncoder for MiniLmEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let input = truncate_chars(text, EMBED_CHAR_CAP);

        let mut model = self
            .model
            .lock()
            .map_err(|_| KbError::Embedding("embedding model lock poisoned".into()))?;

        let mut vectors = model
            .embed(vec![input], None)
            .map_err(|e| KbError::Embedding(format!("encode failed: {e}")))?;

        vectors
            .pop()
            .ok_or_else(|| KbError::Embedding("model returned no vector".into()))
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Truncate to at most `cap` characters on a char boundary.
pub fn truncate_chars(text: &str, cap: usize) -> String {
    match text.char_indices().nth(cap) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_is_char_boundary_safe() {
        let text = "héllo wörld".repeat(100);
        let truncated = truncate_chars(&text, EMBED_CHAR_CAP);
        assert_eq!(truncated.chars().count(), EMBED_CHAR_CAP);

        let short = truncate_chars("short", EMBED_CHAR_CAP);
        assert_eq!(short, "short");
    }

    // Requires a model download; run with `cargo test -- --ignored` when online.
    #[test]
    #[ignore]
    fn minilm_produces_fixed_dimension_vectors() {
        let encoder = MiniLmEncoder::new().expect("load model");
        let vector = encoder.encode("compound actions reference").expect("encode");
        assert_eq!(vector.len(), EMBEDDING_DIM);

        // Deterministic for a given model version.
        let again = encoder.encode("compound actions reference").expect("encode");
        assert_eq!(vector, again);
    }
}
