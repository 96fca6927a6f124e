//! Deterministic offline encoder for tests.
//!
//! Projects a bag of token hashes into the model dimension and
//! L2-normalizes, so texts sharing tokens land near each other in cosine
//! space. No model download, no network, fully deterministic.

use sha2::{Digest, Sha256};

use mwkb_shared::Result;

use crate::{EMBEDDING_DIM, TextEncoder};

/// Hash-projection encoder standing in for MiniLM where downloads are
/// unavailable.
pub struct HashEncoder {
    dim: usize,
}

impl HashEncoder {
    pub fn new() -> Self {
        Self { dim: EMBEDDING_DIM }
    }
}

impl Default for HashEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TextEncoder for HashEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0f32; self.dim];

        for token in text.to_lowercase().split_whitespace() {
            let digest = Sha256::digest(token.as_bytes());
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(raw) % self.dim as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
