//! Deterministic feature-hashing embedder.
//!
//! Maps word and character-bigram features into a fixed-width bucket space
//! with FNV-1a and L2-normalizes the result. No model weights, no
//! randomness: the same text and seed always produce the same vector, on
//! every platform. Similarity quality is far below a real transformer, but
//! lexically overlapping texts do score closer than unrelated ones, which
//! is all the tests and smoke runs need.

use async_trait::async_trait;

use crate::traits::Embedder;
use crate::vector::normalize;
use crate::{RagError, Result, EMBEDDING_DIM};

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Seedable hashing embedder. The seed participates in every hash, so two
/// embedders with different seeds produce incompatible spaces.
pub struct HashEmbedder {
    dim: usize,
    seed: u64,
}

impl HashEmbedder {
    pub fn new(dim: usize, seed: u64) -> Result<Self> {
        if dim == 0 {
            return Err(RagError::InvalidArgument(
                "embedding dimension must be positive".to_string(),
            ));
        }
        Ok(Self { dim, seed })
    }

    /// Embedder at the corpus dimension with a fixed default seed.
    pub fn default_dim() -> Self {
        Self {
            dim: EMBEDDING_DIM,
            seed: 0,
        }
    }

    fn hash(&self, bytes: &[u8]) -> u64 {
        let mut h = FNV_OFFSET ^ self.seed;
        for &b in bytes {
            h ^= b as u64;
            h = h.wrapping_mul(FNV_PRIME);
        }
        h
    }

    /// Synchronous embedding; the trait impl just wraps this.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dim];
        let lowered = text.to_lowercase();

        for token in lowered.split(|c: char| !c.is_alphanumeric()) {
            if token.len() < 2 {
                continue;
            }

            let h = self.hash(token.as_bytes());
            let bucket = (h % self.dim as u64) as usize;
            // Sign from a spare hash bit decorrelates buckets.
            let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;

            // Character bigrams give partial credit to inflected forms,
            // which matters for Ukrainian morphology.
            let chars: Vec<char> = token.chars().collect();
            for pair in chars.windows(2) {
                let mut buf = [0u8; 8];
                let mut key = Vec::with_capacity(8);
                key.extend_from_slice(pair[0].encode_utf8(&mut buf).as_bytes());
                key.extend_from_slice(pair[1].encode_utf8(&mut buf).as_bytes());
                let h = self.hash(&key);
                let bucket = (h % self.dim as u64) as usize;
                let sign = if h & (1 << 63) == 0 { 0.5 } else { -0.5 };
                vector[bucket] += sign;
            }
        }

        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{dot_product, is_unit_norm};

    #[test]
    fn test_deterministic_across_calls() {
        let embedder = HashEmbedder::new(64, 7).unwrap();
        let a = embedder.embed_sync("Положення про освітній процес");
        let b = embedder.embed_sync("Положення про освітній процес");
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_changes_space() {
        let a = HashEmbedder::new(64, 1).unwrap().embed_sync("dormitory rules");
        let b = HashEmbedder::new(64, 2).unwrap().embed_sync("dormitory rules");
        assert_ne!(a, b);
    }

    #[test]
    fn test_output_is_unit_norm() {
        let embedder = HashEmbedder::new(128, 0).unwrap();
        let v = embedder.embed_sync("university charter and regulations");
        assert!(is_unit_norm(&v));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(32, 0).unwrap();
        let v = embedder.embed_sync("");
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_overlapping_texts_score_higher() {
        let embedder = HashEmbedder::new(256, 0).unwrap();
        let base = embedder.embed_sync("правила проживання у гуртожитку університету");
        let related = embedder.embed_sync("правила проживання студентів у гуртожитку");
        let unrelated = embedder.embed_sync("financial procurement quarterly report");

        let near = dot_product(&base, &related).unwrap();
        let far = dot_product(&base, &unrelated).unwrap();
        assert!(near > far);
    }

    #[test]
    fn test_rejects_zero_dim() {
        assert!(HashEmbedder::new(0, 0).is_err());
    }

    #[tokio::test]
    async fn test_trait_impl() {
        let embedder = HashEmbedder::default_dim();
        assert_eq!(embedder.dim(), crate::EMBEDDING_DIM);
        let v = embedder.embed("text").await.unwrap();
        assert_eq!(v.len(), crate::EMBEDDING_DIM);
    }
}
