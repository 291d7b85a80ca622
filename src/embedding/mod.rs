//! Text embedding providers
//!
//! The store only needs fixed-size `f32` vectors; where they come from is
//! behind the `Embedder` trait.

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::error::AdvisorError;
use crate::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub mod gemini;
pub use gemini::GeminiEmbedder;

/// Trait for turning documents and queries into vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier recorded on the collection at seed time
    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AdvisorError::Embedding("No embedding returned".to_string()))
    }
}

/// Deterministic offline embedder (signed feature hashing).
///
/// Tokens and adjacent-token bigrams are hashed into buckets; documents that
/// share vocabulary end up close in cosine space.
pub struct HashingEmbedder {
    dimensions: usize,
    model_name: String,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model_name: format!("hashing-{}", dimensions),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let tokens = tokenize(text);

        for token in &tokens {
            self.accumulate(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.accumulate(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        normalize(&mut vector);
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);

        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_HASHING_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Lower-cased alphanumeric tokens
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Scale to unit length in place (zero vectors are left alone)
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
}

/// Build the embedder selected by configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimensions))),
        EmbeddingProvider::Gemini => Ok(Arc::new(GeminiEmbedder::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::cosine_similarity;

    #[tokio::test]
    async fn test_hashing_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed("Beach resort with coral reefs").await.unwrap();
        let b = embedder.embed("Beach resort with coral reefs").await.unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_scores_higher() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed("beach destinations").await.unwrap();
        let beach = embedder
            .embed("Destination: Bali | Famous for: beach, surfing | beach destinations")
            .await
            .unwrap();
        let alpine = embedder
            .embed("Destination: Zermatt | Famous for: skiing, glaciers")
            .await
            .unwrap();

        assert!(cosine_similarity(&query, &beach) > cosine_similarity(&query, &alpine));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        let v = embedder.embed("   ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_model_name_tracks_dimensions() {
        assert_eq!(HashingEmbedder::new(128).model_name(), "hashing-128");
    }

    #[test]
    fn test_gemini_requires_key() {
        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Gemini,
            ..Default::default()
        };
        assert!(create_embedder(&config).is_err());
    }
}
