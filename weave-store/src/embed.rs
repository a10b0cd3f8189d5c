//! The embedding service seam.
//!
//! Embeddings are always produced locally: content pulled from a peer is
//! re-embedded here rather than shipping vectors across the wire, so two
//! devices with different embedding models never mix spaces.

use crate::error::StoreResult;
use async_trait::async_trait;

/// Produces an embedding vector for a piece of text.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> StoreResult<Vec<f32>>;
}

/// Deterministic embedders for testing.
pub mod mock {
    use super::*;

    /// Embedder returning a fixed-dimension vector derived from the text
    /// bytes. Deterministic, so tests can assert on vector equality.
    #[derive(Debug, Clone)]
    pub struct FixedEmbedder {
        dimensions: usize,
    }

    impl FixedEmbedder {
        /// Creates an embedder producing vectors of `dimensions` length.
        #[must_use]
        pub fn new(dimensions: usize) -> Self {
            Self { dimensions }
        }
    }

    impl Default for FixedEmbedder {
        fn default() -> Self {
            Self::new(8)
        }
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, text: &str) -> StoreResult<Vec<f32>> {
            let bytes = text.as_bytes();
            let vector = (0..self.dimensions)
                .map(|i| {
                    bytes
                        .iter()
                        .skip(i)
                        .step_by(self.dimensions)
                        .map(|b| f32::from(*b))
                        .sum::<f32>()
                })
                .collect();
            Ok(vector)
        }
    }
}
