pub mod hashing;
pub mod openai;

pub use hashing::HashingEmbedder;
pub use openai::OpenAIEmbedder;

use anyhow::Result;
use async_trait::async_trait;

/// Unified embedding model trait
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Batch embed documents for ingestion, one vector per input in order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Model name reported on the status endpoint
    fn model_name(&self) -> &str;
}

/// Scale a vector to unit length in place; zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}
