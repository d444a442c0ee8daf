// Embeddings module
// Turns text into fixed-dimension vectors through the hosted embedding API

pub mod gemini;

use anyhow::Result;
use async_trait::async_trait;

pub use gemini::GeminiEmbeddingClient;

/// Anything that can embed a single piece of text
#[async_trait]
pub trait Embedder: Send + Sync {
    /// `None` when the text is blank or the provider returned no embedding
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>>;
}
