
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Embedder;
use crate::config::Config;
use crate::provider::{ProviderClient, model_id};

#[derive(Debug, Clone)]
pub struct GeminiEmbeddingClient {
    provider: ProviderClient,
    model: String,
    dimension: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    model: String,
    content: Content,
    output_dimensionality: u32,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: Option<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

impl GeminiEmbeddingClient {
    #[inline]
    pub fn new(config: &Config, provider: ProviderClient) -> Self {
        Self {
            provider,
            model: model_id(&config.provider.embedding_model).to_string(),
            dimension: config.provider.embedding_dimension,
        }
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Blocking request; [`Embedder::embed`] runs it on the blocking pool
    pub fn generate_embedding(&self, text: &str) -> Result<Option<Vec<f32>>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        debug!("Generating embedding for text (length: {})", text.len());

        let request = EmbedContentRequest {
            model: format!("models/{}", self.model),
            content: Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
            output_dimensionality: self.dimension,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embedding request")?;

        let response_text = self
            .provider
            .call_model(&self.model, "embedContent", &request_json)
            .context("Failed to generate embedding")?;

        let response: EmbedContentResponse = serde_json::from_str(&response_text)
            .context("Failed to parse embedding response")?;

        match response.embedding {
            Some(embedding) if !embedding.values.is_empty() => {
                debug!(
                    "Generated embedding with {} dimensions",
                    embedding.values.len()
                );
                Ok(Some(embedding.values))
            }
            _ => {
                warn!("Provider returned no embedding values");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl Embedder for GeminiEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let client = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || client.generate_embedding(&text))
            .await
            .context("Embedding task failed")?
    }
}
