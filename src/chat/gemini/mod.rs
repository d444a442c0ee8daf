
use anyhow::{Context, Result};
use async_trait::async_trait;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ChatBackend, ChatRole, ChatTurn};
use crate::config::Config;
use crate::provider::{ProviderClient, model_id};

#[derive(Debug, Clone)]
pub struct GeminiChatClient {
    provider: ProviderClient,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: ChatRole,
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiChatClient {
    #[inline]
    pub fn new(config: &Config, provider: ProviderClient) -> Self {
        Self {
            provider,
            model: model_id(&config.provider.chat_model).to_string(),
        }
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Blocking request; [`ChatBackend::generate`] runs it on the blocking pool
    pub fn generate_reply(&self, history: &[ChatTurn]) -> Result<Option<String>> {
        debug!(
            "Requesting chat completion from {} with {} turns",
            self.model,
            history.len()
        );

        let request = GenerateContentRequest {
            contents: history
                .iter()
                .map(|turn| Content {
                    role: turn.role,
                    parts: [RequestPart { text: &turn.text }],
                })
                .collect(),
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;

        let response_text = self
            .provider
            .call_model(&self.model, "generateContent", &request_json)
            .context("Failed to generate chat reply")?;

        let response: GenerateContentResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        Ok(reply_text(response))
    }
}

/// Concatenated text parts of the first candidate, or `None` when there are none
fn reply_text(response: GenerateContentResponse) -> Option<String> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        warn!("Chat response contained no candidates");
        return None;
    };

    let text = candidate
        .content
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).join(""))
        .unwrap_or_default();

    if text.is_empty() {
        warn!(
            "Chat candidate had no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        );
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl ChatBackend for GeminiChatClient {
    async fn generate(&self, history: &[ChatTurn]) -> Result<Option<String>> {
        let client = self.clone();
        let history = history.to_vec();
        tokio::task::spawn_blocking(move || client.generate_reply(&history))
            .await
            .context("Chat task failed")?
    }
}
