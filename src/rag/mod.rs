// Retrieval-augmented generation
// Embeds the question, pulls the nearest stored passages and hands both to the chat session

pub mod conversation;


use std::path::PathBuf;
use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::chat::ChatSession;
use crate::config::RetrievalConfig;
use crate::database::VectorDatabase;
use crate::database::models::{PassageMatch, StoredPassage};
use crate::embeddings::Embedder;
use crate::{RagError, Result};

pub use conversation::{Conversation, ConversationMessage, ERROR_PREFIX, Role};

/// Reply shown when the model answered with no text
pub const EMPTY_REPLY_PLACEHOLDER: &str = "No response was received.";

/// Builds the prompt sent to the chat model.
///
/// Without context the query is forwarded unchanged.
#[inline]
pub fn build_prompt(context: Option<&str>, query: &str) -> String {
    match context {
        Some(context) => format!(
            "The following is relevant information:\n{context}\n\nUser question: {query}"
        ),
        None => query.to_string(),
    }
}

/// Text to store, either typed directly or read from a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestSource {
    Text(String),
    File(PathBuf),
}

impl IngestSource {
    /// The full text of the source; files must be valid UTF-8
    pub async fn read(self) -> Result<String> {
        match self {
            IngestSource::Text(text) => Ok(text),
            IngestSource::File(path) => tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| RagError::FileRead { path, source }),
        }
    }
}

pub struct RagOrchestrator {
    embedder: Arc<dyn Embedder>,
    database: Arc<VectorDatabase>,
    retrieval: RetrievalConfig,
}

impl RagOrchestrator {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        database: Arc<VectorDatabase>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            database,
            retrieval,
        }
    }

    #[inline]
    pub fn database(&self) -> &Arc<VectorDatabase> {
        &self.database
    }

    #[inline]
    pub fn search_limit(&self) -> u32 {
        self.retrieval.search_limit
    }

    /// Nearest stored passages to `query`, closest first.
    ///
    /// Blank queries and queries the provider could not embed yield no matches.
    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<PassageMatch>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let Some(embedding) = self.embedder.embed(query).await? else {
            warn!("No embedding returned for query, skipping retrieval");
            return Ok(Vec::new());
        };

        let database = self.database.handle().await?;
        let matches = database.nearest_passages(&embedding, limit).await?;
        debug!("Retrieved {} passages for query", matches.len());
        Ok(matches)
    }

    /// Context for a chat prompt: the nearest passages joined by newlines
    pub async fn retrieve_context(&self, query: &str) -> Result<Option<String>> {
        let matches = self
            .search(query, self.retrieval.chat_context_limit)
            .await?;

        if matches.is_empty() {
            return Ok(None);
        }
        Ok(Some(matches.iter().map(|m| m.content.as_str()).join("\n")))
    }

    /// Answer `query` through `session`, augmented with any retrieved context
    pub async fn answer(&self, session: &mut ChatSession, query: &str) -> Result<String> {
        let context = self.retrieve_context(query).await?;
        let prompt = build_prompt(context.as_deref(), query);
        debug!(
            "Sending prompt ({} chars, context: {})",
            prompt.len(),
            context.is_some()
        );

        let reply = session
            .send_message(&prompt)
            .await
            .map_err(|e| RagError::Chat(format!("{e:#}")))?;

        Ok(reply
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| EMPTY_REPLY_PLACEHOLDER.to_string()))
    }

    /// Embed and store a new passage. The stored content is the text as given.
    pub async fn ingest(&self, source: IngestSource) -> Result<StoredPassage> {
        let text = source.read().await?;
        if text.trim().is_empty() {
            return Err(RagError::EmptyInput);
        }

        let embedding = self
            .embedder
            .embed(&text)
            .await?
            .ok_or_else(|| RagError::Embedding("no embedding was returned".to_string()))?;

        let database = self.database.handle().await?;
        let passage = database.insert_passage(&text, &embedding).await?;

        info!("Stored passage {} ({} chars)", passage.id, text.len());
        Ok(passage)
    }
}
