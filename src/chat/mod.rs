// Chat module
// A conversational session over the hosted chat-completion API

pub mod gemini;

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use gemini::GeminiChatClient;

/// Speaker of a turn as the provider sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl fmt::Display for ChatRole {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Model => write!(f, "model"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    #[inline]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    #[inline]
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// Produces the next model turn for a dialogue
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `history` ends with the user turn to answer. `None` means the model sent no text.
    async fn generate(&self, history: &[ChatTurn]) -> Result<Option<String>>;
}

/// One ongoing dialogue. Created once per session and cleared with [`ChatSession::reset`].
pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    history: Vec<ChatTurn>,
}

impl fmt::Debug for ChatSession {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("turns", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    #[inline]
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            history: Vec::new(),
        }
    }

    #[inline]
    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Send `message` as the next user turn and return the reply text.
    ///
    /// The exchange is only recorded in the history when the backend produced text.
    pub async fn send_message(&mut self, message: &str) -> Result<Option<String>> {
        let mut turns = self.history.clone();
        turns.push(ChatTurn::user(message));

        let reply = self.backend.generate(&turns).await?;

        if let Some(text) = &reply {
            turns.push(ChatTurn::model(text.clone()));
            self.history = turns;
        }
        debug!("Chat session now holds {} turns", self.history.len());

        Ok(reply)
    }

    #[inline]
    pub fn reset(&mut self) {
        self.history.clear();
    }
}
