use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use super::RagOrchestrator;
use crate::chat::ChatSession;

/// Prefix of assistant messages that report a failed exchange
pub const ERROR_PREFIX: &str = "Error: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub text: String,
}

impl ConversationMessage {
    #[inline]
    pub fn is_error(&self) -> bool {
        self.role == Role::Assistant && self.text.starts_with(ERROR_PREFIX)
    }
}

/// The visible transcript of one chat session.
///
/// Messages are only ever appended; failures become assistant messages
/// instead of propagating to the caller.
pub struct Conversation {
    rag: Arc<RagOrchestrator>,
    session: ChatSession,
    messages: Vec<ConversationMessage>,
}

impl Conversation {
    #[inline]
    pub fn new(rag: Arc<RagOrchestrator>, session: ChatSession) -> Self {
        Self {
            rag,
            session,
            messages: Vec::new(),
        }
    }

    #[inline]
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    #[inline]
    pub fn orchestrator(&self) -> &Arc<RagOrchestrator> {
        &self.rag
    }

    /// Send one user message and return the assistant message appended for it.
    ///
    /// Blank input is ignored and returns `None`.
    pub async fn send(&mut self, input: &str) -> Option<&ConversationMessage> {
        if input.trim().is_empty() {
            return None;
        }

        self.messages.push(ConversationMessage {
            role: Role::User,
            text: input.to_string(),
        });

        let text = match self.rag.answer(&mut self.session, input).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Chat exchange failed: {e}");
                format!("{ERROR_PREFIX}{e}")
            }
        };

        self.messages.push(ConversationMessage {
            role: Role::Assistant,
            text,
        });
        self.messages.last()
    }

    /// Drop the model-side history and the transcript
    #[inline]
    pub fn reset(&mut self) {
        self.session.reset();
        self.messages.clear();
    }
}
