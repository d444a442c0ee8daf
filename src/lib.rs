use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API key is not set. Run `rag-chat chat` and use /key, or set {}", credentials::API_KEY_ENV)]
    MissingCredential,

    #[error("Text or file content is empty")]
    EmptyInput,

    #[error("Failed to read the file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod database;
pub mod embeddings;
pub mod provider;
pub mod rag;
pub mod render;

pub use rag::{Conversation, IngestSource, RagOrchestrator};
