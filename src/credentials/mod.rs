// Session-scoped API credential
// Held in memory for the lifetime of the process and never written to disk


use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::RagError;

/// Environment variable read once at startup to seed the store
pub const API_KEY_ENV: &str = "RAG_CHAT_API_KEY";

/// An opaque API key. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank input
    #[inline]
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into().trim().to_string();
        (!value.is_empty()).then_some(Self(value))
    }

    #[inline]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Shared handle to the session credential. Clones observe the same value.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<Option<Credential>>>,
}

impl CredentialStore {
    #[inline]
    pub fn new(credential: Option<Credential>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(credential)),
        }
    }

    /// Seed from `RAG_CHAT_API_KEY`; an unset or blank variable leaves the store empty
    #[inline]
    pub fn from_env() -> Self {
        let credential = std::env::var(API_KEY_ENV).ok().and_then(Credential::new);
        debug!(configured = credential.is_some(), "Loaded session credential");
        Self::new(credential)
    }

    #[inline]
    pub fn get(&self) -> Option<Credential> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The credential, or [`RagError::MissingCredential`]
    #[inline]
    pub fn require(&self) -> Result<Credential, RagError> {
        self.get().ok_or(RagError::MissingCredential)
    }

    #[inline]
    pub fn is_configured(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Overwrite the stored credential. Blank input is rejected and leaves the store unchanged.
    #[inline]
    pub fn set(&self, value: impl Into<String>) -> bool {
        let Some(credential) = Credential::new(value) else {
            return false;
        };
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
        debug!("Session credential updated");
        true
    }

    #[inline]
    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
