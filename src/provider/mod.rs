// Hosted provider transport
// Blocking HTTP plumbing shared by the embedding and chat clients


use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::Config;
use crate::credentials::CredentialStore;

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;
const API_KEY_HEADER: &str = "x-goog-api-key";

/// A non-success HTTP status from the provider, with its error message when one was sent
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Provider returned HTTP {status}: {message}")]
pub struct ProviderError {
    pub status: u16,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl ProviderError {
    fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    "no error details".to_string()
                } else {
                    trimmed.chars().take(200).collect()
                }
            });
        Self { status, message }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderClient {
    base_url: Url,
    agent: ureq::Agent,
    credentials: CredentialStore,
    retry_attempts: u32,
}

impl ProviderClient {
    #[inline]
    pub fn new(config: &Config, credentials: CredentialStore) -> Result<Self> {
        let base_url = config
            .provider_url()
            .context("Failed to generate provider URL from config")?;

        Ok(Self {
            base_url,
            agent: build_agent(Duration::from_secs(config.provider.timeout_seconds)),
            credentials,
            retry_attempts: config.provider.retry_attempts.max(1),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[inline]
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// `POST models/{model}:{method}` with a JSON body, returning the response body.
    ///
    /// Fails without a request when no credential is configured.
    pub fn call_model(&self, model: &str, method: &str, body: &str) -> Result<String> {
        let credential = self.credentials.require()?;

        let url = self
            .base_url
            .join(&format!("models/{}:{}", model_id(model), method))
            .with_context(|| format!("Failed to build URL for {method}"))?;

        debug!("POST {} ({} bytes)", url, body.len());

        self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .header(API_KEY_HEADER, credential.expose())
                .send(body)
                .and_then(|mut resp| {
                    let status = resp.status().as_u16();
                    resp.body_mut()
                        .read_to_string()
                        .map(|text| (status, text))
                })
        })
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<(u16, String), ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            let should_retry = match request_fn() {
                Ok((status, response_text)) if status < 400 => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Ok((status, response_text)) => {
                    let provider_error = ProviderError::from_response(status, &response_text);
                    if status < 500 {
                        warn!("Client error (status {}), not retrying", status);
                        return Err(provider_error.into());
                    }
                    warn!(
                        "Server error (status {}), attempt {}/{}",
                        status, attempt, self.retry_attempts
                    );
                    last_error = Some(anyhow::Error::new(provider_error));
                    true
                }
                Err(
                    error @ (ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Timeout(_)
                    | ureq::Error::Io(_)),
                ) => {
                    warn!(
                        "Transport error: {}, attempt {}/{}",
                        error, attempt, self.retry_attempts
                    );
                    last_error = Some(anyhow::anyhow!("Request error: {}", error));
                    true
                }
                Err(error) => {
                    warn!("Non-retryable error: {}", error);
                    return Err(anyhow::anyhow!("Request error: {}", error));
                }
            };

            if should_retry && attempt < self.retry_attempts {
                let delay = Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        if self.retry_attempts > 1 {
            error!("All retry attempts failed for request to {}", self.base_url);
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Model names may be given with or without the `models/` prefix
#[inline]
pub fn model_id(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}
