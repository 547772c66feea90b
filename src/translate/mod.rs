//! Translation acquisition with bounded retries.
//!
//! A [`Translator`] wraps a [`Predictor`] (the raw completion call) with the
//! post-processing and the [`RetryPolicy`]. It never returns an error: after
//! the last failed attempt it reports a [`Failure`] that the pipeline routes
//! to quarantine.

mod client;
mod response;
mod retry;

pub use client::ChatCompletionsClient;
pub use response::{parse_translation, strip_reasoning};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::TranslatorConfig;
use crate::emit;
use crate::error::TranslateError;
use crate::metrics::events::{AttemptOutcome, TranslationAttempted};

/// A single request/response completion call.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Send a system instruction and a user text, return the raw completion.
    async fn complete(&self, system: &str, user: &str) -> Result<String, TranslateError>;
}

/// Kind of the terminal failure of a translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    ApiError,
    InvalidTranslation,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::ApiError => "api_error",
            FailureReason::InvalidTranslation => "invalid_translation",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exhausted retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Failure {
    pub attempts: usize,
    pub reason: FailureReason,
}

/// Result of [`Translator::translate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    Translated { text: String, attempts: usize },
    Failed(Failure),
    /// Shutdown was requested before a translation was obtained.
    Cancelled,
}

#[derive(Clone)]
pub struct Translator {
    predictor: Arc<dyn Predictor>,
    policy: RetryPolicy,
    system_prompt: String,
}

impl Translator {
    pub fn new(
        predictor: Arc<dyn Predictor>,
        policy: RetryPolicy,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            predictor,
            policy,
            system_prompt: system_prompt.into(),
        }
    }

    /// Build a translator backed by [`ChatCompletionsClient`].
    pub fn from_config(config: &TranslatorConfig) -> Result<Self, reqwest::Error> {
        let client = ChatCompletionsClient::new(config)?;
        Ok(Self::new(
            Arc::new(client),
            RetryPolicy::new(&config.retry),
            config.system_prompt(),
        ))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn translate(
        &self,
        source_text: &str,
        shutdown: &CancellationToken,
    ) -> TranslationOutcome {
        let max_tries = self.policy.max_tries();
        let mut delays = self.policy.delays();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let reason = match self.attempt(source_text, shutdown).await {
                Some(Ok(text)) => {
                    return TranslationOutcome::Translated {
                        text,
                        attempts: attempt,
                    };
                }
                Some(Err(e)) => {
                    warn!(attempt, max_tries, "Translation attempt failed: {}", e);
                    e.reason()
                }
                None => return TranslationOutcome::Cancelled,
            };

            if attempt >= max_tries {
                return TranslationOutcome::Failed(Failure {
                    attempts: attempt,
                    reason,
                });
            }

            let delay = delays.next().unwrap_or_default();
            debug!(delay_ms = delay.as_millis(), "Waiting before next attempt");
            tokio::select! {
                _ = shutdown.cancelled() => return TranslationOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One completion call. `None` when cancelled mid-request.
    async fn attempt(
        &self,
        source_text: &str,
        shutdown: &CancellationToken,
    ) -> Option<Result<String, TranslateError>> {
        let start = Instant::now();
        let result = tokio::select! {
            _ = shutdown.cancelled() => return None,
            result = self.predictor.complete(&self.system_prompt, source_text) => result,
        };
        let result = result.and_then(|completion| parse_translation(&completion));

        let outcome = match &result {
            Ok(_) => AttemptOutcome::Success,
            Err(e) => match e.reason() {
                FailureReason::ApiError => AttemptOutcome::ApiError,
                FailureReason::InvalidTranslation => AttemptOutcome::InvalidTranslation,
            },
        };
        emit!(TranslationAttempted {
            outcome,
            duration: start.elapsed(),
        });

        Some(result)
    }
}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
