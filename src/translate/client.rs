//! Chat-completions client for the translation service.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tracing::debug;

use crate::config::TranslatorConfig;
use crate::error::{EmptyCompletionSnafu, StatusSnafu, TransportSnafu, TranslateError};

use super::Predictor;

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: [Message<'a>; 2],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible `chat/completions` endpoint.
///
/// Sends the key both as `api-key` (Azure AI inference) and as a bearer
/// token, so either flavour of endpoint accepts it.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    client: Client,
    url: String,
    api_key: String,
    model: Option<String>,
    max_tokens: u32,
}

impl ChatCompletionsClient {
    pub fn new(config: &TranslatorConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", config.endpoint.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Predictor for ChatCompletionsClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, TranslateError> {
        let request = ChatRequest {
            messages: [
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.max_tokens,
            model: self.model.as_deref(),
        };

        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context(TransportSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return StatusSnafu {
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        let body: ChatResponse = response.json().await.context(TransportSnafu)?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .context(EmptyCompletionSnafu)?;

        debug!(chars = content.len(), "Received completion");
        Ok(content)
    }
}
