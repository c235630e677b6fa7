//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{CompletionClient, CompletionError, ModelTier};
use crate::config::ModelConfig;

pub struct OpenAiCompletions {
    client: Client,
    endpoint: String,
    api_key: String,
    models: ModelConfig,
}

impl OpenAiCompletions {
    pub fn new(api_key: String, models: ModelConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(120))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| CompletionError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key,
            models,
        })
    }

    /// Point at a non-default OpenAI-compatible endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[async_trait]
impl CompletionClient for OpenAiCompletions {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tier: ModelTier,
    ) -> Result<String, CompletionError> {
        let model = self.models.model_for(tier);
        let request = json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "max_tokens": self.models.max_tokens,
            "temperature": self.models.temperature,
            "stream": false
        });

        tracing::debug!(model = %model, "dispatching completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Network(format!("request to {} timed out", self.endpoint))
                } else if e.is_connect() {
                    CompletionError::Network(format!("cannot reach {}: {}", self.endpoint, e))
                } else {
                    CompletionError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            return Err(match code {
                401 | 403 => CompletionError::Auth { status: code },
                429 => CompletionError::RateLimited,
                _ => {
                    let message = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<no body>".to_string());
                    CompletionError::Api {
                        status: code,
                        message,
                    }
                }
            });
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            CompletionError::Api {
                status: status.as_u16(),
                message: format!("unparseable response body: {}", e),
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::Api {
                status: status.as_u16(),
                message: "empty choices array".to_string(),
            })
    }
}
