// src/providers/groq.rs
// Groq chat completions provider (OpenAI-compatible)

use super::{classify_status, classify_transport, http_client, ProviderClient, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

pub struct GroqProvider {
    client: Client,
    api_key: String,
    model: String,
}

impl GroqProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl ProviderClient for GroqProvider {
    fn name(&self) -> &'static str {
        "groq"
    }

    async fn generate(&self, message: &str, timeout: Duration) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": message}],
            "temperature": 0.7,
            "max_tokens": 1024,
        });

        debug!("Groq request: model={}", self.model);

        let response = self
            .client
            .post(GROQ_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_transport(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &error_text));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        raw["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::MalformedResponse("no content in Groq response".into()))
    }
}
