// src/providers/gemini.rs
// Google Gemini generateContent provider

use super::{classify_status, classify_transport, http_client, ProviderClient, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_BASE, self.model)
    }
}

#[async_trait]
impl ProviderClient for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, message: &str, timeout: Duration) -> Result<String, ProviderError> {
        let body = json!({
            "contents": [{"parts": [{"text": message}]}],
        });

        debug!("Gemini request: model={}", self.model);

        // API key travels in a header, never the URL
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
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

        raw["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::MalformedResponse("no text in Gemini response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_includes_model() {
        let provider = GeminiProvider::new("k".repeat(20), "gemini-2.5-flash".into());
        assert_eq!(
            provider.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
