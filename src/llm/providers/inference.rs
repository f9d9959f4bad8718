use crate::config::InferenceSettings;
use crate::llm::models::{ChatCompletionRequest, ChatMessage};
use crate::llm::{read_completion, ChatCompletion, LlmError};
use async_trait::async_trait;
use tracing::debug;

const API_VERSION: &str = "2024-05-01-preview";

/// Client for serverless Azure AI model-inference deployments (Phi-3, Mistral, Llama, Cohere).
pub struct InferenceProvider {
    client: reqwest::Client,
    settings: InferenceSettings,
}

impl InferenceProvider {
    pub fn new(client: reqwest::Client, settings: InferenceSettings) -> Self {
        Self { client, settings }
    }

    fn completions_url(&self) -> String {
        let base = self.settings.url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }
}

#[async_trait]
impl ChatCompletion for InferenceProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, LlmError> {
        let url = self.completions_url();
        debug!("API URL: {}", url);

        let request = ChatCompletionRequest {
            messages,
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .query(&[("api-version", API_VERSION)])
            .header("Authorization", format!("Bearer {}", self.settings.key))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        read_completion(response).await
    }
}
