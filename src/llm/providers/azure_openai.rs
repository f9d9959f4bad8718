use crate::config::AzureOpenAiSettings;
use crate::llm::models::{ChatCompletionRequest, ChatMessage};
use crate::llm::{read_completion, ChatCompletion, LlmError};
use async_trait::async_trait;
use tracing::debug;

pub struct AzureOpenAiProvider {
    client: reqwest::Client,
    settings: AzureOpenAiSettings,
}

impl AzureOpenAiProvider {
    pub fn new(client: reqwest::Client, settings: AzureOpenAiSettings) -> Self {
        Self { client, settings }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.deployment
        )
    }
}

#[async_trait]
impl ChatCompletion for AzureOpenAiProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, LlmError> {
        let url = self.completions_url();
        debug!("Sending request to Azure OpenAI deployment {}", self.settings.deployment);

        let request = ChatCompletionRequest {
            messages,
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .query(&[("api-version", self.settings.api_version.as_str())])
            .header("api-key", &self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        read_completion(response).await
    }
}
