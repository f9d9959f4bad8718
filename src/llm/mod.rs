pub mod extract;
pub mod models;
pub mod providers;

use crate::config::{AzureOpenAiSettings, InferenceSettings, LlmConfig};
use crate::prompt::{MessageLayout, PromptProfile, PromptVariant};
use async_trait::async_trait;
use models::ChatMessage;
use std::error::Error;
use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// A chat-completion backend.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, LlmError>;
}

/// Which backend a provider name resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    AzureOpenAi,
    Inference(String),
}

impl Provider {
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "azure_openai" => Provider::AzureOpenAi,
            other => Provider::Inference(other.to_lowercase()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Provider::AzureOpenAi => "azure_openai",
            Provider::Inference(name) => name,
        }
    }

    /// Prompt variant, message layout and token budget used with this provider.
    pub fn profile(&self, max_tokens: u32) -> PromptProfile {
        match self {
            Provider::AzureOpenAi => PromptProfile {
                variant: PromptVariant::Full,
                layout: MessageLayout::SystemAndUser,
                max_tokens: None,
            },
            Provider::Inference(name) => {
                let (variant, layout) = match name.as_str() {
                    "phi3_mini" => (PromptVariant::Short, MessageLayout::Combined),
                    "phi3_medium" => (PromptVariant::Full, MessageLayout::Combined),
                    _ => (PromptVariant::Full, MessageLayout::SystemAndUser),
                };
                PromptProfile {
                    variant,
                    layout,
                    max_tokens: Some(max_tokens),
                }
            }
        }
    }

    /// Builds the backend client, resolving credentials through `lookup`.
    pub fn connect<F>(&self, config: &LlmConfig, lookup: F) -> Result<Box<dyn ChatCompletion>, LlmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client = http_client(config.timeout_secs)?;

        let backend: Box<dyn ChatCompletion> = match self {
            Provider::AzureOpenAi => {
                let settings = AzureOpenAiSettings::from_lookup(lookup, config.model.as_deref())
                    .map_err(|e| LlmError::ConfigError(e.to_string()))?;
                Box::new(providers::azure_openai::AzureOpenAiProvider::new(client, settings))
            }
            Provider::Inference(name) => {
                let settings = InferenceSettings::from_lookup(name, lookup)
                    .map_err(|e| LlmError::ConfigError(e.to_string()))?;
                Box::new(providers::inference::InferenceProvider::new(client, settings))
            }
        };

        Ok(backend)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn http_client(timeout_secs: Option<u64>) -> Result<reqwest::Client, LlmError> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| LlmError::ConnectionError(e.to_string()))
}

/// Reads a chat-completion response, turning HTTP and decoding failures into `LlmError`.
pub(crate) async fn read_completion(response: reqwest::Response) -> Result<String, LlmError> {
    if !response.status().is_success() {
        let status = response.status();
        let error_body = match response.text().await {
            Ok(body) => format!(" - Response body: {}", body),
            Err(_) => String::new(),
        };
        return Err(LlmError::ResponseError(format!(
            "API responded with status code: {}{}",
            status, error_body
        )));
    }

    let completion: models::ChatCompletionResponse = response
        .json()
        .await
        .map_err(|e| LlmError::ResponseError(e.to_string()))?;

    completion
        .first_content()
        .ok_or_else(|| LlmError::ResponseError("No choices in response".to_string()))
}
