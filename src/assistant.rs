use crate::config::{env_lookup, AppConfig};
use crate::db::{AggregateStore, Row};
use crate::llm::extract::strip_sql_fence;
use crate::llm::{ChatCompletion, LlmError, Provider};
use crate::prompt::{PromptError, PromptLibrary, PromptProfile};
use serde::{Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

const TEMPERATURE: f32 = 0.0;

#[derive(Debug)]
pub enum AssistantError {
    Llm(LlmError),
    Prompt(PromptError),
}

impl fmt::Display for AssistantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssistantError::Llm(err) => write!(f, "{}", err),
            AssistantError::Prompt(err) => write!(f, "{}", err),
        }
    }
}

impl Error for AssistantError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AssistantError::Llm(err) => Some(err),
            AssistantError::Prompt(err) => Some(err),
        }
    }
}

impl From<LlmError> for AssistantError {
    fn from(err: LlmError) -> Self {
        AssistantError::Llm(err)
    }
}

impl From<PromptError> for AssistantError {
    fn from(err: PromptError) -> Self {
        AssistantError::Prompt(err)
    }
}

/// Outcome of answering one question.
///
/// Exactly one of `rows` and `error` is set. Serialized, a missing error is
/// written as the text `"None"` and missing rows as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub rows: Option<Vec<Row>>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<String>,
    pub query: String,
    /// Wall-clock seconds for the whole call, rounded to two decimals.
    pub execution_time: f64,
}

impl QueryResult {
    fn success(rows: Vec<Row>, query: String, started: Instant) -> Self {
        Self {
            rows: Some(rows),
            error: None,
            query,
            execution_time: elapsed_seconds(started),
        }
    }

    fn failure(error: String, query: String, started: Instant) -> Self {
        Self {
            rows: None,
            error: Some(error),
            query,
            execution_time: elapsed_seconds(started),
        }
    }

    pub fn is_success(&self) -> bool {
        self.rows.is_some()
    }

    /// Error text, `"None"` when the query succeeded.
    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or("None")
    }
}

fn serialize_error<S: Serializer>(error: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(error.as_deref().unwrap_or("None"))
}

fn elapsed_seconds(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 100.0).round() / 100.0
}

/// Translates questions about sales into SQL over `order_data` and runs them.
pub struct QueryAssistant {
    provider: String,
    backend: Box<dyn ChatCompletion>,
    profile: PromptProfile,
    prompts: PromptLibrary,
    store: AggregateStore,
}

impl QueryAssistant {
    /// Builds an assistant for `config.llm.provider`, reading credentials from the environment.
    pub fn new(config: &AppConfig) -> Result<Self, AssistantError> {
        Self::with_lookup(config, env_lookup)
    }

    pub fn with_lookup<F>(config: &AppConfig, lookup: F) -> Result<Self, AssistantError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = Provider::parse(&config.llm.provider);
        info!("Initializing query assistant with provider: {}", provider);

        let backend = provider.connect(&config.llm, lookup)?;
        let prompts = PromptLibrary::from_config(config.prompts.dir.as_deref());
        let profile = provider.profile(config.llm.max_tokens);

        // Fail at startup rather than on the first question if templates are broken
        prompts.schema_prompt(profile.variant)?;

        Ok(Self::with_backend(
            provider.name(),
            backend,
            profile,
            prompts,
            PathBuf::from(&config.database.path),
        ))
    }

    /// Assembles an assistant from already-built parts.
    pub fn with_backend(
        provider: &str,
        backend: Box<dyn ChatCompletion>,
        profile: PromptProfile,
        prompts: PromptLibrary,
        database: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider: provider.to_string(),
            backend,
            profile,
            prompts,
            store: AggregateStore::new(database),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn profile(&self) -> &PromptProfile {
        &self.profile
    }

    /// Asks the model for SQL answering `question` and runs it.
    ///
    /// Backend and template failures are returned as `Err`. A query that fails
    /// to run is reported inside the `QueryResult` together with the text
    /// that was attempted.
    pub async fn answer(&self, question: &str) -> Result<QueryResult, AssistantError> {
        let started = Instant::now();
        info!(provider = %self.provider, "Answering question: {}", question);

        let messages = self.prompts.messages(&self.profile, question)?;
        let content = self
            .backend
            .complete(&messages, TEMPERATURE, self.profile.max_tokens)
            .await?;
        debug!("Raw model response: {}", content);

        let query = strip_sql_fence(&content);
        info!("Executing generated SQL: {}", query);

        let store = self.store.clone();
        let sql = query.clone();
        let outcome = tokio::task::spawn_blocking(move || store.query(&sql))
            .await
            .map_err(|join_err| join_err.to_string())
            .and_then(|rows| rows.map_err(|e| e.to_string()));

        let result = match outcome {
            Ok(rows) => {
                let result = QueryResult::success(rows, query, started);
                info!(
                    "Query returned {} row(s) in {}s",
                    result.rows.as_ref().map_or(0, Vec::len),
                    result.execution_time
                );
                result
            }
            Err(error) => {
                let result = QueryResult::failure(error, query, started);
                warn!(
                    "Query failed after {}s: {}",
                    result.execution_time,
                    result.error_text()
                );
                result
            }
        };

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_serializes_error_as_none_text() {
        let mut row = Row::new();
        row.insert("main_category".to_string(), json!("APPAREL"));
        let result = QueryResult::success(
            vec![row],
            "SELECT DISTINCT main_category FROM order_data".to_string(),
            Instant::now(),
        );

        assert!(result.is_success());
        assert_eq!(result.error_text(), "None");

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["error"], json!("None"));
        assert_eq!(value["rows"], json!([{"main_category": "APPAREL"}]));
        assert_eq!(value["query"], json!("SELECT DISTINCT main_category FROM order_data"));
        assert!(value["execution_time"].as_f64().unwrap() >= 0.0);
    }

    #[test]
    fn test_failure_serializes_null_rows() {
        let result = QueryResult::failure(
            "near \"SELEC\": syntax error".to_string(),
            "SELEC * FROM order_data".to_string(),
            Instant::now(),
        );

        assert!(!result.is_success());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["rows"], json!(null));
        assert_eq!(value["error"], json!("near \"SELEC\": syntax error"));
    }

    #[test]
    fn test_elapsed_seconds_rounds_to_hundredths() {
        let seconds = elapsed_seconds(Instant::now());
        assert!(seconds >= 0.0);
        assert_eq!((seconds * 100.0).round() / 100.0, seconds);
    }
}
