use clap::Parser;
use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_QUESTION: &str =
    "for 2024 Query the average number of orders per day grouped by Month";

pub const DEFAULT_PROVIDERS: [&str; 7] = [
    "azure_openai",
    "phi3_mini",
    "phi3_medium",
    "cohere_chat",
    "mistral_small",
    "mistral_large",
    "llama3",
];

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String, // "azure_openai" or an Azure AI inference deployment name
    pub max_tokens: u32,
    pub timeout_secs: Option<u64>,
    pub model: Option<String>, // fallback deployment name for azure_openai
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PromptConfig {
    pub dir: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub prompts: PromptConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the aggregated order database
    #[arg(short, long)]
    pub database: Option<String>,

    /// Provider to ask; repeat to compare several
    #[arg(short, long = "provider")]
    pub providers: Vec<String>,

    /// Question to translate into SQL
    #[arg(short, long, default_value = DEFAULT_QUESTION)]
    pub question: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl CliArgs {
    pub fn providers(&self) -> Vec<String> {
        if self.providers.is_empty() {
            DEFAULT_PROVIDERS.iter().map(|p| p.to_string()).collect()
        } else {
            self.providers.clone()
        }
    }
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        Self::load(args, env_overrides())
    }

    fn load(args: &CliArgs, env: Environment) -> Result<Self, ConfigError> {
        let mut config_builder = builder_with_defaults()?;

        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/sales-insights/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        let mut config: AppConfig = config_builder.add_source(env).build()?.try_deserialize()?;

        if let Some(database) = &args.database {
            config.database.path = database.clone();
        }

        Ok(config)
    }

    /// Parses configuration from a TOML string on top of the defaults.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        builder_with_defaults()?
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Same configuration pointed at a different provider.
    pub fn with_provider(&self, provider: &str) -> Self {
        let mut config = self.clone();
        config.llm.provider = provider.to_string();
        config
    }
}

fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = AppConfig::default();
    Config::builder()
        .set_default("database.path", defaults.database.path)?
        .set_default("llm.provider", defaults.llm.provider)?
        .set_default("llm.max_tokens", i64::from(defaults.llm.max_tokens))
}

// SALES_INSIGHTS__LLM__PROVIDER=llama3 overrides llm.provider
fn env_overrides() -> Environment {
    Environment::with_prefix("SALES_INSIGHTS")
        .prefix_separator("__")
        .separator("__")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "data/order_data.db".to_string(),
            },
            llm: LlmConfig {
                provider: "azure_openai".to_string(),
                max_tokens: 1000,
                timeout_secs: None,
                model: None,
            },
            prompts: PromptConfig::default(),
        }
    }
}

/// Credentials for the Azure OpenAI chat backend.
#[derive(Clone)]
pub struct AzureOpenAiSettings {
    pub api_key: String,
    pub endpoint: String,
    pub api_version: String,
    pub deployment: String,
}

impl AzureOpenAiSettings {
    pub fn from_lookup<F>(lookup: F, fallback_model: Option<&str>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let deployment = lookup("OPENAI_ANALYST_CHAT_MODEL")
            .or_else(|| fallback_model.map(str::to_string))
            .ok_or_else(|| ConfigError::NotFound("OPENAI_ANALYST_CHAT_MODEL".to_string()))?;

        Ok(Self {
            api_key: required(&lookup, "OPENAI_API_KEY")?,
            endpoint: required(&lookup, "OPENAI_API_BASE")?,
            api_version: required(&lookup, "OPENAI_API_VERSION")?,
            deployment,
        })
    }
}

/// Credentials for an Azure AI model-inference deployment.
#[derive(Clone)]
pub struct InferenceSettings {
    pub url: String,
    pub key: String,
}

impl InferenceSettings {
    pub fn from_lookup<F>(provider: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = format!("AZUREAI_{}", provider.to_uppercase());
        Ok(Self {
            url: required(&lookup, &format!("{}_URL", prefix))?,
            key: required(&lookup, &format!("{}_KEY", prefix))?,
        })
    }
}

fn required<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::NotFound(name.to_string()))
}

pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
