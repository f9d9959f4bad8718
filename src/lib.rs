pub mod assistant;
pub mod config;
pub mod db;
pub mod llm;
pub mod prompt;
pub mod util;

pub use assistant::{AssistantError, QueryAssistant, QueryResult};
