use crate::llm::models::ChatMessage;
use minijinja::{context, path_loader, Environment};
use rust_embed::RustEmbed;
use std::error::Error;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

const SCHEMA_TEMPLATE: &str = "schema.j2";
const QUESTION_TEMPLATE: &str = "question.j2";
const COMBINED_TEMPLATE: &str = "combined.j2";

#[derive(RustEmbed)]
#[folder = "prompts/"]
struct PromptAssets;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    /// Schema, idioms and the full category hierarchy.
    Full,
    /// Same without the category hierarchy, for small-context models.
    Short,
}

impl PromptVariant {
    fn as_str(&self) -> &'static str {
        match self {
            PromptVariant::Full => "full",
            PromptVariant::Short => "short",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLayout {
    /// Schema as a system message, question as a user message.
    SystemAndUser,
    /// Schema and question folded into a single user message.
    Combined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptProfile {
    pub variant: PromptVariant,
    pub layout: MessageLayout,
    pub max_tokens: Option<u32>,
}

#[derive(Debug)]
pub struct PromptError(minijinja::Error);

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prompt template error: {}", self.0)
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl From<minijinja::Error> for PromptError {
    fn from(err: minijinja::Error) -> Self {
        PromptError(err)
    }
}

/// Renders chat messages from the prompt templates.
pub struct PromptLibrary {
    env: Environment<'static>,
}

impl PromptLibrary {
    /// Templates compiled into the binary.
    pub fn embedded() -> Self {
        let mut env = Environment::new();
        env.set_loader(|name| {
            Ok(PromptAssets::get(name)
                .map(|file| String::from_utf8_lossy(&file.data).into_owned()))
        });
        Self { env }
    }

    /// Templates read from `dir`, so prompts can be tuned without a rebuild.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        info!("Loading prompt templates from {}", dir.as_ref().display());
        let mut env = Environment::new();
        env.set_loader(path_loader(dir));
        Self { env }
    }

    pub fn from_config(dir: Option<&str>) -> Self {
        match dir {
            Some(dir) => Self::from_dir(dir),
            None => Self::embedded(),
        }
    }

    pub fn schema_prompt(&self, variant: PromptVariant) -> Result<String, PromptError> {
        let tmpl = self.env.get_template(SCHEMA_TEMPLATE)?;
        Ok(tmpl.render(context! { variant => variant.as_str() })?)
    }

    /// Builds the message sequence sent to the model for `question`.
    pub fn messages(
        &self,
        profile: &PromptProfile,
        question: &str,
    ) -> Result<Vec<ChatMessage>, PromptError> {
        let schema = self.schema_prompt(profile.variant)?;

        let messages = match profile.layout {
            MessageLayout::SystemAndUser => {
                let user = self
                    .env
                    .get_template(QUESTION_TEMPLATE)?
                    .render(context! { question })?;
                vec![ChatMessage::system(schema), ChatMessage::user(user)]
            }
            MessageLayout::Combined => {
                let user = self
                    .env
                    .get_template(COMBINED_TEMPLATE)?
                    .render(context! { schema, question })?;
                vec![ChatMessage::user(user)]
            }
        };

        debug!("Prepared {} prompt message(s)", messages.len());
        Ok(messages)
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::embedded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::models::Role;
    use tempfile::TempDir;

    const FULL: PromptProfile = PromptProfile {
        variant: PromptVariant::Full,
        layout: MessageLayout::SystemAndUser,
        max_tokens: None,
    };

    #[test]
    fn test_full_variant_lists_category_hierarchy() {
        let prompts = PromptLibrary::embedded();
        let schema = prompts.schema_prompt(PromptVariant::Full).unwrap();

        assert!(schema.contains("order_data"));
        assert!(schema.contains("\"product_type\":\"TRAVEL BACKPACKS\""));
        assert!(schema.contains("note that these are hierarchical"));
        assert!(schema.contains("NORTH AMERICA"));
        assert!(schema.contains("SUM(Sum_of_Order_Value_USD)/SUM(Number_of_Orders)"));
    }

    #[test]
    fn test_short_variant_drops_hierarchy_but_keeps_regions() {
        let prompts = PromptLibrary::embedded();
        let full = prompts.schema_prompt(PromptVariant::Full).unwrap();
        let short = prompts.schema_prompt(PromptVariant::Short).unwrap();

        assert!(!short.contains("\"product_type\":\"TRAVEL BACKPACKS\""));
        assert!(!short.contains("note that these are hierarchical"));
        // the worked product_type filter example is shared by both variants
        assert!(short.contains("product_type = \"TRAVEL BACKPACKS\""));
        assert!(short.contains("SOUTH AMERICA"));
        assert!(short.contains("UPPER CASE"));
        assert!(short.len() < full.len());
    }

    #[test]
    fn test_system_and_user_layout() {
        let prompts = PromptLibrary::embedded();
        let messages = prompts
            .messages(&FULL, "How many orders were returned in 2023?")
            .unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Number_of_Orders_Returned"));
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(
            messages[1].content,
            "How many orders were returned in 2023?\nGive only the query in SQL format"
        );
    }

    #[test]
    fn test_combined_layout() {
        let prompts = PromptLibrary::embedded();
        let profile = PromptProfile {
            variant: PromptVariant::Short,
            layout: MessageLayout::Combined,
            max_tokens: Some(1000),
        };
        let messages = prompts.messages(&profile, "List the regions").unwrap();
        let schema = prompts.schema_prompt(PromptVariant::Short).unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(
            messages[0].content,
            format!("{}\n\nList the regions\nGive only the query in SQL format", schema)
        );
    }

    #[test]
    fn test_question_is_not_html_escaped() {
        let prompts = PromptLibrary::embedded();
        let messages = prompts
            .messages(&FULL, "Orders for \"MEN'S CLOTHING\" & <TOPS>")
            .unwrap();
        assert!(messages[1].content.starts_with("Orders for \"MEN'S CLOTHING\" & <TOPS>"));
    }

    #[test]
    fn test_templates_from_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("schema.j2"), "table order_data ({{ variant }})").unwrap();
        std::fs::write(dir.path().join("question.j2"), "Q: {{ question }}").unwrap();
        std::fs::write(
            dir.path().join("combined.j2"),
            "{{ schema }} | {% include \"question.j2\" %}",
        )
        .unwrap();

        let prompts = PromptLibrary::from_dir(dir.path());
        let messages = prompts.messages(&FULL, "total orders").unwrap();
        assert_eq!(messages[0].content, "table order_data (full)");
        assert_eq!(messages[1].content, "Q: total orders");
    }

    #[test]
    fn test_missing_template_is_an_error() {
        let dir = TempDir::new().unwrap();
        let prompts = PromptLibrary::from_dir(dir.path());
        assert!(prompts.schema_prompt(PromptVariant::Full).is_err());
    }
}
