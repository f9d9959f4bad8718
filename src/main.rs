use clap::Parser;
use tracing::{error, info};

use sales_insights::config::{AppConfig, CliArgs};
use sales_insights::util::logging::init_tracing;
use sales_insights::QueryAssistant;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    init_tracing(args.log_json);

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!("Using aggregate database: {}", config.database.path);

    for provider in args.providers() {
        println!("{}", "=".repeat(50));
        println!("model {}", provider);

        let assistant = match QueryAssistant::new(&config.with_provider(&provider)) {
            Ok(assistant) => assistant,
            Err(e) => {
                error!("Skipping provider {}: {}", provider, e);
                continue;
            }
        };

        match assistant.answer(&args.question).await {
            Ok(result) => {
                println!("execution_time: {}", result.execution_time);
                println!("query {}", result.query);
                if let Some(error) = &result.error {
                    println!("error {}", error);
                }
            }
            Err(e) => error!("Provider {} failed: {}", provider, e),
        }
    }

    Ok(())
}
