//! CLI entry point for parley

mod app;
mod tui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use parley_agent::{ConversationDriver, SendOutcome};
use parley_core::config::{Config, ConfigLoader};
use parley_core::logging::{init_logging, LogOutput};
use parley_core::session::SessionStore;
use parley_providers::{route_model, OpenAiCompatClient, ProviderRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::app::ChatApp;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Multi-session chat with an LLM in your terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config directory (default: ~/.parley)
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive setup
    Onboard,
    /// Open the chat UI (default)
    Chat {
        /// Model override
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Send one message and print the reply
    Ask {
        /// Message to send
        #[arg(short, long)]
        message: String,

        /// Model override
        #[arg(long)]
        model: Option<String>,
    },
    /// Show configuration and provider status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    let command = cli.command.unwrap_or(Commands::Chat { model: None });

    if let Commands::Onboard = command {
        return run_onboard(&config_loader);
    }

    let config = config_loader.load()?;
    let output = match command {
        Commands::Chat { .. } => LogOutput::FileOnly,
        _ => LogOutput::Console,
    };
    let _log_guard = init_logging(&config.logging, output)?;

    match command {
        Commands::Chat { model } => {
            info!("Starting chat UI");
            run_chat(&config, model).await?;
        }
        Commands::Ask { message, model } => {
            info!("Processing one-shot message");
            run_ask(&config, &message, model).await?;
        }
        Commands::Status => run_status(&config_loader, &config),
        Commands::Onboard => {}
    }

    Ok(())
}

fn build_driver(config: &Config, model: Option<String>) -> Result<ConversationDriver> {
    let model = model.unwrap_or_else(|| config.agent.model.clone());
    let provider = OpenAiCompatClient::from_config(config, &model)?;
    Ok(ConversationDriver::from_config(Arc::new(provider), &config.agent).with_model(model))
}

/// Run the interactive chat UI
async fn run_chat(config: &Config, model: Option<String>) -> Result<()> {
    let driver = build_driver(config, model)?;
    let store = SessionStore::with_system_prompt(config.agent.system_prompt.clone());
    tui::run(ChatApp::new(store, driver)).await
}

/// Send a single message in a fresh session
async fn run_ask(config: &Config, message: &str, model: Option<String>) -> Result<()> {
    let driver = build_driver(config, model)?;
    let mut store = SessionStore::with_system_prompt(config.agent.system_prompt.clone());
    store.create();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Thinking...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = driver.send(&mut store, message).await;
    spinner.finish_and_clear();

    match result {
        Ok(SendOutcome::Replied(reply)) => {
            println!("{}", style("Assistant:").green().bold());
            println!("{}", reply);
            Ok(())
        }
        Ok(SendOutcome::Ignored) => {
            println!("Nothing to send; the message was blank.");
            Ok(())
        }
        Err(e) => {
            error!("Request failed: {}", e);
            anyhow::bail!("Error: {}", e)
        }
    }
}

/// Print configuration and provider status
fn run_status(loader: &ConfigLoader, config: &Config) {
    let registry = ProviderRegistry::new();

    println!("{}", style("Parley Status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    println!("  Config directory: {}", loader.config_dir().display());
    println!("  Model: {}", config.agent.model);
    match route_model(&registry, config, &config.agent.model) {
        Some(route) => {
            println!("  Provider: {} ({})", route.spec.label(), route.wire_model)
        }
        None => println!("  Provider: {}", style("unknown").red()),
    }
    println!("  Temperature: {}", config.agent.temperature);
    println!(
        "  Max tokens: {}",
        config
            .agent
            .max_tokens
            .map_or_else(|| "provider default".to_string(), |n| n.to_string())
    );
    println!(
        "  Context window: {}",
        config
            .agent
            .context_window
            .map_or_else(|| "unbounded".to_string(), |n| format!("{} messages", n))
    );
    println!("  Log directory: {}", config.logging.dir);
    println!();

    println!("{}", style("Providers:").bold());
    for spec in registry.all() {
        let provider = config.providers.by_name(&spec.name);
        let has_key = provider.is_some_and(|p| !p.api_key.is_empty());
        let has_base = provider.is_some_and(|p| p.api_base.is_some());
        let status = if has_key {
            style("configured".to_string()).green()
        } else if !spec.requires_key() && (has_base || !spec.default_api_base.is_empty()) {
            style("local".to_string()).green()
        } else if spec.env_key.is_empty() {
            style("not configured".to_string()).red()
        } else {
            style(format!("not configured (set {})", spec.env_key)).red()
        };
        println!("  {}: {}", spec.label(), status);
    }
}

/// Run the onboard wizard
fn run_onboard(loader: &ConfigLoader) -> Result<()> {
    println!("{}", style("Welcome to parley!").bold().cyan());
    println!("Let's set up your configuration.\n");

    let config_path = loader.config_path();
    if config_path.exists() {
        let overwrite = Confirm::new()
            .with_prompt("Configuration already exists. Overwrite?")
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Onboard cancelled.");
            return Ok(());
        }
    }

    let registry = ProviderRegistry::new();
    let labels: Vec<String> = registry.all().iter().map(|spec| spec.label()).collect();
    let provider_idx = Select::new()
        .with_prompt("Select your LLM provider")
        .items(&labels)
        .default(0)
        .interact()?;
    let spec = &registry.all()[provider_idx];

    let api_key: String = Input::new()
        .with_prompt(format!("Enter your {} API key", spec.label()))
        .allow_empty(!spec.requires_key())
        .interact_text()?;

    let api_base = if spec.default_api_base.is_empty() {
        let base: String = Input::new()
            .with_prompt("Enter the API base URL")
            .interact_text()?;
        Some(base)
    } else {
        None
    };

    let model: String = Input::new()
        .with_prompt("Enter the model to use")
        .default(format!("{}/{}", spec.name, spec.default_model))
        .interact_text()?;

    // Start from whatever is already on disk so unrelated sections survive.
    let mut config = loader.load().unwrap_or_default();
    config.agent.model = model;
    if let Some(provider) = config.providers.by_name_mut(&spec.name) {
        provider.api_key = api_key;
        if api_base.is_some() {
            provider.api_base = api_base;
        }
    }

    loader.save(&config)?;

    println!(
        "\n{}",
        style("Configuration saved successfully!").green().bold()
    );
    println!("Config location: {}", config_path.display());
    println!("\nYou can now run:");
    println!("  {} - Open the chat UI", style("parley").cyan());
    println!(
        "  {} - Send a single message",
        style("parley ask --message 'Hello!'").cyan()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_chat() {
        let cli = Cli::try_parse_from(["parley"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config_dir.is_none());
    }

    #[test]
    fn test_cli_parses_ask_with_global_config_dir() {
        let cli =
            Cli::try_parse_from(["parley", "ask", "-m", "hello", "--config-dir", "/tmp/p"]).unwrap();
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/p")));
        match cli.command {
            Some(Commands::Ask { message, model }) => {
                assert_eq!(message, "hello");
                assert!(model.is_none());
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_build_driver_uses_override_model() {
        let config = Config::default();
        let driver = build_driver(&config, Some("openai/gpt-4o-mini".to_string())).unwrap();
        assert_eq!(driver.model(), "openai/gpt-4o-mini");

        let driver = build_driver(&config, None).unwrap();
        assert_eq!(driver.model(), "gemini/gemini-2.5-flash");
    }
}
