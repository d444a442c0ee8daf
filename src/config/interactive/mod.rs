#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ConfigError, DistanceMetric, ProviderConfig, RetrievalConfig};
use crate::credentials::{API_KEY_ENV, CredentialStore};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 rag-chat Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Provider Configuration").bold().yellow());
    eprintln!("Configure the hosted API used for embeddings and chat.");
    eprintln!(
        "The API key is not stored in this file; export {} or enter it with /key.",
        style(API_KEY_ENV).cyan()
    );
    eprintln!();

    configure_provider(&mut config.provider)?;

    eprintln!();
    eprintln!("{}", style("Retrieval Configuration").bold().yellow());
    configure_retrieval(&mut config.retrieval)?;

    eprintln!();
    eprintln!("{}", style("Database Configuration").bold().yellow());
    configure_database(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_provider_connection(&config.provider) {
        eprintln!("{}", style("✓ Provider endpoint reachable!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the provider endpoint").yellow()
        );
        eprintln!("You can continue, but chat and ingestion will fail until it is reachable.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let credentials = CredentialStore::from_env();

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Provider Settings:").bold().yellow());
    match config.provider_url() {
        Ok(url) => eprintln!("  Base URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Base URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Chat Model: {}", style(&config.provider.chat_model).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.provider.embedding_model).cyan()
    );
    eprintln!(
        "  Embedding Dimension: {}",
        style(config.provider.embedding_dimension).cyan()
    );
    eprintln!(
        "  Timeout: {}s, attempts: {}",
        style(config.provider.timeout_seconds).cyan(),
        style(config.provider.retry_attempts).cyan()
    );
    if credentials.is_configured() {
        eprintln!("  API Key: {}", style("set for this session").green());
    } else {
        eprintln!("  API Key: {}", style("not set").red());
    }

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!(
        "  Chat context passages: {}",
        style(config.retrieval.chat_context_limit).cyan()
    );
    eprintln!(
        "  Search results: {}",
        style(config.retrieval.search_limit).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Database Settings:").bold().yellow());
    eprintln!(
        "  Path: {}",
        style(config.database_path().display()).cyan()
    );
    eprintln!(
        "  Distance metric: {}",
        style(config.database.distance_metric).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    let config_dir = Config::config_dir()?;
    Config::load(&config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.clone(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_provider(provider: &mut ProviderConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(provider.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = ProviderConfig {
                base_url: input.clone(),
                ..ProviderConfig::default()
            };
            temp_config.base_url()?;
            Ok(())
        })
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(provider.chat_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(provider.embedding_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let embedding_dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(provider.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (1..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 1 and 4096")
            }
        })
        .interact_text()?;

    let timeout_seconds: u64 = Input::new()
        .with_prompt("Request timeout (seconds)")
        .default(provider.timeout_seconds)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if (1..=600).contains(input) {
                Ok(())
            } else {
                Err("Timeout must be between 1 and 600 seconds")
            }
        })
        .interact_text()?;

    provider.set_base_url(base_url)?;
    provider.set_chat_model(chat_model)?;
    provider.set_embedding_model(embedding_model)?;
    provider.set_embedding_dimension(embedding_dimension)?;
    provider.set_timeout_seconds(timeout_seconds)?;

    Ok(())
}

fn configure_retrieval(retrieval: &mut RetrievalConfig) -> Result<()> {
    let limit_in_range = |input: &u32| -> Result<(), &str> {
        if (1..=50).contains(input) {
            Ok(())
        } else {
            Err("Limit must be between 1 and 50")
        }
    };

    retrieval.chat_context_limit = Input::new()
        .with_prompt("Passages added to each chat prompt")
        .default(retrieval.chat_context_limit)
        .validate_with(limit_in_range)
        .interact_text()?;

    retrieval.search_limit = Input::new()
        .with_prompt("Results shown by search")
        .default(retrieval.search_limit)
        .validate_with(limit_in_range)
        .interact_text()?;

    Ok(())
}

fn configure_database(config: &mut Config) -> Result<()> {
    if config.database_path().exists() {
        eprintln!(
            "Existing database at {} keeps its distance metric.",
            style(config.database_path().display()).cyan()
        );
        return Ok(());
    }

    let metrics = [DistanceMetric::L2, DistanceMetric::Cosine];
    let default_index = metrics
        .iter()
        .position(|&m| m == config.database.distance_metric)
        .unwrap_or(0);

    let index = Select::new()
        .with_prompt("Distance metric for the similarity index")
        .default(default_index)
        .items(&metrics)
        .interact()?;
    config.database.distance_metric = metrics[index];

    Ok(())
}

fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Model name cannot be empty")
    } else {
        Ok(())
    }
}

fn test_provider_connection(provider: &ProviderConfig) -> bool {
    let Ok(url) = provider.base_url().map(|url| format!("{url}models")) else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    // Without a key the provider answers 4xx, which still proves it is reachable
    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
