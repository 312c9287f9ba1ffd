#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{AzureConfig, Config, ConfigError, EmbeddingConfig, ProviderKind, get_config_dir};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Corpus RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Embedding Provider").bold().yellow());
    eprintln!("Choose the service that turns chunks and queries into vectors.");
    eprintln!();

    let providers = &[ProviderKind::Ollama, ProviderKind::Azure];
    let default_index = providers
        .iter()
        .position(|&p| p == config.embedding.provider)
        .unwrap_or(0);
    let provider_index = Select::new()
        .with_prompt("Embedding provider")
        .default(default_index)
        .items(providers)
        .interact()?;
    config.embedding.provider = providers[provider_index];

    match config.embedding.provider {
        ProviderKind::Ollama => configure_ollama(&mut config.embedding)?,
        ProviderKind::Azure => configure_azure(&mut config.azure)?,
    }
    configure_shared(&mut config)?;

    if config.embedding.provider == ProviderKind::Ollama {
        eprintln!();
        eprintln!("{}", style("Testing configuration...").yellow());

        if test_ollama_connection(&config.embedding) {
            eprintln!("{}", style("✓ Ollama connection successful!").green());
        } else {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not connect to Ollama").yellow()
            );
            eprintln!("You can continue, but make sure Ollama is running before building.");
        }
    } else if let Err(e) = config.azure.api_key() {
        eprintln!();
        eprintln!("{} {}", style("⚠ Warning:").yellow(), e);
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
    let config = Config::load(get_config_dir()?).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Settings:").bold().yellow());
    eprintln!("  Provider: {}", style(config.embedding.provider).cyan());
    match config.embedding.provider {
        ProviderKind::Ollama => {
            match config.ollama_url() {
                Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
                Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
            }
            eprintln!("  Model: {}", style(&config.embedding.model).cyan());
        }
        ProviderKind::Azure => {
            eprintln!("  Endpoint: {}", style(&config.azure.endpoint).cyan());
            eprintln!("  Deployment: {}", style(&config.azure.deployment).cyan());
            eprintln!("  API Version: {}", style(&config.azure.api_version).cyan());
            let key_state = if config.azure.api_key().is_ok() {
                style("set").green()
            } else {
                style("missing").red()
            };
            eprintln!(
                "  API Key: ${} ({})",
                style(&config.azure.api_key_env).cyan(),
                key_state
            );
        }
    }
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());
    eprintln!("  Concurrency: {}", style(config.embedding.concurrency).cyan());
    match config.embedding.expected_dimension() {
        Some(dimension) => eprintln!("  Dimension: {}", style(dimension).cyan()),
        None => eprintln!("  Dimension: {}", style("detected from provider").dim()),
    }

    eprintln!();
    eprintln!("{}", style("Corpus Settings:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!("  Documents: {}", style(config.data_dir().display()).cyan());
    let paths = config.corpus_paths();
    eprintln!("  Vector File: {}", style(paths.index.display()).cyan());
    eprintln!("  Text File: {}", style(paths.texts.display()).cyan());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
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

fn configure_ollama(embedding: &mut EmbeddingConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == embedding.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(embedding.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = EmbeddingConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..EmbeddingConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(embedding.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.set_protocol(protocol)?;
    embedding.set_host(host)?;
    embedding.set_port(port)?;
    embedding.set_model(model)?;

    Ok(())
}

fn configure_azure(azure: &mut AzureConfig) -> Result<()> {
    azure.endpoint = Input::new()
        .with_prompt("Azure OpenAI endpoint")
        .default(azure.endpoint.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            match url::Url::parse(input) {
                Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
                _ => Err("Endpoint must be an http or https URL"),
            }
        })
        .interact_text()?;

    azure.deployment = Input::new()
        .with_prompt("Embedding deployment name")
        .default(azure.deployment.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Deployment name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    azure.api_version = Input::new()
        .with_prompt("API version")
        .default(azure.api_version.clone())
        .interact_text()?;

    azure.api_key_env = Input::new()
        .with_prompt("Environment variable holding the API key")
        .default(azure.api_key_env.clone())
        .interact_text()?;

    azure.validate()?;
    Ok(())
}

fn configure_shared(config: &mut Config) -> Result<()> {
    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(config.embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size in characters")
        .default(config.chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100_000).contains(input) {
                Ok(())
            } else {
                Err("Chunk size must be between 1 and 100000")
            }
        })
        .interact_text()?;

    config.embedding.set_batch_size(batch_size)?;
    config.chunking.chunk_size = chunk_size;

    Ok(())
}

fn test_ollama_connection(embedding: &EmbeddingConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        embedding.protocol, embedding.host, embedding.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) => (400..500).contains(&code),
        Err(_) => false,
    }
}
