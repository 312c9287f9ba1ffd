// Configuration management module
// Loads, validates and saves the TOML settings for providers, chunking and corpus files

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    AzureConfig, Config, ConfigError, CorpusConfig, EmbeddingConfig, ProviderKind, RetrievalConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}

/// Load the configuration from the default application directory
#[inline]
pub fn load_config() -> anyhow::Result<Config> {
    Config::load(get_config_dir()?)
}
