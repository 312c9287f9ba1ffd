use super::*;
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.embedding.provider, ProviderKind::Ollama);
    assert_eq!(config.embedding.protocol, "http");
    assert_eq!(config.embedding.host, "localhost");
    assert_eq!(config.embedding.port, 11434);
    assert_eq!(config.embedding.model, "nomic-embed-text:latest");
    assert_eq!(config.embedding.batch_size, 16);
    assert_eq!(config.chunking.chunk_size, 800);
    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(config.retrieval.separator, "\n\n");
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation() {
    let config = Config::default();

    let mut invalid_config = config.clone();
    invalid_config.embedding.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.concurrency = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.chunking.chunk_size = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidChunkSize(0))
    ));

    let mut invalid_config = config;
    invalid_config.retrieval.top_k = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTopK(0))
    ));
}

#[test]
fn azure_settings_only_checked_for_azure_provider() {
    let mut config = Config::default();
    assert!(config.azure.endpoint.is_empty());
    assert!(config.validate().is_ok());

    config.embedding.provider = ProviderKind::Azure;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingAzureSetting("endpoint"))
    ));

    config.azure.endpoint = "https://example.openai.azure.com".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingAzureSetting("deployment"))
    ));

    config.azure.deployment = "text-embedding-3-small".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let mut config = Config::default();
    config.embedding.provider = ProviderKind::Azure;
    config.azure.endpoint = "https://example.openai.azure.com".to_string();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
    assert!(toml_str.contains("provider = \"azure\""));
}

#[test]
fn partial_toml_uses_defaults() {
    let parsed: Config = toml::from_str(
        r#"
            [embedding]
            model = "mxbai-embed-large"

            [chunking]
            chunk_size = 400
        "#,
    )
    .expect("should parse partial toml");

    assert_eq!(parsed.embedding.model, "mxbai-embed-large");
    assert_eq!(parsed.embedding.port, 11434);
    assert_eq!(parsed.chunking.chunk_size, 400);
    assert_eq!(parsed.retrieval, RetrievalConfig::default());
}

#[test]
fn setter_validation() {
    let mut config = EmbeddingConfig::default();

    assert!(config.set_protocol("https".to_string()).is_ok());
    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert!(config.set_model("new-model".to_string()).is_ok());
    assert!(config.set_batch_size(128).is_ok());
    assert!(config.set_embedding_dimension(768).is_ok());
    assert!(config.set_concurrency(8).is_ok());

    assert!(config.set_protocol("ftp".to_string()).is_err());
    assert!(config.set_protocol("HTTP".to_string()).is_err());
    assert!(config.set_port(0).is_err());
    assert!(config.set_model(String::new()).is_err());
    assert!(config.set_batch_size(0).is_err());
    assert!(config.set_batch_size(1001).is_err());
    assert!(config.set_embedding_dimension(9000).is_err());
    assert!(config.set_concurrency(65).is_err());

    assert_eq!(config.expected_dimension(), Some(768));
    config.embedding_dimension = 0;
    assert_eq!(config.expected_dimension(), None);
}

#[test]
fn load_missing_config_uses_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("missing file is not an error");

    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.embedding, EmbeddingConfig::default());
}

#[test]
fn save_then_load_round_trips() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().join("app"),
        ..Config::default()
    };
    config.chunking.chunk_size = 500;
    config.retrieval.top_k = 5;

    config.save().expect("should save config");
    let loaded = Config::load(temp_dir.path().join("app")).expect("should load config");

    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[embedding]\nbatch_size = 0\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn corpus_paths_resolve_against_base_dir() {
    let mut config = Config {
        base_dir: PathBuf::from("/srv/rag"),
        ..Config::default()
    };

    let paths = config.corpus_paths();
    assert_eq!(paths.index, PathBuf::from("/srv/rag/index.bin"));
    assert_eq!(paths.texts, PathBuf::from("/srv/rag/texts.txt"));
    assert_eq!(config.data_dir(), PathBuf::from("/srv/rag/data"));

    config.corpus.data_dir = PathBuf::from("/var/docs");
    assert_eq!(config.data_dir(), PathBuf::from("/var/docs"));
}

#[test]
#[serial]
fn azure_api_key_comes_from_environment() {
    let azure = AzureConfig {
        api_key_env: "CORPUS_RAG_TEST_AZURE_KEY".to_string(),
        ..AzureConfig::default()
    };

    // SAFETY: serialized with every other test touching the environment
    unsafe { std::env::remove_var("CORPUS_RAG_TEST_AZURE_KEY") };
    assert!(matches!(azure.api_key(), Err(ConfigError::MissingApiKey(_))));

    // SAFETY: serialized with every other test touching the environment
    unsafe { std::env::set_var("CORPUS_RAG_TEST_AZURE_KEY", "secret") };
    assert_eq!(azure.api_key().expect("key is set"), "secret");

    // SAFETY: serialized with every other test touching the environment
    unsafe { std::env::remove_var("CORPUS_RAG_TEST_AZURE_KEY") };
}
