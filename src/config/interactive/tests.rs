use super::load_existing_config as load_existing_config_impl;
use super::*;

#[test]
fn load_existing_config() {
    let config = load_existing_config_impl().expect("config loaded successfully");
    assert!(!config.embedding.host.is_empty());
    assert!(config.embedding.port > 0);
    assert!(config.embedding.batch_size > 0);
    assert!(config.chunking.chunk_size > 0);
}

#[test]
fn unreachable_ollama_reports_failure() {
    let embedding = EmbeddingConfig {
        host: "127.0.0.1".to_string(),
        port: 9,
        ..EmbeddingConfig::default()
    };
    assert!(!test_ollama_connection(&embedding));
}
