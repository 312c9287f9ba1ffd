use super::*;
use crate::config::{AzureConfig, EmbeddingConfig, ProviderKind};
use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY_VAR: &str = "CORPUS_RAG_TEST_AZURE_KEY";

fn azure_config(endpoint: &str) -> Config {
    Config {
        embedding: EmbeddingConfig {
            provider: ProviderKind::Azure,
            batch_size: 2,
            ..EmbeddingConfig::default()
        },
        azure: AzureConfig {
            endpoint: endpoint.to_string(),
            deployment: "embed-dep".to_string(),
            api_key_env: KEY_VAR.to_string(),
            ..AzureConfig::default()
        },
        ..Config::default()
    }
}

fn set_key(value: &str) {
    // SAFETY: tests touching the environment are serialized
    unsafe { std::env::set_var(KEY_VAR, value) };
}

fn clear_key() {
    // SAFETY: tests touching the environment are serialized
    unsafe { std::env::remove_var(KEY_VAR) };
}

#[test]
#[serial]
fn missing_key_is_a_config_error() {
    clear_key();
    let err = AzureOpenAiClient::new(&azure_config("https://example.openai.azure.com"))
        .expect_err("no key in the environment");

    assert!(matches!(err, RagError::Config(_)), "{err}");
    assert!(err.to_string().contains(KEY_VAR));
}

#[test]
#[serial]
fn missing_endpoint_is_a_config_error() {
    set_key("secret");
    let result = AzureOpenAiClient::new(&azure_config(""));
    clear_key();

    assert!(matches!(result, Err(RagError::Config(_))));
}

#[test]
#[serial]
fn url_includes_deployment_and_version() {
    set_key("secret");
    let client = AzureOpenAiClient::new(&azure_config("https://example.openai.azure.com/"))
        .expect("client should build");
    clear_key();

    assert_eq!(
        client.url().as_str(),
        "https://example.openai.azure.com/openai/deployments/embed-dep/embeddings?api-version=2024-02-01"
    );
    assert_eq!(client.name(), "azure");
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn embeddings_are_reordered_by_index() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/deployments/embed-dep/embeddings"))
        .and(query_param("api-version", "2024-02-01"))
        .and(header("api-key", "secret"))
        .and(body_json(json!({"input": ["first", "second"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"index": 1, "embedding": [0.0, 2.0], "object": "embedding"},
                {"index": 0, "embedding": [1.0, 0.0], "object": "embedding"}
            ],
            "model": "text-embedding-ada-002"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_json(json!({"input": ["third"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [3.0, 3.0]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    set_key("secret");
    let client = AzureOpenAiClient::new(&azure_config(&server.uri())).expect("client should build");
    clear_key();

    let texts = vec!["first".to_string(), "second".to_string(), "third".to_string()];
    let vectors = tokio::task::spawn_blocking(move || client.embed_batch(&texts))
        .await
        .expect("task should join")
        .expect("embedding should succeed");

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 2.0], vec![3.0, 3.0]]);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    set_key("wrong");
    let client = AzureOpenAiClient::new(&azure_config(&server.uri()))
        .expect("client should build")
        .with_backoff_unit(Duration::from_millis(1));
    clear_key();

    let result = tokio::task::spawn_blocking(move || client.embed("query"))
        .await
        .expect("task should join");

    let err = result.expect_err("401 should fail");
    assert!(matches!(err, RagError::EmbeddingProvider(_)));
    assert!(err.to_string().contains("401"), "{err}");
}

async fn respond_to_pair(data: serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({"input": ["first", "second"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": data })))
        .expect(1)
        .mount(&server)
        .await;

    set_key("secret");
    let client = AzureOpenAiClient::new(&azure_config(&server.uri())).expect("client should build");
    clear_key();

    let texts = vec!["first".to_string(), "second".to_string()];
    tokio::task::spawn_blocking(move || client.embed_batch(&texts))
        .await
        .expect("task should join")
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn duplicate_indices_are_rejected() {
    let result = respond_to_pair(json!([
        {"index": 1, "embedding": [0.0, 2.0]},
        {"index": 1, "embedding": [1.0, 0.0]}
    ]))
    .await;

    let err = result.expect_err("two entries claim the same input");
    assert!(matches!(err, RagError::EmbeddingProvider(_)), "{err}");
    assert!(err.to_string().contains("index 1"), "{err}");
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn gapped_indices_are_rejected() {
    let result = respond_to_pair(json!([
        {"index": 0, "embedding": [1.0, 0.0]},
        {"index": 2, "embedding": [0.0, 2.0]}
    ]))
    .await;

    let err = result.expect_err("input 1 has no entry");
    assert!(matches!(err, RagError::EmbeddingProvider(_)), "{err}");
    assert!(err.to_string().contains("index 2"), "{err}");
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [0.5, 0.25]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    set_key("secret");
    let client = AzureOpenAiClient::new(&azure_config(&server.uri()))
        .expect("client should build")
        .with_backoff_unit(Duration::from_millis(1));
    clear_key();

    let vector = tokio::task::spawn_blocking(move || client.embed("query"))
        .await
        .expect("task should join")
        .expect("second attempt should succeed");

    assert_eq!(vector, vec![0.5, 0.25]);
}
