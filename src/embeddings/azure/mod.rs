#[cfg(test)]
mod tests;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::EmbeddingProvider;
use super::http::RetryingAgent;
use crate::config::{Config, ConfigError};
use crate::{RagError, Result};

/// Azure OpenAI embeddings deployment
#[derive(Debug, Clone)]
pub struct AzureOpenAiClient {
    url: Url,
    api_key: String,
    batch_size: u32,
    expected_dimension: Option<usize>,
    http: RetryingAgent,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl AzureOpenAiClient {
    /// Build a client from `[azure]`; the key is read from the environment now
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let azure = &config.azure;
        azure.validate()?;
        let api_key = azure.api_key()?;

        let url = embeddings_url(&azure.endpoint, &azure.deployment, &azure.api_version)?;

        Ok(Self {
            url,
            api_key,
            batch_size: config.embedding.batch_size.max(1),
            expected_dimension: config.embedding.expected_dimension(),
            http: RetryingAgent::new(
                Duration::from_secs(config.embedding.timeout_secs),
                config.embedding.retry_attempts,
            ),
        })
    }

    #[inline]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.http = self.http.with_backoff_unit(unit);
        self
    }

    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn embed_single_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let body = serde_json::to_string(&EmbeddingsRequest { input: texts })
            .context("Failed to serialize embedding request")?;

        let response_text = self
            .http
            .post_json(&self.url, &[("api-key", self.api_key.as_str())], &body)
            .context("Azure OpenAI request failed")?;

        let mut response: EmbeddingsResponse = serde_json::from_str(&response_text)
            .context("Failed to parse Azure OpenAI response")?;

        // Entries carry their input position and are not guaranteed to be in order
        response.data.sort_by_key(|entry| entry.index);
        for (position, entry) in response.data.iter().enumerate() {
            if entry.index != position {
                anyhow::bail!(
                    "Azure OpenAI returned embedding index {} where {} was expected",
                    entry.index,
                    position
                );
            }
        }
        let embeddings: Vec<Vec<f32>> = response
            .data
            .into_iter()
            .map(|entry| entry.embedding)
            .collect();

        super::check_response(texts.len(), &embeddings, self.expected_dimension)?;
        Ok(embeddings)
    }
}

fn embeddings_url(endpoint: &str, deployment: &str, api_version: &str) -> Result<Url> {
    let raw = format!(
        "{}/openai/deployments/{}/embeddings",
        endpoint.trim_end_matches('/'),
        deployment
    );
    let mut url = Url::parse(&raw).map_err(|_| ConfigError::InvalidUrl(raw.clone()))?;
    url.query_pairs_mut().append_pair("api-version", api_version);
    Ok(url)
}

impl EmbeddingProvider for AzureOpenAiClient {
    #[inline]
    fn name(&self) -> &str {
        "azure"
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| RagError::EmbeddingProvider("Azure returned no embedding".to_string()))
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Requesting {} embeddings from Azure OpenAI", texts.len());
        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size as usize) {
            let batch = self
                .embed_single_batch(chunk)
                .map_err(|e| RagError::EmbeddingProvider(format!("{:#}", e)))?;
            results.extend(batch);
        }
        Ok(results)
    }
}
