//! Blocking HTTP transport shared by the embedding adapters
//!
//! Retries with exponential backoff live here and nowhere else: server
//! errors and transport failures are retried, client errors are returned
//! immediately.

use anyhow::{Result, anyhow};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;
const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RetryingAgent {
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff_unit: Duration,
}

impl RetryingAgent {
    #[inline]
    pub fn new(timeout: Duration, retry_attempts: u32) -> Self {
        Self {
            agent: build_agent(timeout),
            retry_attempts: retry_attempts.max(1),
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Delay before the first retry; later retries double it
    #[inline]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    #[inline]
    pub fn get(&self, url: &Url) -> Result<String> {
        self.request_with_retry(url, || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    /// POST a JSON body with extra headers and return the response text
    #[inline]
    pub fn post_json(&self, url: &Url, headers: &[(&str, &str)], body: &str) -> Result<String> {
        self.request_with_retry(url, || {
            let mut request = self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json");
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            request
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn request_with_retry<F>(&self, url: &Url, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    if !is_retryable(&error, attempt, self.retry_attempts)? {
                        return Err(anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay = self.backoff_unit
                            * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) as u32;
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", url);

        Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
    }
}

/// Decide whether a failed attempt should be retried
///
/// Client errors are returned as `Err` so the caller gives up immediately.
fn is_retryable(error: &ureq::Error, attempt: u32, attempts: u32) -> Result<bool> {
    match error {
        ureq::Error::StatusCode(status) => {
            if *status >= 500 {
                warn!(
                    "Server error (status {}), attempt {}/{}",
                    status, attempt, attempts
                );
                Ok(true)
            } else {
                warn!("Client error (status {}), not retrying", status);
                Err(anyhow!("Client error: HTTP {}", status))
            }
        }
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => {
            warn!(
                "Transport error: {}, attempt {}/{}",
                error, attempt, attempts
            );
            Ok(true)
        }
        _ => {
            warn!("Non-retryable error: {}", error);
            Ok(false)
        }
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}
