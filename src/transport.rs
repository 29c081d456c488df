use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;

use crate::error::{FetchError, TaxaError};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: usize = 2;
const BASE_DELAY_MS: u64 = 200;

/// Outbound byte fetch. The only network seam in the crate.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        (**self).get(url)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        (**self).get(url)
    }
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    max_retries: usize,
}

impl HttpTransport {
    pub fn new(timeout: Duration, max_retries: usize) -> Result<Self, TaxaError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-taxa/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| TaxaError::HttpClient(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| TaxaError::HttpClient(err.to_string()))?;
        Ok(Self {
            client,
            max_retries,
        })
    }

    pub fn with_defaults() -> Result<Self, TaxaError> {
        Self::new(
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            DEFAULT_MAX_RETRIES,
        )
    }

    fn send_with_retries(&self, url: &str) -> Result<reqwest::blocking::Response, FetchError> {
        let mut attempt = 0usize;
        loop {
            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.max_retries && is_retryable_status(status) {
                        tracing::debug!(url, status, attempt, "retrying authority request");
                        backoff(attempt);
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.max_retries && is_retryable_error(&err) {
                        tracing::debug!(url, attempt, error = %err, "retrying authority request");
                        backoff(attempt);
                        attempt += 1;
                        continue;
                    }
                    return Err(FetchError::NetworkFailure {
                        url: url.to_string(),
                        reason: describe(&err),
                    });
                }
            }
        }
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tracing::debug!(url, "GET");
        let response = self.send_with_retries(url)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::NetworkFailure {
                url: url.to_string(),
                reason: format!("authority returned status {}", status.as_u16()),
            });
        }
        let bytes = response.bytes().map_err(|err| FetchError::NetworkFailure {
            url: url.to_string(),
            reason: describe(&err),
        })?;
        Ok(bytes.to_vec())
    }
}

fn backoff(attempt: usize) {
    let delay = BASE_DELAY_MS * (attempt as u64 + 1);
    thread::sleep(Duration::from_millis(delay));
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timed out: {err}")
    } else {
        err.to_string()
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
