//! Embeddings API client.
//!
//! `EmbeddingsClient` is the seam the encoder calls through. `MistralClient`
//! implements it over blocking reqwest (feature `mistral`). Failures are
//! either transient, which the encoder retries, or fatal, which it does not.
//! Every error the API client itself produces is transient.

use thiserror::Error;

use crate::types::EmbeddingResponse;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Raised by the API client: network failures, error statuses,
    /// undecodable responses.
    #[error("{0}")]
    Transient(String),

    /// Raised outside the API client, e.g. by the transport wrapping it.
    #[error("{0}")]
    Fatal(String),
}

/// Blocking call to a hosted embeddings endpoint.
pub trait EmbeddingsClient: Send + Sync {
    /// Embed all of `input` in a single request.
    fn embeddings(&self, model: &str, input: &[String]) -> Result<EmbeddingResponse, ClientError>;
}

/// Error for a non-success HTTP status. Retried like any other API error.
pub fn status_error(status: u16, body: &str) -> ClientError {
    ClientError::Transient(format!("API error {}: {}", status, body))
}

#[cfg(feature = "mistral")]
mod http {
    use std::time::Duration;

    use reqwest::blocking::Client;
    use tracing::debug;

    use super::{status_error, ClientError, EmbeddingsClient};
    use crate::types::{EmbeddingRequest, EmbeddingResponse};

    /// Client for `POST {base_url}/v1/embeddings`.
    pub struct MistralClient {
        http: Client,
        api_key: String,
        base_url: String,
    }

    impl MistralClient {
        pub fn new(
            api_key: impl Into<String>,
            base_url: impl Into<String>,
            timeout: Duration,
        ) -> Result<Self, reqwest::Error> {
            let http = Client::builder().timeout(timeout).build()?;
            Ok(Self {
                http,
                api_key: api_key.into(),
                base_url: base_url.into(),
            })
        }

        /// Use a preconfigured reqwest client.
        pub fn from_http_client(
            http: Client,
            api_key: impl Into<String>,
            base_url: impl Into<String>,
        ) -> Self {
            Self {
                http,
                api_key: api_key.into(),
                base_url: base_url.into(),
            }
        }
    }

    impl EmbeddingsClient for MistralClient {
        fn embeddings(&self, model: &str, input: &[String]) -> Result<EmbeddingResponse, ClientError> {
            let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
            let body = EmbeddingRequest {
                model,
                input,
                encoding_format: "float",
            };

            debug!("Requesting {} embeddings from {} with model {}", input.len(), url, model);

            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .header("Accept", "application/json")
                .json(&body)
                .send()
                .map_err(|e| ClientError::Transient(format!("Request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().unwrap_or_default();
                return Err(status_error(status.as_u16(), &body));
            }

            let text = response
                .text()
                .map_err(|e| ClientError::Transient(format!("Failed to read response: {}", e)))?;
            serde_json::from_str(&text)
                .map_err(|e| ClientError::Transient(format!("Unexpected response body: {}", e)))
        }
    }
}

#[cfg(feature = "mistral")]
pub use http::MistralClient;
