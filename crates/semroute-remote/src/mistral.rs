//! Dense encoder backed by the Mistral embeddings API.

use std::time::Duration;

use semroute_core::config::{DEFAULT_SCORE_THRESHOLD, MISTRAL_API_KEY_ENV};
use semroute_core::{
    DenseEncoder, EncoderDefault, EncoderError, EncoderType, MistralSettings, Provider, Result,
};
use tracing::{debug, warn};

use crate::client::{ClientError, EmbeddingsClient};
use crate::retry::RetryPolicy;
use crate::types::EmbeddingResponse;

pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Construction parameters for [`MistralEncoder`].
#[derive(Debug, Clone)]
pub struct MistralEncoderConfig {
    /// Model name. `None` uses the provider default (`mistral-embed`).
    pub name: Option<String>,
    /// API key. `None` falls back to `MISTRALAI_API_KEY`.
    pub api_key: Option<String>,
    pub score_threshold: f64,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for MistralEncoderConfig {
    fn default() -> Self {
        Self {
            name: None,
            api_key: None,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            base_url: DEFAULT_BASE_URL.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl From<&MistralSettings> for MistralEncoderConfig {
    fn from(settings: &MistralSettings) -> Self {
        Self {
            name: settings.name.clone(),
            api_key: settings.api_key.clone(),
            score_threshold: settings.score_threshold,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            ..Self::default()
        }
    }
}

/// Explicit name, else the Mistral entry of the defaults table.
pub fn resolve_model_name(name: Option<String>) -> String {
    name.unwrap_or_else(|| {
        EncoderDefault::for_provider(Provider::Mistral)
            .embedding_model
            .to_string()
    })
}

/// Explicit key, else `lookup(MISTRALAI_API_KEY)`. Empty values count as unset.
pub fn resolve_api_key<F>(explicit: Option<&str>, lookup: F) -> Result<String>
where
    F: FnOnce(&str) -> Option<String>,
{
    explicit
        .map(str::to_string)
        .filter(|k| !k.is_empty())
        .or_else(|| lookup(MISTRAL_API_KEY_ENV).filter(|k| !k.is_empty()))
        .ok_or_else(|| EncoderError::Configuration("Mistral API key not provided".into()))
}

fn connection_error(message: impl std::fmt::Display) -> EncoderError {
    EncoderError::Connection(format!("Unable to connect to MistralAI: {}", message))
}

/// Build a client with `build`, mapping a failure to `Connection`.
pub fn connect_client<C, E, F>(build: F) -> Result<Box<dyn EmbeddingsClient>>
where
    C: EmbeddingsClient + 'static,
    E: std::fmt::Display,
    F: FnOnce() -> std::result::Result<C, E>,
{
    let client = build().map_err(connection_error)?;
    Ok(Box::new(client))
}

/// Encodes documents with one request per call, retrying transient failures.
pub struct MistralEncoder {
    name: String,
    score_threshold: f64,
    retry: RetryPolicy,
    client: Option<Box<dyn EmbeddingsClient>>,
}

impl std::fmt::Debug for MistralEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MistralEncoder")
            .field("name", &self.name)
            .field("score_threshold", &self.score_threshold)
            .field("retry", &self.retry)
            .field("client", &self.client.is_some())
            .finish()
    }
}

impl MistralEncoder {
    /// Resolve the model name and API key and build the HTTP client.
    ///
    /// Fails with `DependencyMissing` without the `mistral` feature,
    /// `Configuration` when no API key is found, and `Connection` when the
    /// client cannot be built.
    pub fn new(config: MistralEncoderConfig) -> Result<Self> {
        let name = resolve_model_name(config.name.clone());
        let client = initialize_client(&config)?;
        Ok(Self {
            name,
            score_threshold: config.score_threshold,
            retry: RetryPolicy::default(),
            client: Some(client),
        })
    }

    /// Wrap an existing client.
    pub fn with_client(
        name: Option<String>,
        score_threshold: f64,
        client: Box<dyn EmbeddingsClient>,
    ) -> Self {
        Self {
            name: resolve_model_name(name),
            score_threshold,
            retry: RetryPolicy::default(),
            client: Some(client),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }
}

#[cfg(feature = "mistral")]
fn initialize_client(config: &MistralEncoderConfig) -> Result<Box<dyn EmbeddingsClient>> {
    use crate::client::MistralClient;

    let api_key = resolve_api_key(config.api_key.as_deref(), |key| std::env::var(key).ok())?;
    let client = connect_client(|| {
        MistralClient::new(api_key, config.base_url.clone(), config.timeout)
    })?;
    tracing::info!("MistralAI client ready: {}", config.base_url);
    Ok(client)
}

#[cfg(not(feature = "mistral"))]
fn initialize_client(_config: &MistralEncoderConfig) -> Result<Box<dyn EmbeddingsClient>> {
    Err(EncoderError::DependencyMissing(
        "MistralEncoder needs the HTTP client. Enable it with the `mistral` feature: \
         `semroute-remote = { version = \"0.1\", features = [\"mistral\"] }`"
            .into(),
    ))
}

impl DenseEncoder for MistralEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn encoder_type(&self) -> EncoderType {
        EncoderType::Mistral
    }

    fn score_threshold(&self) -> Option<f64> {
        Some(self.score_threshold)
    }

    fn encode(&mut self, docs: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| EncoderError::Configuration("Mistral client not initialized".into()))?;
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let mut embeds: Option<EmbeddingResponse> = None;
        let mut error_message = String::new();

        for attempt in 0..self.retry.max_attempts {
            match client.embeddings(&self.name, docs) {
                Ok(response) => {
                    let has_data = !response.data.is_empty();
                    embeds = Some(response);
                    if has_data {
                        break;
                    }
                    // An empty answer is retried immediately, without sleeping
                    debug!("Empty embedding response (attempt {})", attempt + 1);
                }
                Err(ClientError::Transient(message)) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "MistralAI transient error (attempt {}/{}): {}. Sleeping {:?}",
                        attempt + 1,
                        self.retry.max_attempts,
                        message,
                        delay
                    );
                    std::thread::sleep(delay);
                    error_message = message;
                }
                Err(ClientError::Fatal(message)) => return Err(connection_error(message)),
            }
        }

        match embeds {
            Some(response) if !response.data.is_empty() => {
                Ok(response.data.into_iter().map(|obj| obj.embedding).collect())
            }
            _ => Err(EncoderError::EmptyResponse(error_message)),
        }
    }
}
