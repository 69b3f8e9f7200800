//! semroute remote — dense encoder over the Mistral embeddings API.
//!
//! `MistralEncoder` resolves its model name and API key at construction,
//! sends each `encode` call as a single request, and retries transient
//! failures a bounded number of times with exponential sleeps. The HTTP
//! client is behind the default `mistral` feature.

pub mod client;
pub mod mistral;
pub mod retry;
pub mod types;

pub use client::{status_error, ClientError, EmbeddingsClient};
pub use mistral::{connect_client, MistralEncoder, MistralEncoderConfig, DEFAULT_BASE_URL};
pub use retry::RetryPolicy;
pub use types::{EmbeddingObject, EmbeddingResponse};

#[cfg(feature = "mistral")]
pub use client::MistralClient;
