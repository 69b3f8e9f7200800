//! The dense encoder contract implemented by every backend.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Discriminator tag for encoder implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderType {
    Local,
    Mistral,
}

impl std::fmt::Display for EncoderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncoderType::Local => write!(f, "local"),
            EncoderType::Mistral => write!(f, "mistral"),
        }
    }
}

impl std::str::FromStr for EncoderType {
    type Err = crate::EncoderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(EncoderType::Local),
            "mistral" => Ok(EncoderType::Mistral),
            other => Err(crate::EncoderError::Configuration(format!(
                "Unknown encoder type: {}",
                other
            ))),
        }
    }
}

/// Turns an ordered list of documents into an ordered list of dense vectors.
///
/// `encode` takes `&mut self`: an encoder owns its model or client handle
/// and serves one call at a time.
pub trait DenseEncoder: Send {
    /// Model identifier.
    fn name(&self) -> &str;

    fn encoder_type(&self) -> EncoderType;

    /// Similarity cutoff used by routing consumers. Not used by the encoder.
    fn score_threshold(&self) -> Option<f64> {
        None
    }

    /// Encode `docs`. On success the output has exactly `docs.len()` vectors,
    /// element `i` belonging to `docs[i]`.
    fn encode(&mut self, docs: &[String]) -> Result<Vec<Vec<f32>>>;
}
