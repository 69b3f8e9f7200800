//! Error types shared by all encoders.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    /// The backend for this encoder was not compiled in.
    #[error("Missing dependency: {0}")]
    DependencyMissing(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("No embeddings returned: {0}")]
    EmptyResponse(String),

    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    /// Error raised by the local inference library, passed through as is.
    #[error(transparent)]
    Inference(Box<dyn std::error::Error + Send + Sync>),
}

impl EncoderError {
    /// Wrap an inference library error without changing its message.
    pub fn inference<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Inference(err.into())
    }
}

pub type Result<T> = std::result::Result<T, EncoderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_is_transparent() {
        let err = EncoderError::inference("Failed to load tokenizer: no such file");
        assert_eq!(err.to_string(), "Failed to load tokenizer: no such file");
    }

    #[test]
    fn test_empty_response_carries_message() {
        let err = EncoderError::EmptyResponse("rate limited".into());
        assert_eq!(err.to_string(), "No embeddings returned: rate limited");
    }
}
