//! Provider defaults and encoder settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::capabilities::ComputeDevice;
use crate::encoder::EncoderType;
use crate::error::{EncoderError, Result};

/// Environment variable holding the Mistral API key.
pub const MISTRAL_API_KEY_ENV: &str = "MISTRALAI_API_KEY";
/// Environment variable overriding the local model root directory.
pub const MODEL_DIR_ENV: &str = "SEMROUTE_MODEL_DIR";
/// Environment variable selecting the encoder (`local` or `mistral`).
pub const ENCODER_ENV: &str = "SEMROUTE_ENCODER";
/// Environment variable pointing at a JSON settings file.
pub const CONFIG_PATH_ENV: &str = "SEMROUTE_CONFIG";

pub const DEFAULT_LOCAL_MODEL: &str = "BAAI/bge-small-en-v1.5";
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.82;
pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_MODEL_ROOT: &str = "models";

/// Hosted or local model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Local,
    Mistral,
    OpenAI,
    Cohere,
}

/// Default models for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderDefault {
    pub provider: Provider,
    pub embedding_model: &'static str,
    pub language_model: Option<&'static str>,
}

static ENCODER_DEFAULTS: &[EncoderDefault] = &[
    EncoderDefault {
        provider: Provider::Local,
        embedding_model: DEFAULT_LOCAL_MODEL,
        language_model: None,
    },
    EncoderDefault {
        provider: Provider::Mistral,
        embedding_model: "mistral-embed",
        language_model: Some("mistral-tiny"),
    },
    EncoderDefault {
        provider: Provider::OpenAI,
        embedding_model: "text-embedding-3-small",
        language_model: Some("gpt-4o-mini"),
    },
    EncoderDefault {
        provider: Provider::Cohere,
        embedding_model: "embed-english-v3.0",
        language_model: Some("command-r"),
    },
];

impl EncoderDefault {
    /// Look up the defaults for `provider`. Every provider has an entry.
    pub fn for_provider(provider: Provider) -> &'static EncoderDefault {
        ENCODER_DEFAULTS
            .iter()
            .find(|d| d.provider == provider)
            .unwrap_or(&ENCODER_DEFAULTS[0])
    }

    pub fn all() -> &'static [EncoderDefault] {
        ENCODER_DEFAULTS
    }
}

/// Settings for the local encoder as they appear in the settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSettings {
    #[serde(default = "default_local_model")]
    pub name: String,
    #[serde(default)]
    pub device: Option<ComputeDevice>,
    #[serde(default = "default_true")]
    pub normalize_embeddings: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_model_root")]
    pub model_root: PathBuf,
}

fn default_local_model() -> String {
    DEFAULT_LOCAL_MODEL.into()
}
fn default_true() -> bool {
    true
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_model_root() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_ROOT)
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            name: default_local_model(),
            device: None,
            normalize_embeddings: true,
            batch_size: DEFAULT_BATCH_SIZE,
            model_root: default_model_root(),
        }
    }
}

/// Settings for the Mistral encoder. The API key is left unset here so the
/// encoder's own environment fallback applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MistralSettings {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_score_threshold() -> f64 {
    DEFAULT_SCORE_THRESHOLD
}

impl Default for MistralSettings {
    fn default() -> Self {
        Self {
            name: None,
            api_key: None,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            base_url: None,
        }
    }
}

/// Top-level encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderSettings {
    #[serde(default = "default_encoder")]
    pub encoder: EncoderType,
    #[serde(default)]
    pub local: LocalSettings,
    #[serde(default)]
    pub mistral: MistralSettings,
}

fn default_encoder() -> EncoderType {
    EncoderType::Local
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            encoder: EncoderType::Local,
            local: LocalSettings::default(),
            mistral: MistralSettings::default(),
        }
    }
}

impl EncoderSettings {
    /// Load settings from an optional JSON file, then apply environment
    /// overrides. Without a path the defaults are used; a path that is
    /// missing or malformed is an error.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut settings = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EncoderError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let settings = serde_json::from_str(&raw).map_err(|e| {
            EncoderError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        info!("Loaded encoder settings from {}", path.display());
        Ok(settings)
    }

    /// Apply `SEMROUTE_ENCODER` and `SEMROUTE_MODEL_DIR` using `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(encoder) = lookup(ENCODER_ENV).filter(|v| !v.trim().is_empty()) {
            self.encoder = encoder.parse()?;
        }
        if let Some(dir) = lookup(MODEL_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.local.model_root = PathBuf::from(dir);
        }
        Ok(())
    }
}
