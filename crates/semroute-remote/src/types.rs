//! Wire types for the Mistral embeddings endpoint.

use serde::{Deserialize, Serialize};

/// Body of `POST /v1/embeddings`.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest<'a> {
    pub model: &'a str,
    pub input: &'a [String],
    pub encoding_format: &'a str,
}

/// One embedding in the response, tagged with its input position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingObject {
    #[serde(default = "default_object")]
    pub object: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub index: usize,
}

fn default_object() -> String {
    "embedding".into()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageInfo {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub data: Vec<EmbeddingObject>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub usage: UsageInfo,
}

impl EmbeddingResponse {
    /// Build a response holding `vectors` in order.
    pub fn from_vectors(model: impl Into<String>, vectors: Vec<Vec<f32>>) -> Self {
        Self {
            id: String::new(),
            object: "list".into(),
            data: vectors
                .into_iter()
                .enumerate()
                .map(|(index, embedding)| EmbeddingObject {
                    object: default_object(),
                    embedding,
                    index,
                })
                .collect(),
            model: model.into(),
            usage: UsageInfo::default(),
        }
    }
}
