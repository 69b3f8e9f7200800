//! Token pooling and vector normalization.

use std::path::Path;

use ndarray::{Array2, ArrayView2, ArrayView3, ArrayViewMut1, Axis};
use serde::Deserialize;
use tracing::debug;

/// How token embeddings collapse into one sentence embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pooling {
    /// Mask-weighted mean over all tokens.
    #[default]
    Mean,
    /// First token (`[CLS]`) only.
    Cls,
}

/// Subset of sentence-transformers' `1_Pooling/config.json`.
#[derive(Debug, Deserialize)]
struct PoolingConfig {
    #[serde(default)]
    pooling_mode_cls_token: bool,
}

impl Pooling {
    /// Read the pooling mode from a sentence-transformers model directory.
    /// Falls back to mean pooling when the file is absent or unreadable.
    pub fn from_model_dir(model_dir: &Path) -> Self {
        let path = model_dir.join("1_Pooling").join("config.json");
        let pooling = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str::<PoolingConfig>(&s).ok())
            .map(|c| if c.pooling_mode_cls_token { Pooling::Cls } else { Pooling::Mean })
            .unwrap_or_default();
        debug!("Pooling mode for {}: {:?}", model_dir.display(), pooling);
        pooling
    }
}

/// Pool `[batch, seq, dim]` token embeddings into `[batch, dim]`.
///
/// `attention_mask` is `[batch, seq]` with 1.0 for real tokens and 0.0 for padding.
pub fn pool(hidden: ArrayView3<f32>, attention_mask: ArrayView2<f32>, pooling: Pooling) -> Array2<f32> {
    match pooling {
        Pooling::Cls => hidden.index_axis(Axis(1), 0).to_owned(),
        Pooling::Mean => {
            let mask = attention_mask.insert_axis(Axis(2));
            let summed = (&hidden * &mask).sum_axis(Axis(1));
            let counts = attention_mask
                .sum_axis(Axis(1))
                .mapv(|c| c.max(1e-9))
                .insert_axis(Axis(1));
            &summed / &counts
        }
    }
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let mut view = ArrayViewMut1::from(v);
    let norm = view.dot(&view).sqrt();
    if norm > 1e-12 {
        view.mapv_inplace(|x| x / norm);
    }
}
