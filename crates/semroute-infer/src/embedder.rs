//! Inference backend trait.
//!
//! An `InferenceBackend` is the model handle a `LocalEncoder` owns. The
//! ONNX implementation lives in `onnx_embedder` (feature `onnx`); tests and
//! alternative runtimes provide their own.

use semroute_core::{ComputeDevice, Result};

/// A loaded embedding model placed on a compute device.
pub trait InferenceBackend: Send + Sync {
    /// Embed one batch. Returns one raw (unnormalized) vector per input, in
    /// input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Device the model was placed on.
    fn device(&self) -> ComputeDevice;

    /// Embedding dimension, when known before the first call.
    fn dimension(&self) -> Option<usize> {
        None
    }
}
