//! semroute infer — local dense encoder.
//!
//! `LocalEncoder` owns an `InferenceBackend` placed on an auto-detected or
//! configured compute device. With the `onnx` feature, `OnnxModel` loads a
//! sentence-transformers ONNX export and tokenizer from disk. Without it,
//! `LocalEncoder::new` fails with `DependencyMissing`.

pub mod embedder;
pub mod local;
pub mod onnx_embedder;
pub mod pool;

pub use embedder::InferenceBackend;
pub use local::{LocalEncoder, LocalEncoderConfig, DEFAULT_MAX_SEQ_LEN};
pub use pool::{l2_normalize, Pooling};

#[cfg(feature = "onnx")]
pub use onnx_embedder::{load_runtime, OnnxModel, OrtProbe, ORT_DYLIB_PATH_ENV};
