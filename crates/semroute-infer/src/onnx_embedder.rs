//! ONNX-based embedding model.
//!
//! Loads a sentence-transformers model exported to ONNX together with its
//! HuggingFace tokenizer and runs batched inference on the requested device.
//! Requires the `onnx` feature.

#[cfg(feature = "onnx")]
mod inner {
    use std::path::{Path, PathBuf};

    use ndarray::{Array2, ArrayView2, ArrayView3};
    use ort::ep::{CoreML, ExecutionProvider, CUDA};
    use ort::session::{Session, SessionInputValue};
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use semroute_core::{ComputeDevice, DeviceProbe, EncoderError, Result, SystemProbe};
    use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
    use tracing::{debug, info};

    use crate::embedder::InferenceBackend;
    use crate::pool::{pool, Pooling};

    /// Environment variable naming the ONNX Runtime shared library.
    pub const ORT_DYLIB_PATH_ENV: &str = "ORT_DYLIB_PATH";

    #[cfg(target_os = "windows")]
    const DEFAULT_ORT_LIBRARY: &str = "onnxruntime.dll";
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    const DEFAULT_ORT_LIBRARY: &str = "libonnxruntime.dylib";
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "ios")))]
    const DEFAULT_ORT_LIBRARY: &str = "libonnxruntime.so";

    fn ort_error<E: std::fmt::Display>(e: E) -> EncoderError {
        EncoderError::inference(e.to_string())
    }

    /// Shared library to load: `lookup(ORT_DYLIB_PATH)` if set, else the
    /// platform's default library name.
    pub fn runtime_library_path<F>(lookup: F) -> PathBuf
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(ORT_DYLIB_PATH_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ORT_LIBRARY))
    }

    /// Load the ONNX Runtime library.
    ///
    /// Must run before any other ORT call: ort panics on first use when it
    /// has to load the library itself and cannot. Loading is process-wide;
    /// later calls are no-ops once it succeeded.
    pub fn load_runtime() -> Result<()> {
        let path = runtime_library_path(|key| std::env::var(key).ok());
        let builder = ort::init_from(&path).map_err(|e| {
            EncoderError::DependencyMissing(format!(
                "ONNX Runtime could not be loaded from {} ({}). Install onnxruntime \
                 or set {} to the path of the shared library.",
                path.display(),
                e,
                ORT_DYLIB_PATH_ENV
            ))
        })?;
        builder.commit();
        debug!("ONNX Runtime loaded from {}", path.display());
        Ok(())
    }

    /// Device probe that also asks ONNX Runtime whether the matching
    /// execution provider is usable. Call [`load_runtime`] first.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct OrtProbe;

    impl DeviceProbe for OrtProbe {
        fn cuda_available(&self) -> bool {
            SystemProbe.cuda_available()
                && CUDA::default().is_available().unwrap_or(false)
        }

        fn mps_available(&self) -> bool {
            SystemProbe.mps_available()
                && CoreML::default().is_available().unwrap_or(false)
        }
    }

    /// ONNX Runtime session plus tokenizer for one embedding model.
    pub struct OnnxModel {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
        input_names: Vec<String>,
        pooling: Pooling,
        device: ComputeDevice,
        dimension: Option<usize>,
    }

    impl OnnxModel {
        /// Load a model from `model_dir` and place it on `device`.
        ///
        /// Expects:
        /// - `model_dir/model.onnx` — the ONNX model file
        /// - `model_dir/tokenizer.json` — the HuggingFace tokenizer
        /// - optionally `model_dir/1_Pooling/config.json`
        ///
        /// The device is not validated here; an unusable execution provider
        /// fails inside ONNX Runtime.
        pub fn load(model_dir: &Path, device: ComputeDevice, max_seq_len: usize) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(EncoderError::inference(format!(
                    "Model not found: {}",
                    model_path.display()
                )));
            }
            if !tokenizer_path.exists() {
                return Err(EncoderError::inference(format!(
                    "Tokenizer not found: {}",
                    tokenizer_path.display()
                )));
            }

            load_runtime()?;

            let mut builder = Session::builder().map_err(ort_error)?;
            builder = match device {
                ComputeDevice::Cuda => builder
                    .with_execution_providers([CUDA::default()
                        .build()
                        .error_on_failure()])
                    .map_err(ort_error)?,
                ComputeDevice::Mps => builder
                    .with_execution_providers([CoreML::default()
                        .build()
                        .error_on_failure()])
                    .map_err(ort_error)?,
                ComputeDevice::Cpu => builder,
            };
            let session = builder
                .with_intra_threads(2)
                .map_err(ort_error)?
                .commit_from_file(&model_path)
                .map_err(ort_error)?;

            let mut tokenizer =
                Tokenizer::from_file(&tokenizer_path).map_err(EncoderError::Inference)?;
            let padding = tokenizer
                .get_padding()
                .cloned()
                .map(|mut p| {
                    p.strategy = PaddingStrategy::BatchLongest;
                    p
                })
                .unwrap_or_else(PaddingParams::default);
            tokenizer.with_padding(Some(padding));
            tokenizer
                .with_truncation(Some(TruncationParams {
                    max_length: max_seq_len,
                    ..Default::default()
                }))
                .map_err(EncoderError::Inference)?;

            let pooling = Pooling::from_model_dir(model_dir);
            let input_names: Vec<String> =
                session.inputs().iter().map(|i| i.name().to_string()).collect();
            // Hidden size is the last output dimension; -1 when dynamic
            let dimension = session
                .outputs()
                .first()
                .and_then(|o| o.dtype().tensor_shape())
                .and_then(|shape| shape.last().copied())
                .filter(|&d| d > 0)
                .map(|d| d as usize);

            info!(
                "ONNX model loaded: model={}, device={}, pooling={:?}, inputs={:?}",
                model_path.display(),
                device,
                pooling,
                input_names
            );

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
                input_names,
                pooling,
                device,
                dimension,
            })
        }
    }

    impl InferenceBackend for OnnxModel {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
            let encodings = self
                .tokenizer
                .encode_batch(inputs, true)
                .map_err(EncoderError::Inference)?;

            // Batch-longest padding gives every encoding the same length
            let batch = encodings.len();
            let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);

            let mut ids = Vec::with_capacity(batch * seq_len);
            let mut mask = Vec::with_capacity(batch * seq_len);
            let mut type_ids = Vec::with_capacity(batch * seq_len);
            for enc in &encodings {
                ids.extend(enc.get_ids().iter().map(|&v| v as i64));
                mask.extend(enc.get_attention_mask().iter().map(|&v| v as i64));
                type_ids.extend(enc.get_type_ids().iter().map(|&v| v as i64));
            }
            let mask_f32: Vec<f32> = mask.iter().map(|&m| m as f32).collect();

            // Bind by name: not every export takes token_type_ids
            let mut ids = Some(ids);
            let mut mask = Some(mask);
            let mut type_ids = Some(type_ids);
            let mut inputs: Vec<(String, SessionInputValue<'static>)> =
                Vec::with_capacity(self.input_names.len());
            for name in &self.input_names {
                let data = match name.as_str() {
                    "input_ids" => ids.take(),
                    "attention_mask" => mask.take(),
                    "token_type_ids" => type_ids.take(),
                    other => {
                        return Err(EncoderError::inference(format!(
                            "Unsupported model input: {}",
                            other
                        )))
                    }
                };
                let data = data.ok_or_else(|| {
                    EncoderError::inference(format!("Duplicate model input: {}", name))
                })?;
                let tensor = Tensor::from_array(([batch, seq_len], data)).map_err(ort_error)?;
                inputs.push((name.clone(), tensor.into()));
            }

            debug!("ONNX inference: batch={}, seq_len={}", batch, seq_len);

            let mut session = self.session.lock();
            let outputs = session.run(inputs).map_err(ort_error)?;

            // Sentence-transformers exports output either:
            //   [batch, seq_len, dim] (token embeddings) -> pooled here
            //   [batch, dim] (sentence embedding) -> already pooled
            let (shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(ort_error)?;
            let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();

            let pooled = match dims.as_slice() {
                &[b, t, h] => {
                    let hidden =
                        ArrayView3::from_shape((b, t, h), data).map_err(EncoderError::inference)?;
                    let attention = Array2::from_shape_vec((batch, seq_len), mask_f32)
                        .map_err(EncoderError::inference)?;
                    pool(hidden, attention.view(), self.pooling)
                }
                &[b, h] => ArrayView2::from_shape((b, h), data)
                    .map_err(EncoderError::inference)?
                    .to_owned(),
                other => {
                    return Err(EncoderError::inference(format!(
                        "Unexpected output shape: {:?}",
                        other
                    )))
                }
            };

            Ok(pooled.outer_iter().map(|row| row.to_vec()).collect())
        }

        fn device(&self) -> ComputeDevice {
            self.device
        }

        fn dimension(&self) -> Option<usize> {
            self.dimension
        }
    }

}

#[cfg(feature = "onnx")]
pub use inner::{load_runtime, runtime_library_path, OnnxModel, OrtProbe, ORT_DYLIB_PATH_ENV};
