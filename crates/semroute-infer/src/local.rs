//! In-process dense encoder.

use std::path::PathBuf;

use semroute_core::config::{DEFAULT_BATCH_SIZE, DEFAULT_LOCAL_MODEL, DEFAULT_MODEL_ROOT};
use semroute_core::{
    select_device, ComputeDevice, DenseEncoder, DeviceProbe, EncoderError, EncoderType,
    LocalSettings, Result,
};
use tracing::{debug, info};

use crate::embedder::InferenceBackend;
use crate::pool::l2_normalize;

/// Maximum tokens per input before truncation.
pub const DEFAULT_MAX_SEQ_LEN: usize = 512;

/// Construction parameters for [`LocalEncoder`].
#[derive(Debug, Clone)]
pub struct LocalEncoderConfig {
    /// Model identifier, also the sub-directory of `model_root` holding it.
    pub name: String,
    /// `None` means auto-detect at construction.
    pub device: Option<ComputeDevice>,
    pub normalize_embeddings: bool,
    pub batch_size: usize,
    pub model_root: PathBuf,
    pub max_seq_len: usize,
    pub score_threshold: Option<f64>,
}

impl Default for LocalEncoderConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_LOCAL_MODEL.into(),
            device: None,
            normalize_embeddings: true,
            batch_size: DEFAULT_BATCH_SIZE,
            model_root: PathBuf::from(DEFAULT_MODEL_ROOT),
            max_seq_len: DEFAULT_MAX_SEQ_LEN,
            score_threshold: None,
        }
    }
}

impl From<&LocalSettings> for LocalEncoderConfig {
    fn from(settings: &LocalSettings) -> Self {
        Self {
            name: settings.name.clone(),
            device: settings.device,
            normalize_embeddings: settings.normalize_embeddings,
            batch_size: settings.batch_size,
            model_root: settings.model_root.clone(),
            ..Self::default()
        }
    }
}

impl LocalEncoderConfig {
    /// Directory holding this model's files: `<model_root>/<name>`.
    pub fn model_dir(&self) -> PathBuf {
        self.model_root.join(&self.name)
    }
}

/// Dense encoder backed by a locally loaded model.
pub struct LocalEncoder {
    config: LocalEncoderConfig,
    model: Box<dyn InferenceBackend>,
}

impl std::fmt::Debug for LocalEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEncoder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LocalEncoder {
    /// Load the configured ONNX model.
    ///
    /// Fails with `DependencyMissing` when the ONNX Runtime library cannot be
    /// loaded (see `ORT_DYLIB_PATH`).
    #[cfg(feature = "onnx")]
    pub fn new(config: LocalEncoderConfig) -> Result<Self> {
        use crate::onnx_embedder::{load_runtime, OnnxModel, OrtProbe};

        // OrtProbe already calls into the runtime
        load_runtime()?;
        Self::with_loader(config, &OrtProbe, |cfg, device| {
            let model = OnnxModel::load(&cfg.model_dir(), device, cfg.max_seq_len)?;
            Ok(Box::new(model) as Box<dyn InferenceBackend>)
        })
    }

    /// Load the configured ONNX model.
    ///
    /// Fails with `DependencyMissing` when built without the `onnx` feature.
    #[cfg(not(feature = "onnx"))]
    pub fn new(config: LocalEncoderConfig) -> Result<Self> {
        let _ = config;
        Err(EncoderError::DependencyMissing(
            "LocalEncoder needs the ONNX runtime. Enable it with the `onnx` feature: \
             `semroute-infer = { version = \"0.1\", features = [\"onnx\"] }`"
                .into(),
        ))
    }

    /// Resolve the device, then build the model handle with `loader`.
    ///
    /// An unset `config.device` is auto-detected through `probe` and written
    /// back into the config. An explicit device is passed through unchecked.
    pub fn with_loader<F>(mut config: LocalEncoderConfig, probe: &dyn DeviceProbe, loader: F) -> Result<Self>
    where
        F: FnOnce(&LocalEncoderConfig, ComputeDevice) -> Result<Box<dyn InferenceBackend>>,
    {
        let device = match config.device {
            Some(device) => device,
            None => {
                let device = select_device(probe);
                config.device = Some(device);
                device
            }
        };

        info!("Loading local model {} on {}", config.name, device);
        let model = loader(&config, device)?;

        Ok(Self { config, model })
    }

    /// Device the model was placed on.
    pub fn device(&self) -> ComputeDevice {
        self.model.device()
    }

    pub fn config(&self) -> &LocalEncoderConfig {
        &self.config
    }

    /// Embedding dimension, if the model reports it before the first call.
    pub fn dimension(&self) -> Option<usize> {
        self.model.dimension()
    }
}

impl DenseEncoder for LocalEncoder {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn encoder_type(&self) -> EncoderType {
        EncoderType::Local
    }

    fn score_threshold(&self) -> Option<f64> {
        self.config.score_threshold
    }

    /// Inference errors propagate as they come from the model; there is no retry.
    fn encode(&mut self, docs: &[String]) -> Result<Vec<Vec<f32>>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let batch_size = self.config.batch_size.max(1);
        let mut embeddings = Vec::with_capacity(docs.len());

        for (index, batch) in docs.chunks(batch_size).enumerate() {
            debug!("Encoding batch {} ({} docs)", index, batch.len());
            let mut vectors = self.model.embed_batch(batch)?;
            if vectors.len() != batch.len() {
                return Err(EncoderError::inference(format!(
                    "Model returned {} embeddings for a batch of {}",
                    vectors.len(),
                    batch.len()
                )));
            }
            if self.config.normalize_embeddings {
                vectors.iter_mut().for_each(|v| l2_normalize(v));
            }
            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct NoAccelerator;

    impl DeviceProbe for NoAccelerator {
        fn cuda_available(&self) -> bool {
            false
        }
        fn mps_available(&self) -> bool {
            false
        }
    }

    struct PanicProbe;

    impl DeviceProbe for PanicProbe {
        fn cuda_available(&self) -> bool {
            panic!("probe must not run for an explicit device")
        }
        fn mps_available(&self) -> bool {
            panic!("probe must not run for an explicit device")
        }
    }

    /// Embeds each text as `[len, index_in_batch + 1]`, recording batch sizes.
    struct RecordingBackend {
        device: ComputeDevice,
        batches: Arc<Mutex<Vec<usize>>>,
    }

    impl InferenceBackend for RecordingBackend {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batches.lock().push(texts.len());
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, t)| vec![t.len() as f32, (i + 1) as f32])
                .collect())
        }

        fn device(&self) -> ComputeDevice {
            self.device
        }
    }

    fn recording_encoder(config: LocalEncoderConfig) -> (LocalEncoder, Arc<Mutex<Vec<usize>>>) {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let recorded = batches.clone();
        let encoder = LocalEncoder::with_loader(config, &NoAccelerator, move |_, device| {
            Ok(Box::new(RecordingBackend { device, batches: recorded }) as Box<dyn InferenceBackend>)
        })
        .unwrap();
        (encoder, batches)
    }

    fn docs(n: usize) -> Vec<String> {
        (0..n).map(|i| "x".repeat(i + 1)).collect()
    }

    #[test]
    fn test_defaults() {
        let config = LocalEncoderConfig::default();
        assert_eq!(config.name, "BAAI/bge-small-en-v1.5");
        assert!(config.device.is_none());
        assert!(config.normalize_embeddings);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.model_dir(), PathBuf::from("models/BAAI/bge-small-en-v1.5"));
    }

    #[test]
    fn test_auto_detect_writes_back_cpu() {
        let (encoder, _) = recording_encoder(LocalEncoderConfig::default());
        assert_eq!(encoder.device(), ComputeDevice::Cpu);
        assert_eq!(encoder.config().device, Some(ComputeDevice::Cpu));
    }

    #[test]
    fn test_explicit_device_skips_probe() {
        let config = LocalEncoderConfig {
            device: Some(ComputeDevice::Cuda),
            ..Default::default()
        };
        let encoder = LocalEncoder::with_loader(config, &PanicProbe, |_, device| {
            assert_eq!(device, ComputeDevice::Cuda);
            Ok(Box::new(RecordingBackend {
                device,
                batches: Arc::new(Mutex::new(Vec::new())),
            }) as Box<dyn InferenceBackend>)
        })
        .unwrap();
        assert_eq!(encoder.device(), ComputeDevice::Cuda);
    }

    /// Places every model on one fixed device and reports a known dimension.
    struct FixedBackend(ComputeDevice);

    impl InferenceBackend for FixedBackend {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 384]).collect())
        }

        fn device(&self) -> ComputeDevice {
            self.0
        }

        fn dimension(&self) -> Option<usize> {
            Some(384)
        }
    }

    #[test]
    fn test_device_and_dimension_come_from_backend() {
        let config = LocalEncoderConfig {
            device: Some(ComputeDevice::Mps),
            ..Default::default()
        };
        let encoder = LocalEncoder::with_loader(config, &NoAccelerator, |_, _| {
            Ok(Box::new(FixedBackend(ComputeDevice::Cpu)) as Box<dyn InferenceBackend>)
        })
        .unwrap();
        assert_eq!(encoder.device(), ComputeDevice::Cpu);
        assert_eq!(encoder.dimension(), Some(384));
    }

    #[test]
    fn test_loader_failure_fails_construction() {
        let result = LocalEncoder::with_loader(LocalEncoderConfig::default(), &NoAccelerator, |_, _| {
            Err(EncoderError::inference("Model not found: models/missing/model.onnx"))
        });
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Model not found: models/missing/model.onnx");
    }

    #[test]
    fn test_batches_by_batch_size_and_preserves_order() {
        let config = LocalEncoderConfig {
            batch_size: 2,
            normalize_embeddings: false,
            ..Default::default()
        };
        let (mut encoder, batches) = recording_encoder(config);
        let input = docs(5);
        let out = encoder.encode(&input).unwrap();

        assert_eq!(*batches.lock(), vec![2, 2, 1]);
        assert_eq!(out.len(), 5);
        let lengths: Vec<f32> = out.iter().map(|v| v[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_normalized_output_has_unit_norm() {
        let (mut encoder, _) = recording_encoder(LocalEncoderConfig::default());
        let out = encoder.encode(&docs(40)).unwrap();
        assert_eq!(out.len(), 40);
        for v in &out {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() <= 1e-5, "norm={norm}");
        }
    }

    #[test]
    fn test_zero_batch_size_treated_as_one() {
        let config = LocalEncoderConfig {
            batch_size: 0,
            ..Default::default()
        };
        let (mut encoder, batches) = recording_encoder(config);
        encoder.encode(&docs(3)).unwrap();
        assert_eq!(*batches.lock(), vec![1, 1, 1]);
    }

    #[test]
    fn test_empty_input_skips_model() {
        let (mut encoder, batches) = recording_encoder(LocalEncoderConfig::default());
        assert!(encoder.encode(&[]).unwrap().is_empty());
        assert!(batches.lock().is_empty());
    }

    #[test]
    fn test_from_settings() {
        let settings = LocalSettings {
            device: Some(ComputeDevice::Mps),
            batch_size: 8,
            ..Default::default()
        };
        let config = LocalEncoderConfig::from(&settings);
        assert_eq!(config.device, Some(ComputeDevice::Mps));
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.max_seq_len, DEFAULT_MAX_SEQ_LEN);
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_new_without_onnx_is_dependency_missing() {
        let err = LocalEncoder::new(LocalEncoderConfig::default()).unwrap_err();
        match err {
            EncoderError::DependencyMissing(msg) => assert!(msg.contains("onnx")),
            other => panic!("expected DependencyMissing, got {other:?}"),
        }
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn test_unloadable_runtime_is_dependency_missing() {
        std::env::set_var(
            crate::onnx_embedder::ORT_DYLIB_PATH_ENV,
            "/nonexistent/libonnxruntime.so",
        );
        let tmp = tempfile::TempDir::new().unwrap();
        let model_dir = tmp.path().join("stub");
        std::fs::create_dir_all(&model_dir).unwrap();
        std::fs::write(model_dir.join("model.onnx"), b"stub").unwrap();
        std::fs::write(model_dir.join("tokenizer.json"), b"{}").unwrap();
        let config = LocalEncoderConfig {
            name: "stub".into(),
            model_root: tmp.path().to_path_buf(),
            ..Default::default()
        };

        let err = LocalEncoder::new(config).unwrap_err();
        match err {
            EncoderError::DependencyMissing(msg) => {
                assert!(msg.contains("/nonexistent/libonnxruntime.so"), "msg={msg}");
                assert!(msg.contains("ORT_DYLIB_PATH"), "msg={msg}");
            }
            other => panic!("expected DependencyMissing, got {other:?}"),
        }
    }
}
