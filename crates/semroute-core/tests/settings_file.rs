use std::path::PathBuf;

use semroute_core::{ComputeDevice, EncoderError, EncoderSettings, EncoderType};

#[test]
fn test_settings_file_round_trip() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("encoders.json");
    std::fs::write(
        &path,
        r#"{
            "encoder": "local",
            "local": {
                "name": "sentence-transformers/all-MiniLM-L6-v2",
                "device": "cpu",
                "normalize_embeddings": false,
                "batch_size": 4,
                "model_root": "/srv/models"
            },
            "mistral": { "name": "mistral-embed", "score_threshold": 0.5 }
        }"#,
    )
    .unwrap();

    let settings = EncoderSettings::from_file(&path).unwrap();
    assert_eq!(settings.encoder, EncoderType::Local);
    assert_eq!(settings.local.name, "sentence-transformers/all-MiniLM-L6-v2");
    assert_eq!(settings.local.device, Some(ComputeDevice::Cpu));
    assert!(!settings.local.normalize_embeddings);
    assert_eq!(settings.local.batch_size, 4);
    assert_eq!(settings.local.model_root, PathBuf::from("/srv/models"));
    assert_eq!(settings.mistral.name.as_deref(), Some("mistral-embed"));
    assert_eq!(settings.mistral.score_threshold, 0.5);
}

#[test]
fn test_malformed_settings_file_is_configuration_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("broken.json");
    std::fs::write(&path, "{ encoder: ").unwrap();

    let err = EncoderSettings::from_file(&path).unwrap_err();
    assert!(matches!(err, EncoderError::Configuration(_)), "got {err:?}");
}

#[test]
fn test_unknown_device_in_file_rejected() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("tpu.json");
    std::fs::write(&path, r#"{"local": {"device": "tpu"}}"#).unwrap();

    assert!(EncoderSettings::from_file(&path).is_err());
}

#[test]
fn test_explicit_missing_settings_file_is_configuration_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("typo.json");

    let err = EncoderSettings::load(Some(&path)).unwrap_err();
    match err {
        EncoderError::Configuration(msg) => assert!(msg.contains("typo.json"), "msg={msg}"),
        other => panic!("expected Configuration, got {other:?}"),
    }
}
