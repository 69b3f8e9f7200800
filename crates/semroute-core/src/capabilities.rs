//! Compute device detection for local inference.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EncoderError, Result};

/// Where a local model runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    /// NVIDIA GPU via CUDA.
    Cuda,
    /// Apple silicon accelerator.
    Mps,
    Cpu,
}

impl ComputeDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cuda => "cuda",
            Self::Mps => "mps",
            Self::Cpu => "cpu",
        }
    }
}

impl std::fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ComputeDevice {
    type Err = EncoderError;

    /// Parses the device name only. Whether the device exists is left to the
    /// inference library.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cuda" => Ok(Self::Cuda),
            "mps" => Ok(Self::Mps),
            "cpu" => Ok(Self::Cpu),
            other => Err(EncoderError::InvalidDevice(other.to_string())),
        }
    }
}

/// Answers whether each accelerator backend can be used on this machine.
pub trait DeviceProbe {
    fn cuda_available(&self) -> bool;
    fn mps_available(&self) -> bool;
}

/// Probe that inspects the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl DeviceProbe for SystemProbe {
    fn cuda_available(&self) -> bool {
        #[cfg(target_os = "linux")]
        {
            use std::fs;
            // Discrete NVIDIA GPU, or Jetson's integrated one
            fs::metadata("/dev/nvidia0").is_ok() || fs::metadata("/dev/nvhost-gpu").is_ok()
        }
        #[cfg(target_os = "windows")]
        {
            std::env::var_os("CUDA_PATH").is_some()
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows")))]
        {
            false
        }
    }

    fn mps_available(&self) -> bool {
        cfg!(all(target_os = "macos", target_arch = "aarch64"))
    }
}

/// Pick a device in priority order: CUDA, then MPS, then CPU.
pub fn select_device(probe: &dyn DeviceProbe) -> ComputeDevice {
    let device = if probe.cuda_available() {
        ComputeDevice::Cuda
    } else if probe.mps_available() {
        ComputeDevice::Mps
    } else {
        ComputeDevice::Cpu
    };
    info!("Auto-detected compute device: {}", device);
    device
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe {
        cuda: bool,
        mps: bool,
    }

    impl DeviceProbe for FixedProbe {
        fn cuda_available(&self) -> bool {
            self.cuda
        }
        fn mps_available(&self) -> bool {
            self.mps
        }
    }

    #[test]
    fn test_cuda_wins_over_mps() {
        let probe = FixedProbe { cuda: true, mps: true };
        assert_eq!(select_device(&probe), ComputeDevice::Cuda);
    }

    #[test]
    fn test_mps_before_cpu() {
        let probe = FixedProbe { cuda: false, mps: true };
        assert_eq!(select_device(&probe), ComputeDevice::Mps);
    }

    #[test]
    fn test_cpu_fallback() {
        let probe = FixedProbe { cuda: false, mps: false };
        assert_eq!(select_device(&probe), ComputeDevice::Cpu);
    }

    #[test]
    fn test_parse_device() {
        assert_eq!("CUDA".parse::<ComputeDevice>().unwrap(), ComputeDevice::Cuda);
        assert_eq!("mps".parse::<ComputeDevice>().unwrap(), ComputeDevice::Mps);
        assert_eq!(" cpu".parse::<ComputeDevice>().unwrap(), ComputeDevice::Cpu);
        assert!(matches!(
            "tpu".parse::<ComputeDevice>(),
            Err(EncoderError::InvalidDevice(d)) if d == "tpu"
        ));
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&ComputeDevice::Mps).unwrap();
        assert_eq!(json, "\"mps\"");
    }
}
