use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Compute device a model is loaded onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Cuda,
    Mps,
    Cpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Mps => "mps",
            Device::Cpu => "cpu",
        }
    }

    /// GPU first, then the Apple accelerator, else CPU.
    pub fn select(cuda_available: bool, mps_available: bool) -> Self {
        if cuda_available {
            Device::Cuda
        } else if mps_available {
            Device::Mps
        } else {
            Device::Cpu
        }
    }

    pub fn detect() -> Self {
        Self::select(cuda_available(), mps_available())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    #[default]
    Auto,
    Fixed(Device),
}

impl DevicePreference {
    pub fn resolve(&self) -> Device {
        match self {
            DevicePreference::Auto => Device::detect(),
            DevicePreference::Fixed(Device::Mps) if !mps_available() => {
                tracing::warn!("MPS not available. Falling back to CPU.");
                Device::Cpu
            }
            DevicePreference::Fixed(device) => *device,
        }
    }
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(DevicePreference::Auto),
            "cuda" | "gpu" => Ok(DevicePreference::Fixed(Device::Cuda)),
            "mps" => Ok(DevicePreference::Fixed(Device::Mps)),
            "mpx" => {
                tracing::info!("Device 'mpx' detected, treating it as 'mps'.");
                Ok(DevicePreference::Fixed(Device::Mps))
            }
            "cpu" => Ok(DevicePreference::Fixed(Device::Cpu)),
            other => Err(format!(
                "unknown device '{}' (expected auto, cuda, mps or cpu)",
                other
            )),
        }
    }
}

fn cuda_available() -> bool {
    which::which("nvidia-smi").is_ok() || Path::new("/dev/nvidiactl").exists()
}

fn mps_available() -> bool {
    cfg!(all(target_os = "macos", target_arch = "aarch64"))
}
