//! Server configuration module.
//!
//! Contains the runtime configuration for the API server: listen address,
//! model locations, execution device and generation limits.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Execution device for ONNX inference.
///
/// Determines which hardware backend to use for model inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Automatically detect and use the best available device.
    /// Priority: CUDA > Metal (CoreML) > CPU
    #[default]
    Auto,

    /// Force CPU execution.
    Cpu,

    /// Use CUDA for NVIDIA GPU acceleration.
    Cuda,

    /// Use Metal/CoreML for Apple Silicon acceleration.
    Metal,
}

impl Device {
    /// Returns the string representation of the device.
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Auto => "auto",
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Metal => "metal",
        }
    }

    /// Parses a device from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Device::Auto),
            "cpu" => Some(Device::Cpu),
            "cuda" => Some(Device::Cuda),
            "metal" | "coreml" => Some(Device::Metal),
            _ => None,
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Default longest generation accepted, in seconds.
pub const DEFAULT_MAX_DURATION_SEC: f32 = 30.0;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8000;

/// Runtime configuration for the server.
///
/// Built from environment variables, then overridden by command-line flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Root directory holding one sub-directory per model
    /// (`musicgen/`, `audiogen/`, `encodec/`, `multiband/`, `mpd/`, ...).
    /// If None, uses the platform-specific default cache location.
    pub model_path: Option<PathBuf>,

    /// Execution device for inference.
    pub device: Device,

    /// Number of threads for intra-op parallelism in ONNX Runtime.
    /// If None, uses ONNX Runtime's default.
    pub threads: Option<u32>,

    /// Longest generation a request may ask for, in seconds.
    pub max_duration_sec: f32,
}

impl ServerConfig {
    /// Creates a ServerConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ServerConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `AUDIOCRAFT_HOST` - Bind address
    /// - `AUDIOCRAFT_PORT` - Listen port
    /// - `AUDIOCRAFT_MODEL_PATH` - Root model directory
    /// - `AUDIOCRAFT_DEVICE` - Device selection (auto, cpu, cuda, metal)
    /// - `AUDIOCRAFT_THREADS` - Number of threads for CPU execution
    /// - `AUDIOCRAFT_MAX_DURATION` - Longest generation in seconds
    ///
    /// Falls back to defaults for unset or unparsable variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("AUDIOCRAFT_HOST") {
            if !host.trim().is_empty() {
                config.host = host;
            }
        }

        if let Ok(port_str) = std::env::var("AUDIOCRAFT_PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                config.port = port;
            }
        }

        if let Ok(path) = std::env::var("AUDIOCRAFT_MODEL_PATH") {
            config.model_path = Some(PathBuf::from(path));
        }

        if let Ok(device_str) = std::env::var("AUDIOCRAFT_DEVICE") {
            if let Some(device) = Device::parse(&device_str) {
                config.device = device;
            }
        }

        if let Ok(threads_str) = std::env::var("AUDIOCRAFT_THREADS") {
            if let Ok(threads) = threads_str.parse::<u32>() {
                if threads > 0 {
                    config.threads = Some(threads);
                }
            }
        }

        if let Ok(duration_str) = std::env::var("AUDIOCRAFT_MAX_DURATION") {
            if let Ok(duration) = duration_str.parse::<f32>() {
                if duration.is_finite() && duration > 0.0 {
                    config.max_duration_sec = duration;
                }
            }
        }

        config
    }

    /// Returns the effective model root, using platform defaults if not specified.
    pub fn effective_model_path(&self) -> PathBuf {
        if let Some(ref path) = self.model_path {
            path.clone()
        } else {
            default_model_path()
        }
    }

    /// Returns the directory of one named model.
    pub fn model_dir(&self, name: &str) -> PathBuf {
        self.effective_model_path().join(name)
    }

    /// Host and port as `host:port`, for logging.
    ///
    /// The host may be a name such as `localhost`; it is resolved when the
    /// listener binds.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if let Some(threads) = self.threads {
            if threads == 0 {
                return Some("threads must be > 0".to_string());
            }
            if threads > 256 {
                return Some(format!("threads too high: {} (max 256)", threads));
            }
        }

        if !self.max_duration_sec.is_finite() || self.max_duration_sec <= 0.0 {
            return Some(format!(
                "max duration must be a positive number of seconds, got {}",
                self.max_duration_sec
            ));
        }

        if self.host.trim().is_empty() || self.host.chars().any(char::is_whitespace) {
            return Some(format!("invalid listen host '{}'", self.host));
        }

        None
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            model_path: None,
            device: Device::Auto,
            threads: None,
            max_duration_sec: DEFAULT_MAX_DURATION_SEC,
        }
    }
}

/// Returns the platform-specific default model storage path.
///
/// - macOS: ~/Library/Caches/audiocraft-api/models
/// - Linux: ~/.cache/audiocraft-api/models
/// - Windows: C:\Users\<user>\AppData\Local\audiocraft-api\cache\models
fn default_model_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "audiocraft-api") {
        proj_dirs.cache_dir().join("models")
    } else {
        PathBuf::from("./models")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_parsing() {
        assert_eq!(Device::parse("auto"), Some(Device::Auto));
        assert_eq!(Device::parse("CPU"), Some(Device::Cpu));
        assert_eq!(Device::parse("cuda"), Some(Device::Cuda));
        assert_eq!(Device::parse("coreml"), Some(Device::Metal));
        assert_eq!(Device::parse("tpu"), None);
    }

    #[test]
    fn device_display() {
        assert_eq!(Device::Auto.to_string(), "auto");
        assert_eq!(Device::Metal.to_string(), "metal");
    }

    #[test]
    fn config_validation() {
        let mut config = ServerConfig::new();
        assert!(config.validate().is_none());

        config.threads = Some(0);
        assert!(config.validate().is_some());

        config.threads = Some(4);
        assert!(config.validate().is_none());

        config.max_duration_sec = 0.0;
        assert!(config.validate().is_some());

        config.max_duration_sec = 30.0;
        config.host = "not a host".to_string();
        assert!(config.validate().is_some());

        config.host = String::new();
        assert!(config.validate().is_some());
    }

    #[test]
    fn hostnames_are_valid_hosts() {
        for host in ["localhost", "127.0.0.1", "::1", "api.internal"] {
            let config = ServerConfig {
                host: host.to_string(),
                ..ServerConfig::default()
            };
            assert!(config.validate().is_none(), "{}", host);
        }
    }

    #[test]
    fn model_dirs_are_under_root() {
        let config = ServerConfig {
            model_path: Some(PathBuf::from("/srv/models")),
            ..ServerConfig::default()
        };
        assert_eq!(config.model_dir("encodec"), PathBuf::from("/srv/models/encodec"));
    }

    #[test]
    fn default_paths_non_empty() {
        let config = ServerConfig::new();
        assert!(!config.effective_model_path().as_os_str().is_empty());
    }

    #[test]
    fn listen_address_default() {
        let config = ServerConfig::new();
        assert_eq!(config.listen_address(), "0.0.0.0:8000");
    }
}
