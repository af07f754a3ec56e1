//! Command-line arguments for the API server.
//!
//! Every flag is optional; unset flags keep the value from the
//! environment (see [`ServerConfig::from_env`]).

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{Device, ServerConfig};

/// Execution device choices on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceArg {
    /// Pick the best available accelerator
    Auto,
    /// CPU only
    Cpu,
    /// NVIDIA CUDA
    Cuda,
    /// Apple CoreML
    Metal,
}

impl From<DeviceArg> for Device {
    fn from(arg: DeviceArg) -> Self {
        match arg {
            DeviceArg::Auto => Device::Auto,
            DeviceArg::Cpu => Device::Cpu,
            DeviceArg::Cuda => Device::Cuda,
            DeviceArg::Metal => Device::Metal,
        }
    }
}

/// audiocraft-api: REST API for music/audio generation, codec and discrimination models
#[derive(Parser, Debug)]
#[command(name = "audiocraft-api")]
#[command(about = "REST API over MusicGen, AudioGen, EnCodec, MultiBandDiffusion and discriminators")]
#[command(version)]
pub struct Cli {
    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Root directory containing one sub-directory of ONNX files per model
    #[arg(short, long)]
    pub model_dir: Option<PathBuf>,

    /// Execution device for inference
    #[arg(short, long, value_enum)]
    pub device: Option<DeviceArg>,

    /// Intra-op threads for ONNX Runtime
    #[arg(short, long)]
    pub threads: Option<u32>,

    /// Longest generation accepted, in seconds
    #[arg(long)]
    pub max_duration: Option<f32>,

    /// Download missing MusicGen model files before starting
    #[arg(long)]
    pub download: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Applies the flags that were given on top of `config`.
    pub fn apply(&self, mut config: ServerConfig) -> ServerConfig {
        if let Some(ref host) = self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ref path) = self.model_dir {
            config.model_path = Some(path.clone());
        }
        if let Some(device) = self.device {
            config.device = device.into();
        }
        if let Some(threads) = self.threads {
            config.threads = Some(threads);
        }
        if let Some(duration) = self.max_duration {
            config.max_duration_sec = duration;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_keep_config() {
        let cli = Cli::try_parse_from(["audiocraft-api"]).unwrap();
        let config = cli.apply(ServerConfig::default());
        assert_eq!(config.port, 8000);
        assert_eq!(config.device, Device::Auto);
        assert!(config.model_path.is_none());
        assert!(!cli.download);
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "audiocraft-api",
            "--port",
            "9000",
            "--model-dir",
            "/models",
            "--device",
            "cpu",
            "--threads",
            "2",
            "--max-duration",
            "12.5",
            "--download",
        ])
        .unwrap();
        let config = cli.apply(ServerConfig::default());
        assert_eq!(config.port, 9000);
        assert_eq!(config.model_path, Some(PathBuf::from("/models")));
        assert_eq!(config.device, Device::Cpu);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.max_duration_sec, 12.5);
        assert!(cli.download);
    }

    #[test]
    fn invalid_device_rejected() {
        assert!(Cli::try_parse_from(["audiocraft-api", "--device", "tpu"]).is_err());
    }
}
