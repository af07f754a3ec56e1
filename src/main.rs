//! audiocraft-api server binary.
//!
//! Loads every model up front, then serves the REST API until Ctrl-C.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use audiocraft_api::api;
use audiocraft_api::cli::Cli;
use audiocraft_api::config::ServerConfig;
use audiocraft_api::models::{ensure_models, load_registry};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("audiocraft_api=info")),
        )
        .init();

    let cli = Cli::parse_args();
    let config = cli.apply(ServerConfig::from_env());
    if let Some(problem) = config.validate() {
        anyhow::bail!("invalid configuration: {}", problem);
    }

    tracing::info!(
        model_path = %config.effective_model_path().display(),
        device = ?config.device,
        max_duration_sec = config.max_duration_sec,
        "starting audiocraft-api"
    );

    if cli.download {
        ensure_models(&config.model_dir("musicgen")).context("model download failed")?;
    }

    let registry = load_registry(&config).context("failed to load models")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(api::serve(&config, registry))?;
    Ok(())
}
