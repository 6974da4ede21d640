//! # parley
//!
//! Voice call bridge binary: loads settings, wires the OpenAI-compatible
//! backend into the call controller, and serves the carrier webhooks.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use parley_core::ApiKey;
use parley_engine::CallController;
use parley_llm::{OpenAiConfig, OpenAiProvider};
use parley_server::ServerConfig;
use parley_settings::ParleySettings;
use parley_telemetry::{init_telemetry, parse_level, TelemetryConfig};

/// Voice call bridge server.
#[derive(Parser, Debug)]
#[command(name = "parley", about = "Voice call bridge server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to ~/.parley/settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Force JSON log lines.
    #[arg(long)]
    log_json: bool,
}

fn load(cli: &Cli) -> Result<ParleySettings> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(parley_settings::settings_path);
    let mut settings = parley_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    if let Some(host) = &cli.host {
        settings.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if cli.log_json {
        settings.logging.json = true;
    }
    Ok(settings)
}

fn telemetry_config(settings: &ParleySettings) -> TelemetryConfig {
    TelemetryConfig {
        log_level: parse_level(&settings.logging.level),
        module_levels: settings
            .logging
            .modules
            .iter()
            .map(|(module, level)| (module.clone(), parse_level(level)))
            .collect(),
        json: settings.logging.json,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(&cli)?;
    let _telemetry = init_telemetry(telemetry_config(&settings));

    let api_key = ApiKey::from_env(&settings.llm.api_key_env).with_context(|| {
        format!(
            "{} is not set; the generative backend needs an API key",
            settings.llm.api_key_env
        )
    })?;
    let provider = OpenAiProvider::new(
        OpenAiConfig {
            base_url: settings.llm.base_url.clone(),
            model: settings.llm.model.clone(),
            timeout: Duration::from_secs(settings.llm.timeout_secs),
        },
        api_key,
    )
    .context("Failed to build the generative backend client")?;
    tracing::info!(
        model = %settings.llm.model,
        endpoint = provider.endpoint(),
        "generative backend configured"
    );

    let controller = Arc::new(CallController::new(&settings, Arc::new(provider)));
    let handle = parley_server::start(ServerConfig::from_settings(&settings), controller)
        .await
        .context("Failed to start server")?;
    tracing::info!(port = handle.port, "parley ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;
    tracing::info!("shutdown signal received");
    handle.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_settings() {
        let dir = std::env::temp_dir().join("parley-cli-test-missing");
        let cli = Cli::parse_from([
            "parley",
            "--port",
            "8081",
            "--host",
            "127.0.0.1",
            "--settings",
            dir.join("settings.json").to_str().unwrap(),
            "--log-json",
        ]);
        let settings = load(&cli).unwrap();
        assert_eq!(settings.server.port, 8081);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert!(settings.logging.json);
    }

    #[test]
    fn telemetry_levels_from_settings() {
        let mut settings = ParleySettings::default();
        settings.logging.level = "debug".into();
        settings
            .logging
            .modules
            .insert("parley_llm".into(), "trace".into());
        let config = telemetry_config(&settings);
        assert_eq!(config.log_level, tracing::Level::DEBUG);
        assert_eq!(
            config.module_levels,
            vec![("parley_llm".to_string(), tracing::Level::TRACE)]
        );
    }
}
