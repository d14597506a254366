//! Greenlight API server.
//!
//! ```text
//!     Client Request
//!     ───────────▶ request id → trace → catch panic → timeout
//!                      → rate_limit (per-client token bucket)
//!                      → authenticate (bearer token → principal)
//!                      → handler ──▶ BackgroundTasks (notifications)
//!
//!     SIGINT/SIGTERM
//!     ───────────▶ Lifecycle: stop accepting → drain requests
//!                      → drain background tasks → exit 0
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use greenlight::config::validation::validate_config;
use greenlight::config::{load_config, ConfigError, LimiterOverrides, ServiceConfig};
use greenlight::lifecycle::{signals, Service};
use greenlight::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "greenlight", version, about = "Greenlight API server")]
struct Cli {
    /// TOML configuration file; watched for limiter changes
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API server port
    #[arg(long)]
    port: Option<u16>,

    /// Environment (development|staging|production)
    #[arg(long = "env")]
    environment: Option<String>,

    /// Rate limiter maximum requests per second
    #[arg(long)]
    limiter_rps: Option<f64>,

    /// Rate limiter maximum burst
    #[arg(long)]
    limiter_burst: Option<u32>,

    /// Enable rate limiter
    #[arg(long)]
    limiter_enabled: Option<bool>,
}

impl Cli {
    fn limiter_overrides(&self) -> LimiterOverrides {
        LimiterOverrides {
            requests_per_second: self.limiter_rps,
            burst: self.limiter_burst,
            enabled: self.limiter_enabled,
        }
    }

    fn apply(&self, config: &mut ServiceConfig) -> Result<(), ConfigError> {
        if let Some(port) = self.port {
            let mut addr: SocketAddr = config.listener.bind_address.parse().map_err(|e| {
                ConfigError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
            })?;
            addr.set_port(port);
            config.listener.bind_address = addr.to_string();
        }
        if let Some(environment) = &self.environment {
            config.environment = environment.clone();
        }
        self.limiter_overrides().apply(&mut config.limiter);
        validate_config(config).map_err(ConfigError::Validation)
    }
}

fn resolve_config(cli: &Cli) -> Result<ServiceConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    cli.apply(&mut config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("greenlight: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "greenlight starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = match TcpListener::bind(&config.listener.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %config.listener.bind_address, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    let mut service = Service::new(config);
    if let Some(path) = &cli.config {
        service = service.reload_from(path, cli.limiter_overrides());
    }

    match service.run(listener, signals::termination()).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Shutdown failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "greenlight",
            "--port",
            "4100",
            "--env",
            "staging",
            "--limiter-rps",
            "5",
            "--limiter-burst",
            "10",
            "--limiter-enabled",
            "false",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:4100");
        assert_eq!(config.environment, "staging");
        assert_eq!(config.limiter.requests_per_second, 5.0);
        assert_eq!(config.limiter.burst, 10);
        assert!(!config.limiter.enabled);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let cli = Cli::parse_from(["greenlight", "--env", "qa"]);
        assert!(matches!(resolve_config(&cli), Err(ConfigError::Validation(_))));
    }
}
