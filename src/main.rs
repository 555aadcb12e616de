//! HTTP request mirror.
//!
//! Answers `GET|POST|PUT|DELETE /mirror` with a JSON document describing the
//! request exactly as the server observed it: method, URL, headers, query
//! arguments, form fields, body, cookies, uploaded files, parsed JSON and the
//! request context variables.
//!
//! ```text
//!     Client ──▶ proxy / load balancer ──▶ ┌───────────────────────────┐
//!                                          │ trace → timeout → limits  │
//!                                          │        ▼                  │
//!     Client ◀── JSON report ◀──────────── │ mirror handler → policy   │
//!                                          └───────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use http_mirror::config::{load_config, validate_config, ConfigError, MirrorConfig};
use http_mirror::lifecycle::startup;
use http_mirror::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "http-mirror", version)]
#[command(about = "Reflects HTTP requests back as JSON", long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address (e.g. 127.0.0.1:5000).
    #[arg(short, long)]
    bind: Option<String>,

    /// Mirror client addresses and forwarding headers, no security headers.
    #[arg(long)]
    permissive: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => MirrorConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if cli.permissive {
        config.security.strict_headers = false;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.observability)?;

    tracing::info!("http-mirror v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        strict_headers = config.security.strict_headers,
        max_body_size = config.security.max_body_size,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );
    if !config.security.strict_headers {
        tracing::warn!("Permissive mode: client addresses and X-Forwarded-For are mirrored");
    }

    startup::serve(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
