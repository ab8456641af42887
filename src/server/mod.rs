//! quickml HTTP server
//!
//! Dataset upload and browsing, preprocessing, model training and model
//! download over a small REST API.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::QuickmlError;
use crate::training::ScoringPolicy;

/// Where collections and blobs are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// JSON files under `data_dir`
    File,
    /// Process memory, lost on exit
    Memory,
}

impl FromStr for StoreBackend {
    type Err = QuickmlError;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StoreBackend::File),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(QuickmlError::ValidationError(format!(
                "unknown store backend '{}'",
                other
            ))),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: String,
    pub max_upload_size: usize,
    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
    pub training_timeout_secs: u64,
    pub store_backend: StoreBackend,
    pub scoring_policy: ScoringPolicy,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Ignoring unparsable environment value");
            default
        }),
        Err(_) => default,
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("API_PORT", 8080),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            max_upload_size: env_or("MAX_UPLOAD_SIZE", 100 * 1024 * 1024), // 100MB
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            training_timeout_secs: env_or("TRAINING_TIMEOUT_SECS", 600),
            store_backend: env_or("STORE_BACKEND", StoreBackend::File),
            scoring_policy: env_or("SCORING_POLICY", ScoringPolicy::Legacy),
        }
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(
        data_dir = %config.data_dir,
        backend = ?config.store_backend,
        policy = ?config.scoring_policy,
        training_timeout_secs = config.training_timeout_secs,
        "Initializing stores"
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = Arc::new(AppState::from_config(config.clone())?);
    let app = create_router(state);

    info!(
        address = %addr,
        max_upload_size_mb = config.max_upload_size / 1024 / 1024,
        started_at = %start_time.to_rfc3339(),
        "quickml server starting"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server gracefully");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        if std::env::var("API_PORT").is_err() {
            assert_eq!(config.port, 8080);
        }
        if std::env::var("TRAINING_TIMEOUT_SECS").is_err() {
            assert_eq!(config.training_timeout_secs, 600);
        }
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("FILE".parse::<StoreBackend>().unwrap(), StoreBackend::File);
        assert!("mongo".parse::<StoreBackend>().is_err());
    }
}
