use anyhow::Context;
use std::{net::SocketAddr, time::Duration};

pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    /// `text` or `json`
    pub log_format: String,
    /// Overrides the engine's default per-probe timeout
    pub probe_timeout_ms: Option<u64>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = std::env::var("SCH_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("Invalid SCH_LISTEN_ADDR")?;
        let db_path = std::env::var("SCH_DB_PATH").unwrap_or_else(|_| "./db/school.db".into());
        let cors_allow = std::env::var("SCH_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = std::env::var("SCH_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "120000".into())
            .parse()
            .unwrap_or(120000);
        let log_format = std::env::var("SCH_LOG_FORMAT").unwrap_or_else(|_| "text".into());
        let probe_timeout_ms = match std::env::var("SCH_PROBE_TIMEOUT_MS") {
            Ok(raw) => Some(
                raw.parse()
                    .with_context(|| format!("Invalid SCH_PROBE_TIMEOUT_MS: {}", raw))?,
            ),
            Err(_) => None,
        };
        Ok(Self {
            listen_addr,
            db_path,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            log_format,
            probe_timeout_ms,
        })
    }
}
