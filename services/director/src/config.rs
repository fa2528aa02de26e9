//! Configuration for the director.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;

use crate::store::StoreConfig;
use crate::telemetry::TelemetryConfig;
use crate::worker::DEFAULT_RECONCILE_INTERVAL;

/// Director configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address for the health probe.
    pub listen_addr: SocketAddr,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Run migrations on startup.
    pub dev_mode: bool,

    /// Pause between reconciliation ticks.
    pub reconcile_interval: Duration,

    /// State store settings.
    pub store: StoreConfig,

    /// Telemetry client settings.
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("SEEDFILL_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()?;

        let log_level = std::env::var("SEEDFILL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let dev_mode = std::env::var("SEEDFILL_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let reconcile_interval = std::env::var("SEEDFILL_RECONCILE_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RECONCILE_INTERVAL);

        let store = StoreConfig::from_env();

        let mut telemetry = TelemetryConfig::default();
        if let Ok(url) = std::env::var("SEEDFILL_TELEMETRY_URL") {
            telemetry.base_url = url;
        }

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            reconcile_interval,
            store,
            telemetry,
        })
    }
}
