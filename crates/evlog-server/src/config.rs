use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use evlog_bus::BusConfig;
use evlog_types::names::{RECORDS_ROOT, SERVICE_NAME};
use evlog_types::ObjectPath;

use crate::error::{ServerError, ServerResult};

/// Daemon configuration, usually loaded from a TOML file.
///
/// Every key is optional; unknown keys are rejected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Unix socket the bus is served on.
    pub socket_path: PathBuf,
    /// Directory holding one file per stored log.
    pub storage_dir: PathBuf,
    /// Object path under which logs are published.
    pub records_root: ObjectPath,
    /// Well-known bus name claimed by the daemon.
    pub service_name: String,
    /// How long the request loop blocks waiting for work.
    pub idle_timeout_ms: u64,
    /// Calls queued for the request loop before submitters wait.
    pub queue_capacity: usize,
    /// Default tracing filter, overridden by `RUST_LOG`.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/run/evlog/bus.sock"),
            storage_dir: PathBuf::from("/var/lib/evlog/events"),
            records_root: ObjectPath::new(RECORDS_ROOT).expect("records root constant is a valid path"),
            service_name: SERVICE_NAME.to_string(),
            idle_timeout_ms: 5000,
            queue_capacity: 256,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.idle_timeout_ms == 0 {
            return Err(ServerError::Config("idle_timeout_ms must be nonzero".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ServerError::Config("queue_capacity must be nonzero".into()));
        }
        if self.service_name.is_empty() {
            return Err(ServerError::Config("service_name must not be empty".into()));
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            queue_capacity: self.queue_capacity,
            ..BusConfig::default()
        }
    }
}
