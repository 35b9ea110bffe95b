use crate::liveness::EngineConfig;
use ::config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Address the HTTP intake listens on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// SQLite database holding site records
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Seconds without an active report before an idle site goes offline
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,

    /// Uptime credited per active report, in seconds
    #[serde(default = "default_uptime_quantum_secs")]
    pub uptime_quantum_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_database_url() -> String {
    "sqlite://sitepulse.db".to_string()
}

fn default_staleness_secs() -> u64 {
    60
}

fn default_uptime_quantum_secs() -> u64 {
    10
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("SITEPULSE"))
            .build()?
            .try_deserialize()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            staleness_window: Duration::from_secs(self.staleness_secs),
            uptime_quantum: Duration::from_secs(self.uptime_quantum_secs),
        }
    }
}
