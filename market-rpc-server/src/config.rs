use std::path::PathBuf;

use market_data_services::{PipelineLimits, SessionOptions, StoreSettings};

pub const DEFAULT_SCHEDULE: &str = "*/5 * * * *";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub require_tls: bool,
    /// Cron expression for scheduled cycles, five or six fields.
    pub schedule: String,
    pub schedule_enabled: bool,
    pub run_limit: usize,
    pub read_limit_max: usize,
    pub chrome_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let limits = PipelineLimits::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            require_tls: false,
            schedule: DEFAULT_SCHEDULE.to_string(),
            schedule_enabled: true,
            run_limit: limits.run_limit,
            read_limit_max: limits.read_limit_max,
            chrome_path: None,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            database_url: self.database_url.clone(),
            require_tls: self.require_tls,
            ..StoreSettings::default()
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            executable_override: self.chrome_path.clone(),
            ..SessionOptions::default()
        }
    }

    pub fn limits(&self) -> PipelineLimits {
        PipelineLimits {
            run_limit: self.run_limit,
            read_limit_max: self.read_limit_max,
        }
    }
}
