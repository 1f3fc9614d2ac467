use crate::presentation::config::{Environment, LoggingSettings};

/// Configuration for tracing initialization.
pub struct TracingConfig {
    pub environment: Environment,
    pub level: String,
    pub json_format: bool,
}

impl TracingConfig {
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            environment: Environment::from_env(),
            level: settings.level.clone(),
            json_format: settings.enable_json,
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            environment: Environment::from_env(),
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            json_format: std::env::var("LOG_FORMAT")
                .map(|v| v.to_lowercase() == "json")
                .unwrap_or(false),
        }
    }
}
