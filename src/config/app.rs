//! Main application configuration
//!
//! This module defines the primary configuration structures for the queue-ewt
//! service, including environment variable and TOML loading and validation.

use crate::config::backend::BackendSettings;
use crate::wait_time::{EstimationConfig, PersistencePolicy};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub estimation: EstimationConfig,
    pub backend: BackendSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Interface the HTTP server binds to
    pub http_host: String,
    /// Port for the HTTP server
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "queue-ewt".to_string(),
            log_level: "info".to_string(),
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(&lookup)?;
        config.backend = config.backend.normalized();

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_overrides(&|key: &str| env::var(key).ok())?;
        config.backend = config.backend.normalized();

        validate_config(&config)?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Service settings
        if let Some(name) = lookup("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Some(host) = lookup("HTTP_HOST") {
            self.service.http_host = host;
        }
        parse_var(lookup, "HTTP_PORT", &mut self.service.http_port)?;
        parse_var(
            lookup,
            "SHUTDOWN_TIMEOUT_SECONDS",
            &mut self.service.shutdown_timeout_seconds,
        )?;

        // Estimation settings
        parse_var(
            lookup,
            "FRESHNESS_WINDOW_MINUTES",
            &mut self.estimation.freshness_window_minutes,
        )?;
        parse_var(
            lookup,
            "HISTORICAL_LOOKBACK_HOURS",
            &mut self.estimation.historical_lookback_hours,
        )?;
        parse_var(lookup, "CALL_TIMEOUT_MS", &mut self.estimation.call_timeout_ms)?;
        if let Some(policy) = lookup("PERSISTENCE_POLICY") {
            self.estimation.persistence_policy = PersistencePolicy::from_str(&policy)?;
        }

        // Backend scoping, `Table` is the legacy deployment name
        if let Some(instance_id) = lookup("INSTANCE_ID") {
            self.backend.instance_id = instance_id;
        }
        if let Some(table_name) = lookup("TABLE_NAME").or_else(|| lookup("Table")) {
            self.backend.table_name = table_name;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, raw))?;
    }
    Ok(())
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    config.estimation.validate()?;

    // Both collaborators need their scope
    if config.backend.instance_id.trim().is_empty() {
        return Err(anyhow!("INSTANCE_ID must be set"));
    }
    if config.backend.table_name.trim().is_empty() {
        return Err(anyhow!("TABLE_NAME must be set"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_required_backend_values() {
        let err = AppConfig::from_lookup(lookup_from(&[("TABLE_NAME", "estimates")]))
            .unwrap_err();
        assert!(err.to_string().contains("INSTANCE_ID"));

        let err = AppConfig::from_lookup(lookup_from(&[
            ("INSTANCE_ID", "i-1"),
            ("TABLE_NAME", "   "),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("TABLE_NAME"));
    }

    #[test]
    fn test_backend_values_are_trimmed() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("INSTANCE_ID", "  i-1 \n"),
            ("Table", "\testimates "),
        ]))
        .unwrap();

        assert_eq!(config.backend.instance_id, "i-1");
        assert_eq!(config.backend.table_name, "estimates");
    }

    #[test]
    fn test_table_name_wins_over_legacy_alias() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("INSTANCE_ID", "i-1"),
            ("TABLE_NAME", "new"),
            ("Table", "old"),
        ]))
        .unwrap();

        assert_eq!(config.backend.table_name, "new");
    }

    #[test]
    fn test_estimation_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("INSTANCE_ID", "i-1"),
            ("TABLE_NAME", "estimates"),
            ("FRESHNESS_WINDOW_MINUTES", "10"),
            ("CALL_TIMEOUT_MS", "250"),
            ("PERSISTENCE_POLICY", "required"),
            ("HTTP_PORT", "9090"),
        ]))
        .unwrap();

        assert_eq!(config.estimation.freshness_window_minutes, 10);
        assert_eq!(
            config.estimation.call_timeout(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(
            config.estimation.persistence_policy,
            PersistencePolicy::Required
        );
        assert_eq!(config.service.http_port, 9090);
        assert_eq!(config.estimation.historical_lookback_hours, 1);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let base = [("INSTANCE_ID", "i-1"), ("TABLE_NAME", "estimates")];

        let mut vars = base.to_vec();
        vars.push(("HTTP_PORT", "not-a-port"));
        assert!(AppConfig::from_lookup(lookup_from(&vars)).is_err());

        let mut vars = base.to_vec();
        vars.push(("FRESHNESS_WINDOW_MINUTES", "0"));
        assert!(AppConfig::from_lookup(lookup_from(&vars)).is_err());

        let mut vars = base.to_vec();
        vars.push(("LOG_LEVEL", "chatty"));
        assert!(AppConfig::from_lookup(lookup_from(&vars)).is_err());

        let mut vars = base.to_vec();
        vars.push(("PERSISTENCE_POLICY", "sometimes"));
        assert!(AppConfig::from_lookup(lookup_from(&vars)).is_err());

        let mut vars = base.to_vec();
        vars.push(("HISTORICAL_LOOKBACK_HOURS", "3000000000"));
        assert!(AppConfig::from_lookup(lookup_from(&vars)).is_err());
    }

    #[test]
    fn test_toml_config() {
        let contents = r#"
            [service]
            http_port = 9000

            [estimation]
            historical_lookback_hours = 2
            persistence_policy = "required"

            [backend]
            instance_id = "i-1"
            table_name = "estimates"
        "#;
        let config: AppConfig = toml::from_str(contents).unwrap();

        assert_eq!(config.service.http_port, 9000);
        assert_eq!(config.service.name, "queue-ewt");
        assert_eq!(config.estimation.historical_lookback_hours, 2);
        assert_eq!(config.estimation.freshness_window_minutes, 5);
        assert_eq!(
            config.estimation.persistence_policy,
            PersistencePolicy::Required
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_default_config_needs_backend() {
        assert!(validate_config(&AppConfig::default()).is_err());
    }
}
