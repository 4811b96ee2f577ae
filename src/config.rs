use std::collections::HashMap;
use std::fmt;

use config::{Config as ConfigLib, ConfigBuilder, ConfigError, Environment, builder::DefaultState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Delivery engine settings
#[derive(Clone, Deserialize)]
pub struct WebhookConfig {
    /// Signing secret for subscriptions registered without one
    pub default_secret: String,

    /// Per-attempt HTTP timeout
    pub request_timeout_ms: u64,

    /// Attempts per delivery, the first one included
    pub max_attempts: u32,

    /// Wait before attempt `k + 1` is `retry_delays_ms[k - 1]`
    pub retry_delays_ms: Vec<u64>,

    pub max_concurrent_deliveries: usize,
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("default_secret", &"[REDACTED]")
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delays_ms", &self.retry_delays_ms)
            .field("max_concurrent_deliveries", &self.max_concurrent_deliveries)
            .finish()
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Self::set_defaults()?;
        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Use system environment variables
            // Should be in the format APP_SERVER__PORT or APP_WEBHOOK__MAX_ATTEMPTS.
            // APP_WEBHOOK__RETRY_DELAYS_MS takes a comma separated list.
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("webhook.retry_delays_ms")
                    .try_parsing(true),
            );
        }

        builder.build()?.try_deserialize()
    }

    /// Set default values for the configuration.
    /// This is used when no environment variables or config file are provided
    fn set_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        ConfigLib::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default(
                "webhook.default_secret",
                "default-webhook-secret-change-in-production",
            )?
            .set_default("webhook.request_timeout_ms", 5000)?
            .set_default("webhook.max_attempts", 3)?
            .set_default("webhook.retry_delays_ms", vec![1000i64, 3000, 5000])?
            .set_default("webhook.max_concurrent_deliveries", 64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::load_with_sources(Some(HashMap::new())).expect("Failed to load config");

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(
            config.webhook.default_secret,
            "default-webhook-secret-change-in-production"
        );
        assert_eq!(config.webhook.request_timeout_ms, 5000);
        assert_eq!(config.webhook.max_attempts, 3);
        assert_eq!(config.webhook.retry_delays_ms, vec![1000, 3000, 5000]);
        assert_eq!(config.webhook.max_concurrent_deliveries, 64);
    }

    #[test]
    fn test_env_config() {
        let mut env_vars = HashMap::new();
        env_vars.insert("server.host".to_string(), "0.0.0.0".to_string());
        env_vars.insert("server.port".to_string(), "443".to_string());
        env_vars.insert("webhook.max_attempts".to_string(), "5".to_string());
        env_vars.insert(
            "webhook.default_secret".to_string(),
            "another-default-secret".to_string(),
        );

        let config = Config::load_with_sources(Some(env_vars)).expect("Failed to load config");

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 443);
        assert_eq!(config.webhook.max_attempts, 5);
        assert_eq!(config.webhook.default_secret, "another-default-secret");
    }

    #[test]
    fn test_partial_env_override() {
        let mut env_vars = HashMap::new();
        // We just override the timeout
        env_vars.insert("webhook.request_timeout_ms".to_string(), "250".to_string());

        let config = Config::load_with_sources(Some(env_vars)).expect("Failed to load config");

        assert_eq!(config.webhook.request_timeout_ms, 250);
        // The other values should use default
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.webhook.retry_delays_ms, vec![1000, 3000, 5000]);
    }

    #[test]
    fn test_debug_redacts_default_secret() {
        let config = Config::load_with_sources(Some(HashMap::new())).expect("Failed to load config");

        let rendered = format!("{:?}", config);

        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("default-webhook-secret-change-in-production"));
    }
}
