// ABOUTME: HTTP server binding and runtime configuration for the promptforge API server
use serde::{Deserialize, Serialize};
use std::env;
use validator::Validate;

/// Server-level settings, layered the same way as `promptforge_core::config`
/// (defaults, then `PROMPTFORGE_API_`-prefixed environment variables).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApiServerConfig {
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
    pub host: String,
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,
    pub max_concurrency: usize,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            request_timeout_secs: 30,
            max_concurrency: 3,
        }
    }
}

impl ApiServerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(port) = env::var("PROMPTFORGE_API_PORT") {
            if let Ok(parsed) = port.parse() {
                config.port = parsed;
            }
        }
        if let Ok(host) = env::var("PROMPTFORGE_API_HOST") {
            config.host = host;
        }
        config
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(ApiServerConfig::default().validate().is_ok());
    }

    #[test]
    fn bind_address_combines_host_and_port() {
        let config = ApiServerConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }
}
