//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// Bearer token verification
    pub auth: AuthConfig,
    /// Page size when a request omits `count`
    pub default_page_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            auth: AuthConfig::default(),
            default_page_size: 25,
        }
    }
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "default_page_size cannot be 0".into(),
            ));
        }

        if self.auth.production {
            if self.auth.secret.is_empty() {
                return Err(ConfigError::MissingSecret);
            }
            if self.auth.audience.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::MissingAudience);
            }
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
        }
    }
}

/// Bearer token settings
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC key the identity provider signs tokens with
    pub secret: String,
    /// Client id that must appear as `aud` in production mode
    pub audience: Option<String>,
    /// Enforce the audience check
    pub production: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("audience", &self.audience)
            .field("production", &self.production)
            .finish()
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    #[error("production mode requires a token secret")]
    MissingSecret,

    #[error("production mode requires an audience")]
    MissingAudience,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http_addr().port(), 8080);
    }

    #[test]
    fn test_production_requires_secret_and_audience() {
        let mut config = GatewayConfig::default();
        config.auth.production = true;
        assert_eq!(config.validate(), Err(ConfigError::MissingSecret));

        config.auth.secret = "s3cret".into();
        assert_eq!(config.validate(), Err(ConfigError::MissingAudience));

        config.auth.audience = Some("web-client".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config = GatewayConfig {
            default_page_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLimit(_))));
    }

    #[test]
    fn test_secret_not_logged() {
        let auth = AuthConfig {
            secret: "hunter2".into(),
            ..Default::default()
        };
        assert!(!format!("{auth:?}").contains("hunter2"));
    }
}
