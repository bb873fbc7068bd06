//! # Runtime Configuration
//!
//! Defaults overridden by `KP_*` environment variables.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `KP_HTTP_HOST` | gateway bind host | `0.0.0.0` |
//! | `KP_HTTP_PORT` | gateway bind port | `8080` |
//! | `KP_TOKEN_SECRET` | HS256 token secret | empty |
//! | `KP_TOKEN_AUDIENCE` | expected `aud` claim | unset |
//! | `KP_PRODUCTION` | enforce audience and secret | `false` |
//! | `KP_PAGE_SIZE` | default page size | `25` |
//! | `KP_STORE` | `memory` or `rocksdb` | `memory` |
//! | `KP_DATA_DIR` | RocksDB directory | `./data/kalapila` |
//! | `KP_STORE_TIMEOUT_MS` | store round-trip bound | `2000` |
//! | `KP_MAX_QOS` | highest accepted QoS | `2` |
//! | `KP_CHAT_TOKEN_TTL_SECS` | chat token lifetime | `3600` |
//! | `KP_LOG` | tracing filter directive | `info` |
//!
//! ## Security Requirements
//!
//! - The token secret MUST NOT be empty in production

use kp_01_conversation_store::ConversationConfig;
use kp_02_chat_gateway::GatewayConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Which key-value store backs the conversation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local store; state is lost on restart.
    Memory,
    /// RocksDB database at the given directory.
    RocksDb { path: PathBuf },
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StoreBackend,
    /// fsync on every write.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            sync_writes: true,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub conversation: ConversationConfig,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            conversation: ConversationConfig::default(),
            gateway: GatewayConfig::default(),
            storage: StorageConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("unknown store backend {0:?}: expected \"memory\" or \"rocksdb\"")]
    UnknownBackend(String),

    #[error("the rocksdb store requires building with the `rocksdb` feature")]
    RocksDbUnavailable,

    #[error(
        "SECURITY VIOLATION: token secret is empty. \
         Set KP_TOKEN_SECRET before running in production."
    )]
    InsecureTokenSecret,

    #[error("gateway configuration: {0}")]
    Gateway(#[from] kp_02_chat_gateway::ConfigError),
}

impl RuntimeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from any variable lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let gateway = &mut config.gateway;

        if let Some(host) = parsed(&lookup, "KP_HTTP_HOST")? {
            gateway.http.host = host;
        }
        if let Some(port) = parsed(&lookup, "KP_HTTP_PORT")? {
            gateway.http.port = port;
        }
        if let Some(secret) = lookup("KP_TOKEN_SECRET") {
            gateway.auth.secret = secret;
        }
        if let Some(audience) = lookup("KP_TOKEN_AUDIENCE").filter(|a| !a.is_empty()) {
            gateway.auth.audience = Some(audience);
        }
        if let Some(production) = parsed(&lookup, "KP_PRODUCTION")? {
            gateway.auth.production = production;
        }
        if let Some(page) = parsed(&lookup, "KP_PAGE_SIZE")? {
            gateway.default_page_size = page;
        }

        let conversation = &mut config.conversation;
        if let Some(millis) = parsed::<u64, _>(&lookup, "KP_STORE_TIMEOUT_MS")? {
            conversation.store_timeout = Duration::from_millis(millis);
        }
        if let Some(qos) = parsed(&lookup, "KP_MAX_QOS")? {
            conversation.max_qos = qos;
        }
        if let Some(ttl) = parsed(&lookup, "KP_CHAT_TOKEN_TTL_SECS")? {
            conversation.chat_token_ttl_secs = ttl;
        }

        let data_dir = lookup("KP_DATA_DIR").map_or_else(|| PathBuf::from("./data/kalapila"), PathBuf::from);
        config.storage.backend = match lookup("KP_STORE").as_deref() {
            None | Some("memory") => StoreBackend::Memory,
            Some("rocksdb") => StoreBackend::RocksDb { path: data_dir },
            Some(other) => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        if let Some(filter) = lookup("KP_LOG") {
            config.log_filter = filter;
        }

        Ok(config)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gateway.validate()?;
        if matches!(self.storage.backend, StoreBackend::RocksDb { .. })
            && !cfg!(feature = "rocksdb")
        {
            return Err(ConfigError::RocksDbUnavailable);
        }
        Ok(())
    }

    /// Validate configuration for production readiness.
    ///
    /// Returns `Err` if the token secret is empty, on top of [`Self::validate`].
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if self.gateway.auth.secret.is_empty() {
            return Err(ConfigError::InsecureTokenSecret);
        }
        self.validate()
    }
}

fn parsed<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}
