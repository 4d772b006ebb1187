use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::board::{FieldDef, FieldKind};

/// Main configuration structure for dealboard
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DealboardConfig {
    /// Remote record store settings
    pub remote: RemoteConfig,
    /// Query cache and retry settings
    pub cache: CacheConfig,
    /// Board and field schema settings
    pub board: BoardConfig,
    /// Local key-value store settings
    pub local: LocalConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    /// Base URL of the hosted record store's REST endpoint
    pub endpoint: String,
    /// API key (can be set via env var)
    pub api_key: Option<String>,
    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second limit
    pub requests_per_second: u32,
    /// Burst capacity
    pub burst_capacity: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Entries older than this count as stale; unset disables age expiry
    pub max_age_seconds: Option<u64>,
    /// Retry/backoff policy for remote operations
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoardConfig {
    /// Terminal stage assigned by the missing-stage repair operation
    pub default_repair_stage: String,
    /// Declared field schema for startup records
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalConfig {
    /// Directory for the local key-value store
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON-structured log lines
    pub json_logs: bool,
}

impl Default for DealboardConfig {
    fn default() -> Self {
        Self {
            remote: RemoteConfig {
                endpoint: "http://localhost:8000/rest/v1/".to_string(),
                api_key: None, // Read from env var when unset
                rate_limit: RateLimitConfig {
                    requests_per_second: 10,
                    burst_capacity: 20,
                },
            },
            cache: CacheConfig {
                max_age_seconds: Some(300),
                retry: RetrySettings {
                    max_attempts: 3,
                    base_delay_ms: 1000,
                    max_delay_ms: 30000,
                },
            },
            board: BoardConfig {
                default_repair_stage: "declined".to_string(),
                fields: vec![
                    FieldDef {
                        key: "name".to_string(),
                        kind: FieldKind::Text,
                        required: true,
                    },
                    FieldDef {
                        key: "sector".to_string(),
                        kind: FieldKind::Text,
                        required: false,
                    },
                    FieldDef {
                        key: "website".to_string(),
                        kind: FieldKind::Text,
                        required: false,
                    },
                    FieldDef {
                        key: "arr".to_string(),
                        kind: FieldKind::Number,
                        required: false,
                    },
                    FieldDef {
                        key: "founded".to_string(),
                        kind: FieldKind::Date,
                        required: false,
                    },
                    FieldDef {
                        key: "referred_by".to_string(),
                        kind: FieldKind::Reference,
                        required: false,
                    },
                ],
            },
            local: LocalConfig {
                data_dir: ".dealboard".to_string(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}

impl DealboardConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (dealboard.toml)
    /// 3. Environment variables (prefixed with DEALBOARD_)
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&DealboardConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if Path::new("dealboard.toml").exists() {
            builder = builder.add_source(File::with_name("dealboard"));
        }

        builder = builder.add_source(
            Environment::with_prefix("DEALBOARD")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut dealboard_config: DealboardConfig = config.try_deserialize()?;

        // Special handling for the API key - check the env var directly
        if dealboard_config.remote.api_key.is_none() {
            if let Ok(key) = std::env::var("DEALBOARD_API_KEY") {
                dealboard_config.remote.api_key = Some(key);
            }
        }

        Ok(dealboard_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> crate::remote::RetryPolicy {
        crate::remote::RetryPolicy {
            max_attempts: self.cache.retry.max_attempts,
            base_delay: std::time::Duration::from_millis(self.cache.retry.base_delay_ms),
            max_delay: std::time::Duration::from_millis(self.cache.retry.max_delay_ms),
        }
    }

    pub fn cache_max_age(&self) -> Option<std::time::Duration> {
        self.cache
            .max_age_seconds
            .map(std::time::Duration::from_secs)
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<DealboardConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = DealboardConfig::load_env_file();
        DealboardConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static DealboardConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
