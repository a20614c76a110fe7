// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses environment variables into typed server, quota, and provider settings
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Environment-based configuration management for production deployment

use std::env;
use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use thumbanana_core::constants::{cache, gemini, generation, ports, tiers, uploads};
use thumbanana_core::models::{TierPolicies, TierPolicy};
use tracing::info;
use url::Url;

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Type-safe database location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// SQLite database with file path
    SQLite {
        /// Database file path
        path: PathBuf,
    },
    /// In-memory SQLite (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string
    ///
    /// # Errors
    ///
    /// Returns an error for non-SQLite URLs
    pub fn parse_url(s: &str) -> Result<Self> {
        match s.strip_prefix("sqlite:") {
            Some(":memory:") => Ok(Self::Memory),
            Some(path) => Ok(Self::SQLite {
                path: PathBuf::from(path.trim_start_matches("//")),
            }),
            None if s.contains("://") => Err(anyhow!("Unsupported database URL: {s}")),
            None => Ok(Self::SQLite {
                path: PathBuf::from(s),
            }),
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/thumbanana.db"),
        }
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Gemini image API settings
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key; generation is unavailable without it
    pub api_key: Option<String>,
    /// Image model name
    pub model: String,
    /// API base URL, validated as an absolute URL at load time
    pub base_url: String,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Upload and artifact storage settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory for uploaded reference images
    pub upload_dir: PathBuf,
    /// Directory for generated artifacts
    pub generated_dir: PathBuf,
    /// Maximum reference image size in bytes
    pub max_file_size: usize,
}

/// Daily quota settings
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Per-tier ceilings
    pub tiers: TierPolicies,
    /// Ceiling across all identities; `None` disables it
    pub global_daily_ceiling: Option<u32>,
    /// Offset from UTC in which the daily window resets at midnight
    pub utc_offset: FixedOffset,
}

/// Upstream call policy for the orchestrator
#[derive(Debug, Clone, Copy)]
pub struct GenerationConfig {
    /// Timeout for one upstream image call
    pub upstream_timeout: Duration,
    /// Upstream calls allowed in flight across the process
    pub max_concurrent_upstream_calls: usize,
    /// Delay before retrying a transient failure
    pub transient_retry_backoff: Duration,
}

/// Result cache settings
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Entry time-to-live
    pub ttl: Duration,
    /// Maximum entries
    pub max_entries: usize,
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// HTTP port
    pub http_port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Database location
    pub database_url: DatabaseUrl,
    /// Gemini settings
    pub gemini: GeminiConfig,
    /// Storage settings
    pub storage: StorageConfig,
    /// Quota settings
    pub quota: QuotaConfig,
    /// Orchestrator upstream policy
    pub generation: GenerationConfig,
    /// Result cache settings
    pub cache: CacheConfig,
    /// Allowed CORS origins (`*` allows any)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            http_port: ports::DEFAULT_HTTP_PORT,
            environment: Environment::Development,
            database_url: DatabaseUrl::default(),
            gemini: GeminiConfig {
                api_key: None,
                model: gemini::DEFAULT_MODEL.to_owned(),
                base_url: gemini::DEFAULT_BASE_URL.to_owned(),
            },
            storage: StorageConfig {
                upload_dir: PathBuf::from("./uploads"),
                generated_dir: PathBuf::from("./generated"),
                max_file_size: uploads::MAX_FILE_SIZE_BYTES,
            },
            quota: QuotaConfig {
                tiers: TierPolicies::default(),
                global_daily_ceiling: Some(tiers::GLOBAL_DAILY_REQUESTS),
                utc_offset: Utc.fix(),
            },
            generation: GenerationConfig {
                upstream_timeout: Duration::from_secs(generation::UPSTREAM_TIMEOUT_SECS),
                max_concurrent_upstream_calls: generation::MAX_CONCURRENT_UPSTREAM_CALLS,
                transient_retry_backoff: Duration::from_millis(
                    generation::TRANSIENT_RETRY_BACKOFF_MS,
                ),
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(cache::DEFAULT_CACHE_TTL_SECS),
                max_entries: cache::DEFAULT_CACHE_MAX_ENTRIES,
            },
            cors_origins: vec!["*".to_owned()],
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is present but malformed, or when the
    /// resulting configuration fails validation
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");
        let defaults = Self::default();

        let guest = TierPolicy {
            daily_request_ceiling: env_parse(
                "DAILY_REQUEST_LIMIT_GUEST",
                defaults.quota.tiers.guest.daily_request_ceiling,
            )?,
            max_variants: env_parse("MAX_VARIANTS_GUEST", defaults.quota.tiers.guest.max_variants)?,
            max_reference_images: defaults.quota.tiers.guest.max_reference_images,
        };
        let registered = TierPolicy {
            daily_request_ceiling: env_parse(
                "DAILY_REQUEST_LIMIT_USER",
                defaults.quota.tiers.registered.daily_request_ceiling,
            )?,
            max_variants: env_parse(
                "MAX_VARIANTS_USER",
                defaults.quota.tiers.registered.max_variants,
            )?,
            max_reference_images: defaults.quota.tiers.registered.max_reference_images,
        };
        let global: u32 = env_parse("DAILY_REQUEST_LIMIT_GLOBAL", tiers::GLOBAL_DAILY_REQUESTS)?;
        let offset_minutes: i32 = env_parse("QUOTA_UTC_OFFSET_MINUTES", 0)?;

        let config = Self {
            host: env_var_or("HOST", &defaults.host),
            http_port: env_parse("PORT", defaults.http_port)?,
            environment: Environment::from_str_or_default(&env_var_or(
                "ENVIRONMENT",
                "development",
            )),
            database_url: DatabaseUrl::parse_url(&env_var_or(
                "DATABASE_URL",
                &defaults.database_url.to_connection_string(),
            ))?,
            gemini: GeminiConfig {
                api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
                model: env_var_or("GEMINI_MODEL", gemini::DEFAULT_MODEL),
                base_url: parse_base_url(&env_var_or(
                    "GEMINI_API_BASE_URL",
                    gemini::DEFAULT_BASE_URL,
                ))?,
            },
            storage: StorageConfig {
                upload_dir: PathBuf::from(env_var_or("UPLOAD_DIR", "./uploads")),
                generated_dir: PathBuf::from(env_var_or("GENERATED_DIR", "./generated")),
                max_file_size: env_parse("MAX_FILE_SIZE", defaults.storage.max_file_size)?,
            },
            quota: QuotaConfig {
                tiers: TierPolicies { guest, registered },
                global_daily_ceiling: (global > 0).then_some(global),
                utc_offset: FixedOffset::east_opt(offset_minutes * 60)
                    .ok_or_else(|| anyhow!("Invalid QUOTA_UTC_OFFSET_MINUTES value"))?,
            },
            generation: GenerationConfig {
                upstream_timeout: Duration::from_secs(env_parse(
                    "UPSTREAM_TIMEOUT_SECS",
                    generation::UPSTREAM_TIMEOUT_SECS,
                )?),
                max_concurrent_upstream_calls: env_parse(
                    "MAX_CONCURRENT_UPSTREAM_CALLS",
                    generation::MAX_CONCURRENT_UPSTREAM_CALLS,
                )?,
                transient_retry_backoff: Duration::from_millis(env_parse(
                    "TRANSIENT_RETRY_BACKOFF_MS",
                    generation::TRANSIENT_RETRY_BACKOFF_MS,
                )?),
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(env_parse("CACHE_TTL", cache::DEFAULT_CACHE_TTL_SECS)?),
                max_entries: env_parse("CACHE_MAX_SIZE", cache::DEFAULT_CACHE_MAX_ENTRIES)?,
            },
            cors_origins: parse_origins(&env_var_or("CORS_ORIGINS", "*")),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        self.quota
            .tiers
            .validate()
            .map_err(|e| anyhow!(e.message))?;

        if self.generation.max_concurrent_upstream_calls == 0 {
            return Err(anyhow!("MAX_CONCURRENT_UPSTREAM_CALLS must be at least 1"));
        }
        if self.generation.upstream_timeout.is_zero() {
            return Err(anyhow!("UPSTREAM_TIMEOUT_SECS must be at least 1"));
        }
        if self.storage.max_file_size == 0 {
            return Err(anyhow!("MAX_FILE_SIZE must be greater than zero"));
        }
        if self.cache.max_entries == 0 {
            return Err(anyhow!("CACHE_MAX_SIZE must be greater than zero"));
        }

        Ok(())
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Thumbanana Server Configuration:\n\
             - Listen: {}:{}\n\
             - Environment: {}\n\
             - Database: {}\n\
             - Gemini: {} ({})\n\
             - Guest tier: {}/day, {} variant(s)\n\
             - Registered tier: {}/day, {} variant(s)\n\
             - Global ceiling: {}\n\
             - Upstream: timeout {}s, {} concurrent\n\
             - Result cache: {} entries, TTL {}s",
            self.host,
            self.http_port,
            self.environment,
            self.database_url,
            self.gemini.model,
            if self.gemini.api_key.is_some() {
                "API key configured"
            } else {
                "no API key"
            },
            self.quota.tiers.guest.daily_request_ceiling,
            self.quota.tiers.guest.max_variants,
            self.quota.tiers.registered.daily_request_ceiling,
            self.quota.tiers.registered.max_variants,
            self.quota
                .global_daily_ceiling
                .map_or_else(|| "disabled".to_owned(), |c| format!("{c}/day")),
            self.generation.upstream_timeout.as_secs(),
            self.generation.max_concurrent_upstream_calls,
            self.cache.max_entries,
            self.cache.ttl.as_secs(),
        )
    }
}

/// Validate an absolute base URL and strip any trailing slash
fn parse_base_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw).context("Invalid GEMINI_API_BASE_URL value")?;
    Ok(url.as_str().trim_end_matches('/').to_owned())
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse an environment variable, falling back to a default when unset
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} value: {raw}")),
        Err(_) => Ok(default),
    }
}

/// Parse comma-separated CORS origins
fn parse_origins(origins_str: &str) -> Vec<String> {
    if origins_str.trim() == "*" {
        vec!["*".to_owned()]
    } else {
        origins_str
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_origins() {
        assert_eq!(parse_origins("*"), vec!["*"]);
        assert_eq!(
            parse_origins("http://localhost:3000, https://app.example.com,"),
            vec!["http://localhost:3000", "https://app.example.com"]
        );
    }

    #[test]
    fn test_database_url_parsing() {
        assert_eq!(
            DatabaseUrl::parse_url("sqlite::memory:").unwrap(),
            DatabaseUrl::Memory
        );
        assert_eq!(
            DatabaseUrl::parse_url("sqlite:./thumbanana.db").unwrap(),
            DatabaseUrl::SQLite {
                path: PathBuf::from("./thumbanana.db")
            }
        );
        assert!(DatabaseUrl::parse_url("postgres://localhost/db").is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http_port, 8000);
        assert_eq!(config.quota.tiers.guest.daily_request_ceiling, 3);
        assert_eq!(config.quota.tiers.registered.max_variants, 3);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        env::set_var("DAILY_REQUEST_LIMIT_GUEST", "2");
        env::set_var("QUOTA_UTC_OFFSET_MINUTES", "540");
        env::set_var("DAILY_REQUEST_LIMIT_GLOBAL", "0");

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.quota.tiers.guest.daily_request_ceiling, 2);
        assert_eq!(config.quota.utc_offset.local_minus_utc(), 540 * 60);
        assert_eq!(config.quota.global_daily_ceiling, None);

        env::remove_var("DAILY_REQUEST_LIMIT_GUEST");
        env::remove_var("QUOTA_UTC_OFFSET_MINUTES");
        env::remove_var("DAILY_REQUEST_LIMIT_GLOBAL");
    }

    #[test]
    #[serial]
    fn test_guest_ceiling_must_be_below_registered() {
        env::set_var("DAILY_REQUEST_LIMIT_GUEST", "10");
        let result = ServerConfig::from_env();
        env::remove_var("DAILY_REQUEST_LIMIT_GUEST");

        assert!(result.is_err());
    }
}
