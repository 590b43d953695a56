//! Configuration management for CaseDesk services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Case workflow configuration
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Candidate notification configuration
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Maintenance worker configuration
    #[serde(default)]
    pub sweeper: SweeperConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Public URL of the web frontend (candidate submission pages)
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// Public base URL used when building short links
    #[serde(default = "default_short_url_base")]
    pub short_url_base: String,

    /// Maximum accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Run pending migrations on startup
    #[serde(default = "default_enabled")]
    pub run_migrations: bool,

    /// Log every SQL statement
    #[serde(default)]
    pub sqlx_logging: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// JWT secret for token signing
    pub jwt_secret: Option<String>,

    /// JWT expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,

    /// Allow self-registration of the first super admin
    #[serde(default = "default_enabled")]
    pub allow_bootstrap_register: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Days from assignment until the case is due
    #[serde(default = "default_tat_days")]
    pub tat_days: i64,

    /// Lifetime of a candidate submission token in hours
    #[serde(default = "default_candidate_token_hours")]
    pub candidate_token_hours: i64,

    /// Lifetime of a short link in hours
    #[serde(default = "default_short_link_hours")]
    pub short_link_hours: i64,

    /// Maximum rows accepted by a single bulk upload
    #[serde(default = "default_max_bulk_rows")]
    pub max_bulk_rows: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Webhook receiving candidate email notifications
    pub email_webhook_url: Option<String>,

    /// Webhook receiving candidate SMS notifications
    pub sms_webhook_url: Option<String>,

    /// Bearer token sent to the webhooks
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_notification_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries per delivery
    #[serde(default = "default_notification_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Login requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweeperConfig {
    /// Seconds between sweeps
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,

    /// Keep used candidate tokens for this many days before deleting
    #[serde(default = "default_used_token_retention")]
    pub used_token_retention_days: i64,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5000 }
fn default_request_timeout() -> u64 { 30 }
fn default_frontend_url() -> String { "http://localhost:3000".to_string() }
fn default_short_url_base() -> String { "http://localhost:5000".to_string() }
fn default_body_limit() -> usize { 10 * 1024 * 1024 }
fn default_database_url() -> String { "postgres://localhost/casedesk".to_string() }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_jwt_expiration() -> u64 { 7 * 24 * 3600 }
fn default_tat_days() -> i64 { 7 }
fn default_candidate_token_hours() -> i64 { 48 }
fn default_short_link_hours() -> i64 { 72 }
fn default_max_bulk_rows() -> usize { 5000 }
fn default_notification_timeout() -> u64 { 10 }
fn default_notification_retries() -> u32 { 3 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "casedesk".to_string() }
fn default_rate_limit() -> u32 { 5 }
fn default_burst() -> u32 { 10 }
fn default_enabled() -> bool { true }
fn default_sweep_interval() -> u64 { 300 }
fn default_used_token_retention() -> i64 { 30 }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweeper.interval_secs.max(1))
    }

    /// Build the candidate-facing submission URL for a token
    pub fn submission_link(&self, token: &str) -> String {
        format!(
            "{}/candidate/submit?token={}",
            self.server.frontend_url.trim_end_matches('/'),
            token
        )
    }

    /// Build the public short URL for a code
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/c/{}", self.server.short_url_base.trim_end_matches('/'), code)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            frontend_url: default_frontend_url(),
            short_url_base: default_short_url_base(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            run_migrations: default_enabled(),
            sqlx_logging: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiration_secs: default_jwt_expiration(),
            allow_bootstrap_register: default_enabled(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            tat_days: default_tat_days(),
            candidate_token_hours: default_candidate_token_hours(),
            short_link_hours: default_short_link_hours(),
            max_bulk_rows: default_max_bulk_rows(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            email_webhook_url: None,
            sms_webhook_url: None,
            api_key: None,
            timeout_secs: default_notification_timeout(),
            max_retries: default_notification_retries(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
            used_token_retention_days: default_used_token_retention(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.workflow.tat_days, 7);
        assert_eq!(config.workflow.candidate_token_hours, 48);
        assert_eq!(config.workflow.short_link_hours, 72);
        assert_eq!(config.auth.jwt_expiration_secs, 604_800);
        assert!(config.auth.jwt_secret.is_none());
    }

    #[test]
    fn test_empty_sections_fall_back_to_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"server": {"port": 8081}}"#).unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.sweeper.interval_secs, 300);
        assert!(config.rate_limit.enabled);
    }

    #[test]
    fn test_link_builders() {
        let mut config = AppConfig::default();
        config.server.frontend_url = "https://app.example.com/".into();
        config.server.short_url_base = "https://s.example.com".into();
        assert_eq!(
            config.submission_link("abc"),
            "https://app.example.com/candidate/submit?token=abc"
        );
        assert_eq!(config.short_url("Xy12Ab"), "https://s.example.com/c/Xy12Ab");
    }
}
