use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Prefix of every environment variable the service reads
pub const ENV_PREFIX: &str = "LITTLELEMON";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {message}")]
    LoadError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub observability: ObservabilityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
    /// Mounts `/api/admin/*` (table setup, demo seeding)
    #[serde(default)]
    pub enable_admin_endpoints: bool,
}

/// Which Entity Store backs the repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Dynamodb,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_storage_backend")]
    pub storage_backend: StorageBackend,
    #[serde(default = "default_region")]
    pub region: String,
    /// Overrides the DynamoDB endpoint, e.g. DynamoDB Local
    #[serde(default)]
    pub dynamodb_endpoint: Option<String>,
    #[serde(default = "default_users_table")]
    pub users_table: String,
    #[serde(default = "default_groups_table")]
    pub groups_table: String,
    #[serde(default = "default_categories_table")]
    pub categories_table: String,
    #[serde(default = "default_menu_items_table")]
    pub menu_items_table: String,
    #[serde(default = "default_carts_table")]
    pub carts_table: String,
    #[serde(default = "default_orders_table")]
    pub orders_table: String,
    #[serde(default = "default_order_items_table")]
    pub order_items_table: String,
    /// Seed demo groups, users and menu at startup
    #[serde(default)]
    pub seed_demo_data: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub enable_json_logging: bool,
}

/// Per-user request throttling, read with `envy` from `LITTLELEMON_RATE_LIMIT_*`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

impl Config {
    pub fn from_environment() -> Result<Self, ConfigError> {
        info!("Loading configuration from environment");

        let environment = || config::Environment::with_prefix(ENV_PREFIX);
        let config = Config {
            server: load_section("server", environment())?,
            database: load_section("database", environment())?,
            observability: load_section("observability", environment())?,
            rate_limit: RateLimitConfig::from_env()?,
        };

        config.validate()?;

        info!("Configuration loaded successfully");
        debug!("Configuration: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: &str| {
            Err(ConfigError::ValidationError {
                message: message.to_string(),
            })
        };

        if self.server.port == 0 {
            return fail("Server port cannot be 0");
        }
        if self.server.request_timeout_seconds == 0 {
            return fail("Request timeout cannot be 0");
        }
        if self.server.max_request_size == 0 {
            return fail("Max request size cannot be 0");
        }
        if self.database.table_names().iter().any(|name| name.trim().is_empty()) {
            return fail("Table names cannot be empty");
        }
        if self.rate_limit.enabled
            && (self.rate_limit.window_seconds == 0 || self.rate_limit.requests_per_window == 0)
        {
            return fail("Rate limit window and request count must be positive");
        }

        Ok(())
    }
}

/// Deserialize one configuration section from an environment source
pub(crate) fn load_section<T: DeserializeOwned>(
    section: &str,
    environment: config::Environment,
) -> Result<T, ConfigError> {
    let settings = config::Config::builder()
        .add_source(environment)
        .build()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to load {} config: {}", section, e),
        })?;

    settings
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to deserialize {} config: {}", section, e),
        })
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    pub fn table_names(&self) -> [&str; 7] {
        [
            &self.users_table,
            &self.groups_table,
            &self.categories_table,
            &self.menu_items_table,
            &self.carts_table,
            &self.orders_table,
            &self.order_items_table,
        ]
    }

    /// Build a DynamoDB client from the default AWS credential chain
    pub async fn dynamodb_client(&self) -> DynamoDbClient {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(self.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &self.dynamodb_endpoint {
            info!("Using DynamoDB endpoint {}", endpoint);
            builder = builder.endpoint_url(endpoint);
        }
        DynamoDbClient::from_conf(builder.build())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            storage_backend: default_storage_backend(),
            region: default_region(),
            dynamodb_endpoint: None,
            users_table: default_users_table(),
            groups_table: default_groups_table(),
            categories_table: default_categories_table(),
            menu_items_table: default_menu_items_table(),
            carts_table: default_carts_table(),
            orders_table: default_orders_table(),
            order_items_table: default_order_items_table(),
            seed_demo_data: false,
        }
    }
}

impl RateLimitConfig {
    fn from_env() -> Result<Self, ConfigError> {
        envy::prefixed(format!("{}_RATE_LIMIT_", ENV_PREFIX))
            .from_env()
            .map_err(|e| ConfigError::LoadError {
                message: format!("Failed to load rate limit config: {}", e),
            })
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_timeout(),
            max_request_size: default_max_request_size(),
            enable_admin_endpoints: false,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            service_version: default_service_version(),
            otlp_endpoint: None,
            log_level: default_log_level(),
            enable_json_logging: false,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            requests_per_window: default_requests_per_window(),
            window_seconds: default_window_seconds(),
        }
    }
}

// Default value functions
pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8080
}

pub(crate) fn default_timeout() -> u64 {
    30
}

pub(crate) fn default_max_request_size() -> usize {
    1024 * 1024 // 1MB
}

pub(crate) fn default_storage_backend() -> StorageBackend {
    StorageBackend::Memory
}

pub(crate) fn default_region() -> String {
    "us-east-1".to_string()
}

pub(crate) fn default_users_table() -> String {
    "LittleLemonUsers".to_string()
}

pub(crate) fn default_groups_table() -> String {
    "LittleLemonGroups".to_string()
}

pub(crate) fn default_categories_table() -> String {
    "LittleLemonCategories".to_string()
}

pub(crate) fn default_menu_items_table() -> String {
    "LittleLemonMenuItems".to_string()
}

pub(crate) fn default_carts_table() -> String {
    "LittleLemonCarts".to_string()
}

pub(crate) fn default_orders_table() -> String {
    "LittleLemonOrders".to_string()
}

pub(crate) fn default_order_items_table() -> String {
    "LittleLemonOrderItems".to_string()
}

pub(crate) fn default_service_name() -> String {
    "littlelemon-rs".to_string()
}

pub(crate) fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}

pub(crate) fn default_rate_limit_enabled() -> bool {
    true
}

pub(crate) fn default_requests_per_window() -> u32 {
    60
}

pub(crate) fn default_window_seconds() -> u64 {
    60
}

#[cfg(test)]
mod tests;
