#[cfg(test)]
mod config_tests {
    use crate::config::{
        load_section, Config, ConfigError, DatabaseConfig, ObservabilityConfig, RateLimitConfig,
        ServerConfig, StorageBackend, ENV_PREFIX,
    };
    use std::collections::HashMap;

    /// Environment source backed by a fixed map instead of the process environment
    fn environment(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (format!("{}_{}", ENV_PREFIX, key), value.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    fn default_config() -> Config {
        Config {
            server: load_section("server", environment(&[])).unwrap(),
            database: DatabaseConfig::default(),
            observability: load_section("observability", environment(&[])).unwrap(),
            rate_limit: RateLimitConfig::default(),
        }
    }

    #[test]
    fn test_server_config_defaults() {
        let config: ServerConfig = load_section("server", environment(&[])).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.request_timeout_seconds, 30);
        assert_eq!(config.max_request_size, 1024 * 1024);
        assert!(!config.enable_admin_endpoints);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_server_config_from_env() {
        let config: ServerConfig = load_section(
            "server",
            environment(&[
                ("PORT", "9000"),
                ("REQUEST_TIMEOUT_SECONDS", "5"),
                ("ENABLE_ADMIN_ENDPOINTS", "true"),
            ]),
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.request_timeout().as_secs(), 5);
        assert!(config.enable_admin_endpoints);
    }

    #[test]
    fn test_database_config_from_env() {
        let config: DatabaseConfig = load_section(
            "database",
            environment(&[
                ("STORAGE_BACKEND", "dynamodb"),
                ("DYNAMODB_ENDPOINT", "http://localhost:8000"),
                ("ORDERS_TABLE", "TestOrders"),
                ("REGION", "eu-west-1"),
            ]),
        )
        .unwrap();

        assert_eq!(config.storage_backend, StorageBackend::Dynamodb);
        assert_eq!(
            config.dynamodb_endpoint.as_deref(),
            Some("http://localhost:8000")
        );
        assert_eq!(config.orders_table, "TestOrders");
        assert_eq!(config.carts_table, "LittleLemonCarts");
        assert_eq!(config.region, "eu-west-1");
    }

    #[test]
    fn test_database_config_defaults_to_memory() {
        let config: DatabaseConfig = load_section("database", environment(&[])).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert!(!config.seed_demo_data);
        assert_eq!(config.table_names().len(), 7);
    }

    #[test]
    fn test_unknown_backend_is_load_error() {
        let result: Result<DatabaseConfig, ConfigError> =
            load_section("database", environment(&[("STORAGE_BACKEND", "postgres")]));
        assert!(matches!(result, Err(ConfigError::LoadError { .. })));
    }

    #[test]
    fn test_observability_config_from_env() {
        let config: ObservabilityConfig = load_section(
            "observability",
            environment(&[
                ("SERVICE_NAME", "test-service"),
                ("OTLP_ENDPOINT", "http://collector:4317"),
                ("LOG_LEVEL", "debug"),
            ]),
        )
        .unwrap();

        assert_eq!(config.service_name, "test-service");
        assert_eq!(
            config.otlp_endpoint.as_deref(),
            Some("http://collector:4317")
        );
        assert_eq!(config.log_level, "debug");
        assert!(!config.enable_json_logging);
    }

    #[test]
    fn test_rate_limit_config_with_envy() {
        let config: RateLimitConfig = envy::prefixed("LITTLELEMON_RATE_LIMIT_")
            .from_iter(vec![
                (
                    "LITTLELEMON_RATE_LIMIT_REQUESTS_PER_WINDOW".to_string(),
                    "5".to_string(),
                ),
                (
                    "LITTLELEMON_RATE_LIMIT_ENABLED".to_string(),
                    "false".to_string(),
                ),
            ])
            .unwrap();

        assert_eq!(config.requests_per_window, 5);
        assert!(!config.enabled);
        assert_eq!(config.window().as_secs(), 60);
    }

    #[test]
    fn test_validation() {
        assert!(default_config().validate().is_ok());
        assert!(Config::default().validate().is_ok());

        let mut config = default_config();
        config.server.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { .. })
        ));

        let mut config = default_config();
        config.database.carts_table = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = default_config();
        config.rate_limit.window_seconds = 0;
        assert!(config.validate().is_err());

        config.rate_limit.enabled = false;
        assert!(config.validate().is_ok());
    }
}
