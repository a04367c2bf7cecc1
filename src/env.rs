//! Environment variable names read by [`PipelineConfig::from_env`](crate::init::PipelineConfig::from_env).
//!
//! Only the configuration layer touches the environment; every other type
//! takes its settings explicitly.

/// Minimum level for all sinks. Takes precedence over [`LOG_LEVEL_ENV`].
pub const LOGURU_LEVEL_ENV: &str = "LOGURU_LEVEL";

/// Minimum level for all sinks, default `TRACE`.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// OpenSearch host. The store sink is only enabled when both host and
/// port are set.
pub const LOG_DB_HOST_ENV: &str = "LOG_DB_HOST";

/// OpenSearch port.
pub const LOG_DB_PORT_ENV: &str = "LOG_DB_PORT";

/// OpenSearch user, default `admin`.
pub const LOG_DB_USER_ENV: &str = "LOG_DB_USER";

/// OpenSearch password, default `admin`.
pub const LOG_DB_PASS_ENV: &str = "LOG_DB_PASS";

/// Target index, default `logs_commons`.
pub const LOG_DB_INDEX_ENV: &str = "LOG_DB_INDEX";

/// Delivery worker count, default host parallelism.
pub const LOG_DB_WORKERS_ENV: &str = "LOG_DB_WORKERS";

/// Per-attempt delivery timeout in milliseconds, default 5000.
pub const LOG_DB_TIMEOUT_MS_ENV: &str = "LOG_DB_TIMEOUT_MS";

/// Retries after a failed delivery, default 2.
pub const LOG_DB_RETRIES_ENV: &str = "LOG_DB_RETRIES";

/// Delivery queue capacity, default 1024.
pub const LOG_QUEUE_CAPACITY_ENV: &str = "LOG_QUEUE_CAPACITY";

/// Maximum attributes per record, unbounded when unset.
pub const LOG_ATTRIBUTE_LIMIT_ENV: &str = "LOG_ATTRIBUTE_LIMIT";

/// Colour console output, default `true`.
pub const LOG_COLORIZE_ENV: &str = "LOG_COLORIZE";

/// Service name resource attribute.
pub const OTEL_SERVICE_NAME_ENV: &str = "OTEL_SERVICE_NAME";

/// Deployment environment resource attribute.
pub const DEPLOYMENT_ENVIRONMENT_ENV: &str = "DEPLOYMENT_ENVIRONMENT";

pub const DEFAULT_INDEX: &str = "logs_commons";
pub const DEFAULT_DB_USER: &str = "admin";
pub const DEFAULT_DB_PASS: &str = "admin";
pub const DEFAULT_SERVICE_NAME: &str = "unknown_service";
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Read an environment variable, treating empty values as unset.
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

