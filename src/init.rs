use crate::dispatch::SinkConfig;
use crate::env::*;
use crate::error::{ConfigError, InitError};
use crate::format::RenderMode;
use crate::layer::PipelineLayer;
use crate::pipeline::Pipeline;
use crate::pool::PoolConfig;
use crate::resource::Resource;
use crate::severity::Level;
use crate::sink::StreamSink;
use crate::CRATE_TARGET;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::Duration;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::Registry;

/// Connection settings of the OpenSearch sink.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub index: String,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Everything needed to assemble the default pipeline.
///
/// **Fields**
/// - `level`: minimum level of every sink.
/// - `colorize`: ANSI colours on the console sink.
/// - `store`: OpenSearch sink settings; `None` keeps logging console-only.
/// - `pool`: delivery worker pool settings for the store sink.
/// - `attribute_limit`: per-record attribute cap, `None` for unbounded.
/// - `service_name`, `environment`: resource attributes stamped on every
///   record.
/// - `internal_diagnostics`: print the crate's own warnings to stderr via
///   a `fmt` layer.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub level: Level,
    pub colorize: bool,
    pub store: Option<StoreConfig>,
    pub pool: PoolConfig,
    pub attribute_limit: Option<usize>,
    pub service_name: String,
    pub environment: String,
    pub internal_diagnostics: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            level: Level::Trace,
            colorize: true,
            store: None,
            pool: PoolConfig::default(),
            attribute_limit: None,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            internal_diagnostics: true,
        }
    }
}

impl PipelineConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_var)
    }

    /// Read the configuration through `lookup`, which returns `None` for
    /// unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = PipelineConfig::default();

        if let Some(level) = lookup(LOGURU_LEVEL_ENV).or_else(|| lookup(LOG_LEVEL_ENV)) {
            config.level = Level::from_str(&level)?;
        }
        if let Some(v) = lookup(LOG_COLORIZE_ENV) {
            config.colorize = parse_bool(LOG_COLORIZE_ENV, &v)?;
        }
        if let Some(v) = lookup(LOG_ATTRIBUTE_LIMIT_ENV) {
            config.attribute_limit = Some(parse(LOG_ATTRIBUTE_LIMIT_ENV, &v, "attribute count")?);
        }
        if let Some(v) = lookup(LOG_DB_WORKERS_ENV) {
            let workers: usize = parse(LOG_DB_WORKERS_ENV, &v, "worker count")?;
            if workers == 0 {
                return Err(invalid(LOG_DB_WORKERS_ENV, &v, "worker count"));
            }
            config.pool.workers = workers;
        }
        if let Some(v) = lookup(LOG_DB_TIMEOUT_MS_ENV) {
            config.pool.attempt_timeout =
                Duration::from_millis(parse(LOG_DB_TIMEOUT_MS_ENV, &v, "duration in milliseconds")?);
        }
        if let Some(v) = lookup(LOG_DB_RETRIES_ENV) {
            config.pool.max_retries = parse(LOG_DB_RETRIES_ENV, &v, "retry count")?;
        }
        if let Some(v) = lookup(LOG_QUEUE_CAPACITY_ENV) {
            let capacity: usize = parse(LOG_QUEUE_CAPACITY_ENV, &v, "queue capacity")?;
            if capacity == 0 {
                return Err(invalid(LOG_QUEUE_CAPACITY_ENV, &v, "queue capacity"));
            }
            config.pool.queue_capacity = capacity;
        }
        if let Some(v) = lookup(OTEL_SERVICE_NAME_ENV) {
            config.service_name = v;
        }
        if let Some(v) = lookup(DEPLOYMENT_ENVIRONMENT_ENV) {
            config.environment = v;
        }

        if let (Some(host), Some(port)) = (lookup(LOG_DB_HOST_ENV), lookup(LOG_DB_PORT_ENV)) {
            config.store = Some(StoreConfig {
                host,
                port: parse(LOG_DB_PORT_ENV, &port, "port")?,
                user: lookup(LOG_DB_USER_ENV).unwrap_or_else(|| DEFAULT_DB_USER.to_string()),
                password: lookup(LOG_DB_PASS_ENV).unwrap_or_else(|| DEFAULT_DB_PASS.to_string()),
                index: lookup(LOG_DB_INDEX_ENV).unwrap_or_else(|| DEFAULT_INDEX.to_string()),
            });
        }

        Ok(config)
    }

    pub fn resource(&self) -> Resource {
        Resource::new(self.service_name.clone(), self.environment.clone())
    }
}

fn invalid(key: &'static str, value: &str, expected: &'static str) -> ConfigError {
    ConfigError::Invalid { key, value: value.to_string(), expected }
}

fn parse<T: FromStr>(key: &'static str, value: &str, expected: &'static str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value, expected))
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "boolean")),
    }
}

/// Assemble the default pipeline: a human-readable stderr sink, plus an
/// OpenSearch sink rendering machine documents when `config.store` is set.
///
/// Starting the store sink requires a running Tokio runtime.
pub fn build_pipeline(config: &PipelineConfig) -> Result<Pipeline, InitError> {
    let builder = Pipeline::builder(config.resource())
        .attribute_limit(config.attribute_limit)
        .pool(config.pool.clone())
        .stream_sink(
            SinkConfig::new("stderr", config.level, RenderMode::Human).colorize(config.colorize),
            StreamSink::stderr(),
        );

    let builder = match &config.store {
        Some(store) => with_store_sink(builder, config.level, store)?,
        None => builder,
    };

    builder.build()
}

#[cfg(feature = "opensearch")]
fn with_store_sink(
    builder: crate::pipeline::PipelineBuilder,
    level: Level,
    store: &StoreConfig,
) -> Result<crate::pipeline::PipelineBuilder, InitError> {
    use crate::opensearch::{default_mapping, OpenSearchConfig, OpenSearchStore};
    use crate::sink::StoreSink;

    let os_config = OpenSearchConfig::from_host_port(&store.host, store.port)
        .with_credentials(store.user.clone(), store.password.clone());
    let sink = StoreSink::new(OpenSearchStore::new(os_config), store.index.clone(), default_mapping());
    Ok(builder.remote_sink(SinkConfig::new("opensearch", level, RenderMode::Machine), Arc::new(sink)))
}

#[cfg(not(feature = "opensearch"))]
fn with_store_sink(
    _builder: crate::pipeline::PipelineBuilder,
    _level: Level,
    _store: &StoreConfig,
) -> Result<crate::pipeline::PipelineBuilder, InitError> {
    Err(InitError::OpenSearchFeatureDisabled)
}

/// Install a global `tracing` subscriber that feeds every event into
/// `pipeline`.
///
/// With `internal_diagnostics`, a `fmt` layer additionally prints this
/// crate's own warnings and errors to stderr; they are never routed through
/// the pipeline itself.
pub fn init_tracing(pipeline: Arc<Pipeline>, internal_diagnostics: bool) -> Result<(), InitError> {
    let diagnostics = internal_diagnostics.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter_fn(|meta| {
                meta.target().starts_with(CRATE_TARGET) && *meta.level() <= tracing::Level::WARN
            }))
    });

    let subscriber = Registry::default()
        .with(PipelineLayer::new(pipeline))
        .with(diagnostics);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Read [`PipelineConfig::from_env`], build the pipeline and install it as
/// the global subscriber. Returns the pipeline so the caller can log
/// through it directly and shut it down on exit.
pub fn init_from_env() -> Result<Arc<Pipeline>, InitError> {
    let config = PipelineConfig::from_env()?;
    let pipeline = Arc::new(build_pipeline(&config)?);
    init_tracing(Arc::clone(&pipeline), config.internal_diagnostics)?;
    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.level, Level::Trace);
        assert!(config.colorize);
        assert!(config.store.is_none());
        assert_eq!(config.attribute_limit, None);
        assert_eq!(config.service_name, "unknown_service");
        assert_eq!(config.environment, "development");
        assert_eq!(config.pool.queue_capacity, 1024);
        assert_eq!(config.pool.max_retries, 2);
        assert_eq!(config.pool.attempt_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn store_needs_host_and_port() {
        let only_host = PipelineConfig::from_lookup(lookup(&[("LOG_DB_HOST", "localhost")])).unwrap();
        assert!(only_host.store.is_none());

        let config = PipelineConfig::from_lookup(lookup(&[
            ("LOG_DB_HOST", "localhost"),
            ("LOG_DB_PORT", "9200"),
            ("LOG_DB_USER", "writer"),
        ]))
        .unwrap();
        let store = config.store.unwrap();
        assert_eq!(store.port, 9200);
        assert_eq!(store.user, "writer");
        assert_eq!(store.password, "admin");
        assert_eq!(store.index, "logs_commons");
    }

    #[test]
    fn loguru_level_wins_over_log_level() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("LOGURU_LEVEL", "warning"),
            ("LOG_LEVEL", "DEBUG"),
        ]))
        .unwrap();
        assert_eq!(config.level, Level::Warning);
    }

    #[test]
    fn invalid_values_are_errors() {
        let err = PipelineConfig::from_lookup(lookup(&[("LOG_LEVEL", "LOUD")])).unwrap_err();
        assert_eq!(err, ConfigError::UnknownLevel("LOUD".to_string()));

        let err = PipelineConfig::from_lookup(lookup(&[
            ("LOG_DB_HOST", "localhost"),
            ("LOG_DB_PORT", "ninety"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "LOG_DB_PORT", .. }));

        let err = PipelineConfig::from_lookup(lookup(&[("LOG_DB_WORKERS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "LOG_DB_WORKERS", .. }));

        let err = PipelineConfig::from_lookup(lookup(&[("LOG_COLORIZE", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "LOG_COLORIZE", .. }));
    }

    #[test]
    fn numeric_overrides() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("LOG_DB_WORKERS", "3"),
            ("LOG_DB_TIMEOUT_MS", "250"),
            ("LOG_DB_RETRIES", "0"),
            ("LOG_ATTRIBUTE_LIMIT", "16"),
            ("LOG_COLORIZE", "false"),
        ]))
        .unwrap();
        assert_eq!(config.pool.workers, 3);
        assert_eq!(config.pool.attempt_timeout, Duration::from_millis(250));
        assert_eq!(config.pool.max_retries, 0);
        assert_eq!(config.attribute_limit, Some(16));
        assert!(!config.colorize);
    }

    #[test]
    fn console_only_pipeline_builds_without_runtime() {
        let pipeline = build_pipeline(&PipelineConfig::default()).unwrap();
        assert!(pipeline.enabled(Level::Trace));
        assert!(pipeline.delivery_stats().is_none());
    }
}
